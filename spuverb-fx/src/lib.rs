//! Effect-instance surface for the SPU reverb.
//!
//! Wraps the `spuverb-dsp` core in the host-facing contract: explicit
//! instance lifecycle, in-place block processing, string-keyed parameter
//! access and a JSON state snapshot for persistence.

mod instance;
mod params;

pub use instance::{Config, ConfigError, EffectInstance};
pub use params::State;
pub use spuverb_dsp::PRESET_COUNT;
