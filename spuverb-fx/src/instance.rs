//! Effect instance ownership, creation and block processing.
//!
//! One `EffectInstance` is one logical effect slot: it owns a full working
//! set (work area, resampler states, scaled presets, controls) and shares
//! nothing with other instances. The host serializes calls per instance;
//! parameter changes land strictly between processed blocks.

use serde::Deserialize;
use spuverb_dsp::ReverbCore;
use thiserror::Error;

/// Errors that can occur while building an instance from a config blob.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Creation-time configuration. Any subset of the fields may appear in the
/// JSON; missing ones keep their defaults, unknown keys are ignored and all
/// values are clamped on application.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preset: i64,
    pub decay: f32,
    pub mix: f32,
    pub input_gain: f32,
    pub reverb_level: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preset: 4,
            decay: 0.7,
            mix: 0.35,
            input_gain: 0.5,
            reverb_level: 0.5,
        }
    }
}

/// A single reverb effect slot.
pub struct EffectInstance {
    pub(crate) core: ReverbCore,
}

impl EffectInstance {
    /// Create an instance with the default working set (Hall preset).
    pub fn new() -> Self {
        Self {
            core: ReverbCore::new(),
        }
    }

    /// Create an instance from a JSON configuration object.
    pub fn with_config(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        let mut core = ReverbCore::new();
        core.apply_preset(config.preset.clamp(0, 5) as usize);
        core.set_decay(config.decay);
        core.set_mix(config.mix);
        core.set_input_gain(config.input_gain);
        core.set_reverb_level(config.reverb_level);
        Self { core }
    }

    /// Process a block of interleaved stereo `i16` samples in place.
    ///
    /// Blocking and synchronous; always runs to completion. An odd trailing
    /// frame is passed through unprocessed.
    pub fn process_block(&mut self, samples: &mut [i16]) {
        self.core.process(samples);
    }

    /// Clear all audio state (work area, resampler history) while keeping
    /// the current parameters.
    pub fn reset(&mut self) {
        self.core.reset();
    }
}

impl Default for EffectInstance {
    fn default() -> Self {
        Self::new()
    }
}
