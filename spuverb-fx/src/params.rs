//! String-keyed parameter surface and JSON state snapshot/restore.
//!
//! Recognized keys: `preset` (0-5), `decay` / `mix` / `input_gain` /
//! `reverb_level` (decimal, clamped to 0-1), `preset_name` and
//! `preset_count` (read-only), and `state` (one JSON object carrying the
//! whole snapshot). Unknown keys read as not-found and write as no-ops;
//! malformed values leave the parameter untouched.

use serde::{Deserialize, Serialize};
use spuverb_dsp::PRESET_COUNT;
use tracing::trace;

use crate::instance::EffectInstance;

/// Full parameter snapshot; the persisted form of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub preset: usize,
    pub decay: f32,
    pub mix: f32,
    pub input_gain: f32,
    pub reverb_level: f32,
}

/// Partial state for writes: only the keys present in the JSON are applied.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
struct StatePatch {
    preset: Option<i64>,
    decay: Option<f32>,
    mix: Option<f32>,
    input_gain: Option<f32>,
    reverb_level: Option<f32>,
}

impl EffectInstance {
    /// Snapshot the current parameters.
    pub fn state(&self) -> State {
        State {
            preset: self.core.preset_index(),
            decay: self.core.decay(),
            mix: self.core.mix(),
            input_gain: self.core.input_gain(),
            reverb_level: self.core.reverb_level(),
        }
    }

    /// Write one parameter. Unknown keys and malformed values are ignored.
    pub fn set_param(&mut self, key: &str, value: &str) {
        trace!(key, value, "set_param");
        match key {
            "preset" => {
                if let Ok(index) = value.parse::<i64>() {
                    self.core.apply_preset(index.clamp(0, 5) as usize);
                }
            }
            "decay" => {
                if let Ok(v) = value.parse::<f32>() {
                    self.core.set_decay(v);
                }
            }
            "mix" => {
                if let Ok(v) = value.parse::<f32>() {
                    self.core.set_mix(v);
                }
            }
            "input_gain" => {
                if let Ok(v) = value.parse::<f32>() {
                    self.core.set_input_gain(v);
                }
            }
            "reverb_level" => {
                if let Ok(v) = value.parse::<f32>() {
                    self.core.set_reverb_level(v);
                }
            }
            "state" => {
                if let Ok(patch) = serde_json::from_str::<StatePatch>(value) {
                    self.apply_patch(patch);
                }
            }
            _ => {}
        }
    }

    /// Read one parameter; `None` means the key is not recognized.
    pub fn get_param(&self, key: &str) -> Option<String> {
        match key {
            "preset" => Some(self.core.preset_index().to_string()),
            "decay" => Some(self.core.decay().to_string()),
            "mix" => Some(self.core.mix().to_string()),
            "input_gain" => Some(self.core.input_gain().to_string()),
            "reverb_level" => Some(self.core.reverb_level().to_string()),
            "preset_name" => Some(self.core.preset_name().to_string()),
            "preset_count" => Some(PRESET_COUNT.to_string()),
            "state" => serde_json::to_string(&self.state()).ok(),
            _ => None,
        }
    }

    /// Apply the present subset of a state patch. The full preset re-scale
    /// (and work-area reset) only happens when the preset actually changes.
    fn apply_patch(&mut self, patch: StatePatch) {
        if let Some(index) = patch.preset {
            let index = index.clamp(0, 5) as usize;
            if index != self.core.preset_index() {
                self.core.apply_preset(index);
            }
        }
        if let Some(v) = patch.decay {
            self.core.set_decay(v);
        }
        if let Some(v) = patch.mix {
            self.core.set_mix(v);
        }
        if let Some(v) = patch.input_gain {
            self.core.set_input_gain(v);
        }
        if let Some(v) = patch.reverb_level {
            self.core.set_reverb_level(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_get_set_roundtrip() {
        let mut fx = EffectInstance::new();
        fx.set_param("decay", "0.25");
        fx.set_param("mix", "0.75");
        assert_eq!(fx.get_param("decay").as_deref(), Some("0.25"));
        assert_eq!(fx.get_param("mix").as_deref(), Some("0.75"));
    }

    #[test]
    fn test_values_are_clamped() {
        let mut fx = EffectInstance::new();
        fx.set_param("decay", "3.0");
        assert_eq!(fx.get_param("decay").as_deref(), Some("1"));
        fx.set_param("decay", "-1.0");
        assert_eq!(fx.get_param("decay").as_deref(), Some("0"));
        fx.set_param("preset", "42");
        assert_eq!(fx.get_param("preset").as_deref(), Some("5"));
        fx.set_param("preset", "-1");
        assert_eq!(fx.get_param("preset").as_deref(), Some("0"));
    }

    #[test]
    fn test_unknown_keys() {
        let mut fx = EffectInstance::new();
        fx.set_param("resonance", "0.5");
        assert_eq!(fx.get_param("resonance"), None);
    }

    #[test]
    fn test_malformed_values_leave_param_untouched() {
        let mut fx = EffectInstance::new();
        fx.set_param("decay", "0.4");
        fx.set_param("decay", "banana");
        assert_eq!(fx.get_param("decay").as_deref(), Some("0.4"));
    }

    #[test]
    fn test_readonly_keys() {
        let fx = EffectInstance::new();
        assert_eq!(fx.get_param("preset_name").as_deref(), Some("Hall"));
        assert_eq!(fx.get_param("preset_count").as_deref(), Some("6"));
    }

    #[test]
    fn test_preset_names_follow_selection() {
        let mut fx = EffectInstance::new();
        let names = [
            "Room",
            "Studio S",
            "Studio M",
            "Studio L",
            "Hall",
            "Space Echo",
        ];
        for (index, name) in names.iter().enumerate() {
            fx.set_param("preset", &index.to_string());
            assert_eq!(fx.get_param("preset_name").as_deref(), Some(*name));
        }
    }

    #[test]
    fn test_state_roundtrip() {
        let mut fx = EffectInstance::new();
        let wanted = State {
            preset: 2,
            decay: 0.6,
            mix: 0.1,
            input_gain: 0.9,
            reverb_level: 0.3,
        };
        fx.set_param("state", &serde_json::to_string(&wanted).unwrap());

        let json = fx.get_param("state").unwrap();
        let got: State = serde_json::from_str(&json).unwrap();
        assert_eq!(got, wanted);
    }

    #[test]
    fn test_state_applies_partial_patch() {
        let mut fx = EffectInstance::new();
        fx.set_param("state", r#"{"mix": 0.9}"#);
        assert_eq!(fx.get_param("mix").as_deref(), Some("0.9"));
        // everything else keeps its default
        assert_eq!(fx.get_param("preset").as_deref(), Some("4"));
        assert_eq!(fx.get_param("decay").as_deref(), Some("0.7"));
    }

    #[test]
    fn test_state_reapplies_preset_only_on_change() {
        let mut fx = EffectInstance::new();

        // warm the work area with some signal
        fx.set_param("mix", "1.0");
        let mut block = vec![8000i16; 4096];
        fx.process_block(&mut block);

        // writing the same preset index must not clear the tail
        fx.set_param("state", r#"{"preset": 4}"#);
        let mut tail = vec![0i16; 8192];
        fx.process_block(&mut tail);
        assert!(tail.iter().any(|&s| s != 0), "tail was wiped");

        // an actual change rebuilds the work area from silence; a short
        // flush lets the resampler history drain first
        fx.set_param("state", r#"{"preset": 0}"#);
        let mut flush = vec![0i16; 256];
        fx.process_block(&mut flush);
        let mut cleared = vec![0i16; 8192];
        fx.process_block(&mut cleared);
        assert!(cleared.iter().all(|&s| s == 0));
    }
}
