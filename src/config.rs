use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunable editor settings. Missing fields fall back to their defaults when
/// deserializing, so older persisted configs keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Layer eraser diameter in screen pixels
    pub eraser_size: f32,
    /// Layer eraser softness, 0..=100
    pub eraser_softness: f32,
    /// Feather applied to freshly generated layers
    pub default_feather: f32,
    pub reveal_duration_ms: f64,
    /// Imports larger than this on either side are downscaled
    pub max_import_dimension: u32,
    /// Selections smaller than this on either side are discarded on release
    pub min_selection_size: f32,
    pub autosave_debounce_ms: f64,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_sensitivity: f32,
    /// How far outside the staged layer an eraser stroke may start
    pub layer_eraser_reach: f32,
    pub nudge_step: f32,
    pub nudge_step_large: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            eraser_size: 50.0,
            eraser_softness: 50.0,
            default_feather: 5.0,
            reveal_duration_ms: 1500.0,
            max_import_dimension: 3072,
            min_selection_size: 10.0,
            autosave_debounce_ms: 1500.0,
            min_zoom: 0.05,
            max_zoom: 10.0,
            zoom_sensitivity: 0.0005,
            layer_eraser_reach: 100.0,
            nudge_step: 1.0,
            nudge_step_large: 10.0,
        }
    }
}

impl EditorConfig {
    /// Parses a JSON config and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.eraser_softness) {
            return Err(ConfigError::Invalid(format!(
                "eraser_softness must be within 0..=100, got {}",
                self.eraser_softness
            )));
        }
        if self.eraser_size <= 0.0 {
            return Err(ConfigError::Invalid("eraser_size must be positive".into()));
        }
        if self.default_feather < 0.0 {
            return Err(ConfigError::Invalid("default_feather must not be negative".into()));
        }
        if self.min_zoom <= 0.0 || self.min_zoom > self.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "zoom limits out of order: {}..{}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.max_import_dimension == 0 {
            return Err(ConfigError::Invalid("max_import_dimension must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EditorConfig::from_json_str(r#"{ "eraser_size": 80.0 }"#).unwrap();
        assert_eq!(config.eraser_size, 80.0);
        assert_eq!(config.default_feather, 5.0);
        assert_eq!(config.max_import_dimension, 3072);
    }

    #[test]
    fn test_rejects_bad_softness() {
        let result = EditorConfig::from_json_str(r#"{ "eraser_softness": 150.0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            EditorConfig::from_json_str("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = EditorConfig::default();
        let json = config.to_json_string().unwrap();
        assert_eq!(EditorConfig::from_json_str(&json).unwrap(), config);
    }
}
