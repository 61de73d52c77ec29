use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{DEFAULT_CANVAS_SIZE, DEFAULT_FILL_COLOR};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("canvas size must be greater than zero")]
    ZeroCanvasSize,
    #[error("inference permits must be greater than zero")]
    ZeroInferencePermits,
    #[error("confidence must be within 0.0-1.0, got {0}")]
    ConfidenceOutOfRange(f64),
    #[error("invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),
}

/// Tunables for one extraction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Edge length of the canonical canvas.
    pub canvas_size: u32,
    /// Letterbox fill as RGB.
    pub fill_color: [u8; 3],
    /// How many detect calls may run at once. Keep at 1 unless the model
    /// runtime is known to be re-entrant.
    pub inference_permits: usize,
    /// Minimum face score accepted by the detector.
    pub min_confidence: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            canvas_size: DEFAULT_CANVAS_SIZE,
            fill_color: DEFAULT_FILL_COLOR,
            inference_permits: 1,
            min_confidence: 0.5,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_size == 0 {
            return Err(ConfigError::ZeroCanvasSize);
        }
        if self.inference_permits == 0 {
            return Err(ConfigError::ZeroInferencePermits);
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::ConfidenceOutOfRange(self.min_confidence));
        }
        Ok(())
    }
}

/// Parse `#rrggbb` (leading `#` optional) into RGB.
pub fn parse_hex_color(text: &str) -> Result<[u8; 3], ConfigError> {
    let hex = text.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidColor(text.to_string()));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ConfigError::InvalidColor(text.to_string()))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_is_valid() {
        let config = ExtractionConfig::default();
        assert_eq!(config.canvas_size, 256);
        assert_eq!(config.fill_color, [255, 255, 255]);
        assert_eq!(config.inference_permits, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_canvas_rejected() {
        let config = ExtractionConfig {
            canvas_size: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCanvasSize));
    }

    #[test]
    fn test_zero_permits_rejected() {
        let config = ExtractionConfig {
            inference_permits: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroInferencePermits));
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let config = ExtractionConfig {
            min_confidence: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConfidenceOutOfRange(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ExtractionConfig = serde_json::from_str(r#"{"canvas_size": 128}"#).unwrap();
        assert_eq!(config.canvas_size, 128);
        assert_eq!(config.fill_color, [255, 255, 255]);
        assert_eq!(config.inference_permits, 1);
    }

    #[test]
    fn test_json_roundtrip_preserves_fields() {
        let config = ExtractionConfig {
            canvas_size: 320,
            fill_color: [0, 0, 0],
            inference_permits: 2,
            min_confidence: 0.3,
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ExtractionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[rstest]
    #[case("#ffffff", [255, 255, 255])]
    #[case("000000", [0, 0, 0])]
    #[case("#1A2b3C", [0x1a, 0x2b, 0x3c])]
    fn test_parse_hex_color(#[case] text: &str, #[case] expected: [u8; 3]) {
        assert_eq!(parse_hex_color(text).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("#fff")]
    #[case("#gggggg")]
    #[case("#1234567")]
    fn test_parse_hex_color_rejects_invalid(#[case] text: &str) {
        assert!(matches!(
            parse_hex_color(text),
            Err(ConfigError::InvalidColor(_))
        ));
    }
}
