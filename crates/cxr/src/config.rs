//! Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cxr_analysis::Threshold;
use cxr_core::INPUT_SIZE;
use cxr_models::TargetLayer;
use cxr_transforms::{PreprocessorConfig, ResizeFilter};

use crate::error::{PipelineError, Result};

/// Settings for one inference service.
///
/// Blend weights, map inversion and the colormap are fixed and not part of
/// the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Default decision threshold.
    pub threshold: Threshold,
    /// Side length of the square network input.
    pub image_size: usize,
    /// Resize filter for the network input.
    pub filter: ResizeFilter,
    /// Layer observed by the saliency engine.
    pub target_layer: TargetLayer,
    /// Compute device name.
    pub device: String,
    /// Checkpoint location (without extension).
    pub model_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: Threshold::DEFAULT,
            image_size: INPUT_SIZE,
            filter: ResizeFilter::Bilinear,
            target_layer: TargetLayer::FinalNorm,
            device: "cpu".to_string(),
            model_path: None,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Parse a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        if config.image_size == 0 {
            return Err(PipelineError::Config("image_size must be positive".to_string()));
        }
        Ok(config)
    }

    /// Serialise as pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Preprocessor settings derived from this config.
    pub fn preprocessor_config(&self) -> PreprocessorConfig {
        PreprocessorConfig {
            size: self.image_size,
            filter: self.filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.threshold.value(), 0.5);
        assert_eq!(config.image_size, 224);
        assert_eq!(config.target_layer, TargetLayer::FinalNorm);
        assert_eq!(config.device, "cpu");
    }

    #[test]
    fn test_partial_json() {
        let config =
            PipelineConfig::from_json(r#"{"threshold": 0.3, "target_layer": "denseblock3"}"#)
                .unwrap();
        assert_eq!(config.threshold.value(), 0.3);
        assert_eq!(config.target_layer, TargetLayer::DenseBlock(3));
        assert_eq!(config.image_size, 224);
    }

    #[test]
    fn test_rejects_bad_threshold() {
        assert!(PipelineConfig::from_json(r#"{"threshold": 1.5}"#).is_err());
        assert!(PipelineConfig::from_json(r#"{"image_size": 0}"#).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = PipelineConfig {
            model_path: Some(PathBuf::from("models/densenet121")),
            ..Default::default()
        };
        let json = config.to_json_pretty().unwrap();
        assert!(json.contains("\"norm5\""));
        assert_eq!(PipelineConfig::from_json(&json).unwrap(), config);
    }
}
