//! Classifier checkpoint store.
//!
//! Weights are saved with Burn's record system as named MessagePack
//! (`*.mpk`, full precision). A JSON sidecar with the same stem holds a
//! [`CheckpointMetadata`] describing the architecture so that non-default
//! backbones can be rebuilt before the record is applied.
//!
//! # Example
//!
//! ```rust,ignore
//! use cxr_models::{load_weights, save_weights, ChestXrayClassifierConfig};
//!
//! let config = ChestXrayClassifierConfig::default();
//! let model = config.init::<NdArray>(&device);
//! save_weights(&model, &config, "weights/densenet121")?;
//!
//! let (loaded, config) = load_weights::<NdArray>("weights/densenet121", &device)?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use burn::module::{Module, ModuleVisitor, ParamId};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use serde::{Deserialize, Serialize};

use cxr_core::CLASS_NAMES;

use crate::classifier::{ChestXrayClassifier, ChestXrayClassifierConfig};

/// Architecture name written to checkpoint metadata.
pub const ARCH_NAME: &str = "DenseNet121MultiLabel";

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// No record file at the given location.
    #[error("Model file not found at {}", .0.display())]
    ModelNotFound(PathBuf),

    /// The stored parameters do not match the expected architecture.
    #[error("Model checkpoint is corrupt: {0}")]
    ModelCorrupt(String),

    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),
}

/// Model checkpoint metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Model architecture name.
    pub arch: String,
    /// Classifier configuration as JSON.
    pub config_json: String,
    /// Output labels, index-aligned with the model outputs.
    pub class_names: Vec<String>,
    /// Additional metadata.
    pub extra: HashMap<String, String>,
}

impl CheckpointMetadata {
    /// Create new metadata for a model.
    pub fn new(arch: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            config_json: String::new(),
            class_names: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            extra: HashMap::new(),
        }
    }

    /// Set the config JSON.
    #[must_use]
    pub fn with_config<C: Serialize>(mut self, config: &C) -> Self {
        self.config_json = serde_json::to_string(config).unwrap_or_default();
        self
    }

    /// Add extra metadata.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Parse the stored classifier config.
    pub fn classifier_config(&self) -> Result<ChestXrayClassifierConfig> {
        if self.config_json.is_empty() {
            return Ok(ChestXrayClassifierConfig::default());
        }
        serde_json::from_str(&self.config_json)
            .map_err(|e| CheckpointError::ModelCorrupt(format!("invalid config in metadata: {}", e)))
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| CheckpointError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CheckpointError::ModelCorrupt(format!("unreadable metadata: {}", e)))?;
        serde_json::from_str(&json)
            .map_err(|e| CheckpointError::ModelCorrupt(format!("invalid metadata: {}", e)))
    }
}

/// Path of the record file for a checkpoint path (extension `mpk`).
pub fn record_path(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().with_extension("mpk")
}

/// Path of the metadata sidecar for a checkpoint path (extension `json`).
pub fn metadata_path(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().with_extension("json")
}

/// Save a classifier and its metadata sidecar.
pub fn save_weights<B: Backend>(
    model: &ChestXrayClassifier<B>,
    config: &ChestXrayClassifierConfig,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Save(e.to_string()))?;
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(model.clone().into_record(), record_path(path))
        .map_err(|e| CheckpointError::Save(e.to_string()))?;

    CheckpointMetadata::new(ARCH_NAME)
        .with_config(config)
        .save(metadata_path(path))?;

    tracing::info!("Saved checkpoint to {}", record_path(path).display());
    Ok(())
}

/// Load a classifier, taking its architecture from the metadata sidecar.
///
/// Without a sidecar the default DenseNet-121 configuration is assumed.
///
/// # Errors
///
/// - [`CheckpointError::ModelNotFound`] if the record file is absent
/// - [`CheckpointError::ModelCorrupt`] if the record or metadata cannot be
///   decoded, or any parameter shape differs from the architecture
pub fn load_weights<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(ChestXrayClassifier<B>, ChestXrayClassifierConfig)> {
    let path = path.as_ref();
    let record_file = record_path(path);
    if !record_file.is_file() {
        return Err(CheckpointError::ModelNotFound(record_file));
    }

    let sidecar = metadata_path(path);
    let config = if sidecar.is_file() {
        let metadata = CheckpointMetadata::load(&sidecar)?;
        check_vocabulary(&metadata)?;
        metadata.classifier_config()?
    } else {
        tracing::debug!("No metadata at {}, assuming DenseNet-121", sidecar.display());
        ChestXrayClassifierConfig::default()
    };

    let model = load_weights_with_config(path, &config, device)?;
    Ok((model, config))
}

/// Load a classifier with an explicit architecture.
pub fn load_weights_with_config<B: Backend>(
    path: impl AsRef<Path>,
    config: &ChestXrayClassifierConfig,
    device: &B::Device,
) -> Result<ChestXrayClassifier<B>> {
    let record_file = record_path(path);
    if !record_file.is_file() {
        return Err(CheckpointError::ModelNotFound(record_file));
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let record = recorder
        .load(record_file.clone(), device)
        .map_err(|e| CheckpointError::ModelCorrupt(e.to_string()))?;

    let expected = config.init::<B>(device);
    let expected_shapes = ParamShapes::collect(&expected);
    let model = expected.load_record(record);
    let loaded_shapes = ParamShapes::collect(&model);

    if expected_shapes.len() != loaded_shapes.len() {
        return Err(CheckpointError::ModelCorrupt(format!(
            "expected {} parameter tensors, found {}",
            expected_shapes.len(),
            loaded_shapes.len()
        )));
    }
    if let Some((i, (want, got))) = expected_shapes
        .iter()
        .zip(&loaded_shapes)
        .enumerate()
        .find(|(_, (want, got))| want != got)
    {
        return Err(CheckpointError::ModelCorrupt(format!(
            "parameter #{} has shape {:?}, architecture expects {:?}",
            i, got, want
        )));
    }

    tracing::info!(
        "Model loaded from {} ({} parameter tensors)",
        record_file.display(),
        loaded_shapes.len()
    );
    Ok(model)
}

fn check_vocabulary(metadata: &CheckpointMetadata) -> Result<()> {
    if metadata.class_names.iter().map(String::as_str).ne(CLASS_NAMES.iter().copied()) {
        return Err(CheckpointError::ModelCorrupt(format!(
            "checkpoint labels {:?} do not match the class vocabulary",
            metadata.class_names
        )));
    }
    Ok(())
}

/// Collects float parameter shapes in visiting order.
#[derive(Default)]
struct ParamShapes {
    shapes: Vec<Vec<usize>>,
}

impl ParamShapes {
    fn collect<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<usize>> {
        let mut visitor = Self::default();
        module.visit(&mut visitor);
        visitor.shapes
    }
}

impl<B: Backend> ModuleVisitor<B> for ParamShapes {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.shapes.push(tensor.dims().to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::densenet::DenseNetConfig;
    use cxr_core::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> ChestXrayClassifierConfig {
        ChestXrayClassifierConfig::new(DenseNetConfig::new(4, vec![1, 1], 8))
    }

    #[test]
    fn test_checkpoint_metadata() {
        let meta = CheckpointMetadata::new(ARCH_NAME)
            .with_config(&tiny_config())
            .with_extra("source", "unit-test");

        assert_eq!(meta.arch, ARCH_NAME);
        assert_eq!(meta.class_names.len(), 14);
        assert_eq!(meta.classifier_config().unwrap(), tiny_config());
        assert_eq!(meta.extra.get("source"), Some(&"unit-test".to_string()));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        let device = Default::default();

        let model = tiny_config().init::<TestBackend>(&device);
        save_weights(&model, &tiny_config(), &path).unwrap();
        assert!(dir.path().join("model.mpk").is_file());
        assert!(dir.path().join("model.json").is_file());

        let (loaded, config) = load_weights::<TestBackend>(&path, &device).unwrap();
        assert_eq!(config, tiny_config());

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);
        let diff: f32 = (model.forward(x.clone()) - loaded.forward(x))
            .abs()
            .max()
            .into_scalar()
            .elem();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let result = load_weights::<TestBackend>(dir.path().join("absent"), &device);
        assert!(matches!(result, Err(CheckpointError::ModelNotFound(_))));
    }

    #[test]
    fn test_architecture_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        let device = Default::default();

        let model = tiny_config().init::<TestBackend>(&device);
        save_weights(&model, &tiny_config(), &path).unwrap();

        let wider = ChestXrayClassifierConfig::new(DenseNetConfig::new(6, vec![1, 1], 8));
        let result = load_weights_with_config::<TestBackend>(&path, &wider, &device);
        assert!(matches!(result, Err(CheckpointError::ModelCorrupt(_))));
    }

    #[test]
    fn test_garbage_record_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        std::fs::write(dir.path().join("model.mpk"), b"definitely not msgpack").unwrap();

        let device = Default::default();
        let result = load_weights_with_config::<TestBackend>(&path, &tiny_config(), &device);
        assert!(matches!(result, Err(CheckpointError::ModelCorrupt(_))));
    }

    #[test]
    fn test_foreign_vocabulary_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        let device = Default::default();

        let model = tiny_config().init::<TestBackend>(&device);
        save_weights(&model, &tiny_config(), &path).unwrap();

        let mut meta = CheckpointMetadata::load(metadata_path(&path)).unwrap();
        meta.class_names.reverse();
        meta.save(metadata_path(&path)).unwrap();

        let result = load_weights::<TestBackend>(&path, &device);
        assert!(matches!(result, Err(CheckpointError::ModelCorrupt(_))));
    }
}
