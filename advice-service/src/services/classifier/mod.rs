//! Eye-image classifier.
//!
//! The network and its label catalog are loaded once behind a
//! [`ClassifierHandle`] and shared read-only by every request.

pub mod labels;
pub mod network;
pub mod preprocess;

pub use labels::LabelCatalog;
pub use network::EyeNet;

use crate::config::ClassifierConfig;
use candle_core::{DType, Device, Module};
use candle_nn::VarBuilder;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Required model files are missing")]
    ArtifactsMissing { weights: PathBuf, labels: PathBuf },

    #[error("Invalid label descriptor: {0}")]
    InvalidLabels(String),

    #[error("Failed to load model weights from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: candle_core::Error,
    },

    #[error("Failed to decode eye image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Inference failed: {0}")]
    Inference(#[from] candle_core::Error),

    #[error("Classifier produced no logits")]
    EmptyOutput,

    #[error("Classifier produced only NaN logits")]
    NonFiniteOutput,

    #[error("Predicted class {index} is outside the {classes}-label catalog")]
    LabelOutOfRange { index: usize, classes: usize },

    #[error("Classifier task failed: {0}")]
    Task(String),
}

/// Outcome of the classification stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationResult {
    /// No eye image was supplied.
    NotApplicable,
    Label(String),
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationResult::NotApplicable => f.write_str("N/A"),
            ClassificationResult::Label(label) => f.write_str(label),
        }
    }
}

/// Fail unless both artifact files exist.
pub fn check_artifacts(weights: &Path, labels: &Path) -> Result<(), ClassifierError> {
    if weights.is_file() && labels.is_file() {
        Ok(())
    } else {
        Err(ClassifierError::ArtifactsMissing {
            weights: weights.to_path_buf(),
            labels: labels.to_path_buf(),
        })
    }
}

/// Index of the largest logit; ties go to the lowest index.
fn argmax(logits: &[f32]) -> Option<usize> {
    logits
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if v <= b || v.is_nan() => best,
            _ if v.is_nan() => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Map logits to a catalog label.
fn pick_label<'a>(logits: &[f32], catalog: &'a LabelCatalog) -> Result<&'a str, ClassifierError> {
    if logits.is_empty() {
        return Err(ClassifierError::EmptyOutput);
    }
    let index = argmax(logits).ok_or(ClassifierError::NonFiniteOutput)?;
    catalog.get(index).ok_or(ClassifierError::LabelOutOfRange {
        index,
        classes: catalog.class_count(),
    })
}

/// Loaded network plus its catalog.
pub struct ImageClassifier {
    model: EyeNet,
    catalog: LabelCatalog,
    device: Device,
    image_size: usize,
}

impl ImageClassifier {
    /// Load weights and labels. Weights are `.safetensors`, or a PyTorch
    /// state dict when the extension is `.pth`/`.pt`.
    pub fn load(weights: &Path, labels: &Path, image_size: usize) -> Result<Self, ClassifierError> {
        check_artifacts(weights, labels)?;

        let catalog = LabelCatalog::load(labels)?;
        let device = Device::cuda_if_available(0).map_err(|source| ClassifierError::Load {
            path: weights.to_path_buf(),
            source,
        })?;

        let vb = Self::var_builder(weights, &device).map_err(|source| ClassifierError::Load {
            path: weights.to_path_buf(),
            source,
        })?;

        // The head shape check happens here: a descriptor whose length does
        // not match `fc` fails to load.
        let model = EyeNet::new(vb, catalog.class_count()).map_err(|source| ClassifierError::Load {
            path: weights.to_path_buf(),
            source,
        })?;

        tracing::info!(
            weights = %weights.display(),
            classes = catalog.class_count(),
            device = ?device,
            image_size,
            "Eye classifier loaded"
        );

        Ok(Self {
            model,
            catalog,
            device,
            image_size,
        })
    }

    fn var_builder(weights: &Path, device: &Device) -> candle_core::Result<VarBuilder<'static>> {
        let is_pickle = weights
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "pth" | "pt"));

        if is_pickle {
            VarBuilder::from_pth(weights, DType::F32, device)
        } else {
            let buffer = std::fs::read(weights)?;
            VarBuilder::from_buffered_safetensors(buffer, DType::F32, device)
        }
    }

    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }

    /// Decode raw image bytes and classify them.
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<&str, ClassifierError> {
        let image = image::load_from_memory(bytes)?;
        self.classify(&image)
    }

    /// Single forward pass; returns the arg-max label with no threshold.
    pub fn classify(&self, image: &image::DynamicImage) -> Result<&str, ClassifierError> {
        let input = preprocess::image_to_tensor(image, self.image_size, &self.device)?;
        let logits = self
            .model
            .forward(&input)?
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?;

        pick_label(&logits, &self.catalog)
    }
}

/// Lazily initialised, shared classifier.
///
/// The first caller loads the model; concurrent callers wait on the same
/// initialisation and every later call reuses it.
pub struct ClassifierHandle {
    config: ClassifierConfig,
    cell: OnceCell<Arc<ImageClassifier>>,
}

impl ClassifierHandle {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    pub fn artifacts_present(&self) -> bool {
        self.ensure_artifacts().is_ok()
    }

    /// Checked on every request, so deleting an artifact takes effect even
    /// after the model is loaded.
    pub fn ensure_artifacts(&self) -> Result<(), ClassifierError> {
        check_artifacts(&self.config.weights_path, &self.config.labels_path)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> Result<Arc<ImageClassifier>, ClassifierError> {
        self.cell
            .get_or_try_init(|| async {
                let config = self.config.clone();
                tokio::task::spawn_blocking(move || {
                    ImageClassifier::load(
                        &config.weights_path,
                        &config.labels_path,
                        config.image_size,
                    )
                })
                .await
                .map_err(|e| ClassifierError::Task(e.to_string()))?
                .map(Arc::new)
            })
            .await
            .cloned()
    }

    /// Classify raw image bytes on the blocking pool.
    pub async fn classify(&self, bytes: Vec<u8>) -> Result<String, ClassifierError> {
        let classifier = self.get().await?;
        tokio::task::spawn_blocking(move || {
            classifier.classify_bytes(&bytes).map(str::to_string)
        })
        .await
        .map_err(|e| ClassifierError::Task(e.to_string()))?
    }
}
