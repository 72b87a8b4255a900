pub mod classifier;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod sanitizer;
pub mod storage;

pub use classifier::{ClassificationResult, ClassifierHandle, ImageClassifier};
pub use ingest::{AttachmentIngestor, AttachmentRole, RawField, RawSubmission};
pub use metrics::{get_metrics, init_metrics};
pub use pipeline::{Advice, AdvicePipeline, PipelineError};
pub use storage::{InMemoryUpload, Upload, UploadDir};
