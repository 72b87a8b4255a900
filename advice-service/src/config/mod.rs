use secrecy::Secret;
use service_core::config::{self as core_config, get_env, get_optional_env, is_prod};
use service_core::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Model identifier the advice prompt is tuned for.
pub const DEFAULT_GENERATION_MODEL: &str = "Intelligent-Internet/II-Medical-8B-1706";

/// OpenAI-compatible chat completions base routed through Hugging Face.
pub const DEFAULT_GENERATION_BASE_URL: &str = "https://router.huggingface.co/featherless-ai/v1";

const DEFAULT_IMAGE_SIZE: usize = 224;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AdviceConfig {
    pub common: core_config::Config,
    pub storage: StorageConfig,
    pub classifier: ClassifierConfig,
    pub generation: GenerationConfig,
    pub cors: CorsConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    /// Request body ceiling for `/predict`.
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub weights_path: PathBuf,
    pub labels_path: PathBuf,
    pub image_size: usize,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub provider: GenerationBackend,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<Arc<Secret<String>>>,
    /// `None` means requests to the endpoint never time out.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationBackend {
    HuggingFace,
    Mock,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl AdviceConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;
        let is_prod = is_prod();

        let provider: GenerationBackend = get_env("GENERATION_PROVIDER", Some("huggingface"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let api_key = get_optional_env("HF_API_KEY").map(|key| Arc::new(Secret::new(key)));
        if provider == GenerationBackend::HuggingFace && api_key.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "HF_API_KEY is required when GENERATION_PROVIDER is huggingface"
            )));
        }

        let image_size = get_env(
            "MODEL_IMAGE_SIZE",
            Some(&DEFAULT_IMAGE_SIZE.to_string()),
            is_prod,
        )?
        .parse::<usize>()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid MODEL_IMAGE_SIZE: {}", e)))?;

        let max_upload_bytes = get_env(
            "UPLOAD_MAX_BYTES",
            Some(&DEFAULT_MAX_UPLOAD_BYTES.to_string()),
            is_prod,
        )?
        .parse::<usize>()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid UPLOAD_MAX_BYTES: {}", e)))?;

        let timeout = get_optional_env("GENERATION_TIMEOUT_SECS")
            .map(|secs| {
                secs.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Invalid GENERATION_TIMEOUT_SECS: {}", e))
                })
            })
            .transpose()?;

        Ok(AdviceConfig {
            common: common_config,
            storage: StorageConfig {
                upload_dir: get_env("UPLOAD_DIR", Some("uploads"), is_prod)?.into(),
                max_upload_bytes,
            },
            classifier: ClassifierConfig {
                weights_path: get_env(
                    "MODEL_WEIGHTS_PATH",
                    Some("models/eye_disease_model.safetensors"),
                    is_prod,
                )?
                .into(),
                labels_path: get_env("MODEL_LABELS_PATH", Some("models/class_names.json"), is_prod)?
                    .into(),
                image_size,
            },
            generation: GenerationConfig {
                provider,
                base_url: get_env(
                    "GENERATION_BASE_URL",
                    Some(DEFAULT_GENERATION_BASE_URL),
                    is_prod,
                )?,
                model: get_env("GENERATION_MODEL", Some(DEFAULT_GENERATION_MODEL), is_prod)?,
                api_key,
                timeout,
            },
            cors: CorsConfig {
                allowed_origins: parse_origins(&get_env("CORS_ALLOWED_ORIGINS", Some("*"), is_prod)?),
            },
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
        })
    }
}

impl std::str::FromStr for GenerationBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(GenerationBackend::HuggingFace),
            "mock" => Ok(GenerationBackend::Mock),
            _ => Err(format!("Invalid generation provider: {}", s)),
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty() && *o != "*")
        .map(str::to_string)
        .collect()
}
