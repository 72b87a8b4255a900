use advice_service::config::{
    AdviceConfig, ClassifierConfig, CorsConfig, GenerationBackend, GenerationConfig, StorageConfig,
};
use advice_service::services::classifier::EyeNet;
use advice_service::services::init_metrics;
use advice_service::startup::Application;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use secrecy::Secret;
use serde_json::{json, Value};
use service_core::config::Config as CoreConfig;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_API_KEY: &str = "hf_test_key";
pub const TEST_IMAGE_SIZE: usize = 64;

/// Labels of the fixture classifier; its bias makes every image "cataract".
pub const FIXTURE_LABELS: [&str; 3] = ["cataract", "glaucoma", "normal"];

pub const ADVICE_COMPLETION: &str = "<think>\nThe user reports a cough.\n</think>\n\
### Key Suggestions for Self-Care\n- Rest and hydrate\n\n\
### Lifestyle Modifications\n- Avoid smoke\n\n\
### When to Seek Medical Attention\n- Fever above 39C\n\n\
### Warnings & Precautions\n- This is not a diagnosis";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub generation_server: MockServer,
    pub upload_dir: PathBuf,
    pub weights_path: PathBuf,
    pub labels_path: PathBuf,
    // Keeps the model and upload directories alive for the test.
    _dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        init_metrics();

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (weights_path, labels_path) = write_fixture_model(&dir);
        let upload_dir = dir.path().join("uploads");

        let generation_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(ADVICE_COMPLETION)))
            .mount(&generation_server)
            .await;

        let config = AdviceConfig {
            common: CoreConfig { port: 0 },
            storage: StorageConfig {
                upload_dir: upload_dir.clone(),
                max_upload_bytes: 8 * 1024 * 1024,
            },
            classifier: ClassifierConfig {
                weights_path: weights_path.clone(),
                labels_path: labels_path.clone(),
                image_size: TEST_IMAGE_SIZE,
            },
            generation: GenerationConfig {
                provider: GenerationBackend::HuggingFace,
                base_url: format!("{}/v1", generation_server.uri()),
                model: "Intelligent-Internet/II-Medical-8B-1706".to_string(),
                api_key: Some(Arc::new(Secret::new(TEST_API_KEY.to_string()))),
                timeout: None,
            },
            cors: CorsConfig {
                allowed_origins: Vec::new(),
            },
            otlp_endpoint: None,
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            generation_server,
            upload_dir,
            weights_path,
            labels_path,
            _dir: dir,
        }
    }

    pub async fn post_form(&self, form: reqwest::multipart::Form) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/predict", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Prompts the generation endpoint has received, in order.
    pub async fn received_prompts(&self) -> Vec<String> {
        self.generation_server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|request| {
                let body: Value = serde_json::from_slice(&request.body).ok()?;
                body["messages"][0]["content"].as_str().map(str::to_string)
            })
            .collect()
    }
}

/// Chat completions response body carrying `content`.
pub fn completion(content: &str) -> Value {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 100, "completion_tokens": 60 }
    })
}

pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_fn(48, 48, |x, y| Rgb([x as u8 * 4, y as u8 * 4, 120]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode PNG");
    out.into_inner()
}

/// Zero-weight network whose logits equal the classifier-head bias.
fn write_fixture_model(dir: &TempDir) -> (PathBuf, PathBuf) {
    let mut varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    EyeNet::new(vb, FIXTURE_LABELS.len()).expect("Failed to build network");

    for var in varmap.all_vars() {
        var.set(&var.zeros_like().unwrap()).unwrap();
    }
    varmap
        .set_one("fc.bias", Tensor::new(&[2.0f32, 1.0, 0.5], &Device::Cpu).unwrap())
        .unwrap();

    let weights_path = dir.path().join("eye_disease_model.safetensors");
    varmap.save(&weights_path).expect("Failed to save fixture weights");

    let labels_path = dir.path().join("class_names.json");
    std::fs::write(&labels_path, serde_json::to_string(&FIXTURE_LABELS).unwrap())
        .expect("Failed to write labels");

    (weights_path, labels_path)
}
