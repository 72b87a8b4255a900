//! Application startup and lifecycle management.
//!
//! Wires the pipeline stages together from configuration, binds the HTTP
//! listener and serves the router until a shutdown signal arrives.

use crate::config::{AdviceConfig, CorsConfig, GenerationBackend};
use crate::handlers;
use crate::services::providers::huggingface::{HuggingFaceConfig, HuggingFaceTextProvider};
use crate::services::providers::mock::MockTextProvider;
use crate::services::providers::TextProvider;
use crate::services::{AdvicePipeline, AttachmentIngestor, ClassifierHandle, UploadDir};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AdviceConfig,
    pub pipeline: AdvicePipeline,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: AdviceConfig) -> Result<Self, AppError> {
        let uploads = UploadDir::new(config.storage.upload_dir.clone())
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to prepare upload directory {}: {}",
                    config.storage.upload_dir.display(),
                    e
                );
                e
            })?;

        let classifier = Arc::new(ClassifierHandle::new(config.classifier.clone()));
        warm_up(&classifier).await;

        let provider = build_provider(&config)?;
        tracing::info!(
            provider = ?config.generation.provider,
            model = %provider.model(),
            "Initialized text provider"
        );

        let pipeline = AdvicePipeline::new(AttachmentIngestor::new(uploads), classifier, provider);

        let state = AppState {
            config: config.clone(),
            pipeline,
        };

        // Bind HTTP listener (port 0 = random port for testing)
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Advice service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal is received.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Service shutdown complete");
        Ok(())
    }
}

/// Assemble routes and the middleware stack around them.
pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.storage.max_upload_bytes;
    let cors = cors_layer(&state.config.cors);

    let predict_route = Router::new()
        .route("/predict", post(handlers::predict))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .merge(predict_route)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(cors)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(config.allowed_origins.iter().filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(REQUEST_ID_HEADER)])
}

fn build_provider(config: &AdviceConfig) -> Result<Arc<dyn TextProvider>, AppError> {
    let generation = &config.generation;
    match generation.provider {
        GenerationBackend::Mock => {
            tracing::warn!("Using mock text provider - responses are canned");
            Ok(Arc::new(MockTextProvider::new()))
        }
        GenerationBackend::HuggingFace => {
            let api_key = generation.api_key.clone().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "HF_API_KEY is required when GENERATION_PROVIDER is huggingface"
                ))
            })?;
            let provider = HuggingFaceTextProvider::new(HuggingFaceConfig {
                base_url: generation.base_url.clone(),
                api_key,
                model: generation.model.clone(),
                timeout: generation.timeout,
            })
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
            Ok(Arc::new(provider))
        }
    }
}

/// Load the classifier before the listener opens. A failed load is logged
/// and retried by the first request that needs the model.
async fn warm_up(classifier: &ClassifierHandle) {
    if !classifier.artifacts_present() {
        tracing::warn!("Model artifacts missing - every /predict request will fail until restored");
        return;
    }

    match classifier.get().await {
        Ok(model) => tracing::info!(classes = model.catalog().class_count(), "Classifier loaded"),
        Err(e) => tracing::error!(error = %e, "Classifier warm-up failed"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
