use crate::dtos::{PredictRequest, PredictResponse};
use crate::services::{
    AttachmentRole, InMemoryUpload, PipelineError, RawField, RawSubmission,
};
use crate::startup::AppState;
use axum::{
    extract::{multipart::MultipartError, FromRequest, Multipart, Request, State},
    http::header,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

/// Failure kinds become HTTP statuses here and nowhere else.
impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MissingQuery => AppError::BadRequest(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// `POST /predict`: multipart form (`query`, `pdf`, `xray`, `eyeImage`) or a
/// JSON body `{"query": ...}`.
pub async fn predict(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<PredictResponse>, AppError> {
    let submission = read_submission(&state, request).await;

    let advice = state.pipeline.run(submission).await?;

    tracing::info!(
        eye_disease = %advice.classification,
        response_len = advice.text.len(),
        "Advice returned"
    );

    Ok(Json(PredictResponse::success(advice.text)))
}

fn content_type(request: &Request) -> String {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Bodies that carry no readable form, including multipart streams that
/// break midway, become an empty submission. The pipeline then reports them
/// like any other request without a query.
async fn read_submission(state: &AppState, request: Request) -> RawSubmission {
    let content_type = content_type(&request);

    if content_type.starts_with("multipart/form-data") {
        let multipart = match Multipart::from_request(request, state).await {
            Ok(multipart) => multipart,
            Err(rejection) => {
                tracing::warn!(error = %rejection.body_text(), "Unreadable multipart body");
                return RawSubmission::default();
            }
        };
        return read_multipart(multipart).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Malformed multipart body");
            RawSubmission::default()
        });
    }

    if content_type.starts_with("application/json") {
        return match Json::<PredictRequest>::from_request(request, state).await {
            Ok(Json(body)) if body.validate().is_ok() => RawSubmission {
                query: body.query,
                fields: Vec::new(),
            },
            Ok(_) => RawSubmission::default(),
            Err(rejection) => {
                tracing::warn!(error = %rejection.body_text(), "Unreadable JSON body");
                RawSubmission::default()
            }
        };
    }

    tracing::warn!(content_type = %content_type, "Unsupported predict body");
    RawSubmission::default()
}

async fn read_multipart(mut multipart: Multipart) -> Result<RawSubmission, MultipartError> {
    let mut submission = RawSubmission::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "query" {
            submission.query = Some(field.text().await?);
            continue;
        }

        let Some(role) = AttachmentRole::from_field_name(&name) else {
            tracing::debug!(field = %name, "Ignoring unknown form field");
            continue;
        };

        let raw = match field.file_name().map(str::to_string) {
            Some(filename) => {
                let data = field.bytes().await?;
                RawField::File(Box::new(InMemoryUpload::new(filename, data.to_vec())))
            }
            None => RawField::Text(field.text().await?),
        };

        submission.fields.push((role, raw));
    }

    Ok(submission)
}
