use serde::{Deserialize, Serialize};
use validator::Validate;

/// JSON body accepted by `POST /predict` (query only, no attachments).
#[derive(Debug, Deserialize, Validate)]
pub struct PredictRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub status: String,
    pub response: String,
}

impl PredictResponse {
    pub fn success(response: String) -> Self {
        Self {
            status: "success".to_string(),
            response,
        }
    }
}
