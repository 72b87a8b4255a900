//! Mock provider for local development and tests.

use super::{FinishReason, ProviderError, ProviderResponse, TextProvider};
use crate::services::prompt::SECTION_HEADERS;
use async_trait::async_trait;

/// Answers every prompt with a fixed advice document under the four section
/// headers, preceded by a reasoning block the sanitizer strips.
#[derive(Debug, Default)]
pub struct MockTextProvider;

impl MockTextProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(&self, prompt: &str) -> Result<ProviderResponse, ProviderError> {
        let [suggestions, lifestyle, seek_attention, warnings] = SECTION_HEADERS;
        let text = format!(
            "<think>\nMock reasoning.\n</think>\n\
             {suggestions}\n- Rest and drink plenty of fluids\n\n\
             {lifestyle}\n- Keep a regular sleep schedule\n\n\
             {seek_attention}\n- If symptoms worsen or persist beyond a week\n\n\
             {warnings}\n- This is a mock response, not medical advice"
        );

        Ok(ProviderResponse {
            text,
            input_tokens: prompt.len() as i32 / 4,
            output_tokens: 40,
            finish_reason: FinishReason::Complete,
        })
    }

    fn model(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sanitizer::sanitize;

    #[tokio::test]
    async fn mock_answers_with_every_section() {
        let response = MockTextProvider::new().generate("cough").await.unwrap();
        for header in SECTION_HEADERS {
            assert!(response.text.contains(header));
        }
    }

    #[tokio::test]
    async fn reasoning_block_does_not_survive_sanitizing() {
        let response = MockTextProvider::new().generate("cough").await.unwrap();
        let advice = sanitize(&response.text);
        assert!(advice.starts_with("Mock reasoning.\n### Key Suggestions for Self-Care"));
        assert!(!advice.contains("think>"));
    }
}
