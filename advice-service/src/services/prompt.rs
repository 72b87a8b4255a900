//! Prompt template for the advice model.

use crate::services::classifier::ClassificationResult;

/// Section headers the model is asked to answer under, in order.
pub const SECTION_HEADERS: [&str; 4] = [
    "### Key Suggestions for Self-Care",
    "### Lifestyle Modifications",
    "### When to Seek Medical Attention",
    "### Warnings & Precautions",
];

/// Build the prompt for one request.
///
/// The query is embedded verbatim. The classification label goes on the
/// leading `eye_disease:` line, `N/A` when no eye image was classified.
pub fn compose(classification: &ClassificationResult, query: &str) -> String {
    let [suggestions, lifestyle, seek_attention, warnings] = SECTION_HEADERS;

    format!(
        "eye_disease: {classification}\n\
         \n\
         Based on this query: {query}\n\
         \n\
         Provide medical advice in this exact format:\n\
         \n\
         {suggestions}\n\
         - Stay hydrated with warm fluids\n\
         - Use honey for cough (adults and children >1 year)\n\
         \n\
         {lifestyle}\n\
         - Use a humidifier in bedroom\n\
         - Avoid irritants and allergens\n\
         \n\
         {seek_attention}\n\
         - If symptoms worsen or persist >7 days\n\
         - If experiencing severe symptoms\n\
         \n\
         {warnings}\n\
         - Note about OTC medication safety\n\
         - When to consult healthcare provider\n\
         \n\
         Keep responses evidence-based and practical.\n\
         Use proper Markdown line breaks between sections.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_applicable_renders_na_on_first_line() {
        let prompt = compose(&ClassificationResult::NotApplicable, "I have a cough");
        assert_eq!(prompt.lines().next(), Some("eye_disease: N/A"));
    }

    #[test]
    fn label_renders_on_first_line() {
        let prompt = compose(&ClassificationResult::Label("glaucoma".into()), "blurry vision");
        assert_eq!(prompt.lines().next(), Some("eye_disease: glaucoma"));
    }

    #[test]
    fn query_is_embedded_verbatim() {
        let query = "pain <b>here</b> & {braces}\nsecond line";
        let prompt = compose(&ClassificationResult::NotApplicable, query);
        assert!(prompt.contains(&format!("Based on this query: {}", query)));
    }

    #[test]
    fn headers_appear_once_in_order() {
        let prompt = compose(&ClassificationResult::Label("cataract".into()), "dry eyes");
        let mut last = 0;
        for header in SECTION_HEADERS {
            assert_eq!(prompt.matches(header).count(), 1, "{header}");
            let at = prompt.find(header).unwrap();
            assert!(at > last);
            last = at;
        }
    }

    #[test]
    fn composition_is_deterministic() {
        let a = compose(&ClassificationResult::NotApplicable, "headache");
        let b = compose(&ClassificationResult::NotApplicable, "headache");
        assert_eq!(a, b);
    }

    #[test]
    fn overlong_query_is_not_truncated() {
        let query = "a".repeat(100_000);
        let prompt = compose(&ClassificationResult::NotApplicable, &query);
        assert!(prompt.contains(&query));
    }
}
