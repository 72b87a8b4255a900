use super::ClassifierError;
use std::path::Path;

/// Ordered class names; position `i` names the network's `i`-th logit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCatalog {
    labels: Vec<String>,
}

impl LabelCatalog {
    pub fn new(labels: Vec<String>) -> Result<Self, ClassifierError> {
        if labels.is_empty() {
            return Err(ClassifierError::InvalidLabels(
                "label descriptor contains no classes".to_string(),
            ));
        }
        if let Some(pos) = labels.iter().position(|l| l.trim().is_empty()) {
            return Err(ClassifierError::InvalidLabels(format!(
                "label at index {} is blank",
                pos
            )));
        }
        Ok(Self { labels })
    }

    /// Read a descriptor file. `.txt` files hold one label per line; anything
    /// else is parsed as a JSON array of strings.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::InvalidLabels(format!("failed to read {}: {}", path.display(), e))
        })?;

        let is_text = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));

        let labels = if is_text {
            raw.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            serde_json::from_str::<Vec<String>>(&raw).map_err(|e| {
                ClassifierError::InvalidLabels(format!(
                    "{} is not a JSON array of strings: {}",
                    path.display(),
                    e
                ))
            })?
        };

        Self::new(labels)
    }

    /// Number of classes; the network head must have this many outputs.
    pub fn class_count(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_json_descriptor_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class_names.json");
        std::fs::write(&path, r#"["cataract","glaucoma","normal"]"#).unwrap();

        let catalog = LabelCatalog::load(&path).unwrap();
        assert_eq!(catalog.class_count(), 3);
        assert_eq!(catalog.get(0), Some("cataract"));
        assert_eq!(catalog.get(2), Some("normal"));
        assert_eq!(catalog.get(3), None);
    }

    #[test]
    fn loads_text_descriptor_skipping_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "cataract\n\n diabetic_retinopathy \nnormal\n").unwrap();

        let catalog = LabelCatalog::load(&path).unwrap();
        assert_eq!(catalog.class_count(), 3);
        assert_eq!(catalog.get(0), Some("cataract"));
        assert_eq!(catalog.get(1), Some("diabetic_retinopathy"));
        assert_eq!(catalog.get(2), Some("normal"));
    }

    #[test]
    fn rejects_non_array_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class_names.json");
        std::fs::write(&path, r#"{"0":"cataract"}"#).unwrap();

        assert!(matches!(
            LabelCatalog::load(&path),
            Err(ClassifierError::InvalidLabels(_))
        ));
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(LabelCatalog::new(vec![]).is_err());
        assert!(LabelCatalog::new(vec!["ok".into(), " ".into()]).is_err());
    }
}
