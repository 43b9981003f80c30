//! Vocabulary loading and hot-reload
//!
//! The vocabulary is loaded once at boot from a YAML file authored by the
//! offline tagging jobs. Reload swaps the whole structure atomically; a
//! malformed file leaves the previous vocabulary in place.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use podwise_core::Category;

use crate::TagError;

/// One canonical tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub category: Category,
    /// Alternate surface forms; disjoint across tags
    #[serde(default)]
    pub synonyms: BTreeSet<String>,
    /// Relative importance in [0,1]
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

/// On-disk vocabulary shape
#[derive(Debug, Deserialize)]
struct VocabularyFile {
    tags: Vec<Tag>,
}

/// Immutable, index-backed tag vocabulary
#[derive(Debug, Default)]
pub struct Vocabulary {
    tags: Vec<Tag>,
    /// Canonical lowercase name -> tag index
    name_index: HashMap<String, usize>,
    /// Lowercase synonym -> tag index
    synonym_index: HashMap<String, usize>,
    /// Category -> tag indices
    by_category: HashMap<Category, Vec<usize>>,
}

impl Vocabulary {
    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TagError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| TagError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_yaml(&raw)
    }

    /// Parse from YAML text
    pub fn from_yaml(raw: &str) -> Result<Self, TagError> {
        let file: VocabularyFile =
            serde_yaml::from_str(raw).map_err(|e| TagError::Malformed(e.to_string()))?;
        Self::from_tags(file.tags)
    }

    /// Build the indexes, rejecting duplicate names or synonyms
    pub fn from_tags(tags: Vec<Tag>) -> Result<Self, TagError> {
        let mut name_index = HashMap::new();
        let mut synonym_index: HashMap<String, usize> = HashMap::new();
        let mut by_category: HashMap<Category, Vec<usize>> = HashMap::new();

        for (idx, tag) in tags.iter().enumerate() {
            if !(0.0..=1.0).contains(&tag.weight) {
                return Err(TagError::InvalidWeight {
                    tag: tag.name.clone(),
                    weight: tag.weight,
                });
            }

            let name_key = tag.name.to_lowercase();
            if name_key.is_empty() {
                return Err(TagError::Malformed("empty tag name".to_string()));
            }
            if name_index.insert(name_key, idx).is_some() {
                return Err(TagError::DuplicateTag(tag.name.clone()));
            }

            for synonym in &tag.synonyms {
                let key = synonym.to_lowercase();
                if key.is_empty() {
                    return Err(TagError::Malformed(format!(
                        "empty synonym under tag '{}'",
                        tag.name
                    )));
                }
                if let Some(&prev) = synonym_index.get(&key) {
                    return Err(TagError::DuplicateSynonym {
                        synonym: synonym.clone(),
                        first: tags[prev].name.clone(),
                        second: tag.name.clone(),
                    });
                }
                synonym_index.insert(key, idx);
            }

            by_category.entry(tag.category).or_default().push(idx);
        }

        Ok(Self {
            tags,
            name_index,
            synonym_index,
            by_category,
        })
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tag(&self, idx: usize) -> &Tag {
        &self.tags[idx]
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Tag by canonical name, case-insensitive
    pub fn by_name(&self, name: &str) -> Option<&Tag> {
        self.name_index
            .get(&name.to_lowercase())
            .map(|&idx| &self.tags[idx])
    }

    /// Tag owning the given synonym, case-insensitive
    pub fn by_synonym(&self, synonym: &str) -> Option<&Tag> {
        self.synonym_index
            .get(&synonym.to_lowercase())
            .map(|&idx| &self.tags[idx])
    }

    /// Tags scoped to a category
    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &Tag> {
        self.by_category
            .get(&category)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.tags[idx])
    }

    pub(crate) fn name_index(&self) -> &HashMap<String, usize> {
        &self.name_index
    }

    pub(crate) fn synonym_index(&self) -> &HashMap<String, usize> {
        &self.synonym_index
    }
}

/// Atomic-swap handle shared across the process
///
/// Readers call `current()` and keep the returned `Arc` for the duration of a
/// request; a concurrent reload never blocks them.
pub struct VocabularyHandle {
    inner: ArcSwap<Vocabulary>,
}

impl VocabularyHandle {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            inner: ArcSwap::from_pointee(vocabulary),
        }
    }

    pub fn current(&self) -> Arc<Vocabulary> {
        self.inner.load_full()
    }

    /// Replace the vocabulary; the swap is atomic
    pub fn replace(&self, vocabulary: Vocabulary) {
        let size = vocabulary.len();
        self.inner.store(Arc::new(vocabulary));
        tracing::info!(tags = size, "Tag vocabulary swapped");
    }

    /// Reload from disk; the old vocabulary survives a bad file
    pub fn reload_from(&self, path: impl AsRef<Path>) -> Result<usize, TagError> {
        let fresh = Vocabulary::load(path)?;
        let size = fresh.len();
        self.replace(fresh);
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
tags:
  - name: investing
    category: business
    synonyms: ["投資", "理財", "stock market"]
    weight: 1.0
  - name: language-learning
    category: education
    synonyms: ["英文", "english learning"]
    weight: 0.9
  - name: daily-life
    category: other
"#
    }

    #[test]
    fn test_load_and_index() {
        let vocab = Vocabulary::from_yaml(sample_yaml()).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(
            vocab.by_name("Investing").unwrap().category,
            Category::Business
        );
        assert_eq!(vocab.by_synonym("投資").unwrap().name, "investing");
        assert_eq!(vocab.in_category(Category::Education).count(), 1);
    }

    #[test]
    fn test_duplicate_synonym_rejected() {
        let yaml = r#"
tags:
  - name: a
    category: business
    synonyms: ["shared"]
  - name: b
    category: education
    synonyms: ["shared"]
"#;
        let err = Vocabulary::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, TagError::DuplicateSynonym { .. }));
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let yaml = r#"
tags:
  - name: a
    category: business
  - name: A
    category: education
"#;
        assert!(matches!(
            Vocabulary::from_yaml(yaml),
            Err(TagError::DuplicateTag(_))
        ));
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let yaml = r#"
tags:
  - name: a
    category: business
    weight: 1.5
"#;
        assert!(matches!(
            Vocabulary::from_yaml(yaml),
            Err(TagError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn test_handle_swap_keeps_old_on_error() {
        let handle = VocabularyHandle::new(Vocabulary::from_yaml(sample_yaml()).unwrap());
        assert!(handle.reload_from("/nonexistent/tags.yaml").is_err());
        assert_eq!(handle.current().len(), 3);
    }
}
