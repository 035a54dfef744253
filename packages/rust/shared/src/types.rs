//! Core domain types for PaperTrail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// PaperProfile
// ---------------------------------------------------------------------------

/// The persisted record for one paper.
///
/// `pk` never changes after creation; `title` and `abstract_text` may be
/// unset independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperProfile {
    /// Globally unique identifier (UUID v7, or a canonical arXiv id for searched papers).
    pub pk: String,
    /// Paper title.
    #[serde(default)]
    pub title: Option<String>,
    /// Paper abstract.
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
}

impl PaperProfile {
    /// Create a profile with a freshly generated, time-sortable identifier.
    pub fn new(title: Option<String>, abstract_text: Option<String>) -> Self {
        Self::with_pk(generate_pk(), title, abstract_text)
    }

    /// Create a profile with an explicit identifier.
    pub fn with_pk(
        pk: impl Into<String>,
        title: Option<String>,
        abstract_text: Option<String>,
    ) -> Self {
        Self {
            pk: pk.into(),
            title,
            abstract_text,
        }
    }
}

/// Generate a new profile identifier.
pub fn generate_pk() -> String {
    Uuid::now_v7().to_string()
}

// ---------------------------------------------------------------------------
// SearchResult
// ---------------------------------------------------------------------------

/// A candidate record returned by the search API. Not persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Paper title (whitespace-collapsed).
    pub title: String,
    /// Canonical URL: the entry identifier as provided by the source.
    pub url: String,
    /// Abstract / summary text.
    pub summary: String,
    /// Primary category (e.g. `cs.AI`).
    pub category: String,
    /// First publication timestamp.
    pub published: DateTime<Utc>,
    /// Canonical identifier derived from the entry id (version stripped).
    pub identifier: String,
    /// Author names in listed order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    /// Direct PDF link, when the entry advertises one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl SearchResult {
    /// Map this result into a profile keyed by its canonical identifier.
    pub fn to_profile(&self) -> PaperProfile {
        PaperProfile::with_pk(
            self.identifier.clone(),
            non_empty(&self.title),
            non_empty(&self.summary),
        )
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// ReferenceRecord
// ---------------------------------------------------------------------------

/// One cited paper, as reported by the citation-graph API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Cited-paper identifier (arXiv id when known, otherwise the graph's own id).
    pub identifier: Option<String>,
    /// Cited-paper title.
    pub title: Option<String>,
    /// arXiv identifier, when the cited paper has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
}

// ---------------------------------------------------------------------------
// SectionMap
// ---------------------------------------------------------------------------

/// A single top-level section of a rendered paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Heading text, whitespace-collapsed (e.g. `1 Introduction`).
    pub heading: String,
    /// Body text of the section.
    pub body: String,
}

/// Ordered heading → body mapping, one entry per top-level section in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionMap {
    sections: Vec<Section>,
}

impl SectionMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a section. A repeated heading replaces the earlier body but keeps its position.
    pub fn insert(&mut self, heading: impl Into<String>, body: impl Into<String>) {
        let heading = heading.into();
        let body = body.into();
        match self.sections.iter_mut().find(|s| s.heading == heading) {
            Some(existing) => existing.body = body,
            None => self.sections.push(Section { heading, body }),
        }
    }

    /// Body text for an exact heading.
    pub fn get(&self, heading: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.heading == heading)
            .map(|s| s.body.as_str())
    }

    /// Whether the map holds a section with this heading.
    pub fn contains(&self, heading: &str) -> bool {
        self.get(heading).is_some()
    }

    /// First section whose heading satisfies `pred`.
    pub fn find(&self, pred: impl Fn(&str) -> bool) -> Option<&Section> {
        self.sections.iter().find(|s| pred(&s.heading))
    }

    /// Sections in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Headings in document order.
    pub fn headings(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.heading.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Consume the map, yielding its sections in document order.
    pub fn into_inner(self) -> Vec<Section> {
        self.sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_serializes_abstract_key() {
        let profile = PaperProfile::with_pk(
            "2403.05534",
            Some("GNNs for Databases".into()),
            Some("We study...".into()),
        );
        let json = serde_json::to_value(&profile).expect("serialize");
        assert_eq!(json["pk"], "2403.05534");
        assert_eq!(json["abstract"], "We study...");
        assert!(json.get("abstract_text").is_none());
    }

    #[test]
    fn generated_pks_are_unique() {
        let a = PaperProfile::new(None, None);
        let b = PaperProfile::new(None, None);
        assert_ne!(a.pk, b.pk);
    }

    #[test]
    fn search_result_maps_to_profile() {
        let result = SearchResult {
            title: "Paper 1".into(),
            url: "http://arxiv.org/abs/2401.00001v2".into(),
            summary: "  ".into(),
            category: "cs.AI".into(),
            published: Utc::now(),
            identifier: "2401.00001".into(),
            authors: vec![],
            pdf_url: None,
        };
        let profile = result.to_profile();
        assert_eq!(profile.pk, "2401.00001");
        assert_eq!(profile.title.as_deref(), Some("Paper 1"));
        assert!(profile.abstract_text.is_none());
    }

    #[test]
    fn section_map_keeps_document_order() {
        let mut map = SectionMap::new();
        map.insert("1 Introduction", "intro");
        map.insert("2 Related Work", "related");
        map.insert("1 Introduction", "intro, revised");

        assert_eq!(map.len(), 2);
        assert_eq!(map.headings(), vec!["1 Introduction", "2 Related Work"]);
        assert_eq!(map.get("1 Introduction"), Some("intro, revised"));
        assert!(map.find(|h| h.contains("Related")).is_some());
    }
}
