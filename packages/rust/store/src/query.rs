//! Typed equality queries over paper profiles.

use std::fmt;
use std::str::FromStr;

use papertrail_shared::{PaperProfile, PaperTrailError, Result};

/// A queryable profile attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaperField {
    Pk,
    Title,
    Abstract,
}

impl PaperField {
    /// The attribute's value on `profile`.
    pub fn value<'a>(&self, profile: &'a PaperProfile) -> Option<&'a str> {
        match self {
            Self::Pk => Some(profile.pk.as_str()),
            Self::Title => profile.title.as_deref(),
            Self::Abstract => profile.abstract_text.as_deref(),
        }
    }
}

impl FromStr for PaperField {
    type Err = PaperTrailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pk" | "id" => Ok(Self::Pk),
            "title" => Ok(Self::Title),
            "abstract" => Ok(Self::Abstract),
            other => Err(PaperTrailError::validation(format!(
                "unknown paper field {other:?} (expected pk, title or abstract)"
            ))),
        }
    }
}

impl fmt::Display for PaperField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pk => "pk",
            Self::Title => "title",
            Self::Abstract => "abstract",
        })
    }
}

/// Conjunction of field equality conditions. The empty query matches everything.
///
/// A condition value of `None` matches profiles where the field is unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperQuery {
    conditions: Vec<(PaperField, Option<String>)>,
}

impl PaperQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn with(mut self, field: PaperField, value: Option<String>) -> Self {
        self.conditions.push((field, value));
        self
    }

    pub fn pk(self, pk: impl Into<String>) -> Self {
        self.with(PaperField::Pk, Some(pk.into()))
    }

    pub fn title(self, title: impl Into<String>) -> Self {
        self.with(PaperField::Title, Some(title.into()))
    }

    pub fn abstract_text(self, text: impl Into<String>) -> Self {
        self.with(PaperField::Abstract, Some(text.into()))
    }

    /// Parse `field=value`. An empty value means "unset".
    pub fn parse_condition(condition: &str) -> Result<(PaperField, Option<String>)> {
        let (field, value) = condition.split_once('=').ok_or_else(|| {
            PaperTrailError::validation(format!("expected field=value, got {condition:?}"))
        })?;
        let field = field.parse()?;
        let value = (!value.is_empty()).then(|| value.to_string());
        Ok((field, value))
    }

    /// Build a query from `field=value` strings.
    pub fn parse<S: AsRef<str>>(conditions: &[S]) -> Result<Self> {
        conditions.iter().try_fold(Self::new(), |query, c| {
            let (field, value) = Self::parse_condition(c.as_ref())?;
            Ok(query.with(field, value))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(PaperField, Option<String>)] {
        &self.conditions
    }

    /// Whether every condition holds for `profile`.
    pub fn matches(&self, profile: &PaperProfile) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| field.value(profile) == expected.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> PaperProfile {
        PaperProfile::with_pk("p1", Some("A".into()), None)
    }

    #[test]
    fn field_names_parse() {
        assert_eq!("pk".parse::<PaperField>().unwrap(), PaperField::Pk);
        assert_eq!("ID".parse::<PaperField>().unwrap(), PaperField::Pk);
        assert_eq!("abstract".parse::<PaperField>().unwrap(), PaperField::Abstract);
        assert!("author".parse::<PaperField>().is_err());
        assert_eq!(PaperField::Title.to_string(), "title");
    }

    #[test]
    fn conditions_parse() {
        assert_eq!(
            PaperQuery::parse_condition("title=GNNs = Graphs").unwrap(),
            (PaperField::Title, Some("GNNs = Graphs".into()))
        );
        assert_eq!(
            PaperQuery::parse_condition("abstract=").unwrap(),
            (PaperField::Abstract, None)
        );
        assert!(PaperQuery::parse_condition("title").is_err());
        assert!(PaperQuery::parse(&["title=A", "venue=B"]).is_err());
    }

    #[test]
    fn matching_is_conjunctive() {
        let p = profile();
        assert!(PaperQuery::new().matches(&p));
        assert!(PaperQuery::new().title("A").matches(&p));
        assert!(PaperQuery::new().title("A").pk("p1").matches(&p));
        assert!(!PaperQuery::new().title("A").pk("p2").matches(&p));
        assert!(PaperQuery::new().with(PaperField::Abstract, None).matches(&p));
        assert!(!PaperQuery::new().abstract_text("x").matches(&p));
    }
}
