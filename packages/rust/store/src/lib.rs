//! In-memory paper profile store with JSON file persistence.
//!
//! The [`PaperProfileStore`] keeps at most one [`PaperProfile`] per identifier.
//! Iteration and query results follow identifier order, so output is
//! reproducible for a fixed store state.
//!
//! The store does no locking of its own; concurrent users wrap it in a
//! `tokio::sync::RwLock` (see `papertrail-core`).

mod query;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use papertrail_shared::{PaperProfile, PaperTrailError, Result, generate_pk};

pub use query::{PaperField, PaperQuery};

// ---------------------------------------------------------------------------
// Update / ingest inputs
// ---------------------------------------------------------------------------

/// Partial update. `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
}

impl ProfileUpdate {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = Some(text.into());
        self
    }

    fn apply(self, profile: &mut PaperProfile) {
        if let Some(title) = self.title {
            profile.title = Some(title);
        }
        if let Some(abstract_text) = self.abstract_text {
            profile.abstract_text = Some(abstract_text);
        }
    }
}

/// One paper as handed to [`PaperProfileStore::ingest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawPaperRecord {
    /// Paper identifier. Records sharing a `pk` are merged into one profile.
    #[serde(default)]
    pub pk: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
}

/// What an ingestion did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// New profiles created.
    pub added: usize,
    /// Records folded into an existing profile.
    pub merged: usize,
}

impl IngestSummary {
    pub fn total(&self) -> usize {
        self.added + self.merged
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Keyed collection of paper profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperProfileStore {
    profiles: BTreeMap<String, PaperProfile>,
}

/// Persisted profile body; the map key is authoritative for `pk`.
#[derive(Deserialize)]
struct StoredProfile {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
}

impl PaperProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the profile at `profile.pk`. Returns the replaced profile.
    pub fn add(&mut self, profile: PaperProfile) -> Option<PaperProfile> {
        self.profiles.insert(profile.pk.clone(), profile)
    }

    /// Apply a partial update. Returns `false` (and changes nothing) for an unknown `pk`.
    pub fn update(&mut self, pk: &str, update: ProfileUpdate) -> bool {
        match self.profiles.get_mut(pk) {
            Some(profile) => {
                update.apply(profile);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, pk: &str) -> Option<&PaperProfile> {
        self.profiles.get(pk)
    }

    /// Remove a profile. Returns whether one was removed.
    pub fn delete(&mut self, pk: &str) -> bool {
        self.profiles.remove(pk).is_some()
    }

    /// Profiles matching every condition of `query`, in identifier order.
    pub fn query(&self, query: &PaperQuery) -> Vec<&PaperProfile> {
        self.profiles.values().filter(|p| query.matches(p)).collect()
    }

    /// Number of profiles matching `query`.
    pub fn count(&self, query: &PaperQuery) -> usize {
        self.profiles.values().filter(|p| query.matches(p)).count()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// All profiles in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &PaperProfile> {
        self.profiles.values()
    }

    /// Fold grouped raw records into the store.
    ///
    /// Records are keyed by paper identifier, not by group: records that share
    /// a `pk` (with each other or with a stored profile) merge into a single
    /// profile, later non-empty fields winning. Records without a `pk` each
    /// become a new profile.
    pub fn ingest(&mut self, groups: BTreeMap<String, Vec<RawPaperRecord>>) -> IngestSummary {
        let mut summary = IngestSummary::default();

        for (group, records) in groups {
            debug!(group = %group, records = records.len(), "ingesting group");
            for record in records {
                let update = ProfileUpdate {
                    title: record.title,
                    abstract_text: record.abstract_text,
                };

                match record.pk {
                    Some(pk) if self.update(&pk, update.clone()) => summary.merged += 1,
                    pk => {
                        let pk = pk.unwrap_or_else(generate_pk);
                        self.add(PaperProfile::with_pk(pk, update.title, update.abstract_text));
                        summary.added += 1;
                    }
                }
            }
        }

        info!(
            added = summary.added,
            merged = summary.merged,
            "ingestion complete"
        );
        summary
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Serialize as a JSON object `pk → {pk, title, abstract}`.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.profiles)
            .map_err(|e| PaperTrailError::persistence(format!("failed to serialize store: {e}")))
    }

    /// Parse the format produced by [`to_json`](Self::to_json).
    ///
    /// Entries that are not objects, or whose `title`/`abstract` are neither
    /// string nor null, are skipped with a warning.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| PaperTrailError::persistence(format!("invalid store JSON: {e}")))?;

        let serde_json::Value::Object(entries) = value else {
            return Err(PaperTrailError::persistence(
                "store file must hold a JSON object keyed by paper identifier",
            ));
        };

        let mut profiles = BTreeMap::new();
        for (pk, entry) in entries {
            if !entry.is_object() {
                warn!(pk = %pk, "skipping store entry that is not an object");
                continue;
            }
            match serde_json::from_value::<StoredProfile>(entry) {
                Ok(stored) => {
                    let profile = PaperProfile::with_pk(pk.clone(), stored.title, stored.abstract_text);
                    profiles.insert(pk, profile);
                }
                Err(e) => warn!(pk = %pk, error = %e, "skipping malformed store entry"),
            }
        }

        Ok(Self { profiles })
    }

    /// Write the store to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PaperTrailError::io(parent, e))?;
        }

        let json = self.to_json()?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| PaperTrailError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| PaperTrailError::io(path, e))?;

        debug!(path = %path.display(), profiles = self.len(), "store saved");
        Ok(())
    }

    /// Replace the in-memory contents with the store at `path`.
    ///
    /// On error the current contents are left as they were.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        *self = Self::from_file(path)?;
        Ok(())
    }

    /// Read a store from `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| PaperTrailError::io(path, e))?;
        let store = Self::from_json(&json)?;
        debug!(path = %path.display(), profiles = store.len(), "store loaded");
        Ok(store)
    }

    /// Read a store from `path`, or start empty if the file does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!(path = %path.display(), "store file not found, starting empty");
            Ok(Self::new())
        }
    }
}
