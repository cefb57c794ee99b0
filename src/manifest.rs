//! Manifest store
//!
//! The manifest is a JSON array of `{ "repo", "status", "new" }` objects and
//! is the only state subsync persists. It is always rewritten as a whole.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::error::SubsyncError;

/// Desired subscription state for one repository
///
/// Values outside the three known ones are kept verbatim so the manifest
/// round-trips; `update` refuses to act on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Subscribed,
    Unsubscribed,
    Ignore,
    Unrecognized(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Subscribed => "SUBSCRIBED",
            Status::Unsubscribed => "UNSUBSCRIBED",
            Status::Ignore => "IGNORE",
            Status::Unrecognized(other) => other,
        }
    }
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SUBSCRIBED" => Status::Subscribed,
            "UNSUBSCRIBED" => Status::Unsubscribed,
            "IGNORE" => Status::Ignore,
            _ => Status::Unrecognized(value),
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        match status {
            Status::Unrecognized(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// `owner/name`
    pub repo: String,
    pub status: Status,
    /// Not present in the manifest at the time of the latest export
    #[serde(rename = "new")]
    pub is_new: bool,
}

impl SubscriptionRecord {
    pub fn new(repo: impl Into<String>, status: Status, is_new: bool) -> Self {
        Self {
            repo: repo.into(),
            status,
            is_new,
        }
    }
}

/// Ordered list of subscription records, unique by `repo`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub records: Vec<SubscriptionRecord>,
}

impl Manifest {
    pub fn new(records: Vec<SubscriptionRecord>) -> Self {
        Self { records }
    }

    /// Load a manifest that must already exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SubsyncError::MissingManifest(path.to_path_buf()).into());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {:?}", path))?;

        let manifest = Self::from_json(&content)
            .with_context(|| format!("Failed to parse manifest: {:?}", path))?;

        debug!("Loaded {} records from {:?}", manifest.len(), path);
        Ok(manifest)
    }

    /// Load the manifest, treating a missing file as empty
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No manifest at {:?}, starting empty", path);
            Ok(Self::default())
        }
    }

    /// Parse and validate manifest JSON
    pub fn from_json(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Render as 2-space indented JSON with a trailing newline
    pub fn to_json(&self) -> Result<String> {
        let mut content =
            serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;
        content.push('\n');
        Ok(content)
    }

    /// Replace the file at `path` with this manifest
    ///
    /// The content is written to a sibling temp file first and renamed into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_json()?;

        let mut tmp_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "manifest".into());
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write manifest: {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace manifest: {:?}", path))?;

        debug!("Wrote {} records to {:?}", self.len(), path);
        Ok(())
    }

    /// Check that no repository appears twice
    pub fn validate(&self) -> Result<(), SubsyncError> {
        let mut seen = HashSet::new();
        for record in &self.records {
            if !seen.insert(record.repo.as_str()) {
                return Err(SubsyncError::DuplicateRepository(record.repo.clone()));
            }
        }
        Ok(())
    }

    pub fn repos(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.repo.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
