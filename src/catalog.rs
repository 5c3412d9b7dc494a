//! Subject catalogs: who is in the cohort and where their recording lives.
use log::debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{IcaError, Result};

/// Default substring identifying the eyes-open resting-state recording.
pub const DEFAULT_RECORDING_PATTERN: &str = "restEO_eeg";

/// Lists subjects per category and resolves their recording files.
pub trait SubjectCatalog {
    /// Subject identifiers of `category`, in catalog order.
    fn list_subjects(&self, category: &str) -> Result<Vec<String>>;

    /// Path of the subject's recording, or `None` when nothing matches.
    fn resolve_recording_path(&self, subject: &str) -> Result<Option<PathBuf>>;
}

/// Catalog backed by a participants JSON file and a data directory.
///
/// The participants file maps categories to subject lists:
///
/// ```json
/// { "ADHD": ["sub-001", "sub-002"], "HEALTHY": ["sub-003"] }
/// ```
///
/// Recordings are searched (recursively, in sorted order) under
/// `root/<category>/<subject>/` for a file whose name contains
/// [`pattern`](Self::with_pattern) and ends in `.<extension>`.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
    categories: BTreeMap<String, Vec<String>>,
    pattern: String,
    extension: String,
}

impl DirectoryCatalog {
    /// Fails with [`IcaError::Catalog`] when a subject is listed more than
    /// once, since a subject resolves to a single directory.
    pub fn new(
        root: impl Into<PathBuf>,
        categories: BTreeMap<String, Vec<String>>,
        extension: &str,
    ) -> Result<Self> {
        let root = root.into();
        if let Some(reason) = duplicate_subject(&categories) {
            return Err(IcaError::Catalog { path: root, reason });
        }
        Ok(Self {
            root,
            categories,
            pattern: DEFAULT_RECORDING_PATTERN.to_string(),
            extension: extension.trim_start_matches('.').to_string(),
        })
    }

    pub fn from_participants_json(participants: &Path, root: impl Into<PathBuf>, extension: &str) -> Result<Self> {
        let catalog_err = |reason: String| IcaError::Catalog { path: participants.to_path_buf(), reason };
        let text = std::fs::read_to_string(participants).map_err(|e| catalog_err(e.to_string()))?;
        let categories: BTreeMap<String, Vec<String>> =
            serde_json::from_str(&text).map_err(|e| catalog_err(e.to_string()))?;
        if let Some(reason) = duplicate_subject(&categories) {
            return Err(catalog_err(reason));
        }
        Self::new(root, categories, extension)
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Categories in sorted order.
    pub fn categories(&self) -> Vec<&str> {
        self.categories.keys().map(String::as_str).collect()
    }

    fn category_of(&self, subject: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, subjects)| subjects.iter().any(|s| s == subject))
            .map(|(c, _)| c.as_str())
    }

    fn matches(&self, path: &Path) -> bool {
        let ext_ok = path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str());
        let name_ok = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains(&self.pattern));
        ext_ok && name_ok
    }
}

impl SubjectCatalog for DirectoryCatalog {
    fn list_subjects(&self, category: &str) -> Result<Vec<String>> {
        Ok(self.categories.get(category).cloned().unwrap_or_default())
    }

    fn resolve_recording_path(&self, subject: &str) -> Result<Option<PathBuf>> {
        let Some(category) = self.category_of(subject) else {
            debug!("subject {subject} not listed in any category");
            return Ok(None);
        };
        let dir = self.root.join(category).join(subject);
        if !dir.is_dir() {
            debug!("no directory {}", dir.display());
            return Ok(None);
        }
        find_first(&dir, &|p| self.matches(p)).map_err(|e| IcaError::Catalog { path: dir, reason: e.to_string() })
    }
}

fn duplicate_subject(categories: &BTreeMap<String, Vec<String>>) -> Option<String> {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for (category, subjects) in categories {
        for subject in subjects {
            if let Some(first) = seen.insert(subject.as_str(), category.as_str()) {
                return Some(format!("subject {subject} listed under both {first} and {category}"));
            }
        }
    }
    None
}

/// Depth-first search with entries visited in sorted order.
fn find_first(dir: &Path, accept: &dyn Fn(&Path) -> bool) -> std::io::Result<Option<PathBuf>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?.map(|e| e.map(|e| e.path())).collect::<std::io::Result<_>>()?;
    entries.sort();
    for path in &entries {
        if path.is_file() && accept(path) {
            return Ok(Some(path.clone()));
        }
    }
    for path in entries.iter().filter(|p| p.is_dir()) {
        if let Some(found) = find_first(path, accept)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}
