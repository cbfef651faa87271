//! Mapping store: durable persistence for [`MappingDatabase`].
//!
//! The store is loaded once per run, mutated in memory, and flushed at a
//! single checkpoint. All I/O goes through the `FileSystem` port:
//!
//! ```text
//! <dir>/
//!   ├── mappings.json             # current database
//!   └── mappings.json.<uuid>.tmp  # only while a save is in flight
//! ```
//!
//! Saves write the temporary sibling first and rename it over the
//! destination, so a reader sees either the old file or the new one.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::identity::TestIdentity;
use crate::mapping::{
    FixProvenance, IssueMapping, IssueStatus, MappingDatabase, MappingUpdate, UNKNOWN,
};
use crate::ports::{Clock, FileSystem};

/// Failures while reading or writing the mapping file.
///
/// These never leave the store: loads fall back to an empty database and
/// failed saves keep the store dirty for the next attempt.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading, writing, or renaming failed.
    #[error("mapping file I/O failed for {}: {message}", .path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error message.
        message: String,
    },
    /// The file exists but does not hold a mapping database.
    #[error("mapping file {} is corrupt: {source}", .path.display())]
    Parse {
        /// The corrupt file.
        path: PathBuf,
        /// The JSON error.
        source: serde_json::Error,
    },
    /// The in-memory database could not be serialized.
    #[error("failed to serialize mapping database: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// In-memory view of the mapping file with dirty tracking.
pub struct MappingStore<'a> {
    fs: &'a dyn FileSystem,
    clock: &'a dyn Clock,
    path: PathBuf,
    db: MappingDatabase,
    dirty: bool,
}

impl<'a> MappingStore<'a> {
    /// Opens the store at `path`, loading whatever is on disk.
    ///
    /// A missing, unreadable, or corrupt file yields an empty store.
    #[must_use]
    pub fn open(fs: &'a dyn FileSystem, clock: &'a dyn Clock, path: &Path) -> Self {
        let mut store = Self {
            fs,
            clock,
            path: path.to_path_buf(),
            db: MappingDatabase::default(),
            dirty: false,
        };
        store.load();
        store
    }

    /// Replaces the in-memory database with the file contents.
    ///
    /// Never fails: errors are logged and an empty database is used.
    pub fn load(&mut self) -> &MappingDatabase {
        self.db = match self.read_database() {
            Ok(db) => {
                debug!(
                    path = %self.path.display(),
                    entries = db.test_identifiers.len(),
                    "loaded mappings"
                );
                db
            }
            Err(err) => {
                warn!("{err}; starting with an empty mapping database");
                MappingDatabase::default()
            }
        };
        self.dirty = false;
        &self.db
    }

    /// Returns the record for `id`, if any.
    #[must_use]
    pub fn get(&self, id: &TestIdentity) -> Option<&IssueMapping> {
        self.db.test_identifiers.get(id)
    }

    /// Inserts or replaces the record for `id`.
    pub fn set(&mut self, id: TestIdentity, mapping: IssueMapping) {
        self.db.test_identifiers.insert(id, mapping);
        self.dirty = true;
    }

    /// Merges `update` into the existing record for `id`.
    ///
    /// Returns `false` without touching anything when `id` is unknown.
    /// Setting the status to open refreshes the last failure time. An
    /// open to closed transition stamps fix provenance, with unknown
    /// author and commit recorded as `"Unknown"` and an unknown message
    /// as an empty string.
    pub fn update(
        &mut self,
        id: &TestIdentity,
        update: MappingUpdate,
        provenance: Option<&FixProvenance>,
    ) -> bool {
        let now = self.clock.now();
        let Some(mapping) = self.db.test_identifiers.get_mut(id) else {
            debug!(identity = %id.short(), "update for unknown identity ignored");
            return false;
        };

        let previous = mapping.status;
        if let Some(status) = update.status {
            mapping.status = status;
            if status == IssueStatus::Open {
                mapping.last_failure_at = now;
            }
        }
        if let Some(path) = update.test_file_path {
            mapping.test_file_path = Some(path);
        }
        if let Some(name) = update.test_name {
            mapping.test_name = Some(name);
        }

        if previous == IssueStatus::Open && mapping.status == IssueStatus::Closed {
            let provenance = provenance.cloned().unwrap_or_default();
            mapping.fixed_by = Some(provenance.fixed_by.unwrap_or_else(|| UNKNOWN.to_string()));
            mapping.fix_commit = Some(provenance.fix_commit.unwrap_or_else(|| UNKNOWN.to_string()));
            mapping.fix_message = Some(provenance.fix_message.unwrap_or_default());
        }

        mapping.last_update_at = now;
        self.dirty = true;
        true
    }

    /// Fills in missing path/name breadcrumbs without clobbering known ones.
    ///
    /// Returns `true` if anything changed.
    pub fn backfill(&mut self, id: &TestIdentity, test_file_path: &str, test_name: &str) -> bool {
        let Some(mapping) = self.db.test_identifiers.get_mut(id) else {
            return false;
        };
        let mut changed = false;
        if mapping.test_file_path.is_none() && !test_file_path.is_empty() {
            mapping.test_file_path = Some(test_file_path.to_string());
            changed = true;
        }
        if mapping.test_name.is_none() && !test_name.is_empty() {
            mapping.test_name = Some(test_name.to_string());
            changed = true;
        }
        self.dirty |= changed;
        changed
    }

    /// Iterates over every (identity, record) pair.
    pub fn all_entries(&self) -> impl Iterator<Item = (&TestIdentity, &IssueMapping)> {
        self.db.test_identifiers.iter()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.db.test_identifiers.len()
    }

    /// Returns `true` when there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.db.test_identifiers.is_empty()
    }

    /// Returns `true` when in-memory changes have not been saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The mapping file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persists the database if it changed since the last save.
    ///
    /// Returns `true` when the file on disk matches memory afterwards.
    /// On failure the store stays dirty and the next call retries.
    pub fn save(&mut self) -> bool {
        if !self.dirty {
            return true;
        }
        match self.write_database() {
            Ok(()) => {
                debug!(path = %self.path.display(), entries = self.len(), "saved mappings");
                self.dirty = false;
                true
            }
            Err(err) => {
                warn!("{err}; changes kept in memory for the next save");
                false
            }
        }
    }

    fn read_database(&self) -> Result<MappingDatabase, StoreError> {
        if !self.fs.exists(&self.path) {
            debug!(path = %self.path.display(), "no mapping file yet");
            return Ok(MappingDatabase::default());
        }
        let contents = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| StoreError::Io { path: self.path.clone(), message: e.to_string() })?;
        serde_json::from_str(&contents)
            .map_err(|source| StoreError::Parse { path: self.path.clone(), source })
    }

    fn write_database(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.db).map_err(StoreError::Serialize)?;
        replace_file(self.fs, &self.path, &json)
    }
}

/// Replaces `path` with `contents` through a uniquely named sibling and a rename.
///
/// Readers see either the old file or the new one, never a partial write.
/// The temporary file is removed when any step fails.
pub(crate) fn replace_file(
    fs: &dyn FileSystem,
    path: &Path,
    contents: &str,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs.create_dir_all(parent).map_err(|e| StoreError::Io {
            path: parent.to_path_buf(),
            message: e.to_string(),
        })?;
    }

    let tmp = temp_path(path);
    if let Err(e) = fs.write(&tmp, contents) {
        discard(fs, &tmp);
        return Err(StoreError::Io { path: tmp, message: e.to_string() });
    }
    if let Err(e) = fs.rename(&tmp, path) {
        discard(fs, &tmp);
        return Err(StoreError::Io { path: path.to_path_buf(), message: e.to_string() });
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "mappings".to_string(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!("{name}.{}.tmp", Uuid::new_v4().simple()))
}

fn discard(fs: &dyn FileSystem, tmp: &Path) {
    if fs.exists(tmp) {
        if let Err(e) = fs.remove_file(tmp) {
            debug!(path = %tmp.display(), "could not remove temporary file: {e}");
        }
    }
}
