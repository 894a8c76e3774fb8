use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::app_dirs;

use super::{ApplicationRecord, CSV_HEADER, RecordId, Table, tracker_file_stem};

/// Flat-file store that persists one CSV table per user.
///
/// Files are rewritten wholesale on every mutation; there is no locking and
/// no atomic replace. This is a single-operator tool.
#[derive(Debug, Clone)]
pub struct TrackerStore {
    root: PathBuf,
}

/// Errors that may occur while reading or writing tracker files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No suitable data directory available for tracker files")]
    NoDataDir,
    #[error("Unable to create tracker directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid tracker file {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("Required fields are empty: {}", fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },
    #[error("A record with id {id} already exists")]
    DuplicateId { id: RecordId },
    #[error("No record with id {key} to delete")]
    NotFound { key: String },
}

impl TrackerStore {
    /// Open the store at the default per-user data directory.
    pub fn open_default() -> Result<Self, StoreError> {
        let root = app_dirs::trackers_dir().map_err(map_app_dir_error)?;
        Ok(Self { root })
    }

    /// Open a store rooted at an explicit directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StoreError::CreateDir {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Directory holding the tracker files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Backing file for `user_key`.
    pub fn table_path(&self, user_key: &str) -> PathBuf {
        self.root
            .join(format!("{}_applications.csv", tracker_file_stem(user_key)))
    }

    /// Load the table for `user_key`.
    ///
    /// A missing backing file is created with the canonical header so the
    /// next reader sees a well-formed empty table.
    pub fn load(&self, user_key: &str) -> Result<Table, StoreError> {
        let path = self.table_path(user_key);
        if !path.exists() {
            let table = Table::new(user_key);
            self.save(&table)?;
            return Ok(table);
        }
        let file = File::open(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file);
        let mut records = Vec::new();
        for row in reader.deserialize::<ApplicationRecord>() {
            let record = row.map_err(|source| StoreError::Csv {
                path: path.clone(),
                source,
            })?;
            records.push(record);
        }
        Ok(Table::from_records(user_key, records))
    }

    /// Load the table for `user_key`, degrading to an empty one on failure.
    pub fn load_or_empty(&self, user_key: &str) -> Table {
        match self.load(user_key) {
            Ok(table) => table,
            Err(err) => {
                warn!("falling back to an empty tracker for {user_key}: {err}");
                Table::new(user_key)
            }
        }
    }

    /// Validate and append `record`, persisting the table immediately.
    ///
    /// A blank id is minted; a duplicate id is rejected before anything is
    /// written.
    pub fn append(
        &self,
        table: &mut Table,
        mut record: ApplicationRecord,
    ) -> Result<(), StoreError> {
        let missing = record.missing_fields();
        if !missing.is_empty() {
            return Err(StoreError::MissingFields { fields: missing });
        }
        if record.id.as_str().is_empty() {
            record.id = RecordId::new();
        }
        if table.contains_id(&record.id) {
            return Err(StoreError::DuplicateId { id: record.id });
        }
        table.records.push(record);
        self.save(table)
    }

    /// Remove every row matching `id` and persist, returning the count.
    ///
    /// When nothing matches the table is untouched and nothing is rewritten.
    pub fn delete(&self, table: &mut Table, id: &RecordId) -> Result<usize, StoreError> {
        let before = table.records.len();
        if !table.contains_id(id) {
            warn!("no record with id {id} in {}'s tracker", table.user_key());
            return Err(StoreError::NotFound {
                key: id.to_string(),
            });
        }
        table.records.retain(|record| &record.id != id);
        let removed = before - table.records.len();
        self.save(table)?;
        Ok(removed)
    }

    /// Remove every row whose company matches exactly and persist.
    ///
    /// Zero matches is not an error; the file is left untouched.
    pub fn delete_by_company(&self, table: &mut Table, company: &str) -> Result<usize, StoreError> {
        let before = table.records.len();
        table.records.retain(|record| record.company != company);
        let removed = before - table.records.len();
        if removed > 0 {
            self.save(table)?;
        }
        Ok(removed)
    }

    /// Replace the stored table with an empty canonical one.
    pub fn reset(&self, user_key: &str) -> Result<Table, StoreError> {
        let table = Table::new(user_key);
        self.save(&table)?;
        Ok(table)
    }

    /// Rewrite the backing file from the in-memory table.
    pub fn save(&self, table: &Table) -> Result<(), StoreError> {
        let path = self.table_path(table.user_key());
        let file = File::create(&path).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        let map_csv = |source| StoreError::Csv {
            path: path.clone(),
            source,
        };
        writer.write_record(CSV_HEADER).map_err(map_csv)?;
        for record in &table.records {
            writer.serialize(record).map_err(map_csv)?;
        }
        writer.flush().map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })
    }
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> StoreError {
    match error {
        app_dirs::AppDirError::NoBaseDir => StoreError::NoDataDir,
        app_dirs::AppDirError::CreateDir { path, source } => StoreError::CreateDir { path, source },
    }
}
