use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use super::{BuildRecord, StateStore, StoreTable};
use crate::error::{DockyardError, Result};

/// Current version of the state file format.
///
/// dockyard refuses to open a state file with a higher version.
pub const STORE_VERSION: u32 = 1;

/// Base name of the state table.
pub const TABLE_NAME: &str = "docker-image-state";

/// File name of the state table for a region.
///
/// Each region keeps its own table, so local runs against one region never
/// see records written by CI in another.
pub fn table_file_name(region: Option<&str>) -> String {
    match region {
        Some(region) if !region.is_empty() => format!("{TABLE_NAME}.{region}.metadata"),
        _ => format!("{TABLE_NAME}.metadata"),
    }
}

/// State store backed by a single rkyv file.
///
/// The table is read once when the store is opened. Every [`put`] rewrites
/// the file atomically so a crash mid-run keeps all pushes recorded so far.
///
/// [`put`]: StateStore::put
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: StoreTable,
}

impl FileStore {
    /// Opens the table at `path`, starting empty when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file exists but cannot be read
    /// - The file cannot be decoded
    /// - The file was written by a newer format version
    pub fn open(path: &Path) -> Result<Self> {
        let table = load_table(path)?;
        debug!(path = %path.display(), records = table.records.len(), "opened state table");
        Ok(Self {
            path: path.to_path_buf(),
            table,
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, in no particular order
    pub fn records(&self) -> impl Iterator<Item = &BuildRecord> {
        self.table.records.values()
    }
}

impl StateStore for FileStore {
    fn get(&self, identifier: &str) -> Result<Option<BuildRecord>> {
        Ok(self.table.records.get(identifier).cloned())
    }

    fn put(&mut self, record: BuildRecord) -> Result<()> {
        let mut next = self.table.clone();
        next.upsert(record);
        save_table(&next, &self.path)?;
        self.table = next;
        Ok(())
    }

    fn len(&self) -> usize {
        self.table.records.len()
    }
}

fn load_table(path: &Path) -> Result<StoreTable> {
    if !path.exists() {
        return Ok(StoreTable::new());
    }

    let file = File::open(path).map_err(|source| DockyardError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    let file_metadata = file.metadata().map_err(|source| DockyardError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    if file_metadata.len() == 0 {
        return Ok(StoreTable::new());
    }

    // SAFETY: the map is read-only and dropped before this function returns;
    // dockyard is the only writer and replaces the file by rename.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| DockyardError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    let table = rkyv::from_bytes::<StoreTable, rkyv::rancor::BoxedError>(&mmap[..]).map_err(
        |source| DockyardError::DeserializationError {
            path: path.to_path_buf(),
            source,
        },
    )?;

    if table.version > STORE_VERSION {
        return Err(DockyardError::StoreVersion {
            found: table.version,
            supported: STORE_VERSION,
        });
    }

    Ok(table)
}

/// Writes the table to a temporary file, syncs it, then renames it over
/// `path`. Creates the parent directory if needed.
fn save_table(table: &StoreTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| DockyardError::IoError {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let bytes = rkyv::to_bytes::<rkyv::rancor::BoxedError>(table)
        .map_err(|e| DockyardError::SerializationError(Box::new(e)))?;

    let temp_path = path.with_extension("tmp");

    let mut temp_file = File::create(&temp_path).map_err(|source| DockyardError::IoError {
        path: temp_path.clone(),
        source,
    })?;

    temp_file
        .write_all(&bytes)
        .map_err(|source| DockyardError::IoError {
            path: temp_path.clone(),
            source,
        })?;

    temp_file.sync_all().map_err(|source| DockyardError::IoError {
        path: temp_path.clone(),
        source,
    })?;

    fs::rename(&temp_path, path).map_err(|source| DockyardError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

#[cfg(test)]
pub(super) fn write_raw_table(table: &StoreTable, path: &Path) -> Result<()> {
    save_table(table, path)
}
