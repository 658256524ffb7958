//! Persistent build state, one [`BuildRecord`] per image.
//!
//! The planner only reads records; the push phase is the only writer and
//! writes exclusively after a successful push. Records are never deleted.

use std::collections::HashMap;

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Result;

mod file;

pub use file::{FileStore, STORE_VERSION, TABLE_NAME, table_file_name};


/// Last pushed state of one image.
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BuildRecord {
    /// `<repo>:<tag>`, unique within a store
    pub identifier: String,

    /// Fingerprint of the Dockerfile that produced the pushed image.
    pub fingerprint: String,

    /// When the image was last pushed, nanoseconds since UNIX_EPOCH.
    pub last_update_nanos: u128,
}

/// Key-value access to build records.
///
/// A missing record is `Ok(None)`; `Err` is reserved for the store itself
/// failing.
pub trait StateStore {
    /// Looks up the record for `identifier`.
    fn get(&self, identifier: &str) -> Result<Option<BuildRecord>>;

    /// Inserts the record or replaces the existing one with the same
    /// identifier.
    fn put(&mut self, record: BuildRecord) -> Result<()>;

    /// Number of stored records.
    fn len(&self) -> usize;

    /// Returns `true` if no records are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The serialized form of a store: every record keyed by identifier.
#[derive(Archive, Deserialize, Serialize, Debug, Clone)]
pub struct StoreTable {
    /// Format version, see [`STORE_VERSION`]
    pub version: u32,

    /// Records keyed by identifier
    pub records: HashMap<String, BuildRecord>,
}

impl StoreTable {
    /// Creates an empty table at the current format version.
    pub fn new() -> Self {
        Self {
            version: STORE_VERSION,
            records: HashMap::new(),
        }
    }

    fn upsert(&mut self, record: BuildRecord) {
        self.records.insert(record.identifier.clone(), record);
    }
}

impl Default for StoreTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Store kept in memory only. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: StoreTable,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, identifier: &str) -> Result<Option<BuildRecord>> {
        Ok(self.table.records.get(identifier).cloned())
    }

    fn put(&mut self, record: BuildRecord) -> Result<()> {
        self.table.upsert(record);
        Ok(())
    }

    fn len(&self) -> usize {
        self.table.records.len()
    }
}
