//! Show command.

use std::io::Write;
use std::time::SystemTime;

use crate::commands::write_error;
use crate::error::Result;
use crate::store::{BuildRecord, FileStore};
use crate::timestamp::{age_since, format_age};

/// Prints the record for `identifier`, or every record sorted by identifier.
pub fn show(
    store: &FileStore,
    identifier: Option<&str>,
    now: SystemTime,
    out: &mut impl Write,
) -> Result<()> {
    let mut records: Vec<&BuildRecord> = store
        .records()
        .filter(|record| identifier.is_none_or(|id| record.identifier == id))
        .collect();
    records.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    if records.is_empty() {
        let message = match identifier {
            Some(id) => format!("{id}: no record"),
            None => format!("no records in {}", store.path().display()),
        };
        return writeln!(out, "{message}").map_err(write_error);
    }

    for record in records {
        let age = format_age(age_since(record.last_update_nanos, now));
        writeln!(
            out,
            "{}\t{}\tpushed {age} ago",
            record.identifier, record.fingerprint
        )
        .map_err(write_error)?;
    }
    Ok(())
}
