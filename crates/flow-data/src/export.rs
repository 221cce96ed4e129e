//! CSV export of derived tables.
//!
//! Every analysis stage ends in a flat table; this is the single place
//! where those tables hit disk.

use std::path::Path;

use eyre::{Context, Result};
use serde::Serialize;

/// Serialize records to CSV with serde-derived headers.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .wrap_err_with(|| format!("failed to create {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
