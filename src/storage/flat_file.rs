use super::ensure_parent_dir;
use crate::error::{EtlError, Result};
use crate::types::EnrichedBankRecord;
use std::path::Path;
use tracing::{info, instrument};

/// Writes the records as comma-separated text with a header row, truncating
/// any existing file at `path`.
#[instrument(skip_all, fields(records = records.len(), path = %path.as_ref().display()))]
pub fn write_flat_file<P: AsRef<Path>>(records: &[EnrichedBankRecord], path: P) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    let mut writer = csv::Writer::from_path(path).map_err(csv_to_io)?;
    if records.is_empty() {
        writer
            .write_record(crate::constants::COLUMNS)
            .map_err(csv_to_io)?;
    }
    for record in records {
        writer.serialize(record).map_err(csv_to_io)?;
    }
    writer.flush()?;

    info!("💾 Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

fn csv_to_io(e: csv::Error) -> EtlError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => EtlError::Io(io),
        other => EtlError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("csv serialization failed: {:?}", other),
        )),
    }
}
