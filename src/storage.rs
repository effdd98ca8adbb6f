//! Persistence targets for an enriched record set. Both writers fully
//! replace whatever a previous run left behind.

pub mod flat_file;
pub mod sqlite;

pub use flat_file::write_flat_file;
pub use sqlite::write_table;

use crate::error::{EtlError, Result};
use std::path::Path;

/// Accepts plain SQL identifiers only (`[A-Za-z_][A-Za-z0-9_]*`), so table
/// names can be spliced into DDL and projection queries.
pub fn validate_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(EtlError::Write(format!("'{}' is not a valid table name", name)))
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
