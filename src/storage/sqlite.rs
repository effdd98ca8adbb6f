use super::{ensure_parent_dir, validate_identifier};
use crate::constants::{COL_EUR, COL_GBP, COL_INR, COL_NAME, COL_RANK, COL_USD};
use crate::error::{EtlError, Result};
use crate::types::EnrichedBankRecord;
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use tracing::{debug, info, instrument};

fn unavailable(path: &Path, e: impl std::fmt::Display) -> EtlError {
    EtlError::StoreUnavailable {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Forces SQLite to read the file header so a non-database file fails here
/// rather than on the first real statement.
fn probe(conn: &Connection, path: &Path) -> Result<()> {
    conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))
        .map(|_| ())
        .map_err(|e| unavailable(path, e))
}

/// Opens the store for writing, creating the file (and its directory) if needed.
pub fn open_store(path: &Path) -> Result<Connection> {
    ensure_parent_dir(path).map_err(|e| unavailable(path, e))?;
    let conn = Connection::open(path).map_err(|e| unavailable(path, e))?;
    probe(&conn, path)?;
    Ok(conn)
}

/// Opens a store that must already exist. Read paths never create files.
pub fn open_existing(path: &Path, read_only: bool) -> Result<Connection> {
    if !path.is_file() {
        return Err(unavailable(path, "no such database file"));
    }
    let flags = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX
    };
    let conn = Connection::open_with_flags(path, flags).map_err(|e| unavailable(path, e))?;
    probe(&conn, path)?;
    Ok(conn)
}

fn write_err(e: rusqlite::Error) -> EtlError {
    EtlError::Write(e.to_string())
}

fn create_table_sql(table: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS {table};
         CREATE TABLE {table} (
             {COL_RANK} INTEGER NOT NULL,
             {COL_NAME} TEXT NOT NULL,
             {COL_USD} REAL NOT NULL,
             {COL_GBP} REAL NOT NULL,
             {COL_EUR} REAL NOT NULL,
             {COL_INR} REAL NOT NULL
         );"
    )
}

/// Replaces `table_name` in the store at `store` with exactly `records`.
///
/// Drop, create and inserts share one transaction: a failed insert rolls the
/// table back to its previous state instead of leaving a partial copy.
#[instrument(skip_all, fields(records = records.len(), store = %store.as_ref().display(), table = table_name))]
pub fn write_table<P: AsRef<Path>>(
    records: &[EnrichedBankRecord],
    store: P,
    table_name: &str,
) -> Result<()> {
    let table = validate_identifier(table_name)?;
    let path = store.as_ref();
    let mut conn = open_store(path)?;

    let tx = conn.transaction().map_err(write_err)?;
    tx.execute_batch(&create_table_sql(table)).map_err(write_err)?;
    {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO {table} ({COL_RANK}, {COL_NAME}, {COL_USD}, {COL_GBP}, {COL_EUR}, {COL_INR})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ))
            .map_err(write_err)?;
        for r in records {
            stmt.execute(params![
                r.rank,
                r.name,
                r.market_cap_usd,
                r.market_cap_gbp,
                r.market_cap_eur,
                r.market_cap_inr
            ])
            .map_err(write_err)?;
            debug!("inserted rank={} name={}", r.rank, r.name);
        }
    }
    tx.commit().map_err(write_err)?;

    info!("🗄️  Replaced table {} with {} rows", table, records.len());
    Ok(())
}
