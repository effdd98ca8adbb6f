use crate::constants::{COL_NAME, COL_RANK};
use crate::error::{EtlError, Result};
use crate::storage::sqlite::open_existing;
use crate::storage::validate_identifier;
use crate::types::Currency;
use rusqlite::types::ValueRef;
use rusqlite::{Params, Statement};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, instrument};

/// A single SQLite value as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for Cell {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(f) => Cell::Real(f),
            ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Real(r) => write!(f, "{:?}", r),
            Cell::Text(t) => f.write_str(t),
            Cell::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Column names plus ordered rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|row| row.get(idx)).collect())
    }
}

/// Renders an aligned text table, one line per row.
impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &rendered {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = *w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        write!(f, "{}", line(self.columns.as_slice()))?;
        for row in &rendered {
            write!(f, "\n{}", line(row.as_slice()))?;
        }
        if rendered.is_empty() {
            write!(f, "\n(no rows)")?;
        }
        Ok(())
    }
}

fn query_err(e: rusqlite::Error) -> EtlError {
    EtlError::Query(e.to_string())
}

/// Checks that `sql` is one non-empty statement and returns it without its
/// trailing terminator. Quoted text and `--` / `/* */` comments are skipped
/// when looking for `;`.
pub fn validate_sql(sql: &str) -> Result<&str> {
    let mut chars = sql.char_indices().peekable();
    let mut quote: Option<char> = None;
    let mut terminator: Option<usize> = None;
    let mut has_body = false;

    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }

        let next = chars.peek().map(|&(_, n)| n);
        match (c, next) {
            ('-', Some('-')) => {
                for (_, n) in chars.by_ref() {
                    if n == '\n' {
                        break;
                    }
                }
                continue;
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for (_, n) in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                continue;
            }
            (';', _) => {
                terminator.get_or_insert(i);
                continue;
            }
            (c, _) if c.is_whitespace() => continue,
            _ => {}
        }

        if terminator.is_some() {
            return Err(EtlError::Query(
                "only one SQL statement may be executed at a time".to_string(),
            ));
        }
        has_body = true;
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '[' => quote = Some(']'),
            _ => {}
        }
    }

    if let Some(q) = quote {
        return Err(EtlError::Query(format!("unterminated {} in SQL statement", q)));
    }
    if !has_body {
        return Err(EtlError::Query("empty SQL statement".to_string()));
    }
    Ok(sql[..terminator.unwrap_or(sql.len())].trim())
}

fn collect_rows<P: Params>(stmt: &mut Statement<'_>, params: P) -> Result<Vec<Vec<Cell>>> {
    let width = stmt.column_count();
    let mut rows = stmt.query(params).map_err(query_err)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(query_err)? {
        let cells = (0..width)
            .map(|i| row.get_ref(i).map(Cell::from))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_err)?;
        out.push(cells);
    }
    Ok(out)
}

/// Runs a read-only statement and returns its columns and rows.
pub fn query<P: AsRef<Path>>(store: P, sql: &str) -> Result<QueryResult> {
    query_with_params(store, sql, [])
}

/// `query` with bound parameters (`?1`, `:name`, ...).
#[instrument(skip_all, fields(store = %store.as_ref().display(), sql = sql))]
pub fn query_with_params<S: AsRef<Path>, P: Params>(
    store: S,
    sql: &str,
    params: P,
) -> Result<QueryResult> {
    let sql = validate_sql(sql)?;
    let conn = open_existing(store.as_ref(), true)?;
    let mut stmt = conn.prepare(sql).map_err(query_err)?;
    if !stmt.readonly() {
        return Err(EtlError::Query(format!("statement is not read-only: {}", sql)));
    }
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = collect_rows(&mut stmt, params)?;
    debug!("query returned {} rows", rows.len());
    Ok(QueryResult { columns, rows })
}

/// Executes any single statement (including writes) and returns whatever
/// rows it produced.
#[instrument(skip_all, fields(store = %store.as_ref().display(), sql = sql))]
pub fn execute_raw<P: AsRef<Path>>(store: P, sql: &str) -> Result<Vec<Vec<Cell>>> {
    let sql = validate_sql(sql)?;
    let conn = open_existing(store.as_ref(), false)?;
    let mut stmt = conn.prepare(sql).map_err(query_err)?;
    let rows = collect_rows(&mut stmt, [])?;
    debug!("raw statement returned {} rows", rows.len());
    Ok(rows)
}

/// `SELECT Name, <currency column> FROM <table>` in rank order.
pub fn currency_projection_sql(table: &str, currency: Currency) -> Result<String> {
    let table = validate_identifier(table)?;
    Ok(format!(
        "SELECT {COL_NAME}, {col} FROM {table} ORDER BY {COL_RANK}",
        col = currency.column()
    ))
}
