//! Route table persistence.
//!
//! Writes go to a sibling temp file which is renamed over `routes.json`,
//! so a reader sees either the previous or the next full snapshot.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::table::RouteTable;

/// Errors reading or writing the persisted table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("route table IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed or partially written document. Transient for readers.
    #[error("route table at {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize route table: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl TableError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Render the table as pretty JSON (2-space indent).
pub fn render_table(table: &RouteTable) -> Result<String, TableError> {
    let mut text = serde_json::to_string_pretty(table).map_err(TableError::Serialize)?;
    text.push('\n');
    Ok(text)
}

/// Parse a persisted table document.
pub fn parse_table(path: &Path, text: &str) -> Result<RouteTable, TableError> {
    serde_json::from_str(text).map_err(|source| TableError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse the persisted table.
pub fn read_table(path: &Path) -> Result<RouteTable, TableError> {
    let text = std::fs::read_to_string(path).map_err(|e| TableError::io(path, e))?;
    parse_table(path, &text)
}

/// Read the table, treating a missing file as empty.
pub fn read_table_or_empty(path: &Path) -> Result<RouteTable, TableError> {
    match read_table(path) {
        Err(TableError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            Ok(RouteTable::new())
        }
        other => other,
    }
}

/// Write the full table, replacing the file atomically.
pub async fn write_table(path: &Path, table: &RouteTable) -> Result<(), TableError> {
    let text = render_table(table)?;
    let tmp = temp_path(path);

    tokio::fs::write(&tmp, text.as_bytes())
        .await
        .map_err(|e| TableError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| TableError::io(path, e))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "routes.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
