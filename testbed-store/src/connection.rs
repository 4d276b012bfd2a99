use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::ConnectOptions;

use crate::error::StoreError;

const CREATE_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

/// Resolve the backing file path and make sure its parent directory exists.
///
/// Fails when the directory cannot be created or when the path already exists
/// and is not a regular file.
pub(crate) fn prepare_path(path: &Path) -> Result<PathBuf, StoreError> {
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| StoreError::FileCreation(format!("cannot resolve cwd: {e}")))?
            .join(path)
    };

    if let Some(parent) = resolved.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            create_dir_all(parent).map_err(|e| {
                StoreError::FileCreation(format!(
                    "failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }

    if resolved.exists() && !resolved.is_file() {
        return Err(StoreError::FileCreation(format!(
            "path '{}' already exists and is not a file",
            resolved.display()
        )));
    }

    Ok(resolved)
}

/// Open the SQLite file, creating it and the records table if needed.
pub(crate) async fn open(path: &Path) -> Result<SqliteConnection, StoreError> {
    tracing::debug!(path = %path.display(), "opening store");
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .connect()
        .await?;
    sqlx::query(CREATE_RECORDS_TABLE).execute(&mut conn).await?;
    Ok(conn)
}

/// Return the open connection in `slot`, opening it on first use.
pub(crate) async fn ensure_open<'a>(
    path: &Path,
    slot: &'a mut Option<SqliteConnection>,
) -> Result<&'a mut SqliteConnection, StoreError> {
    let conn = match slot.take() {
        Some(conn) => conn,
        None => open(path).await?,
    };
    Ok(slot.insert(conn))
}
