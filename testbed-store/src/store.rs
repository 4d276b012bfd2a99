//! The store handle and its transaction guard.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::StoreConfig;
use crate::connection::{ensure_open, prepare_path};
use crate::error::StoreError;
use crate::key::{composite_key, entry_prefix, namespace_prefix};

struct StoreInner {
    path: PathBuf,
    conn: Mutex<Option<SqliteConnection>>,
}

/// Namespaced key-value store backed by a single SQLite file.
///
/// Every operation, including each [`Transaction`], goes through one async
/// mutex, so operations never overlap.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Create a store handle for the configured path.
    ///
    /// The parent directory is created here; the database file itself is
    /// opened lazily on first use.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let path = prepare_path(config.path())?;
        tracing::info!(path = %path.display(), "store configured");
        Ok(Self {
            inner: Arc::new(StoreInner {
                path,
                conn: Mutex::new(None),
            }),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Acquire the store lock for a group of operations.
    ///
    /// The lock is held until the returned guard is dropped. Atomicity is
    /// cooperative: it holds only for callers that go through this store.
    pub async fn transaction(&self) -> Transaction<'_> {
        Transaction {
            path: &self.inner.path,
            conn: self.inner.conn.lock().await,
        }
    }

    pub async fn put<T>(&self, ns: Option<&str>, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        self.transaction().await.put(ns, key, value).await
    }

    pub async fn put_raw(&self, ns: Option<&str>, key: &str, value: &str) -> Result<(), StoreError> {
        self.transaction().await.put_raw(ns, key, value).await
    }

    pub async fn get(&self, ns: Option<&str>, key: &str) -> Result<Option<String>, StoreError> {
        self.transaction().await.get(ns, key).await
    }

    pub async fn get_record<T>(&self, ns: Option<&str>, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        self.transaction().await.get_record(ns, key).await
    }

    pub async fn exists(&self, ns: Option<&str>, key: &str) -> Result<bool, StoreError> {
        self.transaction().await.exists(ns, key).await
    }

    /// All records under `ns`, keyed by their namespace-stripped key and
    /// optionally filtered to keys starting with `prefix`.
    pub async fn entries<T>(
        &self,
        ns: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<BTreeMap<String, T>, StoreError>
    where
        T: DeserializeOwned,
    {
        self.transaction().await.entries(ns, prefix).await
    }

    pub async fn entries_raw(
        &self,
        ns: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        self.transaction().await.entries_raw(ns, prefix).await
    }
}

/// Exclusive access to the store for the lifetime of the guard.
pub struct Transaction<'a> {
    path: &'a Path,
    conn: MutexGuard<'a, Option<SqliteConnection>>,
}

impl Transaction<'_> {
    async fn connection(&mut self) -> Result<&mut SqliteConnection, StoreError> {
        ensure_open(self.path, &mut self.conn).await
    }

    pub async fn put<T>(&mut self, ns: Option<&str>, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        let composite = composite_key(ns, key)?;
        let encoded = serde_json::to_string(value).map_err(|source| StoreError::Serialize {
            key: composite.clone(),
            source,
        })?;
        self.write(&composite, &encoded).await
    }

    pub async fn put_raw(&mut self, ns: Option<&str>, key: &str, value: &str) -> Result<(), StoreError> {
        let composite = composite_key(ns, key)?;
        self.write(&composite, value).await
    }

    async fn write(&mut self, composite: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.connection().await?;
        sqlx::query(
            "INSERT INTO records (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(composite)
        .bind(value)
        .execute(conn)
        .await?;
        tracing::trace!(key = composite, "record stored");
        Ok(())
    }

    pub async fn get(&mut self, ns: Option<&str>, key: &str) -> Result<Option<String>, StoreError> {
        let composite = composite_key(ns, key)?;
        self.read(&composite).await
    }

    pub async fn get_record<T>(&mut self, ns: Option<&str>, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let composite = composite_key(ns, key)?;
        match self.read(&composite).await? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: composite,
                    source,
                }),
        }
    }

    async fn read(&mut self, composite: &str) -> Result<Option<String>, StoreError> {
        let conn = self.connection().await?;
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM records WHERE key = ?1")
            .bind(composite)
            .fetch_optional(conn)
            .await?;
        Ok(value)
    }

    pub async fn exists(&mut self, ns: Option<&str>, key: &str) -> Result<bool, StoreError> {
        let composite = composite_key(ns, key)?;
        let conn = self.connection().await?;
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM records WHERE key = ?1")
            .bind(&composite)
            .fetch_optional(conn)
            .await?;
        Ok(found.is_some())
    }

    pub async fn entries<T>(
        &mut self,
        ns: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<BTreeMap<String, T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let ns_prefix = namespace_prefix(ns)?;
        let raw = self.entries_raw(ns, prefix).await?;
        raw.into_iter()
            .map(|(key, value)| match serde_json::from_str(&value) {
                Ok(record) => Ok((key, record)),
                Err(source) => Err(StoreError::Corrupt {
                    key: format!("{ns_prefix}{key}"),
                    source,
                }),
            })
            .collect()
    }

    pub async fn entries_raw(
        &mut self,
        ns: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        let ns_prefix = namespace_prefix(ns)?;
        let prefix = entry_prefix(prefix)?;

        let conn = self.connection().await?;
        let rows = sqlx::query(
            "SELECT key, value FROM records \
             WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )
        .bind(&ns_prefix)
        .fetch_all(conn)
        .await?;

        let mut entries = BTreeMap::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            let stripped = &key[ns_prefix.len()..];
            if stripped.is_empty() {
                return Err(StoreError::InvalidKey(format!(
                    "empty key found: '{key}' (namespace: {ns_prefix})"
                )));
            }
            if let Some(p) = prefix {
                if !stripped.starts_with(p) {
                    continue;
                }
            }
            entries.insert(stripped.to_owned(), value);
        }
        Ok(entries)
    }
}
