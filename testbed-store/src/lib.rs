//! Durable, namespaced key-value store.
//!
//! Records are addressed by `"<namespace>/<key>"` and stored as text in a
//! single SQLite file. Structured values are serialized as JSON.
//!
//! ```rust,no_run
//! use testbed_store::{Store, StoreConfig};
//!
//! # async fn demo() -> Result<(), testbed_store::StoreError> {
//! let store = Store::open(&StoreConfig::new("/var/lib/testbed/testbed.db"))?;
//! store.put_raw(Some("bench-config-by-name"), "nightly", "0b7c...").await?;
//!
//! let mut tx = store.transaction().await;
//! if !tx.exists(Some("bench-config-by-name"), "weekly").await? {
//!     tx.put_raw(Some("bench-config-by-name"), "weekly", "4f1d...").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod connection;
pub mod error;
mod key;
mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use store::{Store, Transaction};
