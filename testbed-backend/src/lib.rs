//! Testbed backend: wires the store, job queue and result cache together and
//! exposes one manager per job kind.

pub mod configs;
pub mod context;
pub mod error;
pub mod managers;
pub mod namespaces;

pub use configs::{ConfigEntry, ConfigLookup};
pub use context::ServerContext;
pub use error::ServerError;
pub use managers::{BenchManager, BenchRunDesc, ComplianceManager};
