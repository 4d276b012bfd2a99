//! TTL-evicted cache of expensive derived result views.
//!
//! A [`ResultCache`] keeps two things per result: a permanent summary, and a
//! set of per-target views that are evicted after sitting idle and rebuilt on
//! demand from the raw result held in the [`Store`](testbed_store::Store).
//! What a view is, and how it is built, is up to the [`Materializer`].

mod cache;
mod config;
mod error;
mod materializer;

pub use cache::ResultCache;
pub use config::{CacheConfig, DEFAULT_GC_INTERVAL, DEFAULT_TTL};
pub use error::CacheError;
pub use materializer::{Materializer, Views};
