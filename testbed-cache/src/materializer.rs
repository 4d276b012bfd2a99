use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::CacheError;

/// Per-target derived views keyed by target name.
pub type Views<V> = BTreeMap<String, V>;

/// Turns a persisted raw result into derived views and a summary.
///
/// The raw result is read back from the store namespace returned by
/// [`namespace`](Self::namespace), keyed by its uuid.
pub trait Materializer: Send + Sync + 'static {
    type Raw: DeserializeOwned + Send + Sync;
    type View: Send + Sync + 'static;
    type Summary: Clone + Send + Sync + 'static;

    fn namespace(&self) -> &str;

    fn uuid(&self, raw: &Self::Raw) -> Uuid;

    fn materialize(&self, raw: &Self::Raw) -> Result<Views<Self::View>, CacheError>;

    fn summarize(&self, raw: &Self::Raw, views: &Views<Self::View>) -> Self::Summary;
}
