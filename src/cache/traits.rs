//! Cache Contract
//!
//! The `Cache` and `Filler` traits every backend implements and every caller
//! uses, plus the shared fill-on-miss routine.

use crate::error::{Error, Result};

use super::object::Object;

/// A key/value object store with fill-on-miss lookups.
pub trait Cache: Send + Sync {
    /// Get an object from the cache.
    ///
    /// On a miss, returns `filler.fill(Some(self), key)` verbatim when a filler
    /// is supplied, otherwise fails with [`Error::NotFound`].
    fn get(&self, key: &str, filler: Option<&dyn Filler>) -> Result<Object>;

    /// Store an object, replacing any existing object under the key.
    fn set(&self, key: &str, object: Object) -> Result<()>;

    /// Delete an object. A trailing `*` deletes every matching key and a bare
    /// `*` clears the cache. Deleting a missing key is a no-op.
    fn del(&self, key: &str);
}

/// Caller-supplied miss handler.
///
/// A filler may write one or more entries into the cache it is handed (for
/// example both the raw and compressed representation of a file) but should
/// return the object for the requested key. It must tolerate a `None` cache.
pub trait Filler: Send + Sync {
    /// Produce the object for `key`, optionally storing it in `cache`.
    fn fill(&self, cache: Option<&dyn Cache>, key: &str) -> Result<Object>;
}

impl<F> Filler for F
where
    F: Fn(Option<&dyn Cache>, &str) -> Result<Object> + Send + Sync,
{
    fn fill(&self, cache: Option<&dyn Cache>, key: &str) -> Result<Object> {
        self(cache, key)
    }
}

/// Resolve a miss on `cache`: delegate to the filler or report `NotFound`.
///
/// Must be called without holding any cache lock, since the filler may
/// re-enter `set` on the same cache.
pub fn fill_on_miss(cache: &dyn Cache, key: &str, filler: Option<&dyn Filler>) -> Result<Object> {
    match filler {
        Some(filler) => filler.fill(Some(cache), key),
        None => Err(Error::not_found(key)),
    }
}
