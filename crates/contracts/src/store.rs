//! AnalyticsStore trait - backing store input interface
//!
//! The store is the only resource shared across purge cycles; it is reached
//! exclusively through the atomic drain below.

use bytes::Bytes;

use crate::{BoxFuture, ContractError, StoreOptions};

/// Default collection key producers write analytics records under
pub const ANALYTICS_KEY_NAME: &str = "iam-system-analytics";

/// Backing store holding serialized records until the next purge
pub trait AnalyticsStore: Send + Sync {
    /// Store kind (used for logging)
    fn kind(&self) -> &str;

    /// Connect / prepare the store
    ///
    /// # Errors
    /// Failure is fatal at startup
    fn init<'a>(&'a mut self, options: &'a StoreOptions)
        -> BoxFuture<'a, Result<(), ContractError>>;

    /// Return and remove every entry under `key` in a single atomic step
    ///
    /// Returns an empty vector when nothing is pending. No entry is ever
    /// returned by two calls.
    fn get_and_delete_set<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Bytes>, ContractError>>;
}
