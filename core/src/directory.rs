//! User directory port.
//!
//! Users are owned by the identity subsystem. This service only reads them,
//! to turn attendee identifiers into addresses and names.

use crate::error::DirectoryError;
use crate::types::{User, UserId};
use std::future::Future;
use std::pin::Pin;

/// Read-only lookup of users by identifier.
pub trait UserDirectory: Send + Sync {
    /// The users among `ids` that exist.
    ///
    /// Unknown identifiers are silently absent from the result; order is not
    /// guaranteed.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Lookup`] if the directory cannot be queried.
    fn find_users<'a>(
        &'a self,
        ids: &'a [UserId],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<User>, DirectoryError>> + Send + 'a>>;
}
