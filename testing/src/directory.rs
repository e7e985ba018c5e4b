//! In-memory user directory.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap on lock poisoning

use gather_core::directory::UserDirectory;
use gather_core::{DirectoryError, User, UserId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// User directory backed by a map, with a switch to simulate an outage.
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, User>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryUserDirectory {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with_user(self, user: User) -> Self {
        self.insert(user);
        self
    }

    /// Insert or replace a user
    pub fn insert(&self, user: User) {
        self.users.write().unwrap().insert(user.id.clone(), user);
    }

    /// Make every lookup fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_users<'a>(
        &'a self,
        ids: &'a [UserId],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<User>, DirectoryError>> + Send + 'a>> {
        Box::pin(async move {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(DirectoryError::Lookup("directory unavailable".to_string()));
            }

            let users = self.users.read().unwrap();
            Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
        })
    }
}
