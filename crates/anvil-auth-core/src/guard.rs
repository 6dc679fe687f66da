//! Reopen guard sets.
//!
//! Membership only, no policy. The session controller and the reopen decider
//! both read the same instance, which is passed to them by reference.

use std::collections::HashSet;

use crate::types::UserId;

/// `Opening` and `Authenticated` membership, keyed by user.
///
/// A user in `opening` has an open attempt in flight. A user in
/// `authenticated` logged in or registered during this connection and must
/// not get an automatic dialog again until logout or disconnect.
#[derive(Debug, Default, Clone)]
pub struct ReopenGuard {
    opening: HashSet<UserId>,
    authenticated: HashSet<UserId>,
}

impl ReopenGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_opening(&mut self, user: UserId) {
        self.opening.insert(user);
    }

    pub fn unmark_opening(&mut self, user: UserId) {
        self.opening.remove(&user);
    }

    pub fn is_opening(&self, user: UserId) -> bool {
        self.opening.contains(&user)
    }

    pub fn mark_authenticated(&mut self, user: UserId) {
        self.authenticated.insert(user);
    }

    pub fn unmark_authenticated(&mut self, user: UserId) {
        self.authenticated.remove(&user);
    }

    pub fn is_authenticated(&self, user: UserId) -> bool {
        self.authenticated.contains(&user)
    }

    /// Drop every trace of a disconnected user.
    pub fn forget(&mut self, user: UserId) {
        self.opening.remove(&user);
        self.authenticated.remove(&user);
    }

    pub fn opening_len(&self) -> usize {
        self.opening.len()
    }

    pub fn authenticated_len(&self) -> usize {
        self.authenticated.len()
    }

    pub fn clear(&mut self) {
        self.opening.clear();
        self.authenticated.clear();
    }
}
