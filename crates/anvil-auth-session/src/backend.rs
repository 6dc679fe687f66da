//! Authentication backend selection.
//!
//! Every backend is one [`AuthProvider`] tagged with its [`BackendKind`].
//! At startup the host reports which backends it found; the configured kind
//! wins, and with `auto_detect` the others are tried in priority order.

use std::collections::{HashMap, HashSet};

use anvil_auth_core::config::LoginPluginConfig;
use anvil_auth_core::{AuthError, AuthProvider, BackendKind, Identity};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

/// A detected backend.
pub struct AuthBackend {
    kind: BackendKind,
    provider: Box<dyn AuthProvider + Send>,
}

impl AuthBackend {
    pub fn new(kind: BackendKind, provider: impl AuthProvider + Send + 'static) -> Self {
        Self {
            kind,
            provider: Box::new(provider),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }
}

impl std::fmt::Debug for AuthBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthBackend").field("kind", &self.kind).finish()
    }
}

impl AuthProvider for AuthBackend {
    fn is_registered(&self, identity: &Identity) -> Result<bool, AuthError> {
        self.provider.is_registered(identity)
    }

    fn is_authenticated(&self, identity: &Identity) -> Result<bool, AuthError> {
        self.provider.is_authenticated(identity)
    }

    fn login(&mut self, identity: &Identity) -> Result<(), AuthError> {
        let result = self.provider.login(identity);
        match &result {
            Ok(()) => info!(backend = %self.kind, user = %identity.id, "Forced login"),
            Err(e) => warn!(backend = %self.kind, user = %identity.id, error = %e, "Login failed"),
        }
        result
    }

    fn register(&mut self, identity: &Identity, password: &SecretString) -> Result<(), AuthError> {
        let result = self.provider.register(identity, password);
        match &result {
            Ok(()) => info!(backend = %self.kind, user = %identity.id, "Registered account"),
            Err(e) => {
                warn!(backend = %self.kind, user = %identity.id, error = %e, "Registration failed")
            }
        }
        result
    }

    fn check_password(
        &self,
        identity: &Identity,
        password: &SecretString,
    ) -> Result<bool, AuthError> {
        let valid = self.provider.check_password(identity, password)?;
        debug!(backend = %self.kind, user = %identity.id, valid, "Checked password");
        Ok(valid)
    }

    fn logout(&mut self, identity: &Identity) -> Result<(), AuthError> {
        debug!(backend = %self.kind, user = %identity.id, "Logging out");
        self.provider.logout(identity)
    }
}

/// Pick the backend to use from the ones the host detected.
///
/// Returns `None` when nothing acceptable was found.
pub fn select_backend(
    config: &LoginPluginConfig,
    mut detected: Vec<AuthBackend>,
) -> Option<AuthBackend> {
    let order: Vec<BackendKind> = if config.auto_detect {
        std::iter::once(config.kind)
            .chain(BackendKind::PRIORITY.into_iter().filter(|k| *k != config.kind))
            .collect()
    } else {
        vec![config.kind]
    };

    for kind in order {
        if let Some(pos) = detected.iter().position(|b| b.kind == kind) {
            let backend = detected.swap_remove(pos);
            if kind == config.kind {
                info!(backend = %kind, "Using configured login backend");
            } else {
                info!(
                    configured = %config.kind,
                    backend = %kind,
                    "Configured login backend not found, falling back"
                );
            }
            return Some(backend);
        }
    }

    warn!(
        configured = %config.kind,
        auto_detect = config.auto_detect,
        "No login backend available"
    );
    None
}

/// In-process account store.
///
/// Accounts are keyed by case-insensitive name, the way server login
/// plugins key them. Passwords are compared as given; hashing belongs to a
/// real backend.
#[derive(Default)]
pub struct MemoryAuthProvider {
    accounts: HashMap<String, SecretString>,
    logged_in: HashSet<String>,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account.
    pub fn with_account(mut self, name: &str, password: &str) -> Self {
        self.accounts
            .insert(key(name), SecretString::from(password.to_string()));
        self
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

// Manual Debug implementation to avoid exposing secrets
impl std::fmt::Debug for MemoryAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAuthProvider")
            .field("accounts", &self.accounts.len())
            .field("logged_in", &self.logged_in.len())
            .finish()
    }
}

impl AuthProvider for MemoryAuthProvider {
    fn is_registered(&self, identity: &Identity) -> Result<bool, AuthError> {
        Ok(self.accounts.contains_key(&key(&identity.name)))
    }

    fn is_authenticated(&self, identity: &Identity) -> Result<bool, AuthError> {
        Ok(self.logged_in.contains(&key(&identity.name)))
    }

    fn login(&mut self, identity: &Identity) -> Result<(), AuthError> {
        let name = key(&identity.name);
        if !self.accounts.contains_key(&name) {
            return Err(AuthError::Rejected(format!("no account named {}", identity.name)));
        }
        self.logged_in.insert(name);
        Ok(())
    }

    fn register(&mut self, identity: &Identity, password: &SecretString) -> Result<(), AuthError> {
        let name = key(&identity.name);
        if self.accounts.contains_key(&name) {
            return Err(AuthError::Rejected(format!("{} is already registered", identity.name)));
        }
        self.accounts.insert(name, password.clone());
        Ok(())
    }

    fn check_password(
        &self,
        identity: &Identity,
        password: &SecretString,
    ) -> Result<bool, AuthError> {
        Ok(self
            .accounts
            .get(&key(&identity.name))
            .is_some_and(|stored| stored.expose_secret() == password.expose_secret()))
    }

    fn logout(&mut self, identity: &Identity) -> Result<(), AuthError> {
        self.logged_in.remove(&key(&identity.name));
        Ok(())
    }
}
