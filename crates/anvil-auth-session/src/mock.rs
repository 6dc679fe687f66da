//! Mock collaborators for testing.
//!
//! [`MockDialogHost`] records everything the engine asks the host to do and
//! can be told to swallow or refuse open attempts. [`MockAuthProvider`]
//! answers from an in-memory account table, can simulate an unavailable
//! backend and counts its calls.
//!
//! # Example
//!
//! ```
//! use anvil_auth_core::{AuthProvider, Identity};
//! use anvil_auth_session::mock::{MockAuthProvider, MockDialogHost};
//! use secrecy::SecretString;
//!
//! let alice = Identity::named("alice");
//! let host = MockDialogHost::new().with_online(alice.id);
//! let auth = MockAuthProvider::new().with_account(&alice, "secret1");
//!
//! assert!(auth.check_password(&alice, &SecretString::from("secret1")).unwrap());
//! assert_eq!(auth.call_count(), 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anvil_auth_core::{
    AuthError, AuthProvider, DialogHandle, DialogHost, DialogView, GuiType, HostError, Identity,
    UserId,
};
use secrecy::{ExposeSecret, SecretString};

/// A recording host.
#[derive(Debug, Default)]
pub struct MockDialogHost {
    online: HashSet<UserId>,
    showing: HashMap<UserId, DialogHandle>,
    next_handle: u64,
    /// Opens that return a handle but leave something else on screen.
    hijacked_opens: u32,
    /// Opens that fail outright.
    refused_opens: u32,
    opened: Vec<(UserId, GuiType)>,
    closed: Vec<UserId>,
    messages: Vec<(UserId, String)>,
    kicks: Vec<(UserId, String)>,
    commands: Vec<String>,
    input_texts: Vec<(UserId, String)>,
    result_texts: Vec<(UserId, String)>,
}

impl MockDialogHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a user as connected.
    pub fn with_online(mut self, user: UserId) -> Self {
        self.online.insert(user);
        self
    }

    /// The next `count` opens report success but the dialog never shows.
    pub fn hijack_next_opens(mut self, count: u32) -> Self {
        self.hijacked_opens = count;
        self
    }

    /// The next `count` opens return an error.
    pub fn refuse_next_opens(mut self, count: u32) -> Self {
        self.refused_opens = count;
        self
    }

    pub fn connect(&mut self, user: UserId) {
        self.online.insert(user);
    }

    pub fn disconnect(&mut self, user: UserId) {
        self.online.remove(&user);
        self.showing.remove(&user);
    }

    /// Simulate the user closing the dialog (escape key).
    pub fn close_by_user(&mut self, user: UserId) {
        self.showing.remove(&user);
    }

    /// Whether one of our dialogs is on screen for the user.
    pub fn is_showing(&self, user: UserId) -> bool {
        self.showing.contains_key(&user)
    }

    /// Every successful `open_dialog` call, hijacked ones included.
    pub fn opened(&self) -> &[(UserId, GuiType)] {
        &self.opened
    }

    pub fn open_count(&self) -> usize {
        self.opened.len()
    }

    pub fn closed(&self) -> &[UserId] {
        &self.closed
    }

    pub fn messages_for(&self, user: UserId) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, m)| m.as_str())
            .collect()
    }

    pub fn last_message(&self, user: UserId) -> Option<&str> {
        self.messages_for(user).last().copied()
    }

    pub fn kicks(&self) -> &[(UserId, String)] {
        &self.kicks
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn last_input_text(&self, user: UserId) -> Option<&str> {
        self.input_texts
            .iter()
            .rev()
            .find(|(u, _)| *u == user)
            .map(|(_, t)| t.as_str())
    }

    pub fn last_result_text(&self, user: UserId) -> Option<&str> {
        self.result_texts
            .iter()
            .rev()
            .find(|(u, _)| *u == user)
            .map(|(_, t)| t.as_str())
    }
}

impl DialogHost for MockDialogHost {
    fn is_online(&self, user: UserId) -> bool {
        self.online.contains(&user)
    }

    fn open_dialog(
        &mut self,
        user: UserId,
        view: &DialogView<'_>,
    ) -> Result<DialogHandle, HostError> {
        if !self.online.contains(&user) {
            return Err(HostError::Offline);
        }
        if self.refused_opens > 0 {
            self.refused_opens -= 1;
            return Err(HostError::Refused("open-inventory restricted".into()));
        }

        self.next_handle += 1;
        let handle = DialogHandle(self.next_handle);
        self.opened.push((user, view.gui_type));

        if self.hijacked_opens > 0 {
            self.hijacked_opens -= 1;
            self.showing.remove(&user);
        } else {
            self.showing.insert(user, handle);
        }
        Ok(handle)
    }

    fn current_dialog(&self, user: UserId) -> Option<DialogHandle> {
        self.showing.get(&user).copied()
    }

    fn close_dialog(&mut self, user: UserId) -> Result<(), HostError> {
        self.closed.push(user);
        self.showing.remove(&user);
        Ok(())
    }

    fn set_input_text(&mut self, user: UserId, text: &str) -> Result<(), HostError> {
        if !self.showing.contains_key(&user) {
            return Err(HostError::NoDialog);
        }
        self.input_texts.push((user, text.to_string()));
        Ok(())
    }

    fn set_result_text(&mut self, user: UserId, text: &str) -> Result<(), HostError> {
        if !self.showing.contains_key(&user) {
            return Err(HostError::NoDialog);
        }
        self.result_texts.push((user, text.to_string()));
        Ok(())
    }

    fn send_message(&mut self, user: UserId, text: &str) {
        self.messages.push((user, text.to_string()));
    }

    fn kick(&mut self, user: UserId, reason: &str) {
        self.kicks.push((user, reason.to_string()));
        self.online.remove(&user);
        self.showing.remove(&user);
    }

    fn dispatch_command(&mut self, command: &str) {
        self.commands.push(command.to_string());
    }
}

/// An account table with call counting.
#[derive(Default)]
pub struct MockAuthProvider {
    passwords: HashMap<UserId, SecretString>,
    authenticated: HashSet<UserId>,
    unavailable: bool,
    failing_login: bool,
    refusing_register: bool,
    call_count: Arc<AtomicUsize>,
    login_calls: Arc<AtomicUsize>,
    register_calls: Arc<AtomicUsize>,
}

impl MockAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registered account.
    pub fn with_account(mut self, identity: &Identity, password: &str) -> Self {
        self.passwords
            .insert(identity.id, SecretString::from(password.to_string()));
        self
    }

    /// Every call fails with `BackendUnavailable`.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// `login` fails while every other call works.
    pub fn with_failing_login(mut self) -> Self {
        self.failing_login = true;
        self
    }

    /// `register` is refused even for new accounts.
    pub fn with_refusing_register(mut self) -> Self {
        self.refusing_register = true;
        self
    }

    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Change the logged-in state behind the engine's back.
    pub fn set_authenticated(&mut self, user: UserId, authenticated: bool) {
        if authenticated {
            self.authenticated.insert(user);
        } else {
            self.authenticated.remove(&user);
        }
    }

    /// Total number of trait calls.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// Get a clone of the total call counter for external tracking.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.call_count)
    }

    fn enter(&self) -> Result<(), AuthError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(AuthError::BackendUnavailable("mock backend offline".into()));
        }
        Ok(())
    }
}

// Manual Debug implementation to avoid exposing secrets
impl std::fmt::Debug for MockAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAuthProvider")
            .field("accounts", &self.passwords.len())
            .field("authenticated", &self.authenticated.len())
            .field("unavailable", &self.unavailable)
            .finish()
    }
}

impl AuthProvider for MockAuthProvider {
    fn is_registered(&self, identity: &Identity) -> Result<bool, AuthError> {
        self.enter()?;
        Ok(self.passwords.contains_key(&identity.id))
    }

    fn is_authenticated(&self, identity: &Identity) -> Result<bool, AuthError> {
        self.enter()?;
        Ok(self.authenticated.contains(&identity.id))
    }

    fn login(&mut self, identity: &Identity) -> Result<(), AuthError> {
        self.enter()?;
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_login {
            return Err(AuthError::Rejected("login refused".into()));
        }
        self.authenticated.insert(identity.id);
        Ok(())
    }

    fn register(&mut self, identity: &Identity, password: &SecretString) -> Result<(), AuthError> {
        self.enter()?;
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.refusing_register {
            return Err(AuthError::Rejected("registration refused".into()));
        }
        if self.passwords.contains_key(&identity.id) {
            return Err(AuthError::Rejected("already registered".into()));
        }
        self.passwords.insert(identity.id, password.clone());
        Ok(())
    }

    fn check_password(
        &self,
        identity: &Identity,
        password: &SecretString,
    ) -> Result<bool, AuthError> {
        self.enter()?;
        Ok(self
            .passwords
            .get(&identity.id)
            .is_some_and(|stored| stored.expose_secret() == password.expose_secret()))
    }

    fn logout(&mut self, identity: &Identity) -> Result<(), AuthError> {
        self.enter()?;
        self.authenticated.remove(&identity.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_auth_core::MenuLayout;

    fn view(layout: &MenuLayout) -> DialogView<'_> {
        DialogView {
            gui_type: GuiType::Login,
            layout,
            placeholder: "Enter password",
        }
    }

    #[test]
    fn host_shows_opened_dialog() {
        let user = UserId::new_v4();
        let layout = MenuLayout::builtin(GuiType::Login);
        let mut host = MockDialogHost::new().with_online(user);

        let handle = host.open_dialog(user, &view(&layout)).unwrap();
        assert_eq!(host.current_dialog(user), Some(handle));

        host.close_by_user(user);
        assert_eq!(host.current_dialog(user), None);
    }

    #[test]
    fn host_hijack_and_refuse() {
        let user = UserId::new_v4();
        let layout = MenuLayout::builtin(GuiType::Login);
        let mut host = MockDialogHost::new()
            .with_online(user)
            .refuse_next_opens(1)
            .hijack_next_opens(1);

        assert!(matches!(
            host.open_dialog(user, &view(&layout)),
            Err(HostError::Refused(_))
        ));
        assert!(host.open_dialog(user, &view(&layout)).is_ok());
        assert_eq!(host.current_dialog(user), None);
        let handle = host.open_dialog(user, &view(&layout)).unwrap();
        assert_eq!(host.current_dialog(user), Some(handle));
        assert_eq!(host.open_count(), 2);
    }

    #[test]
    fn host_rejects_offline_user() {
        let layout = MenuLayout::builtin(GuiType::Login);
        let mut host = MockDialogHost::new();
        assert!(matches!(
            host.open_dialog(UserId::new_v4(), &view(&layout)),
            Err(HostError::Offline)
        ));
    }

    #[test]
    fn auth_accounts_and_counters() {
        let alice = Identity::named("alice");
        let mut auth = MockAuthProvider::new().with_account(&alice, "secret1");

        assert!(auth.is_registered(&alice).unwrap());
        assert!(!auth.check_password(&alice, &SecretString::from("nope")).unwrap());
        auth.login(&alice).unwrap();
        assert!(auth.is_authenticated(&alice).unwrap());
        assert_eq!(auth.login_calls(), 1);
        assert_eq!(auth.call_count(), 4);
    }

    #[test]
    fn auth_unavailable_fails_every_call() {
        let alice = Identity::named("alice");
        let auth = MockAuthProvider::unavailable();
        assert!(matches!(
            auth.is_registered(&alice),
            Err(AuthError::BackendUnavailable(_))
        ));
        assert_eq!(auth.call_count(), 1);
    }

    #[test]
    fn auth_register_rejects_duplicates() {
        let bob = Identity::named("bob");
        let mut auth = MockAuthProvider::new();
        auth.register(&bob, &SecretString::from("pw123456")).unwrap();
        assert!(matches!(
            auth.register(&bob, &SecretString::from("other")),
            Err(AuthError::Rejected(_))
        ));
        assert_eq!(auth.register_calls(), 2);
    }
}
