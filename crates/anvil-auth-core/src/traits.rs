//! Trait definitions for the collaborators the engine consumes.
//!
//! These traits define the interfaces for:
//! - The authentication backend (account lookup, password check, login)
//! - The host rendering boundary (dialogs, slots, chat, commands)
//! - The cooperative tick scheduler
//! - Message resolution
//!
//! The engine never talks to a concrete server; tests plug in mocks and the
//! replay binary plugs in a logging console host.

use secrecy::SecretString;

use crate::menu::MenuLayout;
use crate::types::{DialogHandle, GuiType, Identity, SessionSeq, Ticks, UserId};

/// Error type for authentication backend calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The backend is not loaded, not reachable, or threw.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend answered but refused the operation.
    #[error("backend rejected the request: {0}")]
    Rejected(String),
}

/// Error type for host rendering calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    /// The user is no longer connected.
    #[error("user is offline")]
    Offline,

    /// The host (or another plugin) refused to show the interface.
    #[error("interface refused by host: {0}")]
    Refused(String),

    /// No dialog of ours is open for the user.
    #[error("no dialog open")]
    NoDialog,
}

/// Capability interface over an authentication backend.
///
/// Every call may fail with [`AuthError::BackendUnavailable`]. Callers treat
/// failure as "not authenticated / not registered" unless they document a
/// stricter policy.
pub trait AuthProvider {
    /// Whether an account exists for this identity.
    fn is_registered(&self, identity: &Identity) -> Result<bool, AuthError>;

    /// Whether the identity is logged in right now.
    fn is_authenticated(&self, identity: &Identity) -> Result<bool, AuthError>;

    /// Mark the identity as logged in (the password was checked beforehand).
    fn login(&mut self, identity: &Identity) -> Result<(), AuthError>;

    /// Create an account for the identity.
    fn register(&mut self, identity: &Identity, password: &SecretString) -> Result<(), AuthError>;

    /// Compare a candidate password against the stored one.
    fn check_password(&self, identity: &Identity, password: &SecretString)
        -> Result<bool, AuthError>;

    /// End the identity's login session. Backends that cannot do this
    /// leave it to the server.
    fn logout(&mut self, _identity: &Identity) -> Result<(), AuthError> {
        Ok(())
    }
}

/// What the host needs in order to render a dialog.
#[derive(Debug, Clone, Copy)]
pub struct DialogView<'a> {
    pub gui_type: GuiType,
    pub layout: &'a MenuLayout,
    /// Text shown in the input slot while nothing has been typed.
    pub placeholder: &'a str,
}

/// The host rendering boundary.
///
/// Implementations wrap whatever inventory/dialog API the server exposes.
/// All methods are called from the scheduler thread.
pub trait DialogHost {
    /// Whether the user is still connected.
    fn is_online(&self, user: UserId) -> bool;

    /// Render and show the dialog. A returned handle does not mean the user
    /// actually sees it; see [`DialogHost::current_dialog`].
    fn open_dialog(&mut self, user: UserId, view: &DialogView<'_>)
        -> Result<DialogHandle, HostError>;

    /// The dialog the user is currently looking at, if it is one of ours.
    fn current_dialog(&self, user: UserId) -> Option<DialogHandle>;

    /// Close whatever dialog the user has open. Closing nothing is not an error.
    fn close_dialog(&mut self, user: UserId) -> Result<(), HostError>;

    /// Rewrite the text of the input slot.
    fn set_input_text(&mut self, user: UserId, text: &str) -> Result<(), HostError>;

    /// Rewrite the label of the result (confirm) slot.
    fn set_result_text(&mut self, user: UserId, text: &str) -> Result<(), HostError>;

    /// Send a chat line to the user.
    fn send_message(&mut self, user: UserId, text: &str);

    /// Disconnect the user with a reason.
    fn kick(&mut self, user: UserId, reason: &str);

    /// Run a console command.
    fn dispatch_command(&mut self, command: &str);
}

/// Deferred work for the cooperative scheduler.
///
/// Tasks are plain data: when one fires, its owner re-checks every
/// precondition (user connected, same session, guard state) before acting,
/// so a stale task simply does nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledTask {
    /// Render attempt `attempt` (1-based) of session `seq`.
    OpenAttempt {
        user: UserId,
        seq: SessionSeq,
        attempt: u32,
    },
    /// Check that attempt `attempt` of session `seq` is really on screen.
    ValidateOpen {
        user: UserId,
        seq: SessionSeq,
        attempt: u32,
    },
    /// Re-apply the mask to the input slot after the host's one-tick echo.
    RefreshMask { user: UserId, seq: SessionSeq },
    /// Reopen a dialog the user closed without authenticating.
    Reopen { user: UserId, gui_type: GuiType },
    /// Join-time check; `attempt` counts polls already made.
    AutoOpen { user: UserId, attempt: u32 },
    /// Open login or register depending on the account state.
    OpenAppropriate { user: UserId },
}

impl ScheduledTask {
    /// The user this task belongs to.
    pub fn user(&self) -> UserId {
        match self {
            ScheduledTask::OpenAttempt { user, .. }
            | ScheduledTask::ValidateOpen { user, .. }
            | ScheduledTask::RefreshMask { user, .. }
            | ScheduledTask::Reopen { user, .. }
            | ScheduledTask::AutoOpen { user, .. }
            | ScheduledTask::OpenAppropriate { user } => *user,
        }
    }
}

/// Cooperative scheduler: runs a task after a number of ticks.
pub trait Scheduler {
    fn after(&mut self, delay: Ticks, task: ScheduledTask);
}

/// Message resolution.
pub trait Messaging {
    /// Resolve a message key, substituting `{name}` placeholders.
    fn resolve(&self, key: &str, placeholders: &[(&str, &str)]) -> String;

    /// Resolve and deliver a message. Empty messages are not sent.
    fn send(
        &self,
        host: &mut dyn DialogHost,
        identity: &Identity,
        key: &str,
        placeholders: &[(&str, &str)],
    ) {
        let text = self.resolve(key, placeholders);
        if !text.is_empty() {
            host.send_message(identity.id, &text);
        }
    }
}
