//! Reopen policy for closed dialogs.
//!
//! Closing a dialog looks the same whether the user gave up, another plugin
//! closed it, or our own successful login closed it. The decider tells these
//! apart from the guard and the backend, and fails safe: when the backend
//! cannot answer, nothing is reopened.

use std::fmt;

use anvil_auth_core::{
    AuthProvider, GuiType, Identity, ReopenGuard, ScheduledTask, Scheduler, Ticks,
};
use tracing::{debug, warn};

/// Default wait before a reopen, in ticks.
pub const DEFAULT_REOPEN_DELAY: Ticks = 40;

/// Why a close does not lead to a reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// An open attempt is in flight; the close is its side effect.
    Opening,
    /// The user authenticated through this engine.
    Authenticated,
    /// The backend reports the user as logged in.
    BackendAuthenticated,
    /// A register dialog closed and the account now exists.
    Registered,
    /// The backend could not answer.
    BackendUnavailable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Opening => "open in flight",
            SkipReason::Authenticated => "already authenticated",
            SkipReason::BackendAuthenticated => "backend reports logged in",
            SkipReason::Registered => "account now registered",
            SkipReason::BackendUnavailable => "backend unavailable",
        };
        f.write_str(text)
    }
}

/// What to do after a dialog closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReopenDecision {
    Skip(SkipReason),
    Reopen { delay: Ticks },
}

/// Close-to-reopen policy.
#[derive(Debug, Clone, Copy)]
pub struct CloseReopenDecider {
    reopen_delay: Ticks,
}

impl Default for CloseReopenDecider {
    fn default() -> Self {
        Self::new(DEFAULT_REOPEN_DELAY)
    }
}

impl CloseReopenDecider {
    pub fn new(reopen_delay: Ticks) -> Self {
        Self { reopen_delay }
    }

    pub fn reopen_delay(&self) -> Ticks {
        self.reopen_delay
    }

    /// Decide without side effects. The first matching rule wins.
    pub fn decide(
        &self,
        guard: &ReopenGuard,
        auth: &dyn AuthProvider,
        identity: &Identity,
        gui_type: GuiType,
    ) -> ReopenDecision {
        let user = identity.id;
        if guard.is_opening(user) {
            return ReopenDecision::Skip(SkipReason::Opening);
        }
        if guard.is_authenticated(user) {
            return ReopenDecision::Skip(SkipReason::Authenticated);
        }

        match auth.is_authenticated(identity) {
            Ok(true) => return ReopenDecision::Skip(SkipReason::BackendAuthenticated),
            Ok(false) => {}
            Err(e) => {
                warn!(user = %user, error = %e, "Cannot check login state, not reopening");
                return ReopenDecision::Skip(SkipReason::BackendUnavailable);
            }
        }

        if gui_type == GuiType::Register {
            match auth.is_registered(identity) {
                Ok(true) => return ReopenDecision::Skip(SkipReason::Registered),
                Ok(false) => {}
                Err(e) => {
                    warn!(user = %user, error = %e, "Cannot check registration, not reopening");
                    return ReopenDecision::Skip(SkipReason::BackendUnavailable);
                }
            }
        }

        ReopenDecision::Reopen {
            delay: self.reopen_delay,
        }
    }

    /// Decide and, when the dialog should come back, schedule the reopen.
    pub fn on_dialog_closed(
        &self,
        guard: &ReopenGuard,
        auth: &dyn AuthProvider,
        scheduler: &mut dyn Scheduler,
        identity: &Identity,
        gui_type: GuiType,
    ) -> ReopenDecision {
        let decision = self.decide(guard, auth, identity, gui_type);
        match decision {
            ReopenDecision::Reopen { delay } => {
                debug!(user = %identity.id, gui_type = %gui_type, delay, "Scheduling reopen");
                scheduler.after(
                    delay,
                    ScheduledTask::Reopen {
                        user: identity.id,
                        gui_type,
                    },
                );
            }
            ReopenDecision::Skip(reason) => {
                debug!(
                    user = %identity.id,
                    gui_type = %gui_type,
                    reason = %reason,
                    "Not reopening"
                );
            }
        }
        decision
    }
}
