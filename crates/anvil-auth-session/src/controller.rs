//! Dialog session controller.
//!
//! Owns at most one session per user. Opening is asynchronous from the
//! host's point of view: an attempt is rendered, then checked one tick later
//! against what the user actually has on screen, and retried with increasing
//! delays when something else (usually the authentication plugin restricting
//! the player) got in the way.
//!
//! Scheduled work carries the session sequence number it belongs to. A task
//! whose session has since been closed or replaced finds a different sequence
//! and does nothing.

use std::collections::HashMap;
use std::sync::Arc;

use anvil_auth_core::{
    DialogHost, DialogState, DialogView, GuiError, GuiType, HostError, Identity, MenuLayout,
    ReopenGuard, ScheduledTask, Scheduler, SessionSeq, Ticks, UserId,
};
use tracing::{debug, info, warn};

use crate::actions::run_actions;
use crate::session::Session;

/// Delay before each open attempt, in ticks.
pub const DEFAULT_RETRY_DELAYS: [Ticks; 3] = [0, 10, 40];

/// Ticks between an open attempt and its validation.
pub const VALIDATION_DELAY: Ticks = 1;

/// Outcome of a scheduled open step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenProgress {
    /// The task no longer matches a live opening session.
    Stale,
    /// Another attempt or validation is scheduled.
    Pending,
    /// The dialog is on screen.
    Opened,
}

/// Single-session-per-user dialog controller.
#[derive(Debug)]
pub struct GuiSessionController {
    sessions: HashMap<UserId, Session>,
    retry_delays: Vec<Ticks>,
    placeholder: String,
    next_seq: SessionSeq,
}

impl GuiSessionController {
    /// Create a controller.
    ///
    /// `retry_delays[i]` is the wait before attempt `i + 1`; an empty list
    /// means a single immediate attempt. `placeholder` is shown in the
    /// input slot of every rendered dialog.
    pub fn new(retry_delays: Vec<Ticks>, placeholder: impl Into<String>) -> Self {
        Self {
            sessions: HashMap::new(),
            retry_delays: normalize_delays(retry_delays),
            placeholder: placeholder.into(),
            next_seq: 1,
        }
    }

    /// Apply reloaded settings. Open sessions are not touched.
    pub fn configure(&mut self, retry_delays: Vec<Ticks>, placeholder: impl Into<String>) {
        self.retry_delays = normalize_delays(retry_delays);
        self.placeholder = placeholder.into();
    }

    pub fn max_attempts(&self) -> u32 {
        self.retry_delays.len() as u32
    }

    /// Start opening a dialog, replacing any session the user already has.
    ///
    /// Returns the sequence number of the new session. `Opening` stays marked
    /// in `guard` until the open resolves.
    pub fn open(
        &mut self,
        host: &mut dyn DialogHost,
        guard: &mut ReopenGuard,
        scheduler: &mut dyn Scheduler,
        identity: &Identity,
        gui_type: GuiType,
        layout: Arc<MenuLayout>,
    ) -> Result<SessionSeq, GuiError> {
        let user = identity.id;
        if !host.is_online(user) {
            return Err(GuiError::Offline(user));
        }

        if self.sessions.contains_key(&user) {
            debug!(user = %user, "Replacing existing session");
            if let Err(e) = self.close(host, guard, user) {
                warn!(user = %user, error = %e, "Failed to close previous dialog");
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.sessions
            .insert(user, Session::new(identity.clone(), gui_type, layout, seq));
        guard.mark_opening(user);
        info!(user = %user, gui_type = %gui_type, seq, "Opening dialog");

        match self.retry_delays.first().copied() {
            Some(0) | None => self.attempt(host, guard, scheduler, user, seq, 1)?,
            Some(delay) => scheduler.after(
                delay,
                ScheduledTask::OpenAttempt {
                    user,
                    seq,
                    attempt: 1,
                },
            ),
        }
        Ok(seq)
    }

    /// Run a scheduled open attempt.
    pub fn on_open_attempt(
        &mut self,
        host: &mut dyn DialogHost,
        guard: &mut ReopenGuard,
        scheduler: &mut dyn Scheduler,
        user: UserId,
        seq: SessionSeq,
        attempt: u32,
    ) -> Result<OpenProgress, GuiError> {
        if !self.is_opening_session(user, seq) {
            debug!(user = %user, seq, attempt, "Dropping stale open attempt");
            return Ok(OpenProgress::Stale);
        }
        self.attempt(host, guard, scheduler, user, seq, attempt)?;
        Ok(OpenProgress::Pending)
    }

    /// Check, one tick after an attempt, that the dialog is on screen.
    pub fn validate_open(
        &mut self,
        host: &mut dyn DialogHost,
        guard: &mut ReopenGuard,
        scheduler: &mut dyn Scheduler,
        user: UserId,
        seq: SessionSeq,
        attempt: u32,
    ) -> Result<OpenProgress, GuiError> {
        let Some(session) = self.sessions.get_mut(&user).filter(|s| {
            s.seq() == seq && s.state() == DialogState::Opening && s.attempts() == attempt
        }) else {
            debug!(user = %user, seq, attempt, "Dropping stale validation");
            return Ok(OpenProgress::Stale);
        };

        if !host.is_online(user) {
            self.abandon(guard, user);
            return Err(GuiError::Offline(user));
        }

        let shown = session.handle().is_some() && host.current_dialog(user) == session.handle();
        if !shown {
            debug!(user = %user, attempt, "Dialog not on screen after attempt");
            self.retry_or_fail(guard, scheduler, user, seq, attempt)?;
            return Ok(OpenProgress::Pending);
        }

        session.transition(DialogState::Open)?;
        guard.unmark_opening(user);
        let identity = session.identity().clone();
        let layout = Arc::clone(session.layout());
        info!(user = %user, gui_type = %session.gui_type(), attempt, "Dialog open");

        run_actions(host, &identity, &layout.open_actions);
        Ok(OpenProgress::Opened)
    }

    /// Move an open dialog to `Confirming`.
    pub fn begin_confirm(&mut self, user: UserId) -> Result<(), GuiError> {
        let session = self.sessions.get_mut(&user).ok_or(GuiError::InvalidTransition {
            from: DialogState::Closed,
            to: DialogState::Confirming,
        })?;
        session.transition(DialogState::Confirming)
    }

    /// Close the user's dialog.
    ///
    /// Returns whether a session existed. Session state is cleaned up even
    /// when the host reports an error.
    pub fn close(
        &mut self,
        host: &mut dyn DialogHost,
        guard: &mut ReopenGuard,
        user: UserId,
    ) -> Result<bool, GuiError> {
        guard.unmark_opening(user);
        let Some(mut session) = self.sessions.remove(&user) else {
            return Ok(false);
        };
        session.transition(DialogState::Closed)?;

        let closed = host.close_dialog(user);
        run_actions(host, session.identity(), &session.layout().close_actions);
        debug!(user = %user, gui_type = %session.gui_type(), "Dialog closed");

        match closed {
            Ok(()) | Err(HostError::NoDialog) | Err(HostError::Offline) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Record a close the host already performed.
    ///
    /// Runs the close actions without asking the host to close anything.
    pub fn finish_closed(
        &mut self,
        host: &mut dyn DialogHost,
        guard: &mut ReopenGuard,
        user: UserId,
    ) -> Option<GuiType> {
        guard.unmark_opening(user);
        let mut session = self.sessions.remove(&user)?;
        if let Err(e) = session.transition(DialogState::Closed) {
            warn!(user = %user, error = %e, "Closed session in unexpected state");
        }
        run_actions(host, session.identity(), &session.layout().close_actions);
        debug!(user = %user, gui_type = %session.gui_type(), "Dialog closed by host");
        Some(session.gui_type())
    }

    /// Close every session, e.g. before a reload.
    pub fn close_all(&mut self, host: &mut dyn DialogHost, guard: &mut ReopenGuard) -> usize {
        let users: Vec<UserId> = self.sessions.keys().copied().collect();
        for user in &users {
            if let Err(e) = self.close(host, guard, *user) {
                warn!(user = %user, error = %e, "Failed to close dialog");
            }
        }
        users.len()
    }

    pub fn has_active(&self, user: UserId) -> bool {
        self.sessions
            .get(&user)
            .is_some_and(|s| s.state().is_live())
    }

    /// The user's dialog state; `Closed` without a session.
    pub fn state(&self, user: UserId) -> DialogState {
        self.sessions
            .get(&user)
            .map(Session::state)
            .unwrap_or(DialogState::Closed)
    }

    pub fn session(&self, user: UserId) -> Option<&Session> {
        self.sessions.get(&user)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.values().filter(|s| s.state().is_live()).count()
    }

    fn is_opening_session(&self, user: UserId, seq: SessionSeq) -> bool {
        self.sessions
            .get(&user)
            .is_some_and(|s| s.seq() == seq && s.state() == DialogState::Opening)
    }

    fn attempt(
        &mut self,
        host: &mut dyn DialogHost,
        guard: &mut ReopenGuard,
        scheduler: &mut dyn Scheduler,
        user: UserId,
        seq: SessionSeq,
        attempt: u32,
    ) -> Result<(), GuiError> {
        if !host.is_online(user) {
            self.abandon(guard, user);
            return Err(GuiError::Offline(user));
        }
        let Some(session) = self.sessions.get_mut(&user) else {
            return Ok(());
        };

        let view = DialogView {
            gui_type: session.gui_type(),
            layout: session.layout(),
            placeholder: &self.placeholder,
        };
        match host.open_dialog(user, &view) {
            Ok(handle) => {
                session.record_attempt(attempt, Some(handle));
                debug!(user = %user, attempt, "Open attempt rendered");
                scheduler.after(
                    VALIDATION_DELAY,
                    ScheduledTask::ValidateOpen { user, seq, attempt },
                );
                Ok(())
            }
            Err(e) => {
                session.record_attempt(attempt, None);
                warn!(user = %user, attempt, error = %e, "Open attempt refused");
                self.retry_or_fail(guard, scheduler, user, seq, attempt)
            }
        }
    }

    fn retry_or_fail(
        &mut self,
        guard: &mut ReopenGuard,
        scheduler: &mut dyn Scheduler,
        user: UserId,
        seq: SessionSeq,
        attempt: u32,
    ) -> Result<(), GuiError> {
        if let Some(delay) = self.retry_delays.get(attempt as usize).copied() {
            let next = attempt + 1;
            debug!(user = %user, next, delay, "Scheduling open retry");
            scheduler.after(
                delay,
                ScheduledTask::OpenAttempt {
                    user,
                    seq,
                    attempt: next,
                },
            );
            return Ok(());
        }

        self.abandon(guard, user);
        warn!(user = %user, attempts = attempt, "Giving up opening dialog");
        Err(GuiError::OpenFailed { attempts: attempt })
    }

    /// Drop an opening session without touching the host.
    fn abandon(&mut self, guard: &mut ReopenGuard, user: UserId) {
        if let Some(mut session) = self.sessions.remove(&user) {
            let _ = session.transition(DialogState::Closed);
        }
        guard.unmark_opening(user);
    }
}

impl Default for GuiSessionController {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAYS.to_vec(), "")
    }
}

fn normalize_delays(delays: Vec<Ticks>) -> Vec<Ticks> {
    if delays.is_empty() {
        vec![0]
    } else {
        delays
    }
}
