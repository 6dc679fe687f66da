//! A single dialog session.

use std::sync::Arc;

use anvil_auth_core::{
    DialogHandle, DialogState, GuiError, GuiType, Identity, MenuLayout, SessionSeq,
};
use tracing::warn;

/// One user's dialog, from the first open attempt until it closes.
///
/// The layout is a shared snapshot: a reload swaps the catalog but leaves
/// sessions that are already open on the layout they were opened with.
#[derive(Debug, Clone)]
pub struct Session {
    identity: Identity,
    gui_type: GuiType,
    state: DialogState,
    layout: Arc<MenuLayout>,
    seq: SessionSeq,
    handle: Option<DialogHandle>,
    attempts: u32,
}

impl Session {
    /// Create a session in `Opening`.
    pub fn new(
        identity: Identity,
        gui_type: GuiType,
        layout: Arc<MenuLayout>,
        seq: SessionSeq,
    ) -> Self {
        Self {
            identity,
            gui_type,
            state: DialogState::Opening,
            layout,
            seq,
            handle: None,
            attempts: 0,
        }
    }

    /// Move to `next`, rejecting moves the state machine forbids.
    pub fn transition(&mut self, next: DialogState) -> Result<(), GuiError> {
        if !self.state.can_transition_to(next) {
            warn!(
                user = %self.identity.id,
                from = %self.state,
                to = %next,
                "Rejected dialog transition"
            );
            return Err(GuiError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn gui_type(&self) -> GuiType {
        self.gui_type
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn layout(&self) -> &Arc<MenuLayout> {
        &self.layout
    }

    pub fn seq(&self) -> SessionSeq {
        self.seq
    }

    /// Handle returned by the host for the latest open attempt.
    pub fn handle(&self) -> Option<DialogHandle> {
        self.handle
    }

    /// Number of open attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn record_attempt(&mut self, attempt: u32, handle: Option<DialogHandle>) {
        self.attempts = attempt;
        self.handle = handle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            Identity::named("alice"),
            GuiType::Login,
            Arc::new(MenuLayout::builtin(GuiType::Login)),
            1,
        )
    }

    #[test]
    fn new_session_is_opening() {
        let s = session();
        assert_eq!(s.state(), DialogState::Opening);
        assert_eq!(s.attempts(), 0);
        assert!(s.handle().is_none());
    }

    #[test]
    fn forward_path_then_close() {
        let mut s = session();
        s.transition(DialogState::Open).unwrap();
        s.transition(DialogState::Confirming).unwrap();
        s.transition(DialogState::Closed).unwrap();
        assert_eq!(s.state(), DialogState::Closed);
    }

    #[test]
    fn illegal_transition_keeps_state() {
        let mut s = session();
        let err = s.transition(DialogState::Confirming).unwrap_err();
        assert!(matches!(
            err,
            GuiError::InvalidTransition {
                from: DialogState::Opening,
                to: DialogState::Confirming
            }
        ));
        assert_eq!(s.state(), DialogState::Opening);
    }

    #[test]
    fn record_attempt_updates_handle() {
        let mut s = session();
        s.record_attempt(2, Some(DialogHandle(7)));
        assert_eq!(s.attempts(), 2);
        assert_eq!(s.handle(), Some(DialogHandle(7)));
    }
}
