//! Hand-off of raw input from the network thread to the scheduler thread.
//!
//! Rename snapshots may arrive on a thread that must not touch session
//! state. They are queued here and drained at the start of every tick.

use anvil_auth_core::UserId;
use thiserror::Error;
use tokio::sync::mpsc;
use zeroize::Zeroizing;

/// The receiving side was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("input relay is closed")]
pub struct RelayClosed;

/// One raw rename snapshot.
pub struct RawInput {
    pub user: UserId,
    pub text: Option<Zeroizing<String>>,
}

// Manual Debug implementation to avoid exposing secrets
impl std::fmt::Debug for RawInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawInput")
            .field("user", &self.user)
            .field("text", &self.text.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Producer handle; cheap to clone and usable from any thread.
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: mpsc::UnboundedSender<RawInput>,
}

impl InputSender {
    pub fn send(&self, user: UserId, text: Option<&str>) -> Result<(), RelayClosed> {
        let input = RawInput {
            user,
            text: text.map(|t| Zeroizing::new(t.to_string())),
        };
        self.tx.send(input).map_err(|_| RelayClosed)
    }
}

/// Consumer side, owned by the scheduler thread.
#[derive(Debug)]
pub struct InputInbox {
    rx: mpsc::UnboundedReceiver<RawInput>,
}

impl InputInbox {
    /// Take everything queued so far without waiting.
    pub fn drain(&mut self) -> Vec<RawInput> {
        let mut out = Vec::new();
        while let Ok(input) = self.rx.try_recv() {
            out.push(input);
        }
        out
    }
}

/// Create a connected sender/inbox pair.
pub fn input_relay() -> (InputSender, InputInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (InputSender { tx }, InputInbox { rx })
}
