//! Error taxonomy for dialog coordination.
//!
//! Every variant is recovered where it occurs: the caller turns it into a
//! user-facing message and continues. None of them tears down a session
//! half-way.

use thiserror::Error;

use crate::traits::{AuthError, HostError};
use crate::types::{DialogState, GuiType, UserId};
use crate::validation::ValidationError;

/// Errors produced by the input engine and the session layer.
#[derive(Debug, Error)]
pub enum GuiError {
    /// No menu layout is configured for the requested dialog type.
    #[error("no menu layout configured for the {0} dialog")]
    ConfigMissing(GuiType),

    /// The authentication backend could not answer.
    #[error("authentication backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend answered and refused the request.
    #[error("authentication backend refused: {0}")]
    Rejected(String),

    /// The password was rejected by the local policy.
    #[error("password rejected: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Every open attempt finished without the host showing the dialog.
    #[error("dialog did not open after {attempts} attempts")]
    OpenFailed { attempts: u32 },

    /// A snapshot matched none of the reconciliation branches.
    #[error("input snapshot could not be reconciled with the buffered value")]
    InputDesync,

    /// The user disconnected before the operation could run.
    #[error("user {0} is not connected")]
    Offline(UserId),

    /// The host refused a rendering operation.
    #[error(transparent)]
    Host(#[from] HostError),

    /// A session was asked to make a move its state machine forbids.
    #[error("illegal dialog transition from {from} to {to}")]
    InvalidTransition { from: DialogState, to: DialogState },
}

impl From<AuthError> for GuiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::BackendUnavailable(reason) => GuiError::BackendUnavailable(reason),
            AuthError::Rejected(reason) => GuiError::Rejected(reason),
        }
    }
}

impl GuiError {
    /// Message key used to surface this error to the user.
    pub fn message_key(&self) -> &'static str {
        match self {
            GuiError::ConfigMissing(_) => "error.config-load-failed",
            GuiError::BackendUnavailable(_) => "error.backend-unavailable",
            GuiError::Rejected(_) => "error.request-rejected",
            GuiError::ValidationFailed(err) => err.message_key(),
            GuiError::OpenFailed { .. } | GuiError::Host(_) => "error.gui-creation-failed",
            GuiError::InputDesync | GuiError::Offline(_) | GuiError::InvalidTransition { .. } => {
                "error.internal"
            }
        }
    }
}
