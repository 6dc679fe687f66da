//! Core types for anvil-auth.
//!
//! This module contains the identifiers and small enums shared by every
//! component: user identity, dialog kinds, the dialog state machine and the
//! display mode of the password field.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A duration measured in host scheduler ticks.
pub type Ticks = u64;

/// Sequence number distinguishing successive sessions of the same user.
pub type SessionSeq = u64;

/// Stable handle for a connected user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a fresh random identifier.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an identifier handed out by the host.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A connected user: the stable id plus the name shown in messages.
///
/// Backends that key accounts by name (rather than by id) read `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub id: UserId,
    pub name: String,
}

impl Identity {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Create an identity with a freshly generated id.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(UserId::new_v4(), name)
    }
}

/// The kind of authentication dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuiType {
    /// Password entry for an existing account.
    Login,
    /// Password choice for a new account.
    Register,
}

impl GuiType {
    /// Message key sent when the user cancels this dialog.
    pub fn cancelled_key(&self) -> &'static str {
        match self {
            GuiType::Login => "gui.login-cancelled",
            GuiType::Register => "gui.register-cancelled",
        }
    }

    /// Message key sent when this dialog is opened automatically.
    pub fn required_key(&self) -> &'static str {
        match self {
            GuiType::Login => "gui.login-required",
            GuiType::Register => "gui.register-required",
        }
    }

    /// Message key sent after the backend accepted the credentials.
    pub fn success_key(&self) -> &'static str {
        match self {
            GuiType::Login => "gui.login-success",
            GuiType::Register => "gui.register-success",
        }
    }
}

impl fmt::Display for GuiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuiType::Login => write!(f, "login"),
            GuiType::Register => write!(f, "register"),
        }
    }
}

/// Lifecycle of a dialog session.
///
/// ```text
/// Closed -> Opening -> Open -> Confirming -> Closed
///              |         |
///              +---------+-----------------> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogState {
    Closed,
    Opening,
    Open,
    Confirming,
}

impl DialogState {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Every live state may drop straight to `Closed`; the forward path is
    /// strictly `Opening -> Open -> Confirming`.
    pub fn can_transition_to(&self, next: DialogState) -> bool {
        use DialogState::*;
        matches!(
            (self, next),
            (Closed, Opening)
                | (Opening, Open)
                | (Open, Confirming)
                | (Opening, Closed)
                | (Open, Closed)
                | (Confirming, Closed)
        )
    }

    /// Whether the session still counts as active.
    pub fn is_live(&self) -> bool {
        !matches!(self, DialogState::Closed)
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialogState::Closed => write!(f, "closed"),
            DialogState::Opening => write!(f, "opening"),
            DialogState::Open => write!(f, "open"),
            DialogState::Confirming => write!(f, "confirming"),
        }
    }
}

/// How the password field is echoed back to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayMode {
    /// The real value is shown as typed.
    Plaintext,
    /// One mask character is shown per real character.
    #[default]
    Masked,
}

impl DisplayMode {
    /// Map the `show_password_plaintext` switch onto a mode.
    pub fn from_plaintext_flag(show_plaintext: bool) -> Self {
        if show_plaintext {
            DisplayMode::Plaintext
        } else {
            DisplayMode::Masked
        }
    }
}

/// Opaque handle the host returns for a rendered dialog.
///
/// Used to check, one tick after an open attempt, that the interface the
/// user is looking at is the one that was just rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DialogHandle(pub u64);

/// Authentication backends that can be selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    AuthMe,
    CatSeedLogin,
    /// In-process account store (tests, replays, single-node setups).
    Memory,
}

impl BackendKind {
    /// Detection order used when the configured backend is unavailable.
    pub const PRIORITY: [BackendKind; 3] = [
        BackendKind::AuthMe,
        BackendKind::CatSeedLogin,
        BackendKind::Memory,
    ];
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::AuthMe => write!(f, "authme"),
            BackendKind::CatSeedLogin => write!(f, "catseedlogin"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}
