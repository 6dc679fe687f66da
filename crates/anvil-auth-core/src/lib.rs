//! Core types and engines for anvil-auth.
//!
//! This crate holds everything that does not need a scheduler or a host:
//! the password reconstruction engine, the reopen guard, configuration and
//! the collaborator traits. It has no async runtime so it can be audited and
//! tested in isolation.
//!
//! # Modules
//!
//! - [`types`]: Identifiers and small enums (`UserId`, `GuiType`, `DialogState`)
//! - [`traits`]: Collaborator traits (`AuthProvider`, `DialogHost`, `Scheduler`, `Messaging`)
//! - [`input`]: Password reconstruction from rename snapshots
//! - [`guard`]: `Opening` / `Authenticated` membership sets
//! - [`error`]: The `GuiError` taxonomy
//! - [`config`]: TOML configuration
//! - [`menu`]: Dialog layouts and configured actions
//! - [`messages`]: Message templates
//! - [`validation`]: Password policy
//!
//! # Example
//!
//! ```
//! use anvil_auth_core::{InputCaptureEngine, UserId};
//!
//! let mut engine = InputCaptureEngine::default();
//! let user = UserId::new_v4();
//!
//! assert_eq!(engine.ingest(user, Some("a")), "*");
//! assert_eq!(engine.ingest(user, Some("ab")), "**");
//! assert_eq!(engine.input_len(user), 2);
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod input;
pub mod menu;
pub mod messages;
pub mod traits;
pub mod types;
pub mod validation;

// Re-export commonly used types at the crate root for convenience
pub use config::{Config, ConfigError};
pub use error::GuiError;
pub use guard::ReopenGuard;
pub use input::{InputCaptureEngine, InputSettings, PlaceholderFilter};
pub use menu::{Action, MenuCatalog, MenuItem, MenuLayout};
pub use messages::MessageCatalog;
pub use traits::{
    AuthError, AuthProvider, DialogHost, DialogView, HostError, Messaging, ScheduledTask,
    Scheduler,
};
pub use types::{
    BackendKind, DialogHandle, DialogState, DisplayMode, GuiType, Identity, SessionSeq, Ticks,
    UserId,
};
pub use validation::{PasswordPolicy, ValidationError};
