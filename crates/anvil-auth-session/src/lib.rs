//! Dialog session coordination for anvil-auth.
//!
//! This crate drives the primitives from `anvil-auth-core` against a host:
//! it owns the per-user sessions, decides when a closed dialog comes back,
//! selects the authentication backend and runs scheduled work on a tick
//! scheduler.
//!
//! Everything here runs on one thread. Input arriving elsewhere is handed
//! over through [`relay`].
//!
//! # Example
//!
//! ```
//! use anvil_auth_core::{Config, GuiType, Identity};
//! use anvil_auth_session::mock::{MockAuthProvider, MockDialogHost};
//! use anvil_auth_session::{AuthGui, TickScheduler};
//!
//! let alice = Identity::named("alice");
//! let host = MockDialogHost::new().with_online(alice.id);
//! let auth = MockAuthProvider::new().with_account(&alice, "secret1");
//! let mut gui = AuthGui::new(&Config::default(), host, auth, TickScheduler::new());
//!
//! gui.on_join(alice.clone());
//! gui.open(alice.id, GuiType::Login).unwrap();
//! gui.tick();
//! gui.on_rename(alice.id, Some("secret1"));
//! gui.on_click(alice.id, 2);
//! assert!(gui.guard().is_authenticated(alice.id));
//! ```

pub mod actions;
pub mod backend;
pub mod controller;
pub mod decider;
pub mod gui;
pub mod mock;
pub mod relay;
pub mod replay;
pub mod scheduler;
pub mod session;

// Re-export main components
pub use backend::{select_backend, AuthBackend, MemoryAuthProvider};
pub use controller::{GuiSessionController, OpenProgress};
pub use decider::{CloseReopenDecider, ReopenDecision, SkipReason};
pub use gui::AuthGui;
pub use relay::{input_relay, InputInbox, InputSender, RawInput, RelayClosed};
pub use replay::{ConsoleHost, Replay, Script, ScriptError};
pub use scheduler::TickScheduler;
pub use session::Session;
