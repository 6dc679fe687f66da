//! Scripted event replay.
//!
//! A script is a TOML file with a list of accounts for the in-memory backend
//! and a timeline of host events:
//!
//! ```toml
//! [[accounts]]
//! name = "alice"
//! password = "secret1"
//!
//! [[event]]
//! tick = 0
//! user = "alice"
//! action = "join"
//!
//! [[event]]
//! tick = 25
//! user = "alice"
//! action = "rename"
//! text = "secret1"
//!
//! [[event]]
//! tick = 26
//! user = "alice"
//! action = "click"
//! slot = 2
//! ```
//!
//! [`Replay`] feeds the events into an [`AuthGui`] backed by a
//! [`ConsoleHost`], which logs what a real host would render.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use anvil_auth_core::{
    AuthProvider, Config, DialogHandle, DialogHost, DialogView, GuiType, HostError, Identity,
    Ticks, UserId,
};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::backend::AuthBackend;
use crate::gui::AuthGui;
use crate::relay::InputSender;
use crate::scheduler::TickScheduler;

/// Errors that can occur when loading a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse script: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A replay script.
#[derive(Debug, Default, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub accounts: Vec<ScriptAccount>,
    #[serde(default, rename = "event")]
    pub events: Vec<ScriptEvent>,
}

impl Script {
    pub fn load_from(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// An account preloaded into the in-memory backend.
#[derive(Deserialize)]
pub struct ScriptAccount {
    pub name: String,
    pub password: String,
}

// Manual Debug implementation to avoid exposing secrets
impl std::fmt::Debug for ScriptAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptAccount")
            .field("name", &self.name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One timeline entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEvent {
    pub tick: Ticks,
    pub user: String,
    #[serde(flatten)]
    pub action: ScriptAction,
}

/// What happens at a timeline entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ScriptAction {
    Join,
    /// Full text-field snapshot; absent means the field was emptied.
    Rename {
        #[serde(default)]
        text: Option<String>,
    },
    Click { slot: u32 },
    /// The user closed the dialog (escape).
    Close,
    /// Login through the backend's own command.
    Login,
    /// Registration through the backend's own command.
    Register { password: String },
    Logout,
    Quit,
}

/// A host that logs every rendering request.
///
/// Closes the engine asks for are queued so the driver can report them back
/// the way a server reports any inventory close.
#[derive(Debug, Default)]
pub struct ConsoleHost {
    online: HashSet<UserId>,
    showing: HashMap<UserId, (DialogHandle, GuiType)>,
    closed: Vec<(UserId, GuiType)>,
    next_handle: u64,
}

impl ConsoleHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, user: UserId) {
        self.online.insert(user);
    }

    pub fn disconnect(&mut self, user: UserId) {
        self.online.remove(&user);
        self.showing.remove(&user);
    }

    /// The user dismissed whatever was on screen.
    pub fn dismiss(&mut self, user: UserId) -> Option<GuiType> {
        self.showing.remove(&user).map(|(_, gui_type)| gui_type)
    }

    pub fn is_showing(&self, user: UserId) -> bool {
        self.showing.contains_key(&user)
    }

    /// Closes performed through [`DialogHost::close_dialog`] since the last call.
    pub fn take_closed(&mut self) -> Vec<(UserId, GuiType)> {
        std::mem::take(&mut self.closed)
    }
}

impl DialogHost for ConsoleHost {
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
        self.next_handle += 1;
        let handle = DialogHandle(self.next_handle);
        self.showing.insert(user, (handle, view.gui_type));
        info!(
            user = %user,
            gui_type = %view.gui_type,
            title = %view.layout.title,
            items = view.layout.items.len(),
            "Dialog shown"
        );
        Ok(handle)
    }

    fn current_dialog(&self, user: UserId) -> Option<DialogHandle> {
        self.showing.get(&user).map(|(handle, _)| *handle)
    }

    fn close_dialog(&mut self, user: UserId) -> Result<(), HostError> {
        let Some((_, gui_type)) = self.showing.remove(&user) else {
            return Err(HostError::NoDialog);
        };
        info!(user = %user, gui_type = %gui_type, "Dialog hidden");
        self.closed.push((user, gui_type));
        Ok(())
    }

    fn set_input_text(&mut self, user: UserId, text: &str) -> Result<(), HostError> {
        if !self.showing.contains_key(&user) {
            return Err(HostError::NoDialog);
        }
        debug!(user = %user, text, "Input slot");
        Ok(())
    }

    fn set_result_text(&mut self, user: UserId, text: &str) -> Result<(), HostError> {
        if !self.showing.contains_key(&user) {
            return Err(HostError::NoDialog);
        }
        debug!(user = %user, text, "Result slot");
        Ok(())
    }

    fn send_message(&mut self, user: UserId, text: &str) {
        info!(user = %user, "{}", text);
    }

    fn kick(&mut self, user: UserId, reason: &str) {
        info!(user = %user, reason, "Kicked");
        self.disconnect(user);
    }

    fn dispatch_command(&mut self, command: &str) {
        info!(command, "Console command");
    }
}

/// Drives an [`AuthGui`] through a script timeline.
pub struct Replay {
    gui: AuthGui<ConsoleHost, AuthBackend>,
    input: InputSender,
    events: VecDeque<ScriptEvent>,
    users: HashMap<String, Identity>,
}

impl Replay {
    pub fn new(config: &Config, mut events: Vec<ScriptEvent>, backend: AuthBackend) -> Self {
        events.sort_by_key(|e| e.tick);
        let mut gui = AuthGui::new(config, ConsoleHost::new(), backend, TickScheduler::new());
        let input = gui.input_sender();
        Self {
            gui,
            input,
            events: events.into(),
            users: HashMap::new(),
        }
    }

    pub fn gui(&self) -> &AuthGui<ConsoleHost, AuthBackend> {
        &self.gui
    }

    /// The identity a script user joined with.
    pub fn identity(&self, name: &str) -> Option<&Identity> {
        self.users.get(name)
    }

    pub fn now(&self) -> Ticks {
        self.gui.scheduler().now()
    }

    /// No events left and nothing scheduled.
    pub fn is_finished(&self) -> bool {
        self.events.is_empty() && self.gui.scheduler().pending() == 0
    }

    /// Apply the events due now, then advance one tick.
    pub fn step(&mut self) {
        let now = self.now();
        while self.events.front().is_some_and(|e| e.tick <= now) {
            if let Some(event) = self.events.pop_front() {
                self.apply(event);
            }
        }
        self.report_closes();
        self.gui.tick();
        self.report_closes();
    }

    /// Feed closes the engine made back in as host close events.
    ///
    /// A user who already has a newer session had the old dialog replaced,
    /// which is not a close.
    fn report_closes(&mut self) {
        for (user, gui_type) in self.gui.host_mut().take_closed() {
            if self.gui.controller().session(user).is_some() {
                trace!(user = %user, "Dialog replaced, not reporting close");
                continue;
            }
            self.gui.on_dialog_closed(user, gui_type);
        }
    }

    fn apply(&mut self, event: ScriptEvent) {
        debug!(tick = event.tick, user = %event.user, action = ?event.action, "Script event");

        if event.action == ScriptAction::Join {
            let identity = Identity::named(event.user.clone());
            self.gui.host_mut().connect(identity.id);
            self.gui.on_join(identity.clone());
            self.users.insert(event.user, identity);
            return;
        }

        let Some(identity) = self.users.get(&event.user).cloned() else {
            warn!(user = %event.user, "Event for a user that never joined");
            return;
        };
        let user = identity.id;

        match event.action {
            ScriptAction::Join => {}
            ScriptAction::Rename { text } => {
                if let Err(e) = self.input.send(user, text.as_deref()) {
                    warn!(user = %user, error = %e, "Could not queue input");
                }
            }
            ScriptAction::Click { slot } => self.gui.on_click(user, slot),
            ScriptAction::Close => match self.gui.host_mut().dismiss(user) {
                Some(gui_type) => self.gui.on_dialog_closed(user, gui_type),
                None => debug!(user = %user, "Close without a dialog"),
            },
            ScriptAction::Login => match self.gui.auth_mut().login(&identity) {
                Ok(()) => self.gui.on_login_event(user),
                Err(e) => warn!(user = %user, error = %e, "Backend login failed"),
            },
            ScriptAction::Register { password } => {
                let password = SecretString::from(password);
                match self.gui.auth_mut().register(&identity, &password) {
                    Ok(()) => self.gui.on_register_event(user),
                    Err(e) => warn!(user = %user, error = %e, "Backend registration failed"),
                }
            }
            ScriptAction::Logout => match self.gui.auth_mut().logout(&identity) {
                Ok(()) => self.gui.on_logout(user),
                Err(e) => warn!(user = %user, error = %e, "Backend logout failed"),
            },
            ScriptAction::Quit => {
                self.gui.host_mut().disconnect(user);
                self.gui.on_quit(user);
                self.users.remove(&event.user);
            }
        }
    }
}
