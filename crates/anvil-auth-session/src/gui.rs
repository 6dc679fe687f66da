//! Event seam between the host and the dialog engine.
//!
//! [`AuthGui`] owns every piece of per-user state (input buffers, sessions,
//! guard sets) and is driven entirely from the scheduler thread: host
//! notifications call the `on_*` methods, and due [`ScheduledTask`]s are fed
//! back through [`AuthGui::run`]. Errors never escape an event handler; they
//! become a chat message for the user and the event is otherwise a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use anvil_auth_core::config::{ActionsConfig, GuiConfig};
use anvil_auth_core::menu::{SLOT_CANCEL, SLOT_CONFIRM, SLOT_RESET};
use anvil_auth_core::{
    AuthError, AuthProvider, Config, DialogHost, DialogState, DisplayMode, GuiError, GuiType,
    Identity, InputCaptureEngine, InputSettings, MenuCatalog, MenuLayout, MessageCatalog,
    Messaging, PasswordPolicy, ReopenGuard, ScheduledTask, Scheduler, UserId,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, trace, warn};

use crate::actions::run_actions;
use crate::controller::{GuiSessionController, OpenProgress};
use crate::decider::{CloseReopenDecider, ReopenDecision};
use crate::relay::{input_relay, InputInbox, InputSender};
use crate::scheduler::TickScheduler;

const PLACEHOLDER_KEY: &str = "gui.password-placeholder";
const CONFIRM_LABEL_KEY: &str = "gui.confirm-label";

/// The slot shows our own placeholder message, so its echo must never count as input.
fn input_settings(config: &Config, placeholder: &str) -> InputSettings {
    let settings = config.input_settings();
    InputSettings {
        placeholders: settings.placeholders.with_phrase(placeholder),
        ..settings
    }
}

/// Login and registration dialogs for every connected user.
pub struct AuthGui<H: DialogHost, A: AuthProvider, S: Scheduler = TickScheduler> {
    host: H,
    auth: A,
    scheduler: S,
    engine: InputCaptureEngine,
    guard: ReopenGuard,
    controller: GuiSessionController,
    decider: CloseReopenDecider,
    messages: MessageCatalog,
    menus: MenuCatalog,
    policy: PasswordPolicy,
    settings: GuiConfig,
    actions: ActionsConfig,
    online: HashMap<UserId, Identity>,
    sender: Option<InputSender>,
    inbox: Option<InputInbox>,
}

impl<H: DialogHost, A: AuthProvider, S: Scheduler> AuthGui<H, A, S> {
    pub fn new(config: &Config, host: H, auth: A, scheduler: S) -> Self {
        let messages = MessageCatalog::with_overrides(&config.messages);
        let placeholder = messages.resolve(PLACEHOLDER_KEY, &[]);
        Self {
            host,
            auth,
            scheduler,
            engine: InputCaptureEngine::new(input_settings(config, &placeholder)),
            guard: ReopenGuard::new(),
            controller: GuiSessionController::new(config.gui.retry_delays.clone(), placeholder),
            decider: CloseReopenDecider::new(config.gui.reopen_delay),
            messages,
            menus: config.menu_catalog(),
            policy: config.password_policy(),
            settings: config.gui.clone(),
            actions: config.actions.clone(),
            online: HashMap::new(),
            sender: None,
            inbox: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn auth(&self) -> &A {
        &self.auth
    }

    pub fn auth_mut(&mut self) -> &mut A {
        &mut self.auth
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn guard(&self) -> &ReopenGuard {
        &self.guard
    }

    pub fn engine(&self) -> &InputCaptureEngine {
        &self.engine
    }

    pub fn controller(&self) -> &GuiSessionController {
        &self.controller
    }

    pub fn identity(&self, user: UserId) -> Option<&Identity> {
        self.online.get(&user)
    }

    /// A sender for rename snapshots arriving off the scheduler thread.
    ///
    /// Snapshots are applied at the start of the next tick.
    pub fn input_sender(&mut self) -> InputSender {
        if let Some(sender) = &self.sender {
            return sender.clone();
        }
        let (sender, inbox) = input_relay();
        self.sender = Some(sender.clone());
        self.inbox = Some(inbox);
        sender
    }

    /// Apply every snapshot queued through [`input_sender`](Self::input_sender).
    pub fn drain_input(&mut self) {
        let Some(inbox) = self.inbox.as_mut() else {
            return;
        };
        for input in inbox.drain() {
            self.on_rename(input.user, input.text.as_deref().map(String::as_str));
        }
    }

    /// A user connected.
    pub fn on_join(&mut self, identity: Identity) {
        let user = identity.id;
        info!(user = %user, name = %identity.name, "User joined");
        self.online.insert(user, identity);

        if self.settings.enabled && self.settings.auto_open {
            self.scheduler.after(
                self.settings.open_delay,
                ScheduledTask::AutoOpen { user, attempt: 0 },
            );
        }
    }

    /// A user disconnected.
    pub fn on_quit(&mut self, user: UserId) {
        if let Err(e) = self.controller.close(&mut self.host, &mut self.guard, user) {
            debug!(user = %user, error = %e, "Close on quit failed");
        }
        self.engine.clear(user);
        self.guard.forget(user);
        if self.online.remove(&user).is_some() {
            info!(user = %user, "User left");
        }
    }

    /// The host reported a new full snapshot of the text field.
    pub fn on_rename(&mut self, user: UserId, text: Option<&str>) {
        let Some(session) = self.controller.session(user) else {
            trace!(user = %user, "Rename without a dialog");
            return;
        };
        if session.state() != DialogState::Open {
            trace!(user = %user, state = %session.state(), "Rename ignored");
            return;
        }
        let seq = session.seq();

        let display = self.engine.ingest(user, text);
        let label = if self.engine.has_input(user) {
            self.messages.resolve(CONFIRM_LABEL_KEY, &[])
        } else {
            self.messages.resolve(PLACEHOLDER_KEY, &[])
        };
        if let Err(e) = self.host.set_result_text(user, &label) {
            debug!(user = %user, error = %e, "Could not update result slot");
        }

        // The host echoes the literal keystroke for one tick; put the mask back.
        let echoed: String = text
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if self.engine.settings().mode == DisplayMode::Masked
            && !display.is_empty()
            && echoed != display
        {
            self.scheduler
                .after(1, ScheduledTask::RefreshMask { user, seq });
        }
    }

    /// The user clicked a slot of an open dialog.
    pub fn on_click(&mut self, user: UserId, slot: u32) {
        let Some(session) = self.controller.session(user) else {
            return;
        };
        if session.state() != DialogState::Open {
            debug!(user = %user, slot, state = %session.state(), "Click ignored");
            return;
        }
        let identity = session.identity().clone();
        let gui_type = session.gui_type();
        let layout = Arc::clone(session.layout());

        match slot {
            SLOT_CANCEL => self.cancel(&identity, gui_type, &layout),
            SLOT_RESET => self.reset(&identity),
            SLOT_CONFIRM => {
                if let Err(e) = self.confirm(&identity, gui_type) {
                    self.report(&identity, &e);
                }
            }
            other => {
                if let Some(item) = layout.item_at(other) {
                    run_actions(&mut self.host, &identity, &item.click_actions);
                }
            }
        }
    }

    /// The host reported that the dialog closed, by whatever means.
    pub fn on_dialog_closed(&mut self, user: UserId, gui_type: GuiType) {
        if self.guard.is_opening(user) {
            debug!(user = %user, "Close during open attempt ignored");
            return;
        }
        if self.controller.has_active(user)
            && self
                .controller
                .finish_closed(&mut self.host, &mut self.guard, user)
                .is_some()
        {
            self.engine.clear(user);
        }

        let Some(identity) = self.online.get(&user).cloned() else {
            return;
        };
        self.decider.on_dialog_closed(
            &self.guard,
            &self.auth,
            &mut self.scheduler,
            &identity,
            gui_type,
        );
    }

    /// The backend logged the user in (by any path).
    pub fn on_login_event(&mut self, user: UserId) {
        self.on_backend_success(user, GuiType::Login);
    }

    /// The backend registered the user (by any path).
    pub fn on_register_event(&mut self, user: UserId) {
        self.on_backend_success(user, GuiType::Register);
    }

    /// The backend logged the user out.
    pub fn on_logout(&mut self, user: UserId) {
        if !self.online.contains_key(&user) {
            return;
        }
        if let Err(e) = self.controller.close(&mut self.host, &mut self.guard, user) {
            warn!(user = %user, error = %e, "Close on logout failed");
        }
        self.engine.clear(user);
        self.guard.unmark_authenticated(user);
        info!(user = %user, "User logged out");

        if self.settings.enabled && self.settings.auto_open {
            self.scheduler
                .after(self.settings.open_delay, ScheduledTask::OpenAppropriate { user });
        }
    }

    /// Open a dialog of the given type for a connected user.
    pub fn open(&mut self, user: UserId, gui_type: GuiType) -> Result<(), GuiError> {
        let identity = self
            .online
            .get(&user)
            .cloned()
            .ok_or(GuiError::Offline(user))?;
        let layout = self
            .menus
            .get(gui_type)
            .ok_or(GuiError::ConfigMissing(gui_type))?;

        self.engine.clear(user);
        self.controller.open(
            &mut self.host,
            &mut self.guard,
            &mut self.scheduler,
            &identity,
            gui_type,
            layout,
        )?;
        Ok(())
    }

    /// Open login or register depending on whether the account exists.
    ///
    /// Returns the type opened, or `None` when the user is already logged in.
    pub fn open_appropriate(&mut self, user: UserId) -> Result<Option<GuiType>, GuiError> {
        let identity = self
            .online
            .get(&user)
            .cloned()
            .ok_or(GuiError::Offline(user))?;

        if self.guard.is_authenticated(user) || self.backend_authenticated(&identity) {
            self.say(&identity, "gui.already-logged-in");
            return Ok(None);
        }

        let gui_type = if self.backend_registered(&identity) {
            GuiType::Login
        } else {
            GuiType::Register
        };
        self.open(user, gui_type)?;
        self.say(&identity, gui_type.required_key());
        Ok(Some(gui_type))
    }

    /// Close every dialog and apply a new configuration.
    pub fn reload(&mut self, config: &Config) {
        let closed = self.controller.close_all(&mut self.host, &mut self.guard);
        self.engine.clear_all();

        self.messages = MessageCatalog::with_overrides(&config.messages);
        let placeholder = self.messages.resolve(PLACEHOLDER_KEY, &[]);
        self.engine.configure(input_settings(config, &placeholder));
        self.policy = config.password_policy();
        self.menus = config.menu_catalog();
        self.controller.configure(config.gui.retry_delays.clone(), placeholder);
        self.decider = CloseReopenDecider::new(config.gui.reopen_delay);
        self.settings = config.gui.clone();
        self.actions = config.actions.clone();

        info!(closed, "Configuration reloaded");
    }

    /// Run one scheduled task.
    pub fn run(&mut self, task: ScheduledTask) {
        trace!(task = ?task, "Running task");
        match task {
            ScheduledTask::OpenAttempt { user, seq, attempt } => {
                let result = self.controller.on_open_attempt(
                    &mut self.host,
                    &mut self.guard,
                    &mut self.scheduler,
                    user,
                    seq,
                    attempt,
                );
                self.after_open_step(user, result);
            }
            ScheduledTask::ValidateOpen { user, seq, attempt } => {
                let result = self.controller.validate_open(
                    &mut self.host,
                    &mut self.guard,
                    &mut self.scheduler,
                    user,
                    seq,
                    attempt,
                );
                self.after_open_step(user, result);
            }
            ScheduledTask::RefreshMask { user, seq } => self.refresh_mask(user, seq),
            ScheduledTask::Reopen { user, gui_type } => self.reopen(user, gui_type),
            ScheduledTask::AutoOpen { user, attempt } => self.auto_open(user, attempt),
            ScheduledTask::OpenAppropriate { user } => {
                if !self.host.is_online(user) {
                    return;
                }
                if let Err(e) = self.open_appropriate(user) {
                    self.report_to(user, &e);
                }
            }
        }
    }

    fn after_open_step(&mut self, user: UserId, result: Result<OpenProgress, GuiError>) {
        if let Err(e) = result {
            self.report_to(user, &e);
        }
    }

    fn refresh_mask(&mut self, user: UserId, seq: u64) {
        let current = self
            .controller
            .session(user)
            .is_some_and(|s| s.seq() == seq && s.state() == DialogState::Open);
        if !current {
            return;
        }
        let display = self.engine.display_value(user);
        if display.is_empty() {
            return;
        }
        if let Err(e) = self.host.set_input_text(user, &display) {
            debug!(user = %user, error = %e, "Could not refresh mask");
        }
    }

    fn reopen(&mut self, user: UserId, gui_type: GuiType) {
        let Some(identity) = self.online.get(&user).cloned() else {
            return;
        };
        if !self.host.is_online(user) || self.controller.has_active(user) {
            return;
        }
        match self
            .decider
            .decide(&self.guard, &self.auth, &identity, gui_type)
        {
            ReopenDecision::Reopen { .. } => {
                debug!(user = %user, gui_type = %gui_type, "Reopening dialog");
                if let Err(e) = self.open(user, gui_type) {
                    self.report(&identity, &e);
                }
            }
            ReopenDecision::Skip(reason) => {
                debug!(user = %user, reason = %reason, "Reopen no longer needed");
            }
        }
    }

    fn auto_open(&mut self, user: UserId, attempt: u32) {
        let Some(identity) = self.online.get(&user).cloned() else {
            return;
        };
        if !self.host.is_online(user) || self.guard.is_authenticated(user) {
            return;
        }
        if self.controller.has_active(user) {
            self.poll_again(user, attempt);
            return;
        }

        if self.backend_authenticated(&identity) {
            return;
        }
        self.poll_again(user, attempt);

        let gui_type = if self.backend_registered(&identity) {
            GuiType::Login
        } else {
            GuiType::Register
        };
        match self.open(user, gui_type) {
            Ok(()) => self.say(&identity, gui_type.required_key()),
            Err(e) => self.report(&identity, &e),
        }
    }

    /// Backend login state; an unreachable backend counts as logged out.
    fn backend_authenticated(&self, identity: &Identity) -> bool {
        self.auth.is_authenticated(identity).unwrap_or_else(|e| {
            debug!(user = %identity.id, error = %e, "Login state unknown, assuming logged out");
            false
        })
    }

    /// Backend account state; an unreachable backend counts as unregistered.
    fn backend_registered(&self, identity: &Identity) -> bool {
        self.auth.is_registered(identity).unwrap_or_else(|e| {
            debug!(user = %identity.id, error = %e, "Account state unknown, assuming unregistered");
            false
        })
    }

    fn poll_again(&mut self, user: UserId, attempt: u32) {
        if attempt < self.settings.poll_attempts {
            self.scheduler.after(
                self.settings.poll_interval,
                ScheduledTask::AutoOpen {
                    user,
                    attempt: attempt + 1,
                },
            );
        }
    }

    fn cancel(&mut self, identity: &Identity, gui_type: GuiType, layout: &MenuLayout) {
        if let Some(item) = layout.item_at(SLOT_CANCEL) {
            run_actions(&mut self.host, identity, &item.click_actions);
        }
        self.say(identity, gui_type.cancelled_key());
        self.engine.clear(identity.id);
        if let Err(e) = self.controller.close(&mut self.host, &mut self.guard, identity.id) {
            self.report(identity, &e);
        }
    }

    fn reset(&mut self, identity: &Identity) {
        let user = identity.id;
        self.engine.clear(user);
        let placeholder = self.messages.resolve(PLACEHOLDER_KEY, &[]);
        if let Err(e) = self.host.set_input_text(user, &placeholder) {
            debug!(user = %user, error = %e, "Could not reset input slot");
        }
        if let Err(e) = self.host.set_result_text(user, &placeholder) {
            debug!(user = %user, error = %e, "Could not reset result slot");
        }
        self.say(identity, "gui.input-reset");
    }

    /// Validate the buffered password, then hand it to the backend.
    ///
    /// Nothing reaches the backend unless the local policy accepts the
    /// password. The dialog is closed before `login`/`register` is called.
    fn confirm(&mut self, identity: &Identity, gui_type: GuiType) -> Result<(), GuiError> {
        let Some(password) = self.engine.real_value(identity.id) else {
            self.say(identity, PLACEHOLDER_KEY);
            return Ok(());
        };
        self.policy.check(password.expose_secret())?;

        match gui_type {
            GuiType::Login => self.confirm_login(identity, &password),
            GuiType::Register => self.confirm_register(identity, &password),
        }
    }

    fn confirm_login(
        &mut self,
        identity: &Identity,
        password: &SecretString,
    ) -> Result<(), GuiError> {
        let user = identity.id;
        if !self.backend_registered(identity) {
            self.say(identity, "gui.login-failed");
            return Ok(());
        }
        if !self.auth.check_password(identity, password)? {
            debug!(user = %user, "Wrong password");
            self.say(identity, "gui.login-failed");
            return Ok(());
        }

        self.close_for_confirm(identity)?;
        match self.auth.login(identity) {
            Ok(()) => self.complete(identity, GuiType::Login),
            Err(e) => {
                warn!(user = %user, error = %e, "Login failed after password check");
                self.say(identity, "gui.login-failed");
                run_actions(&mut self.host, identity, &self.actions.failure);
            }
        }
        Ok(())
    }

    fn confirm_register(
        &mut self,
        identity: &Identity,
        password: &SecretString,
    ) -> Result<(), GuiError> {
        let user = identity.id;
        if self.backend_registered(identity) {
            self.say(identity, "gui.already-registered");
            self.engine.clear(user);
            self.controller.close(&mut self.host, &mut self.guard, user)?;
            return Ok(());
        }

        self.close_for_confirm(identity)?;
        match self.auth.register(identity, password) {
            Ok(()) => {
                if let Err(e) = self.auth.login(identity) {
                    warn!(user = %user, error = %e, "Registered but automatic login failed");
                }
                self.complete(identity, GuiType::Register);
            }
            Err(AuthError::Rejected(reason)) => {
                debug!(user = %user, reason = %reason, "Registration refused by backend");
                self.say(identity, "gui.register-failed");
                run_actions(&mut self.host, identity, &self.actions.failure);
            }
            Err(e) => {
                run_actions(&mut self.host, identity, &self.actions.failure);
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// `Open -> Confirming -> Closed`, clearing the buffer on the way.
    fn close_for_confirm(&mut self, identity: &Identity) -> Result<(), GuiError> {
        let user = identity.id;
        self.controller.begin_confirm(user)?;
        self.engine.clear(user);
        if let Err(e) = self.controller.close(&mut self.host, &mut self.guard, user) {
            warn!(user = %user, error = %e, "Host failed to close dialog before authentication");
        }
        Ok(())
    }

    fn complete(&mut self, identity: &Identity, gui_type: GuiType) {
        self.guard.mark_authenticated(identity.id);
        self.engine.clear(identity.id);
        info!(user = %identity.id, gui_type = %gui_type, "User authenticated");
        self.say(identity, gui_type.success_key());
        run_actions(&mut self.host, identity, self.actions.on_success(gui_type));
    }

    fn on_backend_success(&mut self, user: UserId, gui_type: GuiType) {
        let Some(identity) = self.online.get(&user).cloned() else {
            return;
        };
        let already = self.guard.is_authenticated(user);
        self.guard.mark_authenticated(user);
        self.engine.clear(user);
        if let Err(e) = self.controller.close(&mut self.host, &mut self.guard, user) {
            warn!(user = %user, error = %e, "Close after backend event failed");
        }
        if !already {
            info!(user = %user, gui_type = %gui_type, "Authenticated by backend event");
            self.say(&identity, gui_type.success_key());
        }
    }

    fn say(&mut self, identity: &Identity, key: &str) {
        self.messages
            .send(&mut self.host, identity, key, &[("player", identity.name.as_str())]);
    }

    fn report_to(&mut self, user: UserId, err: &GuiError) {
        match self.online.get(&user).cloned() {
            Some(identity) => self.report(&identity, err),
            None => debug!(user = %user, error = %err, "Error for departed user"),
        }
    }

    /// Turn an error into a message for the user.
    fn report(&mut self, identity: &Identity, err: &GuiError) {
        match err {
            GuiError::Offline(_) => {
                debug!(user = %identity.id, error = %err, "User went offline");
            }
            GuiError::ValidationFailed(reason) => {
                debug!(user = %identity.id, error = %err, "Password rejected");
                let values = reason.placeholders();
                let placeholders: Vec<(&str, &str)> =
                    values.iter().map(|(k, v)| (*k, v.as_str())).collect();
                self.messages
                    .send(&mut self.host, identity, err.message_key(), &placeholders);
            }
            _ => {
                warn!(user = %identity.id, error = %err, "Dialog operation failed");
                self.say(identity, err.message_key());
            }
        }
    }
}

impl<H: DialogHost, A: AuthProvider> AuthGui<H, A, TickScheduler> {
    /// Advance one tick: apply queued input, then run due tasks.
    pub fn tick(&mut self) {
        self.drain_input();
        for task in self.scheduler.advance() {
            self.run(task);
        }
    }

    pub fn run_ticks(&mut self, count: u64) {
        for _ in 0..count {
            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAuthProvider, MockDialogHost};
    use anvil_auth_core::{Action, MenuItem};

    type TestGui = AuthGui<MockDialogHost, MockAuthProvider>;

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.gui.auto_open = false;
        config
    }

    fn setup(
        config: Config,
        auth: impl FnOnce(&Identity) -> MockAuthProvider,
    ) -> (TestGui, Identity) {
        let alice = Identity::named("alice");
        let host = MockDialogHost::new().with_online(alice.id);
        let auth = auth(&alice);
        let mut gui = AuthGui::new(&config, host, auth, TickScheduler::new());
        gui.on_join(alice.clone());
        (gui, alice)
    }

    fn registered(identity: &Identity) -> MockAuthProvider {
        MockAuthProvider::new().with_account(identity, "secret1")
    }

    fn open_dialog(gui: &mut TestGui, user: UserId, gui_type: GuiType) {
        gui.open(user, gui_type).unwrap();
        gui.tick();
        assert_eq!(gui.controller().state(user), DialogState::Open);
    }

    fn type_password(gui: &mut TestGui, user: UserId, password: &str) {
        let mut typed = String::new();
        for c in password.chars() {
            typed.push(c);
            gui.on_rename(user, Some(&typed));
        }
    }

    #[test]
    fn masked_scenario_through_the_seam() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);

        gui.on_rename(user, Some("请输入密码"));
        assert!(!gui.engine().has_input(user));
        assert_eq!(gui.host().last_result_text(user), Some("Enter password"));

        gui.on_rename(user, Some("a"));
        assert_eq!(gui.host().last_result_text(user), Some("Confirm"));
        gui.tick();
        assert_eq!(gui.host().last_input_text(user), Some("*"));

        gui.on_rename(user, Some("ab"));
        gui.on_rename(user, Some("**"));
        assert_eq!(gui.engine().input_len(user), 2);

        gui.on_rename(user, Some("*"));
        assert_eq!(gui.engine().input_len(user), 1);
        gui.on_rename(user, Some(""));
        assert!(!gui.engine().has_input(user));
        assert_eq!(gui.host().last_result_text(user), Some("Enter password"));
    }

    #[test]
    fn mask_echo_does_not_schedule_refresh() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        open_dialog(&mut gui, alice.id, GuiType::Login);
        gui.on_rename(alice.id, Some("a"));
        gui.tick();
        gui.on_rename(alice.id, Some("*"));
        assert_eq!(gui.scheduler().pending(), 0);
    }

    #[test]
    fn plaintext_mode_mirrors_input() {
        let mut config = quiet_config();
        config.security.show_password_plaintext = true;
        let (mut gui, alice) = setup(config, registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);

        for snapshot in ["pass", "pas", "pa"] {
            gui.on_rename(user, Some(snapshot));
            assert_eq!(gui.engine().display_value(user), snapshot);
            assert_eq!(
                gui.engine().real_value(user).unwrap().expose_secret(),
                snapshot
            );
        }
        assert_eq!(gui.scheduler().pending(), 0);
    }

    #[test]
    fn successful_login_closes_and_never_reopens() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        type_password(&mut gui, user, "secret1");

        gui.on_click(user, SLOT_CONFIRM);

        assert!(!gui.controller().has_active(user));
        assert!(gui.guard().is_authenticated(user));
        assert!(!gui.engine().has_input(user));
        assert_eq!(gui.auth().login_calls(), 1);
        assert_eq!(gui.host().closed(), &[user]);
        assert_eq!(gui.host().last_message(user), Some("Welcome back, alice!"));

        gui.on_dialog_closed(user, GuiType::Login);
        gui.run_ticks(200);
        assert_eq!(gui.host().open_count(), 1);
        assert!(!gui.controller().has_active(user));
    }

    #[test]
    fn short_password_never_reaches_backend() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        type_password(&mut gui, user, "ab");
        let calls = gui.auth().call_count();

        gui.on_click(user, SLOT_CONFIRM);

        assert_eq!(gui.auth().call_count(), calls);
        assert_eq!(gui.controller().state(user), DialogState::Open);
        assert_eq!(
            gui.host().last_message(user),
            Some("Password must be at least 6 characters.")
        );
        assert!(gui.engine().has_input(user));
    }

    #[test]
    fn empty_confirm_asks_for_password() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        open_dialog(&mut gui, alice.id, GuiType::Login);
        gui.on_click(alice.id, SLOT_CONFIRM);
        assert_eq!(gui.host().last_message(alice.id), Some("Enter password"));
        assert_eq!(gui.controller().state(alice.id), DialogState::Open);
    }

    #[test]
    fn wrong_password_keeps_dialog_open() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        type_password(&mut gui, user, "secret2");

        gui.on_click(user, SLOT_CONFIRM);

        assert_eq!(gui.controller().state(user), DialogState::Open);
        assert_eq!(gui.auth().login_calls(), 0);
        assert_eq!(
            gui.host().last_message(user),
            Some("Wrong password or unknown account.")
        );
    }

    #[test]
    fn unknown_account_fails_login() {
        let (mut gui, alice) = setup(quiet_config(), |_| MockAuthProvider::new());
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        type_password(&mut gui, user, "secret1");
        gui.on_click(user, SLOT_CONFIRM);
        assert_eq!(
            gui.host().last_message(user),
            Some("Wrong password or unknown account.")
        );
        assert!(!gui.guard().is_authenticated(user));
    }

    #[test]
    fn failed_login_runs_failure_actions_and_reopens() {
        let mut config = quiet_config();
        config.actions.failure = vec![Action::Command("log fail {player}".into())];
        let (mut gui, alice) = setup(config, |a| registered(a).with_failing_login());
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        type_password(&mut gui, user, "secret1");

        gui.on_click(user, SLOT_CONFIRM);

        assert!(!gui.controller().has_active(user));
        assert!(!gui.guard().is_authenticated(user));
        assert_eq!(gui.host().commands(), &["log fail alice".to_string()]);

        gui.on_dialog_closed(user, GuiType::Login);
        gui.run_ticks(41);
        assert_eq!(gui.host().open_count(), 2);
        assert_eq!(gui.controller().state(user), DialogState::Open);
    }

    #[test]
    fn registration_creates_account_and_logs_in() {
        let mut config = quiet_config();
        config.actions.register_success = vec![Action::Message("tutorial for {player}".into())];
        let (mut gui, alice) = setup(config, |_| MockAuthProvider::new());
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Register);
        type_password(&mut gui, user, "newpass1");

        gui.on_click(user, SLOT_CONFIRM);

        assert_eq!(gui.auth().register_calls(), 1);
        assert_eq!(gui.auth().login_calls(), 1);
        assert!(gui.guard().is_authenticated(user));
        assert!(!gui.controller().has_active(user));
        assert_eq!(
            gui.host().messages_for(user),
            vec!["Account created. Welcome, alice!", "tutorial for alice"]
        );
    }

    #[test]
    fn register_for_existing_account_closes() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Register);
        type_password(&mut gui, user, "another1");

        gui.on_click(user, SLOT_CONFIRM);

        assert_eq!(gui.auth().register_calls(), 0);
        assert!(!gui.controller().has_active(user));
        assert_eq!(
            gui.host().last_message(user),
            Some("This account is already registered. Please log in.")
        );

        // The register dialog does not come back for a registered account.
        gui.on_dialog_closed(user, GuiType::Register);
        gui.run_ticks(100);
        assert_eq!(gui.host().open_count(), 1);
    }

    #[test]
    fn cancel_closes_then_reopens_after_delay() {
        let mut config = quiet_config();
        let mut layout = MenuLayout::builtin(GuiType::Login);
        if let Some(item) = layout.items.iter_mut().find(|i| i.slot == SLOT_CANCEL) {
            item.click_actions = vec![Action::Message("leaving".into())];
        }
        config.menu.login = Some(layout);
        let (mut gui, alice) = setup(config, registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);

        gui.on_click(user, SLOT_CANCEL);
        assert!(!gui.controller().has_active(user));
        assert_eq!(
            gui.host().messages_for(user),
            vec!["leaving", "Login cancelled."]
        );

        gui.on_dialog_closed(user, GuiType::Login);
        gui.run_ticks(39);
        assert_eq!(gui.host().open_count(), 1);
        gui.run_ticks(2);
        assert_eq!(gui.host().open_count(), 2);
        assert_eq!(gui.controller().state(user), DialogState::Open);
    }

    #[test]
    fn reset_clears_buffer_and_slots() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        type_password(&mut gui, user, "abc");

        gui.on_click(user, SLOT_RESET);

        assert!(!gui.engine().has_input(user));
        assert_eq!(gui.host().last_input_text(user), Some("Enter password"));
        assert_eq!(gui.host().last_result_text(user), Some("Enter password"));
        assert_eq!(gui.host().last_message(user), Some("Password field cleared."));
        assert_eq!(gui.controller().state(user), DialogState::Open);
    }

    #[test]
    fn other_slots_run_item_actions() {
        let mut config = quiet_config();
        let mut layout = MenuLayout::builtin(GuiType::Login);
        layout.items.push(MenuItem {
            slot: 5,
            material: "book".into(),
            name: "Help".into(),
            lore: Vec::new(),
            click_actions: vec![Action::Command("help {player}".into())],
        });
        config.menu.login = Some(layout);
        let (mut gui, alice) = setup(config, registered);
        open_dialog(&mut gui, alice.id, GuiType::Login);

        gui.on_click(alice.id, 5);
        gui.on_click(alice.id, 7);
        assert_eq!(gui.host().commands(), &["help alice".to_string()]);
    }

    #[test]
    fn events_before_open_are_ignored() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        gui.on_rename(user, Some("abc"));
        gui.on_click(user, SLOT_CONFIRM);
        assert!(!gui.engine().has_input(user));

        gui.open(user, GuiType::Login).unwrap();
        gui.on_rename(user, Some("abc"));
        gui.on_click(user, SLOT_CONFIRM);
        assert!(!gui.engine().has_input(user));
        assert_eq!(gui.auth().call_count(), 0);
    }

    #[test]
    fn close_during_open_is_ignored() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        gui.open(user, GuiType::Login).unwrap();

        gui.on_dialog_closed(user, GuiType::Login);
        assert_eq!(gui.controller().state(user), DialogState::Opening);
        assert_eq!(gui.scheduler().pending(), 1);

        gui.tick();
        assert_eq!(gui.controller().state(user), DialogState::Open);
    }

    #[test]
    fn escape_close_runs_close_actions_and_reopens() {
        let mut config = quiet_config();
        let mut layout = MenuLayout::builtin(GuiType::Login);
        layout.close_actions = vec![Action::Message("closed".into())];
        config.menu.login = Some(layout);
        let (mut gui, alice) = setup(config, registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        type_password(&mut gui, user, "sec");

        gui.host_mut().close_by_user(user);
        gui.on_dialog_closed(user, GuiType::Login);

        assert!(!gui.controller().has_active(user));
        assert!(!gui.engine().has_input(user));
        assert_eq!(gui.host().last_message(user), Some("closed"));
        gui.run_ticks(41);
        assert_eq!(gui.host().open_count(), 2);
    }

    #[test]
    fn backend_outage_on_close_does_not_reopen() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        gui.host_mut().close_by_user(user);
        gui.auth_mut().set_unavailable(true);

        gui.on_dialog_closed(user, GuiType::Login);
        gui.run_ticks(100);
        assert_eq!(gui.host().open_count(), 1);
    }

    #[test]
    fn reopen_rechecks_when_it_fires() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        gui.host_mut().close_by_user(user);
        gui.on_dialog_closed(user, GuiType::Login);

        // Logged in through another path before the reopen fires.
        gui.auth_mut().set_authenticated(user, true);
        gui.run_ticks(100);
        assert_eq!(gui.host().open_count(), 1);
    }

    #[test]
    fn join_auto_opens_register_for_new_user() {
        let (mut gui, alice) = setup(Config::default(), |_| MockAuthProvider::new());
        let user = alice.id;

        gui.run_ticks(19);
        assert_eq!(gui.host().open_count(), 0);
        gui.tick();
        assert_eq!(gui.host().opened(), &[(user, GuiType::Register)]);
        assert_eq!(
            gui.host().last_message(user),
            Some("Please register to continue.")
        );
        gui.tick();
        assert_eq!(gui.controller().state(user), DialogState::Open);

        // Polling does not stack dialogs.
        gui.run_ticks(300);
        assert_eq!(gui.host().open_count(), 1);
    }

    #[test]
    fn join_polling_retries_after_failed_open() {
        let alice = Identity::named("alice");
        let host = MockDialogHost::new().with_online(alice.id).hijack_next_opens(3);
        let mut gui = AuthGui::new(
            &Config::default(),
            host,
            registered(&alice),
            TickScheduler::new(),
        );
        gui.on_join(alice.clone());

        // Three hijacked attempts fail at tick 73; the next poll opens it.
        gui.run_ticks(80);
        assert_eq!(
            gui.host().messages_for(alice.id).last().copied(),
            Some("Please log in to continue.")
        );
        assert!(gui
            .host()
            .messages_for(alice.id)
            .contains(&"Could not open the dialog."));
        assert_eq!(gui.host().open_count(), 4);
        gui.tick();
        assert_eq!(gui.controller().state(alice.id), DialogState::Open);
    }

    #[test]
    fn join_does_nothing_for_logged_in_user() {
        let (mut gui, alice) = setup(Config::default(), registered);
        gui.auth_mut().set_authenticated(alice.id, true);
        gui.run_ticks(300);
        assert_eq!(gui.host().open_count(), 0);
        assert_eq!(gui.scheduler().pending(), 0);
    }

    #[test]
    fn disabled_gui_does_not_auto_open() {
        let mut config = Config::default();
        config.gui.enabled = false;
        let (mut gui, _alice) = setup(config, registered);
        gui.run_ticks(100);
        assert_eq!(gui.host().open_count(), 0);
    }

    #[test]
    fn backend_login_event_closes_dialog() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        type_password(&mut gui, user, "abc");

        gui.on_login_event(user);

        assert!(gui.guard().is_authenticated(user));
        assert!(!gui.controller().has_active(user));
        assert!(!gui.engine().has_input(user));
        assert_eq!(gui.host().last_message(user), Some("Welcome back, alice!"));

        // A second event for the same login stays silent.
        gui.on_login_event(user);
        assert_eq!(gui.host().messages_for(user).len(), 1);
    }

    #[test]
    fn backend_register_event_marks_authenticated() {
        let (mut gui, alice) = setup(quiet_config(), |_| MockAuthProvider::new());
        open_dialog(&mut gui, alice.id, GuiType::Register);
        gui.on_register_event(alice.id);
        assert!(gui.guard().is_authenticated(alice.id));
        assert_eq!(
            gui.host().last_message(alice.id),
            Some("Account created. Welcome, alice!")
        );
    }

    #[test]
    fn logout_reopens_login() {
        let mut config = Config::default();
        config.gui.poll_attempts = 0;
        let (mut gui, alice) = setup(config, registered);
        let user = alice.id;
        gui.auth_mut().set_authenticated(user, true);
        gui.on_login_event(user);
        gui.run_ticks(30);
        assert_eq!(gui.host().open_count(), 0);

        gui.auth_mut().set_authenticated(user, false);
        gui.on_logout(user);
        assert!(!gui.guard().is_authenticated(user));
        gui.run_ticks(20);
        assert_eq!(gui.host().opened(), &[(user, GuiType::Login)]);
        assert_eq!(
            gui.host().last_message(user),
            Some("Please log in to continue.")
        );
    }

    #[test]
    fn open_appropriate_for_logged_in_user() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        gui.on_login_event(alice.id);
        assert_eq!(gui.open_appropriate(alice.id).unwrap(), None);
        assert_eq!(
            gui.host().last_message(alice.id),
            Some("You are already logged in.")
        );
    }

    #[test]
    fn backend_outage_counts_as_unregistered() {
        let (mut gui, alice) = setup(quiet_config(), |_| MockAuthProvider::unavailable());
        assert_eq!(
            gui.open_appropriate(alice.id).unwrap(),
            Some(GuiType::Register)
        );
        assert_eq!(gui.host().opened(), &[(alice.id, GuiType::Register)]);
    }

    #[test]
    fn register_during_outage_reports_backend_error() {
        let (mut gui, alice) = setup(quiet_config(), |_| MockAuthProvider::new());
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Register);
        type_password(&mut gui, user, "newpass1");
        gui.auth_mut().set_unavailable(true);

        gui.on_click(user, SLOT_CONFIRM);

        assert!(!gui.guard().is_authenticated(user));
        assert!(!gui.controller().has_active(user));
        assert_eq!(
            gui.host().last_message(user),
            Some("Authentication is unavailable, try again later.")
        );
    }

    #[test]
    fn refused_registration_reports_failure_not_outage() {
        let mut config = quiet_config();
        config.actions.failure = vec![Action::Command("log fail {player}".into())];
        let (mut gui, alice) = setup(config, |_| MockAuthProvider::new().with_refusing_register());
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Register);
        type_password(&mut gui, user, "newpass1");

        gui.on_click(user, SLOT_CONFIRM);

        assert_eq!(gui.auth().register_calls(), 1);
        assert!(!gui.guard().is_authenticated(user));
        assert!(!gui.controller().has_active(user));
        assert_eq!(
            gui.host().last_message(user),
            Some("Registration failed, please try again.")
        );
        assert_eq!(gui.host().commands(), &["log fail alice".to_string()]);
    }

    #[test]
    fn quit_forgets_everything() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        type_password(&mut gui, user, "abc");
        gui.on_login_event(user);
        open_dialog(&mut gui, user, GuiType::Login);

        gui.host_mut().disconnect(user);
        gui.on_quit(user);

        assert!(gui.identity(user).is_none());
        assert!(!gui.controller().has_active(user));
        assert!(!gui.guard().is_authenticated(user));
        assert!(matches!(
            gui.open(user, GuiType::Login),
            Err(GuiError::Offline(_))
        ));
    }

    #[test]
    fn missing_layout_is_config_missing() {
        let mut config = quiet_config();
        config.menu.enabled = false;
        let (mut gui, alice) = setup(config, registered);
        assert!(matches!(
            gui.open(alice.id, GuiType::Login),
            Err(GuiError::ConfigMissing(GuiType::Login))
        ));
    }

    #[test]
    fn reload_closes_sessions_and_applies_settings() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);
        type_password(&mut gui, user, "abc");

        let mut config = quiet_config();
        config.security.show_password_plaintext = true;
        config.gui.reopen_delay = 5;
        config
            .messages
            .insert("gui.password-placeholder".into(), "Type here".into());
        gui.reload(&config);

        assert!(!gui.controller().has_active(user));
        assert!(!gui.engine().has_input(user));

        gui.on_dialog_closed(user, GuiType::Login);
        gui.run_ticks(6);
        assert_eq!(gui.host().open_count(), 2);
        assert_eq!(gui.controller().state(user), DialogState::Open);

        gui.on_rename(user, Some("abc"));
        assert_eq!(gui.engine().display_value(user), "abc");
        gui.on_rename(user, Some(""));
        assert_eq!(gui.host().last_result_text(user), Some("Type here"));
    }

    #[test]
    fn custom_placeholder_echo_is_not_input() {
        let mut config = quiet_config();
        config
            .messages
            .insert("gui.password-placeholder".into(), "Type here".into());
        let (mut gui, alice) = setup(config.clone(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);

        gui.on_rename(user, Some("Type here"));
        assert!(!gui.engine().has_input(user));

        type_password(&mut gui, user, "abc");
        gui.on_rename(user, Some("Type here"));
        assert!(!gui.engine().has_input(user));

        config
            .messages
            .insert("gui.password-placeholder".into(), "Passwort eingeben".into());
        gui.reload(&config);
        open_dialog(&mut gui, user, GuiType::Login);
        gui.on_rename(user, Some("Passwort eingeben..."));
        assert!(!gui.engine().has_input(user));
    }

    #[test]
    fn relay_input_is_applied_on_tick() {
        let (mut gui, alice) = setup(quiet_config(), registered);
        let user = alice.id;
        open_dialog(&mut gui, user, GuiType::Login);

        let sender = gui.input_sender();
        std::thread::spawn(move || {
            sender.send(user, Some("a")).unwrap();
            sender.send(user, Some("ab")).unwrap();
        })
        .join()
        .unwrap();

        assert!(!gui.engine().has_input(user));
        gui.tick();
        assert_eq!(gui.engine().input_len(user), 2);
    }
}
