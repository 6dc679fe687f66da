//! Configuration types and loading for anvil-auth.
//!
//! Configuration is loaded from `~/.config/anvil-auth/config.toml`.
//!
//! # Error Handling
//!
//! - If the config file doesn't exist, default values are returned.
//! - If the config file exists but is invalid, an error is returned (fail fast).
//!
//! # Example Configuration
//!
//! ```toml
//! [gui]
//! auto_open = true
//! open_delay = 20             # ticks before the first auto-open
//! reopen_delay = 40           # ticks before reopening a closed dialog
//! retry_delays = [0, 10, 40]
//!
//! [security]
//! show_password_plaintext = false
//! mask_char = "*"
//! min_password_length = 6
//!
//! [login_plugin]
//! kind = "catseedlogin"
//! auto_detect = false
//!
//! [actions]
//! login_success = ["[command]spawn {player}"]
//!
//! [messages]
//! "gui.login-failed" = "Wrong password."
//!
//! [menu.login]
//! title = "Log in"
//! close_actions = ["[message]|See you soon"]
//!
//! [[menu.login.items]]
//! slot = 2
//! name = "Confirm"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::input::{InputSettings, PlaceholderFilter, DEFAULT_PLACEHOLDERS};
use crate::menu::{Action, MenuCatalog, MenuLayout};
use crate::types::{BackendKind, DisplayMode, GuiType, Ticks};
use crate::validation::PasswordPolicy;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The file parsed but holds a value that cannot work.
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gui: GuiConfig,
    pub security: SecurityConfig,
    pub input: InputConfig,
    pub login_plugin: LoginPluginConfig,
    pub actions: ActionsConfig,
    /// Message template overrides, keyed by message key.
    pub messages: HashMap<String, String>,
    pub menu: MenuConfig,
}

/// Dialog timing and automatic opening.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuiConfig {
    /// Master switch for automatic dialogs (default: true).
    pub enabled: bool,
    /// Open a dialog for unauthenticated users on join (default: true).
    pub auto_open: bool,
    /// Ticks between join and the first auto-open check (default: 20).
    pub open_delay: Ticks,
    /// Ticks between a qualifying close and the reopen (default: 40).
    pub reopen_delay: Ticks,
    /// Ticks between join-time re-checks (default: 20).
    pub poll_interval: Ticks,
    /// Number of join-time checks before giving up (default: 10).
    pub poll_attempts: u32,
    /// Delay before each open attempt; its length bounds the attempts.
    pub retry_delays: Vec<Ticks>,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_open: true,
            open_delay: 20,
            reopen_delay: 40,
            poll_interval: 20,
            poll_attempts: 10,
            retry_delays: vec![0, 10, 40],
        }
    }
}

/// Password display and policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Echo the password in clear text (default: false).
    pub show_password_plaintext: bool,
    /// Character shown per typed character in masked mode (default: `*`).
    pub mask_char: char,
    pub min_password_length: usize,
    pub max_password_length: usize,
    /// Require a letter and a digit (default: false).
    pub password_complexity: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        let policy = PasswordPolicy::default();
        Self {
            show_password_plaintext: false,
            mask_char: '*',
            min_password_length: policy.min_length,
            max_password_length: policy.max_length,
            password_complexity: policy.require_complexity,
        }
    }
}

/// Input field handling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Prompt phrases that count as an empty field.
    pub placeholder_phrases: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            placeholder_phrases: DEFAULT_PLACEHOLDERS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Which authentication backend to use.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoginPluginConfig {
    /// Preferred backend (default: authme).
    pub kind: BackendKind,
    /// Fall back to other detected backends (default: true).
    pub auto_detect: bool,
}

impl Default for LoginPluginConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::AuthMe,
            auto_detect: true,
        }
    }
}

/// Actions run after authentication outcomes.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ActionsConfig {
    pub login_success: Vec<Action>,
    pub register_success: Vec<Action>,
    pub failure: Vec<Action>,
}

impl ActionsConfig {
    /// Actions for a successful login or registration.
    pub fn on_success(&self, gui_type: GuiType) -> &[Action] {
        match gui_type {
            GuiType::Login => &self.login_success,
            GuiType::Register => &self.register_success,
        }
    }
}

/// Per-type menu layouts.
///
/// A missing table falls back to the built-in layout; `enabled = false`
/// removes it, which makes opening that dialog a `ConfigMissing` error.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    pub enabled: bool,
    pub login: Option<MenuLayout>,
    pub register: Option<MenuLayout>,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login: None,
            register: None,
        }
    }
}

impl Config {
    /// Returns the default configuration file path.
    ///
    /// Returns `~/.config/anvil-auth/config.toml` using `dirs::config_dir()`,
    /// or `None` if the config directory cannot be determined.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("anvil-auth").join("config.toml"))
    }

    /// Load configuration from the default path.
    ///
    /// - Returns `Ok(Config::default())` if no config file exists.
    /// - Returns `Err` if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but would break input handling.
    ///
    /// Snapshots are whitespace-stripped before reconciliation, so a
    /// whitespace mask would never be recognised as a mask echo.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.mask_char.is_whitespace() {
            return Err(ConfigError::Invalid {
                field: "security.mask_char",
                reason: "must not be whitespace".to_string(),
            });
        }
        Ok(())
    }

    pub fn input_settings(&self) -> InputSettings {
        InputSettings {
            mode: DisplayMode::from_plaintext_flag(self.security.show_password_plaintext),
            mask: self.security.mask_char,
            placeholders: PlaceholderFilter::new(&self.input.placeholder_phrases),
        }
    }

    pub fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy {
            min_length: self.security.min_password_length,
            max_length: self.security.max_password_length,
            require_complexity: self.security.password_complexity,
        }
    }

    /// The layouts to render, with built-in fallbacks for absent tables.
    pub fn menu_catalog(&self) -> MenuCatalog {
        if !self.menu.enabled {
            return MenuCatalog::empty();
        }
        let layout = |configured: &Option<MenuLayout>, gui_type: GuiType| {
            configured
                .clone()
                .unwrap_or_else(|| MenuLayout::builtin(gui_type))
        };
        MenuCatalog::new(
            Some(layout(&self.menu.login, GuiType::Login)),
            Some(layout(&self.menu.register, GuiType::Register)),
        )
    }
}
