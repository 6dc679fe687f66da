//! Message catalog.
//!
//! Keys resolve to templates with `{name}` placeholders. Built-in English
//! defaults cover every key the engine sends; the `[messages]` table of the
//! configuration overrides them one by one.

use std::collections::HashMap;

use crate::traits::Messaging;

const DEFAULTS: &[(&str, &str)] = &[
    ("gui.login-required", "Please log in to continue."),
    ("gui.register-required", "Please register to continue."),
    ("gui.login-success", "Welcome back, {player}!"),
    ("gui.register-success", "Account created. Welcome, {player}!"),
    ("gui.login-failed", "Wrong password or unknown account."),
    ("gui.register-failed", "Registration failed, please try again."),
    ("gui.login-cancelled", "Login cancelled."),
    ("gui.register-cancelled", "Registration cancelled."),
    ("gui.already-registered", "This account is already registered. Please log in."),
    ("gui.already-logged-in", "You are already logged in."),
    ("gui.password-placeholder", "Enter password"),
    ("gui.password-too-short", "Password must be at least {min} characters."),
    ("gui.password-too-long", "Password must be at most {max} characters."),
    (
        "gui.password-complexity-failed",
        "Password must contain a letter and a digit.",
    ),
    ("gui.confirm-label", "Confirm"),
    ("gui.input-reset", "Password field cleared."),
    ("error.config-load-failed", "The dialog is not configured."),
    ("error.backend-unavailable", "Authentication is unavailable, try again later."),
    ("error.request-rejected", "The server refused the request."),
    ("error.gui-creation-failed", "Could not open the dialog."),
    ("error.internal", "Something went wrong, please try again."),
    ("authme.not-found", "No supported login plugin was found."),
];

/// Key to template lookup with configurable overrides.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    templates: HashMap<String, String>,
}

impl MessageCatalog {
    /// Catalog holding only the built-in defaults.
    pub fn new() -> Self {
        Self {
            templates: DEFAULTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Built-in defaults with `overrides` applied on top.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut catalog = Self::new();
        for (key, template) in overrides {
            catalog.templates.insert(key.clone(), template.clone());
        }
        catalog
    }

    /// The raw template for a key.
    pub fn template(&self, key: &str) -> Option<&str> {
        self.templates.get(key).map(String::as_str)
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Messaging for MessageCatalog {
    fn resolve(&self, key: &str, placeholders: &[(&str, &str)]) -> String {
        let Some(template) = self.templates.get(key) else {
            return format!("missing message: {}", key);
        };
        placeholders
            .iter()
            .fold(template.clone(), |text, (name, value)| {
                text.replace(&format!("{{{}}}", name), value)
            })
    }
}
