//! Menu layouts and configured actions.
//!
//! A [`MenuLayout`] is the read-only snapshot a session renders from. Layouts
//! are shared through `Arc` so a reload swaps the catalog without touching
//! sessions that are already open.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::types::GuiType;

/// Slot of the cancel button (the anvil's left input).
pub const SLOT_CANCEL: u32 = 0;
/// Slot of the reset button (the anvil's right input).
pub const SLOT_RESET: u32 = 1;
/// Slot of the confirm button (the anvil's result).
pub const SLOT_CONFIRM: u32 = 2;

/// An action string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action `{0}`: expected [kick], [message] or [command]")]
pub struct ActionParseError(pub String);

/// A configured side effect.
///
/// Written as `[kick]reason`, `[message]text` or `[command]cmd`. A `|` right
/// after the tag is skipped, so `[message]|hello` and `[message]hello` are the
/// same. `{player}` is substituted when the action runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Action {
    Kick(String),
    Message(String),
    Command(String),
}

impl Action {
    /// The payload with `{player}` replaced.
    pub fn render(&self, player: &str) -> String {
        let raw = match self {
            Action::Kick(s) | Action::Message(s) | Action::Command(s) => s,
        };
        raw.replace("{player}", player)
    }
}

impl std::str::FromStr for Action {
    type Err = ActionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (tag, rest) = ["[kick]", "[message]", "[command]"]
            .iter()
            .find_map(|tag| trimmed.strip_prefix(tag).map(|rest| (*tag, rest)))
            .ok_or_else(|| ActionParseError(s.to_string()))?;
        let payload = rest.strip_prefix('|').unwrap_or(rest).to_string();

        Ok(match tag {
            "[kick]" => Action::Kick(payload),
            "[message]" => Action::Message(payload),
            _ => Action::Command(payload),
        })
    }
}

impl TryFrom<String> for Action {
    type Error = ActionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Kick(s) => write!(f, "[kick]{}", s),
            Action::Message(s) => write!(f, "[message]{}", s),
            Action::Command(s) => write!(f, "[command]{}", s),
        }
    }
}

/// One item placed in a dialog slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MenuItem {
    pub slot: u32,
    #[serde(default = "default_material")]
    pub material: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lore: Vec<String>,
    #[serde(default)]
    pub click_actions: Vec<Action>,
}

fn default_material() -> String {
    "paper".to_string()
}

impl MenuItem {
    fn labelled(slot: u32, material: &str, name: &str, lore: &[&str]) -> Self {
        Self {
            slot,
            material: material.to_string(),
            name: name.to_string(),
            lore: lore.iter().map(|l| l.to_string()).collect(),
            click_actions: Vec::new(),
        }
    }
}

/// Layout of one dialog type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MenuLayout {
    pub title: String,
    #[serde(default)]
    pub open_actions: Vec<Action>,
    #[serde(default)]
    pub close_actions: Vec<Action>,
    #[serde(default)]
    pub items: Vec<MenuItem>,
}

impl MenuLayout {
    /// The item bound to `slot`, if any. The first binding wins.
    pub fn item_at(&self, slot: u32) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.slot == slot)
    }

    /// Built-in layout used when the configuration does not define one.
    pub fn builtin(gui_type: GuiType) -> Self {
        let (title, confirm_lore) = match gui_type {
            GuiType::Login => ("Login", "Click to log in"),
            GuiType::Register => ("Register", "Click to create your account"),
        };
        Self {
            title: title.to_string(),
            open_actions: Vec::new(),
            close_actions: Vec::new(),
            items: vec![
                MenuItem::labelled(SLOT_CANCEL, "barrier", "Cancel", &["Leave the dialog"]),
                MenuItem::labelled(SLOT_RESET, "paper", "Reset", &["Clear the password field"]),
                MenuItem::labelled(SLOT_CONFIRM, "lime_wool", "Confirm", &[confirm_lore]),
            ],
        }
    }
}

/// The active layouts, one per dialog type.
#[derive(Debug, Clone)]
pub struct MenuCatalog {
    login: Option<Arc<MenuLayout>>,
    register: Option<Arc<MenuLayout>>,
}

impl MenuCatalog {
    pub fn new(login: Option<MenuLayout>, register: Option<MenuLayout>) -> Self {
        Self {
            login: login.map(Arc::new),
            register: register.map(Arc::new),
        }
    }

    /// A catalog without any layout; every lookup misses.
    pub fn empty() -> Self {
        Self::new(None, None)
    }

    pub fn get(&self, gui_type: GuiType) -> Option<Arc<MenuLayout>> {
        match gui_type {
            GuiType::Login => self.login.clone(),
            GuiType::Register => self.register.clone(),
        }
    }
}

impl Default for MenuCatalog {
    fn default() -> Self {
        Self::new(
            Some(MenuLayout::builtin(GuiType::Login)),
            Some(MenuLayout::builtin(GuiType::Register)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_actions() {
        assert_eq!(
            "[kick]Bye {player}".parse::<Action>().unwrap(),
            Action::Kick("Bye {player}".into())
        );
        assert_eq!(
            "[message]|hello".parse::<Action>().unwrap(),
            Action::Message("hello".into())
        );
        assert_eq!(
            "  [command]spawn {player}".parse::<Action>().unwrap(),
            Action::Command("spawn {player}".into())
        );
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = "[teleport]spawn".parse::<Action>().unwrap_err();
        assert_eq!(err, ActionParseError("[teleport]spawn".into()));
    }

    #[test]
    fn render_substitutes_player() {
        let action = Action::Command("give {player} bread".into());
        assert_eq!(action.render("alice"), "give alice bread");
    }

    #[test]
    fn deserialize_layout() {
        let layout: MenuLayout = toml::from_str(
            r#"
title = "Welcome"
close_actions = ["[message]|Closed"]

[[items]]
slot = 0
name = "Leave"
click_actions = ["[kick]Goodbye"]

[[items]]
slot = 2
material = "emerald"
name = "Go"
"#,
        )
        .unwrap();

        assert_eq!(layout.title, "Welcome");
        assert_eq!(layout.close_actions, vec![Action::Message("Closed".into())]);
        assert_eq!(layout.item_at(0).unwrap().click_actions.len(), 1);
        assert_eq!(layout.item_at(0).unwrap().material, "paper");
        assert_eq!(layout.item_at(2).unwrap().material, "emerald");
        assert!(layout.item_at(1).is_none());
    }

    #[test]
    fn deserialize_rejects_bad_action() {
        let result: Result<MenuLayout, _> = toml::from_str(
            r#"
title = "Broken"
open_actions = ["[explode]now"]
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn catalog_defaults_to_builtin_layouts() {
        let catalog = MenuCatalog::default();
        let login = catalog.get(GuiType::Login).unwrap();
        assert_eq!(login.title, "Login");
        assert!(login.item_at(SLOT_CONFIRM).is_some());
        assert!(MenuCatalog::empty().get(GuiType::Register).is_none());
    }
}
