//! Password buffer reconstruction from full-string rename snapshots.
//!
//! The host reports the whole content of the text field on every edit, with
//! no cursor or delta. Insertions and deletions are inferred from the length
//! difference between the snapshot and the buffered value, and from whether
//! the snapshot is already the mask echo the host renders one tick after a
//! literal keystroke.
//!
//! # Security
//!
//! The real value lives in a [`Zeroizing`] string that is wiped on drop and is
//! only handed out as a [`SecretString`]. Neither the `Debug` output nor any
//! log line contains it; lengths are logged instead.

use std::collections::HashMap;

use secrecy::SecretString;
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use crate::error::GuiError;
use crate::types::{DisplayMode, UserId};

/// Prompt phrases the host shows in an empty field.
pub const DEFAULT_PLACEHOLDERS: [&str; 4] = ["请输入密码", "输入密码", "password", "请输入"];

/// Detects the placeholder prompt echoed back as if it were input.
///
/// The match is a case-insensitive substring test that ignores whitespace
/// and dots (periods or ellipses). Localized prompts that are not listed
/// pass through as input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderFilter {
    phrases: Vec<String>,
}

impl PlaceholderFilter {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| normalize(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// Also treat `phrase` as a prompt, e.g. the rendered placeholder message.
    pub fn with_phrase(mut self, phrase: &str) -> Self {
        let phrase = normalize(phrase);
        if !phrase.is_empty() && !self.phrases.contains(&phrase) {
            self.phrases.push(phrase);
        }
        self
    }

    /// Whether `text` contains one of the configured prompt phrases.
    pub fn matches(&self, text: &str) -> bool {
        let text = normalize(text);
        self.phrases.iter().any(|p| text.contains(p.as_str()))
    }
}

impl Default for PlaceholderFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDERS)
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| *c != '.' && *c != '…' && !c.is_whitespace())
        .collect()
}

/// Display settings, read at the time of every ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSettings {
    pub mode: DisplayMode,
    pub mask: char,
    pub placeholders: PlaceholderFilter,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Masked,
            mask: '*',
            placeholders: PlaceholderFilter::default(),
        }
    }
}

impl InputSettings {
    /// Render a real value for display.
    pub fn render(&self, real: &str) -> String {
        match self.mode {
            DisplayMode::Plaintext => real.to_string(),
            DisplayMode::Masked => std::iter::repeat(self.mask)
                .take(real.chars().count())
                .collect(),
        }
    }
}

/// One user's reconstructed password.
///
/// Never stored empty: an empty value is represented by the absence of a
/// buffer in [`InputCaptureEngine`].
pub struct InputBuffer {
    real: Zeroizing<String>,
    display: String,
}

impl InputBuffer {
    fn new(real: Zeroizing<String>, settings: &InputSettings) -> Self {
        let display = settings.render(&real);
        Self { real, display }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    /// Number of characters in the real value.
    pub fn len(&self) -> usize {
        self.real.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }
}

// Manual Debug implementation to avoid exposing secrets
impl std::fmt::Debug for InputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputBuffer")
            .field("real", &"[REDACTED]")
            .field("len", &self.len())
            .finish()
    }
}

/// Outcome of reconciling one snapshot with the buffered value.
#[derive(PartialEq, Eq)]
pub enum Reconcile {
    /// Drop the buffer.
    Clear,
    /// The snapshot is a stable echo; keep the buffer as is.
    Keep,
    /// Replace the buffered value.
    Set(Zeroizing<String>),
}

impl std::fmt::Debug for Reconcile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reconcile::Clear => write!(f, "Clear"),
            Reconcile::Keep => write!(f, "Keep"),
            Reconcile::Set(value) => write!(f, "Set(<{} chars>)", value.chars().count()),
        }
    }
}

/// Reconcile a whitespace-stripped, non-placeholder snapshot with the current
/// real value.
pub fn reconcile(
    current: &str,
    cleaned: &str,
    settings: &InputSettings,
) -> Result<Reconcile, GuiError> {
    let n = cleaned.chars().count();
    let m = current.chars().count();
    let masked = settings.mode == DisplayMode::Masked;

    if masked && cleaned.chars().all(|c| c == settings.mask) {
        // Remnant of deleting the last character.
        if n == 1 && m == 0 {
            return Ok(Reconcile::Clear);
        }
        if n < m {
            return prefix(current, n).map(Reconcile::Set);
        }
        return Ok(Reconcile::Keep);
    }

    if n < m {
        let source = if masked { current } else { cleaned };
        return prefix(source, n).map(Reconcile::Set);
    }
    if n > m {
        let mut next = Zeroizing::new(String::with_capacity(current.len() + cleaned.len()));
        next.push_str(current);
        next.extend(cleaned.chars().skip(m));
        return Ok(Reconcile::Set(next));
    }
    Ok(Reconcile::Set(Zeroizing::new(cleaned.to_string())))
}

fn prefix(source: &str, len: usize) -> Result<Zeroizing<String>, GuiError> {
    let out: Zeroizing<String> = Zeroizing::new(source.chars().take(len).collect());
    if out.chars().count() != len {
        return Err(GuiError::InputDesync);
    }
    Ok(out)
}

/// Per-user password buffers.
///
/// # Thread Safety
///
/// Not thread-safe. Snapshots arriving off the scheduler thread go through
/// the session crate's relay first.
#[derive(Debug, Default)]
pub struct InputCaptureEngine {
    buffers: HashMap<UserId, InputBuffer>,
    settings: InputSettings,
}

impl InputCaptureEngine {
    pub fn new(settings: InputSettings) -> Self {
        Self {
            buffers: HashMap::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &InputSettings {
        &self.settings
    }

    /// Replace the display settings. Existing buffers are re-rendered.
    pub fn configure(&mut self, settings: InputSettings) {
        for buffer in self.buffers.values_mut() {
            buffer.display = settings.render(&buffer.real);
        }
        self.settings = settings;
    }

    /// Process one snapshot and return the value to display.
    pub fn ingest(&mut self, user: UserId, raw: Option<&str>) -> String {
        let cleaned: Zeroizing<String> = Zeroizing::new(
            raw.unwrap_or_default()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect(),
        );

        if cleaned.is_empty() || self.settings.placeholders.matches(&cleaned) {
            if self.buffers.remove(&user).is_some() {
                debug!(user = %user, "Input cleared");
            }
            return String::new();
        }

        let current = self.buffers.get(&user).map(|b| b.real.as_str()).unwrap_or("");
        let outcome = match reconcile(current, &cleaned, &self.settings) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(user = %user, error = %e, "Ignoring unreconcilable snapshot");
                return self.display_value(user);
            }
        };
        trace!(user = %user, outcome = ?outcome, "Snapshot reconciled");

        match outcome {
            Reconcile::Clear => {
                self.buffers.remove(&user);
                String::new()
            }
            Reconcile::Keep => match self.buffers.get_mut(&user) {
                Some(buffer) => {
                    buffer.display = self.settings.render(&buffer.real);
                    buffer.display.clone()
                }
                None => String::new(),
            },
            Reconcile::Set(real) if real.is_empty() => {
                self.buffers.remove(&user);
                String::new()
            }
            Reconcile::Set(real) => {
                let buffer = InputBuffer::new(real, &self.settings);
                let display = buffer.display.clone();
                self.buffers.insert(user, buffer);
                display
            }
        }
    }

    /// The current display value, empty when nothing is buffered.
    pub fn display_value(&self, user: UserId) -> String {
        self.buffers
            .get(&user)
            .map(|b| b.display.clone())
            .unwrap_or_default()
    }

    /// The real password, for handing to the authentication backend.
    pub fn real_value(&self, user: UserId) -> Option<SecretString> {
        self.buffers
            .get(&user)
            .map(|b| SecretString::from(b.real.as_str()))
    }

    pub fn has_input(&self, user: UserId) -> bool {
        self.buffers.contains_key(&user)
    }

    /// Length of the real value in characters, 0 when absent.
    pub fn input_len(&self, user: UserId) -> usize {
        self.buffers.get(&user).map(InputBuffer::len).unwrap_or(0)
    }

    /// Drop the user's buffer. Returns whether one existed.
    pub fn clear(&mut self, user: UserId) -> bool {
        self.buffers.remove(&user).is_some()
    }

    pub fn clear_all(&mut self) {
        let count = self.buffers.len();
        self.buffers.clear();
        if count > 0 {
            debug!(count, "Cleared all input buffers");
        }
    }

    /// Number of users with buffered input.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
