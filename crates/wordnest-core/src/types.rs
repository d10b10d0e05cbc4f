//! Domain types: learners, their profiles, and the messages exchanged with them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform-assigned learner identifier (the Telegram user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(UserId)
    }
}

/// Languages a learner can study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    English,
    French,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::French];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::French => "French",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|l| l.as_str() == s.trim())
            .ok_or(())
    }
}

/// CEFR proficiency levels offered during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    A1,
    A2,
    B1,
    B2,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::A1, Level::A2, Level::B1, Level::B2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::A1 => "A1",
            Level::A2 => "A2",
            Level::B1 => "B1",
            Level::B2 => "B2",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|l| l.as_str() == s.trim())
            .ok_or(())
    }
}

/// Local wall-clock delivery time, `HH:MM`. Interpreted in the process-wide timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeliveryTime {
    hour: u32,
    minute: u32,
}

impl DeliveryTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour <= 23 && minute <= 59).then_some(Self { hour, minute })
    }

    /// Parse `H:MM` or `HH:MM`. Minutes must be two digits.
    pub fn parse(input: &str) -> Option<Self> {
        let (h, m) = input.trim().split_once(':')?;
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(h) || h.len() > 2 || !digits(m) || m.len() != 2 {
            return None;
        }
        Self::new(h.parse().ok()?, m.parse().ok()?)
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }
}

impl fmt::Display for DeliveryTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for DeliveryTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid delivery time '{value}'"))
    }
}

impl From<DeliveryTime> for String {
    fn from(t: DeliveryTime) -> Self {
        t.to_string()
    }
}

fn default_true() -> bool {
    true
}

/// Durable learner profile. Only ever stored fully populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub language: Language,
    pub level: Level,
    pub time: DeliveryTime,
    /// Opaque, unvalidated. Empty when email capture is disabled.
    #[serde(default)]
    pub email: String,
    /// Index of the next lesson to deliver.
    #[serde(default)]
    pub cursor: u32,
    /// Cleared by `/cancel`; inactive profiles are never re-armed.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl UserProfile {
    /// A freshly committed profile: cursor at the first lesson, active.
    pub fn new(language: Language, level: Level, time: DeliveryTime, email: String) -> Self {
        Self {
            language,
            level,
            time,
            email,
            cursor: 0,
            active: true,
        }
    }
}

/// Atomic read-modify-write operations on a stored profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileUpdate {
    /// Set `cursor = next`, but only if the cursor still equals `expected`.
    AdvanceCursor { expected: u32, next: u32 },
    /// Stop delivery while keeping the row.
    Deactivate,
}

impl ProfileUpdate {
    /// Apply to a profile. Returns whether anything changed.
    pub fn apply(&self, profile: &mut UserProfile) -> bool {
        match *self {
            ProfileUpdate::AdvanceCursor { expected, next } => {
                if profile.cursor != expected {
                    return false;
                }
                profile.cursor = next;
                true
            }
            ProfileUpdate::Deactivate => {
                let changed = profile.active;
                profile.active = false;
                changed
            }
        }
    }
}

/// A text message received from a learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub user_id: UserId,
    pub chat_id: i64,
    pub sender_name: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Keyboard attached to an outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyMarkup {
    /// Leave whatever keyboard the client shows.
    #[default]
    None,
    /// One-time keyboard, one choice per row.
    Choices(Vec<String>),
    /// Hide a previously shown keyboard.
    Remove,
}

/// A text message sent to a learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub user_id: UserId,
    pub text: String,
    #[serde(default)]
    pub markup: ReplyMarkup,
}

impl OutgoingMessage {
    pub fn text(user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            user_id,
            text: text.into(),
            markup: ReplyMarkup::None,
        }
    }

    pub fn with_markup(mut self, markup: ReplyMarkup) -> Self {
        self.markup = markup;
        self
    }
}
