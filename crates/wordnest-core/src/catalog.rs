//! Static lesson catalog: ordered word lists keyed by (language, level).
//! Never mutated at runtime; delivery wraps around once a list is exhausted.

use crate::types::{Language, Level};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One vocabulary item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub word: String,
    pub meaning: String,
    pub sentence: String,
}

impl Lesson {
    pub fn new(word: &str, meaning: &str, sentence: &str) -> Self {
        Self {
            word: word.to_string(),
            meaning: meaning.to_string(),
            sentence: sentence.to_string(),
        }
    }

    /// Render as the daily message body.
    pub fn format(&self) -> String {
        format!(
            "Daily word:\n\nWord: {}\nMeaning: {}\nExample: {}",
            self.word, self.meaning, self.sentence
        )
    }
}

/// Lesson lookup table.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<(Language, Level), Vec<Lesson>>,
}

impl Catalog {
    /// Build from explicit entries (used by tests and alternative catalogs).
    pub fn from_entries(entries: impl IntoIterator<Item = ((Language, Level), Vec<Lesson>)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// The catalog shipped with the bot.
    pub fn builtin() -> Self {
        Self::from_entries([
            (
                (Language::English, Level::A1),
                vec![
                    Lesson::new("apple", "A fruit", "I eat an apple every day."),
                    Lesson::new("book", "A set of pages", "She reads a book."),
                    Lesson::new("cat", "A small animal", "The cat is sleeping."),
                ],
            ),
            (
                (Language::English, Level::A2),
                vec![
                    Lesson::new("travel", "To go somewhere", "We travel to new places."),
                    Lesson::new(
                        "weather",
                        "The state of the atmosphere",
                        "The weather is nice today.",
                    ),
                ],
            ),
            (
                (Language::French, Level::A1),
                vec![
                    Lesson::new("pomme", "Apple", "Je mange une pomme."),
                    Lesson::new("livre", "Book", "Elle lit un livre."),
                ],
            ),
        ])
    }

    /// Ordered lessons for a pair. Empty when the pair has no content.
    pub fn lessons(&self, language: Language, level: Level) -> &[Lesson] {
        self.entries
            .get(&(language, level))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
