//! Flashcard model: question, answer, and per-card mastery state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Shown in place of a blank cell when a card has several answer columns,
/// so every answer stays next to its label.
pub const BLANK_ANSWER: &str = "(blank)";

/// Mastery tri-state, serialised as 0 / 1 / 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Mastery {
    #[default]
    New,
    Learning,
    Mastered,
}

impl From<Mastery> for u8 {
    fn from(m: Mastery) -> Self {
        match m {
            Mastery::New => 0,
            Mastery::Learning => 1,
            Mastery::Mastered => 2,
        }
    }
}

impl TryFrom<u8> for Mastery {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::New),
            1 => Ok(Self::Learning),
            2 => Ok(Self::Mastered),
            other => Err(format!("mastery must be 0, 1 or 2, got {other}")),
        }
    }
}

impl Mastery {
    /// Whether the card still belongs in the study queue.
    #[must_use]
    pub fn needs_review(self) -> bool {
        !matches!(self, Self::Mastered)
    }
}

/// A self-rating given after seeing the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Hard,
    Medium,
    Easy,
}

impl Rating {
    /// hard → new, medium → learning, easy → mastered.
    #[must_use]
    pub fn mastery(self) -> Mastery {
        match self {
            Self::Hard => Mastery::New,
            Self::Medium => Mastery::Learning,
            Self::Easy => Mastery::Mastered,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Medium => "medium",
            Self::Easy => "easy",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" | "h" => Ok(Self::Hard),
            "medium" | "m" => Ok(Self::Medium),
            "easy" | "e" => Ok(Self::Easy),
            other => Err(format!("unknown rating: {other}")),
        }
    }
}

/// The most recent rating, or `New` for an unrated card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    New,
    Hard,
    Medium,
    Easy,
}

impl From<Rating> for Confidence {
    fn from(r: Rating) -> Self {
        match r {
            Rating::Hard => Self::Hard,
            Rating::Medium => Self::Medium,
            Rating::Easy => Self::Easy,
        }
    }
}

/// One labelled answer of a multi-column card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub label: String,
    pub text: String,
}

/// Card back: a single value, or one labelled value per answer column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Answer {
    Single { text: String },
    Multi { entries: Vec<AnswerEntry> },
}

impl Answer {
    #[must_use]
    pub fn single(text: impl Into<String>) -> Self {
        Self::Single { text: text.into() }
    }

    /// Number of answer values on the card.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Multi { entries } => entries.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels of a multi-column answer; `None` for a single answer.
    #[must_use]
    pub fn labels(&self) -> Option<Vec<&str>> {
        match self {
            Self::Single { .. } => None,
            Self::Multi { entries } => Some(entries.iter().map(|e| e.label.as_str()).collect()),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single { text } => f.write_str(text),
            Self::Multi { entries } => {
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}: {}", entry.label, entry.text)?;
                }
                Ok(())
            }
        }
    }
}

/// A flashcard and its study state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub question: String,
    pub answer: Answer,
    pub mastery: Mastery,
    pub confidence: Confidence,
    /// Milliseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<f64>,
    pub review_count: u32,
}

impl Card {
    /// A fresh, never reviewed card.
    #[must_use]
    pub fn new(question: impl Into<String>, answer: Answer) -> Self {
        Self {
            question: question.into(),
            answer,
            mastery: Mastery::New,
            confidence: Confidence::New,
            last_reviewed: None,
            review_count: 0,
        }
    }

    /// Apply a rating given at `now_ms`.
    pub fn record(&mut self, rating: Rating, now_ms: f64) {
        self.mastery = rating.mastery();
        self.confidence = rating.into();
        self.last_reviewed = Some(now_ms);
        self.review_count = self.review_count.saturating_add(1);
    }

    /// Back to the fresh-card state.
    pub fn reset(&mut self) {
        self.mastery = Mastery::New;
        self.confidence = Confidence::New;
        self.last_reviewed = None;
        self.review_count = 0;
    }

    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.mastery == Mastery::New
            && self.confidence == Confidence::New
            && self.last_reviewed.is_none()
            && self.review_count == 0
    }
}
