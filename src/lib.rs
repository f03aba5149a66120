//! xlcards - flashcards from spreadsheets
//!
//! Turns the rows of an XLSX or CSV sheet into a deck of question/answer
//! cards and drives a study session over them:
//! - Any column as the question, one or more columns as the answer
//! - New / learning / mastered tracking with self-rating
//! - Shuffled study queue rebuilt each round until everything is mastered
//! - Runs in the browser via WebAssembly, or in the terminal via `xlcards_cli`
//!
//! # Usage (JavaScript)
//!
//! ```javascript
//! import init, { FlashcardApp, readFile } from 'xlcards';
//! await init();
//! const app = new FlashcardApp();
//! const events = app.load(file.name, await readFile(file));
//! ```
//!
//! # Usage (Rust)
//!
//! ```no_run
//! use xlcards::{Intent, Rating, SessionConfig, StudySession};
//!
//! let bytes = std::fs::read("capitals.xlsx").unwrap_or_default();
//! let mut session: StudySession = StudySession::new(SessionConfig::default());
//! session.load("capitals.xlsx", &bytes);
//! session.dispatch(Intent::StartStudy { start_row: 2, end_row: 20, shuffle: true });
//! session.dispatch(Intent::Rate { rating: Rating::Easy });
//! ```

// Reading spreadsheets
pub mod cell_ref;
pub mod error;
pub mod source;
pub mod xml_helpers;

// Deck and study state
pub mod card;
pub mod clock;
pub mod columns;
pub mod deck;
pub mod engine;
pub mod session;

// Browser surface
pub mod bindings;

use wasm_bindgen::prelude::*;

pub use bindings::FlashcardApp;
pub use card::{Answer, AnswerEntry, Card, Confidence, Mastery, Rating, BLANK_ANSWER};
pub use clock::{Clock, ManualClock, SystemClock};
pub use columns::ColumnOption;
pub use deck::{build_deck, Deck, DeckRequest};
pub use engine::{RateOutcome, SessionStats, SessionSummary, StudyEngine};
pub use error::{Result, ValidationError, ValidationReason, XlcardsError};
pub use session::{Event, Intent, Phase, SessionConfig, StudySession};
pub use source::{Delimiter, Grid, GridBounds, SheetGrid, TabularSource, Workbook};

/// Get the library version
#[must_use]
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
