//! Intent/event dispatcher tying a loaded workbook to a study engine.
//!
//! The presentation layer sends [`Intent`]s and renders the [`Event`]s it
//! gets back. All state lives in [`StudySession`]; nothing is global.

use std::rc::Rc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::card::{Card, Rating};
use crate::clock::{Clock, SystemClock};
use crate::columns::{answer_options, default_selection, derive_columns, reconcile_answers, ColumnOption};
use crate::deck::{build_deck, default_row_range, study_prompt, DeckRequest};
use crate::engine::{RateOutcome, SessionStats, StudyEngine};
use crate::error::ValidationReason;
use crate::source::{TabularSource, Workbook};

/// Session-wide settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Fixed seed for every shuffle; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Where the user is in the flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Setup,
    Studying,
    Complete,
}

/// A user action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Intent {
    SheetSelected {
        index: usize,
    },
    QuestionColumnSelected {
        index: u32,
    },
    AnswerColumnsSelected {
        indices: Vec<u32>,
    },
    StartStudy {
        start_row: u32,
        end_row: u32,
        #[serde(default)]
        shuffle: bool,
    },
    Rate {
        rating: Rating,
    },
    FlipCard,
    PreviousCard,
    Restart,
    NewDeck,
}

impl Intent {
    /// Keyboard shortcut for a `KeyboardEvent.key` value.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(Self::PreviousCard),
            " " | "Enter" => Some(Self::FlipCard),
            "r" | "R" => Some(Self::Restart),
            _ => None,
        }
    }
}

/// Something the presentation layer should render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    WorkbookLoaded {
        name: String,
        sheets: Vec<String>,
    },
    LoadFailed {
        message: String,
    },
    ColumnsReady {
        question_options: Vec<ColumnOption>,
        answer_options: Vec<ColumnOption>,
        question: Option<u32>,
        answers: Vec<u32>,
    },
    RowRangeReady {
        min_row: u32,
        max_row: u32,
        start_row: u32,
        end_row: u32,
    },
    StudyStarted {
        prompt: String,
        total_cards: usize,
    },
    /// `card` is `None` when there is nothing left to show.
    CardChanged {
        card: Option<Card>,
        showing_answer: bool,
        position: usize,
        queue_len: usize,
    },
    StatsChanged {
        stats: SessionStats,
    },
    SessionComplete {
        total_cards: usize,
        mastered_count: usize,
        elapsed_minutes: f64,
    },
    ValidationFailed {
        reason: ValidationReason,
        message: String,
    },
    SessionReset,
}

/// One user's study session over one loaded source.
pub struct StudySession<S: TabularSource = Workbook> {
    rng: ChaCha8Rng,
    clock: Rc<dyn Clock>,
    source: Option<(String, S)>,
    sheet: Option<usize>,
    columns: Vec<ColumnOption>,
    question: Option<u32>,
    answers: Vec<u32>,
    prompt: String,
    showing_answer: bool,
    phase: Phase,
    engine: Option<StudyEngine>,
}

impl<S: TabularSource> std::fmt::Debug for StudySession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudySession")
            .field("source", &self.source.as_ref().map(|(name, _)| name))
            .field("sheet", &self.sheet)
            .field("question", &self.question)
            .field("answers", &self.answers)
            .field("phase", &self.phase)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl<S: TabularSource> Default for StudySession<S> {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl<S: TabularSource> StudySession<S> {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            rng,
            clock: Rc::new(SystemClock),
            source: None,
            sheet: None,
            columns: Vec::new(),
            question: None,
            answers: Vec::new(),
            prompt: String::new(),
            showing_answer: false,
            phase: Phase::Setup,
            engine: None,
        }
    }

    /// Use `clock` for review timestamps and session duration.
    #[must_use]
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace whatever was loaded with `source` and select its first sheet.
    pub fn open(&mut self, name: impl Into<String>, source: S) -> Vec<Event> {
        let name = name.into();
        let sheets = source.sheet_names();
        tracing::info!(file = %name, sheets = sheets.len(), "workbook opened");

        self.clear();
        self.source = Some((name.clone(), source));
        let mut events = vec![Event::WorkbookLoaded { name, sheets }];
        events.extend(self.select_sheet(0));
        events
    }

    /// Handle one intent. Intents that make no sense in the current state
    /// produce no events.
    pub fn dispatch(&mut self, intent: Intent) -> Vec<Event> {
        tracing::debug!(?intent, phase = ?self.phase, "dispatch");
        match intent {
            Intent::SheetSelected { index } => self.select_sheet(index),
            Intent::QuestionColumnSelected { index } => self.select_question(index),
            Intent::AnswerColumnsSelected { indices } => self.select_answers(&indices),
            Intent::StartStudy {
                start_row,
                end_row,
                shuffle,
            } => self.start_study(start_row, end_row, shuffle),
            Intent::Rate { rating } => self.rate(rating),
            Intent::FlipCard => self.flip(),
            Intent::PreviousCard => self.previous(),
            Intent::Restart => self.restart(),
            Intent::NewDeck => self.new_deck(),
        }
    }

    /// Map a key press to an intent. Shortcuts only apply while studying.
    pub fn handle_key(&mut self, key: &str) -> Vec<Event> {
        if self.phase != Phase::Studying {
            return Vec::new();
        }
        Intent::from_key(key).map_or_else(Vec::new, |intent| self.dispatch(intent))
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn source(&self) -> Option<&S> {
        self.source.as_ref().map(|(_, source)| source)
    }

    #[must_use]
    pub fn selected_sheet(&self) -> Option<usize> {
        self.sheet
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnOption] {
        &self.columns
    }

    #[must_use]
    pub fn question(&self) -> Option<u32> {
        self.question
    }

    #[must_use]
    pub fn answers(&self) -> &[u32] {
        &self.answers
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn showing_answer(&self) -> bool {
        self.showing_answer
    }

    #[must_use]
    pub fn engine(&self) -> Option<&StudyEngine> {
        self.engine.as_ref()
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&Card> {
        self.engine.as_ref().and_then(StudyEngine::current_card)
    }

    #[must_use]
    pub fn stats(&self) -> Option<SessionStats> {
        self.engine.as_ref().map(StudyEngine::stats)
    }

    fn clear(&mut self) {
        self.source = None;
        self.sheet = None;
        self.columns.clear();
        self.question = None;
        self.answers.clear();
        self.prompt.clear();
        self.showing_answer = false;
        self.phase = Phase::Setup;
        self.engine = None;
    }

    fn select_sheet(&mut self, index: usize) -> Vec<Event> {
        let Some((_, source)) = &self.source else {
            return Vec::new();
        };
        let Some(grid) = source.sheet(index) else {
            tracing::warn!(index, "sheet not found");
            return Vec::new();
        };

        let columns = derive_columns(grid);
        let (min_row, max_row, start_row, end_row) = default_row_range(grid);
        let (question, answers) = match default_selection(&columns) {
            Some((q, a)) => (Some(q), reconcile_answers(&answer_options(&columns, q), &[a])),
            None => (None, Vec::new()),
        };
        tracing::debug!(sheet = index, columns = columns.len(), "sheet selected");

        self.sheet = Some(index);
        self.columns = columns;
        self.question = question;
        self.answers = answers;
        vec![
            self.columns_ready(),
            Event::RowRangeReady {
                min_row,
                max_row,
                start_row,
                end_row,
            },
        ]
    }

    fn select_question(&mut self, index: u32) -> Vec<Event> {
        if !self.columns.iter().any(|opt| opt.index == index) {
            return Vec::new();
        }
        self.question = Some(index);
        self.answers = reconcile_answers(&answer_options(&self.columns, index), &self.answers);
        vec![self.columns_ready()]
    }

    fn select_answers(&mut self, indices: &[u32]) -> Vec<Event> {
        if self.sheet.is_none() {
            return Vec::new();
        }
        let offered = self.answer_options();
        let mut answers: Vec<u32> = Vec::with_capacity(indices.len());
        for &index in indices {
            if !offered.iter().any(|opt| opt.index == index) {
                tracing::debug!(
                    column = index,
                    question = ?self.question,
                    "answer column not offered, dropped"
                );
            } else if !answers.contains(&index) {
                answers.push(index);
            }
        }
        self.answers = answers;
        vec![self.columns_ready()]
    }

    fn start_study(&mut self, start_row: u32, end_row: u32, shuffle: bool) -> Vec<Event> {
        let Some((_, source)) = &self.source else {
            return Vec::new();
        };
        let Some(grid) = self.sheet.and_then(|index| source.sheet(index)) else {
            return Vec::new();
        };

        let request = DeckRequest {
            question_col: self.question.unwrap_or(0),
            answer_cols: self.answers.clone(),
            start_row,
            end_row,
            shuffle,
        };
        let deck = match build_deck(grid, &request, &mut self.rng) {
            Ok(deck) => deck,
            Err(err) => {
                return vec![Event::ValidationFailed {
                    reason: err.reason(),
                    message: err.to_string(),
                }]
            }
        };
        let prompt = study_prompt(grid, request.question_col, &request.answer_cols);

        let total_cards = deck.len();
        let engine = StudyEngine::with_seed(deck, self.rng.gen())
            .with_clock(Box::new(Rc::clone(&self.clock)));
        tracing::info!(cards = total_cards, start_row, end_row, shuffle, "study started");

        self.engine = Some(engine);
        self.prompt.clone_from(&prompt);
        self.showing_answer = false;
        self.phase = Phase::Studying;

        let mut events = vec![Event::StudyStarted {
            prompt,
            total_cards,
        }];
        events.extend(self.card_and_stats());
        events
    }

    fn rate(&mut self, rating: Rating) -> Vec<Event> {
        if self.phase != Phase::Studying {
            return Vec::new();
        }
        let Some(engine) = self.engine.as_mut() else {
            return Vec::new();
        };
        match engine.rate_confidence(rating) {
            RateOutcome::Ignored => Vec::new(),
            RateOutcome::Advanced => {
                self.showing_answer = false;
                self.card_and_stats()
            }
            RateOutcome::Complete(summary) => {
                self.showing_answer = false;
                self.phase = Phase::Complete;
                let mut events = self.stats_event().into_iter().collect::<Vec<_>>();
                events.push(Event::SessionComplete {
                    total_cards: summary.total_cards,
                    mastered_count: summary.mastered_count,
                    elapsed_minutes: summary.elapsed_minutes,
                });
                events
            }
        }
    }

    fn flip(&mut self) -> Vec<Event> {
        if self.phase != Phase::Studying {
            return Vec::new();
        }
        self.showing_answer = !self.showing_answer;
        self.card_event().into_iter().collect()
    }

    fn previous(&mut self) -> Vec<Event> {
        if self.phase != Phase::Studying {
            return Vec::new();
        }
        let moved = self.engine.as_mut().is_some_and(StudyEngine::prev_card);
        if !moved {
            return Vec::new();
        }
        self.showing_answer = false;
        self.card_event().into_iter().collect()
    }

    fn restart(&mut self) -> Vec<Event> {
        let Some(engine) = self.engine.as_mut() else {
            return Vec::new();
        };
        engine.restart();
        tracing::info!(cards = engine.cards().len(), "progress reset");
        self.showing_answer = false;
        self.phase = Phase::Studying;
        self.card_and_stats()
    }

    fn new_deck(&mut self) -> Vec<Event> {
        self.clear();
        vec![Event::SessionReset]
    }

    fn answer_options(&self) -> Vec<ColumnOption> {
        match self.question {
            Some(question) => answer_options(&self.columns, question),
            None => self.columns.clone(),
        }
    }

    fn columns_ready(&self) -> Event {
        Event::ColumnsReady {
            question_options: self.columns.clone(),
            answer_options: self.answer_options(),
            question: self.question,
            answers: self.answers.clone(),
        }
    }

    fn card_event(&self) -> Option<Event> {
        let engine = self.engine.as_ref()?;
        Some(Event::CardChanged {
            card: engine.current_card().cloned(),
            showing_answer: self.showing_answer,
            position: engine.position(),
            queue_len: engine.queue_len(),
        })
    }

    fn stats_event(&self) -> Option<Event> {
        self.stats().map(|stats| Event::StatsChanged { stats })
    }

    fn card_and_stats(&self) -> Vec<Event> {
        self.card_event()
            .into_iter()
            .chain(self.stats_event())
            .collect()
    }
}

impl StudySession<Workbook> {
    /// Decode `data` as the file `name` and open it. A file that cannot be
    /// read leaves the current session as it was.
    pub fn load(&mut self, name: &str, data: &[u8]) -> Vec<Event> {
        match Workbook::load(name, data) {
            Ok(workbook) => self.open(name, workbook),
            Err(err) => {
                tracing::warn!(file = name, error = %err, "workbook load failed");
                vec![Event::LoadFailed {
                    message: err.to_string(),
                }]
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::card::Answer;
    use crate::source::SheetGrid;

    fn session() -> StudySession {
        StudySession::new(SessionConfig { seed: Some(11) })
    }

    fn capitals() -> Workbook {
        Workbook::new(
            "capitals.xlsx",
            vec![
                SheetGrid::from_rows(
                    "Europe",
                    [
                        vec!["Country", "Capital", "Currency"],
                        vec!["France", "Paris", "Euro"],
                        vec!["Norway", "Oslo", "Krone"],
                    ],
                ),
                SheetGrid::from_rows("Notes", [vec!["Only"]]),
            ],
        )
    }

    fn start(rows: (u32, u32)) -> Intent {
        Intent::StartStudy {
            start_row: rows.0,
            end_row: rows.1,
            shuffle: false,
        }
    }

    #[test]
    fn test_open_selects_first_sheet() {
        let mut s = session();
        let events = s.open("capitals.xlsx", capitals());
        assert!(matches!(&events[0], Event::WorkbookLoaded { sheets, .. } if sheets.len() == 2));
        match &events[1] {
            Event::ColumnsReady {
                question_options,
                answer_options,
                question,
                answers,
            } => {
                assert_eq!(question_options.len(), 3);
                assert_eq!(answer_options.len(), 2);
                assert_eq!(*question, Some(1));
                assert_eq!(answers, &vec![2]);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(
            events[2],
            Event::RowRangeReady {
                min_row: 2,
                max_row: 3,
                start_row: 2,
                end_row: 3
            }
        );
    }

    #[test]
    fn test_changing_question_reconciles_answers() {
        let mut s = session();
        s.open("c", capitals());
        s.dispatch(Intent::AnswerColumnsSelected {
            indices: vec![2, 3],
        });
        assert_eq!(s.answers(), &[2, 3]);
        s.dispatch(Intent::QuestionColumnSelected { index: 2 });
        assert_eq!(s.answers(), &[3]);
        s.dispatch(Intent::QuestionColumnSelected { index: 3 });
        assert_eq!(s.answers(), &[1]);
    }

    #[test]
    fn test_answer_columns_not_offered_are_dropped() {
        let mut s = session();
        s.open("c", capitals());
        let events = s.dispatch(Intent::AnswerColumnsSelected {
            indices: vec![1, 9, 3, 3],
        });
        assert_eq!(s.answers(), &[3]);
        match events.as_slice() {
            [Event::ColumnsReady {
                question, answers, ..
            }] => {
                assert_eq!(*question, Some(1));
                assert_eq!(answers, &[3]);
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn test_single_column_sheet_has_no_default_answer() {
        let mut s = session();
        s.open("c", capitals());
        s.dispatch(Intent::SheetSelected { index: 1 });
        assert_eq!(s.question(), Some(1));
        assert!(s.answers().is_empty());
        let events = s.dispatch(start((2, 2)));
        assert!(matches!(
            events.as_slice(),
            [Event::ValidationFailed {
                reason: ValidationReason::NoAnswerColumns,
                ..
            }]
        ));
        assert_eq!(s.phase(), Phase::Setup);
    }

    #[test]
    fn test_start_study_emits_prompt_card_and_stats() {
        let mut s = session();
        s.open("c", capitals());
        let events = s.dispatch(start((2, 3)));
        assert_eq!(
            events[0],
            Event::StudyStarted {
                prompt: "What is the Capital of Country?".into(),
                total_cards: 2
            }
        );
        assert!(matches!(&events[1], Event::CardChanged { card: Some(_), showing_answer: false, .. }));
        assert!(matches!(&events[2], Event::StatsChanged { stats } if stats.new == 2));
        assert_eq!(s.phase(), Phase::Studying);
    }

    #[test]
    fn test_header_row_request_is_rejected() {
        let mut s = session();
        s.open("c", capitals());
        let events = s.dispatch(start((1, 3)));
        match events.as_slice() {
            [Event::ValidationFailed { reason, message }] => {
                assert_eq!(*reason, ValidationReason::InvalidRowRange);
                assert!(message.contains("headers"));
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert!(s.engine().is_none());
    }

    #[test]
    fn test_flip_and_rate_cycle_to_completion() {
        let mut s = session();
        s.open("c", capitals());
        s.dispatch(start((2, 3)));

        let flipped = s.dispatch(Intent::FlipCard);
        assert!(matches!(&flipped[..], [Event::CardChanged { showing_answer: true, .. }]));

        let events = s.dispatch(Intent::Rate {
            rating: Rating::Easy,
        });
        assert!(matches!(&events[0], Event::CardChanged { showing_answer: false, .. }));

        let events = s.dispatch(Intent::Rate {
            rating: Rating::Easy,
        });
        assert!(matches!(
            events.last(),
            Some(Event::SessionComplete {
                total_cards: 2,
                mastered_count: 2,
                ..
            })
        ));
        assert_eq!(s.phase(), Phase::Complete);
        assert!(s.dispatch(Intent::Rate { rating: Rating::Easy }).is_empty());
        assert!(s.dispatch(Intent::FlipCard).is_empty());
    }

    #[test]
    fn test_restart_after_completion_resumes_study() {
        let mut s = session();
        s.open("c", capitals());
        s.dispatch(start((2, 3)));
        for _ in 0..2 {
            s.dispatch(Intent::Rate {
                rating: Rating::Easy,
            });
        }
        let events = s.dispatch(Intent::Restart);
        assert_eq!(s.phase(), Phase::Studying);
        assert!(matches!(&events[1], Event::StatsChanged { stats } if stats.new == 2));
    }

    #[test]
    fn test_keys_only_work_while_studying() {
        let mut s = session();
        s.open("c", capitals());
        assert!(s.handle_key(" ").is_empty());
        s.dispatch(start((2, 3)));
        assert!(s.handle_key("Enter").len() == 1);
        assert!(s.showing_answer());
        assert_eq!(s.handle_key("ArrowLeft").len(), 1);
        assert!(!s.showing_answer());
        assert!(s.handle_key("x").is_empty());
        assert_eq!(s.handle_key("R").len(), 2);
    }

    #[test]
    fn test_new_deck_drops_everything() {
        let mut s = session();
        s.open("c", capitals());
        s.dispatch(start((2, 3)));
        assert_eq!(s.dispatch(Intent::NewDeck), vec![Event::SessionReset]);
        assert!(s.source().is_none());
        assert!(s.engine().is_none());
        assert_eq!(s.phase(), Phase::Setup);
        assert!(s.dispatch(start((2, 3))).is_empty());
    }

    #[test]
    fn test_intents_without_workbook_are_ignored() {
        let mut s = session();
        assert!(s.dispatch(Intent::SheetSelected { index: 0 }).is_empty());
        assert!(s.dispatch(Intent::QuestionColumnSelected { index: 1 }).is_empty());
        assert!(s.dispatch(Intent::PreviousCard).is_empty());
        assert!(s.dispatch(Intent::Restart).is_empty());
    }

    #[test]
    fn test_load_failure_keeps_previous_workbook() {
        let mut s = session();
        s.load("words.csv", b"Word,Meaning\nhund,dog\n");
        let events = s.load("broken.xlsx", b"definitely not a zip");
        assert!(matches!(events.as_slice(), [Event::LoadFailed { .. }]));
        assert_eq!(s.source().map(Workbook::name), Some("words.csv"));
    }

    #[test]
    fn test_multi_answer_cards_carry_labels() {
        let mut s = session();
        s.open("c", capitals());
        s.dispatch(Intent::AnswerColumnsSelected {
            indices: vec![3, 2],
        });
        let events = s.dispatch(start((2, 2)));
        match &events[1] {
            Event::CardChanged {
                card: Some(card), ..
            } => {
                assert_eq!(card.question, "France");
                assert_eq!(card.answer.labels(), Some(vec!["Currency", "Capital"]));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(s.prompt(), "What is the Currency, Capital of Country?");
        assert!(matches!(s.current_card().map(|c| &c.answer), Some(Answer::Multi { .. })));
    }

    #[test]
    fn test_intent_json_shape() {
        let intent: Intent =
            serde_json::from_str(r#"{"type":"startStudy","startRow":2,"endRow":5,"shuffle":true}"#).unwrap();
        assert_eq!(
            intent,
            Intent::StartStudy {
                start_row: 2,
                end_row: 5,
                shuffle: true
            }
        );
        let intent: Intent = serde_json::from_str(r#"{"type":"rate","rating":"medium"}"#).unwrap();
        assert_eq!(intent, Intent::Rate { rating: Rating::Medium });
        let event = serde_json::to_value(Event::SessionReset).unwrap();
        assert_eq!(event["type"], "sessionReset");
    }
}
