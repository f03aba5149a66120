//! Study engine: per-card mastery and the prioritised study queue.
//!
//! The queue holds indices into the deck for every card that is not yet
//! mastered, in random order. Rating moves the cursor forward; when the
//! cursor runs off the end the queue is rebuilt from the remaining cards,
//! and the session is complete once nothing is left to rebuild from.

use std::fmt;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::card::{Card, Mastery, Rating};
use crate::clock::{Clock, SystemClock};
use crate::deck::Deck;

/// Card counts per mastery level, recomputed from the deck on every change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub mastered: usize,
    pub learning: usize,
    pub new: usize,
}

impl SessionStats {
    #[must_use]
    pub fn from_cards(cards: &[Card]) -> Self {
        cards.iter().fold(Self::default(), |mut stats, card| {
            match card.mastery {
                Mastery::New => stats.new += 1,
                Mastery::Learning => stats.learning += 1,
                Mastery::Mastered => stats.mastered += 1,
            }
            stats
        })
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.mastered + self.learning + self.new
    }
}

/// Shown when every card has been mastered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total_cards: usize,
    pub mastered_count: usize,
    /// Whole minutes since the deck was started, rounded to nearest.
    pub elapsed_minutes: f64,
}

/// Result of [`StudyEngine::rate_confidence`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateOutcome {
    /// No current card; nothing changed.
    Ignored,
    /// The card was rated and another card is now current.
    Advanced,
    /// The last unmastered card was mastered.
    Complete(SessionSummary),
}

/// Owns one deck for the length of a study session.
pub struct StudyEngine {
    cards: Vec<Card>,
    queue: Vec<usize>,
    cursor: usize,
    started_at: f64,
    rng: ChaCha8Rng,
    clock: Box<dyn Clock>,
}

impl fmt::Debug for StudyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyEngine")
            .field("cards", &self.cards.len())
            .field("queue", &self.queue)
            .field("cursor", &self.cursor)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl StudyEngine {
    /// Start studying `deck` with an entropy-seeded shuffle.
    #[must_use]
    pub fn new(deck: Deck) -> Self {
        Self::with_rng(deck, ChaCha8Rng::from_entropy())
    }

    /// Start studying `deck` with a reproducible shuffle.
    #[must_use]
    pub fn with_seed(deck: Deck, seed: u64) -> Self {
        Self::with_rng(deck, ChaCha8Rng::seed_from_u64(seed))
    }

    #[must_use]
    pub fn with_rng(deck: Deck, rng: ChaCha8Rng) -> Self {
        let mut engine = Self {
            cards: deck.into_cards(),
            queue: Vec::new(),
            cursor: 0,
            started_at: 0.0,
            rng,
            clock: Box::new(SystemClock),
        };
        engine.started_at = engine.clock.now_ms();
        engine.build_study_queue();
        engine
    }

    /// Swap the time source; the session start is re-read from it.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self.started_at = self.clock.now_ms();
        self
    }

    /// Queue every new or learning card in random order and rewind.
    pub fn build_study_queue(&mut self) {
        self.queue = self
            .cards
            .iter()
            .enumerate()
            .filter(|(_, card)| card.mastery.needs_review())
            .map(|(i, _)| i)
            .collect();
        self.queue.shuffle(&mut self.rng);
        self.cursor = 0;
        tracing::trace!(queued = self.queue.len(), "study queue rebuilt");
    }

    /// Rate the current card and move on.
    pub fn rate_confidence(&mut self, rating: Rating) -> RateOutcome {
        let Some(&index) = self.queue.get(self.cursor) else {
            return RateOutcome::Ignored;
        };
        let now = self.clock.now_ms();
        let Some(card) = self.cards.get_mut(index) else {
            return RateOutcome::Ignored;
        };
        card.record(rating, now);
        self.cursor += 1;

        if self.cursor >= self.queue.len() {
            self.build_study_queue();
            if self.queue.is_empty() {
                let summary = self.summary(now);
                tracing::info!(
                    total = summary.total_cards,
                    minutes = summary.elapsed_minutes,
                    "all cards mastered"
                );
                return RateOutcome::Complete(summary);
            }
        }
        RateOutcome::Advanced
    }

    /// Step back one card, wrapping to the end. Mastery is untouched.
    /// Returns `false` when there is nothing to step through.
    pub fn prev_card(&mut self) -> bool {
        let len = self.queue.len();
        if len == 0 {
            return false;
        }
        self.cursor = (self.cursor % len + len - 1) % len;
        true
    }

    /// Forget all progress on every card.
    pub fn reset_all_mastery(&mut self) {
        self.cards.iter_mut().for_each(Card::reset);
    }

    /// Forget all progress and requeue the whole deck.
    pub fn restart(&mut self) {
        self.reset_all_mastery();
        self.build_study_queue();
    }

    /// The card under the cursor, if any.
    #[must_use]
    pub fn current_card(&self) -> Option<&Card> {
        self.queue
            .get(self.cursor)
            .and_then(|&index| self.cards.get(index))
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats::from_cards(&self.cards)
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Cursor position within the queue.
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Deck indices in queue order.
    #[must_use]
    pub fn queue(&self) -> &[usize] {
        &self.queue
    }

    fn summary(&self, now: f64) -> SessionSummary {
        let stats = self.stats();
        SessionSummary {
            total_cards: self.cards.len(),
            mastered_count: stats.mastered,
            elapsed_minutes: ((now - self.started_at) / 60_000.0).round().max(0.0),
        }
    }
}
