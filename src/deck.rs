//! Deck construction: a row range plus a column selection become cards.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::card::{Answer, AnswerEntry, Card, BLANK_ANSWER};
use crate::columns::{header_label, prompt_label};
use crate::error::ValidationError;
use crate::source::{Grid, GridBounds};

/// What the user asked to study. Rows and columns are 1-based and relative
/// to the sheet's bounds; row 1 is the header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckRequest {
    pub question_col: u32,
    pub answer_cols: Vec<u32>,
    pub start_row: u32,
    pub end_row: u32,
    #[serde(default)]
    pub shuffle: bool,
}

/// Cards produced by one "start study".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    #[must_use]
    pub fn new(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    #[must_use]
    pub fn into_cards(self) -> Vec<Card> {
        self.cards
    }
}

/// Check a request against the sheet. Nothing is read from cells here.
///
/// # Errors
/// The first violated constraint, checked in this order: answer columns,
/// header row, start/end order, row bound, column bounds.
pub fn validate<G: Grid + ?Sized>(
    grid: &G,
    request: &DeckRequest,
) -> Result<GridBounds, ValidationError> {
    let DeckRequest {
        question_col,
        ref answer_cols,
        start_row,
        end_row,
        ..
    } = *request;

    if answer_cols.is_empty() {
        return Err(ValidationError::NoAnswerColumns);
    }
    if start_row < 2 || end_row < 2 {
        return Err(ValidationError::HeaderRow { start_row, end_row });
    }
    if start_row > end_row {
        return Err(ValidationError::StartAfterEnd { start_row, end_row });
    }

    let bounds = grid.bounds().ok_or(ValidationError::EmptySheet)?;
    let max_row = bounds.row_count();
    if end_row > max_row {
        return Err(ValidationError::RowOutOfBounds {
            row: end_row,
            max_row,
        });
    }

    let max_column = bounds.col_count();
    for &column in std::iter::once(&question_col).chain(answer_cols) {
        if column == 0 || column > max_column {
            return Err(ValidationError::ColumnOutOfBounds { column, max_column });
        }
    }
    for (i, column) in answer_cols.iter().enumerate() {
        if answer_cols.iter().take(i).any(|prev| prev == column) {
            return Err(ValidationError::DuplicateAnswerColumn { column: *column });
        }
    }

    Ok(bounds)
}

/// Build the deck for `request`, shuffling with `rng` when asked.
///
/// A row becomes a card when its question or any of its answer cells has
/// text. With several answer columns, blank answers read [`BLANK_ANSWER`].
///
/// # Errors
/// Returns the [`ValidationError`] from [`validate`]; no cells are read
/// when the request is rejected.
pub fn build_deck<G, R>(grid: &G, request: &DeckRequest, rng: &mut R) -> Result<Deck, ValidationError>
where
    G: Grid + ?Sized,
    R: Rng + ?Sized,
{
    if let Err(err) = validate(grid, request) {
        tracing::info!(reason = ?err.reason(), %err, "deck request rejected");
        return Err(err);
    }

    let labels: Vec<String> = if request.answer_cols.len() > 1 {
        request
            .answer_cols
            .iter()
            .map(|&col| header_label(grid, col))
            .collect()
    } else {
        Vec::new()
    };

    let mut cards = Vec::new();
    for row in request.start_row..=request.end_row {
        let question = grid.cell_text(row, request.question_col).unwrap_or("");
        let values: Vec<&str> = request
            .answer_cols
            .iter()
            .map(|&col| grid.cell_text(row, col).unwrap_or(""))
            .collect();

        let has_content =
            !question.trim().is_empty() || values.iter().any(|v| !v.trim().is_empty());
        if !has_content {
            continue;
        }

        let answer = match values.as_slice() {
            [single] => Answer::single(*single),
            _ => Answer::Multi {
                entries: labels
                    .iter()
                    .zip(&values)
                    .map(|(label, value)| AnswerEntry {
                        label: label.clone(),
                        text: if value.trim().is_empty() {
                            BLANK_ANSWER.to_string()
                        } else {
                            (*value).to_string()
                        },
                    })
                    .collect(),
            },
        };
        cards.push(Card::new(question, answer));
    }

    if request.shuffle {
        cards.shuffle(rng);
    }

    tracing::debug!(
        cards = cards.len(),
        rows = request.end_row - request.start_row + 1,
        shuffled = request.shuffle,
        "deck built"
    );
    Ok(Deck::new(cards))
}

/// Row range offered when a sheet is selected: `(min, max, start, end)`.
/// The first data row is 2; a header-only sheet still offers row 2.
#[must_use]
pub fn default_row_range<G: Grid + ?Sized>(grid: &G) -> (u32, u32, u32, u32) {
    let rows = grid.bounds().map_or(1, |b| b.row_count());
    let max = rows.max(2);
    (2, max, 2.min(max), max)
}

/// The heading shown while studying, e.g. `What is the Capital of Country?`.
#[must_use]
pub fn study_prompt<G: Grid + ?Sized>(grid: &G, question_col: u32, answer_cols: &[u32]) -> String {
    let answers: Vec<String> = answer_cols
        .iter()
        .map(|&col| prompt_label(grid, col))
        .collect();
    format!(
        "What is the {} of {}?",
        answers.join(", "),
        prompt_label(grid, question_col)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ValidationReason;
    use crate::source::SheetGrid;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use test_case::test_case;

    fn countries() -> SheetGrid {
        SheetGrid::from_rows(
            "Countries",
            [
                vec!["Country", "Capital", "Language"],
                vec!["France", "Paris", "French"],
                vec!["Japan", "Tokyo", ""],
                vec!["", "", ""],
                vec!["Peru", "Lima", "Spanish"],
            ],
        )
        .with_bounds(GridBounds {
            first_row: 0,
            last_row: 4,
            first_col: 0,
            last_col: 2,
        })
    }

    fn request(question_col: u32, answer_cols: &[u32], start_row: u32, end_row: u32) -> DeckRequest {
        DeckRequest {
            question_col,
            answer_cols: answer_cols.to_vec(),
            start_row,
            end_row,
            shuffle: false,
        }
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_single_answer_deck() {
        let deck = build_deck(&countries(), &request(2, &[1], 2, 3), &mut rng()).unwrap();
        let cards = deck.cards();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].question, "Paris");
        assert_eq!(cards[0].answer, Answer::single("France"));
        assert_eq!(cards[1].question, "Tokyo");
        assert_eq!(cards[1].answer, Answer::single("Japan"));
        assert!(cards.iter().all(Card::is_fresh));
    }

    #[test]
    fn test_multi_answer_deck_has_labels_and_placeholder() {
        let deck = build_deck(&countries(), &request(1, &[2, 3], 2, 3), &mut rng()).unwrap();
        let japan = &deck.cards()[1];
        assert_eq!(japan.question, "Japan");
        assert_eq!(
            japan.answer,
            Answer::Multi {
                entries: vec![
                    AnswerEntry {
                        label: "Capital".into(),
                        text: "Tokyo".into()
                    },
                    AnswerEntry {
                        label: "Language".into(),
                        text: BLANK_ANSWER.into()
                    },
                ]
            }
        );
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let deck = build_deck(&countries(), &request(1, &[2], 2, 5), &mut rng()).unwrap();
        let questions: Vec<&str> = deck.cards().iter().map(|c| c.question.as_str()).collect();
        assert_eq!(questions, vec!["France", "Japan", "Peru"]);
    }

    #[test]
    fn test_row_with_only_answer_is_kept() {
        let grid = SheetGrid::from_rows("S", [vec!["Q", "A"], vec!["", "orphan"]]);
        let deck = build_deck(&grid, &request(1, &[2], 2, 2), &mut rng()).unwrap();
        assert_eq!(deck.len(), 1);
        assert_eq!(deck.cards()[0].question, "");
    }

    #[test]
    fn test_single_answer_keeps_blank_as_empty() {
        let grid = SheetGrid::from_rows("S", [vec!["Q", "A"], vec!["lonely", ""]]);
        let deck = build_deck(&grid, &request(1, &[2], 2, 2), &mut rng()).unwrap();
        assert_eq!(deck.cards()[0].answer, Answer::single(""));
    }

    #[test]
    fn test_header_row_is_rejected() {
        let err = build_deck(&countries(), &request(1, &[2], 1, 3), &mut rng()).unwrap_err();
        assert_eq!(err.reason(), ValidationReason::InvalidRowRange);
        assert!(err.to_string().contains("row 1 contains headers"));
    }

    #[test_case(request(1, &[], 2, 3), ValidationError::NoAnswerColumns ; "no answers")]
    #[test_case(request(1, &[2], 4, 3), ValidationError::StartAfterEnd { start_row: 4, end_row: 3 } ; "reversed")]
    #[test_case(request(1, &[2], 2, 6), ValidationError::RowOutOfBounds { row: 6, max_row: 5 } ; "past end")]
    #[test_case(request(4, &[2], 2, 3), ValidationError::ColumnOutOfBounds { column: 4, max_column: 3 } ; "question out of range")]
    #[test_case(request(1, &[0], 2, 3), ValidationError::ColumnOutOfBounds { column: 0, max_column: 3 } ; "zero column")]
    #[test_case(request(1, &[2, 2], 2, 3), ValidationError::DuplicateAnswerColumn { column: 2 } ; "duplicate")]
    #[test_case(request(1, &[], 1, 0), ValidationError::NoAnswerColumns ; "answers checked first")]
    fn test_validation_errors(req: DeckRequest, expected: ValidationError) {
        assert_eq!(validate(&countries(), &req).unwrap_err(), expected);
    }

    #[test]
    fn test_empty_sheet_is_rejected() {
        let err = validate(&SheetGrid::new("S"), &request(1, &[2], 2, 2)).unwrap_err();
        assert_eq!(err, ValidationError::EmptySheet);
    }

    #[test]
    fn test_offset_bounds_map_rows_and_columns() {
        let mut grid = SheetGrid::new("S");
        grid.set(4, 2, "Word");
        grid.set(4, 3, "Meaning");
        grid.set(5, 2, "hund");
        grid.set(5, 3, "dog");
        let deck = build_deck(&grid, &request(1, &[2], 2, 2), &mut rng()).unwrap();
        assert_eq!(deck.cards()[0].question, "hund");
        assert_eq!(deck.cards()[0].answer, Answer::single("dog"));
    }

    #[test]
    fn test_default_row_range() {
        assert_eq!(default_row_range(&countries()), (2, 5, 2, 5));
        let header_only = SheetGrid::from_rows("S", [["Q", "A"]]);
        assert_eq!(default_row_range(&header_only), (2, 2, 2, 2));
    }

    #[test]
    fn test_study_prompt() {
        let grid = countries();
        assert_eq!(study_prompt(&grid, 1, &[2]), "What is the Capital of Country?");
        assert_eq!(
            study_prompt(&grid, 1, &[2, 3]),
            "What is the Capital, Language of Country?"
        );
        let unlabelled = SheetGrid::from_rows("S", [vec!["", "B"], vec!["x", "y"]]);
        assert_eq!(study_prompt(&unlabelled, 2, &[1]), "What is the Column A of B?");
    }

    #[test]
    fn test_request_deserialises_from_camel_case() {
        let req: DeckRequest = serde_json::from_str(
            r#"{"questionCol":1,"answerCols":[2,3],"startRow":2,"endRow":9}"#,
        )
        .unwrap();
        assert_eq!(req, request(1, &[2, 3], 2, 9));
    }

    proptest! {
        #[test]
        fn prop_shuffle_is_permutation(len in 1u32..40, seed in any::<u64>()) {
            let rows = std::iter::once(vec!["Q".to_string(), "A".to_string()])
                .chain((0..len).map(|i| vec![format!("q{i}"), format!("a{i}")]));
            let grid = SheetGrid::from_rows("S", rows);
            let mut req = request(1, &[2], 2, len + 1);
            let plain = build_deck(&grid, &req, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
            req.shuffle = true;
            let shuffled = build_deck(&grid, &req, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();

            let mut a: Vec<String> = plain.cards().iter().map(|c| c.question.clone()).collect();
            let mut b: Vec<String> = shuffled.cards().iter().map(|c| c.question.clone()).collect();
            a.sort();
            b.sort();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_multi_answer_len_matches_columns(n in 2u32..6) {
            let header: Vec<String> = (0..=n).map(|c| format!("h{c}")).collect();
            let data: Vec<String> = (0..=n).map(|c| if c % 2 == 0 { format!("v{c}") } else { String::new() }).collect();
            let grid = SheetGrid::from_rows("S", [header, data]);
            let answers: Vec<u32> = (2..=n + 1).collect();
            let deck = build_deck(&grid, &request(1, &answers, 2, 2), &mut rng()).unwrap();
            match &deck.cards()[0].answer {
                Answer::Multi { entries } => {
                    prop_assert_eq!(entries.len(), n as usize);
                    prop_assert!(entries.iter().all(|e| !e.text.is_empty()));
                }
                Answer::Single { .. } => prop_assert!(false, "expected multi answer"),
            }
        }
    }
}
