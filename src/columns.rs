//! Column catalog: which columns of a sheet can be picked as question or
//! answer, and how they are labelled.

use serde::{Deserialize, Serialize};

use crate::cell_ref::column_letter;
use crate::source::Grid;

/// A selectable column. `index` is 1-based relative to the sheet's first
/// column and stays stable while the same sheet is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOption {
    pub index: u32,
    pub label: String,
}

/// List every column that holds at least one non-blank cell, header row
/// included, in column order. A sheet without bounds yields no columns.
pub fn derive_columns<G: Grid + ?Sized>(grid: &G) -> Vec<ColumnOption> {
    grid.populated_columns()
        .into_iter()
        .map(|index| ColumnOption {
            index,
            label: header_label(grid, index),
        })
        .collect()
}

/// Trimmed header text of a column, or its letters in parentheses when the
/// header cell is blank.
pub fn header_label<G: Grid + ?Sized>(grid: &G, col: u32) -> String {
    match grid.cell_text(1, col).map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => format!("({})", column_letter(col)),
    }
}

/// Header text for sentences like the study prompt: `Column B` when blank.
pub fn prompt_label<G: Grid + ?Sized>(grid: &G, col: u32) -> String {
    match grid.cell_text(1, col).map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => format!("Column {}", column_letter(col)),
    }
}

/// Options offered for the answer: everything except the question column.
#[must_use]
pub fn answer_options(all: &[ColumnOption], question: u32) -> Vec<ColumnOption> {
    all.iter()
        .filter(|opt| opt.index != question)
        .cloned()
        .collect()
}

/// Keep the selected answers that are still offered, in selection order.
/// When none survive, fall back to the first offered option.
#[must_use]
pub fn reconcile_answers(options: &[ColumnOption], selected: &[u32]) -> Vec<u32> {
    let mut kept: Vec<u32> = Vec::with_capacity(selected.len());
    for &index in selected {
        if options.iter().any(|opt| opt.index == index) && !kept.contains(&index) {
            kept.push(index);
        }
    }
    if kept.is_empty() {
        if let Some(first) = options.first() {
            kept.push(first.index);
        }
    }
    kept
}

/// Initial selection after a sheet is chosen: the first column asks, the
/// second answers (or the first again when the sheet has a single column).
#[must_use]
pub fn default_selection(all: &[ColumnOption]) -> Option<(u32, u32)> {
    let question = all.first()?.index;
    let answer = all.get(1).map_or(question, |opt| opt.index);
    Some((question, answer))
}
