//! Tabular sources: the sheet/grid shape the deck logic reads from.
//!
//! Everything downstream of this module only sees [`Grid`] and
//! [`TabularSource`]. Cell values are already coerced to text here; a blank
//! cell and a missing cell are both `None`.

mod delimited;
mod xlsx;

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::error::Result;

pub use delimited::Delimiter;

/// Inclusive, 0-based bounding range of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridBounds {
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

impl GridBounds {
    /// A range covering exactly one cell.
    #[must_use]
    pub fn cell(row: u32, col: u32) -> Self {
        Self {
            first_row: row,
            last_row: row,
            first_col: col,
            last_col: col,
        }
    }

    /// Number of rows in the range, header row included.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.last_row.saturating_sub(self.first_row).saturating_add(1)
    }

    /// Number of columns in the range.
    #[must_use]
    pub fn col_count(&self) -> u32 {
        self.last_col.saturating_sub(self.first_col).saturating_add(1)
    }

    /// Grow the range so it covers `(row, col)`.
    pub fn include(&mut self, row: u32, col: u32) {
        self.first_row = self.first_row.min(row);
        self.last_row = self.last_row.max(row);
        self.first_col = self.first_col.min(col);
        self.last_col = self.last_col.max(col);
    }
}

/// A rectangular grid of text cells with a known bounding range.
pub trait Grid {
    /// The declared range, or `None` for a sheet without any data.
    fn bounds(&self) -> Option<GridBounds>;

    /// Text of the cell at the absolute 0-based position.
    fn cell_at(&self, row: u32, col: u32) -> Option<&str>;

    /// Text of a cell addressed the way users see it: 1-based row and column
    /// relative to the first row/column of [`Grid::bounds`].
    fn cell_text(&self, row: u32, col: u32) -> Option<&str> {
        let bounds = self.bounds()?;
        let abs_row = bounds.first_row.checked_add(row.checked_sub(1)?)?;
        let abs_col = bounds.first_col.checked_add(col.checked_sub(1)?)?;
        self.cell_at(abs_row, abs_col)
    }

    /// 1-based columns, relative to [`Grid::bounds`], holding at least one
    /// non-blank cell inside the bounds. Ascending.
    ///
    /// The default probes every cell of the range; sparse grids should
    /// override it to visit only the cells they store.
    fn populated_columns(&self) -> Vec<u32> {
        let Some(bounds) = self.bounds() else {
            return Vec::new();
        };
        (1..=bounds.col_count())
            .filter(|&col| {
                (1..=bounds.row_count()).any(|row| {
                    self.cell_text(row, col)
                        .is_some_and(|text| !text.trim().is_empty())
                })
            })
            .collect()
    }
}

/// A loaded workbook: named sheets in workbook order.
pub trait TabularSource {
    type Sheet: Grid;

    fn sheet_names(&self) -> Vec<String>;

    fn sheet(&self, index: usize) -> Option<&Self::Sheet>;
}

/// Sparse in-memory grid.
#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    name: String,
    declared: Option<GridBounds>,
    extent: Option<GridBounds>,
    cells: HashMap<(u32, u32), String>,
}

impl SheetGrid {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Build a grid from row-major values starting at A1. Empty strings are
    /// treated as blank cells.
    #[must_use]
    pub fn from_rows<I, R, S>(name: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut grid = Self::new(name);
        for (r, row) in (0u32..).zip(rows) {
            for (c, value) in (0u32..).zip(row) {
                grid.set(r, c, value);
            }
        }
        grid
    }

    /// Pin the bounding range instead of deriving it from populated cells.
    #[must_use]
    pub fn with_bounds(mut self, bounds: GridBounds) -> Self {
        self.declared = Some(bounds);
        self
    }

    pub(crate) fn declare_bounds(&mut self, bounds: GridBounds) {
        self.declared = Some(bounds);
    }

    /// Set a cell's text. Blank text clears the cell.
    pub fn set(&mut self, row: u32, col: u32, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.cells.remove(&(row, col));
            return;
        }
        match self.extent.as_mut() {
            Some(extent) => extent.include(row, col),
            None => self.extent = Some(GridBounds::cell(row, col)),
        }
        self.cells.insert((row, col), value);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored cells as `((row, col), text)` with absolute 0-based positions,
    /// in no particular order.
    pub fn cells(&self) -> impl Iterator<Item = ((u32, u32), &str)> + '_ {
        self.cells.iter().map(|(&pos, text)| (pos, text.as_str()))
    }

    /// Number of non-blank cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

impl Grid for SheetGrid {
    fn bounds(&self) -> Option<GridBounds> {
        self.declared.or(self.extent)
    }

    fn cell_at(&self, row: u32, col: u32) -> Option<&str> {
        self.cells.get(&(row, col)).map(String::as_str)
    }

    fn populated_columns(&self) -> Vec<u32> {
        let Some(b) = self.bounds() else {
            return Vec::new();
        };
        let columns: BTreeSet<u32> = self
            .cells()
            .filter(|&((row, col), text)| {
                (b.first_row..=b.last_row).contains(&row)
                    && (b.first_col..=b.last_col).contains(&col)
                    && !text.trim().is_empty()
            })
            .map(|((_, col), _)| col.saturating_sub(b.first_col).saturating_add(1))
            .collect();
        columns.into_iter().collect()
    }
}

/// A workbook decoded from XLSX or delimited text.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    name: String,
    sheets: Vec<SheetGrid>,
}

impl Workbook {
    #[must_use]
    pub fn new(name: impl Into<String>, sheets: Vec<SheetGrid>) -> Self {
        Self {
            name: name.into(),
            sheets,
        }
    }

    /// Decode a file by extension: `.csv` and `.tsv` are delimited text,
    /// everything else is read as XLSX.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a readable workbook.
    pub fn load(file_name: &str, data: &[u8]) -> Result<Self> {
        let lower = file_name.to_ascii_lowercase();
        let sheets = if lower.ends_with(".csv") {
            vec![delimited::parse_delimited(data, Delimiter::Comma)]
        } else if lower.ends_with(".tsv") {
            vec![delimited::parse_delimited(data, Delimiter::Tab)]
        } else {
            xlsx::parse_xlsx(data)?
        };
        tracing::debug!(file = file_name, sheets = sheets.len(), "workbook decoded");
        Ok(Self::new(file_name, sheets))
    }

    /// Decode XLSX bytes.
    ///
    /// # Errors
    /// Returns an error if the archive or its XML parts are malformed.
    pub fn from_xlsx(file_name: &str, data: &[u8]) -> Result<Self> {
        Ok(Self::new(file_name, xlsx::parse_xlsx(data)?))
    }

    /// Decode CSV or TSV bytes into a single-sheet workbook.
    #[must_use]
    pub fn from_delimited(file_name: &str, data: &[u8], delimiter: Delimiter) -> Self {
        Self::new(file_name, vec![delimited::parse_delimited(data, delimiter)])
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn sheets(&self) -> &[SheetGrid] {
        &self.sheets
    }
}

impl TabularSource for Workbook {
    type Sheet = SheetGrid;

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn sheet(&self, index: usize) -> Option<&SheetGrid> {
        self.sheets.get(index)
    }
}
