//! CSV/TSV reader that produces a single [`SheetGrid`].

use super::SheetGrid;

/// Field separator of a delimited text file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    fn separator(self) -> u8 {
        match self {
            Self::Comma => b',',
            Self::Tab => b'\t',
        }
    }

    fn sheet_name(self) -> &'static str {
        match self {
            Self::Comma => "CSV",
            Self::Tab => "TSV",
        }
    }
}

/// Parse delimited bytes into a grid. Quoted fields may span lines. Invalid
/// UTF-8 is replaced, never fatal.
pub(crate) fn parse_delimited(data: &[u8], delim: Delimiter) -> SheetGrid {
    let data = data.strip_prefix(b"\xef\xbb\xbf").unwrap_or(data);
    let mut grid = SheetGrid::new(delim.sheet_name());
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delim.separator())
        .from_reader(data);

    for (row, record) in (0u32..).zip(reader.byte_records()) {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(row, error = %err, "delimited record skipped");
                continue;
            }
        };
        for (col, field) in (0u32..).zip(record.iter()) {
            let text = String::from_utf8_lossy(field);
            let value = text.trim();
            if !value.is_empty() {
                grid.set(row, col, value);
            }
        }
    }

    tracing::debug!(
        sheet = delim.sheet_name(),
        cells = grid.cell_count(),
        "delimited sheet parsed"
    );
    grid
}
