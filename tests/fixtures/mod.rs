//! Test fixtures for generating XLSX files in memory.
//!
//! # Example
//!
//! ```rust
//! use fixtures::{SheetBuilder, XlsxBuilder};
//!
//! let xlsx = XlsxBuilder::new()
//!     .sheet(SheetBuilder::from_rows("Words", &[&["Word", "Meaning"], &["hund", "dog"]]))
//!     .build();
//!
//! let workbook = xlcards::Workbook::from_xlsx("words.xlsx", &xlsx).unwrap();
//! ```
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::cast_possible_truncation
)]

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

// ============================================================================
// Cell Value
// ============================================================================

/// A value written into a `<c>` element.
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Shared string (`t="s"`).
    String(String),
    /// Shared string made of several rich-text runs.
    RichString(Vec<String>),
    /// Inline string (`t="inlineStr"`).
    InlineString(String),
    /// Cached formula result (`t="str"`).
    FormulaString(String),
    Number(f64),
    Boolean(bool),
    /// Error code such as `#N/A`.
    Error(String),
    /// `<c r=".."/>` with no value.
    Empty,
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(f64::from(n))
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

// ============================================================================
// Sheet Builder
// ============================================================================

#[derive(Debug, Clone)]
pub struct CellEntry {
    pub cell_ref: String,
    pub value: CellValue,
}

/// Builder for a single worksheet.
#[derive(Debug, Clone, Default)]
pub struct SheetBuilder {
    pub name: String,
    pub cells: Vec<CellEntry>,
    pub dimension: Option<String>,
    /// Write `<c>` without the `r` attribute.
    pub omit_cell_refs: bool,
}

impl SheetBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Shared-string cells from A1, skipping empty strings.
    #[must_use]
    pub fn from_rows(name: &str, rows: &[&[&str]]) -> Self {
        let mut sheet = Self::new(name);
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    let cell_ref = format!("{}{}", column_letters(c + 1), r + 1);
                    sheet = sheet.cell(&cell_ref, *value);
                }
            }
        }
        sheet
    }

    #[must_use]
    pub fn cell<V: Into<CellValue>>(mut self, cell_ref: &str, value: V) -> Self {
        self.cells.push(CellEntry {
            cell_ref: cell_ref.to_string(),
            value: value.into(),
        });
        self
    }

    /// Declare `<dimension ref="..">`.
    #[must_use]
    pub fn dimension(mut self, range: &str) -> Self {
        self.dimension = Some(range.to_string());
        self
    }

    #[must_use]
    pub fn without_cell_refs(mut self) -> Self {
        self.omit_cell_refs = true;
        self
    }
}

/// 1 -> A, 27 -> AA
pub fn column_letters(mut n: usize) -> String {
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

fn row_of(cell_ref: &str) -> u32 {
    cell_ref
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .unwrap()
}

// ============================================================================
// XLSX Builder
// ============================================================================

/// Builder for complete XLSX packages.
#[derive(Debug, Default)]
pub struct XlsxBuilder {
    sheets: Vec<SheetBuilder>,
    omit_workbook_rels: bool,
}

impl XlsxBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sheet(mut self, sheet: SheetBuilder) -> Self {
        self.sheets.push(sheet);
        self
    }

    /// Leave out `xl/_rels/workbook.xml.rels` so readers fall back to
    /// default part names.
    #[must_use]
    pub fn without_workbook_rels(mut self) -> Self {
        self.omit_workbook_rels = true;
        self
    }

    /// Build the XLSX file as bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let cursor = Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(cursor);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut shared: Vec<Vec<String>> = Vec::new();
        for sheet in &self.sheets {
            for cell in &sheet.cells {
                let runs = match &cell.value {
                    CellValue::String(s) => vec![s.clone()],
                    CellValue::RichString(runs) => runs.clone(),
                    _ => continue,
                };
                if !shared.contains(&runs) {
                    shared.push(runs);
                }
            }
        }

        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(generate_content_types(self.sheets.len()).as_bytes())
            .unwrap();

        zip.start_file("_rels/.rels", options).unwrap();
        zip.write_all(generate_rels().as_bytes()).unwrap();

        if !self.omit_workbook_rels {
            zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
            zip.write_all(generate_workbook_rels(self.sheets.len()).as_bytes())
                .unwrap();
        }

        zip.start_file("xl/workbook.xml", options).unwrap();
        zip.write_all(generate_workbook(&self.sheets).as_bytes())
            .unwrap();

        if !shared.is_empty() {
            zip.start_file("xl/sharedStrings.xml", options).unwrap();
            zip.write_all(generate_shared_strings(&shared).as_bytes())
                .unwrap();
        }

        for (i, sheet) in self.sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
                .unwrap();
            zip.write_all(generate_sheet_xml(sheet, &shared).as_bytes())
                .unwrap();
        }

        zip.finish().expect("Failed to finish ZIP").into_inner()
    }
}

// ============================================================================
// XML generation
// ============================================================================

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn generate_content_types(sheet_count: usize) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
    for i in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn generate_rels() -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    xml.push_str(r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#);
    xml.push_str("</Relationships>");
    xml
}

fn generate_workbook_rels(sheet_count: usize) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    // sheets are listed last-to-first so part order differs from rId order
    for i in (1..=sheet_count).rev() {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{i}.xml"/>"#
        ));
    }
    xml.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
        sheet_count + 1
    ));
    xml.push_str("</Relationships>");
    xml
}

fn generate_workbook(sheets: &[SheetBuilder]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
    xml.push_str("<sheets>");
    for (i, sheet) in sheets.iter().enumerate() {
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape_xml(&sheet.name),
            i + 1,
            i + 1
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn generate_shared_strings(strings: &[Vec<String>]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(&format!(
        r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        strings.len()
    ));
    for runs in strings {
        match runs.as_slice() {
            [single] => xml.push_str(&format!(
                r#"<si><t xml:space="preserve">{}</t></si>"#,
                escape_xml(single)
            )),
            _ => {
                xml.push_str("<si>");
                for run in runs {
                    xml.push_str(&format!(
                        r#"<r><rPr><b/></rPr><t xml:space="preserve">{}</t></r>"#,
                        escape_xml(run)
                    ));
                }
                xml.push_str("</si>");
            }
        }
    }
    xml.push_str("</sst>");
    xml
}

fn generate_sheet_xml(sheet: &SheetBuilder, shared: &[Vec<String>]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );
    if let Some(dim) = &sheet.dimension {
        xml.push_str(&format!(r#"<dimension ref="{dim}"/>"#));
    }
    xml.push_str("<sheetData>");

    let mut rows: Vec<(u32, Vec<&CellEntry>)> = Vec::new();
    for cell in &sheet.cells {
        let row = row_of(&cell.cell_ref);
        match rows.iter_mut().find(|(r, _)| *r == row) {
            Some((_, cells)) => cells.push(cell),
            None => rows.push((row, vec![cell])),
        }
    }
    rows.sort_by_key(|(r, _)| *r);

    for (row, cells) in rows {
        xml.push_str(&format!(r#"<row r="{row}">"#));
        for cell in cells {
            let r_attr = if sheet.omit_cell_refs {
                String::new()
            } else {
                format!(r#" r="{}""#, cell.cell_ref)
            };
            let shared_index = |runs: Vec<String>| shared.iter().position(|s| *s == runs).unwrap();
            match &cell.value {
                CellValue::String(s) => xml.push_str(&format!(
                    r#"<c{r_attr} t="s"><v>{}</v></c>"#,
                    shared_index(vec![s.clone()])
                )),
                CellValue::RichString(runs) => xml.push_str(&format!(
                    r#"<c{r_attr} t="s"><v>{}</v></c>"#,
                    shared_index(runs.clone())
                )),
                CellValue::InlineString(s) => xml.push_str(&format!(
                    r#"<c{r_attr} t="inlineStr"><is><t>{}</t></is></c>"#,
                    escape_xml(s)
                )),
                CellValue::FormulaString(s) => xml.push_str(&format!(
                    r#"<c{r_attr} t="str"><f>CONCAT(A1)</f><v>{}</v></c>"#,
                    escape_xml(s)
                )),
                CellValue::Number(n) => xml.push_str(&format!(r#"<c{r_attr}><v>{n}</v></c>"#)),
                CellValue::Boolean(b) => xml.push_str(&format!(
                    r#"<c{r_attr} t="b"><v>{}</v></c>"#,
                    u8::from(*b)
                )),
                CellValue::Error(e) => xml.push_str(&format!(
                    r#"<c{r_attr} t="e"><v>{}</v></c>"#,
                    escape_xml(e)
                )),
                CellValue::Empty => xml.push_str(&format!(r#"<c{r_attr}/>"#)),
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
    }

    #[test]
    fn test_builder_produces_zip() {
        let bytes = XlsxBuilder::new()
            .sheet(SheetBuilder::new("S").cell("A1", "x"))
            .build();
        assert_eq!(&bytes[..2], b"PK");
    }
}
