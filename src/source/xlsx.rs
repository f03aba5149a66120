//! XLSX reader: workbook relationships, sheet list, shared strings and cell
//! text for each worksheet.
//!
//! Only what a flashcard deck needs is read. Styles, number formats, themes,
//! drawings and the rest of the package are skipped; cell values are coerced
//! to text (see [`coerce_value`]).

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{BufReader, Cursor, Read, Seek};
use zip::ZipArchive;

use crate::cell_ref::{parse_cell_range, parse_cell_ref_bytes};
use crate::error::{Result, XlcardsError};
use crate::xml_helpers::{attr_bytes, attr_string, element_matches};

use super::{GridBounds, SheetGrid};

/// Paths of the parts referenced from `xl/_rels/workbook.xml.rels`.
#[derive(Default, Debug)]
struct WorkbookRelationships {
    /// rId -> full path, e.g. "rId1" -> "xl/worksheets/sheet1.xml"
    worksheets: HashMap<String, String>,
    shared_strings: Option<String>,
}

/// Sheet metadata from workbook.xml
#[derive(Debug)]
struct SheetInfo {
    name: String,
    path: String,
}

/// Cell type tag from the `t` attribute of a `<c>` element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CellTypeTag {
    Shared,
    Inline,
    Str,
    Bool,
    Error,
    Number,
}

fn parse_cell_type_tag(value: &[u8]) -> CellTypeTag {
    match value {
        b"s" => CellTypeTag::Shared,
        b"b" => CellTypeTag::Bool,
        b"e" => CellTypeTag::Error,
        b"str" => CellTypeTag::Str,
        b"inlineStr" => CellTypeTag::Inline,
        _ => CellTypeTag::Number,
    }
}

/// Parse every worksheet of an XLSX package, in workbook order.
pub(crate) fn parse_xlsx(data: &[u8]) -> Result<Vec<SheetGrid>> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let relationships = parse_workbook_relationships(&mut archive)?;
    let shared_strings =
        parse_shared_strings(&mut archive, relationships.shared_strings.as_deref())?;
    let sheet_info = get_sheet_info(&mut archive, &relationships.worksheets)?;

    let mut sheets = Vec::with_capacity(sheet_info.len());
    for info in &sheet_info {
        let grid = parse_sheet(&mut archive, info, &shared_strings)?;
        tracing::debug!(
            sheet = %info.name,
            cells = grid.cell_count(),
            "worksheet parsed"
        );
        sheets.push(grid);
    }
    Ok(sheets)
}

/// Resolve a relationship target relative to `xl/`.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(stripped) => stripped.to_string(),
        None => format!("xl/{target}"),
    }
}

/// Parse workbook relationships from xl/_rels/workbook.xml.rels.
/// The part is optional; default paths are used when it is missing.
fn parse_workbook_relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<WorkbookRelationships> {
    let mut rels = WorkbookRelationships::default();

    let Ok(file) = archive.by_name("xl/_rels/workbook.xml.rels") else {
        return Ok(rels);
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e) if element_matches(e, b"Relationship") => {
                let id = attr_string(e, b"Id").unwrap_or_default();
                let target = attr_string(e, b"Target").unwrap_or_default();
                let rel_type = attr_string(e, b"Type").unwrap_or_default();
                if target.is_empty() {
                    // dangling relationship, nothing to resolve
                } else if rel_type.ends_with("/worksheet") && !id.is_empty() {
                    rels.worksheets.insert(id, resolve_target(&target));
                } else if rel_type.ends_with("/sharedStrings") {
                    rels.shared_strings = Some(resolve_target(&target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Get sheet names and part paths from xl/workbook.xml.
fn get_sheet_info<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    relationships: &HashMap<String, String>,
) -> Result<Vec<SheetInfo>> {
    let file = archive.by_name("xl/workbook.xml")?;

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);
    let mut sheets = Vec::new();
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e) if element_matches(e, b"sheet") => {
                let name = attr_string(e, b"name").unwrap_or_default();
                if !name.is_empty() {
                    let r_id = attr_string(e, b"id").unwrap_or_default();
                    let path = relationships.get(&r_id).cloned().unwrap_or_else(|| {
                        let idx = sheets.len() + 1;
                        format!("xl/worksheets/sheet{idx}.xml")
                    });
                    sheets.push(SheetInfo { name, path });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Parse the shared string table. Rich-text runs are concatenated; phonetic
/// runs (`<rPh>`) are skipped.
fn parse_shared_strings<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: Option<&str>,
) -> Result<Vec<String>> {
    let sst_path = path.unwrap_or("xl/sharedStrings.xml");
    let Ok(file) = archive.by_name(sst_path) else {
        return Ok(Vec::new());
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(false);

    let mut strings = Vec::new();
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut in_phonetic = false;

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_t = true,
                _ => {}
            },
            Event::Empty(ref e) if element_matches(e, b"si") => strings.push(String::new()),
            Event::Text(ref e) if in_t => current.push_str(&e.unescape()?),
            Event::End(ref e) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(std::mem::take(&mut current));
                    in_si = false;
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// In-progress `<c>` element.
struct PendingCell {
    row: u32,
    col: u32,
    tag: CellTypeTag,
    raw: String,
    has_value: bool,
}

/// Parse one worksheet into a grid of text cells.
fn parse_sheet<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    info: &SheetInfo,
    shared_strings: &[String],
) -> Result<SheetGrid> {
    let file = archive
        .by_name(&info.path)
        .map_err(|_| XlcardsError::SheetNotFound(format!("{} ({})", info.name, info.path)))?;

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(false);

    let mut grid = SheetGrid::new(info.name.clone());
    let mut buf = Vec::new();
    let mut current_row: Option<u32> = None;
    let mut next_col: u32 = 0;
    let mut pending: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_inline = false;
    let mut in_phonetic = false;

    loop {
        let event = xml.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                match e.local_name().as_ref() {
                    b"dimension" => {
                        if let Some((first_row, first_col, last_row, last_col)) =
                            attr_string(e, b"ref").as_deref().and_then(parse_cell_range)
                        {
                            grid.declare_bounds(GridBounds {
                                first_row,
                                last_row,
                                first_col,
                                last_col,
                            });
                        }
                    }
                    b"row" => {
                        let row_attr = attr_string(e, b"r").and_then(|s| s.parse::<u32>().ok());
                        current_row = Some(match row_attr {
                            Some(r) if r > 0 => r - 1,
                            _ => current_row.map_or(0, |r| r.saturating_add(1)),
                        });
                        next_col = 0;
                    }
                    b"c" => {
                        let (col, row) = attr_bytes(e, b"r")
                            .and_then(|r| parse_cell_ref_bytes(&r))
                            .unwrap_or((next_col, current_row.unwrap_or(0)));
                        next_col = col.saturating_add(1);
                        if is_start {
                            let tag = attr_bytes(e, b"t")
                                .map_or(CellTypeTag::Number, |t| parse_cell_type_tag(&t));
                            pending = Some(PendingCell {
                                row,
                                col,
                                tag,
                                raw: String::new(),
                                has_value: false,
                            });
                        }
                    }
                    b"v" if is_start && pending.is_some() => in_value = true,
                    b"is" if is_start && pending.is_some() => in_inline = true,
                    b"rPh" if is_start => in_phonetic = true,
                    b"t" if is_start && in_inline && !in_phonetic => in_value = true,
                    _ => {}
                }
            }
            Event::Text(ref e) if in_value => {
                if let Some(cell) = pending.as_mut() {
                    cell.raw.push_str(&e.unescape()?);
                    cell.has_value = true;
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"is" => in_inline = false,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        if cell.has_value {
                            if let Some(text) = coerce_value(&cell.raw, cell.tag, shared_strings) {
                                grid.set(cell.row, cell.col, text);
                            }
                        }
                    }
                    in_value = false;
                    in_inline = false;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(grid)
}

/// Coerce a raw cell value to the text the deck shows.
///
/// Numbers print without a trailing `.0`, booleans as `true`/`false`, errors
/// keep their code. Date serials stay numeric.
fn coerce_value(raw: &str, tag: CellTypeTag, shared_strings: &[String]) -> Option<String> {
    match tag {
        CellTypeTag::Shared => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|idx| shared_strings.get(idx).cloned()),
        CellTypeTag::Str | CellTypeTag::Inline | CellTypeTag::Error => Some(raw.to_string()),
        CellTypeTag::Bool => Some(match raw.trim() {
            "1" | "true" => "true".to_string(),
            "0" | "false" => "false".to_string(),
            other => other.to_string(),
        }),
        CellTypeTag::Number => Some(format_number(raw.trim())),
    }
}

fn format_number(raw: &str) -> String {
    match raw.parse::<f64>() {
        // adding 0.0 folds -0 into 0
        Ok(n) if n.is_finite() => format!("{}", n + 0.0),
        _ => raw.to_string(),
    }
}
