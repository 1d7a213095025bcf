//! Minimal single-sheet XLSX read/write for the CSV adapter.
//!
//! The writer produces one inline-string worksheet (no shared string table,
//! no styles beyond the mandatory part). The reader extracts the first sheet
//! only; later sheets are intentionally dropped by the CSV pipeline.

use std::collections::HashMap;
use std::io::{BufReader, Cursor, Read, Write};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::Result;
use crate::params::xml_escape;

/// Write rows as a complete single-sheet XLSX archive.
pub(crate) fn write_workbook(rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let buf: Vec<u8> = Vec::with_capacity(4096);
    let mut writer = ZipWriter::new(Cursor::new(buf));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    writer.start_file("[Content_Types].xml", options)?;
    writer.write_all(CONTENT_TYPES.as_bytes())?;

    writer.start_file("_rels/.rels", options)?;
    writer.write_all(ROOT_RELS.as_bytes())?;

    writer.start_file("xl/workbook.xml", options)?;
    writer.write_all(WORKBOOK.as_bytes())?;

    writer.start_file("xl/_rels/workbook.xml.rels", options)?;
    writer.write_all(WORKBOOK_RELS.as_bytes())?;

    writer.start_file("xl/worksheets/sheet1.xml", options)?;
    writer.write_all(write_sheet_xml(rows).as_bytes())?;

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Generate worksheet XML with inline strings; numeric fields become numbers.
fn write_sheet_xml(rows: &[Vec<String>]) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );
    out.push_str("<sheetData>");
    for (row_idx, row) in rows.iter().enumerate() {
        if row.iter().all(String::is_empty) {
            continue;
        }
        out.push_str(&format!("<row r=\"{}\">", row_idx + 1));
        for (col_idx, field) in row.iter().enumerate() {
            if field.is_empty() {
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            let cell_ref = format!("{}{}", col_to_letter(col_idx as u32), row_idx + 1);
            if field.parse::<f64>().is_ok() {
                out.push_str(&format!("<c r=\"{cell_ref}\"><v>{field}</v></c>"));
            } else {
                let preserve = if field.starts_with(char::is_whitespace)
                    || field.ends_with(char::is_whitespace)
                {
                    r#" xml:space="preserve""#
                } else {
                    ""
                };
                out.push_str(&format!(
                    "<c r=\"{cell_ref}\" t=\"inlineStr\"><is><t{preserve}>{}</t></is></c>",
                    xml_escape(field)
                ));
            }
        }
        out.push_str("</row>");
    }
    out.push_str("</sheetData></worksheet>");
    out
}

/// Convert a 0-based column index to column letters (A, B, ..., Z, AA, ...).
#[must_use]
pub(crate) fn col_to_letter(col: u32) -> String {
    let mut result = String::new();
    let mut n = col + 1;
    while n > 0 {
        n -= 1;
        #[allow(clippy::cast_possible_truncation)]
        let c = char::from(b'A' + (n % 26) as u8);
        result.insert(0, c);
        n /= 26;
    }
    result
}

/// Parse a cell reference like "B3" into 0-based (col, row).
fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let mut col: u32 = 0;
    let mut row: u32 = 0;
    let mut saw_col = false;
    let mut saw_row = false;

    for ch in cell_ref.trim().chars() {
        if ch.is_ascii_alphabetic() {
            col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            saw_col = true;
        } else if ch.is_ascii_digit() {
            row = row * 10 + (ch as u32 - '0' as u32);
            saw_row = true;
        }
    }

    if !saw_col || !saw_row {
        return None;
    }
    Some((col.saturating_sub(1), row.saturating_sub(1)))
}

/// Read the first worksheet of an XLSX archive as rows of strings.
///
/// Multi-sheet workbooks lose every sheet after the first here; that is the
/// documented behavior of the CSV pipeline, not an oversight.
pub(crate) fn read_first_sheet(data: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let sheet_path = first_sheet_path(&mut archive)?;
    let shared = read_shared_strings(&mut archive);

    let mut cells: Vec<(u32, u32, String)> = Vec::new();
    {
        let file = archive.by_name(&sheet_path)?;
        let mut xml = Reader::from_reader(BufReader::new(file));
        xml.trim_text(false);

        let mut buf = Vec::new();
        let mut current: Option<(u32, u32)> = None;
        let mut cell_type: Vec<u8> = Vec::new();
        let mut in_value = false;
        let mut in_inline_t = false;

        loop {
            match xml.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                    b"c" => {
                        current = None;
                        cell_type.clear();
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"r" => {
                                    let raw = String::from_utf8_lossy(&attr.value);
                                    current = parse_cell_ref(&raw);
                                }
                                b"t" => cell_type = attr.value.to_vec(),
                                _ => {}
                            }
                        }
                    }
                    b"v" => in_value = true,
                    b"t" => in_inline_t = true,
                    _ => {}
                },
                Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                    b"v" => in_value = false,
                    b"t" => in_inline_t = false,
                    _ => {}
                },
                Ok(Event::Text(ref t)) => {
                    if !in_value && !in_inline_t {
                        continue;
                    }
                    let Some((col, row)) = current else { continue };
                    let text = t.unescape().unwrap_or_default().to_string();
                    let value = if in_value && cell_type.as_slice() == b"s" {
                        text.parse::<usize>()
                            .ok()
                            .and_then(|idx| shared.get(idx).cloned())
                            .unwrap_or_default()
                    } else {
                        text
                    };
                    cells.push((row, col, value));
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
            buf.clear();
        }
    }

    Ok(assemble_rows(cells))
}

/// Resolve the first sheet's archive path via workbook.xml and its rels.
fn first_sheet_path<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let rels = read_workbook_rels(archive);

    let first_rid = {
        let file = archive.by_name("xl/workbook.xml")?;
        let mut xml = Reader::from_reader(BufReader::new(file));
        xml.trim_text(true);
        let mut buf = Vec::new();
        let mut rid = None;
        loop {
            match xml.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    if e.local_name().as_ref() == b"sheet" && rid.is_none() {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref().ends_with(b"id") {
                                rid = Some(String::from_utf8_lossy(&attr.value).to_string());
                            }
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
            buf.clear();
        }
        rid
    };

    first_rid
        .and_then(|rid| rels.get(&rid).cloned())
        // Fall back to the conventional path when rels are absent
        .map_or_else(|| Ok("xl/worksheets/sheet1.xml".to_string()), Ok)
}

/// Parse xl/_rels/workbook.xml.rels into rId → archive path.
fn read_workbook_rels<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> HashMap<String, String> {
    let mut rels = HashMap::new();
    let Ok(file) = archive.by_name("xl/_rels/workbook.xml.rels") else {
        return rels;
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut id = String::new();
                    let mut target = String::new();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                            b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                            _ => {}
                        }
                    }
                    if !id.is_empty() && !target.is_empty() {
                        let full = target
                            .strip_prefix('/')
                            .map_or_else(|| format!("xl/{target}"), ToString::to_string);
                        rels.insert(id, full);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    rels
}

/// Read xl/sharedStrings.xml, concatenating `<t>` runs within each `<si>`.
fn read_shared_strings<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Vec<String> {
    let mut strings = Vec::new();
    let Ok(file) = archive.by_name("xl/sharedStrings.xml") else {
        return strings;
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(false);
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_t = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(ref t)) => {
                if in_t {
                    current.push_str(&t.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    strings
}

/// Turn sparse (row, col, value) triples into dense rows, gaps filled empty.
fn assemble_rows(mut cells: Vec<(u32, u32, String)>) -> Vec<Vec<String>> {
    if cells.is_empty() {
        return Vec::new();
    }
    cells.sort_by_key(|&(row, col, _)| (row, col));

    let max_row = cells.iter().map(|&(r, _, _)| r).max().unwrap_or(0);
    let mut rows: Vec<Vec<String>> = vec![Vec::new(); (max_row as usize) + 1];
    for (row, col, value) in cells {
        let Some(fields) = rows.get_mut(row as usize) else {
            continue;
        };
        let col = col as usize;
        if fields.len() <= col {
            fields.resize(col + 1, String::new());
        }
        if let Some(slot) = fields.get_mut(col) {
            *slot = value;
        }
    }
    rows
}


const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"</Types>"#,
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#,
);

const WORKBOOK: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>"#,
    r#"</workbook>"#,
);

const WORKBOOK_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"</Relationships>"#,
);
