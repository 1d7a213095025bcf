//! CSV↔XLSX adapter.
//!
//! The primary converter has no CSV support, so spreadsheets arriving as CSV
//! are bridged through XLSX in both directions. The bridge is a capability
//! injected at construction: [`BuiltinTabular`] is the in-crate
//! implementation; on wasm a remote spreadsheet library can be substituted
//! via [`script::ScriptTabular`].

pub(crate) mod csv;
#[cfg(target_arch = "wasm32")]
pub mod script;
pub(crate) mod xlsx;

use crate::error::{BridgeError, Result};

/// UTF-8 byte-order marker expected by legacy spreadsheet consumers.
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Text/binary tabular transforms the converter session delegates to.
pub trait TabularBridge {
    /// CSV bytes → XLSX bytes; the returned name has `.csv` rewritten to
    /// `.xlsx`.
    fn csv_to_xlsx(&self, file_name: &str, data: &[u8]) -> Result<(String, Vec<u8>)>;

    /// XLSX bytes → CSV bytes (first sheet only), prefixed with a UTF-8 BOM
    /// regardless of whether the original input carried one.
    fn xlsx_to_csv(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Built-in bridge: CSV parsing plus a minimal single-sheet XLSX codec.
#[derive(Default)]
pub struct BuiltinTabular;

impl BuiltinTabular {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TabularBridge for BuiltinTabular {
    fn csv_to_xlsx(&self, file_name: &str, data: &[u8]) -> Result<(String, Vec<u8>)> {
        let text = decode_text(strip_bom(data));
        let rows = csv::parse_rows(&text);
        let bytes = xlsx::write_workbook(&rows)
            .map_err(|e| BridgeError::CsvParseOrEncodeFailed(e.to_string()))?;
        Ok((rename_to_xlsx(file_name), bytes))
    }

    fn xlsx_to_csv(&self, data: &[u8]) -> Result<Vec<u8>> {
        let rows = xlsx::read_first_sheet(data)
            .map_err(|e| BridgeError::CsvParseOrEncodeFailed(e.to_string()))?;
        let text = csv::write_rows(&rows);
        let mut out = Vec::with_capacity(text.len() + UTF8_BOM.len());
        out.extend_from_slice(&UTF8_BOM);
        out.extend_from_slice(text.as_bytes());
        Ok(out)
    }
}

/// Rewrite a `.csv` suffix (any case) to `.xlsx`.
#[must_use]
pub(crate) fn rename_to_xlsx(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("csv") => format!("{stem}.xlsx"),
        _ => format!("{file_name}.xlsx"),
    }
}

/// Drop a leading UTF-8 BOM if present.
#[must_use]
pub(crate) fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&UTF8_BOM).unwrap_or(data)
}

/// Decode bytes as UTF-8, falling back to Latin-1 when the data is not valid
/// UTF-8.
#[must_use]
pub(crate) fn decode_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(s) => s.to_string(),
        Err(_) => data.iter().map(|&b| char::from(b)).collect(),
    }
}
