//! Static extension, MIME, and format-code tables.
//!
//! Everything here is a pure lookup: an extension that is not in a table is a
//! hard error at the call site, never a guessed default.

use crate::error::{BridgeError, Result};

/// Editor family a document belongs to, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Word,
    Cell,
    Slide,
}

impl DocumentType {
    /// Stable string form used in editor configuration payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Cell => "cell",
            Self::Slide => "slide",
        }
    }
}

/// Output format codes reported by the editor on save (x2t constants).
pub mod format_code {
    pub const DOCX: u32 = 65;
    pub const DOC: u32 = 66;
    pub const ODT: u32 = 67;
    pub const RTF: u32 = 68;
    pub const TXT: u32 = 69;
    pub const PPTX: u32 = 129;
    pub const PPT: u32 = 130;
    pub const ODP: u32 = 131;
    pub const XLSX: u32 = 257;
    pub const XLS: u32 = 258;
    pub const ODS: u32 = 259;
    pub const CSV: u32 = 260;
    pub const PDF: u32 = 513;
    /// The editor's internal binary serialization.
    pub const CANVAS_BIN: u32 = 8192;
}

/// Map a file extension (lowercase, no dot) to its document type.
#[must_use]
pub fn document_type_for(ext: &str) -> Option<DocumentType> {
    match ext {
        "docx" | "doc" | "odt" | "rtf" | "txt" => Some(DocumentType::Word),
        "xlsx" | "xls" | "ods" | "csv" => Some(DocumentType::Cell),
        "pptx" | "ppt" | "odp" => Some(DocumentType::Slide),
        _ => None,
    }
}

/// Inverse table used on save: editor format code → target extension.
#[must_use]
pub fn extension_for_format(code: u32) -> Option<&'static str> {
    match code {
        format_code::DOCX => Some("docx"),
        format_code::DOC => Some("doc"),
        format_code::ODT => Some("odt"),
        format_code::RTF => Some("rtf"),
        format_code::TXT => Some("txt"),
        format_code::PPTX => Some("pptx"),
        format_code::PPT => Some("ppt"),
        format_code::ODP => Some("odp"),
        format_code::XLSX => Some("xlsx"),
        format_code::XLS => Some("xls"),
        format_code::ODS => Some("ods"),
        format_code::CSV => Some("csv"),
        format_code::PDF => Some("pdf"),
        _ => None,
    }
}

/// Map a MIME type to a working extension. MIME wins over the filename suffix.
#[must_use]
fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "application/msword" => Some("doc"),
        "application/vnd.oasis.opendocument.text" => Some("odt"),
        "application/rtf" | "text/rtf" => Some("rtf"),
        "text/plain" => Some("txt"),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some("xlsx"),
        "application/vnd.ms-excel" => Some("xls"),
        "application/vnd.oasis.opendocument.spreadsheet" => Some("ods"),
        "text/csv" => Some("csv"),
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
            Some("pptx")
        }
        "application/vnd.ms-powerpoint" => Some("ppt"),
        "application/vnd.oasis.opendocument.presentation" => Some("odp"),
        _ => None,
    }
}

/// MIME type to attach to a produced file when handing it to the saver.
#[must_use]
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "odt" => "application/vnd.oasis.opendocument.text",
        "rtf" => "application/rtf",
        "txt" => "text/plain",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "csv" => "text/csv",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "ppt" => "application/vnd.ms-powerpoint",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// MIME type for an embedded media file, by extension. Defaults to PNG.
#[must_use]
pub fn media_mime(file_name: &str) -> &'static str {
    match file_extension(file_name).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "image/png",
    }
}

/// Lowercased extension of `name` without the dot, if it has one.
#[must_use]
pub fn file_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Resolve the working extension for an incoming file: MIME type first,
/// filename suffix second.
pub fn resolve_extension(mime: Option<&str>, file_name: &str) -> Result<String> {
    if let Some(ext) = mime.and_then(extension_for_mime) {
        return Ok(ext.to_string());
    }
    file_extension(file_name)
        .ok_or_else(|| BridgeError::UnsupportedExtension(file_name.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("docx", DocumentType::Word)]
    #[test_case("txt", DocumentType::Word)]
    #[test_case("xlsx", DocumentType::Cell)]
    #[test_case("csv", DocumentType::Cell)]
    #[test_case("pptx", DocumentType::Slide)]
    fn test_extension_to_type(ext: &str, expected: DocumentType) {
        assert_eq!(document_type_for(ext), Some(expected));
    }

    #[test]
    fn test_unknown_extension_has_no_type() {
        assert_eq!(document_type_for("zzz"), None);
        assert_eq!(document_type_for(""), None);
        // PDF is a save target only, never an editor document type
        assert_eq!(document_type_for("pdf"), None);
    }

    #[test]
    fn test_format_code_inverse_table() {
        assert_eq!(extension_for_format(format_code::DOCX), Some("docx"));
        assert_eq!(extension_for_format(format_code::XLSX), Some("xlsx"));
        assert_eq!(extension_for_format(format_code::CSV), Some("csv"));
        assert_eq!(extension_for_format(format_code::PDF), Some("pdf"));
        assert_eq!(extension_for_format(0), None);
    }

    #[test]
    fn test_mime_wins_over_suffix() {
        let ext = resolve_extension(Some("text/csv"), "data.xlsx").unwrap();
        assert_eq!(ext, "csv");
    }

    #[test]
    fn test_suffix_used_without_mime() {
        let ext = resolve_extension(None, "Report.DOCX").unwrap();
        assert_eq!(ext, "docx");
    }

    #[test]
    fn test_unknown_mime_falls_back_to_suffix() {
        let ext = resolve_extension(Some("application/octet-stream"), "a.odt").unwrap();
        assert_eq!(ext, "odt");
    }

    #[test]
    fn test_no_extension_is_an_error() {
        assert!(resolve_extension(None, "README").is_err());
        assert!(resolve_extension(None, "trailing.").is_err());
    }

    #[test]
    fn test_media_mime_defaults_to_png() {
        assert_eq!(media_mime("image1.jpeg"), "image/jpeg");
        assert_eq!(media_mime("image1.svg"), "image/svg+xml");
        assert_eq!(media_mime("image1"), "image/png");
        assert_eq!(media_mime("image1.bin"), "image/png");
    }
}
