//! Conversion-parameters document.
//!
//! The converter consumes a `TaskQueueDataConvert` XML document naming the
//! source path, destination path, and theme directory. The shape here is the
//! literal contract; field names must not change.

use crate::vfs::WORKING_DIR;

/// Fixed virtual path the params document is written to before every call.
pub const PARAMS_PATH: &str = "/working/params.xml";

/// Parameters for one invocation of the converter's blocking entry point.
#[derive(Debug)]
pub struct ConvertParams<'a> {
    pub file_from: &'a str,
    pub file_to: &'a str,
    pub theme_dir: &'a str,
    /// Source format code; set when converting from the binary representation.
    pub format_from: Option<u32>,
    /// Font directory; only supplied for PDF targets.
    pub font_dir: Option<&'a str>,
}

impl<'a> ConvertParams<'a> {
    /// Serialize to the XML document the converter expects.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(256);
        out.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        out.push_str("<TaskQueueDataConvert>");
        push_element(&mut out, "m_sFileFrom", self.file_from);
        push_element(&mut out, "m_sThemeDir", self.theme_dir);
        push_element(&mut out, "m_sFileTo", self.file_to);
        push_element(&mut out, "m_bIsNoBase64", "true");
        if let Some(code) = self.format_from {
            push_element(&mut out, "m_nFormatFrom", &code.to_string());
        }
        if let Some(dir) = self.font_dir {
            push_element(&mut out, "m_sFontDir", dir);
        }
        out.push_str("</TaskQueueDataConvert>");
        out
    }
}

fn push_element(out: &mut String, name: &str, value: &str) {
    out.push('<');
    out.push_str(name);
    out.push('>');
    out.push_str(&xml_escape(value));
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Escape a text value for XML content.
#[must_use]
pub(crate) fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build a staged source/destination path pair under the working directory.
///
/// Names carry a per-call sequence number so repeated conversions of
/// same-named files cannot collide or pick up stale bytes.
#[must_use]
pub fn staged_paths(seq: u64, safe_name: &str, target_ext: &str) -> (String, String) {
    let stem = safe_name.rsplit_once('.').map_or(safe_name, |(stem, _)| stem);
    let src = format!("{WORKING_DIR}/{seq}_{safe_name}");
    let dst = format!("{WORKING_DIR}/{seq}_{stem}.{target_ext}");
    (src, dst)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::vfs::THEMES_DIR;

    #[test]
    fn test_params_literal_shape() {
        let params = ConvertParams {
            file_from: "/working/1_report.docx",
            file_to: "/working/1_report.bin",
            theme_dir: THEMES_DIR,
            format_from: None,
            font_dir: None,
        };
        assert_eq!(
            params.to_xml(),
            concat!(
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                "<TaskQueueDataConvert>",
                "<m_sFileFrom>/working/1_report.docx</m_sFileFrom>",
                "<m_sThemeDir>/working/themes</m_sThemeDir>",
                "<m_sFileTo>/working/1_report.bin</m_sFileTo>",
                "<m_bIsNoBase64>true</m_bIsNoBase64>",
                "</TaskQueueDataConvert>",
            )
        );
    }

    #[test]
    fn test_optional_fields_present_when_set() {
        let params = ConvertParams {
            file_from: "/working/2_a.bin",
            file_to: "/working/2_a.pdf",
            theme_dir: THEMES_DIR,
            format_from: Some(8192),
            font_dir: Some("/working/fonts"),
        };
        let xml = params.to_xml();
        assert!(xml.contains("<m_nFormatFrom>8192</m_nFormatFrom>"));
        assert!(xml.contains("<m_sFontDir>/working/fonts</m_sFontDir>"));
    }

    #[test]
    fn test_values_are_escaped() {
        let params = ConvertParams {
            file_from: "/working/3_a&b.docx",
            file_to: "/working/3_a&b.bin",
            theme_dir: THEMES_DIR,
            format_from: None,
            font_dir: None,
        };
        assert!(params.to_xml().contains("<m_sFileFrom>/working/3_a&amp;b.docx</m_sFileFrom>"));
    }

    #[test]
    fn test_staged_paths_carry_sequence() {
        let (src, dst) = staged_paths(7, "report.csv", "bin");
        assert_eq!(src, "/working/7_report.csv");
        assert_eq!(dst, "/working/7_report.bin");
    }
}
