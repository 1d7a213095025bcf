//! Filename sanitization for virtual filesystem paths.

/// Characters never allowed in a staged filename.
const DISALLOWED: &[char] = &['/', '?', '<', '>', '\\', ':', '*', '|', '"'];

/// Maximum length of the stem (chars before the extension).
const MAX_STEM_CHARS: usize = 200;

/// Sanitize a user-supplied filename for use under the virtual working
/// directory.
///
/// Strips path separators, control characters, and shell-unsafe characters,
/// and truncates the stem to 200 characters before the extension. Idempotent:
/// sanitizing an already-sanitized name returns it unchanged.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    let clean = |s: &str| -> String {
        s.chars()
            .filter(|c| !c.is_control() && !DISALLOWED.contains(c))
            .collect()
    };

    let stem: String = clean(stem).chars().take(MAX_STEM_CHARS).collect();

    match ext {
        Some(ext) => format!("{stem}.{}", clean(ext)),
        None => stem,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_unchanged() {
        assert_eq!(sanitize_file_name("report.csv"), "report.csv");
        assert_eq!(sanitize_file_name("My Document (1).docx"), "My Document (1).docx");
    }

    #[test]
    fn test_strips_disallowed_characters() {
        assert_eq!(sanitize_file_name("a/b\\c:d*e?f\"g<h>i|j.txt"), "abcdefghij.txt");
    }

    #[test]
    fn test_strips_control_characters() {
        assert_eq!(sanitize_file_name("re\u{0}po\trt\n.csv"), "report.csv");
    }

    #[test]
    fn test_truncates_long_stem_before_extension() {
        let long = "x".repeat(500);
        let out = sanitize_file_name(&format!("{long}.docx"));
        assert_eq!(out.len(), 200 + ".docx".len());
        assert!(out.ends_with(".docx"));
    }

    #[test]
    fn test_idempotent() {
        for name in [
            "report.csv",
            "a/b\\c:d.txt",
            "..\u{7f}weird..",
            &format!("{}.odt", "y".repeat(300)),
        ] {
            let once = sanitize_file_name(name);
            assert_eq!(sanitize_file_name(&once), once);
        }
    }

    #[test]
    fn test_output_never_contains_disallowed() {
        let nasty = "/?<>\\:*|\"\u{1}\u{2}name/?<>.c\\sv";
        let out = sanitize_file_name(nasty);
        assert!(out.chars().all(|c| !c.is_control() && !DISALLOWED.contains(&c)));
    }

    #[test]
    fn test_no_extension() {
        assert_eq!(sanitize_file_name("README"), "README");
        // Trailing dot: treated as part of the stem, not an empty extension
        assert_eq!(sanitize_file_name("name."), "name.");
    }
}
