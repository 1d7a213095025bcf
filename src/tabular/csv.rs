//! CSV text parsing and writing.
//!
//! A full field-level parser (quoted fields, escaped quotes, embedded
//! newlines) rather than a line splitter, so round-tripping preserves the
//! original rows and columns.

/// Parse CSV text into rows of string fields.
#[must_use]
pub(crate) fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut saw_any = false;

    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        saw_any = true;
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    // Escaped quote
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else {
            match ch {
                '"' => in_quotes = true,
                ',' => {
                    fields.push(std::mem::take(&mut current));
                }
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    fields.push(std::mem::take(&mut current));
                    rows.push(std::mem::take(&mut fields));
                }
                '\n' => {
                    fields.push(std::mem::take(&mut current));
                    rows.push(std::mem::take(&mut fields));
                }
                _ => current.push(ch),
            }
        }
    }

    // Final row without a trailing newline
    if !current.is_empty() || !fields.is_empty() || (saw_any && rows.is_empty()) {
        fields.push(current);
        rows.push(fields);
    }
    rows
}

/// Write rows back to CSV text with CRLF line endings.
#[must_use]
pub(crate) fn write_rows(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        let mut first = true;
        for field in row {
            if !first {
                out.push(',');
            }
            first = false;
            write_field(&mut out, field);
        }
        out.push_str("\r\n");
    }
    out
}

fn write_field(out: &mut String, field: &str) {
    let needs_quotes = field.contains(['"', ',', '\n', '\r']);
    if !needs_quotes {
        out.push_str(field);
        return;
    }
    out.push('"');
    for c in field.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}
