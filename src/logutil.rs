//! Logging helpers for peer-supplied strings and destination hashes.
//! Announced names come straight off the mesh, so they are escaped before they reach a log line.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///   Long strings are cut at `MAX_PREVIEW` characters with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 96; // display names are short; anything longer is noise
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Abbreviate a hex key to its first 8 characters, Reticulum style: `<a1b2c3d4…>`.
pub fn short_key(key: &str) -> String {
    let mut chars = key.chars();
    let head: String = chars.by_ref().take(8).collect();
    if chars.next().is_none() {
        format!("<{}>", head)
    } else {
        format!("<{}…>", head)
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_log, short_key};

    #[test]
    fn escapes_newlines_and_truncates() {
        let s = "Node\nName\r\tEnd";
        assert_eq!(escape_log(s), "Node\\nName\\r\\tEnd");
        let long = "n".repeat(200);
        assert!(escape_log(&long).ends_with('…'));
    }

    #[test]
    fn shortens_keys() {
        assert_eq!(short_key("0123456789abcdef"), "<01234567…>");
        assert_eq!(short_key("abc"), "<abc>");
    }
}
