//! MySQL string escaping for manual statement construction.
//!
//! Follows the server's documented escape rules: NUL, newline, carriage
//! return, backslash, single quote, double quote, Ctrl-Z, tab and
//! backspace are backslash-escaped. Two outputs exist: the escaped form
//! without surrounding quotes (to splice into an existing literal) and a
//! separately single-quoted form.

/// Escapes a byte string. Byte-oriented so values with embedded NULs or
/// non-UTF-8 content survive unchanged.
pub fn escape_bytes(raw: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(raw.len() + raw.len() / 8 + 1);
    for &byte in raw {
        match byte {
            0x00 => escaped.extend_from_slice(b"\\0"),
            b'\n' => escaped.extend_from_slice(b"\\n"),
            b'\r' => escaped.extend_from_slice(b"\\r"),
            b'\\' => escaped.extend_from_slice(b"\\\\"),
            b'\'' => escaped.extend_from_slice(b"\\'"),
            b'"' => escaped.extend_from_slice(b"\\\""),
            0x1a => escaped.extend_from_slice(b"\\Z"),
            b'\t' => escaped.extend_from_slice(b"\\t"),
            0x08 => escaped.extend_from_slice(b"\\b"),
            _ => escaped.push(byte),
        }
    }
    escaped
}

/// Escapes a string without adding quotes.
pub fn escape_str(raw: &str) -> String {
    // Escaping only inserts ASCII, a valid UTF-8 input stays valid.
    String::from_utf8(escape_bytes(raw.as_bytes())).expect("escaping preserves UTF-8")
}

/// Produces a complete single-quoted SQL string literal.
pub fn quote_str(raw: &str) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('\'');
    quoted.push_str(&escape_str(raw));
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reverses the escaping the way the server lexer would inside quotes.
    fn unescape(escaped: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(escaped.len());
        let mut bytes = escaped.iter().copied();
        while let Some(byte) = bytes.next() {
            if byte != b'\\' {
                out.push(byte);
                continue;
            }
            match bytes.next() {
                Some(b'0') => out.push(0x00),
                Some(b'n') => out.push(b'\n'),
                Some(b'r') => out.push(b'\r'),
                Some(b'Z') => out.push(0x1a),
                Some(b't') => out.push(b'\t'),
                Some(b'b') => out.push(0x08),
                Some(other) => out.push(other),
                None => out.push(b'\\'),
            }
        }
        out
    }

    #[test]
    fn escapes_every_special_byte() {
        assert_eq!(escape_str("it's"), "it\\'s");
        assert_eq!(escape_str("a\\b"), "a\\\\b");
        assert_eq!(escape_str("line1\nline2"), "line1\\nline2");
        assert_eq!(escape_str("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_str("col\tend\r"), "col\\tend\\r");
        assert_eq!(escape_bytes(b"\x00\x1a\x08"), b"\\0\\Z\\b");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(escape_str("SELECT name FROM users"), "SELECT name FROM users");
        assert_eq!(escape_str("héllo wörld 😀"), "héllo wörld 😀");
    }

    #[test]
    fn escaped_form_round_trips() {
        let raw = "O'Brien \\ first\nsecond\t\"quoted\"\r\x08";
        let escaped = escape_bytes(raw.as_bytes());
        assert_eq!(unescape(&escaped), raw.as_bytes());
    }

    #[test]
    fn quoted_form_is_wrapped_once() {
        assert_eq!(quote_str("it's"), "'it\\'s'");
        assert_eq!(quote_str(""), "''");
    }
}
