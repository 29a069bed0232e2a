//! Byte-level scanner primitives shared by every statement handler.
//!
//! A statement arrives from the loader as one flat `&[u8]` terminated by a
//! NUL byte; the scanner works on (buffer, position) pairs and returns the
//! advanced position alongside its result.

/// Maximum length of an identifier accepted by `next_word`.
pub const MAX_SYMBOL: usize = 256;

/// Maximum length of a clause string accepted by `extract_string`.
pub const MAX_STRING: usize = 512;

/// Failure modes of `extract_string`, distinguished so the caller can pick
/// the right diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringError {
    /// No opening `(` at the scan position, or unterminated quote/clause.
    Malformed,
    /// Well-formed but longer than `MAX_STRING`.
    TooLong,
}

/// Advance past blanks and tabs.
pub fn skip_blanks(buf: &[u8], mut pos: usize) -> usize {
    while pos < buf.len() && (buf[pos] == b' ' || buf[pos] == b'\t') {
        pos += 1;
    }
    pos
}

fn is_word_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_word_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Extract an identifier starting at `pos` (blanks skipped first).
///
/// A non-letter first character yields an empty word without consuming
/// input, so callers can probe for a keyword and fall through to
/// punctuation handling on miss.
pub fn next_word(buf: &[u8], pos: usize) -> (usize, String) {
    let mut pos = skip_blanks(buf, pos);
    if pos >= buf.len() || !is_word_start(buf[pos]) {
        return (pos, String::new());
    }
    let start = pos;
    while pos < buf.len() && is_word_char(buf[pos]) {
        pos += 1;
    }
    let word = String::from_utf8_lossy(&buf[start..pos]).into_owned();
    (pos, word)
}

/// Peek the next non-blank byte without consuming it. Returns 0 at end of
/// buffer.
pub fn peek(buf: &[u8], pos: usize) -> u8 {
    let pos = skip_blanks(buf, pos);
    if pos < buf.len() {
        buf[pos]
    } else {
        0
    }
}

/// Parse a parenthesized clause value: `("quoted text")` with backslash
/// escapes, or `(bare-text)` taken verbatim up to the closing `)`.
///
/// On success returns the position just past the closing parenthesis.
pub fn extract_string(buf: &[u8], pos: usize) -> Result<(usize, String), StringError> {
    let mut pos = skip_blanks(buf, pos);
    if pos >= buf.len() || buf[pos] != b'(' {
        return Err(StringError::Malformed);
    }
    pos += 1;
    pos = skip_blanks(buf, pos);

    let mut text = String::new();
    if pos < buf.len() && (buf[pos] == b'"' || buf[pos] == b'\'') {
        let quote = buf[pos];
        pos += 1;
        loop {
            if pos >= buf.len() {
                return Err(StringError::Malformed);
            }
            let c = buf[pos];
            pos += 1;
            if c == quote {
                break;
            }
            if c == b'\\' {
                if pos >= buf.len() {
                    return Err(StringError::Malformed);
                }
                let e = buf[pos];
                pos += 1;
                text.push(match e {
                    b'a' => '\x07',
                    b'n' => '\n',
                    b'r' => '\r',
                    b't' => '\t',
                    other => other as char,
                });
            } else {
                text.push(c as char);
            }
            if text.len() > MAX_STRING {
                return Err(StringError::TooLong);
            }
        }
        pos = skip_blanks(buf, pos);
        if pos >= buf.len() || buf[pos] != b')' {
            return Err(StringError::Malformed);
        }
        pos += 1;
    } else {
        loop {
            if pos >= buf.len() {
                return Err(StringError::Malformed);
            }
            let c = buf[pos];
            pos += 1;
            if c == b')' {
                break;
            }
            text.push(c as char);
            if text.len() > MAX_STRING {
                return Err(StringError::TooLong);
            }
        }
        while text.ends_with(' ') {
            text.pop();
        }
    }
    Ok((pos, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_blanks() {
        assert_eq!(skip_blanks(b"   x", 0), 3);
        assert_eq!(skip_blanks(b"x", 0), 0);
        assert_eq!(skip_blanks(b"  ", 0), 2);
    }

    #[test]
    fn test_next_word() {
        let (pos, word) = next_word(b"  hello world", 0);
        assert_eq!(word, "hello");
        assert_eq!(pos, 7);

        let (pos, word) = next_word(b"_under9 x", 0);
        assert_eq!(word, "_under9");
        assert_eq!(pos, 7);

        // Digits and punctuation do not start a word.
        let (pos, word) = next_word(b"9abc", 0);
        assert_eq!(word, "");
        assert_eq!(pos, 0);
        let (_, word) = next_word(b"(x)", 0);
        assert_eq!(word, "");
    }

    #[test]
    fn test_extract_string_quoted() {
        let (pos, s) = extract_string(b"(\"hello world\") rest", 0).unwrap();
        assert_eq!(s, "hello world");
        assert_eq!(pos, 15);

        let (_, s) = extract_string(br#"("a\tb\nc\"d")"#, 0).unwrap();
        assert_eq!(s, "a\tb\nc\"d");
    }

    #[test]
    fn test_extract_string_bare() {
        let (pos, s) = extract_string(b"( net.000 ) x", 0).unwrap();
        assert_eq!(s, "net.000");
        assert_eq!(pos, 11);
    }

    #[test]
    fn test_extract_string_errors() {
        assert_eq!(extract_string(b"no-paren", 0), Err(StringError::Malformed));
        assert_eq!(extract_string(b"(\"open", 0), Err(StringError::Malformed));
        assert_eq!(extract_string(b"(never closed", 0), Err(StringError::Malformed));

        let long = format!("({})", "x".repeat(MAX_STRING + 8));
        assert_eq!(
            extract_string(long.as_bytes(), 0),
            Err(StringError::TooLong)
        );
    }
}
