use std::borrow::Cow;

/// Truncate `s` to at most `max_bytes` bytes without splitting a character.
///
/// Returns `Cow::Borrowed` when nothing had to be cut.
pub fn truncate_bytes(s: &str, max_bytes: usize) -> Cow<'_, str> {
    if s.len() <= max_bytes {
        return Cow::Borrowed(s);
    }
    let mut cut = max_bytes;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    Cow::Owned(s[..cut].to_string())
}

fn is_stripped_control(c: char) -> bool {
    c == '\x7f' || (c < '\x20' && !matches!(c, '\t' | '\n' | '\r'))
}

/// Remove control characters and ANSI escape sequences from feed-supplied text.
///
/// Tab, newline and carriage return survive. CSI sequences (`ESC [` up to a
/// final byte in `0x40..=0x7e`) and OSC sequences (`ESC ]` up to BEL or
/// `ESC \`) are dropped whole; a bare ESC is dropped on its own.
///
/// Clean input is returned as `Cow::Borrowed`.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| c == '\x1b' || is_stripped_control(c)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    for n in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&n) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(n) = chars.next() {
                        if n == '\x07' {
                            break;
                        }
                        if n == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            c if is_stripped_control(c) => {}
            c => out.push(c),
        }
    }

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_bytes_short_input_borrowed() {
        let result = truncate_bytes("short", 8192);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "short");
    }

    #[test]
    fn test_truncate_bytes_exact_limit() {
        assert_eq!(truncate_bytes("12345", 5), "12345");
        assert_eq!(truncate_bytes("123456", 5), "12345");
    }

    #[test]
    fn test_truncate_bytes_respects_char_boundary() {
        // "é" is two bytes; cutting at 2 would split it
        assert_eq!(truncate_bytes("aé", 2), "a");
        assert_eq!(truncate_bytes("日本語", 4), "日");
        assert_eq!(truncate_bytes("日本語", 0), "");
    }

    #[test]
    fn test_strip_clean_text_returns_borrowed() {
        let input = "line1\nline2\ttabbed\r\nwindows";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_removes_c0_and_del() {
        assert_eq!(strip_control_chars("he\x00ll\x07o\x08 w\x0bor\x0cld\x7f!"), "hello world!");
    }

    #[test]
    fn test_strip_ansi_sequences() {
        assert_eq!(strip_control_chars("\x1b[31mRed\x1b[0m text"), "Red text");
        assert_eq!(strip_control_chars("\x1b]0;title\x07safe"), "safe");
        assert_eq!(strip_control_chars("\x1b]0;title\x1b\\safe"), "safe");
        assert_eq!(strip_control_chars("bare\x1bescape"), "bareescape");
    }

    #[test]
    fn test_strip_keeps_unicode() {
        assert_eq!(strip_control_chars("Café\x01 日本"), "Café 日本");
    }

    #[test]
    fn test_strip_unterminated_sequence_at_end() {
        assert_eq!(strip_control_chars("text\x1b[12"), "text");
        assert_eq!(strip_control_chars("text\x1b]never ends"), "text");
    }
}
