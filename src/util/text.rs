use std::borrow::Cow;

/// Strip control characters and ANSI escape sequences from feed-supplied text.
///
/// Feed titles become stored document names and end up in terminals and
/// JSON output, so anything that is not printable text is dropped. CSI
/// sequences (`\x1b[` ... final byte) are removed whole; a bare ESC is
/// removed on its own. Tab, newline and carriage return are kept.
///
/// Returns `Cow::Borrowed` when there is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // parameter and intermediate bytes run until the final byte
                for next in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        if !is_stripped(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

/// Collapse runs of whitespace to single spaces and trim both ends.
///
/// Titles scraped from RSS channels frequently carry the indentation of the
/// surrounding XML.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Produce a display-safe document name from a raw feed title.
pub fn sanitize_title(raw: &str) -> String {
    collapse_whitespace(&strip_control_chars(raw))
}

fn is_stripped(c: char) -> bool {
    c == '\x1b' || c == '\x7f' || (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r'))
}
