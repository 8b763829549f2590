/// Link labels, destinations, titles and reference definitions
use super::entities::{is_ascii_punctuation, unescape};
use std::collections::HashMap;
use unicode_casefold::UnicodeCaseFold;

pub(crate) const MAX_LABEL_LENGTH: usize = 999;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinkReference {
    pub destination: String,
    pub title: Option<String>,
}

/// Reference definitions keyed by normalized label. First definition wins.
pub(crate) type LinkRefMap = HashMap<String, LinkReference>;

/// Case-fold a label and collapse internal whitespace for matching
pub(crate) fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .case_fold()
        .collect()
}

/// Skip spaces and tabs plus at most one newline
pub(crate) fn skip_spnl(bytes: &[u8], mut pos: usize) -> usize {
    let mut seen_newline = false;
    while pos < bytes.len() {
        match bytes[pos] {
            b' ' | b'\t' => pos += 1,
            b'\n' if !seen_newline => {
                seen_newline = true;
                pos += 1;
            }
            _ => break,
        }
    }
    pos
}

/// Scan a `[label]` starting at `pos`. Returns the position after `]`.
pub(crate) fn scan_link_label(bytes: &[u8], pos: usize) -> Option<usize> {
    if bytes.get(pos) != Some(&b'[') {
        return None;
    }
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b']' => return Some(i + 1),
            b'[' => return None,
            b'\\' if i + 1 < bytes.len() && bytes[i + 1] != b'\n' => i += 2,
            _ => i += 1,
        }
        if i - pos > MAX_LABEL_LENGTH + 1 {
            return None;
        }
    }
    None
}

/// Deepest parenthesis nesting accepted in a bare destination
const MAX_DESTINATION_PARENS: usize = 32;

/// Scan a link destination at `pos`, either `<...>` or a bare run with
/// balanced parentheses. Returns the unescaped, URI-normalized destination
/// and the position after it.
pub(crate) fn scan_link_destination(text: &str, pos: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(pos) == Some(&b'<') {
        let mut i = pos + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'>' => {
                    let raw = &text[pos + 1..i];
                    return Some((normalize_uri(&unescape(raw)), i + 1));
                }
                b'<' | b'\n' => return None,
                b'\\' if i + 1 < bytes.len() && is_ascii_punctuation(bytes[i + 1]) => i += 2,
                _ => i += 1,
            }
        }
        return None;
    }

    let mut i = pos;
    let mut open_parens = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && i + 1 < bytes.len() && is_ascii_punctuation(bytes[i + 1]) {
            i += 2;
        } else if b == b'(' {
            open_parens += 1;
            if open_parens > MAX_DESTINATION_PARENS {
                return None;
            }
            i += 1;
        } else if b == b')' {
            if open_parens == 0 {
                break;
            }
            open_parens -= 1;
            i += 1;
        } else if b == b' ' || b.is_ascii_control() {
            break;
        } else {
            i += 1;
        }
    }
    if i == pos && bytes.get(i) != Some(&b')') {
        return None;
    }
    if open_parens != 0 {
        return None;
    }
    Some((normalize_uri(&unescape(&text[pos..i])), i))
}

/// Scan a link title in `"..."`, `'...'` or `(...)` form
pub(crate) fn scan_link_title(text: &str, pos: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let close = match bytes.get(pos)? {
        b'"' => b'"',
        b'\'' => b'\'',
        b'(' => b')',
        _ => return None,
    };
    let mut i = pos + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && i + 1 < bytes.len() && is_ascii_punctuation(bytes[i + 1]) {
            i += 2;
        } else if b == close {
            let title = unescape(&text[pos + 1..i]).into_owned();
            return Some((title, i + 1));
        } else if close == b')' && b == b'(' {
            return None;
        } else {
            i += 1;
        }
    }
    None
}

/// Only spaces or tabs remain before the end of the line
fn at_line_end(bytes: &[u8], mut pos: usize) -> Option<usize> {
    while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
        pos += 1;
    }
    match bytes.get(pos) {
        None => Some(pos),
        Some(b'\n') => Some(pos + 1),
        Some(_) => None,
    }
}

/// Try to parse one link reference definition at the start of `text`.
/// Returns (normalized label, reference, bytes consumed).
pub(crate) fn parse_reference_definition(text: &str) -> Option<(String, LinkReference, usize)> {
    let bytes = text.as_bytes();
    let label_end = scan_link_label(bytes, 0)?;
    let raw_label = &text[1..label_end - 1];
    if bytes.get(label_end) != Some(&b':') {
        return None;
    }
    let pos = skip_spnl(bytes, label_end + 1);
    let (destination, pos) = scan_link_destination(text, pos)?;
    if destination.is_empty() && bytes.get(pos - 1) != Some(&b'>') {
        return None;
    }

    let before_title = pos;
    let title_start = skip_spnl(bytes, pos);
    let mut title = None;
    let mut end = None;
    if title_start != before_title
        && let Some((t, after)) = scan_link_title(text, title_start)
        && let Some(line_end) = at_line_end(bytes, after)
    {
        title = Some(t);
        end = Some(line_end);
    }
    let end = match end {
        Some(end) => end,
        // A title that is not followed by the line end is dropped
        None => at_line_end(bytes, before_title)?,
    };

    let label = normalize_label(raw_label);
    if label.is_empty() {
        return None;
    }
    Some((label, LinkReference { destination, title }, end))
}

const URI_SAFE: &[u8] = b";/?:@&=+$,-_.!~*'()#";

/// Percent-encode a destination, keeping existing `%XX` escapes
pub(crate) fn normalize_uri(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = String::with_capacity(uri.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_alphanumeric() || URI_SAFE.contains(&b) {
            out.push(b as char);
        } else if b == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            out.push('%');
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Foo \n  BAR "), "foo bar");
        assert_eq!(normalize_label("ΑΓΩ"), normalize_label("αγω"));
    }

    #[test]
    fn test_scan_link_label() {
        assert_eq!(scan_link_label(b"[foo] x", 0), Some(5));
        assert_eq!(scan_link_label(br"[fo\]o]", 0), Some(7));
        assert_eq!(scan_link_label(b"[fo[o]", 0), None);
        assert_eq!(scan_link_label(b"[foo", 0), None);
    }

    #[test]
    fn test_destination_forms() {
        assert_eq!(
            scan_link_destination("</my uri>)", 0),
            Some(("/my%20uri".to_string(), 9))
        );
        assert_eq!(
            scan_link_destination("foo(and(bar)) x", 0),
            Some(("foo(and(bar))".to_string(), 13))
        );
        assert_eq!(scan_link_destination("foo(bar", 0), None);
        assert_eq!(scan_link_destination(")", 0), Some((String::new(), 0)));
    }

    #[test]
    fn test_destination_paren_depth_limit() {
        let nested = |depth: usize| format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        let ok = nested(32);
        assert_eq!(scan_link_destination(&ok, 0), Some((ok.clone(), ok.len())));
        assert_eq!(scan_link_destination(&nested(33), 0), None);
    }

    #[test]
    fn test_titles() {
        assert_eq!(
            scan_link_title(r#""a \"b\"" x"#, 0),
            Some((r#"a "b""#.to_string(), 9))
        );
        assert_eq!(scan_link_title("(a(b)", 0), None);
        assert_eq!(scan_link_title("x", 0), None);
    }

    #[test]
    fn test_reference_definition() {
        let (label, reference, used) =
            parse_reference_definition("[Foo Bar]: /url \"title\"\nrest").unwrap();
        assert_eq!(label, "foo bar");
        assert_eq!(reference.destination, "/url");
        assert_eq!(reference.title.as_deref(), Some("title"));
        assert_eq!(used, 24);
    }

    #[test]
    fn test_reference_definition_title_on_next_line() {
        let (_, reference, used) =
            parse_reference_definition("[foo]: /url\n'the title'\n").unwrap();
        assert_eq!(reference.title.as_deref(), Some("the title"));
        assert_eq!(used, 24);
    }

    #[test]
    fn test_reference_definition_drops_bad_title() {
        let (_, reference, used) =
            parse_reference_definition("[foo]: /url\n\"title\" ok\n").unwrap();
        assert_eq!(reference.title, None);
        assert_eq!(used, 12);
        assert!(parse_reference_definition("[foo]: /url \"title\" ok\n").is_none());
        assert!(parse_reference_definition("[foo]:\n").is_none());
        assert!(parse_reference_definition("[]: /url\n").is_none());
    }

    #[test]
    fn test_normalize_uri() {
        assert_eq!(normalize_uri("/a b"), "/a%20b");
        assert_eq!(normalize_uri("%41%zz"), "%41%25zz");
        assert_eq!(normalize_uri("ä"), "%C3%A4");
    }
}
