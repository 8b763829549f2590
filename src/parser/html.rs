/// Raw HTML recognition for HTML blocks and inline HTML

const RAW_TEXT_TAGS: [&str; 4] = ["pre", "script", "style", "textarea"];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "base", "basefont", "blockquote", "body", "caption",
    "center", "col", "colgroup", "dd", "details", "dialog", "dir", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "frame", "frameset", "h1", "h2",
    "h3", "h4", "h5", "h6", "head", "header", "hr", "html", "iframe", "legend", "li", "link",
    "main", "menu", "menuitem", "nav", "noframes", "ol", "optgroup", "option", "p", "param",
    "search", "section", "source", "summary", "table", "tbody", "td", "tfoot", "th",
    "thead", "title", "tr", "track", "ul",
];

fn starts_with_ignore_case(text: &[u8], prefix: &[u8]) -> bool {
    text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn tag_name_len(bytes: &[u8], start: usize) -> usize {
    if !bytes.get(start).is_some_and(|b| b.is_ascii_alphabetic()) {
        return 0;
    }
    let mut i = start + 1;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    i - start
}

fn is_space_or_end(b: Option<&u8>) -> bool {
    matches!(b, None | Some(b' ') | Some(b'\t') | Some(b'\n'))
}

/// Detect the start of an HTML block. `line` begins at the `<` and still
/// holds its trailing newline. Returns the block type (1 to 7).
pub(crate) fn block_start(line: &str, interrupts_paragraph: bool) -> Option<u8> {
    let bytes = line.as_bytes();
    if bytes.first() != Some(&b'<') {
        return None;
    }
    let rest = &bytes[1..];

    for tag in RAW_TEXT_TAGS {
        if starts_with_ignore_case(rest, tag.as_bytes()) {
            let after = rest.get(tag.len());
            if is_space_or_end(after) || after == Some(&b'>') {
                return Some(1);
            }
        }
    }
    if rest.starts_with(b"!--") {
        return Some(2);
    }
    if rest.starts_with(b"?") {
        return Some(3);
    }
    if rest.len() > 1 && rest[0] == b'!' && rest[1].is_ascii_alphabetic() {
        return Some(4);
    }
    if rest.starts_with(b"![CDATA[") {
        return Some(5);
    }

    let name_start = usize::from(rest.first() == Some(&b'/'));
    let name_len = tag_name_len(rest, name_start);
    if name_len > 0 {
        let name = &rest[name_start..name_start + name_len];
        if BLOCK_TAGS
            .iter()
            .any(|tag| name.eq_ignore_ascii_case(tag.as_bytes()))
        {
            let after = &rest[name_start + name_len..];
            if is_space_or_end(after.first()) || after.starts_with(b">") || after.starts_with(b"/>")
            {
                return Some(6);
            }
        }
    }

    if interrupts_paragraph {
        return None;
    }
    let end = if name_start == 1 {
        scan_closing_tag(bytes, 0)?
    } else {
        let name = &rest[..name_len];
        if RAW_TEXT_TAGS
            .iter()
            .any(|tag| name.eq_ignore_ascii_case(tag.as_bytes()))
        {
            return None;
        }
        scan_open_tag(bytes, 0)?
    };
    if bytes[end..].iter().all(|b| b.is_ascii_whitespace()) {
        Some(7)
    } else {
        None
    }
}

/// Whether `line` satisfies the end condition of block types 1 to 5
pub(crate) fn block_ends(block_type: u8, line: &str) -> bool {
    match block_type {
        1 => {
            let lower = line.to_ascii_lowercase();
            RAW_TEXT_TAGS
                .iter()
                .any(|tag| lower.contains(&format!("</{}>", tag)))
        }
        2 => line.contains("-->"),
        3 => line.contains("?>"),
        4 => line.contains('>'),
        5 => line.contains("]]>"),
        _ => false,
    }
}

/// Closing sequences of the inline HTML forms that may run to the end of
/// the block
#[derive(Debug, Clone, Copy)]
enum Closer {
    Comment,
    Processing,
    Cdata,
    Declaration,
}

impl Closer {
    fn needle(self) -> &'static [u8] {
        match self {
            Closer::Comment => b"-->",
            Closer::Processing => b"?>",
            Closer::Cdata => b"]]>",
            Closer::Declaration => b">",
        }
    }
}

/// Inline raw HTML scanner for one block of text.
///
/// Once a closing sequence is missing from some offset to the end, later
/// openers of the same form fail without scanning again.
#[derive(Debug, Default)]
pub(crate) struct HtmlScanner {
    absent_from: [Option<usize>; 4],
}

impl HtmlScanner {
    /// Match raw HTML at `start`. Returns the position after it.
    pub(crate) fn scan(&mut self, bytes: &[u8], start: usize) -> Option<usize> {
        if bytes.get(start) != Some(&b'<') {
            return None;
        }
        let rest = &bytes[start + 1..];
        if rest.starts_with(b"!--") {
            let pos = start + 4;
            let body = bytes.get(pos..)?;
            if body.starts_with(b">") {
                return Some(pos + 1);
            }
            if body.starts_with(b"->") {
                return Some(pos + 2);
            }
            return self.find(bytes, pos, Closer::Comment);
        }
        if rest.starts_with(b"?") {
            return self.find(bytes, start + 2, Closer::Processing);
        }
        if rest.starts_with(b"![CDATA[") {
            return self.find(bytes, start + 9, Closer::Cdata);
        }
        if rest.len() > 1 && rest[0] == b'!' && rest[1].is_ascii_alphabetic() {
            return self.find(bytes, start + 2, Closer::Declaration);
        }
        if rest.starts_with(b"/") {
            return scan_closing_tag(bytes, start);
        }
        scan_open_tag(bytes, start)
    }

    fn find(&mut self, bytes: &[u8], from: usize, closer: Closer) -> Option<usize> {
        let slot = &mut self.absent_from[closer as usize];
        if slot.is_some_and(|absent| from >= absent) {
            return None;
        }
        let needle = closer.needle();
        let found = bytes
            .get(from..)
            .and_then(|tail| tail.windows(needle.len()).position(|w| w == needle))
            .map(|p| from + p + needle.len());
        if found.is_none() {
            *slot = Some(from);
        }
        found
    }
}

fn scan_closing_tag(bytes: &[u8], start: usize) -> Option<usize> {
    let name_len = tag_name_len(bytes, start + 2);
    if name_len == 0 {
        return None;
    }
    let mut i = start + 2 + name_len;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    (bytes.get(i) == Some(&b'>')).then_some(i + 1)
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\n') {
        i += 1;
    }
    i
}

fn scan_open_tag(bytes: &[u8], start: usize) -> Option<usize> {
    let name_len = tag_name_len(bytes, start + 1);
    if name_len == 0 {
        return None;
    }
    let mut i = start + 1 + name_len;
    loop {
        let after_space = skip_whitespace(bytes, i);
        match bytes.get(after_space) {
            None => return None,
            Some(b'>') => return Some(after_space + 1),
            Some(b'/') => {
                return (bytes.get(after_space + 1) == Some(&b'>')).then_some(after_space + 2);
            }
            Some(_) => {}
        }
        // Attributes need leading whitespace
        if after_space == i {
            return None;
        }
        i = scan_attribute(bytes, after_space)?;
    }
}

fn scan_attribute(bytes: &[u8], start: usize) -> Option<usize> {
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_' || first == b':') {
        return None;
    }
    let mut i = start + 1;
    while i < bytes.len()
        && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'.' | b':' | b'-'))
    {
        i += 1;
    }
    let before_value = skip_whitespace(bytes, i);
    if bytes.get(before_value) != Some(&b'=') {
        return Some(i);
    }
    let value_start = skip_whitespace(bytes, before_value + 1);
    match *bytes.get(value_start)? {
        quote @ (b'"' | b'\'') => {
            let close = bytes[value_start + 1..].iter().position(|&b| b == quote)?;
            Some(value_start + 1 + close + 1)
        }
        _ => {
            let mut j = value_start;
            while j < bytes.len()
                && !matches!(
                    bytes[j],
                    b' ' | b'\t' | b'\n' | b'"' | b'\'' | b'=' | b'<' | b'>' | b'`'
                )
            {
                j += 1;
            }
            (j > value_start).then_some(j)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_start_types() {
        assert_eq!(block_start("<script>\n", false), Some(1));
        assert_eq!(block_start("<!-- x\n", false), Some(2));
        assert_eq!(block_start("<?php\n", false), Some(3));
        assert_eq!(block_start("<!DOCTYPE html>\n", false), Some(4));
        assert_eq!(block_start("<![CDATA[\n", false), Some(5));
        assert_eq!(block_start("<div class=\"a\">\n", false), Some(6));
        assert_eq!(block_start("</DIV>\n", true), Some(6));
        assert_eq!(block_start("<custom-tag a=1>\n", false), Some(7));
        assert_eq!(block_start("<custom-tag a=1>\n", true), None);
        assert_eq!(block_start("<a href=\"x\">text\n", false), None);
        assert_eq!(block_start("<http://example.com>\n", false), None);
    }

    #[test]
    fn test_block_end_conditions() {
        assert!(block_ends(1, "x </SCRIPT> y"));
        assert!(block_ends(2, "-->"));
        assert!(!block_ends(3, "?"));
        assert!(!block_ends(6, "anything"));
    }

    #[test]
    fn test_inline_html() {
        let t = |s: &str| HtmlScanner::default().scan(s.as_bytes(), 0);
        assert_eq!(t("<a href=\"x\">rest"), Some(12));
        assert_eq!(t("<br/>"), Some(5));
        assert_eq!(t("<a  \n foo=bar>"), Some(14));
        assert_eq!(t("</em >"), Some(6));
        assert_eq!(t("<!-- hi -->x"), Some(11));
        assert_eq!(t("<!-->"), Some(5));
        assert_eq!(t("<?p ?>"), Some(6));
        assert_eq!(t("<!X y>"), Some(6));
        assert_eq!(t("<![CDATA[x]]>"), Some(13));
        assert_eq!(t("<a foo=\"bar\"baz>"), None);
        assert_eq!(t("<33>"), None);
        assert_eq!(t("<a"), None);
    }

    #[test]
    fn test_missing_closer_is_remembered() {
        let text = b"<!-- a <!-- b <? c";
        let mut scanner = HtmlScanner::default();
        assert_eq!(scanner.scan(text, 0), None);
        assert_eq!(scanner.absent_from[Closer::Comment as usize], Some(4));
        assert_eq!(scanner.scan(text, 7), None);
        assert_eq!(scanner.scan(text, 14), None);
        assert_eq!(scanner.absent_from[Closer::Processing as usize], Some(16));

        let mut scanner = HtmlScanner::default();
        let closed = b"<!-- a --> <!-- b -->";
        assert_eq!(scanner.scan(closed, 0), Some(10));
        assert_eq!(scanner.scan(closed, 11), Some(21));
    }
}
