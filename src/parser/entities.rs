/// Entity references, numeric character references and backslash escapes
use std::borrow::Cow;

pub(crate) fn is_ascii_punctuation(b: u8) -> bool {
    b.is_ascii_punctuation()
}

/// Try to decode an entity or numeric character reference at `start`,
/// which must point at `&`. Returns (decoded text, position after `;`).
pub(crate) fn parse_entity(text: &str, start: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'&') {
        return None;
    }
    let mut i = start + 1;

    if bytes.get(i) == Some(&b'#') {
        i += 1;
        let hex = matches!(bytes.get(i), Some(b'x') | Some(b'X'));
        if hex {
            i += 1;
        }
        let digits_start = i;
        let max = if hex { 6 } else { 7 };
        while i < bytes.len()
            && i - digits_start < max
            && (if hex {
                bytes[i].is_ascii_hexdigit()
            } else {
                bytes[i].is_ascii_digit()
            })
        {
            i += 1;
        }
        if i == digits_start || bytes.get(i) != Some(&b';') {
            return None;
        }
        let radix = if hex { 16 } else { 10 };
        let code_point = u32::from_str_radix(&text[digits_start..i], radix).ok()?;
        return Some((decode_code_point(code_point).to_string(), i + 1));
    }

    // Named entity: a letter followed by up to 31 alphanumerics
    let name_start = i;
    if !bytes.get(i).is_some_and(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    while i < bytes.len() && i - name_start < 32 && bytes[i].is_ascii_alphanumeric() {
        i += 1;
    }
    if bytes.get(i) != Some(&b';') {
        return None;
    }
    let decoded = decode_named_entity(&text[start..=i])?;
    Some((decoded, i + 1))
}

/// Zero, surrogates and values past the Unicode range all map to U+FFFD
pub(crate) fn decode_code_point(code_point: u32) -> char {
    if code_point == 0 {
        return '\u{FFFD}';
    }
    char::from_u32(code_point).unwrap_or('\u{FFFD}')
}

/// Look up a full `&name;` reference in the HTML5 entity table
fn decode_named_entity(reference: &str) -> Option<String> {
    let decoded = html_escape::decode_html_entities(reference);
    match decoded {
        Cow::Borrowed(_) => None,
        // A legacy prefix match such as `&ampx;` leaves the tail behind
        Cow::Owned(s) if s.chars().count() <= 2 && !s.ends_with(';') || s == ";" => Some(s),
        Cow::Owned(_) => None,
    }
}

/// Process backslash escapes and entity references, as used by link
/// destinations, titles and fence info strings
pub(crate) fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains(['\\', '&']) {
        return Cow::Borrowed(text);
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut copied = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() && is_ascii_punctuation(bytes[i + 1]) => {
                out.push_str(&text[copied..i]);
                out.push(bytes[i + 1] as char);
                i += 2;
                copied = i;
            }
            b'&' => {
                if let Some((decoded, end)) = parse_entity(text, i) {
                    out.push_str(&text[copied..i]);
                    out.push_str(&decoded);
                    i = end;
                    copied = i;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    out.push_str(&text[copied..]);
    Cow::Owned(out)
}
