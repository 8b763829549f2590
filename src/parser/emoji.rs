/// `:alias:` emoji shortcodes
use crate::options::EmojiTable;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Text(String),
    Emoji { alias: String, literal: String },
}

fn is_alias_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'+' | b'-')
}

/// Split text into plain runs and known emoji shortcodes. Unknown aliases
/// stay text.
pub(crate) fn split(text: &str, table: &EmojiTable) -> Vec<Segment> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b':' {
            i += 1;
            continue;
        }
        let alias_len = bytes[i + 1..]
            .iter()
            .take_while(|&&b| is_alias_byte(b))
            .count();
        let close = i + 1 + alias_len;
        if alias_len > 0 && bytes.get(close) == Some(&b':') {
            let alias = &text[i + 1..close];
            if let Some(literal) = table.get(alias) {
                if i > last {
                    segments.push(Segment::Text(text[last..i].to_string()));
                }
                segments.push(Segment::Emoji {
                    alias: alias.to_string(),
                    literal: literal.to_string(),
                });
                i = close + 1;
                last = i;
                continue;
            }
        }
        i += 1;
    }
    if last < text.len() {
        segments.push(Segment::Text(text[last..].to_string()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_alias() {
        let segments = split("ship it :rocket:!", &EmojiTable::default());
        assert_eq!(
            segments,
            vec![
                Segment::Text("ship it ".to_string()),
                Segment::Emoji {
                    alias: "rocket".to_string(),
                    literal: "\u{1F680}".to_string()
                },
                Segment::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_alias_and_custom_table() {
        let table = EmojiTable::default();
        assert_eq!(
            split("a :nope: b", &table),
            vec![Segment::Text("a :nope: b".to_string())]
        );
        let custom = table.with([("nope", "N")]);
        assert_eq!(split("a :nope: b", &custom).len(), 3);
    }

    #[test]
    fn test_adjacent_colons() {
        let segments = split("10:30:smile:", &EmojiTable::default());
        assert_eq!(segments.last(), Some(&Segment::Emoji {
            alias: "smile".to_string(),
            literal: "\u{1F604}".to_string()
        }));
    }
}
