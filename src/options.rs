/// Parser configuration
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Editor caret placeholder recognized when `editor_caret` is on
pub const CARET: char = '\u{2038}';

/// Feature flags and extension data for one parse.
///
/// Every flag gates one block-start or inline handler. With a flag off the
/// parser behaves as if the handler did not exist.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    pub gfm_autolink: bool,
    pub gfm_strikethrough: bool,
    pub gfm_table: bool,
    pub gfm_task_list_item: bool,
    pub footnotes: bool,
    pub emoji: bool,
    pub inline_math: bool,
    pub math_block: bool,
    pub toc: bool,
    pub parallel_inlines: bool,
    pub editor_caret: bool,
    #[serde(skip)]
    pub domain_suffixes: DomainSuffixes,
    #[serde(skip)]
    pub emoji_table: EmojiTable,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            gfm_autolink: false,
            gfm_strikethrough: false,
            gfm_table: false,
            gfm_task_list_item: false,
            footnotes: false,
            emoji: false,
            inline_math: false,
            math_block: false,
            toc: false,
            parallel_inlines: false,
            editor_caret: false,
            domain_suffixes: DomainSuffixes::default(),
            emoji_table: EmojiTable::default(),
        }
    }
}

impl Options {
    /// GitHub Flavored Markdown: autolinks, strikethrough, tables, task lists
    pub fn gfm() -> Self {
        Options {
            gfm_autolink: true,
            gfm_strikethrough: true,
            gfm_table: true,
            gfm_task_list_item: true,
            ..Options::default()
        }
    }

    /// Every extension on
    pub fn all() -> Self {
        Options {
            footnotes: true,
            emoji: true,
            inline_math: true,
            math_block: true,
            toc: true,
            ..Options::gfm()
        }
    }

    /// Bytes that may start a block. Lines whose first non-space byte is
    /// outside this set skip block-start probing entirely.
    pub(crate) fn block_start_markers(&self) -> [bool; 256] {
        let mut set = [false; 256];
        for &b in b"#>`~<*+-_=" {
            set[b as usize] = true;
        }
        for b in b'0'..=b'9' {
            set[b as usize] = true;
        }
        if self.math_block {
            set[b'$' as usize] = true;
        }
        if self.footnotes {
            set[b'[' as usize] = true;
        }
        if self.editor_caret {
            let mut buf = [0u8; 4];
            let lead = CARET.encode_utf8(&mut buf).as_bytes()[0];
            set[lead as usize] = true;
        }
        set
    }

    /// Bytes that end a plain text run in the inline scanner
    pub(crate) fn inline_markers(&self) -> [bool; 256] {
        let mut set = [false; 256];
        for &b in b"\n\\`*_[]!<&" {
            set[b as usize] = true;
        }
        if self.gfm_strikethrough {
            set[b'~' as usize] = true;
        }
        if self.inline_math {
            set[b'$' as usize] = true;
        }
        set
    }
}

const DEFAULT_SUFFIXES: &[&str] = &[
    "com", "org", "net", "edu", "gov", "mil", "int", "io", "dev", "app", "ai", "co", "me",
    "info", "biz", "xyz", "site", "online", "tech", "cloud", "blog", "wiki", "cn", "jp", "uk",
    "de", "fr", "ru", "br", "in", "it", "nl", "au", "ca", "es", "se", "ch", "kr", "tw", "hk",
    "us", "eu", "pl", "be", "at", "dk", "no", "fi", "nz", "sg", "tv", "cc", "ly", "so", "to",
];

/// Snapshot of top-level domain suffixes accepted by extended autolinks.
///
/// The set is shared behind an `Arc`; extending it produces a new snapshot
/// and never touches one a running parse holds.
#[derive(Debug, Clone)]
pub struct DomainSuffixes(Arc<HashSet<String>>);

impl Default for DomainSuffixes {
    fn default() -> Self {
        DomainSuffixes(Arc::new(
            DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        ))
    }
}

impl DomainSuffixes {
    pub fn empty() -> Self {
        DomainSuffixes(Arc::new(HashSet::new()))
    }

    pub fn with<I, S>(&self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = (*self.0).clone();
        set.extend(
            suffixes
                .into_iter()
                .map(|s| s.as_ref().trim_start_matches('.').to_ascii_lowercase()),
        );
        DomainSuffixes(Arc::new(set))
    }

    pub fn contains(&self, suffix: &str) -> bool {
        self.0.contains(&suffix.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

const DEFAULT_EMOJI: &[(&str, &str)] = &[
    ("smile", "\u{1F604}"),
    ("smiley", "\u{1F603}"),
    ("grin", "\u{1F601}"),
    ("joy", "\u{1F602}"),
    ("wink", "\u{1F609}"),
    ("heart", "\u{2764}\u{FE0F}"),
    ("thumbsup", "\u{1F44D}"),
    ("+1", "\u{1F44D}"),
    ("thumbsdown", "\u{1F44E}"),
    ("-1", "\u{1F44E}"),
    ("tada", "\u{1F389}"),
    ("rocket", "\u{1F680}"),
    ("fire", "\u{1F525}"),
    ("star", "\u{2B50}"),
    ("warning", "\u{26A0}\u{FE0F}"),
    ("white_check_mark", "\u{2705}"),
    ("x", "\u{274C}"),
    ("bug", "\u{1F41B}"),
    ("sparkles", "\u{2728}"),
    ("eyes", "\u{1F440}"),
    ("100", "\u{1F4AF}"),
    ("coffee", "\u{2615}"),
    ("memo", "\u{1F4DD}"),
    ("bulb", "\u{1F4A1}"),
    ("zap", "\u{26A1}"),
    ("lock", "\u{1F512}"),
    ("wave", "\u{1F44B}"),
    ("pray", "\u{1F64F}"),
    ("clap", "\u{1F44F}"),
    ("cry", "\u{1F622}"),
];

/// Alias to emoji lookup, frozen for the duration of a parse
#[derive(Debug, Clone)]
pub struct EmojiTable(Arc<HashMap<String, String>>);

impl Default for EmojiTable {
    fn default() -> Self {
        EmojiTable(Arc::new(
            DEFAULT_EMOJI
                .iter()
                .map(|(alias, emoji)| (alias.to_string(), emoji.to_string()))
                .collect(),
        ))
    }
}

impl EmojiTable {
    pub fn with<I, K, V>(&self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = (*self.0).clone();
        map.extend(aliases.into_iter().map(|(k, v)| (k.into(), v.into())));
        EmojiTable(Arc::new(map))
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.0.get(alias).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_set_follows_flags() {
        let plain = Options::default().block_start_markers();
        assert!(!plain[b'$' as usize]);
        assert!(!plain[b'[' as usize]);
        assert!(plain[b'>' as usize]);

        let opts = Options {
            math_block: true,
            footnotes: true,
            ..Options::default()
        };
        let markers = opts.block_start_markers();
        assert!(markers[b'$' as usize]);
        assert!(markers[b'[' as usize]);
    }

    #[test]
    fn test_inline_markers_follow_flags() {
        assert!(!Options::default().inline_markers()[b'~' as usize]);
        assert!(Options::gfm().inline_markers()[b'~' as usize]);
    }

    #[test]
    fn test_domain_suffix_snapshot_is_immutable() {
        let base = DomainSuffixes::default();
        let extended = base.with([".Zone"]);
        assert!(extended.contains("zone"));
        assert!(!base.contains("zone"));
        assert!(extended.contains("COM"));
    }

    #[test]
    fn test_options_deserialize_partial() {
        let opts: Options = serde_json::from_str(r#"{"gfm_table": true}"#).unwrap();
        assert!(opts.gfm_table);
        assert!(!opts.footnotes);
        assert!(opts.emoji_table.get("smile").is_some());
    }
}
