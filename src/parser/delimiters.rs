/// Delimiter runs and emphasis resolution
use crate::ast::{NodeId, NodeKind, Span, Tree};
use crate::options::CARET;
use unicode_categories::UnicodeCategories;

/// Punctuation in the CommonMark sense: ASCII punctuation plus the Unicode
/// P and S general categories
pub(crate) fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || c.is_punctuation() || c.is_symbol()
}

/// Open/close capability of a delimiter run given its neighbours.
///
/// `before` and `after` are the characters around the run, with a newline
/// standing in for the start or end of the text.
pub fn classify(delimiter: u8, before: char, after: char) -> (bool, bool) {
    let before_ws = before.is_whitespace();
    let after_ws = after.is_whitespace();
    let before_punct = is_punctuation(before);
    let after_punct = is_punctuation(after);

    let left_flanking = !after_ws && (!after_punct || before_ws || before_punct);
    let right_flanking = !before_ws && (!before_punct || after_ws || after_punct);

    if delimiter == b'_' {
        (
            left_flanking && (!right_flanking || before_punct),
            right_flanking && (!left_flanking || after_punct),
        )
    } else {
        (left_flanking, right_flanking)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DelimiterRun {
    pub length: usize,
    pub can_open: bool,
    pub can_close: bool,
}

/// Measure the run of `delimiter` bytes at `pos` and classify it
pub(crate) fn scan_delimiters(text: &str, pos: usize, delimiter: u8, skip_caret: bool) -> DelimiterRun {
    let length = text.as_bytes()[pos..]
        .iter()
        .take_while(|&&b| b == delimiter)
        .count();

    let mut before_chars = text[..pos].chars().rev();
    let mut before = before_chars.next().unwrap_or('\n');
    if skip_caret && before == CARET {
        before = before_chars.next().unwrap_or('\n');
    }
    let mut after_chars = text[pos + length..].chars();
    let mut after = after_chars.next().unwrap_or('\n');
    if skip_caret && after == CARET {
        after = after_chars.next().unwrap_or('\n');
    }

    let (can_open, can_close) = classify(delimiter, before, after);
    DelimiterRun {
        length,
        can_open,
        can_close,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Delimiter {
    /// Text node holding the literal run
    pub node: NodeId,
    pub delimiter: u8,
    /// Delimiters still available
    pub count: usize,
    pub original_count: usize,
    pub can_open: bool,
    pub can_close: bool,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Delimiter {
    pub fn new(node: NodeId, delimiter: u8, run: DelimiterRun) -> Self {
        Delimiter {
            node,
            delimiter,
            count: run.length,
            original_count: run.length,
            can_open: run.can_open,
            can_close: run.can_close,
            prev: None,
            next: None,
        }
    }
}

/// Doubly linked delimiter list stored in an index arena. Entries are never
/// reused within one resolution, so a stale index never aliases a live one.
#[derive(Debug, Default)]
pub(crate) struct DelimiterStack {
    entries: Vec<Delimiter>,
    top: Option<usize>,
}

fn bucket(delimiter: u8) -> usize {
    match delimiter {
        b'*' => 0,
        b'_' => 1,
        _ => 2,
    }
}

impl DelimiterStack {
    pub fn top(&self) -> Option<usize> {
        self.top
    }

    pub fn push(&mut self, mut delimiter: Delimiter) -> usize {
        let index = self.entries.len();
        delimiter.prev = self.top;
        delimiter.next = None;
        if let Some(top) = self.top {
            self.entries[top].next = Some(index);
        }
        self.entries.push(delimiter);
        self.top = Some(index);
        index
    }

    fn remove(&mut self, index: usize) {
        let (prev, next) = (self.entries[index].prev, self.entries[index].next);
        if let Some(prev) = prev {
            self.entries[prev].next = next;
        }
        match next {
            Some(next) => self.entries[next].prev = prev,
            None => self.top = prev,
        }
    }

    /// Resolve emphasis for every delimiter above `stack_bottom`, then drop
    /// those entries. Unmatched runs stay as the literal text they already are.
    pub fn process_emphasis(&mut self, tree: &mut Tree, stack_bottom: Option<usize>) {
        // Lower bound per delimiter character, split by whether the closer
        // can also open and by its original length mod 3
        let mut openers_bottom = [[stack_bottom; 6]; 3];

        let mut closer = self.top;
        while let Some(c) = closer {
            if self.entries[c].prev == stack_bottom {
                break;
            }
            closer = self.entries[c].prev;
        }

        while let Some(c) = closer {
            let current = &self.entries[c];
            if !current.can_close {
                closer = current.next;
                continue;
            }
            let ch = current.delimiter;
            let slot = (if current.can_open { 3 } else { 0 }) + current.original_count % 3;
            let floor = openers_bottom[bucket(ch)][slot];

            let mut opener = current.prev;
            let mut found = None;
            while let Some(o) = opener {
                if Some(o) == stack_bottom || Some(o) == floor {
                    break;
                }
                let candidate = &self.entries[o];
                let closer_entry = &self.entries[c];
                let matches = candidate.delimiter == ch && candidate.can_open && {
                    if ch == b'~' {
                        candidate.count == closer_entry.count
                    } else {
                        let odd_match = (closer_entry.can_open || candidate.can_close)
                            && closer_entry.original_count % 3 != 0
                            && (candidate.original_count + closer_entry.original_count) % 3 == 0;
                        !odd_match
                    }
                };
                if matches {
                    found = Some(o);
                    break;
                }
                opener = candidate.prev;
            }

            match found {
                Some(o) => closer = self.insert_emphasis(tree, o, c),
                None => {
                    openers_bottom[bucket(ch)][slot] = self.entries[c].prev;
                    let next = self.entries[c].next;
                    if !self.entries[c].can_open {
                        self.remove(c);
                    }
                    closer = next;
                }
            }
        }

        while let Some(top) = self.top {
            if Some(top) == stack_bottom {
                break;
            }
            self.remove(top);
        }
    }

    /// Wrap the nodes between a matched opener and closer. Returns the
    /// closer to continue from.
    fn insert_emphasis(&mut self, tree: &mut Tree, opener: usize, closer: usize) -> Option<usize> {
        let ch = self.entries[opener].delimiter;
        let used = if ch == b'~' {
            self.entries[opener].count
        } else if self.entries[opener].count >= 2 && self.entries[closer].count >= 2 {
            2
        } else {
            1
        };
        let kind = match (ch, used) {
            (b'~', _) => NodeKind::Strikethrough,
            (_, 2) => NodeKind::Strong,
            _ => NodeKind::Emphasis,
        };

        let opener_node = self.entries[opener].node;
        let closer_node = self.entries[closer].node;
        self.entries[opener].count -= used;
        self.entries[closer].count -= used;
        shrink_text(tree, opener_node, used, false);
        shrink_text(tree, closer_node, used, true);

        let start = tree[opener_node].span.end;
        let end = tree[closer_node].span.start;
        let wrapper = tree.create(kind, Span::new(start, end));
        let mut child = tree[opener_node].next();
        while let Some(node) = child {
            if node == closer_node {
                break;
            }
            child = tree[node].next();
            tree.unlink(node);
            tree.append_child(wrapper, node);
        }
        tree.insert_after(opener_node, wrapper);

        // Everything between the pair is now inside the wrapper
        if self.entries[opener].next != Some(closer) {
            self.entries[opener].next = Some(closer);
            self.entries[closer].prev = Some(opener);
        }

        if self.entries[opener].count == 0 {
            tree.unlink(opener_node);
            self.remove(opener);
        }
        if self.entries[closer].count == 0 {
            tree.unlink(closer_node);
            let next = self.entries[closer].next;
            self.remove(closer);
            next
        } else {
            Some(closer)
        }
    }
}

/// Remove `used` delimiter characters from a run's text node. The opener
/// gives up its trailing characters, the closer its leading ones.
fn shrink_text(tree: &mut Tree, node: NodeId, used: usize, leading: bool) {
    let entry = &mut tree[node];
    if let NodeKind::Text { literal } = &mut entry.kind {
        let keep = literal.len().saturating_sub(used);
        literal.truncate(keep);
    }
    if leading {
        entry.span.start = (entry.span.start + used).min(entry.span.end);
    } else {
        entry.span.end = entry.span.end.saturating_sub(used).max(entry.span.start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_flanking_rules() {
        // `*foo`
        assert_eq!(classify(b'*', '\n', 'f'), (true, false));
        // `foo*`
        assert_eq!(classify(b'*', 'o', '\n'), (false, true));
        // `foo*bar` opens and closes for `*` but not for `_`
        assert_eq!(classify(b'*', 'o', 'b'), (true, true));
        assert_eq!(classify(b'_', 'o', 'b'), (false, false));
        // `a * b`
        assert_eq!(classify(b'*', ' ', ' '), (false, false));
        // `"*"` punctuation on both sides
        assert_eq!(classify(b'*', '"', '"'), (true, true));
        // `(_foo` and `foo_)`
        assert_eq!(classify(b'_', '(', 'f'), (true, false));
        assert_eq!(classify(b'_', 'o', ')'), (false, true));
    }

    #[test]
    fn test_unicode_classes() {
        // non-breaking space counts as whitespace, `€` as a symbol
        assert_eq!(classify(b'*', '\u{A0}', 'a'), (true, false));
        assert!(is_punctuation('€'));
        assert!(is_punctuation('。'));
        assert!(!is_punctuation('é'));
    }

    #[test]
    fn test_scan_delimiters() {
        let run = scan_delimiters("a**b", 1, b'*', false);
        assert_eq!(run.length, 2);
        assert!(run.can_open && run.can_close);

        let run = scan_delimiters("**", 0, b'*', false);
        assert!(!run.can_open && !run.can_close);
    }

    #[test]
    fn test_caret_is_transparent() {
        let text = "a\u{2038}*b";
        let pos = 1 + CARET.len_utf8();
        let with = scan_delimiters(text, pos, b'*', true);
        assert_eq!(with, scan_delimiters("a*b", 1, b'*', false));
        assert!(with.can_close);

        let without = scan_delimiters(text, pos, b'*', false);
        assert!(without.can_open);
        assert!(!without.can_close);
    }

    proptest! {
        #[test]
        fn classification_is_pure(
            delimiter in prop::sample::select(vec![b'*', b'_', b'~']),
            before in any::<char>(),
            after in any::<char>(),
        ) {
            let first = classify(delimiter, before, after);
            prop_assert_eq!(first, classify(delimiter, before, after));
        }

        #[test]
        fn scanning_twice_agrees(
            prefix in "[a-z .!\\u{3000}]{0,4}",
            run in 1usize..4,
            suffix in "[a-z .!\\u{3000}]{0,4}",
        ) {
            let text = format!("{}{}{}", prefix, "*".repeat(run), suffix);
            let pos = prefix.len();
            let first = scan_delimiters(&text, pos, b'*', false);
            let second = scan_delimiters(&text, pos, b'*', false);
            prop_assert_eq!(first, second);
            prop_assert!(first.length >= run);
        }
    }
}
