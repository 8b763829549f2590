/// Block starts, tried in a fixed priority order against the line
use super::blocks::{BlockParser, trim_content};
use super::html;
use super::links::{normalize_label, parse_reference_definition};
use super::table::parse_table;
use crate::ast::{CodeBlockData, ListData, ListType, NodeId, NodeKind};
use crate::options::CARET;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockStart {
    NoMatch,
    /// A container opened; keep looking for starts inside it
    Container,
    /// A leaf opened; the rest of the line is its content
    Leaf,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum StartKind {
    BlockQuote,
    AtxHeading,
    FencedCode,
    HtmlBlock,
    SetextHeading,
    ThematicBreak,
    ListItem,
    MathBlock,
    IndentedCode,
    FootnoteDefinition,
}

pub(crate) const START_ORDER: [StartKind; 10] = [
    StartKind::BlockQuote,
    StartKind::AtxHeading,
    StartKind::FencedCode,
    StartKind::HtmlBlock,
    StartKind::SetextHeading,
    StartKind::ThematicBreak,
    StartKind::ListItem,
    StartKind::MathBlock,
    StartKind::IndentedCode,
    StartKind::FootnoteDefinition,
];

fn is_space_or_tab(b: Option<u8>) -> bool {
    matches!(b, Some(b' ') | Some(b'\t'))
}

fn is_line_end(b: Option<u8>) -> bool {
    matches!(b, None | Some(b'\n'))
}

/// `#{1,6}` followed by whitespace or the end of the line
fn atx_marker(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let level = bytes.iter().take_while(|&&b| b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    match bytes.get(level).copied() {
        b if is_line_end(b) || is_space_or_tab(b) => Some(level),
        _ => None,
    }
}

/// Heading text with the optional closing `#` sequence removed
fn atx_content(raw: &str) -> &str {
    let line = raw.trim_end_matches(['\n', ' ', '\t']);
    let hashes = line.bytes().rev().take_while(|&b| b == b'#').count();
    if hashes == 0 {
        return trim_content(line);
    }
    let before = &line[..line.len() - hashes];
    if before.is_empty() || before.ends_with([' ', '\t']) {
        trim_content(before)
    } else {
        trim_content(line)
    }
}

/// Split a trailing `{id}` off heading text
fn heading_id(content: &str) -> (&str, Option<String>) {
    if let Some(body) = content.strip_suffix('}')
        && let Some(open) = body.rfind('{')
    {
        let id = body[open + 1..].trim();
        let text = body[..open].trim_end();
        if !id.is_empty() && !id.contains(char::is_whitespace) && !text.is_empty() {
            return (text, Some(id.to_string()));
        }
    }
    (content, None)
}

/// Opening fence: (fence char, length). Backtick fences reject a backtick
/// in the info string.
fn code_fence(rest: &str) -> Option<(u8, usize)> {
    let bytes = rest.as_bytes();
    let fence = *bytes.first()?;
    if fence != b'`' && fence != b'~' {
        return None;
    }
    let length = bytes.iter().take_while(|&&b| b == fence).count();
    if length < 3 {
        return None;
    }
    if fence == b'`' && bytes[length..].contains(&b'`') {
        return None;
    }
    Some((fence, length))
}

fn setext_level(rest: &str, editor_caret: bool) -> Option<u8> {
    let line = rest.trim_end_matches(['\n', ' ', '\t']);
    let line: String = if editor_caret {
        line.chars().filter(|&c| c != CARET).collect()
    } else {
        line.to_string()
    };
    let first = line.bytes().next()?;
    if (first == b'=' || first == b'-') && line.bytes().all(|b| b == first) {
        Some(if first == b'=' { 1 } else { 2 })
    } else {
        None
    }
}

fn is_thematic_break(rest: &str, editor_caret: bool) -> bool {
    let mut marker = None;
    let mut count = 0;
    for c in rest.chars() {
        match c {
            ' ' | '\t' | '\n' => {}
            c if editor_caret && c == CARET => {}
            '-' | '_' | '*' => match marker {
                None => {
                    marker = Some(c);
                    count = 1;
                }
                Some(m) if m == c => count += 1,
                Some(_) => return false,
            },
            _ => return false,
        }
    }
    count >= 3
}

/// `$$` opening a math block
fn math_fence(rest: &str) -> bool {
    rest.as_bytes().iter().take_while(|&&b| b == b'$').count() >= 2
}

/// `[^label]:` at the start of a line. Returns (label, marker length).
fn footnote_label(rest: &str) -> Option<(&str, usize)> {
    let body = rest.strip_prefix("[^")?;
    let close = body.find(']')?;
    let label = &body[..close];
    if label.is_empty() || label.contains(char::is_whitespace) || label.contains('[') {
        return None;
    }
    if body.as_bytes().get(close + 1) != Some(&b':') {
        return None;
    }
    Some((label, close + 4))
}

impl BlockParser<'_> {
    pub(super) fn try_start(&mut self, start: StartKind, container: NodeId) -> BlockStart {
        match start {
            StartKind::BlockQuote => self.start_block_quote(),
            StartKind::AtxHeading => self.start_atx_heading(),
            StartKind::FencedCode => self.start_fenced_code(),
            StartKind::HtmlBlock => self.start_html_block(container),
            StartKind::SetextHeading => self.start_setext_heading(container),
            StartKind::ThematicBreak => self.start_thematic_break(),
            StartKind::ListItem => self.start_list_item(container),
            StartKind::MathBlock => self.start_math_block(),
            StartKind::IndentedCode => self.start_indented_code(),
            StartKind::FootnoteDefinition => self.start_footnote_definition(),
        }
    }

    fn start_block_quote(&mut self) -> BlockStart {
        if self.indented || self.peek(self.next_nonspace) != Some(b'>') {
            return BlockStart::NoMatch;
        }
        self.advance_next_nonspace();
        self.advance_offset(1, false);
        if is_space_or_tab(self.peek(self.offset)) {
            self.advance_offset(1, true);
        }
        self.close_unmatched_blocks();
        self.add_child(NodeKind::BlockQuote, self.next_nonspace);
        BlockStart::Container
    }

    fn start_atx_heading(&mut self) -> BlockStart {
        if self.indented {
            return BlockStart::NoMatch;
        }
        let rest = self.rest();
        let Some(level) = atx_marker(rest) else {
            return BlockStart::NoMatch;
        };
        let mut content = atx_content(&rest[level..]);
        if self.options.editor_caret && content == CARET.to_string() {
            return BlockStart::NoMatch;
        }
        let mut id = None;
        if self.options.toc {
            (content, id) = heading_id(content);
        }
        let content = content.to_string();

        self.advance_next_nonspace();
        self.advance_offset(level, false);
        self.close_unmatched_blocks();
        let heading = self.add_child(
            NodeKind::Heading {
                level: level as u8,
                setext: false,
                id,
            },
            self.next_nonspace,
        );
        self.tree[heading].content = content;
        self.advance_to_end();
        BlockStart::Leaf
    }

    fn start_fenced_code(&mut self) -> BlockStart {
        if self.indented {
            return BlockStart::NoMatch;
        }
        let Some((fence, length)) = code_fence(self.rest()) else {
            return BlockStart::NoMatch;
        };
        self.close_unmatched_blocks();
        self.add_child(
            NodeKind::CodeBlock(CodeBlockData {
                fenced: true,
                fence_char: Some(fence as char),
                fence_length: length,
                fence_offset: self.indent,
                info: String::new(),
                literal: String::new(),
            }),
            self.next_nonspace,
        );
        self.advance_next_nonspace();
        self.advance_offset(length, false);
        BlockStart::Leaf
    }

    fn start_html_block(&mut self, container: NodeId) -> BlockStart {
        if self.indented || self.peek(self.next_nonspace) != Some(b'<') {
            return BlockStart::NoMatch;
        }
        let interrupts_paragraph = matches!(self.tree.kind(container), NodeKind::Paragraph)
            || (!self.all_closed
                && !self.blank
                && matches!(self.tree.kind(self.tip), NodeKind::Paragraph));
        let Some(block_type) = html::block_start(self.rest(), interrupts_paragraph) else {
            return BlockStart::NoMatch;
        };
        self.close_unmatched_blocks();
        // Leading spaces belong to the block
        self.add_child(
            NodeKind::HtmlBlock {
                block_type,
                literal: String::new(),
            },
            self.offset,
        );
        BlockStart::Leaf
    }

    fn start_setext_heading(&mut self, container: NodeId) -> BlockStart {
        if self.indented || !matches!(self.tree.kind(container), NodeKind::Paragraph) {
            return BlockStart::NoMatch;
        }
        let Some(level) = setext_level(self.rest(), self.options.editor_caret) else {
            return BlockStart::NoMatch;
        };

        // A delimiter row under a paragraph may complete a table instead
        if self.options.gfm_table
            && let Some(table) = parse_table(&self.tree[container].content)
        {
            self.convert_to_table(container, table);
            return BlockStart::NoMatch;
        }

        self.close_unmatched_blocks();
        let mut content = std::mem::take(&mut self.tree[container].content);
        let mut consumed = 0;
        while content[consumed..].starts_with('[') {
            let Some((label, reference, used)) = parse_reference_definition(&content[consumed..])
            else {
                break;
            };
            self.link_refs.entry(label).or_insert(reference);
            consumed += used;
        }
        content.drain(..consumed);

        if trim_content(&content).is_empty() {
            self.tree[container].content = content;
            return BlockStart::NoMatch;
        }

        let span = self.tree[container].span;
        let start_line = self.tree[container].start_line;
        let heading = self.tree.create(
            NodeKind::Heading {
                level,
                setext: true,
                id: None,
            },
            span,
        );
        {
            let node = &mut self.tree[heading];
            node.open = true;
            node.start_line = start_line;
            node.content = trim_content(&content).to_string();
        }
        self.tree.insert_after(container, heading);
        self.tree.unlink(container);
        self.tip = heading;
        self.advance_to_end();
        BlockStart::Leaf
    }

    fn start_thematic_break(&mut self) -> BlockStart {
        if self.indented || !is_thematic_break(self.rest(), self.options.editor_caret) {
            return BlockStart::NoMatch;
        }
        self.close_unmatched_blocks();
        self.add_child(NodeKind::ThematicBreak, self.next_nonspace);
        self.advance_to_end();
        BlockStart::Leaf
    }

    fn start_list_item(&mut self, container: NodeId) -> BlockStart {
        let container_is_list = matches!(self.tree.kind(container), NodeKind::List(_));
        if self.indented && !container_is_list {
            return BlockStart::NoMatch;
        }
        let Some(data) = self.parse_list_marker(container) else {
            return BlockStart::NoMatch;
        };
        self.close_unmatched_blocks();

        let continues_list = match self.tree.kind(self.tip) {
            NodeKind::List(list) => list.matches(&data),
            _ => false,
        };
        if !continues_list {
            self.add_child(NodeKind::List(data.clone()), self.next_nonspace);
        }
        self.add_child(NodeKind::Item(data), self.next_nonspace);
        BlockStart::Container
    }

    /// Parse a list marker at the next non-space position, consuming it and
    /// the spaces after it on success
    fn parse_list_marker(&mut self, container: NodeId) -> Option<ListData> {
        if self.indent >= 4 {
            return None;
        }
        let rest = self.rest().as_bytes();
        let in_paragraph = matches!(self.tree.kind(container), NodeKind::Paragraph);

        let first = *rest.first()?;
        let (mut data, marker_len) = if matches!(first, b'*' | b'+' | b'-') {
            (
                ListData {
                    list_type: ListType::Unordered,
                    bullet_char: Some(first as char),
                    delimiter: None,
                    start: 1,
                    tight: true,
                    checked: false,
                    marker_offset: self.indent,
                    padding: 0,
                },
                1,
            )
        } else {
            let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
            if digits == 0 || digits > 9 {
                return None;
            }
            let delimiter = *rest.get(digits)?;
            if delimiter != b'.' && delimiter != b')' {
                return None;
            }
            let start: u32 = std::str::from_utf8(&rest[..digits]).ok()?.parse().ok()?;
            if in_paragraph && start != 1 {
                return None;
            }
            (
                ListData {
                    list_type: ListType::Ordered,
                    bullet_char: None,
                    delimiter: Some(delimiter as char),
                    start,
                    tight: true,
                    checked: false,
                    marker_offset: self.indent,
                    padding: 0,
                },
                digits + 1,
            )
        };

        let after = rest.get(marker_len).copied();
        if !(is_line_end(after) || is_space_or_tab(after)) {
            return None;
        }
        // An empty item cannot interrupt a paragraph
        if in_paragraph && rest[marker_len..].iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }

        self.advance_next_nonspace();
        self.advance_offset(marker_len, true);
        let spaces_start_column = self.column;
        let spaces_start_offset = self.offset;
        loop {
            self.advance_offset(1, true);
            if !(self.column - spaces_start_column < 5 && is_space_or_tab(self.peek(self.offset))) {
                break;
            }
        }
        let blank_item = is_line_end(self.peek(self.offset));
        let spaces_after_marker = self.column - spaces_start_column;
        if spaces_after_marker >= 5 || spaces_after_marker < 1 || blank_item {
            data.padding = marker_len + 1;
            self.column = spaces_start_column;
            self.offset = spaces_start_offset;
            if is_space_or_tab(self.peek(self.offset)) {
                self.advance_offset(1, true);
            }
        } else {
            data.padding = marker_len + spaces_after_marker;
        }

        if self.options.gfm_task_list_item {
            let content = &self.line.as_bytes()[self.offset.min(self.line.len())..];
            if content.len() >= 3 && matches!(&content[..3], b"[ ]" | b"[x]" | b"[X]") {
                data.list_type = ListType::Task;
            }
        }
        Some(data)
    }

    fn start_math_block(&mut self) -> BlockStart {
        if !self.options.math_block || self.indented || !math_fence(self.rest()) {
            return BlockStart::NoMatch;
        }
        self.close_unmatched_blocks();
        let offset = self.indent;
        let block = self.add_child(
            NodeKind::MathBlock {
                literal: String::new(),
            },
            self.next_nonspace,
        );
        self.math_offsets.insert(block, offset);
        self.advance_next_nonspace();
        BlockStart::Leaf
    }

    fn start_indented_code(&mut self) -> BlockStart {
        if !self.indented
            || self.blank
            || matches!(self.tree.kind(self.tip), NodeKind::Paragraph)
        {
            return BlockStart::NoMatch;
        }
        self.advance_offset(4, true);
        self.close_unmatched_blocks();
        self.add_child(
            NodeKind::CodeBlock(CodeBlockData {
                fenced: false,
                fence_char: None,
                fence_length: 0,
                fence_offset: 0,
                info: String::new(),
                literal: String::new(),
            }),
            self.offset,
        );
        BlockStart::Leaf
    }

    fn start_footnote_definition(&mut self) -> BlockStart {
        if !self.options.footnotes || self.indented {
            return BlockStart::NoMatch;
        }
        let Some((label, marker_len)) = footnote_label(self.rest()) else {
            return BlockStart::NoMatch;
        };
        let label = label.to_string();
        let next_index = self.footnotes.len() + 1;
        let index = *self
            .footnotes
            .entry(normalize_label(&label))
            .or_insert(next_index);

        self.advance_next_nonspace();
        self.advance_offset(marker_len, true);
        self.close_unmatched_blocks();
        self.add_child(NodeKind::FootnoteDefinition { label, index }, self.next_nonspace);
        BlockStart::Container
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("# foo", Some(1))]
    #[case("###### foo", Some(6))]
    #[case("####### foo", None)]
    #[case("#5 bolt", None)]
    #[case("#", Some(1))]
    #[case("#\tfoo", Some(1))]
    fn test_atx_marker(#[case] line: &str, #[case] expected: Option<usize>) {
        assert_eq!(atx_marker(line), expected);
    }

    #[rstest]
    #[case(" foo ##  \n", "foo")]
    #[case(" foo#\n", "foo#")]
    #[case(" ###\n", "")]
    #[case(" foo \\###\n", "foo \\###")]
    #[case("\n", "")]
    fn test_atx_content(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(atx_content(raw), expected);
    }

    #[test]
    fn test_heading_id() {
        assert_eq!(heading_id("Intro {#intro}"), ("Intro", Some("#intro".to_string())));
        assert_eq!(heading_id("Intro {custom-id}"), ("Intro", Some("custom-id".to_string())));
        assert_eq!(heading_id("{only}"), ("{only}", None));
        assert_eq!(heading_id("a {b c}"), ("a {b c}", None));
    }

    #[test]
    fn test_code_fence() {
        assert_eq!(code_fence("```rust\n"), Some((b'`', 3)));
        assert_eq!(code_fence("~~~~ a`b\n"), Some((b'~', 4)));
        assert_eq!(code_fence("``` a`b\n"), None);
        assert_eq!(code_fence("``\n"), None);
    }

    #[test]
    fn test_thematic_break() {
        assert!(is_thematic_break("***\n", false));
        assert!(is_thematic_break("- - -\n", false));
        assert!(is_thematic_break("_____________________________________\n", false));
        assert!(!is_thematic_break("--\n", false));
        assert!(!is_thematic_break("*-*\n", false));
        assert!(!is_thematic_break("---a\n", false));
        assert!(is_thematic_break("--\u{2038}-\n", true));
        assert!(!is_thematic_break("--\u{2038}-\n", false));
    }

    #[test]
    fn test_setext_level() {
        assert_eq!(setext_level("===\n", false), Some(1));
        assert_eq!(setext_level("-   \n", false), Some(2));
        assert_eq!(setext_level("= =\n", false), None);
        assert_eq!(setext_level("--\u{2038}\n", true), Some(2));
    }

    #[test]
    fn test_footnote_label() {
        assert_eq!(footnote_label("[^note]: text"), Some(("note", 8)));
        assert_eq!(footnote_label("[^]: text"), None);
        assert_eq!(footnote_label("[^a b]: text"), None);
        assert_eq!(footnote_label("[^note] text"), None);
    }
}
