/// Inline resolution: one scan over a leaf block's content plus the
/// delimiter and bracket stacks
use super::autolink;
use super::delimiters::{Delimiter, DelimiterStack, scan_delimiters};
use super::emoji;
use super::entities::{is_ascii_punctuation, parse_entity};
use super::html::HtmlScanner;
use super::links::{
    LinkRefMap, MAX_LABEL_LENGTH, normalize_label, normalize_uri, scan_link_destination,
    scan_link_label, scan_link_title, skip_spnl,
};
use crate::ast::{NodeId, NodeKind, Span, Tree, WalkStatus};
use crate::options::Options;
use std::collections::HashMap;

/// Frozen state shared by every inline resolution of one document
pub(crate) struct InlineContext<'a> {
    pub options: &'a Options,
    pub link_refs: &'a LinkRefMap,
    /// Normalized footnote label to its 1-based number
    pub footnotes: &'a HashMap<String, usize>,
}

/// Resolve `content` into a fragment tree whose root children are the
/// inline nodes of the block
pub(crate) fn resolve(content: &str, ctx: &InlineContext<'_>) -> Tree {
    let mut parser = InlineParser::new(content, ctx);
    parser.parse();
    parser.tree
}

#[derive(Debug, Clone)]
struct Bracket {
    node: NodeId,
    /// Position right after `[` or `![`
    index: usize,
    image: bool,
    active: bool,
    bracket_after: bool,
    previous_delimiter: Option<usize>,
    previous: Option<usize>,
}

struct InlineParser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    ctx: &'a InlineContext<'a>,
    markers: [bool; 256],
    tree: Tree,
    root: NodeId,
    delimiters: DelimiterStack,
    brackets: Vec<Bracket>,
    bracket_top: Option<usize>,
    html: HtmlScanner,
    /// Start of the last backtick run seen, per run length
    backtick_runs: HashMap<usize, usize>,
    /// Every backtick run up to the end of the text is in `backtick_runs`
    backticks_scanned: bool,
    /// No `$` closes inline math from this offset on
    math_absent_from: Option<usize>,
}

impl<'a> InlineParser<'a> {
    fn new(text: &'a str, ctx: &'a InlineContext<'a>) -> Self {
        let tree = Tree::new(NodeKind::Paragraph);
        let root = tree.root();
        InlineParser {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            ctx,
            markers: ctx.options.inline_markers(),
            tree,
            root,
            delimiters: DelimiterStack::default(),
            brackets: Vec::new(),
            bracket_top: None,
            html: HtmlScanner::default(),
            backtick_runs: HashMap::new(),
            backticks_scanned: false,
            math_absent_from: None,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn append(&mut self, kind: NodeKind, start: usize, end: usize) -> NodeId {
        let node = self.tree.create(kind, Span::new(start, end));
        self.tree.append_child(self.root, node);
        node
    }

    fn append_text(&mut self, start: usize, end: usize) -> NodeId {
        let literal = self.text[start..end].to_string();
        self.append(NodeKind::text(literal), start, end)
    }

    fn parse(&mut self) {
        while self.pos < self.bytes.len() {
            self.parse_inline();
        }
        self.delimiters.process_emphasis(&mut self.tree, None);
        merge_text(&mut self.tree, self.root);
        if self.ctx.options.gfm_autolink {
            self.extended_autolinks();
        }
        if self.ctx.options.emoji {
            self.emoji();
        }
    }

    fn parse_inline(&mut self) {
        let start = self.pos;
        let Some(b) = self.peek() else { return };
        match b {
            b'\n' => self.handle_newline(),
            b'\\' => self.handle_backslash(),
            b'`' => self.handle_backticks(),
            b'*' | b'_' => self.handle_delimiter(b),
            b'~' if self.ctx.options.gfm_strikethrough => self.handle_delimiter(b),
            b'[' => {
                self.pos += 1;
                let node = self.append_text(start, self.pos);
                self.push_bracket(node, self.pos, false);
            }
            b'!' if self.peek_at(1) == Some(b'[') => {
                self.pos += 2;
                let node = self.append_text(start, self.pos);
                self.push_bracket(node, self.pos, true);
            }
            b']' => self.handle_close_bracket(),
            b'<' => self.handle_angle(),
            b'&' => self.handle_entity(),
            b'$' if self.ctx.options.inline_math => self.handle_math(),
            _ => {
                self.pos += 1;
                while let Some(b) = self.peek() {
                    if self.markers[b as usize] {
                        break;
                    }
                    self.pos += 1;
                }
                self.append_text(start, self.pos);
            }
        }
    }

    fn skip_line_indent(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn handle_newline(&mut self) {
        let start = self.pos;
        self.pos += 1;
        let mut hard = false;
        if let Some(last) = self.tree[self.root].last_child()
            && let NodeKind::Text { literal } = &mut self.tree[last].kind
            && literal.ends_with(' ')
        {
            let trimmed = literal.trim_end_matches(' ').len();
            hard = literal.len() - trimmed >= 2;
            let removed = literal.len() - trimmed;
            literal.truncate(trimmed);
            let span = &mut self.tree[last].span;
            span.end = span.end.saturating_sub(removed).max(span.start);
        }
        let kind = if hard {
            NodeKind::HardBreak
        } else {
            NodeKind::SoftBreak
        };
        self.append(kind, start, self.pos);
        self.skip_line_indent();
    }

    fn handle_backslash(&mut self) {
        let start = self.pos;
        self.pos += 1;
        match self.peek() {
            Some(b'\n') => {
                self.pos += 1;
                self.append(NodeKind::HardBreak, start, self.pos);
                self.skip_line_indent();
            }
            Some(b) if is_ascii_punctuation(b) => {
                self.pos += 1;
                self.append(NodeKind::text((b as char).to_string()), start, self.pos);
            }
            _ => {
                self.append_text(start, self.pos);
            }
        }
    }

    fn handle_backticks(&mut self) {
        let start = self.pos;
        let ticks = self.run_length(b'`');
        let after_open = start + ticks;
        let closer_ahead = !self.backticks_scanned
            || self
                .backtick_runs
                .get(&ticks)
                .is_some_and(|&last| last > start);
        let mut i = if closer_ahead { after_open } else { self.bytes.len() };
        while i < self.bytes.len() {
            if self.bytes[i] != b'`' {
                i += 1;
                continue;
            }
            let run_start = i;
            while i < self.bytes.len() && self.bytes[i] == b'`' {
                i += 1;
            }
            let last = self.backtick_runs.entry(i - run_start).or_insert(run_start);
            *last = (*last).max(run_start);
            if i - run_start == ticks {
                let literal = code_span_literal(&self.text[after_open..run_start]);
                self.pos = i;
                self.append(NodeKind::Code { literal }, start, i);
                return;
            }
        }
        // No matching run: the backticks are literal
        self.backticks_scanned = true;
        self.pos = after_open;
        self.append_text(start, after_open);
    }

    fn run_length(&self, b: u8) -> usize {
        self.bytes[self.pos..]
            .iter()
            .take_while(|&&c| c == b)
            .count()
    }

    fn handle_delimiter(&mut self, b: u8) {
        let start = self.pos;
        let mut run = scan_delimiters(self.text, start, b, self.ctx.options.editor_caret);
        if b == b'~' && run.length > 2 {
            run.can_open = false;
            run.can_close = false;
        }
        self.pos += run.length;
        let node = self.append_text(start, self.pos);
        if run.can_open || run.can_close {
            self.delimiters.push(Delimiter::new(node, b, run));
        }
    }

    fn push_bracket(&mut self, node: NodeId, index: usize, image: bool) {
        if let Some(top) = self.bracket_top {
            self.brackets[top].bracket_after = true;
        }
        self.brackets.push(Bracket {
            node,
            index,
            image,
            active: true,
            bracket_after: false,
            previous_delimiter: self.delimiters.top(),
            previous: self.bracket_top,
        });
        self.bracket_top = Some(self.brackets.len() - 1);
    }

    fn pop_bracket(&mut self) {
        if let Some(top) = self.bracket_top {
            self.bracket_top = self.brackets[top].previous;
        }
    }

    /// Try `(dest "title")` right after the closing bracket
    fn inline_link_tail(&self, pos: usize) -> Option<(String, Option<String>, usize)> {
        if self.bytes.get(pos) != Some(&b'(') {
            return None;
        }
        let dest_start = skip_spnl(self.bytes, pos + 1);
        let (destination, after_dest) = scan_link_destination(self.text, dest_start)?;
        let before_title = skip_spnl(self.bytes, after_dest);
        let (title, after) = match scan_link_title(self.text, before_title) {
            Some((title, end)) if before_title != after_dest => {
                (Some(title), skip_spnl(self.bytes, end))
            }
            _ => (None, before_title),
        };
        (self.bytes.get(after) == Some(&b')')).then_some((destination, title, after + 1))
    }

    fn handle_close_bracket(&mut self) {
        let text = self.text;
        let close_pos = self.pos;
        self.pos += 1;
        let after_bracket = self.pos;

        let Some(opener_index) = self.bracket_top else {
            self.append_text(close_pos, after_bracket);
            return;
        };
        let opener = self.brackets[opener_index].clone();
        if !opener.active {
            self.pop_bracket();
            self.append_text(close_pos, after_bracket);
            return;
        }

        let mut target = None;
        if let Some((destination, title, end)) = self.inline_link_tail(after_bracket) {
            target = Some((destination, title));
            self.pos = end;
        } else {
            let opener_text = &text[opener.index..close_pos];
            let label_end = scan_link_label(self.bytes, after_bracket);
            let reference_label = match label_end {
                Some(end) if end - after_bracket > 2 => {
                    Some(&text[after_bracket + 1..end - 1])
                }
                _ if !opener.bracket_after => Some(opener_text),
                _ => None,
            }
            .filter(|label| label.len() <= MAX_LABEL_LENGTH);

            if self.ctx.options.footnotes
                && !opener.image
                && label_end.is_none()
                && opener_text.len() <= MAX_LABEL_LENGTH
                && let Some(label) = opener_text.strip_prefix('^')
                && let Some(&index) = self.ctx.footnotes.get(&normalize_label(label))
            {
                self.close_footnote_reference(&opener, label, index);
                return;
            }

            if let Some(label) = reference_label
                && let Some(reference) = self.ctx.link_refs.get(&normalize_label(label))
            {
                target = Some((reference.destination.clone(), reference.title.clone()));
                self.pos = label_end.unwrap_or(after_bracket);
            }
        }

        let Some((destination, title)) = target else {
            self.pop_bracket();
            self.pos = after_bracket;
            self.append_text(close_pos, after_bracket);
            return;
        };

        let kind = if opener.image {
            NodeKind::Image { destination, title }
        } else {
            NodeKind::Link {
                destination,
                title,
                autolink: false,
            }
        };
        let start = self.tree[opener.node].span.start;
        let link = self.tree.create(kind, Span::new(start, self.pos));
        let mut child = self.tree[opener.node].next();
        while let Some(node) = child {
            child = self.tree[node].next();
            self.tree.unlink(node);
            self.tree.append_child(link, node);
        }
        self.tree.append_child(self.root, link);
        self.delimiters
            .process_emphasis(&mut self.tree, opener.previous_delimiter);
        self.pop_bracket();
        self.tree.unlink(opener.node);

        // Links may not contain other links
        if !opener.image {
            let mut bracket = self.bracket_top;
            while let Some(b) = bracket {
                if !self.brackets[b].image {
                    // Everything below was deactivated by an earlier link
                    if !self.brackets[b].active {
                        break;
                    }
                    self.brackets[b].active = false;
                }
                bracket = self.brackets[b].previous;
            }
        }
    }

    fn close_footnote_reference(&mut self, opener: &Bracket, label: &str, index: usize) {
        self.delimiters
            .process_emphasis(&mut self.tree, opener.previous_delimiter);
        let mut child = self.tree[opener.node].next();
        while let Some(node) = child {
            child = self.tree[node].next();
            self.tree.unlink(node);
        }
        let start = self.tree[opener.node].span.start;
        self.tree.unlink(opener.node);
        self.pop_bracket();
        self.append(
            NodeKind::FootnoteReference {
                label: label.to_string(),
                index,
            },
            start,
            self.pos,
        );
    }

    fn handle_angle(&mut self) {
        let start = self.pos;
        if let Some((kind, end)) = self.autolink(start) {
            let literal = self.text[start + 1..end - 1].to_string();
            let link = self.append(kind, start, end);
            let text = self
                .tree
                .create(NodeKind::text(literal), Span::new(start + 1, end - 1));
            self.tree.append_child(link, text);
            self.pos = end;
            return;
        }
        if let Some(end) = self.html.scan(self.bytes, start) {
            let literal = self.text[start..end].to_string();
            self.append(NodeKind::HtmlInline { literal }, start, end);
            self.pos = end;
            return;
        }
        self.pos += 1;
        self.append_text(start, self.pos);
    }

    /// `<scheme:...>` or `<local@domain>`
    fn autolink(&self, start: usize) -> Option<(NodeKind, usize)> {
        let close = self.bytes[start + 1..]
            .iter()
            .position(|&b| b == b'>' || b == b'<' || b.is_ascii_whitespace() || b.is_ascii_control())
            .map(|p| start + 1 + p)?;
        if self.bytes[close] != b'>' {
            return None;
        }
        let content = &self.text[start + 1..close];
        let destination = if is_absolute_uri(content) {
            normalize_uri(content)
        } else if is_email_address(content) {
            format!("mailto:{}", content)
        } else {
            return None;
        };
        Some((
            NodeKind::Link {
                destination,
                title: None,
                autolink: true,
            },
            close + 1,
        ))
    }

    fn handle_entity(&mut self) {
        let start = self.pos;
        match parse_entity(self.text, start) {
            Some((decoded, end)) => {
                self.pos = end;
                self.append(NodeKind::text(decoded), start, end);
            }
            None => {
                self.pos += 1;
                self.append_text(start, self.pos);
            }
        }
    }

    /// `$...$` and `$$...$$` math spans
    fn handle_math(&mut self) {
        let text = self.text;
        let start = self.pos;
        let dollars = self.run_length(b'$');
        if dollars >= 2 {
            let open_end = start + 2;
            if let Some(offset) = text[open_end..].find("$$") {
                let literal = text[open_end..open_end + offset].trim();
                if !literal.is_empty() {
                    let end = open_end + offset + 2;
                    self.pos = end;
                    let literal = literal.to_string();
                    self.append(NodeKind::InlineMath { literal }, start, end);
                    return;
                }
            }
            self.pos = start + dollars;
            self.append_text(start, self.pos);
            return;
        }

        let content_start = start + 1;
        let opens = text[content_start..]
            .chars()
            .next()
            .is_some_and(|c| !c.is_whitespace() && !c.is_ascii_digit())
            && self
                .math_absent_from
                .is_none_or(|absent| content_start < absent);
        if opens {
            let mut i = content_start;
            while i < self.bytes.len() {
                match self.bytes[i] {
                    b'\\' => i += 2,
                    b'$' => {
                        let before = self.bytes[i - 1];
                        let after_digit = self.bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit());
                        if !before.is_ascii_whitespace() && !after_digit && i > content_start {
                            let literal = text[content_start..i].to_string();
                            self.pos = i + 1;
                            self.append(NodeKind::InlineMath { literal }, start, self.pos);
                            return;
                        }
                        i += 1;
                    }
                    _ => i += 1,
                }
            }
            self.math_absent_from = Some(content_start);
        }
        self.pos += 1;
        self.append_text(start, self.pos);
    }

    /// Text nodes that sit outside links, in document order
    fn plain_text_nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        self.tree.walk(self.root, |tree, id, entering| {
            if !entering {
                return WalkStatus::Continue;
            }
            match tree.kind(id) {
                NodeKind::Link { .. } | NodeKind::Image { .. } => WalkStatus::SkipChildren,
                NodeKind::Text { .. } => {
                    nodes.push(id);
                    WalkStatus::Continue
                }
                _ => WalkStatus::Continue,
            }
        });
        nodes
    }

    fn extended_autolinks(&mut self) {
        for id in self.plain_text_nodes() {
            let NodeKind::Text { literal } = self.tree.kind(id) else {
                continue;
            };
            let segments = autolink::split(literal, &self.ctx.options.domain_suffixes);
            if !segments
                .iter()
                .any(|s| matches!(s, autolink::Segment::Link { .. }))
            {
                continue;
            }
            let span = self.tree[id].span;
            let mut offset = span.start;
            for segment in segments {
                let new = match segment {
                    autolink::Segment::Text(text) => {
                        let end = (offset + text.len()).min(span.end);
                        let node = self.tree.create(NodeKind::text(text), Span::new(offset, end));
                        offset = end;
                        node
                    }
                    autolink::Segment::Link { destination, text } => {
                        let end = (offset + text.len()).min(span.end);
                        let link = self.tree.create(
                            NodeKind::Link {
                                destination,
                                title: None,
                                autolink: true,
                            },
                            Span::new(offset, end),
                        );
                        let inner = self.tree.create(NodeKind::text(text), Span::new(offset, end));
                        self.tree.append_child(link, inner);
                        offset = end;
                        link
                    }
                };
                self.tree.insert_before(id, new);
            }
            self.tree.unlink(id);
        }
    }

    fn emoji(&mut self) {
        for id in self.plain_text_nodes() {
            let NodeKind::Text { literal } = self.tree.kind(id) else {
                continue;
            };
            let segments = emoji::split(literal, &self.ctx.options.emoji_table);
            if !segments
                .iter()
                .any(|s| matches!(s, emoji::Segment::Emoji { .. }))
            {
                continue;
            }
            let span = self.tree[id].span;
            let mut offset = span.start;
            for segment in segments {
                let (kind, len) = match segment {
                    emoji::Segment::Text(text) => {
                        let len = text.len();
                        (NodeKind::text(text), len)
                    }
                    emoji::Segment::Emoji { alias, literal } => {
                        let len = alias.len() + 2;
                        (NodeKind::Emoji { alias, literal }, len)
                    }
                };
                let end = (offset + len).min(span.end);
                let node = self.tree.create(kind, Span::new(offset, end));
                self.tree.insert_before(id, node);
                offset = end;
            }
            self.tree.unlink(id);
        }
    }
}

/// Normalize code span content: line endings become spaces and one
/// surrounding space is stripped when both sides have one
fn code_span_literal(raw: &str) -> String {
    let literal = raw.replace('\n', " ");
    let bytes = literal.as_bytes();
    if bytes.len() >= 2
        && bytes[0] == b' '
        && bytes[bytes.len() - 1] == b' '
        && !bytes.iter().all(|&b| b == b' ')
    {
        literal[1..literal.len() - 1].to_string()
    } else {
        literal
    }
}

/// Scheme of 2 to 32 characters followed by `:` and no spaces or angle brackets
fn is_absolute_uri(text: &str) -> bool {
    let Some(colon) = text.find(':') else {
        return false;
    };
    let scheme = &text[..colon];
    if scheme.len() < 2 || scheme.len() > 32 {
        return false;
    }
    let mut chars = scheme.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

fn is_email_address(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    if local.is_empty()
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~-".contains(c))
    {
        return false;
    }
    !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Join adjacent text nodes and drop empty ones, in `parent` and every
/// container below it
pub(crate) fn merge_text(tree: &mut Tree, parent: NodeId) {
    let mut pending = vec![parent];
    while let Some(parent) = pending.pop() {
        let mut child = tree[parent].first_child();
        while let Some(id) = child {
            child = tree[id].next();
            if !matches!(tree.kind(id), NodeKind::Text { .. }) {
                if tree[id].first_child().is_some() {
                    pending.push(id);
                }
                continue;
            }
            while let Some(next) = child
                && let NodeKind::Text { literal } = tree.kind(next)
            {
                let literal = literal.clone();
                let end = tree[next].span.end;
                if let NodeKind::Text { literal: first } = &mut tree[id].kind {
                    first.push_str(&literal);
                }
                tree[id].span.end = end;
                child = tree[next].next();
                tree.unlink(next);
            }
            if matches!(tree.kind(id), NodeKind::Text { literal } if literal.is_empty()) {
                tree.unlink(id);
            }
        }
    }
}
