/// Block structure: the per-line container matching loop and the four
/// node contracts (continue, finalize, accepts_lines, can_contain)
use super::block_starts::{BlockStart, START_ORDER};
use super::html;
use super::links::{LinkRefMap, parse_reference_definition};
use super::table::{TableParse, find_table};
use crate::ast::{ListType, NodeId, NodeKind, Span, Tree};
use crate::lexer::{Line, Lines};
use crate::options::Options;
use std::collections::HashMap;
use tracing::{debug, trace};

const CODE_INDENT: usize = 4;

/// Result of asking an open container whether the current line continues it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContinueResult {
    Matched,
    Failed,
    /// The line closed the block (fenced code or math); nothing else to do
    Done,
}

/// Everything the block phase hands to inline resolution
pub(crate) struct BlockOutput {
    pub tree: Tree,
    pub link_refs: LinkRefMap,
    pub footnotes: HashMap<String, usize>,
}

impl NodeKind {
    /// Leaf blocks that take raw lines as content
    pub(crate) fn accepts_lines(&self) -> bool {
        matches!(
            self,
            NodeKind::Paragraph
                | NodeKind::CodeBlock(_)
                | NodeKind::HtmlBlock { .. }
                | NodeKind::MathBlock { .. }
        )
    }

    pub(crate) fn can_contain(&self, child: &NodeKind) -> bool {
        match self {
            NodeKind::Document | NodeKind::BlockQuote | NodeKind::Item(_) => {
                !matches!(child, NodeKind::Item(_))
            }
            NodeKind::FootnoteDefinition { .. } => !matches!(
                child,
                NodeKind::Item(_) | NodeKind::FootnoteDefinition { .. }
            ),
            NodeKind::List(_) => matches!(child, NodeKind::Item(_)),
            _ => false,
        }
    }
}

pub(crate) struct BlockParser<'a> {
    pub(super) options: &'a Options,
    markers: [bool; 256],
    pub(super) tree: Tree,
    pub(super) tip: NodeId,
    old_tip: NodeId,
    last_matched_container: NodeId,
    pub(super) line: &'a str,
    line_start: usize,
    line_ends: Vec<usize>,
    pub(super) line_number: usize,
    pub(super) offset: usize,
    pub(super) column: usize,
    pub(super) next_nonspace: usize,
    next_nonspace_column: usize,
    pub(super) indent: usize,
    pub(super) indented: bool,
    pub(super) blank: bool,
    partially_consumed_tab: bool,
    pub(super) all_closed: bool,
    pub(super) link_refs: LinkRefMap,
    pub(super) footnotes: HashMap<String, usize>,
    /// Indentation of each open math block's `$$` opener
    pub(super) math_offsets: HashMap<NodeId, usize>,
}

impl<'a> BlockParser<'a> {
    pub fn new(options: &'a Options) -> Self {
        let tree = Tree::new(NodeKind::Document);
        let root = tree.root();
        BlockParser {
            options,
            markers: options.block_start_markers(),
            tree,
            tip: root,
            old_tip: root,
            last_matched_container: root,
            line: "",
            line_start: 0,
            line_ends: Vec::new(),
            line_number: 0,
            offset: 0,
            column: 0,
            next_nonspace: 0,
            next_nonspace_column: 0,
            indent: 0,
            indented: false,
            blank: false,
            partially_consumed_tab: false,
            all_closed: true,
            link_refs: LinkRefMap::new(),
            footnotes: HashMap::new(),
            math_offsets: HashMap::new(),
        }
    }

    /// Build the block tree from normalized input
    pub fn run(mut self, input: &'a str) -> BlockOutput {
        for line in Lines::new(input) {
            self.incorporate_line(line);
        }
        let root = self.tree.root();
        loop {
            let tip = self.tip;
            self.finalize(tip, self.line_number);
            if tip == root {
                break;
            }
        }
        debug!(
            lines = self.line_number,
            link_refs = self.link_refs.len(),
            footnotes = self.footnotes.len(),
            "block structure built"
        );
        BlockOutput {
            tree: self.tree,
            link_refs: self.link_refs,
            footnotes: self.footnotes,
        }
    }

    pub(super) fn peek(&self, pos: usize) -> Option<u8> {
        self.line.as_bytes().get(pos).copied()
    }

    pub(super) fn rest(&self) -> &'a str {
        &self.line[self.next_nonspace..]
    }

    pub(super) fn find_next_nonspace(&mut self) {
        let bytes = self.line.as_bytes();
        let mut i = self.offset;
        let mut cols = self.column;
        while let Some(&c) = bytes.get(i) {
            match c {
                b' ' => {
                    i += 1;
                    cols += 1;
                }
                b'\t' => {
                    i += 1;
                    cols += 4 - (cols % 4);
                }
                _ => break,
            }
        }
        self.blank = matches!(bytes.get(i), None | Some(b'\n'));
        self.next_nonspace = i;
        self.next_nonspace_column = cols;
        self.indent = cols - self.column;
        self.indented = self.indent >= CODE_INDENT;
    }

    pub(super) fn advance_next_nonspace(&mut self) {
        self.offset = self.next_nonspace;
        self.column = self.next_nonspace_column;
        self.partially_consumed_tab = false;
    }

    /// Advance by `count` bytes, or by `count` columns when `columns` is set,
    /// in which case a tab may be consumed only partially
    pub(super) fn advance_offset(&mut self, mut count: usize, columns: bool) {
        let bytes = self.line.as_bytes();
        while count > 0
            && let Some(&c) = bytes.get(self.offset)
            && c != b'\n'
        {
            if c == b'\t' {
                let chars_to_tab = 4 - (self.column % 4);
                if columns {
                    self.partially_consumed_tab = chars_to_tab > count;
                    let chars_to_advance = chars_to_tab.min(count);
                    self.column += chars_to_advance;
                    if !self.partially_consumed_tab {
                        self.offset += 1;
                    }
                    count -= chars_to_advance;
                } else {
                    self.partially_consumed_tab = false;
                    self.column += chars_to_tab;
                    self.offset += 1;
                    count -= 1;
                }
            } else {
                self.partially_consumed_tab = false;
                self.offset += 1;
                self.column += 1;
                count -= 1;
            }
        }
    }

    /// Move to the end of the line
    pub(super) fn advance_to_end(&mut self) {
        self.advance_offset(self.line.len().saturating_sub(self.offset), false);
    }

    fn add_line(&mut self) {
        let tip = self.tip;
        if self.partially_consumed_tab {
            // Skip the tab and keep the columns it still owes as spaces
            self.offset += 1;
            let chars_to_tab = 4 - (self.column % 4);
            self.tree[tip].content.push_str(&" ".repeat(chars_to_tab));
        }
        let rest = &self.line[self.offset.min(self.line.len())..];
        self.tree[tip].content.push_str(rest);
    }

    /// Add a child block to the tip, closing blocks that cannot hold it
    pub(super) fn add_child(&mut self, kind: NodeKind, offset: usize) -> NodeId {
        while !self.tree.kind(self.tip).can_contain(&kind) {
            let tip = self.tip;
            self.finalize(tip, self.line_number.saturating_sub(1));
        }
        trace!(kind = kind.name(), line = self.line_number, "open block");
        let start = self.line_start + offset.min(self.line.len());
        let node = self.tree.create(kind, Span::new(start, start));
        {
            let n = &mut self.tree[node];
            n.open = true;
            n.start_line = self.line_number;
            n.end_line = self.line_number;
        }
        self.tree.append_child(self.tip, node);
        self.tip = node;
        node
    }

    pub(super) fn close_unmatched_blocks(&mut self) {
        if self.all_closed {
            return;
        }
        while self.old_tip != self.last_matched_container {
            let Some(parent) = self.tree.parent(self.old_tip) else {
                break;
            };
            let old_tip = self.old_tip;
            self.finalize(old_tip, self.line_number.saturating_sub(1));
            self.old_tip = parent;
        }
        self.all_closed = true;
    }

    fn incorporate_line(&mut self, line: Line<'a>) {
        self.line = line.text;
        self.line_start = line.start;
        self.line_ends.push(line.start + line.text.len());
        self.line_number += 1;
        self.offset = 0;
        self.column = 0;
        self.blank = false;
        self.partially_consumed_tab = false;
        self.old_tip = self.tip;

        // Descend through the open containers
        let mut container = self.tree.root();
        while let Some(last) = self.tree[container].last_child()
            && self.tree[last].open
        {
            container = last;
            self.find_next_nonspace();
            match self.continue_block(container) {
                ContinueResult::Matched => {}
                ContinueResult::Failed => {
                    container = self.tree.parent(container).unwrap_or(container);
                    break;
                }
                ContinueResult::Done => return,
            }
        }

        self.all_closed = container == self.old_tip;
        self.last_matched_container = container;

        // Open new blocks
        let mut matched_leaf = {
            let kind = self.tree.kind(container);
            !matches!(kind, NodeKind::Paragraph) && kind.accepts_lines()
        };
        while !matched_leaf {
            self.find_next_nonspace();
            let lead = self.peek(self.next_nonspace).unwrap_or(b'\n');
            if !self.indented && !self.markers[lead as usize] {
                self.advance_next_nonspace();
                break;
            }
            let opened = START_ORDER
                .iter()
                .map(|&start| self.try_start(start, container))
                .find(|result| *result != BlockStart::NoMatch)
                .unwrap_or(BlockStart::NoMatch);
            match opened {
                BlockStart::Container => container = self.tip,
                BlockStart::Leaf => {
                    container = self.tip;
                    matched_leaf = true;
                }
                BlockStart::NoMatch => {
                    self.advance_next_nonspace();
                    break;
                }
            }
        }

        // Lazy paragraph continuation
        if !self.all_closed && !self.blank && matches!(self.tree.kind(self.tip), NodeKind::Paragraph)
        {
            self.add_line();
            return;
        }

        self.close_unmatched_blocks();
        if self.blank
            && let Some(last) = self.tree[container].last_child()
        {
            self.tree[last].last_line_blank = true;
        }

        let last_line_blank = self.blank
            && !match self.tree.kind(container) {
                NodeKind::BlockQuote
                | NodeKind::MathBlock { .. }
                | NodeKind::FootnoteDefinition { .. } => true,
                NodeKind::CodeBlock(code) => code.fenced,
                NodeKind::Item(_) => {
                    self.tree[container].first_child().is_none()
                        && self.tree[container].start_line == self.line_number
                }
                _ => false,
            };
        let ancestors: Vec<NodeId> = self.tree.ancestors(container).collect();
        for id in ancestors {
            self.tree[id].last_line_blank = last_line_blank;
        }

        if self.tree.kind(container).accepts_lines() {
            self.add_line();
            let closes = match self.tree.kind(container) {
                NodeKind::HtmlBlock { block_type, .. } if *block_type <= 5 => {
                    html::block_ends(*block_type, &self.line[self.offset.min(self.line.len())..])
                }
                NodeKind::MathBlock { .. } => {
                    let content = &self.tree[container].content;
                    let line = content.strip_suffix('\n').unwrap_or(content);
                    content.len() > 3 && line.ends_with("$$")
                }
                _ => false,
            };
            if closes {
                self.finalize(container, self.line_number);
            }
        } else if self.offset < self.line.trim_end_matches('\n').len() && !self.blank {
            self.add_child(NodeKind::Paragraph, self.offset);
            self.advance_next_nonspace();
            self.add_line();
        }
    }

    /// `continue` contract: does the current line keep `container` open?
    fn continue_block(&mut self, container: NodeId) -> ContinueResult {
        use ContinueResult::*;
        let kind = self.tree.kind(container).clone();
        match kind {
            NodeKind::Document | NodeKind::List(_) => Matched,
            NodeKind::BlockQuote => {
                if !self.indented && self.peek(self.next_nonspace) == Some(b'>') {
                    self.advance_next_nonspace();
                    self.advance_offset(1, false);
                    if matches!(self.peek(self.offset), Some(b' ') | Some(b'\t')) {
                        self.advance_offset(1, true);
                    }
                    Matched
                } else {
                    Failed
                }
            }
            NodeKind::Item(data) => {
                let width = data.marker_offset + data.padding;
                if self.blank {
                    if self.tree[container].first_child().is_none() {
                        return Failed;
                    }
                    self.advance_next_nonspace();
                    Matched
                } else if self.indent >= width {
                    self.advance_offset(width, true);
                    Matched
                } else {
                    Failed
                }
            }
            NodeKind::CodeBlock(code) if code.fenced => {
                let fence = code.fence_char.unwrap_or('`') as u8;
                if self.indent <= 3 && is_closing_fence(self.rest(), fence, code.fence_length) {
                    self.finalize(container, self.line_number);
                    return Done;
                }
                let mut i = code.fence_offset;
                while i > 0 && matches!(self.peek(self.offset), Some(b' ') | Some(b'\t')) {
                    self.advance_offset(1, true);
                    i -= 1;
                }
                Matched
            }
            NodeKind::CodeBlock(_) => {
                if self.indent >= CODE_INDENT {
                    self.advance_offset(CODE_INDENT, true);
                    Matched
                } else if self.blank {
                    self.advance_next_nonspace();
                    Matched
                } else {
                    Failed
                }
            }
            NodeKind::HtmlBlock { block_type, .. } => {
                if self.blank && (block_type == 6 || block_type == 7) {
                    Failed
                } else {
                    Matched
                }
            }
            NodeKind::Paragraph => {
                if self.blank {
                    Failed
                } else {
                    Matched
                }
            }
            NodeKind::MathBlock { .. } => {
                if self.indent <= 3 && is_closing_fence(self.rest(), b'$', 2) {
                    self.finalize(container, self.line_number);
                    return Done;
                }
                let mut i = self.math_offsets.get(&container).copied().unwrap_or(0);
                while i > 0 && matches!(self.peek(self.offset), Some(b' ') | Some(b'\t')) {
                    self.advance_offset(1, true);
                    i -= 1;
                }
                Matched
            }
            NodeKind::FootnoteDefinition { .. } => {
                if self.blank {
                    Matched
                } else if self.indent < CODE_INDENT {
                    Failed
                } else {
                    self.advance_offset(CODE_INDENT, true);
                    Matched
                }
            }
            _ => Failed,
        }
    }

    /// `finalize` contract: close a block and run its kind-specific hook
    pub(super) fn finalize(&mut self, block: NodeId, end_line: usize) {
        let parent = self.tree.parent(block);
        {
            let node = &mut self.tree[block];
            node.open = false;
            node.end_line = end_line.max(node.start_line);
            if let Some(&end) = self.line_ends.get(node.end_line.wrapping_sub(1)) {
                node.span.end = end.max(node.span.start);
            }
        }
        trace!(kind = self.tree.kind(block).name(), "close block");

        match self.tree.kind(block) {
            NodeKind::Paragraph => self.finalize_paragraph(block),
            NodeKind::CodeBlock(_) => finalize_code_block(&mut self.tree, block),
            NodeKind::HtmlBlock { .. } => {
                let literal = trim_trailing_blank_lines(&self.tree[block].content);
                if let NodeKind::HtmlBlock { literal: l, .. } = &mut self.tree[block].kind {
                    *l = literal;
                }
            }
            NodeKind::MathBlock { .. } => {
                let content = &self.tree[block].content;
                let body = content.get(2..).unwrap_or("").trim();
                let body = body.strip_suffix("$$").unwrap_or(body).trim().to_string();
                if let NodeKind::MathBlock { literal } = &mut self.tree[block].kind {
                    *literal = body;
                }
            }
            NodeKind::List(_) => self.finalize_list(block),
            _ => {}
        }

        self.tip = parent.unwrap_or_else(|| self.tree.root());
    }

    fn finalize_paragraph(&mut self, block: NodeId) {
        let mut content = std::mem::take(&mut self.tree[block].content);

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

        let trimmed = trim_content(&content);
        if trimmed.is_empty() {
            self.tree.unlink(block);
            return;
        }
        let mut content = trimmed.to_string();

        if self.options.gfm_task_list_item {
            content = self.task_list_marker(block, content);
        }

        if self.options.gfm_table
            && let Some(found) = find_table(&content)
        {
            if found.leading_lines == 0 {
                self.convert_to_table(block, found.table);
                return;
            }
            let span = self.tree[block].span;
            let table = self.tree.create(NodeKind::Table { alignments: Vec::new() }, span);
            self.tree[table].start_line = self.tree[block].start_line + found.leading_lines;
            self.tree[table].end_line = self.tree[block].end_line;
            self.tree.insert_after(block, table);
            self.convert_to_table(table, found.table);
            content = content
                .lines()
                .take(found.leading_lines)
                .collect::<Vec<_>>()
                .join("\n");
        }

        if self.options.toc && content.eq_ignore_ascii_case("[toc]") {
            self.tree[block].kind = NodeKind::Toc;
            return;
        }

        self.tree[block].content = content;
    }

    /// Strip a confirmed `[ ]`/`[x]` marker from the first paragraph of a
    /// task item, or demote an unconfirmed candidate to a plain item
    fn task_list_marker(&mut self, block: NodeId, content: String) -> String {
        let Some(parent) = self.tree.parent(block) else {
            return content;
        };
        if self.tree[parent].first_child() != Some(block) {
            return content;
        }
        let NodeKind::Item(data) = &mut self.tree[parent].kind else {
            return content;
        };
        if data.list_type != ListType::Task {
            return content;
        }
        let bytes = content.as_bytes();
        let confirmed = bytes.len() > 3
            && matches!(&bytes[..3], b"[ ]" | b"[x]" | b"[X]")
            && bytes[3].is_ascii_whitespace();
        if !confirmed {
            data.list_type = if data.is_ordered() {
                ListType::Ordered
            } else {
                ListType::Unordered
            };
            return content;
        }
        data.checked = bytes[1] != b' ';
        trim_content(&content[3..]).to_string()
    }

    /// Turn `node` into a table and build its rows
    pub(super) fn convert_to_table(&mut self, node: NodeId, table: TableParse) {
        let span = self.tree[node].span;
        let (start_line, end_line) = (self.tree[node].start_line, self.tree[node].end_line);
        self.tree[node].kind = NodeKind::Table {
            alignments: table.alignments.clone(),
        };
        self.tree[node].content.clear();

        let head = self.tree.create(NodeKind::TableHead, span);
        self.tree.append_child(node, head);
        let header_row = self.table_row(head, &table.alignments, table.header, true, span);
        self.tree[header_row].start_line = start_line;
        for (i, cells) in table.rows.into_iter().enumerate() {
            let row = self.table_row(node, &table.alignments, cells, false, span);
            self.tree[row].start_line = (start_line + 2 + i).min(end_line.max(start_line));
        }
    }

    fn table_row(
        &mut self,
        parent: NodeId,
        alignments: &[crate::ast::Alignment],
        cells: Vec<String>,
        header: bool,
        span: Span,
    ) -> NodeId {
        let row = self.tree.create(NodeKind::TableRow, span);
        self.tree.append_child(parent, row);
        for (cell, &alignment) in cells.into_iter().zip(alignments) {
            let id = self
                .tree
                .create(NodeKind::TableCell { alignment, header }, span);
            self.tree[id].content = cell;
            self.tree.append_child(row, id);
        }
        row
    }

    fn finalize_list(&mut self, block: NodeId) {
        let mut tight = true;
        let mut any_task = false;
        let mut item = self.tree[block].first_child();
        'items: while let Some(i) = item {
            if let NodeKind::Item(data) = self.tree.kind(i) {
                any_task |= data.list_type == ListType::Task;
            }
            let next_item = self.tree[i].next();
            if self.ends_with_blank_line(i) && next_item.is_some() {
                tight = false;
                break;
            }
            let mut sub = self.tree[i].first_child();
            while let Some(s) = sub {
                let next_sub = self.tree[s].next();
                if self.ends_with_blank_line(s) && (next_item.is_some() || next_sub.is_some()) {
                    tight = false;
                    break 'items;
                }
                sub = next_sub;
            }
            item = next_item;
        }
        // Keep scanning for task items past an early loose break
        while let Some(i) = item {
            if let NodeKind::Item(data) = self.tree.kind(i) {
                any_task |= data.list_type == ListType::Task;
            }
            item = self.tree[i].next();
        }

        if let NodeKind::List(data) = &mut self.tree[block].kind {
            data.tight = tight;
            if any_task {
                data.list_type = ListType::Task;
            } else if data.list_type == ListType::Task {
                data.list_type = if data.is_ordered() {
                    ListType::Ordered
                } else {
                    ListType::Unordered
                };
            }
        }
    }

    fn ends_with_blank_line(&self, mut block: NodeId) -> bool {
        loop {
            if self.tree[block].last_line_blank {
                return true;
            }
            match self.tree.kind(block) {
                NodeKind::List(_) | NodeKind::Item(_) => match self.tree[block].last_child() {
                    Some(last) => block = last,
                    None => return false,
                },
                _ => return false,
            }
        }
    }
}

/// Trim spaces, tabs and newlines from both ends
pub(super) fn trim_content(s: &str) -> &str {
    s.trim_matches(|c| c == ' ' || c == '\t' || c == '\n')
}

/// A run of at least `min` fence characters followed only by whitespace
fn is_closing_fence(rest: &str, fence: u8, min: usize) -> bool {
    let bytes = rest.as_bytes();
    let run = bytes.iter().take_while(|&&b| b == fence).count();
    run >= min.max(2) && bytes[run..].iter().all(|b| b.is_ascii_whitespace())
}

fn trim_trailing_blank_lines(content: &str) -> String {
    let mut end = content.len();
    loop {
        let trimmed = content[..end].trim_end_matches(' ');
        match trimmed.strip_suffix('\n') {
            Some(rest) => end = rest.len(),
            None => break,
        }
    }
    content[..end].to_string()
}

fn finalize_code_block(tree: &mut Tree, block: NodeId) {
    let content = std::mem::take(&mut tree[block].content);
    let NodeKind::CodeBlock(code) = &mut tree[block].kind else {
        return;
    };
    if code.fenced {
        let (first, rest) = content.split_once('\n').unwrap_or((content.as_str(), ""));
        code.info = super::entities::unescape(first.trim()).into_owned();
        code.literal = rest.to_string();
    } else {
        let mut lines: Vec<&str> = content.split('\n').collect();
        while lines
            .last()
            .is_some_and(|l| l.bytes().all(|b| b == b' ' || b == b'\t'))
        {
            lines.pop();
        }
        code.literal = if lines.is_empty() {
            String::new()
        } else {
            lines.join("\n") + "\n"
        };
    }
}
