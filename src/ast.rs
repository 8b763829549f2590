/// Markdown syntax tree stored in an index arena
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut, Range};

/// Handle to a node inside a [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Byte range of the source a node was built from.
///
/// Block spans index the normalized input; inline spans index the raw
/// content of their enclosing leaf block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    None,
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListType {
    Unordered,
    Ordered,
    Task,
}

/// Marker data shared by a list and its items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListData {
    pub list_type: ListType,
    /// `-`, `+` or `*` for bullet lists
    pub bullet_char: Option<char>,
    /// `.` or `)` for ordered lists
    pub delimiter: Option<char>,
    pub start: u32,
    /// Only meaningful on lists, computed when the list closes
    pub tight: bool,
    pub checked: bool,
    #[serde(skip)]
    pub(crate) marker_offset: usize,
    #[serde(skip)]
    pub(crate) padding: usize,
}

impl ListData {
    pub fn is_ordered(&self) -> bool {
        self.delimiter.is_some()
    }

    /// Two items belong to the same list when their markers agree
    pub(crate) fn matches(&self, other: &ListData) -> bool {
        self.bullet_char == other.bullet_char && self.delimiter == other.delimiter
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlockData {
    pub fenced: bool,
    pub fence_char: Option<char>,
    pub fence_length: usize,
    #[serde(skip)]
    pub(crate) fence_offset: usize,
    pub info: String,
    pub literal: String,
}

/// Every kind of node the parser produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    // Blocks
    Document,
    BlockQuote,
    List(ListData),
    Item(ListData),
    Paragraph,
    Heading {
        level: u8,
        setext: bool,
        id: Option<String>,
    },
    ThematicBreak,
    CodeBlock(CodeBlockData),
    HtmlBlock {
        block_type: u8,
        literal: String,
    },
    MathBlock {
        literal: String,
    },
    Table {
        alignments: Vec<Alignment>,
    },
    TableHead,
    TableRow,
    TableCell {
        alignment: Alignment,
        header: bool,
    },
    FootnoteDefinition {
        label: String,
        index: usize,
    },
    Toc,

    // Inlines
    Text {
        literal: String,
    },
    SoftBreak,
    HardBreak,
    Code {
        literal: String,
    },
    Emphasis,
    Strong,
    Strikethrough,
    Link {
        destination: String,
        title: Option<String>,
        autolink: bool,
    },
    Image {
        destination: String,
        title: Option<String>,
    },
    HtmlInline {
        literal: String,
    },
    InlineMath {
        literal: String,
    },
    FootnoteReference {
        label: String,
        index: usize,
    },
    Emoji {
        alias: String,
        literal: String,
    },
}

impl NodeKind {
    pub fn text(literal: impl Into<String>) -> Self {
        NodeKind::Text {
            literal: literal.into(),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(
            self,
            NodeKind::Document
                | NodeKind::BlockQuote
                | NodeKind::List(_)
                | NodeKind::Item(_)
                | NodeKind::Paragraph
                | NodeKind::Heading { .. }
                | NodeKind::ThematicBreak
                | NodeKind::CodeBlock(_)
                | NodeKind::HtmlBlock { .. }
                | NodeKind::MathBlock { .. }
                | NodeKind::Table { .. }
                | NodeKind::TableHead
                | NodeKind::TableRow
                | NodeKind::TableCell { .. }
                | NodeKind::FootnoteDefinition { .. }
                | NodeKind::Toc
        )
    }

    /// Leaf blocks whose raw content is handed to the inline resolver
    pub fn has_inline_content(&self) -> bool {
        matches!(
            self,
            NodeKind::Paragraph | NodeKind::Heading { .. } | NodeKind::TableCell { .. }
        )
    }

    /// Short stable name used in logs and the JSON form
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::BlockQuote => "block_quote",
            NodeKind::List(_) => "list",
            NodeKind::Item(_) => "item",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Heading { .. } => "heading",
            NodeKind::ThematicBreak => "thematic_break",
            NodeKind::CodeBlock(_) => "code_block",
            NodeKind::HtmlBlock { .. } => "html_block",
            NodeKind::MathBlock { .. } => "math_block",
            NodeKind::Table { .. } => "table",
            NodeKind::TableHead => "table_head",
            NodeKind::TableRow => "table_row",
            NodeKind::TableCell { .. } => "table_cell",
            NodeKind::FootnoteDefinition { .. } => "footnote_definition",
            NodeKind::Toc => "toc",
            NodeKind::Text { .. } => "text",
            NodeKind::SoftBreak => "soft_break",
            NodeKind::HardBreak => "hard_break",
            NodeKind::Code { .. } => "code",
            NodeKind::Emphasis => "emphasis",
            NodeKind::Strong => "strong",
            NodeKind::Strikethrough => "strikethrough",
            NodeKind::Link { .. } => "link",
            NodeKind::Image { .. } => "image",
            NodeKind::HtmlInline { .. } => "html_inline",
            NodeKind::InlineMath { .. } => "inline_math",
            NodeKind::FootnoteReference { .. } => "footnote_reference",
            NodeKind::Emoji { .. } => "emoji",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    /// 1-based first and last source line, zero for inlines
    pub start_line: usize,
    pub end_line: usize,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    // Block builder state
    pub(crate) open: bool,
    pub(crate) last_line_blank: bool,
    pub(crate) content: String,
}

impl Node {
    fn new(kind: NodeKind, span: Span) -> Self {
        Node {
            kind,
            span,
            start_line: 0,
            end_line: 0,
            parent: None,
            first_child: None,
            last_child: None,
            prev: None,
            next: None,
            open: false,
            last_line_blank: false,
            content: String::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    pub fn previous(&self) -> Option<NodeId> {
        self.prev
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }
}

/// Result of a visitor callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    Continue,
    SkipChildren,
    Stop,
}

/// Arena owning every node of one document.
///
/// Unlinked nodes stay allocated until the tree is dropped; only nodes
/// reachable from the root are part of the document.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn new(root_kind: NodeKind) -> Self {
        let mut root = Node::new(root_kind, Span::default());
        root.open = true;
        Tree {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a detached node
    pub fn create(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind, span));
        id
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            self[child].parent.is_none(),
            "append_child on a node that is still linked"
        );
        let last = self[parent].last_child;
        self[child].parent = Some(parent);
        self[child].prev = last;
        self[child].next = None;
        match last {
            Some(last) => self[last].next = Some(child),
            None => self[parent].first_child = Some(child),
        }
        self[parent].last_child = Some(child);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self[child].parent.is_none());
        let first = self[parent].first_child;
        self[child].parent = Some(parent);
        self[child].next = first;
        self[child].prev = None;
        match first {
            Some(first) => self[first].prev = Some(child),
            None => self[parent].last_child = Some(child),
        }
        self[parent].first_child = Some(child);
    }

    /// Insert `sibling` right after `node`, which must be linked
    pub fn insert_after(&mut self, node: NodeId, sibling: NodeId) {
        debug_assert!(self[sibling].parent.is_none());
        let parent = self[node].parent;
        debug_assert!(parent.is_some(), "insert_after on an unlinked node");
        let Some(parent) = parent else { return };
        let next = self[node].next;
        self[sibling].parent = Some(parent);
        self[sibling].prev = Some(node);
        self[sibling].next = next;
        self[node].next = Some(sibling);
        match next {
            Some(next) => self[next].prev = Some(sibling),
            None => self[parent].last_child = Some(sibling),
        }
    }

    /// Insert `sibling` right before `node`, which must be linked
    pub fn insert_before(&mut self, node: NodeId, sibling: NodeId) {
        debug_assert!(self[sibling].parent.is_none());
        let parent = self[node].parent;
        debug_assert!(parent.is_some(), "insert_before on an unlinked node");
        let Some(parent) = parent else { return };
        let prev = self[node].prev;
        self[sibling].parent = Some(parent);
        self[sibling].next = Some(node);
        self[sibling].prev = prev;
        self[node].prev = Some(sibling);
        match prev {
            Some(prev) => self[prev].next = Some(sibling),
            None => self[parent].first_child = Some(sibling),
        }
    }

    /// Detach a node (and its subtree) from its parent and siblings
    pub fn unlink(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = &self[id];
            (node.parent, node.prev, node.next)
        };
        match prev {
            Some(prev) => self[prev].next = next,
            None => {
                if let Some(parent) = parent {
                    self[parent].first_child = next;
                }
            }
        }
        match next {
            Some(next) => self[next].prev = prev,
            None => {
                if let Some(parent) = parent {
                    self[parent].last_child = prev;
                }
            }
        }
        let node = &mut self[id];
        node.parent = None;
        node.prev = None;
        node.next = None;
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self[id].first_child,
        }
    }

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }

    /// Depth-first walk emitting an entering and an exiting event per node.
    ///
    /// The walk is a cursor over the sibling links, so arbitrarily deep
    /// trees never grow the call stack. It returns `Stop` when the visitor
    /// stopped it, otherwise the status of the last exit event of `start`.
    pub fn walk<F>(&self, start: NodeId, mut visitor: F) -> WalkStatus
    where
        F: FnMut(&Tree, NodeId, bool) -> WalkStatus,
    {
        let mut current = start;
        let mut entering = true;
        loop {
            let status = visitor(self, current, entering);
            if status == WalkStatus::Stop {
                return WalkStatus::Stop;
            }
            if entering {
                match self[current].first_child {
                    Some(child) if status == WalkStatus::Continue => current = child,
                    _ => entering = false,
                }
                continue;
            }
            if current == start {
                return status;
            }
            match (self[current].next, self[current].parent) {
                (Some(next), _) => {
                    current = next;
                    entering = true;
                }
                (None, Some(parent)) => current = parent,
                (None, None) => return status,
            }
        }
    }

    /// Concatenated text of all descendants, used for alt text and ToC entries
    pub fn plain_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.walk(id, |tree, n, entering| {
            if entering {
                match tree.kind(n) {
                    NodeKind::Text { literal }
                    | NodeKind::Code { literal }
                    | NodeKind::InlineMath { literal }
                    | NodeKind::Emoji { literal, .. } => out.push_str(literal),
                    NodeKind::SoftBreak | NodeKind::HardBreak => out.push(' '),
                    _ => {}
                }
            }
            WalkStatus::Continue
        });
        out
    }

    /// Copy the children of `from_root` in `other` under `parent` in this tree
    pub(crate) fn graft(&mut self, parent: NodeId, other: &Tree, from_root: NodeId) {
        let mut pending = vec![(from_root, parent)];
        while let Some((source, target)) = pending.pop() {
            let mut child = other[source].first_child;
            while let Some(c) = child {
                let src = &other[c];
                let id = self.create(src.kind.clone(), src.span);
                self.append_child(target, id);
                if src.first_child.is_some() {
                    pending.push((c, id));
                }
                child = src.next;
            }
        }
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.tree[id].next;
        Some(id)
    }
}

pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.tree[id].parent;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(tree: &mut Tree, s: &str) -> NodeId {
        tree.create(NodeKind::text(s), Span::default())
    }

    #[test]
    fn test_append_and_unlink() {
        let mut tree = Tree::new(NodeKind::Paragraph);
        let root = tree.root();
        let a = text(&mut tree, "a");
        let b = text(&mut tree, "b");
        let c = text(&mut tree, "c");
        tree.append_child(root, a);
        tree.append_child(root, c);
        tree.insert_after(a, b);
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![a, b, c]);

        tree.unlink(b);
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(tree[a].next(), Some(c));
        assert_eq!(tree[c].previous(), Some(a));
        assert!(tree[b].parent().is_none());

        tree.unlink(a);
        tree.unlink(c);
        assert!(tree[root].first_child().is_none());
        assert!(tree[root].last_child().is_none());
    }

    #[test]
    fn test_insert_before_and_prepend() {
        let mut tree = Tree::new(NodeKind::Paragraph);
        let root = tree.root();
        let b = text(&mut tree, "b");
        tree.append_child(root, b);
        let a = text(&mut tree, "a");
        tree.insert_before(b, a);
        let z = text(&mut tree, "z");
        tree.prepend_child(root, z);
        assert_eq!(tree.plain_text(root), "zab");
    }

    #[test]
    fn test_walk_order_and_skip() {
        let mut tree = Tree::new(NodeKind::Document);
        let root = tree.root();
        let p = tree.create(NodeKind::Paragraph, Span::default());
        tree.append_child(root, p);
        let em = tree.create(NodeKind::Emphasis, Span::default());
        tree.append_child(p, em);
        let t = text(&mut tree, "x");
        tree.append_child(em, t);

        let mut events = Vec::new();
        tree.walk(root, |tree, id, entering| {
            events.push((tree.kind(id).name(), entering));
            if entering && matches!(tree.kind(id), NodeKind::Emphasis) {
                WalkStatus::SkipChildren
            } else {
                WalkStatus::Continue
            }
        });
        assert_eq!(
            events,
            vec![
                ("document", true),
                ("paragraph", true),
                ("emphasis", true),
                ("emphasis", false),
                ("paragraph", false),
                ("document", false),
            ]
        );
    }

    #[test]
    fn test_walk_stop() {
        let mut tree = Tree::new(NodeKind::Document);
        let root = tree.root();
        for _ in 0..3 {
            let p = tree.create(NodeKind::Paragraph, Span::default());
            tree.append_child(root, p);
        }
        let mut seen = 0;
        let status = tree.walk(root, |tree, id, entering| {
            if entering && matches!(tree.kind(id), NodeKind::Paragraph) {
                seen += 1;
                return WalkStatus::Stop;
            }
            WalkStatus::Continue
        });
        assert_eq!(status, WalkStatus::Stop);
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_graft_preserves_order() {
        let mut fragment = Tree::new(NodeKind::Paragraph);
        let froot = fragment.root();
        let strong = fragment.create(NodeKind::Strong, Span::default());
        fragment.append_child(froot, strong);
        let inner = text(&mut fragment, "bold");
        fragment.append_child(strong, inner);
        let tail = text(&mut fragment, " tail");
        fragment.append_child(froot, tail);

        let mut tree = Tree::new(NodeKind::Document);
        let p = tree.create(NodeKind::Paragraph, Span::default());
        let root = tree.root();
        tree.append_child(root, p);
        tree.graft(p, &fragment, froot);
        assert_eq!(tree.plain_text(p), "bold tail");
        let first = tree[p].first_child().unwrap();
        assert_eq!(tree.kind(first), &NodeKind::Strong);
    }

    fn nested(depth: usize) -> (Tree, NodeId) {
        let mut tree = Tree::new(NodeKind::Document);
        let mut parent = tree.root();
        for _ in 0..depth {
            let quote = tree.create(NodeKind::BlockQuote, Span::default());
            tree.append_child(parent, quote);
            parent = quote;
        }
        let leaf = tree.create(NodeKind::Paragraph, Span::default());
        tree.append_child(parent, leaf);
        (tree, leaf)
    }

    #[test]
    fn test_walk_deep_tree() {
        let (tree, leaf) = nested(100_000);
        let mut entered = 0;
        let mut exited = 0;
        let mut leaf_seen = false;
        tree.walk(tree.root(), |_, id, entering| {
            if entering {
                entered += 1;
                leaf_seen |= id == leaf;
            } else {
                exited += 1;
            }
            WalkStatus::Continue
        });
        assert_eq!(entered, 100_002);
        assert_eq!(exited, 100_002);
        assert!(leaf_seen);
    }

    #[test]
    fn test_walk_subtree_stays_inside_start() {
        let mut tree = Tree::new(NodeKind::Document);
        let root = tree.root();
        let first = tree.create(NodeKind::Paragraph, Span::default());
        let second = tree.create(NodeKind::Paragraph, Span::default());
        tree.append_child(root, first);
        tree.append_child(root, second);
        let t = text(&mut tree, "x");
        tree.append_child(first, t);

        let mut visited = Vec::new();
        tree.walk(first, |_, id, entering| {
            visited.push((id, entering));
            WalkStatus::Continue
        });
        assert_eq!(visited, vec![(first, true), (t, true), (t, false), (first, false)]);
    }

    #[test]
    fn test_graft_deep_fragment() {
        let (fragment, _) = nested(100_000);
        let mut tree = Tree::new(NodeKind::Document);
        let root = tree.root();
        tree.graft(root, &fragment, fragment.root());
        assert_eq!(tree.len(), fragment.len());
    }
}
