/// JSON export and import of a parsed tree.
///
/// Nodes nest: each object carries the node kind (tagged by `type`), its
/// span, its line range when it is a block, and its children.
use crate::ast::{NodeId, NodeKind, Span, Tree, WalkStatus};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct JsonNode {
    #[serde(flatten)]
    kind: NodeKind,
    span: Span,
    #[serde(default)]
    start_line: usize,
    #[serde(default)]
    end_line: usize,
    #[serde(default)]
    children: Vec<JsonNode>,
}

/// Everything of one exported node except its children
#[derive(Serialize)]
struct JsonHead<'a> {
    #[serde(flatten)]
    kind: &'a NodeKind,
    span: Span,
    #[serde(skip_serializing_if = "is_zero")]
    start_line: usize,
    #[serde(skip_serializing_if = "is_zero")]
    end_line: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Serialize the tree as nested JSON objects. The nesting is written on the
/// walk's enter and exit events, so document depth never reaches the stack.
pub fn to_json(tree: &Tree) -> Result<String> {
    let mut out = String::new();
    let mut failure = None;
    let root = tree.root();
    tree.walk(root, |tree, id, entering| {
        let node = &tree[id];
        if !entering {
            if node.first_child().is_some() {
                out.push(']');
            }
            out.push('}');
            return WalkStatus::Continue;
        }
        if id != root && node.previous().is_some() {
            out.push(',');
        }
        let head = JsonHead {
            kind: &node.kind,
            span: node.span,
            start_line: node.start_line,
            end_line: node.end_line,
        };
        match serde_json::to_string(&head) {
            Ok(object) => {
                out.push_str(object.strip_suffix('}').unwrap_or(&object));
                if node.first_child().is_some() {
                    out.push_str(",\"children\":[");
                }
                WalkStatus::Continue
            }
            Err(err) => {
                failure = Some(err);
                WalkStatus::Stop
            }
        }
    });
    match failure {
        Some(err) => Err(err.into()),
        None => Ok(out),
    }
}

/// Whether `child` may appear directly under `parent` in a tree
fn valid_child(parent: &NodeKind, child: &NodeKind) -> bool {
    match (parent, child) {
        (_, NodeKind::Document) => false,
        (NodeKind::List(_), child) => matches!(child, NodeKind::Item(_)),
        (_, NodeKind::Item(_)) => false,
        (NodeKind::Table { .. }, child) => {
            matches!(child, NodeKind::TableHead | NodeKind::TableRow)
        }
        (NodeKind::TableHead, child) => matches!(child, NodeKind::TableRow),
        (NodeKind::TableRow, child) => matches!(child, NodeKind::TableCell { .. }),
        (_, NodeKind::TableHead | NodeKind::TableRow | NodeKind::TableCell { .. }) => false,
        (parent, child) if parent.has_inline_content() || !parent.is_block() => !child.is_block(),
        (_, child) => child.is_block(),
    }
}

/// Depth is bounded by serde_json's recursion limit on the input
fn import(tree: &mut Tree, parent: NodeId, node: JsonNode) -> Result<()> {
    if !valid_child(tree.kind(parent), &node.kind) {
        return Err(Error::invalid_tree(format!(
            "{} cannot contain {}",
            tree.kind(parent).name(),
            node.kind.name()
        )));
    }
    let id = tree.create(node.kind, node.span);
    tree[id].start_line = node.start_line;
    tree[id].end_line = node.end_line;
    tree.append_child(parent, id);
    for child in node.children {
        import(tree, id, child)?;
    }
    Ok(())
}

pub fn from_json(json: &str) -> Result<Tree> {
    let root: JsonNode = serde_json::from_str(json)?;
    if root.kind != NodeKind::Document {
        return Err(Error::invalid_tree(format!(
            "root must be a document, found {}",
            root.kind.name()
        )));
    }
    let mut tree = Tree::new(NodeKind::Document);
    let root_id = tree.root();
    tree[root_id].span = root.span;
    tree[root_id].start_line = root.start_line;
    tree[root_id].end_line = root.end_line;
    for child in root.children {
        import(&mut tree, root_id, child)?;
    }
    Ok(tree)
}
