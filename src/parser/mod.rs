/// Markdown parsing in two phases.
///
/// The block phase consumes the input line by line and builds the container
/// structure, collecting link reference and footnote definitions as it goes.
/// The inline phase then resolves the raw content of every paragraph,
/// heading and table cell against those frozen maps. Because the maps no
/// longer change, the leaves can be resolved in parallel.
mod autolink;
mod block_starts;
mod blocks;
mod delimiters;
mod emoji;
mod entities;
mod html;
mod inlines;
mod links;
mod table;

pub use delimiters::classify;

use crate::ast::{NodeId, Tree, WalkStatus};
use crate::lexer::normalize;
use crate::options::Options;
use blocks::{BlockOutput, BlockParser};
use inlines::InlineContext;
use rayon::prelude::*;
use tracing::debug;

/// Markdown parser configured with one set of [`Options`]
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: Options,
}

impl Parser {
    pub fn new(options: Options) -> Self {
        Parser { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Parse a document. Every input produces a tree.
    pub fn parse(&self, input: &str) -> Tree {
        let text = normalize(input);
        let BlockOutput {
            mut tree,
            link_refs,
            footnotes,
        } = BlockParser::new(&self.options).run(&text);

        let leaves = inline_leaves(&tree);
        debug!(
            leaves = leaves.len(),
            parallel = self.options.parallel_inlines,
            "resolving inlines"
        );

        let ctx = InlineContext {
            options: &self.options,
            link_refs: &link_refs,
            footnotes: &footnotes,
        };
        let fragments: Vec<(NodeId, Tree)> = if self.options.parallel_inlines {
            leaves
                .par_iter()
                .map(|(id, content)| (*id, inlines::resolve(content, &ctx)))
                .collect()
        } else {
            leaves
                .iter()
                .map(|(id, content)| (*id, inlines::resolve(content, &ctx)))
                .collect()
        };

        for (id, fragment) in &fragments {
            tree.graft(*id, fragment, fragment.root());
        }
        debug!(nodes = tree.len(), "parse complete");
        tree
    }
}

/// Leaf blocks with inline content, in document order
fn inline_leaves(tree: &Tree) -> Vec<(NodeId, String)> {
    let mut leaves = Vec::new();
    tree.walk(tree.root(), |tree, id, entering| {
        if !entering {
            return WalkStatus::Continue;
        }
        if tree.kind(id).has_inline_content() {
            leaves.push((id, tree[id].content.clone()));
            return WalkStatus::SkipChildren;
        }
        WalkStatus::Continue
    });
    leaves
}
