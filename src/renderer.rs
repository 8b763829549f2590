/// HTML renderer over the parsed tree
use crate::ast::{Alignment, ListType, NodeId, NodeKind, Tree, WalkStatus};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        HtmlRenderer
    }

    pub fn render(&self, tree: &Tree) -> String {
        let mut state = RenderState::new(tree);
        tree.walk(tree.root(), |tree, id, entering| state.visit(tree, id, entering));
        state.footnote_section(tree);
        state.out
    }
}

fn escape(text: &str) -> std::borrow::Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(text)
}

/// Lowercased anchor text: alphanumerics kept, whitespace and `-` become `-`
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.trim().chars() {
        if c.is_alphanumeric() || c == '_' {
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' {
            slug.push('-');
        }
    }
    slug
}

/// Kinds rendered on both the entering and the exiting event
fn has_closing_tag(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Document
            | NodeKind::Paragraph
            | NodeKind::Heading { .. }
            | NodeKind::BlockQuote
            | NodeKind::List(_)
            | NodeKind::Item(_)
            | NodeKind::Table { .. }
            | NodeKind::TableHead
            | NodeKind::TableRow
            | NodeKind::TableCell { .. }
            | NodeKind::FootnoteDefinition { .. }
            | NodeKind::Emphasis
            | NodeKind::Strong
            | NodeKind::Strikethrough
            | NodeKind::Link { .. }
            | NodeKind::Image { .. }
    )
}

struct TocEntry {
    level: u8,
    anchor: String,
    text: String,
}

struct RenderState {
    out: String,
    /// Nesting depth of image alt text, where only text is written
    disable_tags: usize,
    anchors: HashMap<NodeId, String>,
    toc: Vec<TocEntry>,
    footnotes: Vec<NodeId>,
}

impl RenderState {
    fn new(tree: &Tree) -> Self {
        let mut has_toc = false;
        let mut headings = Vec::new();
        let mut footnotes = Vec::new();
        tree.walk(tree.root(), |tree, id, entering| {
            if !entering {
                return WalkStatus::Continue;
            }
            match tree.kind(id) {
                NodeKind::Toc => has_toc = true,
                NodeKind::Heading { .. } => headings.push(id),
                NodeKind::FootnoteDefinition { .. } => footnotes.push(id),
                _ => {}
            }
            if tree.kind(id).is_block() {
                WalkStatus::Continue
            } else {
                WalkStatus::SkipChildren
            }
        });
        footnotes.sort_by_key(|&id| match tree.kind(id) {
            NodeKind::FootnoteDefinition { index, .. } => *index,
            _ => 0,
        });

        let mut anchors = HashMap::new();
        let mut toc = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        for id in headings {
            let NodeKind::Heading { level, id: explicit, .. } = tree.kind(id) else {
                continue;
            };
            if explicit.is_none() && !has_toc {
                continue;
            }
            let text = tree.plain_text(id);
            let anchor = match explicit {
                Some(anchor) => anchor.clone(),
                None => {
                    let base = slugify(&text);
                    let count = seen.entry(base.clone()).or_insert(0);
                    *count += 1;
                    if *count == 1 {
                        base
                    } else {
                        format!("{}-{}", base, *count - 1)
                    }
                }
            };
            if has_toc {
                toc.push(TocEntry {
                    level: *level,
                    anchor: anchor.clone(),
                    text,
                });
            }
            anchors.insert(id, anchor);
        }

        RenderState {
            out: String::new(),
            disable_tags: 0,
            anchors,
            toc,
            footnotes,
        }
    }

    fn cr(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn tag(&mut self, tag: &str) {
        if self.disable_tags == 0 {
            self.out.push_str(tag);
        }
    }

    fn in_tight_list(tree: &Tree, id: NodeId) -> bool {
        let grandparent = tree.parent(id).and_then(|p| tree.parent(p));
        matches!(grandparent.map(|g| tree.kind(g)), Some(NodeKind::List(data)) if data.tight)
    }

    fn task_checkbox(tree: &Tree, paragraph: NodeId) -> Option<bool> {
        let parent = tree.parent(paragraph)?;
        if tree[parent].first_child() != Some(paragraph) {
            return None;
        }
        match tree.kind(parent) {
            NodeKind::Item(data) if data.list_type == ListType::Task => Some(data.checked),
            _ => None,
        }
    }

    fn visit(&mut self, tree: &Tree, id: NodeId, entering: bool) -> WalkStatus {
        if !entering && !has_closing_tag(tree.kind(id)) {
            return WalkStatus::Continue;
        }
        match tree.kind(id) {
            NodeKind::Document => {}
            NodeKind::Paragraph => {
                let tight = Self::in_tight_list(tree, id);
                if entering {
                    if !tight {
                        self.cr();
                        self.tag("<p>");
                    }
                    if let Some(checked) = Self::task_checkbox(tree, id) {
                        self.tag(if checked {
                            "<input type=\"checkbox\" checked=\"\" disabled=\"\" /> "
                        } else {
                            "<input type=\"checkbox\" disabled=\"\" /> "
                        });
                    }
                } else if !tight {
                    self.tag("</p>");
                    self.cr();
                }
            }
            NodeKind::Heading { level, .. } => {
                if entering {
                    self.cr();
                    match self.anchors.get(&id) {
                        Some(anchor) => {
                            let open = format!("<h{} id=\"{}\">", level, escape(anchor));
                            self.tag(&open);
                        }
                        None => self.tag(&format!("<h{}>", level)),
                    }
                } else {
                    self.tag(&format!("</h{}>", level));
                    self.cr();
                }
            }
            NodeKind::BlockQuote => {
                self.cr();
                self.tag(if entering { "<blockquote>" } else { "</blockquote>" });
                self.cr();
            }
            NodeKind::List(data) => {
                let ordered = data.is_ordered();
                self.cr();
                if entering {
                    if ordered && data.start != 1 {
                        self.tag(&format!("<ol start=\"{}\">", data.start));
                    } else {
                        self.tag(if ordered { "<ol>" } else { "<ul>" });
                    }
                } else {
                    self.tag(if ordered { "</ol>" } else { "</ul>" });
                }
                self.cr();
            }
            NodeKind::Item(data) => {
                if entering {
                    self.tag("<li>");
                    if data.list_type == ListType::Task && tree[id].first_child().is_none() {
                        self.tag("<input type=\"checkbox\" disabled=\"\" />");
                    }
                } else {
                    self.tag("</li>");
                    self.cr();
                }
            }
            NodeKind::ThematicBreak => {
                self.cr();
                self.tag("<hr />");
                self.cr();
            }
            NodeKind::CodeBlock(code) => {
                self.cr();
                match code.info.split_whitespace().next() {
                    Some(lang) => {
                        let open = format!("<pre><code class=\"language-{}\">", escape(lang));
                        self.tag(&open);
                    }
                    None => self.tag("<pre><code>"),
                }
                self.out.push_str(&escape(&code.literal));
                self.tag("</code></pre>");
                self.cr();
            }
            NodeKind::HtmlBlock { literal, .. } => {
                self.cr();
                self.out.push_str(literal);
                self.cr();
            }
            NodeKind::MathBlock { literal } => {
                self.cr();
                self.tag("<div class=\"math\">");
                self.out.push_str(&escape(literal));
                self.tag("</div>");
                self.cr();
            }
            NodeKind::Table { .. } => {
                if entering {
                    self.cr();
                    self.tag("<table>");
                    self.cr();
                } else {
                    let has_body = tree.children(id).count() > 1;
                    if has_body {
                        self.tag("</tbody>");
                        self.cr();
                    }
                    self.tag("</table>");
                    self.cr();
                }
            }
            NodeKind::TableHead => {
                self.tag(if entering { "<thead>" } else { "</thead>" });
                self.cr();
            }
            NodeKind::TableRow => {
                if entering {
                    let first_body_row = tree.parent(id).is_some_and(|p| {
                        matches!(tree.kind(p), NodeKind::Table { .. })
                            && tree[id]
                                .previous()
                                .is_some_and(|prev| matches!(tree.kind(prev), NodeKind::TableHead))
                    });
                    if first_body_row {
                        self.tag("<tbody>");
                        self.cr();
                    }
                    self.tag("<tr>");
                } else {
                    self.tag("</tr>");
                }
                self.cr();
            }
            NodeKind::TableCell { alignment, header } => {
                let name = if *header { "th" } else { "td" };
                if entering {
                    let align = match alignment {
                        Alignment::None => "",
                        Alignment::Left => " align=\"left\"",
                        Alignment::Center => " align=\"center\"",
                        Alignment::Right => " align=\"right\"",
                    };
                    self.tag(&format!("<{}{}>", name, align));
                } else {
                    self.tag(&format!("</{}>", name));
                    self.cr();
                }
            }
            NodeKind::FootnoteDefinition { .. } => {
                // Collected into the section at the end
                return WalkStatus::SkipChildren;
            }
            NodeKind::Toc => self.render_toc(),
            NodeKind::Text { literal } => self.out.push_str(&escape(literal)),
            NodeKind::SoftBreak => self.out.push('\n'),
            NodeKind::HardBreak => {
                self.tag("<br />");
                self.out.push('\n');
            }
            NodeKind::Code { literal } => {
                self.tag("<code>");
                self.out.push_str(&escape(literal));
                self.tag("</code>");
            }
            NodeKind::Emphasis => self.tag(if entering { "<em>" } else { "</em>" }),
            NodeKind::Strong => self.tag(if entering { "<strong>" } else { "</strong>" }),
            NodeKind::Strikethrough => self.tag(if entering { "<del>" } else { "</del>" }),
            NodeKind::Link {
                destination, title, ..
            } => {
                if entering {
                    let mut open = format!("<a href=\"{}\"", escape(destination));
                    if let Some(title) = title {
                        open.push_str(&format!(" title=\"{}\"", escape(title)));
                    }
                    open.push('>');
                    self.tag(&open);
                } else {
                    self.tag("</a>");
                }
            }
            NodeKind::Image { destination, title } => {
                if entering {
                    if self.disable_tags == 0 {
                        self.out
                            .push_str(&format!("<img src=\"{}\" alt=\"", escape(destination)));
                    }
                    self.disable_tags += 1;
                } else {
                    self.disable_tags -= 1;
                    if self.disable_tags == 0 {
                        self.out.push('"');
                        if let Some(title) = title {
                            self.out.push_str(&format!(" title=\"{}\"", escape(title)));
                        }
                        self.out.push_str(" />");
                    }
                }
            }
            NodeKind::HtmlInline { literal } => self.tag(literal),
            NodeKind::InlineMath { literal } => {
                self.tag("<span class=\"math\">");
                self.out.push_str(&escape(literal));
                self.tag("</span>");
            }
            NodeKind::FootnoteReference { index, .. } => {
                self.tag(&format!(
                    "<sup class=\"footnote-ref\"><a href=\"#fn{0}\" id=\"fnref{0}\">{0}</a></sup>",
                    index
                ));
            }
            NodeKind::Emoji { literal, .. } => self.out.push_str(&escape(literal)),
        }
        WalkStatus::Continue
    }

    fn render_toc(&mut self) {
        self.cr();
        self.tag("<nav class=\"toc\">");
        self.cr();
        self.tag("<ul>");
        self.cr();
        let entries: Vec<String> = self
            .toc
            .iter()
            .map(|entry| {
                format!(
                    "<li class=\"toc-h{}\"><a href=\"#{}\">{}</a></li>\n",
                    entry.level,
                    escape(&entry.anchor),
                    escape(&entry.text)
                )
            })
            .collect();
        for entry in entries {
            self.tag(&entry);
        }
        self.tag("</ul>");
        self.cr();
        self.tag("</nav>");
        self.cr();
    }

    fn footnote_section(&mut self, tree: &Tree) {
        if self.footnotes.is_empty() {
            return;
        }
        self.cr();
        self.out.push_str("<section class=\"footnotes\">\n<ol>\n");
        let footnotes = std::mem::take(&mut self.footnotes);
        for def in footnotes {
            let NodeKind::FootnoteDefinition { index, .. } = tree.kind(def) else {
                continue;
            };
            self.out.push_str(&format!("<li id=\"fn{}\">\n", index));
            for child in tree.children(def) {
                tree.walk(child, |tree, id, entering| self.visit(tree, id, entering));
            }
            self.cr();
            self.out.push_str(&format!(
                "<a href=\"#fnref{}\" class=\"footnote-backref\">\u{21A9}</a>\n</li>\n",
                index
            ));
        }
        self.out.push_str("</ol>\n</section>\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn render(input: &str, options: Options) -> String {
        HtmlRenderer::new().render(&Parser::new(options).parse(input))
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Über  uns "), "über--uns");
    }

    #[test]
    fn test_tight_and_loose_lists() {
        assert_eq!(
            render("- a\n- b\n", Options::default()),
            "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n"
        );
        assert_eq!(
            render("- a\n\n- b\n", Options::default()),
            "<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_image_alt_is_plain_text() {
        assert_eq!(
            render("![foo *bar*](/url \"t\")\n", Options::default()),
            "<p><img src=\"/url\" alt=\"foo bar\" title=\"t\" /></p>\n"
        );
    }

    #[test]
    fn test_table() {
        assert_eq!(
            render("| a | b |\n| :- | -: |\n| 1 | 2 |\n", Options::gfm()),
            "<table>\n<thead>\n<tr>\n<th align=\"left\">a</th>\n<th align=\"right\">b</th>\n</tr>\n</thead>\n<tbody>\n<tr>\n<td align=\"left\">1</td>\n<td align=\"right\">2</td>\n</tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn test_task_list() {
        assert_eq!(
            render("- [ ] todo\n- [x] done\n", Options::gfm()),
            "<ul>\n<li><input type=\"checkbox\" disabled=\"\" /> todo</li>\n<li><input type=\"checkbox\" checked=\"\" disabled=\"\" /> done</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_footnotes_section() {
        let options = Options {
            footnotes: true,
            ..Options::default()
        };
        assert_eq!(
            render("a[^n]\n\n[^n]: note\n", options),
            "<p>a<sup class=\"footnote-ref\"><a href=\"#fn1\" id=\"fnref1\">1</a></sup></p>\n<section class=\"footnotes\">\n<ol>\n<li id=\"fn1\">\n<p>note</p>\n<a href=\"#fnref1\" class=\"footnote-backref\">\u{21A9}</a>\n</li>\n</ol>\n</section>\n"
        );
    }

    #[test]
    fn test_toc() {
        let options = Options {
            toc: true,
            ..Options::default()
        };
        assert_eq!(
            render("[toc]\n\n# One\n\n## Two {custom}\n", options),
            "<nav class=\"toc\">\n<ul>\n<li class=\"toc-h1\"><a href=\"#one\">One</a></li>\n<li class=\"toc-h2\"><a href=\"#custom\">Two</a></li>\n</ul>\n</nav>\n<h1 id=\"one\">One</h1>\n<h2 id=\"custom\">Two</h2>\n"
        );
    }

    #[test]
    fn test_math() {
        let options = Options {
            inline_math: true,
            math_block: true,
            ..Options::default()
        };
        assert_eq!(
            render("$a<b$\n\n$$\nx\n$$\n", options),
            "<p><span class=\"math\">a&lt;b</span></p>\n<div class=\"math\">x</div>\n"
        );
    }
}
