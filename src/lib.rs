/// A CommonMark Markdown parser with GitHub Flavored Markdown and other
/// extensions, producing an arena tree that can be walked, rendered to
/// HTML or exported as JSON
pub mod ast;
pub mod error;
pub mod json;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod renderer;

pub use ast::{NodeId, NodeKind, Tree, WalkStatus};
pub use error::{Error, Result};
pub use options::Options;
pub use parser::Parser;

use renderer::HtmlRenderer;

/// Parse with plain CommonMark options
pub fn parse(markdown: &str) -> Tree {
    Parser::default().parse(markdown)
}

/// Parse markdown text and render to HTML
pub fn markdown_to_html(markdown: &str) -> String {
    markdown_to_html_with(markdown, &Options::default())
}

pub fn markdown_to_html_with(markdown: &str, options: &Options) -> String {
    let tree = Parser::new(options.clone()).parse(markdown);
    HtmlRenderer::new().render(&tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(markdown_to_html(""), "");
    }

    #[test]
    fn test_basic_image() {
        let result = markdown_to_html("![foo](/url \"title\")\n");
        assert_eq!(
            result,
            "<p><img src=\"/url\" alt=\"foo\" title=\"title\" /></p>\n"
        );
    }

    #[test]
    fn test_image_without_title() {
        let result = markdown_to_html("![bar](/path)\n");
        assert_eq!(result, "<p><img src=\"/path\" alt=\"bar\" /></p>\n");
    }

    #[test]
    fn test_options_change_output() {
        let input = "~~gone~~\n";
        assert_eq!(markdown_to_html(input), "<p>~~gone~~</p>\n");
        assert_eq!(
            markdown_to_html_with(input, &Options::gfm()),
            "<p><del>gone</del></p>\n"
        );
    }
}
