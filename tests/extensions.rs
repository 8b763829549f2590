use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use stratamark::options::DomainSuffixes;
use stratamark::{NodeKind, Options, Parser, WalkStatus, json, markdown_to_html_with};

fn with(flags: impl FnOnce(&mut Options)) -> Options {
    let mut options = Options::default();
    flags(&mut options);
    options
}

#[rstest]
#[case("www.commonmark.org/help\n", "<p><a href=\"http://www.commonmark.org/help\">www.commonmark.org/help</a></p>\n")]
#[case("www.-x.com\n", "<p>www.-x.com</p>\n")]
#[case("Visit https://example.com.\n", "<p>Visit <a href=\"https://example.com\">https://example.com</a>.</p>\n")]
#[case("mail foo@bar.baz\n", "<p>mail <a href=\"mailto:foo@bar.baz\">foo@bar.baz</a></p>\n")]
#[case("[www.a.com](/x)\n", "<p><a href=\"/x\">www.a.com</a></p>\n")]
fn extended_autolinks(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(markdown_to_html_with(input, &Options::gfm()), expected);
}

#[test]
fn domain_suffixes_are_configurable() {
    let input = "see www.example.zone\n";
    assert_eq!(
        markdown_to_html_with(input, &Options::gfm()),
        "<p>see www.example.zone</p>\n"
    );
    let options = Options {
        domain_suffixes: DomainSuffixes::default().with(["zone"]),
        ..Options::gfm()
    };
    assert_eq!(
        markdown_to_html_with(input, &options),
        "<p>see <a href=\"http://www.example.zone\">www.example.zone</a></p>\n"
    );
}

#[rstest]
#[case(Options::default(), "<p>~~a~~</p>\n")]
#[case(Options::gfm(), "<p><del>a</del></p>\n")]
fn strikethrough_follows_flag(#[case] options: Options, #[case] expected: &str) {
    assert_eq!(markdown_to_html_with("~~a~~\n", &options), expected);
}

#[test]
fn three_tildes_are_not_strikethrough() {
    assert_eq!(
        markdown_to_html_with("a ~~~b~~~ c\n", &Options::gfm()),
        "<p>a ~~~b~~~ c</p>\n"
    );
}

#[test]
fn table_after_paragraph_lines() {
    assert_eq!(
        markdown_to_html_with("intro\n| a |\n| - |\n| b |\n", &Options::gfm()),
        "<p>intro</p>\n<table>\n<thead>\n<tr>\n<th>a</th>\n</tr>\n</thead>\n<tbody>\n<tr>\n<td>b</td>\n</tr>\n</tbody>\n</table>\n"
    );
}

#[test]
fn table_flag_off_keeps_paragraph() {
    assert_eq!(
        markdown_to_html_with("| a |\n| - |\n", &Options::default()),
        "<p>| a |\n| - |</p>\n"
    );
}

#[test]
fn setext_shaped_table_becomes_table() {
    let tree = Parser::new(Options::gfm()).parse("0\n-:\n-\n");
    let kinds: Vec<&str> = tree
        .children(tree.root())
        .map(|id| tree.kind(id).name())
        .collect();
    assert_eq!(kinds, vec!["table", "list"]);
}

#[test]
fn setext_shaped_input_without_table_flag_is_a_heading() {
    let tree = Parser::new(Options::default()).parse("0\n-:\n-\n");
    let first = tree[tree.root()].first_child().unwrap();
    assert!(matches!(tree.kind(first), NodeKind::Heading { level: 2, .. }));
}

#[test]
fn footnote_reference_requires_definition() {
    let options = with(|o| o.footnotes = true);
    assert_eq!(
        markdown_to_html_with("a[^missing]\n", &options),
        "<p>a[^missing]</p>\n"
    );
}

#[test]
fn footnotes_are_numbered_by_definition_order() {
    let options = with(|o| o.footnotes = true);
    let tree = Parser::new(options).parse("x[^b] y[^a]\n\n[^a]: first\n[^b]: second\n");
    let mut refs = Vec::new();
    tree.walk(tree.root(), |tree, id, entering| {
        if entering && let NodeKind::FootnoteReference { label, index } = tree.kind(id) {
            refs.push((label.clone(), *index));
        }
        WalkStatus::Continue
    });
    assert_eq!(refs, vec![("b".to_string(), 2), ("a".to_string(), 1)]);
}

#[test]
fn emoji_aliases() {
    let options = with(|o| o.emoji = true);
    assert_eq!(
        markdown_to_html_with("ship :rocket: :unknown:\n", &options),
        "<p>ship \u{1F680} :unknown:</p>\n"
    );
    let custom = Options {
        emoji_table: options.emoji_table.with([("unknown", "?")]),
        ..options
    };
    assert_eq!(
        markdown_to_html_with(":unknown:\n", &custom),
        "<p>?</p>\n"
    );
}

#[rstest]
#[case("$x$\n", "<p><span class=\"math\">x</span></p>\n")]
#[case("costs $5 and $6\n", "<p>costs $5 and $6</p>\n")]
#[case("$ x$\n", "<p>$ x$</p>\n")]
#[case("$$a+b$$\n", "<p><span class=\"math\">a+b</span></p>\n")]
#[case("$x$ and $y\n", "<p><span class=\"math\">x</span> and $y</p>\n")]
#[case("$a $b c\n", "<p>$a $b c</p>\n")]
fn inline_math(#[case] input: &str, #[case] expected: &str) {
    let options = with(|o| o.inline_math = true);
    assert_eq!(markdown_to_html_with(input, &options), expected);
}

#[test]
fn math_block_inside_blockquote() {
    let options = with(|o| o.math_block = true);
    assert_eq!(
        markdown_to_html_with("> $$\n> a\n> $$\n", &options),
        "<blockquote>\n<div class=\"math\">a</div>\n</blockquote>\n"
    );
}

#[test]
fn math_block_opener_with_trailing_space() {
    let options = with(|o| o.math_block = true);
    assert_eq!(
        markdown_to_html_with("$$ \nx\n$$\n", &options),
        "<div class=\"math\">x</div>\n"
    );
}

#[test]
fn task_list_in_loose_list() {
    assert_eq!(
        markdown_to_html_with("- [x] a\n\n- [ ] b\n", &Options::gfm()),
        "<ul>\n<li>\n<p><input type=\"checkbox\" checked=\"\" disabled=\"\" /> a</p>\n</li>\n<li>\n<p><input type=\"checkbox\" disabled=\"\" /> b</p>\n</li>\n</ul>\n"
    );
}

#[test]
fn toc_paragraph() {
    let options = with(|o| o.toc = true);
    let tree = Parser::new(options).parse("[TOC]\n");
    let first = tree[tree.root()].first_child().unwrap();
    assert_eq!(tree.kind(first), &NodeKind::Toc);
}

#[test]
fn editor_caret_does_not_break_emphasis() {
    let caret = stratamark::options::CARET;
    let input = format!("*foo{}*\n", caret);
    let options = with(|o| o.editor_caret = true);
    assert_eq!(
        markdown_to_html_with(&input, &options),
        format!("<p><em>foo{}</em></p>\n", caret)
    );
}

#[test]
fn json_export_round_trip_preserves_kinds() {
    let tree = Parser::new(Options::all()).parse("# T\n\n- [ ] x :smile:\n\n$$\nm\n$$\n");
    let restored = json::from_json(&json::to_json(&tree).unwrap()).unwrap();
    let names = |t: &stratamark::Tree| {
        let mut out = Vec::new();
        t.walk(t.root(), |t, id, entering| {
            if entering {
                out.push(t.kind(id).clone());
            }
            WalkStatus::Continue
        });
        out
    };
    assert_eq!(names(&restored), names(&tree));
}

proptest! {
    #[test]
    fn parsing_is_total(input in "[a-z #>*_`~\\[\\]()!<>&;:$|\\-\\n\\t0-9.\\\\]{0,60}") {
        let tree = Parser::new(Options::all()).parse(&input);
        prop_assert!(matches!(tree.kind(tree.root()), NodeKind::Document));
        let parallel = Parser::new(Options { parallel_inlines: true, ..Options::all() }).parse(&input);
        prop_assert_eq!(tree.len(), parallel.len());
    }
}
