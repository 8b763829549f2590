use pretty_assertions::assert_eq;
use rstest::rstest;
use std::time::{Duration, Instant};
use stratamark::{Error, Options, json, markdown_to_html, markdown_to_html_with, parse};

/// Generous enough for an unoptimized build; quadratic scans blow far past it
const BUDGET: Duration = Duration::from_secs(10);

fn timed<T>(f: impl FnOnce() -> T) -> T {
    let started = Instant::now();
    let out = f();
    let elapsed = started.elapsed();
    assert!(elapsed < BUDGET, "took {elapsed:?}");
    out
}

#[test]
fn deeply_nested_emphasis() {
    let depth = 10_000;
    let input = format!("{}{}\n", "*a ".repeat(depth), "b* ".repeat(depth));
    let html = timed(|| markdown_to_html(&input));
    assert!(html.starts_with("<p><em>a <em>a "));
    assert_eq!(html.matches("<em>").count(), depth);
    assert_eq!(html.matches("</em>").count(), depth);
}

#[test]
fn deeply_nested_block_quotes() {
    let depth = 20_000;
    let input = format!("{}x\n", "> ".repeat(depth));
    let html = timed(|| markdown_to_html(&input));
    assert_eq!(html.matches("<blockquote>").count(), depth);
    assert!(html.contains("<p>x</p>"));
}

#[test]
fn deep_tree_exports_but_import_is_refused() {
    let tree = parse(&format!("{}x\n", "> ".repeat(10_000)));
    let exported = json::to_json(&tree).unwrap();
    assert!(exported.starts_with(r#"{"type":"document""#));
    assert!(matches!(json::from_json(&exported), Err(Error::Json(_))));
}

#[test]
fn unclosed_link_destinations() {
    let input = format!("{}\n", "[a](".repeat(30_000));
    let html = timed(|| markdown_to_html(&input));
    assert!(html.starts_with("<p>[a]([a]("));
    assert!(!html.contains("<a "));
}

#[test]
fn nested_open_brackets() {
    let depth = 20_000;
    let input = format!("{}a{}\n", "[".repeat(depth), "]".repeat(depth));
    let html = timed(|| markdown_to_html(&input));
    assert_eq!(html, format!("<p>{}a{}</p>\n", "[".repeat(depth), "]".repeat(depth)));
}

#[rstest]
#[case("<!--")]
#[case("<?")]
#[case("<![CDATA[")]
#[case("<!X")]
fn unclosed_raw_html(#[case] opener: &str) {
    let input = format!("a {}\n", opener.repeat(20_000));
    let html = timed(|| markdown_to_html(&input));
    assert!(html.starts_with("<p>a &lt;"));
    assert!(!html.contains(&format!("{opener}{opener}")));
}

#[test]
fn backtick_runs_of_growing_length() {
    let input: String = (1..=1_000)
        .map(|n| format!("{}x", "`".repeat(n)))
        .chain(std::iter::once("\n".to_string()))
        .collect();
    let html = timed(|| markdown_to_html(&input));
    assert!(!html.contains("<code>"));
}

#[test]
fn unmatched_dollars() {
    let options = Options {
        inline_math: true,
        ..Options::default()
    };
    let input = format!("{}\n", "$a ".repeat(30_000));
    let html = timed(|| markdown_to_html_with(&input, &options));
    assert!(!html.contains("math"));
}
