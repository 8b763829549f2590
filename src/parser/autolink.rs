/// GFM extended autolinks found inside plain text
use crate::options::DomainSuffixes;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Text(String),
    Link { destination: String, text: String },
}

const URL_PREFIXES: [&str; 4] = ["www.", "http://", "https://", "ftp://"];

fn is_boundary(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '*' | '_' | '~' | '('),
    }
}

fn is_domain_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Validate a host such as `www.commonmark.org`
fn valid_domain(domain: &str, suffixes: &DomainSuffixes) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    for label in &labels {
        if label.is_empty() || label.starts_with('-') || label.ends_with('-') {
            return false;
        }
    }
    if labels[labels.len() - 2..].iter().any(|l| l.contains('_')) {
        return false;
    }
    let last = labels[labels.len() - 1];
    last.bytes().all(|b| b.is_ascii_digit()) || suffixes.contains(last)
}

/// Drop trailing punctuation, unbalanced `)` and a trailing entity reference
fn trim_link_end(link: &str) -> &str {
    let mut link = link;
    loop {
        let Some(last) = link.chars().last() else {
            return link;
        };
        if matches!(last, '?' | '!' | '.' | ',' | ':' | '*' | '_' | '~') {
            link = &link[..link.len() - 1];
        } else if last == ')' && link.matches(')').count() > link.matches('(').count() {
            link = &link[..link.len() - 1];
        } else if last == ';' {
            let body = &link[..link.len() - 1];
            let name_len = body
                .bytes()
                .rev()
                .take_while(|b| b.is_ascii_alphanumeric())
                .count();
            if name_len > 0 && body[..body.len() - name_len].ends_with('&') {
                link = &body[..body.len() - name_len - 1];
            } else {
                return link;
            }
        } else {
            return link;
        }
    }
}

/// Try a URL autolink at the start of `text`. Returns (destination, length).
fn match_url(text: &str, suffixes: &DomainSuffixes) -> Option<(String, usize)> {
    let prefix = URL_PREFIXES
        .iter()
        .find(|p| text.get(..p.len()).is_some_and(|s| s.eq_ignore_ascii_case(p)))?;
    let end = text
        .find(|c: char| c.is_whitespace() || c == '<')
        .unwrap_or(text.len());
    let link = trim_link_end(&text[..end]);

    let host_start = if *prefix == "www." { 0 } else { prefix.len() };
    let host = &link[host_start..];
    let host_len = host.find(|c| !is_domain_char(c)).unwrap_or(host.len());
    if !valid_domain(&host[..host_len], suffixes) {
        return None;
    }
    let destination = if *prefix == "www." {
        format!("http://{}", link)
    } else {
        link.to_string()
    };
    Some((destination, link.len()))
}

fn is_email_local(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | '_')
}

/// Try an e-mail autolink around the `@` at `at`, never reaching before
/// `floor`. Returns (start, end) of the address.
fn match_email(text: &str, at: usize, floor: usize) -> Option<(usize, usize)> {
    let local_len = text[floor..at]
        .chars()
        .rev()
        .take_while(|&c| is_email_local(c))
        .count();
    if local_len == 0 {
        return None;
    }
    let start = at - local_len;
    let domain_len = text[at + 1..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(text.len() - at - 1);
    let mut domain = &text[at + 1..at + 1 + domain_len];
    if domain.ends_with('.') {
        domain = &domain[..domain.len() - 1];
    }
    if domain.ends_with('-') || domain.ends_with('_') || !domain.contains('.') {
        return None;
    }
    if domain.split('.').any(str::is_empty) {
        return None;
    }
    Some((start, at + 1 + domain.len()))
}

/// Split text into plain runs and extended autolinks
pub(crate) fn split(text: &str, suffixes: &DomainSuffixes) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    let mut prev: Option<char> = None;
    for (i, c) in text.char_indices() {
        if i < last {
            prev = Some(c);
            continue;
        }
        if matches!(c, 'w' | 'W' | 'h' | 'H' | 'f' | 'F')
            && is_boundary(prev)
            && let Some((destination, len)) = match_url(&text[i..], suffixes)
        {
            if i > last {
                segments.push(Segment::Text(text[last..i].to_string()));
            }
            segments.push(Segment::Link {
                destination,
                text: text[i..i + len].to_string(),
            });
            last = i + len;
        } else if c == '@'
            && let Some((start, end)) = match_email(text, i, last)
        {
            if start > last {
                segments.push(Segment::Text(text[last..start].to_string()));
            }
            let address = &text[start..end];
            segments.push(Segment::Link {
                destination: format!("mailto:{}", address),
                text: address.to_string(),
            });
            last = end;
        }
        prev = Some(c);
    }
    if last < text.len() {
        segments.push(Segment::Text(text[last..].to_string()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(text: &str) -> Vec<(String, String)> {
        split(text, &DomainSuffixes::default())
            .into_iter()
            .filter_map(|s| match s {
                Segment::Link { destination, text } => Some((destination, text)),
                Segment::Text(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_www_link() {
        assert_eq!(
            links("see www.commonmark.org/help for more"),
            vec![(
                "http://www.commonmark.org/help".to_string(),
                "www.commonmark.org/help".to_string()
            )]
        );
    }

    #[test]
    fn test_rejects_bad_domains() {
        assert!(links("www.-x.com").is_empty());
        assert!(links("www.x-.com").is_empty());
        assert!(links("www.commonmark").is_empty());
        assert!(links("www.example.nosuchtld").is_empty());
        assert!(links("awww.example.com").is_empty());
    }

    #[test]
    fn test_trailing_punctuation() {
        assert_eq!(
            links("Visit https://example.com/path?q=1.")[0].1,
            "https://example.com/path?q=1"
        );
        assert_eq!(
            links("(www.google.com/search?q=Markup+(business))")[0].1,
            "www.google.com/search?q=Markup+(business)"
        );
        assert_eq!(
            links("www.google.com/search?q=commonmark&hl;")[0].1,
            "www.google.com/search?q=commonmark"
        );
    }

    #[test]
    fn test_email() {
        assert_eq!(
            links("mail foo@bar.baz now"),
            vec![("mailto:foo@bar.baz".to_string(), "foo@bar.baz".to_string())]
        );
        assert_eq!(links("a.b-c_d@a.b.")[0].1, "a.b-c_d@a.b");
        assert!(links("a.b-c_d@a.b-").is_empty());
        assert!(links("a.b-c_d@a.b_").is_empty());
        assert!(links("@nothing.com").is_empty());
    }

    #[test]
    fn test_segments_keep_text() {
        let segments = split("x www.a.com y", &DomainSuffixes::default());
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Text("x ".to_string()));
        assert_eq!(segments[2], Segment::Text(" y".to_string()));
    }
}
