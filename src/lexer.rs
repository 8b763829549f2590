/// Input normalization and the positioned line stream fed to the block builder

/// Normalize raw input: every line ending becomes `\n`, NUL becomes
/// U+FFFD, and the text always ends with a newline.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 1);
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(c),
        }
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// One source line including its trailing newline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Byte offset of the line in the normalized input
    pub start: usize,
    pub text: &'a str,
}

/// Iterator over the lines of normalized input
pub struct Lines<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lines<'a> {
    pub fn new(input: &'a str) -> Self {
        Lines { input, pos: 0 }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Line<'a>> {
        if self.pos >= self.input.len() {
            return None;
        }
        let rest = &self.input[self.pos..];
        let len = rest.find('\n').map_or(rest.len(), |i| i + 1);
        let line = Line {
            start: self.pos,
            text: &rest[..len],
        };
        self.pos += len;
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_normalize_nul_and_final_newline() {
        assert_eq!(normalize("a\0b"), "a\u{FFFD}b\n");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_lines_carry_offsets() {
        let text = normalize("# hi\n\nbody");
        let lines: Vec<_> = Lines::new(&text).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "# hi\n");
        assert_eq!(lines[1].start, 5);
        assert_eq!(lines[2].text, "body\n");
        assert_eq!(lines[2].start, 6);
    }
}
