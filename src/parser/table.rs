/// GFM pipe tables: delimiter rows and cell splitting
use crate::ast::Alignment;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TableParse {
    pub alignments: Vec<Alignment>,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A table found inside paragraph content, with the number of content
/// lines that precede it and stay a paragraph
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TableMatch {
    pub leading_lines: usize,
    pub table: TableParse,
}

/// Parse a delimiter row such as `| :--- | ---: |`
pub(crate) fn parse_delimiter_row(line: &str) -> Option<Vec<Alignment>> {
    let line = line.trim();
    if line.is_empty() || !line.bytes().all(|b| matches!(b, b'|' | b'-' | b':' | b' ' | b'\t')) {
        return None;
    }
    let has_pipe = line.contains('|');
    let cells = split_row(line);
    if cells.is_empty() {
        return None;
    }
    let mut alignments = Vec::with_capacity(cells.len());
    for cell in &cells {
        let left = cell.starts_with(':');
        let right = cell.ends_with(':');
        let dashes = cell.trim_matches(':');
        if dashes.is_empty() || !dashes.bytes().all(|b| b == b'-') {
            return None;
        }
        alignments.push(match (left, right) {
            (true, true) => Alignment::Center,
            (true, false) => Alignment::Left,
            (false, true) => Alignment::Right,
            (false, false) => Alignment::None,
        });
    }
    // A bare `---` underline belongs to a setext heading
    if !has_pipe && alignments == [Alignment::None] {
        return None;
    }
    Some(alignments)
}

/// Split a row on unescaped pipes, dropping the optional outer pipes.
/// `\|` becomes a literal pipe inside the cell.
pub(crate) fn split_row(line: &str) -> Vec<String> {
    let mut line = line.trim();
    if let Some(rest) = line.strip_prefix('|') {
        line = rest;
    }
    if line.ends_with('|') && !line.ends_with("\\|") {
        line = &line[..line.len() - 1];
    }

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push('|');
                chars.next();
            }
            '|' => {
                cells.push(cell.trim().to_string());
                cell.clear();
            }
            _ => cell.push(c),
        }
    }
    if !cells.is_empty() || !cell.trim().is_empty() || !line.is_empty() {
        cells.push(cell.trim().to_string());
    }
    cells
}

fn fit_row(mut cells: Vec<String>, width: usize) -> Vec<String> {
    cells.resize(width, String::new());
    cells
}

/// Parse `content` as a complete table: header row, delimiter row, body rows
pub(crate) fn parse_table(content: &str) -> Option<TableParse> {
    let lines: Vec<&str> = content.lines().collect();
    parse_lines(&lines)
}

fn parse_lines(lines: &[&str]) -> Option<TableParse> {
    if lines.len() < 2 {
        return None;
    }
    let alignments = parse_delimiter_row(lines[1])?;
    let header = split_row(lines[0]);
    if header.len() != alignments.len() {
        return None;
    }
    let width = alignments.len();
    let rows = lines[2..]
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| fit_row(split_row(line), width))
        .collect();
    Some(TableParse {
        alignments,
        header,
        rows,
    })
}

/// Find a table that starts at some line of `content`
pub(crate) fn find_table(content: &str) -> Option<TableMatch> {
    let lines: Vec<&str> = content.lines().collect();
    (0..lines.len().saturating_sub(1)).find_map(|start| {
        parse_lines(&lines[start..]).map(|table| TableMatch {
            leading_lines: start,
            table,
        })
    })
}
