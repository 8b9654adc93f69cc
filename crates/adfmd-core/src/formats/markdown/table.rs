// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tables: pipe rows inside a `table` tag, one cell tag per cell
//!
//! Markdown has no span syntax, so every column a span covers (beyond the
//! cell that owns it) is written as an empty `||` slot. Rows keep the full
//! column count for plain Markdown readers; the owning cell's attributes
//! say which slots belong to it.

use super::parser::BlockParser;
use super::serializer::{block_form, tag_for, Serializer};
use crate::ast::{AttrValue, Node, NodeKind};
use crate::grammar::{find_close, node_from_tag, parse_open_marker};
use crate::schema::{child_path, violation};
use crate::traits::Result;
use tracing::trace;

/// Spans wider or taller than this are rejected
const MAX_SPAN: usize = 1000;

/// Per-table record of how many more rows each column stays covered by a
/// rowspan from an earlier row
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanTracker {
    remaining: Vec<u32>,
}

impl SpanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a row: returns which columns are covered from above and moves
    /// every open span down one row
    pub fn next_row(&mut self) -> Vec<bool> {
        let covered = self.remaining.iter().map(|r| *r > 0).collect();
        for r in &mut self.remaining {
            *r = r.saturating_sub(1);
        }
        covered
    }

    /// Record a cell at `col` spanning `colspan` columns and `rowspan` rows
    pub fn start(&mut self, col: usize, colspan: usize, rowspan: usize) {
        let end = col + colspan;
        if self.remaining.len() < end {
            self.remaining.resize(end, 0);
        }
        let below = u32::try_from(rowspan.saturating_sub(1)).unwrap_or(u32::MAX);
        for r in &mut self.remaining[col..end] {
            *r = below;
        }
    }
}

fn is_covered(covered: &[bool], col: usize) -> bool {
    covered.get(col).copied().unwrap_or(false)
}

fn span_attr(cell: &Node, name: &str, path: &str) -> Result<usize> {
    match cell.attr(name) {
        None | Some(AttrValue::Null) => Ok(1),
        Some(value) => match value.as_i64() {
            Some(n) if n < 1 => Err(violation(path, format!("{name} {n} is less than 1"))),
            Some(n) if n as usize > MAX_SPAN => {
                Err(violation(path, format!("{name} {n} is larger than {MAX_SPAN}")))
            }
            Some(n) => Ok(n as usize),
            None => Err(violation(path, format!("{name} is not an integer"))),
        },
    }
}

fn separator(width: usize) -> String {
    let mut line = String::from("|");
    for _ in 0..width {
        line.push_str(" --- |");
    }
    line
}

pub(crate) fn serialize_table(ser: &Serializer, table: &Node, path: &str) -> Result<String> {
    let row_count = table.content.len();
    let mut tracker = SpanTracker::new();
    let mut lines = Vec::with_capacity(row_count + 1);

    for (r, row) in table.content.iter().enumerate() {
        let row_path = child_path(path, &row.kind, r);
        let covered = tracker.next_row();
        let mut slots: Vec<Option<String>> = Vec::new();
        let mut col = 0;

        for (c, cell) in row.content.iter().enumerate() {
            let cell_path = child_path(&row_path, &cell.kind, c);
            while is_covered(&covered, col) {
                slots.push(None);
                col += 1;
            }
            let colspan = span_attr(cell, "colspan", &cell_path)?;
            let rowspan = span_attr(cell, "rowspan", &cell_path)?;
            if r + rowspan > row_count {
                return Err(violation(
                    &cell_path,
                    format!("rowspan {rowspan} extends past the last row"),
                ));
            }
            if (col..col + colspan).any(|c| is_covered(&covered, c)) {
                return Err(violation(&cell_path, "cell overlaps a rowspan from above"));
            }

            let body = ser.blocks(&cell.content, &cell_path)?.replace('\n', "<br/>");
            slots.push(Some(tag_for(cell).wrap(&body)));
            slots.extend(std::iter::repeat(None).take(colspan - 1));
            tracker.start(col, colspan, rowspan);
            col += colspan;
        }
        while is_covered(&covered, col) {
            slots.push(None);
            col += 1;
        }

        let mut line = String::from("|");
        for slot in &slots {
            match slot {
                Some(cell) => {
                    line.push(' ');
                    line.push_str(cell);
                    line.push_str(" |");
                }
                None => line.push('|'),
            }
        }
        if !row.attrs.is_empty() || !row.marks.is_empty() {
            line = tag_for(row).wrap(&line);
        }
        lines.push(line);
        if r == 0 {
            lines.push(separator(slots.len()));
        }
    }

    Ok(block_form(&tag_for(table), &lines.join("\n")))
}

/// Split a row line into cell slots at unescaped pipes outside of tags.
/// The leading pipe and a trailing empty slot are dropped.
fn split_cells(line: &str) -> Vec<&str> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let mut cells = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < line.len() {
        let rest = &line[i..];
        let c = rest.chars().next().unwrap_or_default();
        match c {
            '\\' => {
                i += 1 + rest[1..].chars().next().map_or(0, char::len_utf8);
                continue;
            }
            '<' => {
                if let Some((Ok(tag), len)) = parse_open_marker(rest) {
                    if let Some((_, end)) = find_close(&rest[len..], &tag.kind) {
                        i += len + end;
                        continue;
                    }
                }
            }
            '|' => {
                cells.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += c.len_utf8();
    }
    let last = &line[start..];
    if !last.trim().is_empty() {
        cells.push(last);
    }
    cells
}

/// The `| --- |` line after the first row
fn is_separator(line: &str, require_dash: bool) -> bool {
    let t = line.trim();
    t.starts_with('|')
        && (!require_dash || t.contains('-'))
        && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// A hand-written pipe table: a row line followed by a separator
pub(crate) fn is_table_start(lines: &[String], i: usize) -> bool {
    lines[i].starts_with('|') && lines.get(i + 1).is_some_and(|l| is_separator(l, true))
}

/// Undo `<br/>` line breaks, leaving escaped ones alone
fn decode_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with('\\') {
            let len = 1 + rest[1..].chars().next().map_or(0, char::len_utf8);
            out.push_str(&rest[..len]);
            i += len;
        } else if rest.starts_with("<br/>") {
            out.push('\n');
            i += "<br/>".len();
        } else {
            let c = rest.chars().next().unwrap_or_default();
            out.push(c);
            i += c.len_utf8();
        }
    }
    out
}

/// A cell written as a single tag spanning the whole slot
fn tagged_cell(parser: &mut BlockParser, text: &str, line: usize) -> Option<Node> {
    let (decoded, open_len) = parse_open_marker(text)?;
    let tag = decoded.ok()?;
    let (close_start, close_end) = find_close(&text[open_len..], &tag.kind)?;
    if open_len + close_end != text.len() {
        return None;
    }
    let body = decode_breaks(&text[open_len..open_len + close_start]);
    let (mut cell, diagnostics) = node_from_tag(tag);
    parser.record(diagnostics);
    let lines: Vec<String> = body.split('\n').map(str::to_string).collect();
    cell.content = parser.blocks(&lines, line);
    Some(cell)
}

fn plain_cell(parser: &mut BlockParser, text: &str, header: bool, line: usize) -> Node {
    let kind = if header {
        NodeKind::TableHeader
    } else {
        NodeKind::TableCell
    };
    let inline = parser.inline(&decode_breaks(text), line);
    let content = if inline.is_empty() {
        Vec::new()
    } else {
        vec![Node::paragraph(inline)]
    };
    Node::new(kind).with_content(content)
}

/// Split off a `tableRow` tag wrapped around the whole line
fn row_tag<'l>(parser: &mut BlockParser, line: &'l str) -> (Node, &'l str) {
    let line = line.trim();
    if let Some((Ok(tag), open_len)) = parse_open_marker(line) {
        if tag.kind == NodeKind::TableRow.name() {
            if let Some((close_start, close_end)) = find_close(&line[open_len..], &tag.kind) {
                if open_len + close_end == line.len() {
                    let (row, diagnostics) = node_from_tag(tag);
                    parser.record(diagnostics);
                    return (row, &line[open_len..open_len + close_start]);
                }
            }
        }
    }
    (Node::new(NodeKind::TableRow), line)
}

fn parse_row(
    parser: &mut BlockParser,
    line: &str,
    tracker: &mut SpanTracker,
    header: bool,
    line_no: usize,
) -> Node {
    let (mut row, cells) = row_tag(parser, line);
    let covered = tracker.next_row();
    let mut pending_colspan = 0;

    for (col, slot) in split_cells(cells).into_iter().enumerate() {
        let text = slot.trim();
        if text.is_empty() {
            if pending_colspan > 0 {
                pending_colspan -= 1;
            } else if !is_covered(&covered, col) {
                row.content.push(plain_cell(parser, "", header, line_no));
            }
            continue;
        }
        let cell = tagged_cell(parser, text, line_no)
            .unwrap_or_else(|| plain_cell(parser, text, header, line_no));
        let span = |name| {
            cell.attr(name)
                .and_then(AttrValue::as_i64)
                .map_or(1, |n| n.clamp(1, MAX_SPAN as i64) as usize)
        };
        let (colspan, rowspan) = (span("colspan"), span("rowspan"));
        tracker.start(col, colspan, rowspan);
        pending_colspan = colspan - 1;
        row.content.push(cell);
    }
    trace!(cells = row.content.len(), "parsed table row");
    row
}

/// Rows of a `table` tag body
pub(crate) fn parse_table(parser: &mut BlockParser, mut table: Node, body: &[String], base: usize) -> Node {
    let mut tracker = SpanTracker::new();
    for (i, line) in body.iter().enumerate() {
        if line.trim().is_empty() || (i == 1 && is_separator(line, false)) {
            continue;
        }
        let row = parse_row(parser, line, &mut tracker, false, base + i);
        table.content.push(row);
    }
    table
}

/// A hand-written pipe table; the first row holds headers
pub(crate) fn parse_plain_table(parser: &mut BlockParser, lines: &[String], base: usize) -> Node {
    let mut tracker = SpanTracker::new();
    let mut table = Node::new(NodeKind::Table);
    for (i, line) in lines.iter().enumerate() {
        if i == 1 {
            continue;
        }
        let row = parse_row(parser, line, &mut tracker, i == 0, base + i);
        table.content.push(row);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_span_tracker() {
        let mut tracker = SpanTracker::new();
        assert!(tracker.next_row().is_empty());
        tracker.start(0, 1, 3);
        tracker.start(1, 2, 1);
        assert_eq!(tracker.next_row(), vec![true, false, false]);
        assert_eq!(tracker.next_row(), vec![true, false, false]);
        assert_eq!(tracker.next_row(), vec![false, false, false]);
    }

    #[test]
    fn test_split_cells_skips_tags_and_escapes() {
        let line = "| <!-- ADF:tableCell -->a|b<!-- /ADF:tableCell --> || c\\|d |";
        assert_eq!(
            split_cells(line),
            vec![" <!-- ADF:tableCell -->a|b<!-- /ADF:tableCell --> ", "", " c\\|d "]
        );
        assert!(split_cells("|").is_empty());
    }

    #[test]
    fn test_separator() {
        assert_eq!(separator(3), "| --- | --- | --- |");
        assert!(is_separator("|---|:--:|", true));
        assert!(!is_separator("| a |", true));
        assert!(is_separator("|", false));
    }

    #[test]
    fn test_decode_breaks() {
        assert_eq!(decode_breaks("a<br/>b"), "a\nb");
        assert_eq!(decode_breaks("a\\<br/>b"), "a\\<br/>b");
    }
}
