// SPDX-License-Identifier: AGPL-3.0-or-later
//! Markdown to tree: block scanner
//!
//! Lines are split into blocks by what starts at column 0. Container
//! bodies (list items, quotes, block tags) are stripped of their prefix
//! and scanned again, so nesting never needs a global stack.

use super::inline::parse_inline;
use super::table;
use crate::ast::{Node, NodeKind};
use crate::grammar::{
    close_line, find_close, node_from_tag, open_line, parse_open_marker, DecodedTag, GrammarError,
};
use crate::traits::{ConversionError, Diagnostic, ParseConfig, Parsed, Result};
use tracing::{debug, warn};

/// Parse annotated Markdown into a `doc` tree. Lines end at `\n` only; a
/// carriage return is content.
pub fn parse(input: &str, config: &ParseConfig) -> Result<Parsed> {
    let lines: Vec<String> = input.split('\n').map(str::to_string).collect();
    let mut parser = BlockParser {
        config,
        diagnostics: Vec::new(),
    };
    let mut blocks = parser.blocks(&lines, 1);

    let mut doc = if blocks.len() == 1 && blocks[0].kind == NodeKind::Doc {
        blocks.remove(0)
    } else {
        Node::doc(blocks)
    };
    doc.canonicalize();

    let diagnostics = parser.diagnostics;
    if config.strict {
        if let Some(Diagnostic::GrammarMismatch {
            line,
            kind,
            message,
        }) = diagnostics
            .iter()
            .find(|d| matches!(d, Diagnostic::GrammarMismatch { .. }))
        {
            return Err(ConversionError::GrammarMismatch {
                line: *line,
                message: format!("ADF:{kind}: {message}"),
            });
        }
    }
    debug!(
        lines = lines.len(),
        blocks = doc.content.len(),
        diagnostics = diagnostics.len(),
        "parsed document"
    );
    Ok(Parsed { doc, diagnostics })
}

pub(crate) struct BlockParser<'a> {
    config: &'a ParseConfig,
    diagnostics: Vec<Diagnostic>,
}

/// Block-form open marker; inline kinds never open blocks
fn block_open(line: &str) -> Option<std::result::Result<DecodedTag, GrammarError>> {
    match open_line(line)? {
        Ok(tag) if NodeKind::from_name(&tag.kind).is_inline() => None,
        other => Some(other),
    }
}

fn block_close(line: &str) -> Option<String> {
    close_line(line).filter(|kind| !NodeKind::from_name(kind).is_inline())
}

/// Index of the close line matching a block open of `kind`. Lines inside
/// fenced code are skipped.
fn find_block_close(lines: &[String], from: usize, kind: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut fence: Option<usize> = None;
    for (j, line) in lines.iter().enumerate().skip(from) {
        if let Some(width) = fence {
            if is_closing_fence(line, width) {
                fence = None;
            }
            continue;
        }
        if let Some(width) = fence_width(line) {
            fence = Some(width);
            continue;
        }
        if matches!(block_open(line), Some(Ok(ref tag)) if tag.kind == kind) {
            depth += 1;
        } else if block_close(line).as_deref() == Some(kind) {
            if depth == 0 {
                return Some(j);
            }
            depth -= 1;
        }
    }
    None
}

/// An inline-form tag of a block-level kind that starts a line and closes
/// at the end of that line or a later one. Returns the tag, its body and
/// the index of the line after the close.
fn lifted_tag(lines: &[String], i: usize) -> Option<(DecodedTag, String, usize)> {
    let (decoded, open_len) = parse_open_marker(&lines[i])?;
    let tag = decoded.ok()?;
    if NodeKind::from_name(&tag.kind).is_inline() {
        return None;
    }
    let text = lines[i..].join("\n");
    let rest = &text[open_len..];
    let (close_start, close_end) = find_close(rest, &tag.kind)?;
    let after = &rest[close_end..];
    let line_end = after.find('\n').unwrap_or(after.len());
    if !after[..line_end].trim().is_empty() {
        return None;
    }
    let spanned = rest[..close_end].matches('\n').count();
    Some((tag, rest[..close_start].to_string(), i + spanned + 1))
}

fn fence_width(line: &str) -> Option<usize> {
    let width = line.chars().take_while(|&c| c == '`').count();
    (width >= 3 && !line[width..].contains('`')).then_some(width)
}

fn is_closing_fence(line: &str, width: usize) -> bool {
    let t = line.trim_end();
    t.len() >= width && t.chars().all(|c| c == '`')
}

fn is_rule(line: &str) -> bool {
    let t = line.trim_end();
    t.len() >= 3 && t.chars().all(|c| c == '-')
}

/// `- `, `-`, `N. ` or `N.` at column 0: (ordered, rest of line)
fn list_marker(line: &str) -> Option<(bool, &str)> {
    if line == "-" {
        return Some((false, ""));
    }
    if let Some(rest) = line.strip_prefix("- ") {
        return Some((false, rest));
    }
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    let after = &line[digits..];
    if after == "." {
        return Some((true, ""));
    }
    after.strip_prefix(". ").map(|rest| (true, rest))
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &line[level..];
    if rest.is_empty() {
        return Some((level, ""));
    }
    rest.strip_prefix(' ').map(|text| (level, text))
}

impl BlockParser<'_> {
    pub(crate) fn record(&mut self, diagnostics: Vec<Diagnostic>) {
        for diagnostic in diagnostics {
            warn!(%diagnostic, "recovered attribute");
            self.diagnostics.push(diagnostic);
        }
    }

    fn mismatch(&mut self, line: usize, kind: &str, message: &str) {
        let diagnostic = Diagnostic::GrammarMismatch {
            line,
            kind: kind.to_string(),
            message: message.to_string(),
        };
        warn!(%diagnostic, "kept annotation as literal text");
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn inline(&mut self, text: &str, line: usize) -> Vec<Node> {
        parse_inline(text, line, &mut self.diagnostics)
    }

    fn is_block_start(&self, lines: &[String], i: usize) -> bool {
        let line = lines[i].as_str();
        block_open(line).is_some()
            || block_close(line).is_some()
            || fence_width(line).is_some()
            || line.starts_with('>')
            || is_rule(line)
            || list_marker(line).is_some()
            || heading(line).is_some()
            || lifted_tag(lines, i).is_some()
            || table::is_table_start(lines, i)
    }

    /// Parse lines into blocks. `base` is the source line number of
    /// `lines[0]`.
    pub(crate) fn blocks(&mut self, lines: &[String], base: usize) -> Vec<Node> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].as_str();
            let line_no = base + i;

            if line.trim().is_empty() {
                i += 1;
                continue;
            }

            if let Some(opened) = block_open(line) {
                match opened {
                    Ok(tag) => match find_block_close(lines, i + 1, &tag.kind) {
                        Some(end) => {
                            out.push(self.block_tag(tag, &lines[i + 1..end], line_no + 1));
                            i = end + 1;
                            continue;
                        }
                        None => self.mismatch(line_no, &tag.kind, "open without close"),
                    },
                    Err(err) => self.mismatch(line_no, "?", &err.to_string()),
                }
                out.push(Node::paragraph(vec![Node::text(line)]));
                i += 1;
                continue;
            }

            if let Some(kind) = block_close(line) {
                self.mismatch(line_no, &kind, "close without open");
                out.push(Node::paragraph(vec![Node::text(line)]));
                i += 1;
                continue;
            }

            if let Some(width) = fence_width(line) {
                let (node, next) = code_block(lines, i, width);
                out.push(node);
                i = next;
                continue;
            }

            if line.starts_with('>') {
                let end = lines[i..]
                    .iter()
                    .position(|l| !l.starts_with('>'))
                    .map_or(lines.len(), |p| i + p);
                let body: Vec<String> = lines[i..end]
                    .iter()
                    .map(|l| {
                        l.strip_prefix("> ")
                            .or_else(|| l.strip_prefix('>'))
                            .unwrap_or_default()
                            .to_string()
                    })
                    .collect();
                let content = self.blocks(&body, line_no);
                out.push(Node::new(NodeKind::Blockquote).with_content(content));
                i = end;
                continue;
            }

            if is_rule(line) {
                out.push(Node::new(NodeKind::Rule));
                i += 1;
                continue;
            }

            if list_marker(line).is_some() {
                let (list, next) = self.list(lines, i, base);
                out.push(list);
                i = next;
                continue;
            }

            if let Some((level, text)) = heading(line) {
                let content = self.inline(text, line_no);
                out.push(Node::heading(level as i64, content));
                i += 1;
                continue;
            }

            if let Some((tag, body, next)) = lifted_tag(lines, i) {
                out.push(self.lifted(tag, &body, line_no));
                i = next;
                continue;
            }

            if table::is_table_start(lines, i) {
                let end = lines[i..]
                    .iter()
                    .position(|l| !l.starts_with('|'))
                    .map_or(lines.len(), |p| i + p);
                out.push(table::parse_plain_table(self, &lines[i..end], line_no));
                i = end;
                continue;
            }

            let start = i;
            i += 1;
            while i < lines.len() && !lines[i].trim().is_empty() && !self.is_block_start(lines, i) {
                i += 1;
            }
            let content = self.inline(&lines[start..i].join("\n"), line_no);
            out.push(Node::paragraph(content));
        }
        out
    }

    fn list(&mut self, lines: &[String], start: usize, base: usize) -> (Node, usize) {
        let ordered = matches!(list_marker(&lines[start]), Some((true, _)));
        let indent = self.config.indent.clone();
        let mut items = Vec::new();
        let mut i = start;

        while i < lines.len() {
            let Some((is_ordered, first)) = list_marker(&lines[i]) else {
                break;
            };
            if is_ordered != ordered {
                break;
            }
            let item_line = base + i;
            let mut body = vec![first.to_string()];
            i += 1;
            while i < lines.len() {
                let line = &lines[i];
                if !indent.is_empty() {
                    if let Some(stripped) = line.strip_prefix(indent.as_str()) {
                        body.push(stripped.to_string());
                        i += 1;
                        continue;
                    }
                }
                if line.trim().is_empty() {
                    let next = (i..lines.len()).find(|&k| !lines[k].trim().is_empty());
                    if let Some(k) = next.filter(|&k| lines[k].starts_with(indent.as_str())) {
                        body.extend(std::iter::repeat(String::new()).take(k - i));
                        i = k;
                        continue;
                    }
                }
                break;
            }
            let content = self.blocks(&body, item_line);
            items.push(Node::new(NodeKind::ListItem).with_content(content));
        }

        let kind = if ordered {
            NodeKind::OrderedList
        } else {
            NodeKind::BulletList
        };
        (Node::new(kind).with_content(items), i)
    }

    /// Inline content of a tagged paragraph, heading or caption. A block-form
    /// tag of an unknown kind on lines of its own is an inline child holding
    /// blocks; the line breaks around it belong to the tag.
    fn inline_lines(&mut self, body: &[String], base: usize) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i < body.len() {
            let opened = match block_open(&body[i]) {
                Some(Ok(tag)) if matches!(NodeKind::from_name(&tag.kind), NodeKind::Unknown(_)) => {
                    find_block_close(body, i + 1, &tag.kind).map(|end| (tag, end))
                }
                _ => None,
            };
            let Some((tag, end)) = opened else {
                i += 1;
                continue;
            };
            if i > start {
                nodes.extend(self.inline(&body[start..i].join("\n"), base + start));
            }
            nodes.push(self.block_tag(tag, &body[i + 1..end], base + i + 1));
            i = end + 1;
            start = i;
        }
        if start < body.len() {
            nodes.extend(self.inline(&body[start..].join("\n"), base + start));
        }
        nodes
    }

    fn lifted(&mut self, tag: DecodedTag, body: &str, line: usize) -> Node {
        let (mut node, diagnostics) = node_from_tag(tag);
        self.record(diagnostics);
        if !node.kind.is_leaf() {
            node.content = self.inline(body, line);
        }
        node
    }

    /// Node for a block-form tag around `body`
    fn block_tag(&mut self, tag: DecodedTag, body: &[String], base: usize) -> Node {
        let (mut node, diagnostics) = node_from_tag(tag);
        self.record(diagnostics);
        let kind = node.kind.clone();

        match kind {
            NodeKind::Table => return table::parse_table(self, node, body, base),
            NodeKind::Paragraph | NodeKind::Caption => {
                node.content = self.inline_lines(body, base);
            }
            NodeKind::Heading if node.attrs.contains_key("level") => {
                node.content = self.inline_lines(body, base);
            }
            NodeKind::Panel => {
                let mut blocks = self.blocks(body, base);
                if blocks.len() == 1 && blocks[0].kind == NodeKind::Blockquote {
                    blocks = blocks.remove(0).content;
                }
                let labelled = node.attr_str("panelType").is_some_and(|t| !t.is_empty());
                drop_label(&mut blocks, labelled);
                node.content = blocks;
            }
            NodeKind::Expand | NodeKind::NestedExpand => {
                let mut blocks = self.blocks(body, base);
                let titled = node.attr_str("title").is_some_and(|t| !t.is_empty());
                drop_label(&mut blocks, titled);
                node.content = blocks;
            }
            NodeKind::Heading
            | NodeKind::CodeBlock
            | NodeKind::BulletList
            | NodeKind::OrderedList
            | NodeKind::Blockquote
            | NodeKind::Rule => {
                let mut blocks = self.blocks(body, base);
                if blocks.len() == 1 && blocks[0].kind == kind {
                    // overlay: the tag only carries what Markdown could not
                    let mut native = blocks.remove(0);
                    native.attrs.extend(node.attrs);
                    native.marks.extend(node.marks);
                    return native;
                }
                node.content = blocks;
            }
            _ if kind.is_leaf() => {}
            _ => node.content = self.blocks(body, base),
        }
        node
    }
}

fn drop_label(blocks: &mut Vec<Node>, labelled: bool) {
    if labelled && blocks.first().is_some_and(|b| b.kind == NodeKind::Paragraph) {
        blocks.remove(0);
    }
}

fn code_block(lines: &[String], start: usize, width: usize) -> (Node, usize) {
    let info = lines[start][width..].trim();
    let mut end = start + 1;
    while end < lines.len() && !is_closing_fence(&lines[end], width) {
        end += 1;
    }
    let code = lines[start + 1..end].join("\n");
    let next = (end + 1).min(lines.len());

    let mut node = Node::new(NodeKind::CodeBlock);
    if !info.is_empty() {
        node = node.with_attr("language", info);
    }
    if !code.is_empty() {
        node.content.push(Node::text(code));
    }
    (node, next)
}
