// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inline scanner: emphasis, strike, code spans, links and inline tags

use crate::ast::{merge_text_runs, Mark, MarkKind, Node, NodeKind};
use crate::grammar::{find_close, node_from_tag, parse_close_marker, parse_open_marker};
use crate::traits::Diagnostic;
use tracing::warn;

/// Deeper delimiter nesting is read as literal text
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closer {
    End,
    Star(usize),
    Tilde,
    Bracket,
}

/// Parse inline content. `line` is the source line used in diagnostics.
pub(crate) fn parse_inline(text: &str, line: usize, diagnostics: &mut Vec<Diagnostic>) -> Vec<Node> {
    parse_with(text, line, true, diagnostics)
}

fn parse_with(
    text: &str,
    line: usize,
    cards: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Node> {
    let mut scanner = Scanner {
        src: text,
        pos: 0,
        line,
        depth: 0,
        diagnostics,
    };
    let mut nodes = scanner.sequence(Closer::End, cards).unwrap_or_default();
    for node in &mut nodes {
        node.canonicalize();
    }
    merge_text_runs(&mut nodes);
    nodes
}

struct Scanner<'s, 'd> {
    src: &'s str,
    pos: usize,
    line: usize,
    depth: usize,
    diagnostics: &'d mut Vec<Diagnostic>,
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if let Some(last) = nodes.last_mut() {
        if last.is_text() && last.marks.is_empty() && last.attrs.is_empty() {
            last.text.get_or_insert_with(String::new).push_str(text);
            return;
        }
    }
    nodes.push(Node::text(text));
}

fn add_mark(nodes: &mut [Node], mark: &Mark) {
    for node in nodes.iter_mut().filter(|n| n.is_text()) {
        node.marks.push(mark.clone());
    }
}

fn run_length(s: &str, c: char) -> usize {
    s.chars().take_while(|&x| x == c).count()
}

impl<'s> Scanner<'s, '_> {
    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    /// Scan until `closer`. `None` when the closer never turns up; the
    /// caller then rewinds and reads the opener literally.
    fn sequence(&mut self, closer: Closer, cards: bool) -> Option<Vec<Node>> {
        let start = self.pos;
        let mut nodes: Vec<Node> = Vec::new();
        loop {
            let rest = self.rest();
            let Some(c) = rest.chars().next() else {
                return (closer == Closer::End).then_some(nodes);
            };
            let has_content = self.pos > start;

            match (closer, c) {
                (Closer::Star(1), '*') if has_content => {
                    self.pos += 1;
                    return Some(nodes);
                }
                (Closer::Star(2), '*') if has_content && run_length(rest, '*') >= 2 => {
                    self.pos += 2;
                    return Some(nodes);
                }
                (Closer::Tilde, '~') if has_content && rest.starts_with("~~") => {
                    self.pos += 2;
                    return Some(nodes);
                }
                (Closer::Bracket, ']') => {
                    self.pos += 1;
                    return Some(nodes);
                }
                _ => {}
            }

            match c {
                '\\' => {
                    let next = rest[1..].chars().next();
                    match next {
                        Some(p) if p.is_ascii_punctuation() => {
                            push_text(&mut nodes, &p.to_string());
                            self.pos += 1 + p.len_utf8();
                        }
                        _ => {
                            push_text(&mut nodes, "\\");
                            self.pos += 1;
                        }
                    }
                }
                ' ' if rest.starts_with("  \n") => {
                    nodes.push(Node::new(NodeKind::HardBreak));
                    self.pos += 3;
                }
                '`' => self.code_span(&mut nodes),
                '*' => {
                    let take = if run_length(rest, '*') >= 2 { 2 } else { 1 };
                    let kind = if take == 2 { MarkKind::Strong } else { MarkKind::Em };
                    self.delimited(&mut nodes, Closer::Star(take), take, Mark::new(kind));
                }
                '~' if rest.starts_with("~~") => {
                    self.delimited(&mut nodes, Closer::Tilde, 2, Mark::new(MarkKind::Strike));
                }
                '[' => self.link(&mut nodes, cards),
                '<' if rest.starts_with(crate::grammar::OPEN_PREFIX) => self.tag(&mut nodes),
                '<' if rest.starts_with(crate::grammar::CLOSE_PREFIX) => {
                    match parse_close_marker(rest) {
                        Some((kind, len)) => {
                            self.mismatch(&kind, "close without open");
                            push_text(&mut nodes, &rest[..len]);
                            self.pos += len;
                        }
                        None => {
                            push_text(&mut nodes, "<");
                            self.pos += 1;
                        }
                    }
                }
                _ => {
                    push_text(&mut nodes, &rest[..c.len_utf8()]);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn delimited(&mut self, nodes: &mut Vec<Node>, closer: Closer, width: usize, mark: Mark) {
        let src = self.src;
        let saved = self.pos;
        let literal = &src[saved..saved + width];
        if self.depth >= MAX_DEPTH {
            push_text(nodes, literal);
            self.pos += width;
            return;
        }
        self.pos += width;
        self.depth += 1;
        let inner = self.sequence(closer, false);
        self.depth -= 1;
        match inner {
            Some(mut inner) => {
                add_mark(&mut inner, &mark);
                nodes.extend(inner);
            }
            None => {
                self.pos = saved + width;
                push_text(nodes, literal);
            }
        }
    }

    fn code_span(&mut self, nodes: &mut Vec<Node>) {
        let rest = self.rest();
        let width = run_length(rest, '`');
        let body_start = width;
        let mut i = body_start;
        while i < rest.len() {
            let run = run_length(&rest[i..], '`');
            if run == 0 {
                i += rest[i..].chars().next().map_or(1, char::len_utf8);
                continue;
            }
            if run == width {
                let mut code = &rest[body_start..i];
                if code.len() >= 2
                    && code.starts_with(' ')
                    && code.ends_with(' ')
                    && !code.trim().is_empty()
                {
                    code = &code[1..code.len() - 1];
                }
                nodes.push(Node::text(code).with_mark(Mark::new(MarkKind::Code)));
                self.pos += i + width;
                return;
            }
            i += run;
        }
        push_text(nodes, &rest[..width]);
        self.pos += width;
    }

    fn link(&mut self, nodes: &mut Vec<Node>, cards: bool) {
        let src = self.src;
        let saved = self.pos;
        if self.depth >= MAX_DEPTH {
            push_text(nodes, "[");
            self.pos += 1;
            return;
        }
        self.pos += 1;
        self.depth += 1;
        let label = self.sequence(Closer::Bracket, false);
        self.depth -= 1;

        let target = label.and_then(|label| {
            let label_raw = &src[saved + 1..self.pos - 1];
            let rest = self.rest().strip_prefix('(')?;
            let (href_raw, len) = read_href(rest)?;
            Some((label, label_raw, href_raw, len))
        });
        let Some((mut label, label_raw, href_raw, len)) = target else {
            self.pos = saved + 1;
            push_text(nodes, "[");
            return;
        };
        self.pos += 1 + len;
        let href = unescape_href(href_raw);

        let plain = matches!(label.as_slice(), [only] if only.is_text() && only.marks.is_empty());
        if cards && plain && label_raw == href_raw {
            nodes.push(Node::new(NodeKind::InlineCard).with_attr("url", href));
            return;
        }
        add_mark(&mut label, &Mark::link(&href));
        nodes.extend(label);
    }

    fn tag(&mut self, nodes: &mut Vec<Node>) {
        let rest = self.rest();
        let Some((decoded, open_len)) = parse_open_marker(rest) else {
            push_text(nodes, "<");
            self.pos += 1;
            return;
        };
        let tag = match decoded {
            Ok(tag) => tag,
            Err(err) => {
                self.mismatch("?", &err.to_string());
                push_text(nodes, &rest[..open_len]);
                self.pos += open_len;
                return;
            }
        };
        let Some((close_start, close_end)) = find_close(&rest[open_len..], &tag.kind) else {
            self.mismatch(&tag.kind, "open without close");
            push_text(nodes, &rest[..open_len]);
            self.pos += open_len;
            return;
        };
        let body = &rest[open_len..open_len + close_start];
        self.pos += open_len + close_end;

        let (mut node, diagnostics) = node_from_tag(tag);
        for diagnostic in diagnostics {
            warn!(%diagnostic, "recovered attribute");
            self.diagnostics.push(diagnostic);
        }
        if node.kind == NodeKind::Text {
            let mut inner = parse_with(body, self.line, false, self.diagnostics);
            for child in inner.iter_mut().filter(|n| n.is_text()) {
                child.marks.extend(node.marks.iter().cloned());
                child.attrs.extend(node.attrs.clone());
            }
            nodes.extend(inner);
        } else if node.kind.is_leaf() {
            nodes.push(node);
        } else {
            node.content = parse_with(body, self.line, true, self.diagnostics);
            nodes.push(node);
        }
    }

    fn mismatch(&mut self, kind: &str, message: &str) {
        let diagnostic = Diagnostic::GrammarMismatch {
            line: self.line,
            kind: kind.to_string(),
            message: message.to_string(),
        };
        warn!(%diagnostic, "kept annotation as literal text");
        self.diagnostics.push(diagnostic);
    }
}

/// Raw href up to the unescaped `)`, and the length consumed including it
fn read_href(s: &str) -> Option<(&str, usize)> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ')' => return Some((&s[..i], i + 1)),
            _ => {}
        }
    }
    None
}

fn unescape_href(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match (c, chars.clone().next()) {
            ('\\', Some(p)) if p.is_ascii_punctuation() => {
                out.push(p);
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}
