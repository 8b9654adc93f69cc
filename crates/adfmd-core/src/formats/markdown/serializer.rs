// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tree to Markdown
//!
//! Constructs with a native Markdown form are written natively; everything
//! else goes through an annotation tag. Native blocks that carry attributes
//! Markdown cannot hold are wrapped in an "overlay" tag of their own kind
//! holding just those attributes.

use super::table;
use crate::ast::{AttrValue, Attrs, Mark, MarkKind, Node, NodeKind};
use crate::grammar::Tag;
use crate::schema::{child_path, validate, violation};
use crate::traits::{RenderConfig, Result};
use tracing::debug;

/// Serialize a tree to annotated Markdown
pub fn serialize(doc: &Node, config: &RenderConfig) -> Result<String> {
    validate(doc)?;
    let serializer = Serializer { config };
    let path = doc.kind.name().to_string();

    let out = if doc.kind == NodeKind::Doc {
        let body = serializer.blocks(&doc.content, &path)?;
        if doc.attrs.is_empty() && doc.marks.is_empty() && !config.annotate_doc {
            body
        } else {
            block_form(&tag_for(doc), &body)
        }
    } else {
        serializer.block(doc, &path)?
    };
    debug!(blocks = doc.content.len(), bytes = out.len(), "serialized document");

    if out.is_empty() {
        Ok(out)
    } else {
        Ok(out + "\n")
    }
}

pub(crate) struct Serializer<'a> {
    config: &'a RenderConfig,
}

/// Tag carrying every attribute and mark of a node
pub(crate) fn tag_for(node: &Node) -> Tag {
    Tag::new(&node.kind)
        .with_attrs(&node.attrs)
        .with_marks(&node.marks)
}

/// Open marker and close marker on their own lines around `body`
pub(crate) fn block_form(tag: &Tag, body: &str) -> String {
    if body.is_empty() {
        format!("{}\n{}", tag.open(), tag.close())
    } else {
        format!("{}\n{}\n{}", tag.open(), body, tag.close())
    }
}

/// Inline-form tag around inline text. A body whose first line is blank,
/// or that ends with a line break, gets an empty `text` annotation there,
/// so neither marker fills a line of its own.
fn wrap_inline(tag: &Tag, text: &str) -> String {
    let guard = Tag::new(&NodeKind::Text).wrap("");
    let mut body = String::with_capacity(text.len() + 2 * guard.len());
    if let Some((first, _)) = text.split_once('\n') {
        if first.trim_end().is_empty() {
            body.push_str(&guard);
        }
    }
    body.push_str(text);
    if text.ends_with('\n') {
        body.push_str(&guard);
    }
    tag.wrap(&body)
}

fn overlay(node: &Node, native: String, extra: &Attrs) -> String {
    if extra.is_empty() && node.marks.is_empty() {
        return native;
    }
    let tag = Tag::new(&node.kind).with_attrs(extra).with_marks(&node.marks);
    block_form(&tag, &native)
}

/// Prefix every line with `> `; empty lines become a bare `>`
fn quote(body: &str) -> String {
    if body.is_empty() {
        return ">".to_string();
    }
    body.split('\n')
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Serializer<'_> {
    pub(crate) fn blocks(&self, nodes: &[Node], path: &str) -> Result<String> {
        let rendered = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| self.block(node, &child_path(path, &node.kind, i)))
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join("\n\n"))
    }

    fn block(&self, node: &Node, path: &str) -> Result<String> {
        match &node.kind {
            NodeKind::Paragraph => self.paragraph(node, path),
            NodeKind::Heading => self.heading(node, path),
            NodeKind::Blockquote => {
                let native = quote(&self.blocks(&node.content, path)?);
                Ok(overlay(node, native, &node.attrs))
            }
            NodeKind::CodeBlock => Ok(code_block(node)),
            NodeKind::BulletList => self.list(node, path, false),
            NodeKind::OrderedList => self.list(node, path, true),
            NodeKind::Rule => Ok(overlay(node, "---".to_string(), &node.attrs)),
            NodeKind::Table => table::serialize_table(self, node, path),
            NodeKind::Panel => self.panel(node, path),
            NodeKind::Expand | NodeKind::NestedExpand => self.expand(node, path),
            NodeKind::MediaSingle | NodeKind::MediaGroup => {
                Ok(block_form(&tag_for(node), &self.blocks(&node.content, path)?))
            }
            NodeKind::Media => Ok(tag_for(node).wrap(&media_label(node))),
            NodeKind::Caption => {
                let text = self.inline(&node.content, path, false)?;
                if text.contains('\n') {
                    let body = self.inline(&node.content, path, true)?;
                    Ok(block_form(&tag_for(node), &body))
                } else {
                    Ok(tag_for(node).wrap(&text))
                }
            }
            NodeKind::Unknown(_) => {
                if node.content.iter().all(|c| c.kind.is_inline()) {
                    let text = self.inline(&node.content, path, false)?;
                    return Ok(wrap_inline(&tag_for(node), &text));
                }
                self.generic(node, path)
            }
            NodeKind::Doc
            | NodeKind::ListItem
            | NodeKind::TableRow
            | NodeKind::TableCell
            | NodeKind::TableHeader => self.generic(node, path),
            NodeKind::Text
            | NodeKind::HardBreak
            | NodeKind::InlineCard
            | NodeKind::Date
            | NodeKind::Status
            | NodeKind::Mention
            | NodeKind::Emoji
            | NodeKind::MediaInline => self.inline(std::slice::from_ref(node), path, true),
        }
    }

    /// Block-form tag with every attribute, children rendered as blocks
    fn generic(&self, node: &Node, path: &str) -> Result<String> {
        Ok(block_form(&tag_for(node), &self.blocks(&node.content, path)?))
    }

    fn paragraph(&self, node: &Node, path: &str) -> Result<String> {
        let text = self.inline(&node.content, path, true)?;
        let native = node.attrs.is_empty()
            && node.marks.is_empty()
            && !text.is_empty()
            && !text.ends_with('\n')
            && !text
                .split('\n')
                .any(|line| line.trim().is_empty() || line.starts_with([' ', '\t']))
            && !node
                .content
                .iter()
                .any(|c| matches!(c.kind, NodeKind::Unknown(_)));
        if native {
            Ok(text)
        } else {
            Ok(block_form(&tag_for(node), &text))
        }
    }

    fn heading(&self, node: &Node, path: &str) -> Result<String> {
        let text = self.inline(&node.content, path, false)?;
        if text.contains('\n') {
            let body = self.inline(&node.content, path, true)?;
            return Ok(block_form(&tag_for(node), &body));
        }
        let level = node
            .attr("level")
            .and_then(AttrValue::as_i64)
            .unwrap_or(1)
            .clamp(1, 6) as usize;
        let mut native = "#".repeat(level);
        if !text.is_empty() {
            native.push(' ');
            native.push_str(&text);
        }
        let mut extra = node.attrs.clone();
        extra.remove("level");
        Ok(overlay(node, native, &extra))
    }

    fn list(&self, node: &Node, path: &str, ordered: bool) -> Result<String> {
        let plain_items = !node.content.is_empty()
            && node.content.iter().all(|item| {
                item.kind == NodeKind::ListItem && item.attrs.is_empty() && item.marks.is_empty()
            });
        if !plain_items {
            return self.generic(node, path);
        }

        let indent = &self.config.indent;
        let mut items = Vec::with_capacity(node.content.len());
        for (i, item) in node.content.iter().enumerate() {
            let body = self.blocks(&item.content, &child_path(path, &item.kind, i))?;
            let marker = if ordered {
                format!("{}.", i + 1)
            } else {
                "-".to_string()
            };
            if body.is_empty() {
                items.push(marker);
                continue;
            }
            let lines: Vec<String> = body
                .split('\n')
                .enumerate()
                .map(|(n, line)| match n {
                    0 => format!("{marker} {line}"),
                    _ if line.is_empty() => String::new(),
                    _ => format!("{indent}{line}"),
                })
                .collect();
            items.push(lines.join("\n"));
        }
        Ok(overlay(node, items.join("\n"), &node.attrs))
    }

    fn panel(&self, node: &Node, path: &str) -> Result<String> {
        let mut body = String::new();
        if let Some(panel_type) = node.attr_str("panelType").filter(|t| !t.is_empty()) {
            body.push_str(&format!("**{}**", label_text(&panel_type.to_uppercase())));
        }
        let children = self.blocks(&node.content, path)?;
        if !body.is_empty() && !children.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&children);
        Ok(block_form(&tag_for(node), &quote(&body)))
    }

    fn expand(&self, node: &Node, path: &str) -> Result<String> {
        let mut body = String::new();
        if let Some(title) = node.attr_str("title").filter(|t| !t.is_empty()) {
            body.push_str(&format!("**{}**", label_text(title)));
        }
        let children = self.blocks(&node.content, path)?;
        if !body.is_empty() && !children.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&children);
        Ok(block_form(&tag_for(node), &body))
    }

    /// Inline content. `line_start` says whether the output begins at
    /// column 0, where block syntax characters need escaping.
    pub(crate) fn inline(&self, nodes: &[Node], path: &str, line_start: bool) -> Result<String> {
        let mut out = String::new();
        let mut i = 0;
        while i < nodes.len() {
            let at_start = (line_start && out.is_empty()) || out.ends_with('\n');
            if nodes[i].is_text() {
                let end = nodes[i..]
                    .iter()
                    .position(|n| !n.is_text())
                    .map_or(nodes.len(), |p| i + p);
                out.push_str(&text_run(&nodes[i..end], at_start));
                i = end;
            } else {
                let node = &nodes[i];
                let node_path = child_path(path, &node.kind, i);
                if holds_blocks(node) {
                    // block form, on lines of its own
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(&self.generic(node, &node_path)?);
                    if i + 1 < nodes.len() {
                        out.push('\n');
                    }
                } else {
                    out.push_str(&self.inline_node(node, &node_path)?);
                }
                i += 1;
            }
        }
        Ok(out)
    }

    fn inline_node(&self, node: &Node, path: &str) -> Result<String> {
        let tag = tag_for(node);
        let rendered = match &node.kind {
            NodeKind::Text => text_run(std::slice::from_ref(node), false),
            NodeKind::HardBreak => {
                if node.attrs.is_empty() && node.marks.is_empty() {
                    "  \n".to_string()
                } else {
                    tag.wrap("")
                }
            }
            NodeKind::InlineCard => {
                let url = node.attr_str("url").unwrap_or_default();
                let label = escape_text(url, false);
                let native = node.attrs.len() == 1
                    && node.marks.is_empty()
                    && !url.is_empty()
                    && !url.contains('\n')
                    && label == escape_href(url);
                if native {
                    format!("[{label}]({label})")
                } else {
                    let url = url.replace('\n', " ");
                    tag.wrap(&format!("[{}]({})", escape_text(&url, false), escape_href(&url)))
                }
            }
            NodeKind::Date => {
                let shown = node
                    .attr("timestamp")
                    .and_then(iso_date)
                    .or_else(|| node.attr_str("timestamp").map(str::to_string))
                    .unwrap_or_default();
                tag.wrap(&label_text(&shown))
            }
            NodeKind::Status => tag.wrap(&label_text(node.attr_str("text").unwrap_or_default())),
            NodeKind::Mention => {
                let shown = match (node.attr_str("text"), node.attr("id")) {
                    (Some(text), _) => text.to_string(),
                    (None, Some(id)) => format!("@mention({})", display_value(id)),
                    (None, None) => "@mention".to_string(),
                };
                tag.wrap(&label_text(&shown))
            }
            NodeKind::Emoji => {
                let shown = node
                    .attr_str("text")
                    .or_else(|| node.attr_str("shortName"))
                    .unwrap_or_default();
                tag.wrap(&label_text(shown))
            }
            NodeKind::MediaInline => tag.wrap(&media_label(node)),
            NodeKind::Unknown(_) => wrap_inline(&tag, &self.inline(&node.content, path, false)?),
            other => {
                return Err(violation(
                    path,
                    format!("{other} cannot appear in inline content"),
                ))
            }
        };
        Ok(rendered)
    }
}

/// An unknown node in inline content whose subtree holds known block kinds
fn holds_blocks(node: &Node) -> bool {
    matches!(node.kind, NodeKind::Unknown(_))
        && node.content.iter().any(|child| match child.kind {
            NodeKind::Unknown(_) => holds_blocks(child),
            ref kind => !kind.is_inline(),
        })
}

fn code_block(node: &Node) -> String {
    let code: String = node
        .content
        .iter()
        .filter_map(|c| c.text.as_deref())
        .collect();
    let mut extra = node.attrs.clone();
    let info = match node.attr("language") {
        Some(AttrValue::Str(lang))
            if !lang.is_empty() && !lang.contains(|c: char| c.is_whitespace() || c == '`') =>
        {
            extra.remove("language");
            lang.as_str()
        }
        _ => "",
    };
    let fence = "`".repeat((longest_backtick_run(&code) + 1).max(3));
    let native = if code.is_empty() {
        format!("{fence}{info}\n{fence}")
    } else {
        format!("{fence}{info}\n{code}\n{fence}")
    };
    overlay(node, native, &extra)
}

fn media_label(node: &Node) -> String {
    let alt = node.attr_str("alt").unwrap_or_default().replace('\n', " ");
    let id = node.attr("id").map(display_value).unwrap_or_default();
    format!("[{}](fileId:{})", escape_text(&alt, false), escape_href(&id))
}

/// Display-only text; never read back, so newlines are flattened
fn label_text(text: &str) -> String {
    escape_text(&text.replace(['\n', '\r'], " "), false)
}

fn display_value(value: &AttrValue) -> String {
    match value {
        AttrValue::Str(s) => s.clone(),
        AttrValue::Int(i) => i.to_string(),
        AttrValue::Float(f) => f.to_string(),
        AttrValue::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// ISO-8601 UTC rendering of a millisecond timestamp
pub(crate) fn iso_date(timestamp: &AttrValue) -> Option<String> {
    let millis = match timestamp {
        AttrValue::Str(s) => s.trim().parse::<i64>().ok()?,
        AttrValue::Int(i) => *i,
        _ => return None,
    };
    let date = chrono::DateTime::from_timestamp_millis(millis)?;
    Some(date.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// Escape text so it reads back literally. At column 0 the characters that
/// would start a heading, quote, list item or ordered item are escaped too.
/// Two spaces before a newline would read back as a hard break, so the
/// second one goes into a `text` annotation.
pub(crate) fn escape_text(text: &str, at_line_start: bool) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut line_start = at_line_start;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if line_start {
            match c {
                '#' | '>' | '-' => out.push('\\'),
                d if d.is_ascii_digit() => {
                    let digits_end = chars[i..]
                        .iter()
                        .position(|c| !c.is_ascii_digit())
                        .map_or(chars.len(), |p| i + p);
                    if chars.get(digits_end) == Some(&'.') {
                        out.extend(&chars[i..digits_end]);
                        out.push_str("\\.");
                        i = digits_end + 1;
                        line_start = false;
                        continue;
                    }
                }
                _ => {}
            }
        }
        if c == ' ' && chars.get(i + 1) == Some(&' ') && chars.get(i + 2) == Some(&'\n') {
            out.push(' ');
            out.push_str(&Tag::new(&NodeKind::Text).wrap(" "));
            i += 2;
            line_start = false;
            continue;
        }
        if matches!(c, '\\' | '`' | '*' | '~' | '[' | ']' | '<' | '|') {
            out.push('\\');
        }
        out.push(c);
        line_start = c == '\n';
        i += 1;
    }
    out
}

pub(crate) fn escape_href(href: &str) -> String {
    let mut out = String::with_capacity(href.len());
    for c in href.chars() {
        if matches!(c, '\\' | '(' | ')' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub(crate) fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

/// Code span with a fence longer than any backtick run inside it
pub(crate) fn code_span(text: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(text) + 1);
    let pad = text.starts_with('`')
        || text.ends_with('`')
        || (text.len() >= 2
            && text.starts_with(' ')
            && text.ends_with(' ')
            && !text.trim().is_empty());
    if pad {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}

/// A text node split into the mark layers Markdown can render natively
/// and the remainder that goes into a `text` annotation
struct Styled<'a> {
    node: &'a Node,
    extra: Vec<Mark>,
    link: Option<&'a str>,
    strike: bool,
    strong: bool,
    em: bool,
    code: bool,
}

impl<'a> Styled<'a> {
    fn new(node: &'a Node) -> Self {
        let text = node.text.as_deref().unwrap_or_default();
        let mut styled = Styled {
            node,
            extra: Vec::new(),
            link: None,
            strike: false,
            strong: false,
            em: false,
            code: false,
        };
        for mark in &node.marks {
            let plain = mark.attrs.is_empty();
            let native = match mark.kind {
                MarkKind::Code if plain && !styled.code => {
                    let ok = !text.is_empty() && !text.contains(['\n', '\r']);
                    styled.code = ok;
                    ok
                }
                MarkKind::Em if plain && !styled.em => {
                    styled.em = true;
                    true
                }
                MarkKind::Strong if plain && !styled.strong => {
                    styled.strong = true;
                    true
                }
                MarkKind::Strike if plain && !styled.strike => {
                    styled.strike = true;
                    true
                }
                MarkKind::Link if mark.attrs.len() == 1 && styled.link.is_none() => {
                    styled.link = mark.href();
                    styled.link.is_some()
                }
                _ => false,
            };
            if !native {
                styled.extra.push(mark.clone());
            }
        }
        styled
    }
}

const LAYERS: usize = 5;

#[derive(PartialEq)]
enum LayerKey<'a> {
    None,
    Extra(&'a [Mark], &'a Attrs),
    Link(&'a str),
    Delimited,
}

fn layer_key<'a>(run: &'a Styled<'a>, depth: usize) -> LayerKey<'a> {
    let on = match depth {
        0 if !run.extra.is_empty() || !run.node.attrs.is_empty() => {
            return LayerKey::Extra(&run.extra, &run.node.attrs)
        }
        1 => return run.link.map_or(LayerKey::None, LayerKey::Link),
        2 => run.strike,
        3 => run.strong,
        4 => run.em,
        _ => false,
    };
    if on {
        LayerKey::Delimited
    } else {
        LayerKey::None
    }
}

/// Render adjacent text nodes, sharing delimiters across runs with the
/// same mark
fn text_run(nodes: &[Node], at_start: bool) -> String {
    let runs: Vec<Styled> = nodes
        .iter()
        .filter(|n| n.text.as_deref().is_some_and(|t| !t.is_empty()))
        .map(Styled::new)
        .collect();
    render_layer(&runs, 0, at_start, false)
}

fn render_layer(runs: &[Styled], depth: usize, mut at_start: bool, in_tag: bool) -> String {
    if depth == LAYERS {
        return runs
            .iter()
            .enumerate()
            .map(|(i, run)| {
                let text = run.node.text.as_deref().unwrap_or_default();
                if run.code {
                    code_span(text)
                } else {
                    escape_text(text, at_start && i == 0)
                }
            })
            .collect();
    }

    let mut out = String::new();
    let mut start = 0;
    while start < runs.len() {
        let key = layer_key(&runs[start], depth);
        let end = runs[start..]
            .iter()
            .position(|r| layer_key(r, depth) != key)
            .map_or(runs.len(), |p| start + p);
        let group = &runs[start..end];
        let rendered = match key {
            LayerKey::None => render_layer(group, depth + 1, at_start, in_tag),
            LayerKey::Extra(marks, attrs) => {
                let inner = render_layer(group, depth + 1, false, true);
                Tag::new(&NodeKind::Text)
                    .with_attrs(attrs)
                    .with_marks(marks)
                    .wrap(&inner)
            }
            LayerKey::Link(href) => {
                let label = render_layer(group, depth + 1, false, in_tag);
                let href = escape_href(href);
                let link = format!("[{label}]({href})");
                if !in_tag && label == href {
                    // would read back as an inlineCard
                    Tag::new(&NodeKind::Text).wrap(&link)
                } else {
                    link
                }
            }
            LayerKey::Delimited => {
                let delim = match depth {
                    2 => "~~",
                    3 => "**",
                    _ => "*",
                };
                let inner = render_layer(group, depth + 1, false, in_tag);
                format!("{delim}{inner}{delim}")
            }
        };
        out.push_str(&rendered);
        at_start = false;
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(doc: &Node) -> String {
        serialize(doc, &RenderConfig::default()).unwrap()
    }

    fn para(content: Vec<Node>) -> Node {
        Node::doc(vec![Node::paragraph(content)])
    }

    #[test]
    fn test_empty_doc() {
        assert_eq!(render(&Node::doc(vec![])), "");
    }

    #[test]
    fn test_doc_version_tag() {
        let doc = Node::doc(vec![Node::paragraph(vec![Node::text("hi")])]).with_attr("version", 1);
        assert_eq!(
            render(&doc),
            "<!-- ADF:doc:version=\"1\" -->\nhi\n<!-- /ADF:doc -->\n"
        );
    }

    #[test]
    fn test_native_marks() {
        let doc = para(vec![
            Node::text("bold").with_mark(Mark::new(MarkKind::Strong)),
            Node::text(" and "),
            Node::text("code").with_mark(Mark::new(MarkKind::Code)),
            Node::text(" and "),
            Node::text("link").with_mark(Mark::link("https://example.com")),
        ]);
        assert_eq!(
            render(&doc),
            "**bold** and `code` and [link](https://example.com)\n"
        );
    }

    #[test]
    fn test_marks_grouped_across_runs() {
        let strong = Mark::new(MarkKind::Strong);
        let doc = para(vec![
            Node::text("a").with_mark(strong.clone()),
            Node::text("b")
                .with_mark(Mark::new(MarkKind::Em))
                .with_mark(strong),
        ]);
        assert_eq!(render(&doc), "**a*b***\n");
    }

    #[test]
    fn test_unsupported_mark_wraps_native_rendering() {
        let doc = para(vec![Node::text("text")
            .with_mark(Mark::new(MarkKind::Strong))
            .with_mark(Mark::new(MarkKind::Underline))]);
        assert_eq!(
            render(&doc),
            "<!-- ADF:text:marks=\"underline\" -->**text**<!-- /ADF:text -->\n"
        );
    }

    #[test]
    fn test_escaping() {
        let doc = para(vec![Node::text("# not *a* heading [x] <b> a|b")]);
        assert_eq!(
            render(&doc),
            "\\# not \\*a\\* heading \\[x\\] \\<b> a\\|b\n"
        );
        assert_eq!(escape_text("1. two\n- three", true), "1\\. two\n\\- three");
    }

    #[test]
    fn test_code_span_fences() {
        assert_eq!(code_span("a"), "`a`");
        assert_eq!(code_span("a`b"), "``a`b``");
        assert_eq!(code_span("`x"), "`` `x ``");
        assert_eq!(code_span(" a "), "`  a  `");
    }

    #[test]
    fn test_heading_levels() {
        for level in 1..=6 {
            let doc = Node::doc(vec![
                Node::heading(level, vec![Node::text("Title")]),
                Node::paragraph(vec![Node::text("body")]),
            ]);
            let hashes = "#".repeat(level as usize);
            assert_eq!(render(&doc), format!("{hashes} Title\n\nbody\n"));
        }
    }

    #[test]
    fn test_heading_overlay() {
        let doc = Node::doc(vec![
            Node::heading(2, vec![Node::text("T")]).with_attr("localId", "h1")
        ]);
        assert_eq!(
            render(&doc),
            "<!-- ADF:heading:localId=\"h1\" -->\n## T\n<!-- /ADF:heading -->\n"
        );
    }

    #[test]
    fn test_lists() {
        let item = |text: &str| {
            Node::new(NodeKind::ListItem).with_content(vec![Node::paragraph(vec![Node::text(text)])])
        };
        let nested = Node::new(NodeKind::ListItem).with_content(vec![
            Node::paragraph(vec![Node::text("outer")]),
            Node::new(NodeKind::OrderedList).with_content(vec![item("one"), item("two")]),
        ]);
        let doc = Node::doc(vec![Node::new(NodeKind::BulletList).with_content(vec![nested, item("last")])]);
        assert_eq!(
            render(&doc),
            "- outer\n\n  1. one\n  2. two\n- last\n"
        );
    }

    #[test]
    fn test_code_block() {
        let doc = Node::doc(vec![Node::new(NodeKind::CodeBlock)
            .with_attr("language", "rust")
            .with_content(vec![Node::text("let x = 1;\nlet y = 2;")])]);
        assert_eq!(render(&doc), "```rust\nlet x = 1;\nlet y = 2;\n```\n");
    }

    #[test]
    fn test_panel_and_expand() {
        let panel = Node::new(NodeKind::Panel)
            .with_attr("panelType", "info")
            .with_content(vec![Node::paragraph(vec![Node::text("Note")])]);
        assert_eq!(
            render(&Node::doc(vec![panel])),
            "<!-- ADF:panel:panelType=\"info\" -->\n> **INFO**\n>\n> Note\n<!-- /ADF:panel -->\n"
        );

        let expand = Node::new(NodeKind::Expand)
            .with_attr("title", "More")
            .with_content(vec![Node::paragraph(vec![Node::text("hidden")])]);
        assert_eq!(
            render(&Node::doc(vec![expand])),
            "<!-- ADF:expand:title=\"More\" -->\n**More**\n\nhidden\n<!-- /ADF:expand -->\n"
        );
    }

    #[test]
    fn test_inline_fallbacks() {
        let doc = para(vec![
            Node::new(NodeKind::Date).with_attr("timestamp", "1733172673000"),
            Node::text(" "),
            Node::new(NodeKind::Mention).with_attr("id", "abc"),
            Node::text(" "),
            Node::new(NodeKind::Status)
                .with_attr("text", "DONE")
                .with_attr("color", "green"),
        ]);
        assert_eq!(
            render(&doc),
            "<!-- ADF:date:timestamp=\"1733172673000\" -->2024-12-02T20:51:13Z<!-- /ADF:date --> \
             <!-- ADF:mention:id=\"abc\" -->@mention(abc)<!-- /ADF:mention --> \
             <!-- ADF:status:color=\"green\",text=\"DONE\" -->DONE<!-- /ADF:status -->\n"
        );
    }

    #[test]
    fn test_inline_card_and_link_collision() {
        let card = para(vec![Node::new(NodeKind::InlineCard).with_attr("url", "https://a.io/x")]);
        assert_eq!(render(&card), "[https://a.io/x](https://a.io/x)\n");

        let link = para(vec![Node::text("https://a.io/x").with_mark(Mark::link("https://a.io/x"))]);
        assert_eq!(
            render(&link),
            "<!-- ADF:text -->[https://a.io/x](https://a.io/x)<!-- /ADF:text -->\n"
        );
    }

    #[test]
    fn test_media_single() {
        let media = Node::new(NodeKind::Media)
            .with_attr("id", "f-1")
            .with_attr("type", "file")
            .with_attr("collection", "c")
            .with_attr("alt", "diagram");
        let doc = Node::doc(vec![Node::new(NodeKind::MediaSingle)
            .with_attr("layout", "center")
            .with_content(vec![media])]);
        assert_eq!(
            render(&doc),
            "<!-- ADF:mediaSingle:layout=\"center\" -->\n\
             <!-- ADF:media:alt=\"diagram\",collection=\"c\",id=\"f-1\",type=\"file\" -->[diagram](fileId:f-1)<!-- /ADF:media -->\n\
             <!-- /ADF:mediaSingle -->\n"
        );
    }

    #[test]
    fn test_indented_paragraph_uses_tag() {
        let item = Node::new(NodeKind::ListItem).with_content(vec![Node::paragraph(vec![Node::text("a")])]);
        let doc = Node::doc(vec![
            Node::new(NodeKind::BulletList).with_content(vec![item]),
            Node::paragraph(vec![Node::text("  indented")]),
        ]);
        assert_eq!(
            render(&doc),
            "- a\n\n<!-- ADF:paragraph -->\n  indented\n<!-- /ADF:paragraph -->\n"
        );
    }

    #[test]
    fn test_spaces_before_newline_are_not_a_break() {
        assert_eq!(
            render(&para(vec![Node::text("a  \nb")])),
            "a <!-- ADF:text --> <!-- /ADF:text -->\nb\n"
        );
        assert_eq!(
            render(&para(vec![Node::text("a"), Node::new(NodeKind::HardBreak), Node::text("b")])),
            "a  \nb\n"
        );
    }

    #[test]
    fn test_unknown_inline_node_holding_blocks() {
        let ext = Node::new(NodeKind::Unknown("inlineExt".into()))
            .with_content(vec![Node::paragraph(vec![Node::text("x")])]);
        assert_eq!(
            render(&para(vec![Node::text("see"), ext])),
            "<!-- ADF:paragraph -->\nsee\n<!-- ADF:inlineExt -->\nx\n<!-- /ADF:inlineExt -->\n<!-- /ADF:paragraph -->\n"
        );
    }

    #[test]
    fn test_unknown_block_with_multi_line_text() {
        let ext = Node::new(NodeKind::Unknown("decisionItem".into()))
            .with_content(vec![Node::text("\nb\n")]);
        assert_eq!(
            render(&Node::doc(vec![ext])),
            "<!-- ADF:decisionItem --><!-- ADF:text --><!-- /ADF:text -->\nb\n<!-- ADF:text --><!-- /ADF:text --><!-- /ADF:decisionItem -->\n"
        );
    }

    #[test]
    fn test_unknown_block_opening_on_blank_first_line() {
        let ext = Node::new(NodeKind::Unknown("decisionItem".into())).with_content(vec![
            Node::new(NodeKind::HardBreak),
            Node::text("b"),
        ]);
        assert_eq!(
            render(&Node::doc(vec![ext])),
            "<!-- ADF:decisionItem --><!-- ADF:text --><!-- /ADF:text -->  \nb<!-- /ADF:decisionItem -->\n"
        );
    }

    #[test]
    fn test_href_backticks_are_escaped() {
        let doc = para(vec![Node::text("x").with_mark(Mark::link("https://a.io/`q`"))]);
        assert_eq!(render(&doc), "[x](https://a.io/\\`q\\`)\n");
    }

    #[test]
    fn test_empty_paragraph_uses_tag() {
        let doc = Node::doc(vec![Node::paragraph(vec![])]);
        assert_eq!(render(&doc), "<!-- ADF:paragraph -->\n<!-- /ADF:paragraph -->\n");
    }

    #[test]
    fn test_structural_violation() {
        let doc = Node::doc(vec![Node::heading(7, vec![])]);
        assert!(serialize(&doc, &RenderConfig::default()).is_err());
    }
}
