// SPDX-License-Identifier: AGPL-3.0-or-later
//! Attribute types and content rules for known node kinds
//!
//! Annotations carry attribute values as text. The tables here decide what
//! type a decoded value becomes, and `validate` rejects trees that break the
//! parent/child rules before anything is rendered.

use crate::ast::{MarkKind, Node, NodeKind};
use crate::traits::{ConversionError, Result};

/// Declared type of a known attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Text,
    Number,
    Flag,
    NumberList,
}

/// Declared type of `name` on a node of `kind`, if the pair is known
pub fn node_attr_type(kind: &NodeKind, name: &str) -> Option<AttrType> {
    use AttrType::*;
    let ty = match (kind, name) {
        (NodeKind::Doc, "version") => Number,
        (NodeKind::Heading, "level") => Number,
        (NodeKind::CodeBlock, "language") => Text,
        (NodeKind::OrderedList, "order") => Number,
        (NodeKind::Panel, "panelType") => Text,
        (NodeKind::Expand | NodeKind::NestedExpand, "title") => Text,
        (NodeKind::Table, "layout" | "displayMode" | "localId") => Text,
        (NodeKind::Table, "width") => Number,
        (NodeKind::Table, "isNumberColumnEnabled") => Flag,
        (NodeKind::TableCell | NodeKind::TableHeader, "colspan" | "rowspan") => Number,
        (NodeKind::TableCell | NodeKind::TableHeader, "colwidth") => NumberList,
        (NodeKind::TableCell | NodeKind::TableHeader, "background") => Text,
        (NodeKind::Status, "text" | "color" | "localId" | "style") => Text,
        (NodeKind::Mention, "id" | "text" | "userType" | "accessLevel") => Text,
        (NodeKind::Emoji, "shortName" | "id" | "text") => Text,
        (NodeKind::Date, "timestamp") => Text,
        (NodeKind::InlineCard, "url") => Text,
        (NodeKind::Media | NodeKind::MediaInline, "id" | "type" | "collection" | "alt") => Text,
        (NodeKind::Media | NodeKind::MediaInline, "width" | "height") => Number,
        (NodeKind::MediaSingle, "layout" | "widthType") => Text,
        (NodeKind::MediaSingle, "width") => Number,
        _ => return None,
    };
    Some(ty)
}

/// Declared type of `name` on a mark of `kind`
pub fn mark_attr_type(kind: &MarkKind, name: &str) -> Option<AttrType> {
    match (kind, name) {
        (MarkKind::Link, "href" | "title" | "id" | "collection" | "occurrenceKey") => {
            Some(AttrType::Text)
        }
        (MarkKind::TextColor | MarkKind::BackgroundColor, "color") => Some(AttrType::Text),
        (MarkKind::Subsup, "type") => Some(AttrType::Text),
        _ => None,
    }
}

/// Child kinds permitted under a parent
enum Allowed {
    Blocks,
    Inlines,
    Only(fn(&NodeKind) -> bool),
    Nothing,
    Anything,
}

fn allowed_children(kind: &NodeKind) -> Allowed {
    match kind {
        NodeKind::Doc
        | NodeKind::Blockquote
        | NodeKind::ListItem
        | NodeKind::Panel
        | NodeKind::Expand
        | NodeKind::NestedExpand
        | NodeKind::TableCell
        | NodeKind::TableHeader => Allowed::Blocks,
        NodeKind::Paragraph | NodeKind::Heading | NodeKind::Caption => Allowed::Inlines,
        NodeKind::CodeBlock => Allowed::Only(|k| *k == NodeKind::Text),
        NodeKind::BulletList | NodeKind::OrderedList => Allowed::Only(|k| *k == NodeKind::ListItem),
        NodeKind::Table => Allowed::Only(|k| *k == NodeKind::TableRow),
        NodeKind::TableRow => Allowed::Only(|k| matches!(k, NodeKind::TableCell | NodeKind::TableHeader)),
        NodeKind::MediaSingle => Allowed::Only(|k| matches!(k, NodeKind::Media | NodeKind::Caption)),
        NodeKind::MediaGroup => Allowed::Only(|k| *k == NodeKind::Media),
        NodeKind::Text
        | NodeKind::HardBreak
        | NodeKind::Rule
        | NodeKind::InlineCard
        | NodeKind::Date
        | NodeKind::Status
        | NodeKind::Mention
        | NodeKind::Emoji
        | NodeKind::Media
        | NodeKind::MediaInline => Allowed::Nothing,
        NodeKind::Unknown(_) => Allowed::Anything,
    }
}

/// Append one step to a node path
pub fn child_path(parent: &str, kind: &NodeKind, index: usize) -> String {
    format!("{parent}/{kind}[{index}]")
}

pub fn violation(path: &str, message: impl Into<String>) -> ConversionError {
    ConversionError::StructuralViolation {
        path: path.to_string(),
        message: message.into(),
    }
}

/// Check the tree against the parent/child rules and per-kind attribute
/// requirements. The first offending node is reported with its path.
pub fn validate(root: &Node) -> Result<()> {
    validate_node(root, root.kind.name(), true, false)
}

fn validate_node(node: &Node, path: &str, is_root: bool, in_cell: bool) -> Result<()> {
    if node.kind == NodeKind::Doc && !is_root {
        return Err(violation(path, "doc may only appear as the root"));
    }
    if node.kind == NodeKind::Table && in_cell {
        return Err(violation(path, "a table cannot be placed inside a table cell"));
    }
    if node.is_text() && node.text.is_none() {
        return Err(violation(path, "text node has no text"));
    }
    if node.kind == NodeKind::Heading {
        match node.attr("level").and_then(|v| v.as_i64()) {
            Some(level) if (1..=6).contains(&level) => {}
            Some(level) => {
                return Err(violation(path, format!("heading level {level} is outside 1-6")))
            }
            None => return Err(violation(path, "heading has no level")),
        }
    }

    let allowed = allowed_children(&node.kind);
    let cell = in_cell || matches!(node.kind, NodeKind::TableCell | NodeKind::TableHeader);
    for (index, child) in node.content.iter().enumerate() {
        let child_path = child_path(path, &child.kind, index);
        let ok = match &allowed {
            Allowed::Anything => true,
            Allowed::Nothing => false,
            Allowed::Blocks => !child.kind.is_inline(),
            Allowed::Inlines => {
                child.kind.is_inline() || matches!(child.kind, NodeKind::Unknown(_))
            }
            Allowed::Only(accepts) => {
                accepts(&child.kind) || matches!(child.kind, NodeKind::Unknown(_))
            }
        };
        if !ok {
            return Err(violation(
                &child_path,
                format!("{} is not allowed inside {}", child.kind, node.kind),
            ));
        }
        validate_node(child, &child_path, false, cell)?;
    }
    Ok(())
}
