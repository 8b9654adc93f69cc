// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document model for Atlassian Document Format trees
//!
//! Node and mark kinds are closed enums so that every conversion is an
//! exhaustive match. Kinds this crate does not know about are carried as
//! `Unknown(name)` and pass through the converters with their attributes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute mapping. Iteration order is the key order, which is also the
/// order attributes are written in annotations.
pub type Attrs = BTreeMap<String, AttrValue>;

/// Scalar (or small composite) attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view, accepting floats with no fractional part
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            AttrValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, AttrValue::List(_) | AttrValue::Map(_))
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        AttrValue::Int(i64::from(i))
    }
}

impl From<u32> for AttrValue {
    fn from(i: u32) -> Self {
        AttrValue::Int(i64::from(i))
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        AttrValue::Float(f)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(items: Vec<T>) -> Self {
        AttrValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Node kind, keyed by the ADF `type` name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Doc,
    Text,
    Paragraph,
    Heading,
    Blockquote,
    CodeBlock,
    BulletList,
    OrderedList,
    ListItem,
    HardBreak,
    Rule,
    InlineCard,
    Date,
    Status,
    Mention,
    Emoji,
    Table,
    TableRow,
    TableCell,
    TableHeader,
    Panel,
    Media,
    MediaSingle,
    MediaGroup,
    MediaInline,
    Caption,
    Expand,
    NestedExpand,
    Unknown(String),
}

impl NodeKind {
    /// The ADF `type` name
    pub fn name(&self) -> &str {
        match self {
            Self::Doc => "doc",
            Self::Text => "text",
            Self::Paragraph => "paragraph",
            Self::Heading => "heading",
            Self::Blockquote => "blockquote",
            Self::CodeBlock => "codeBlock",
            Self::BulletList => "bulletList",
            Self::OrderedList => "orderedList",
            Self::ListItem => "listItem",
            Self::HardBreak => "hardBreak",
            Self::Rule => "rule",
            Self::InlineCard => "inlineCard",
            Self::Date => "date",
            Self::Status => "status",
            Self::Mention => "mention",
            Self::Emoji => "emoji",
            Self::Table => "table",
            Self::TableRow => "tableRow",
            Self::TableCell => "tableCell",
            Self::TableHeader => "tableHeader",
            Self::Panel => "panel",
            Self::Media => "media",
            Self::MediaSingle => "mediaSingle",
            Self::MediaGroup => "mediaGroup",
            Self::MediaInline => "mediaInline",
            Self::Caption => "caption",
            Self::Expand => "expand",
            Self::NestedExpand => "nestedExpand",
            Self::Unknown(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "doc" => Self::Doc,
            "text" => Self::Text,
            "paragraph" => Self::Paragraph,
            "heading" => Self::Heading,
            "blockquote" => Self::Blockquote,
            "codeBlock" => Self::CodeBlock,
            "bulletList" => Self::BulletList,
            "orderedList" => Self::OrderedList,
            "listItem" => Self::ListItem,
            "hardBreak" => Self::HardBreak,
            "rule" => Self::Rule,
            "inlineCard" => Self::InlineCard,
            "date" => Self::Date,
            "status" => Self::Status,
            "mention" => Self::Mention,
            "emoji" => Self::Emoji,
            "table" => Self::Table,
            "tableRow" => Self::TableRow,
            "tableCell" => Self::TableCell,
            "tableHeader" => Self::TableHeader,
            "panel" => Self::Panel,
            "media" => Self::Media,
            "mediaSingle" => Self::MediaSingle,
            "mediaGroup" => Self::MediaGroup,
            "mediaInline" => Self::MediaInline,
            "caption" => Self::Caption,
            "expand" => Self::Expand,
            "nestedExpand" => Self::NestedExpand,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Inline-level kinds live inside paragraphs, headings and captions
    pub const fn is_inline(&self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::HardBreak
                | Self::InlineCard
                | Self::Date
                | Self::Status
                | Self::Mention
                | Self::Emoji
                | Self::MediaInline
        )
    }

    /// Kinds that never have children
    pub const fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::HardBreak
                | Self::Rule
                | Self::InlineCard
                | Self::Date
                | Self::Status
                | Self::Mention
                | Self::Emoji
                | Self::Media
                | Self::MediaInline
        )
    }

    /// Kinds whose children are inline content
    pub const fn has_inline_content(&self) -> bool {
        matches!(self, Self::Paragraph | Self::Heading | Self::Caption)
    }
}

impl From<String> for NodeKind {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.name().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mark kind, keyed by the ADF mark `type` name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MarkKind {
    Code,
    Em,
    Strong,
    Strike,
    Link,
    Underline,
    Subsup,
    TextColor,
    BackgroundColor,
    Unknown(String),
}

impl MarkKind {
    pub fn name(&self) -> &str {
        match self {
            Self::Code => "code",
            Self::Em => "em",
            Self::Strong => "strong",
            Self::Strike => "strike",
            Self::Link => "link",
            Self::Underline => "underline",
            Self::Subsup => "subsup",
            Self::TextColor => "textColor",
            Self::BackgroundColor => "backgroundColor",
            Self::Unknown(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "code" => Self::Code,
            "em" => Self::Em,
            "strong" => Self::Strong,
            "strike" => Self::Strike,
            "link" => Self::Link,
            "underline" => Self::Underline,
            "subsup" => Self::Subsup,
            "textColor" => Self::TextColor,
            "backgroundColor" => Self::BackgroundColor,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Position in the canonical mark order. Unknown marks sort last and keep
    /// their relative order.
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Code => 0,
            Self::Em => 1,
            Self::Strong => 2,
            Self::Strike => 3,
            Self::Link => 4,
            Self::Underline => 5,
            Self::Subsup => 6,
            Self::TextColor => 7,
            Self::BackgroundColor => 8,
            Self::Unknown(_) => 9,
        }
    }

    /// The single attribute a mark of this kind is normally parameterised by
    pub const fn primary_attr(&self) -> Option<&'static str> {
        match self {
            Self::Link => Some("href"),
            Self::Subsup => Some("type"),
            Self::TextColor | Self::BackgroundColor => Some("color"),
            _ => None,
        }
    }
}

impl From<String> for MarkKind {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<MarkKind> for String {
    fn from(kind: MarkKind) -> Self {
        kind.name().to_string()
    }
}

impl fmt::Display for MarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Formatting or semantic decoration on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: MarkKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: Attrs,
}

impl Mark {
    pub fn new(kind: MarkKind) -> Self {
        Self {
            kind,
            attrs: Attrs::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn link(href: &str) -> Self {
        Self::new(MarkKind::Link).with_attr("href", href)
    }

    /// Link target when this is a link mark
    pub fn href(&self) -> Option<&str> {
        match self.kind {
            MarkKind::Link => self.attrs.get("href").and_then(AttrValue::as_str),
            _ => None,
        }
    }
}

/// Sort marks into canonical order (stable for unknown kinds)
pub fn sort_marks(marks: &mut [Mark]) {
    marks.sort_by_key(|m| m.kind.rank());
}

/// A node of the document tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawNode", into = "RawNode")]
pub struct Node {
    pub kind: NodeKind,
    pub attrs: Attrs,
    pub content: Vec<Node>,
    /// Literal payload, only for text nodes
    pub text: Option<String>,
    pub marks: Vec<Mark>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attrs: Attrs::new(),
            content: Vec::new(),
            text: None,
            marks: Vec::new(),
        }
    }

    /// Text node with no marks
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(NodeKind::Text)
        }
    }

    pub fn doc(content: Vec<Node>) -> Self {
        Self::new(NodeKind::Doc).with_content(content)
    }

    pub fn paragraph(content: Vec<Node>) -> Self {
        Self::new(NodeKind::Paragraph).with_content(content)
    }

    pub fn heading(level: i64, content: Vec<Node>) -> Self {
        Self::new(NodeKind::Heading)
            .with_attr("level", level)
            .with_content(content)
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn with_content(mut self, content: Vec<Node>) -> Self {
        self.content = content;
        self
    }

    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.marks.push(mark);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(AttrValue::as_str)
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    /// Load a tree from ADF JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Write the tree as ADF JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Canonical form: marks sorted, adjacent text runs with equal marks merged
    pub fn canonicalized(mut self) -> Self {
        self.canonicalize();
        self
    }

    pub fn canonicalize(&mut self) {
        sort_marks(&mut self.marks);
        for child in &mut self.content {
            child.canonicalize();
        }
        merge_text_runs(&mut self.content);
    }
}

/// Merge adjacent text nodes whose marks are identical
pub fn merge_text_runs(nodes: &mut Vec<Node>) {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes.drain(..) {
        if let Some(last) = merged.last_mut() {
            if last.is_text() && node.is_text() && last.marks == node.marks && last.attrs == node.attrs {
                let tail = node.text.unwrap_or_default();
                last.text.get_or_insert_with(String::new).push_str(&tail);
                continue;
            }
        }
        merged.push(node);
    }
    *nodes = merged;
}

/// Wire shape of an ADF node. `doc.version` sits next to `type` in ADF JSON
/// but is an ordinary attribute in the model.
#[derive(Serialize, Deserialize)]
struct RawNode {
    #[serde(rename = "type")]
    kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<AttrValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: Attrs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    content: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    marks: Vec<Mark>,
}

impl From<RawNode> for Node {
    fn from(raw: RawNode) -> Self {
        let mut attrs = raw.attrs;
        if let Some(version) = raw.version {
            attrs.insert("version".to_string(), version);
        }
        Node {
            kind: raw.kind,
            attrs,
            content: raw.content,
            text: raw.text,
            marks: raw.marks,
        }
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        let mut attrs = node.attrs;
        let version = if node.kind == NodeKind::Doc {
            attrs.remove("version")
        } else {
            None
        };
        RawNode {
            kind: node.kind,
            version,
            attrs,
            content: node.content,
            text: node.text,
            marks: node.marks,
        }
    }
}
