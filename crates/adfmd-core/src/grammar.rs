// SPDX-License-Identifier: AGPL-3.0-or-later
//! Annotation grammar: ADF metadata carried in HTML comments
//!
//! ```text
//! <!-- ADF:{kind}:{name}="{value}",{name2}="{value2}" -->body<!-- /ADF:{kind} -->
//! ```
//!
//! Values are backslash-escaped (`\\ \" \, \= \> \n \r`). A raw comma inside
//! a value separates list items, an escaped one is a literal comma. A bare
//! name without `="..."` is a null value. Because `>` is always escaped, the
//! first `-->` after an open marker is its end.
//!
//! Values without a declared text type are typed when read back. A string
//! that would read back as something else (`"12"`, `"true"`, `"[1]"`) is
//! written with a leading `'`, and so is any string that starts with one.
//!
//! The serializer and parser only ever go through this module for marker
//! text, so neither of them deals with escaping directly.

use crate::ast::{AttrValue, Attrs, Mark, MarkKind, Node, NodeKind};
use crate::schema::{mark_attr_type, node_attr_type, AttrType};
use crate::traits::Diagnostic;
use std::collections::BTreeMap;
use tracing::trace;

pub const OPEN_PREFIX: &str = "<!-- ADF:";
pub const CLOSE_PREFIX: &str = "<!-- /ADF:";
const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

/// Reserved attribute carrying a node's marks
pub const MARKS_ATTR: &str = "marks";

/// Marker text that is not an annotation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("not an ADF annotation")]
    NotAnnotation,
    #[error("annotation has no kind")]
    EmptyKind,
    #[error("invalid character in kind `{0}`")]
    InvalidKind(String),
}

/// Escape a scalar for use inside a quoted attribute value
pub fn escape_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            ',' => out.push_str("\\,"),
            '=' => out.push_str("\\="),
            '>' => out.push_str("\\>"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Exact inverse of [`escape_value`]
pub fn unescape_value(s: &str) -> Result<String, String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(e @ ('\\' | '"' | ',' | '=' | '>')) => out.push(e),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => return Err(format!("invalid escape `\\{other}`")),
            None => return Err("trailing backslash".to_string()),
        }
    }
    Ok(out)
}

/// Split at every unescaped `sep`, leaving escapes in place
pub fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

fn format_float(f: f64) -> String {
    format!("{f:?}")
}

/// Marks a string that would otherwise be read back as another type
const LITERAL: char = '\'';

/// Plain text form of a value, before escaping. Strings are quoted with
/// [`LITERAL`] when inference would not give them back unchanged.
fn scalar_text(value: &AttrValue) -> String {
    match value {
        AttrValue::Null => "null".to_string(),
        AttrValue::Bool(b) => b.to_string(),
        AttrValue::Int(i) => i.to_string(),
        AttrValue::Float(f) => format_float(*f),
        AttrValue::Str(s) => {
            if matches!(infer_scalar(s), AttrValue::Str(ref back) if back == s) {
                s.clone()
            } else {
                format!("{LITERAL}{s}")
            }
        }
        AttrValue::List(_) | AttrValue::Map(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

/// Encoded (escaped) attribute value; `None` for null. `declared` is the
/// schema type of the slot the value is written to.
pub fn encode_value(value: &AttrValue, declared: Option<AttrType>) -> Option<String> {
    match value {
        AttrValue::Null => None,
        AttrValue::Str(s) if declared == Some(AttrType::Text) => Some(escape_value(s)),
        AttrValue::List(items) => {
            let numbers = declared == Some(AttrType::NumberList)
                && items
                    .iter()
                    .all(|item| matches!(item, AttrValue::Int(_) | AttrValue::Float(_)));
            if items.len() > 1 || numbers {
                Some(
                    items
                        .iter()
                        .map(|item| escape_value(&scalar_text(item)))
                        .collect::<Vec<_>>()
                        .join(","),
                )
            } else {
                // zero or one item would read back as a scalar
                Some(escape_value(&scalar_text(value)))
            }
        }
        other => Some(escape_value(&scalar_text(other))),
    }
}

/// Encode marks as the raw value of a `marks` attribute:
/// `kind`, `kind=value` or `kind=name:value=name:value`
pub fn encode_marks(marks: &[Mark]) -> String {
    marks
        .iter()
        .map(encode_mark)
        .collect::<Vec<_>>()
        .join(",")
}

fn encode_mark(mark: &Mark) -> String {
    let mut item = escape_value(mark.kind.name());
    if mark.attrs.is_empty() {
        return item;
    }
    let primary = mark.kind.primary_attr();
    if mark.attrs.len() == 1 {
        if let (Some(name), Some(value)) = (primary, primary.and_then(|p| mark.attrs.get(p))) {
            trace!(mark = %mark.kind, attr = name, "positional mark parameter");
            item.push('=');
            item.push_str(&escape_value(&mark_text(&mark.kind, name, value)));
            return item;
        }
    }
    for (name, value) in &mark.attrs {
        item.push('=');
        let text = mark_text(&mark.kind, name, value);
        item.push_str(&escape_value(&format!("{name}:{text}")));
    }
    if primary.is_some() && mark.attrs.len() == 1 {
        // keeps a single named parameter from reading back as positional
        item.push('=');
    }
    item
}

fn mark_text(kind: &MarkKind, name: &str, value: &AttrValue) -> String {
    match (mark_attr_type(kind, name), value) {
        (Some(AttrType::Text), AttrValue::Str(s)) => s.clone(),
        _ => scalar_text(value),
    }
}

/// An annotation tag ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub kind: String,
    node_kind: NodeKind,
    attrs: BTreeMap<String, Option<String>>,
}

impl Tag {
    pub fn new(kind: &NodeKind) -> Self {
        Self {
            kind: kind.name().to_string(),
            node_kind: kind.clone(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attrs(mut self, attrs: &Attrs) -> Self {
        for (name, value) in attrs {
            self = self.with_attr(name, value);
        }
        self
    }

    pub fn with_attr(mut self, name: &str, value: &AttrValue) -> Self {
        let declared = node_attr_type(&self.node_kind, name);
        self.attrs
            .insert(name.to_string(), encode_value(value, declared));
        self
    }

    pub fn with_marks(mut self, marks: &[Mark]) -> Self {
        if !marks.is_empty() {
            self.attrs
                .insert(MARKS_ATTR.to_string(), Some(encode_marks(marks)));
        }
        self
    }

    /// `ADF:{kind}` plus `:{attrs}` when there are any
    pub fn encode(&self) -> String {
        let mut out = format!("ADF:{}", self.kind);
        if self.attrs.is_empty() {
            return out;
        }
        let pairs: Vec<String> = self
            .attrs
            .iter()
            .map(|(name, value)| match value {
                Some(v) => format!("{name}=\"{v}\""),
                None => name.clone(),
            })
            .collect();
        out.push(':');
        out.push_str(&pairs.join(","));
        out
    }

    pub fn open(&self) -> String {
        format!("<!-- {} -->", self.encode())
    }

    pub fn close(&self) -> String {
        close_marker(&self.kind)
    }

    /// Open marker, body and close marker on one line
    pub fn wrap(&self, body: &str) -> String {
        format!("{}{}{}", self.open(), body, self.close())
    }
}

pub fn close_marker(kind: &str) -> String {
    format!("<!-- /ADF:{kind} -->")
}

/// An attribute as found in an open marker, value still escaped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttr {
    pub name: String,
    pub raw: Option<String>,
}

/// A decoded open marker
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTag {
    pub kind: String,
    pub attrs: Vec<RawAttr>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Decode the inside of an open marker (`ADF:kind:attrs`)
pub fn decode_tag(s: &str) -> Result<DecodedTag, GrammarError> {
    let rest = s.trim().strip_prefix("ADF:").ok_or(GrammarError::NotAnnotation)?;
    let (kind, attr_text) = match rest.find(':') {
        Some(i) => (&rest[..i], Some(&rest[i + 1..])),
        None => (rest, None),
    };
    let kind = kind.trim();
    if kind.is_empty() {
        return Err(GrammarError::EmptyKind);
    }
    if !kind
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(GrammarError::InvalidKind(kind.to_string()));
    }

    let mut tag = DecodedTag {
        kind: kind.to_string(),
        attrs: Vec::new(),
        diagnostics: Vec::new(),
    };
    if let Some(text) = attr_text {
        decode_attr_list(text, &mut tag);
    }
    trace!(kind = %tag.kind, attrs = tag.attrs.len(), "decoded annotation");
    Ok(tag)
}

fn decode_attr_list(text: &str, tag: &mut DecodedTag) {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        while i < chars.len() && (chars[i] == ',' || chars[i].is_whitespace()) {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        let name_start = i;
        while i < chars.len() && chars[i] != '=' && chars[i] != ',' {
            i += 1;
        }
        let name: String = chars[name_start..i].iter().collect::<String>().trim().to_string();
        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            tag.diagnostics
                .push(attr_diagnostic(&tag.kind, &name, "malformed attribute name"));
            i = skip_to_separator(&chars, i);
            continue;
        }
        if i >= chars.len() || chars[i] == ',' {
            tag.attrs.push(RawAttr { name, raw: None });
            continue;
        }
        // chars[i] == '='
        i += 1;
        if i >= chars.len() || chars[i] != '"' {
            tag.diagnostics
                .push(attr_diagnostic(&tag.kind, &name, "value is not quoted"));
            i = skip_to_separator(&chars, i);
            continue;
        }
        i += 1;
        let value_start = i;
        let mut closed = false;
        while i < chars.len() {
            match chars[i] {
                '\\' => i += 2,
                '"' => {
                    closed = true;
                    break;
                }
                _ => i += 1,
            }
        }
        if !closed {
            tag.diagnostics
                .push(attr_diagnostic(&tag.kind, &name, "unterminated quote"));
            break;
        }
        let raw: String = chars[value_start..i].iter().collect();
        tag.attrs.push(RawAttr {
            name,
            raw: Some(raw),
        });
        i += 1;
    }
}

fn skip_to_separator(chars: &[char], mut i: usize) -> usize {
    let mut quoted = false;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '"' => quoted = !quoted,
            ',' if !quoted => return i,
            _ => {}
        }
        i += 1;
    }
    i
}

fn attr_diagnostic(kind: &str, attribute: &str, message: &str) -> Diagnostic {
    Diagnostic::AttributeDecode {
        kind: kind.to_string(),
        attribute: attribute.to_string(),
        message: message.to_string(),
    }
}

/// Number in exactly the form `encode_value` writes it
fn canonical_number(s: &str) -> Option<AttrValue> {
    if let Ok(i) = s.parse::<i64>() {
        if i.to_string() == s {
            return Some(AttrValue::Int(i));
        }
    }
    match s.parse::<f64>() {
        Ok(f) if format_float(f) == s => Some(AttrValue::Float(f)),
        _ => None,
    }
}

/// Best guess at the type of an unescaped scalar
fn infer_scalar(s: &str) -> AttrValue {
    if let Some(literal) = s.strip_prefix(LITERAL) {
        return AttrValue::Str(literal.to_string());
    }
    match s {
        "null" => return AttrValue::Null,
        "true" => return AttrValue::Bool(true),
        "false" => return AttrValue::Bool(false),
        _ => {}
    }
    if let Some(n) = canonical_number(s) {
        return n;
    }
    if s.starts_with('{') || s.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<AttrValue>(s) {
            return value;
        }
    }
    AttrValue::Str(s.to_string())
}

fn infer_value(raw: &str) -> Result<AttrValue, String> {
    let items = split_unescaped(raw, ',');
    if items.len() > 1 {
        return items
            .into_iter()
            .map(|item| unescape_value(item).map(|s| infer_scalar(&s)))
            .collect::<Result<Vec<_>, _>>()
            .map(AttrValue::List);
    }
    unescape_value(raw).map(|s| infer_scalar(&s))
}

/// Type a raw attribute value. Declared types win when the text fits them;
/// otherwise the value is inferred.
pub fn type_value(raw: &str, declared: Option<AttrType>) -> Result<AttrValue, String> {
    match declared {
        Some(AttrType::Text) => unescape_value(raw).map(AttrValue::Str),
        Some(AttrType::Number) => {
            let s = unescape_value(raw)?;
            Ok(canonical_number(&s).unwrap_or_else(|| infer_scalar(&s)))
        }
        Some(AttrType::Flag) => {
            let s = unescape_value(raw)?;
            Ok(infer_scalar(&s))
        }
        Some(AttrType::NumberList) => {
            if raw.is_empty() {
                return Ok(AttrValue::List(Vec::new()));
            }
            let numbers: Result<Vec<AttrValue>, String> = split_unescaped(raw, ',')
                .into_iter()
                .map(|item| {
                    let s = unescape_value(item)?;
                    canonical_number(&s).ok_or_else(|| format!("`{s}` is not a number"))
                })
                .collect();
            match numbers {
                Ok(list) => Ok(AttrValue::List(list)),
                Err(_) => infer_value(raw),
            }
        }
        None => infer_value(raw),
    }
}

/// Decode the raw value of a `marks` attribute
pub fn decode_marks(raw: &str) -> Result<Vec<Mark>, String> {
    let mut marks = Vec::new();
    for item in split_unescaped(raw, ',') {
        if item.trim().is_empty() {
            continue;
        }
        let mut parts = split_unescaped(item, '=').into_iter();
        let kind_text = unescape_value(parts.next().unwrap_or_default())?;
        let kind = MarkKind::from_name(kind_text.trim());
        let params: Vec<String> = parts
            .map(unescape_value)
            .collect::<Result<Vec<_>, _>>()?;

        let mut mark = Mark::new(kind);
        match (mark.kind.primary_attr(), params.as_slice()) {
            (_, []) => {}
            (Some(primary), [value]) => {
                let value = mark_value(&mark.kind, primary, value);
                mark.attrs.insert(primary.to_string(), value);
            }
            (_, named) => {
                for param in named.iter().filter(|p| !p.is_empty()) {
                    let (name, value) = param
                        .split_once(':')
                        .ok_or_else(|| format!("mark parameter `{param}` has no name"))?;
                    let value = mark_value(&mark.kind, name, value);
                    mark.attrs.insert(name.to_string(), value);
                }
            }
        }
        marks.push(mark);
    }
    Ok(marks)
}

fn mark_value(kind: &MarkKind, name: &str, value: &str) -> AttrValue {
    match mark_attr_type(kind, name) {
        Some(AttrType::Text) => AttrValue::Str(value.to_string()),
        _ => infer_scalar(value),
    }
}

/// Build a node (attributes and marks, no content) from a decoded tag.
/// Undecodable attributes are dropped and reported.
pub fn node_from_tag(tag: DecodedTag) -> (Node, Vec<Diagnostic>) {
    let kind = NodeKind::from_name(&tag.kind);
    let mut node = Node::new(kind.clone());
    let mut diagnostics = tag.diagnostics;
    for attr in tag.attrs {
        let Some(raw) = attr.raw else {
            node.attrs.insert(attr.name, AttrValue::Null);
            continue;
        };
        if attr.name == MARKS_ATTR {
            match decode_marks(&raw) {
                Ok(marks) => node.marks = marks,
                Err(message) => {
                    diagnostics.push(attr_diagnostic(&tag.kind, &attr.name, &message))
                }
            }
            continue;
        }
        match type_value(&raw, node_attr_type(&kind, &attr.name)) {
            Ok(value) => {
                node.attrs.insert(attr.name, value);
            }
            Err(message) => diagnostics.push(attr_diagnostic(&tag.kind, &attr.name, &message)),
        }
    }
    (node, diagnostics)
}

/// Parse an open marker at the start of `s`; returns the tag and the length
/// of the marker. Text that merely looks like a marker yields `None`.
pub fn parse_open_marker(s: &str) -> Option<(Result<DecodedTag, GrammarError>, usize)> {
    if !s.starts_with(OPEN_PREFIX) {
        return None;
    }
    let end = s.find(COMMENT_END)?;
    let inner = &s[COMMENT_START.len()..end];
    Some((decode_tag(inner), end + COMMENT_END.len()))
}

/// Parse a close marker at the start of `s`; returns its kind and length
pub fn parse_close_marker(s: &str) -> Option<(String, usize)> {
    if !s.starts_with(CLOSE_PREFIX) {
        return None;
    }
    let end = s.find(COMMENT_END)?;
    let kind = s[CLOSE_PREFIX.len()..end].trim();
    if kind.is_empty() {
        return None;
    }
    Some((kind.to_string(), end + COMMENT_END.len()))
}

/// Length of the code span opening at the start of `s`: up to and including
/// the next backtick run of the same width. An opener with no such run
/// stands for itself.
pub(crate) fn code_span_len(s: &str) -> usize {
    let run = |t: &str| t.bytes().take_while(|&b| b == b'`').count();
    let width = run(s);
    let mut i = width;
    while i < s.len() {
        match s.as_bytes()[i] {
            b'`' => {
                let n = run(&s[i..]);
                if n == width {
                    return i + n;
                }
                i += n;
            }
            _ => i += 1,
        }
    }
    width
}

/// Find the close marker matching an already consumed open marker of
/// `kind`, counting nested markers of the same kind. Markers inside code
/// spans are text. Returns the byte offsets of the close marker's start
/// and end.
pub fn find_close(s: &str, kind: &str) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'`' => {
                i += code_span_len(&s[i..]);
                continue;
            }
            b'<' => {
                let rest = &s[i..];
                if let Some((tag, len)) = parse_open_marker(rest) {
                    if matches!(&tag, Ok(t) if t.kind == kind) {
                        depth += 1;
                    }
                    i += len;
                    continue;
                }
                if let Some((close_kind, len)) = parse_close_marker(rest) {
                    if close_kind == kind {
                        if depth == 0 {
                            return Some((i, i + len));
                        }
                        depth -= 1;
                    }
                    i += len;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// An open marker occupying a whole line, starting at column 0
pub fn open_line(line: &str) -> Option<Result<DecodedTag, GrammarError>> {
    let trimmed = line.trim_end();
    match parse_open_marker(trimmed) {
        Some((tag, len)) if len == trimmed.len() => Some(tag),
        _ => None,
    }
}

/// A close marker occupying a whole line, starting at column 0
pub fn close_line(line: &str) -> Option<String> {
    let trimmed = line.trim_end();
    match parse_close_marker(trimmed) {
        Some((kind, len)) if len == trimmed.len() => Some(kind),
        _ => None,
    }
}
