// SPDX-License-Identifier: AGPL-3.0-or-later
//! adfmd Core - lossless Atlassian Document Format <-> Markdown conversion
//!
//! This crate provides:
//! - The ADF document tree (`Node`) with serde JSON loading and saving
//! - An HTML-comment annotation grammar that carries everything Markdown
//!   cannot express natively
//! - A serializer and parser pair that round-trip any valid tree
//! - C FFI exports for non-Rust hosts

pub mod ast;
pub mod config;
pub mod formats;
pub mod grammar;
pub mod schema;
pub mod traits;

#[cfg(feature = "ffi")]
pub mod ffi;

pub use ast::{AttrValue, Attrs, Mark, MarkKind, Node, NodeKind};
pub use config::Config;
pub use formats::MarkdownHandler;
pub use traits::{
    ConversionError, Diagnostic, ParseConfig, Parsed, Parser, RenderConfig, Renderer, Result,
};

/// Render a tree as annotated Markdown with default settings
pub fn to_markdown(doc: &Node) -> Result<String> {
    MarkdownHandler::new().render(doc, &RenderConfig::default())
}

/// Parse annotated Markdown with default settings, discarding diagnostics
pub fn from_markdown(input: &str) -> Result<Node> {
    parse_with_diagnostics(input, &ParseConfig::default()).map(|parsed| parsed.doc)
}

/// Parse annotated Markdown, returning the recovered problems with the tree
pub fn parse_with_diagnostics(input: &str, config: &ParseConfig) -> Result<Parsed> {
    MarkdownHandler::new().parse(input, config)
}

/// ADF JSON in, annotated Markdown out
pub fn adf_json_to_markdown(json: &str) -> Result<String> {
    let doc = Node::from_json(json)?;
    to_markdown(&doc)
}

/// Annotated Markdown in, ADF JSON out
pub fn markdown_to_adf_json(input: &str) -> Result<String> {
    let doc = from_markdown(input)?;
    Ok(doc.to_json()?)
}
