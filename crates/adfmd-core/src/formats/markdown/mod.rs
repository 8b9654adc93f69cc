// SPDX-License-Identifier: AGPL-3.0-or-later
//! Annotated Markdown handler
//!
//! Native Markdown is written wherever it carries a node exactly; the
//! rest travels in `<!-- ADF:kind:... -->` comment annotations.

pub(crate) mod inline;
pub mod parser;
pub mod serializer;
pub mod table;

use crate::ast::Node;
use crate::traits::{ParseConfig, Parsed, Parser, RenderConfig, Renderer, Result};
use tracing::debug;

/// Markdown format handler
pub struct MarkdownHandler;

impl MarkdownHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for MarkdownHandler {
    fn parse(&self, input: &str, config: &ParseConfig) -> Result<Parsed> {
        debug!(bytes = input.len(), strict = config.strict, "parsing markdown");
        parser::parse(input, config)
    }
}

impl Renderer for MarkdownHandler {
    fn render(&self, doc: &Node, config: &RenderConfig) -> Result<String> {
        debug!(blocks = doc.content.len(), "rendering markdown");
        serializer::serialize(doc, config)
    }
}
