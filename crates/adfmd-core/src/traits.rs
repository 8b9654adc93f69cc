// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parser and Renderer traits, configuration and error types

use crate::ast::Node;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error type for parsing and rendering
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Structural violation at {path}: {message}")]
    StructuralViolation { path: String, message: String },

    #[error("Annotation mismatch at line {line}: {message}")]
    GrammarMismatch { line: usize, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ConversionError>;

/// A problem the parser recovered from
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Open tag without close (or the reverse); the region was kept as literal text
    GrammarMismatch {
        line: usize,
        kind: String,
        message: String,
    },
    /// An attribute could not be decoded and was dropped
    AttributeDecode {
        kind: String,
        attribute: String,
        message: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::GrammarMismatch {
                line,
                kind,
                message,
            } => write!(f, "line {line}: unmatched ADF:{kind} annotation: {message}"),
            Diagnostic::AttributeDecode {
                kind,
                attribute,
                message,
            } => write!(f, "ADF:{kind} attribute `{attribute}` dropped: {message}"),
        }
    }
}

/// Result of a parse together with the problems recovered along the way
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub doc: Node,
    pub diagnostics: Vec<Diagnostic>,
}

fn default_indent() -> String {
    "  ".to_string()
}

/// Configuration for parsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Indentation unit of list item continuation lines
    pub indent: String,
    /// Fail on unmatched annotations instead of keeping them as literal text
    pub strict: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            strict: false,
        }
    }
}

/// Configuration for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Indentation unit for nested list content (default: 2 spaces)
    pub indent: String,
    /// Wrap the document in a `doc` annotation even when it has no attributes
    pub annotate_doc: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            annotate_doc: false,
        }
    }
}

/// Parser trait: convert rendered text to a document tree
pub trait Parser: Send + Sync {
    /// Parse text into a `doc` node, reporting recovered problems
    fn parse(&self, input: &str, config: &ParseConfig) -> Result<Parsed>;
}

/// Renderer trait: convert a document tree to rendered text
pub trait Renderer: Send + Sync {
    /// Render a tree to a string
    fn render(&self, doc: &Node, config: &RenderConfig) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: ParseConfig = serde_json::from_str(r#"{"strict":true}"#).unwrap();
        assert!(config.strict);
        assert_eq!(config.indent, "  ");
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::AttributeDecode {
            kind: "mention".to_string(),
            attribute: "text".to_string(),
            message: "unterminated quote".to_string(),
        };
        assert_eq!(
            d.to_string(),
            "ADF:mention attribute `text` dropped: unterminated quote"
        );
    }
}
