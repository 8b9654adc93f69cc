// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared helpers for integration tests

#![allow(dead_code)]

use adfmd_core::{from_markdown, to_markdown, Node};
use pretty_assertions::assert_eq;
use tracing_subscriber::EnvFilter;

/// Route library logs through the test harness; `RUST_LOG=adfmd_core=debug`
/// shows them for a failing test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn doc_from_json(json: &str) -> Node {
    Node::from_json(json).expect("fixture is valid ADF JSON")
}

/// Tree -> text -> tree must give back the canonical input, and rendering
/// the result again must give the same text
pub fn assert_round_trip(doc: &Node) -> String {
    init_tracing();
    let markdown = to_markdown(doc).expect("tree renders");
    let back = from_markdown(&markdown).expect("rendered text parses");
    assert_eq!(back, doc.clone().canonicalized(), "markdown was:\n{markdown}");
    let again = to_markdown(&back).expect("parsed tree renders");
    assert_eq!(again, markdown);
    markdown
}
