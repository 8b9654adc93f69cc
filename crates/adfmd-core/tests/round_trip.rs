// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end conversions through the public API

mod common;

use adfmd_core::{
    adf_json_to_markdown, from_markdown, markdown_to_adf_json, parse_with_diagnostics,
    to_markdown, ConversionError, Diagnostic, Mark, MarkKind, Node, NodeKind, ParseConfig,
};
use common::{assert_round_trip, doc_from_json, init_tracing};
use pretty_assertions::assert_eq;

#[test]
fn test_rich_document_round_trip() {
    let doc = doc_from_json(
        r#"{
          "type": "doc",
          "version": 1,
          "content": [
            {"type": "heading", "attrs": {"level": 2}, "content": [{"type": "text", "text": "Release notes"}]},
            {"type": "paragraph", "content": [
              {"type": "text", "text": "Ship "},
              {"type": "text", "text": "today", "marks": [{"type": "strong"}, {"type": "em"}]},
              {"type": "text", "text": " with "},
              {"type": "text", "text": "cargo", "marks": [{"type": "code"}]},
              {"type": "hardBreak"},
              {"type": "text", "text": "see "},
              {"type": "text", "text": "docs", "marks": [{"type": "link", "attrs": {"href": "https://example.com/docs"}}]}
            ]},
            {"type": "bulletList", "content": [
              {"type": "listItem", "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "outer"}]},
                {"type": "orderedList", "attrs": {"order": 3}, "content": [
                  {"type": "listItem", "content": [{"type": "paragraph", "content": [{"type": "text", "text": "three"}]}]},
                  {"type": "listItem", "content": [{"type": "paragraph", "content": [{"type": "text", "text": "four"}]}]}
                ]}
              ]},
              {"type": "listItem", "content": [{"type": "paragraph", "content": [{"type": "text", "text": "last"}]}]}
            ]},
            {"type": "codeBlock", "attrs": {"language": "rust"}, "content": [{"type": "text", "text": "let s = \"```\";\n\nprintln!(\"{s}\");"}]},
            {"type": "blockquote", "content": [{"type": "paragraph", "content": [{"type": "text", "text": "quoted"}]}]},
            {"type": "rule"},
            {"type": "panel", "attrs": {"panelType": "warning"}, "content": [
              {"type": "paragraph", "content": [{"type": "text", "text": "Careful"}]}
            ]},
            {"type": "expand", "attrs": {"title": "Details"}, "content": [
              {"type": "paragraph", "content": [{"type": "text", "text": "Hidden"}]}
            ]}
          ]
        }"#,
    );
    assert_round_trip(&doc);
}

#[test]
fn test_inline_nodes_round_trip() {
    let doc = doc_from_json(
        r#"{
          "type": "doc",
          "content": [
            {"type": "paragraph", "content": [
              {"type": "mention", "attrs": {"id": "u1", "text": "@Ann", "accessLevel": ""}},
              {"type": "text", "text": " on "},
              {"type": "date", "attrs": {"timestamp": "1733172673000"}},
              {"type": "text", "text": " is "},
              {"type": "status", "attrs": {"text": "IN PROGRESS", "color": "blue"}},
              {"type": "text", "text": " "},
              {"type": "emoji", "attrs": {"shortName": ":smile:", "id": "1f604", "text": "😄"}},
              {"type": "text", "text": " "},
              {"type": "inlineCard", "attrs": {"url": "https://example.com"}}
            ]}
          ]
        }"#,
    );
    let markdown = assert_round_trip(&doc);
    assert!(markdown.contains("2024-12-02T20:51:13Z"));
    assert!(markdown.contains("[https://example.com](https://example.com)"));
}

#[test]
fn test_media_round_trip() {
    let doc = doc_from_json(
        r#"{
          "type": "doc",
          "content": [
            {"type": "mediaSingle", "attrs": {"layout": "center", "width": 66.5}, "content": [
              {"type": "media", "attrs": {"id": "abc-123", "type": "file", "collection": "docs", "width": 760, "height": 400, "alt": "diagram"}},
              {"type": "caption", "content": [{"type": "text", "text": "Figure 1"}]}
            ]},
            {"type": "mediaGroup", "content": [
              {"type": "media", "attrs": {"id": "a", "type": "file", "collection": ""}},
              {"type": "media", "attrs": {"id": "b", "type": "file", "collection": ""}}
            ]}
          ]
        }"#,
    );
    assert_round_trip(&doc);
}

#[test]
fn test_underline_with_strong_exact_text() {
    let doc = Node::doc(vec![Node::paragraph(vec![Node::text("bold")
        .with_mark(Mark::new(MarkKind::Strong))
        .with_mark(Mark::new(MarkKind::Underline))])]);
    assert_eq!(
        to_markdown(&doc).unwrap(),
        "<!-- ADF:text:marks=\"underline\" -->**bold**<!-- /ADF:text -->\n"
    );
    assert_round_trip(&doc);
}

#[test]
fn test_mention_text_is_escaped() {
    let doc = Node::doc(vec![Node::paragraph(vec![Node::new(NodeKind::Mention)
        .with_attr("id", "u1")
        .with_attr("text", r#"He said "hi", =ok="#)])]);
    let markdown = assert_round_trip(&doc);
    assert_eq!(
        markdown,
        "<!-- ADF:mention:id=\"u1\",text=\"He said \\\"hi\\\"\\, \\=ok\\=\" -->He said \"hi\", =ok=<!-- /ADF:mention -->\n"
    );
}

#[test]
fn test_headings() {
    for level in 1..=6 {
        let doc = Node::doc(vec![Node::heading(level, vec![Node::text("Title")])]);
        let markdown = assert_round_trip(&doc);
        assert_eq!(markdown, format!("{} Title\n", "#".repeat(level as usize)));
    }
    for level in [0, 7] {
        let doc = Node::doc(vec![Node::heading(level, vec![Node::text("Title")])]);
        let err = to_markdown(&doc).unwrap_err();
        assert!(
            matches!(&err, ConversionError::StructuralViolation { path, .. } if path == "doc/heading[0]"),
            "unexpected error: {err}"
        );
    }
}

#[test]
fn test_heading_with_extra_attrs_uses_overlay() {
    let doc = Node::doc(vec![
        Node::heading(3, vec![Node::text("Anchored")]).with_attr("localId", "abc")
    ]);
    let markdown = assert_round_trip(&doc);
    assert_eq!(
        markdown,
        "<!-- ADF:heading:localId=\"abc\" -->\n### Anchored\n<!-- /ADF:heading -->\n"
    );
}

#[test]
fn test_unknown_nodes_and_marks_pass_through() {
    let doc = doc_from_json(
        r#"{
          "type": "doc",
          "content": [
            {"type": "decisionList", "attrs": {"localId": "d1"}, "content": [
              {"type": "decisionItem", "attrs": {"localId": "i1", "state": "DECIDED"}, "content": [
                {"type": "text", "text": "Ship it"}
              ]}
            ]},
            {"type": "paragraph", "content": [
              {"type": "text", "text": "commented", "marks": [
                {"type": "annotation", "attrs": {"id": "a1", "annotationType": "inlineComment"}}
              ]},
              {"type": "text", "text": " then "},
              {"type": "placeholder", "attrs": {"text": "type here"}}
            ]}
          ]
        }"#,
    );
    assert_round_trip(&doc);
}

#[test]
fn test_json_helpers() {
    init_tracing();
    let json = r#"{"type":"doc","version":1,"content":[{"type":"paragraph","content":[{"type":"text","text":"Hi *there*"}]}]}"#;
    let markdown = adf_json_to_markdown(json).unwrap();
    assert_eq!(
        markdown,
        "<!-- ADF:doc:version=\"1\" -->\nHi \\*there\\*\n<!-- /ADF:doc -->\n"
    );
    let back: serde_json::Value = serde_json::from_str(&markdown_to_adf_json(&markdown).unwrap()).unwrap();
    let expected: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(back, expected);
}

#[test]
fn test_invalid_json_is_reported() {
    assert!(matches!(
        adf_json_to_markdown("{\"type\":"),
        Err(ConversionError::Json(_))
    ));
}

#[test]
fn test_hand_written_markdown() {
    init_tracing();
    let doc = from_markdown("# Plan\n\nSome *emphasis* and a [link](https://x.io).\n\n- one\n- two\n").unwrap();
    assert_eq!(doc.content.len(), 3);
    assert_eq!(doc.content[0], Node::heading(1, vec![Node::text("Plan")]));
    let para = &doc.content[1];
    assert_eq!(
        para.content[1],
        Node::text("emphasis").with_mark(Mark::new(MarkKind::Em))
    );
    assert_eq!(
        para.content[3],
        Node::text("link").with_mark(Mark::link("https://x.io"))
    );
    assert_eq!(doc.content[2].kind, NodeKind::BulletList);
    assert_eq!(doc.content[2].content.len(), 2);
}

#[test]
fn test_unmatched_inline_tag_is_recovered() {
    init_tracing();
    let input = "before <!-- ADF:status:text=\"x\" --> after\n";
    let parsed = parse_with_diagnostics(input, &ParseConfig::default()).unwrap();
    let text: String = parsed.doc.content[0]
        .content
        .iter()
        .filter_map(|n| n.text.as_deref())
        .collect();
    assert!(text.contains("ADF:status"), "literal kept: {text:?}");
    assert!(parsed
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::GrammarMismatch { line: 1, .. })));

    let strict = ParseConfig {
        strict: true,
        ..ParseConfig::default()
    };
    assert!(matches!(
        parse_with_diagnostics(input, &strict),
        Err(ConversionError::GrammarMismatch { line: 1, .. })
    ));
}

#[test]
fn test_bad_attribute_is_dropped_with_diagnostic() {
    init_tracing();
    let input = "<!-- ADF:status:text=\"ok\",color=\"bad\\q\" -->ok<!-- /ADF:status -->\n";
    let parsed = parse_with_diagnostics(input, &ParseConfig::default()).unwrap();
    let status = &parsed.doc.content[0].content[0];
    assert_eq!(status.kind, NodeKind::Status);
    assert_eq!(status.attr_str("text"), Some("ok"));
    assert!(status.attr("color").is_none());
    assert!(matches!(
        &parsed.diagnostics[..],
        [Diagnostic::AttributeDecode { attribute, .. }] if attribute == "color"
    ));
}

#[test]
fn test_empty_document() {
    let doc = Node::doc(vec![]);
    assert_eq!(to_markdown(&doc).unwrap(), "");
    assert_eq!(from_markdown("").unwrap(), doc);
    assert_eq!(from_markdown("\n\n  \n").unwrap(), doc);
}

#[test]
fn test_indented_paragraph_after_list_stays_top_level() {
    let doc = Node::doc(vec![
        Node::new(NodeKind::BulletList).with_content(vec![Node::new(NodeKind::ListItem)
            .with_content(vec![Node::paragraph(vec![Node::text("a")])])]),
        Node::paragraph(vec![Node::text("  indented")]),
    ]);
    let markdown = assert_round_trip(&doc);
    assert!(markdown.contains("\n<!-- ADF:paragraph -->\n  indented\n"));
}

#[test]
fn test_strings_that_read_as_other_types() {
    let doc = Node::doc(vec![Node::new(NodeKind::Unknown("taskList".into()))
        .with_attr("localId", "123")
        .with_attr("flag", "true")
        .with_attr("none", "null")
        .with_attr("list", "[1]")
        .with_content(vec![Node::paragraph(vec![Node::text("x")])])]);
    let markdown = assert_round_trip(&doc);
    assert!(markdown.contains("localId=\"'123\""), "{markdown}");
    assert!(markdown.contains("flag=\"'true\""), "{markdown}");
}

#[test]
fn test_close_marker_inside_code_under_a_text_annotation() {
    let doc = Node::doc(vec![Node::paragraph(vec![Node::text("x<!-- /ADF:text -->y")
        .with_mark(Mark::new(MarkKind::Code))
        .with_mark(Mark::new(MarkKind::Underline))])]);
    let markdown = assert_round_trip(&doc);
    assert_eq!(
        markdown,
        "<!-- ADF:text:marks=\"underline\" -->`x<!-- /ADF:text -->y`<!-- /ADF:text -->\n"
    );
}

#[test]
fn test_two_spaces_before_newline_stay_text() {
    let doc = Node::doc(vec![Node::paragraph(vec![Node::text("a  \nb")])]);
    assert_round_trip(&doc);
    let hard_break = Node::doc(vec![Node::paragraph(vec![
        Node::text("a"),
        Node::new(NodeKind::HardBreak),
        Node::text("b"),
    ])]);
    assert_eq!(assert_round_trip(&hard_break), "a  \nb\n");
}

#[test]
fn test_carriage_returns_are_kept() {
    let doc = Node::doc(vec![
        Node::paragraph(vec![Node::text("a\r")]),
        Node::paragraph(vec![Node::text("b")]),
    ]);
    assert_round_trip(&doc);
    let heading = Node::doc(vec![Node::heading(2, vec![Node::text("\r\ntitle\r")])]);
    assert_round_trip(&heading);
}

#[test]
fn test_unknown_inline_node_with_block_children() {
    let ext = Node::new(NodeKind::Unknown("inlineExtension".into()))
        .with_attr("extensionKey", "toc")
        .with_content(vec![Node::paragraph(vec![Node::text("x")])]);
    assert_round_trip(&Node::doc(vec![Node::paragraph(vec![ext.clone()])]));
    assert_round_trip(&Node::doc(vec![Node::paragraph(vec![
        Node::text("before "),
        ext,
        Node::text(" after"),
    ])]));
}

#[test]
fn test_unknown_block_with_text_over_several_lines() {
    for content in [
        vec![Node::text("first\n\nsecond")],
        vec![Node::text("\nsurrounded\n")],
        vec![Node::new(NodeKind::HardBreak), Node::text("after a break")],
    ] {
        let item = Node::new(NodeKind::Unknown("decisionItem".into()))
            .with_attr("state", "DECIDED")
            .with_content(content);
        assert_round_trip(&Node::doc(vec![
            item.clone(),
            Node::new(NodeKind::BulletList).with_content(vec![
                Node::new(NodeKind::ListItem).with_content(vec![item])
            ]),
        ]));
    }
}
