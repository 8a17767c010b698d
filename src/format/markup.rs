// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::borrow::Cow;

use memchr::memchr3;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::model::{Document, ElementData, NodeData, NodeId};

/// Elements that never have children. They may appear unclosed (`<br>`) in page markup.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

/// Detached parse result; inserted into a [`Document`] with [`insert_fragment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
}

#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    #[error("malformed markup at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
    #[error("closing tag </{found}> does not match open <{expected}>")]
    MismatchedEnd { expected: String, found: String },
    #[error("closing tag </{found}> has no matching open tag")]
    UnexpectedEnd { found: String },
    #[error("element <{tag}> is never closed")]
    Unclosed { tag: String },
    #[error("markup contains invalid UTF-8")]
    Utf8,
}

/// Decides what a serialization pass writes out.
pub trait MarkupFilter {
    fn skip_element(&self, _element: &ElementData) -> bool {
        false
    }

    fn keep_attr(&self, _element: &ElementData, _name: &str) -> bool {
        true
    }

    fn keep_class(&self, _class: &str) -> bool {
        true
    }
}

/// Writes everything as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbatim;

impl MarkupFilter for Verbatim {}

struct OpenElement {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<MarkupNode>,
}

pub fn parse_fragment(markup: &str) -> Result<Vec<MarkupNode>, MarkupError> {
    let mut reader = Reader::from_str(markup);
    reader.trim_text(false);
    reader.check_end_names(false);

    let mut roots: Vec<MarkupNode> = Vec::new();
    let mut stack: Vec<OpenElement> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|source| MarkupError::Xml {
            position: reader.buffer_position(),
            source,
        })?;

        match event {
            Event::Start(start) => {
                let (tag, attrs) = read_start(&reader, &start)?;
                if is_void_element(&tag) {
                    push_node(&mut stack, &mut roots, element_node(tag, attrs, Vec::new()));
                } else {
                    stack.push(OpenElement {
                        tag,
                        attrs,
                        children: Vec::new(),
                    });
                }
            }
            Event::Empty(start) => {
                let (tag, attrs) = read_start(&reader, &start)?;
                push_node(&mut stack, &mut roots, element_node(tag, attrs, Vec::new()));
            }
            Event::End(end) => {
                let found = std::str::from_utf8(end.name().as_ref())
                    .map_err(|_| MarkupError::Utf8)?
                    .to_ascii_lowercase();
                if is_void_element(&found) {
                    continue;
                }
                let Some(open) = stack.pop() else {
                    return Err(MarkupError::UnexpectedEnd { found });
                };
                if open.tag != found {
                    return Err(MarkupError::MismatchedEnd {
                        expected: open.tag,
                        found,
                    });
                }
                let node = element_node(open.tag, open.attrs, open.children);
                push_node(&mut stack, &mut roots, node);
            }
            Event::Text(text) => {
                let text = text
                    .unescape_with(resolve_html_entity)
                    .map_err(|source| MarkupError::Xml {
                        position: reader.buffer_position(),
                        source: source.into(),
                    })?;
                if !text.is_empty() {
                    push_node(&mut stack, &mut roots, MarkupNode::Text(text.into_owned()));
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|_| MarkupError::Utf8)?;
                push_node(&mut stack, &mut roots, MarkupNode::Text(text));
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(MarkupError::Unclosed { tag: open.tag });
    }
    Ok(roots)
}

fn read_start(
    reader: &Reader<&[u8]>,
    start: &BytesStart<'_>,
) -> Result<(String, Vec<(String, String)>), MarkupError> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(|_| MarkupError::Utf8)?
        .to_ascii_lowercase();

    let mut attrs = Vec::new();
    for attr in start.html_attributes() {
        let attr = attr.map_err(|source| MarkupError::Xml {
            position: reader.buffer_position(),
            source: source.into(),
        })?;
        let name = std::str::from_utf8(attr.key.as_ref())
            .map_err(|_| MarkupError::Utf8)?
            .to_ascii_lowercase();
        let value = attr
            .unescape_value_with(resolve_html_entity)
            .map_err(|source| MarkupError::Xml {
                position: reader.buffer_position(),
                source,
            })?;
        attrs.push((name, value.into_owned()));
    }
    Ok((tag, attrs))
}

fn element_node(tag: String, attrs: Vec<(String, String)>, children: Vec<MarkupNode>) -> MarkupNode {
    MarkupNode::Element {
        tag,
        attrs,
        children,
    }
}

fn push_node(stack: &mut [OpenElement], roots: &mut Vec<MarkupNode>, node: MarkupNode) {
    match stack.last_mut() {
        Some(open) => open.children.push(node),
        None => roots.push(node),
    }
}

fn resolve_html_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        "nbsp" => "\u{a0}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "hellip" => "\u{2026}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "middot" => "\u{b7}",
        "bull" => "\u{2022}",
        "times" => "\u{d7}",
        "euro" => "\u{20ac}",
        _ => return None,
    })
}

/// Builds a document from page markup. A full page contributes the children of its `<body>`;
/// anything else is taken as body content.
pub fn parse_document(markup: &str) -> Result<Document, MarkupError> {
    let nodes = parse_fragment(markup)?;
    let body = find_body(&nodes).unwrap_or(&nodes);
    let mut doc = Document::new();
    let root = doc.root();
    insert_fragment(&mut doc, root, None, body);
    Ok(doc)
}

fn find_body(nodes: &[MarkupNode]) -> Option<&[MarkupNode]> {
    nodes.iter().find_map(|node| match node {
        MarkupNode::Element { tag, children, .. } if tag == "body" => Some(children.as_slice()),
        MarkupNode::Element { tag, children, .. } if tag == "html" => find_body(children),
        _ => None,
    })
}

/// Inserts parsed nodes under `parent` (before `before`, or at the end) and returns the new
/// top-level node ids in order.
pub fn insert_fragment(
    doc: &mut Document,
    parent: NodeId,
    before: Option<NodeId>,
    nodes: &[MarkupNode],
) -> Vec<NodeId> {
    let mut inserted = Vec::with_capacity(nodes.len());
    for node in nodes {
        let id = build_node(doc, node);
        let attached = match before {
            Some(reference) => doc.insert_before(parent, id, reference),
            None => doc.append_child(parent, id),
        };
        if attached {
            inserted.push(id);
        } else {
            doc.remove(id);
        }
    }
    inserted
}

fn build_node(doc: &mut Document, node: &MarkupNode) -> NodeId {
    match node {
        MarkupNode::Text(text) => doc.create_text(text.clone()),
        MarkupNode::Element {
            tag,
            attrs,
            children,
        } => {
            let id = doc.create_element(tag);
            for (name, value) in attrs {
                doc.set_attr(id, name, value.clone());
            }
            for child in children {
                let child_id = build_node(doc, child);
                doc.append_child(id, child_id);
            }
            id
        }
    }
}

/// Serializes the children of `node` (not the node itself).
pub fn serialize_children(doc: &Document, node: NodeId, filter: &dyn MarkupFilter) -> String {
    let mut out = String::new();
    for &child in doc.children(node) {
        write_node(doc, child, filter, &mut out);
    }
    out
}

pub fn serialize_node(doc: &Document, node: NodeId, filter: &dyn MarkupFilter) -> String {
    let mut out = String::new();
    write_node(doc, node, filter, &mut out);
    out
}

fn write_node(doc: &Document, node: NodeId, filter: &dyn MarkupFilter, out: &mut String) {
    match doc.data(node) {
        Some(NodeData::Text(text)) => out.push_str(&escape_text(text)),
        Some(NodeData::Element(element)) => {
            if filter.skip_element(element) {
                return;
            }
            out.push('<');
            out.push_str(element.tag());
            for (name, value) in element.attrs() {
                if !filter.keep_attr(element, name) {
                    continue;
                }
                let value: Cow<'_, str> = if name == "class" {
                    let kept = value
                        .split_ascii_whitespace()
                        .filter(|c| filter.keep_class(c))
                        .collect::<Vec<_>>();
                    if kept.is_empty() {
                        continue;
                    }
                    Cow::Owned(kept.join(" "))
                } else {
                    Cow::Borrowed(value)
                };
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(&value));
                out.push('"');
            }

            let children = doc.children(node);
            if children.is_empty() && is_void_element(element.tag()) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for &child in children {
                write_node(doc, child, filter, out);
            }
            out.push_str("</");
            out.push_str(element.tag());
            out.push('>');
        }
        None => {}
    }
}

fn escape_text(text: &str) -> Cow<'_, str> {
    if memchr3(b'&', b'<', b'>', text.as_bytes()).is_none() {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

fn escape_attr(value: &str) -> Cow<'_, str> {
    if memchr3(b'&', b'<', b'"', value.as_bytes()).is_none() {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{
        insert_fragment, parse_document, parse_fragment, serialize_children, MarkupError,
        MarkupFilter, MarkupNode, Verbatim,
    };
    use crate::model::{Document, ElementData};

    fn load(markup: &str) -> Document {
        let mut doc = Document::new();
        let nodes = parse_fragment(markup).expect("parse");
        let root = doc.root();
        insert_fragment(&mut doc, root, None, &nodes);
        doc
    }

    #[test]
    fn serialization_is_stable_across_a_reparse() {
        let markup = r#"<h1 class="hero-title">Fresh &amp; local</h1><p>Open <b>daily</b></p><img src="/a.png" alt="A &quot;shop&quot;"/>"#;
        let doc = load(markup);
        let once = serialize_children(&doc, doc.root(), &Verbatim);
        assert_eq!(once, markup);

        let again = load(&once);
        assert_eq!(serialize_children(&again, again.root(), &Verbatim), once);
    }

    #[test]
    fn full_pages_contribute_their_body() {
        let doc = parse_document(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Shop</title></head><body><h1>Hi</h1></body></html>",
        )
        .expect("page");
        assert_eq!(serialize_children(&doc, doc.root(), &Verbatim), "<h1>Hi</h1>");

        let fragment = parse_document("<p>a</p>").expect("fragment");
        assert_eq!(serialize_children(&fragment, fragment.root(), &Verbatim), "<p>a</p>");
    }

    #[test]
    fn html_void_elements_and_entities_are_accepted() {
        let doc = load("<p>Line one<br>Line&nbsp;two</p><video src=\"/v.mp4\" controls></video>");
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.text_content(p), "Line oneLine\u{a0}two");
        assert_eq!(
            serialize_children(&doc, doc.root(), &Verbatim),
            "<p>Line one<br/>Line\u{a0}two</p><video src=\"/v.mp4\" controls=\"\"></video>"
        );
    }

    #[test]
    fn tag_names_are_lowercased() {
        let nodes = parse_fragment("<DIV><P>x</P></DIV>").expect("parse");
        let MarkupNode::Element { tag, children, .. } = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(tag, "div");
        assert!(matches!(&children[0], MarkupNode::Element { tag, .. } if tag == "p"));
    }

    #[test]
    fn malformed_markup_is_rejected() {
        assert!(matches!(
            parse_fragment("<p><b>x</p>"),
            Err(MarkupError::MismatchedEnd { .. })
        ));
        assert!(matches!(parse_fragment("<p>x"), Err(MarkupError::Unclosed { .. })));
        assert!(matches!(parse_fragment("x</p>"), Err(MarkupError::UnexpectedEnd { .. })));
    }

    struct DropSecrets;

    impl MarkupFilter for DropSecrets {
        fn skip_element(&self, element: &ElementData) -> bool {
            element.has_attr("data-secret")
        }

        fn keep_attr(&self, _element: &ElementData, name: &str) -> bool {
            name != "contenteditable"
        }

        fn keep_class(&self, class: &str) -> bool {
            class != "transient"
        }
    }

    #[test]
    fn filters_drop_elements_attributes_and_classes() {
        let doc = load(
            r#"<p class="transient" contenteditable="true">a<button data-secret="1">x</button></p><p class="keep transient">b</p>"#,
        );
        assert_eq!(
            serialize_children(&doc, doc.root(), &DropSecrets),
            r#"<p>a</p><p class="keep">b</p>"#
        );
    }
}
