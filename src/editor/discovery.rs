// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Element discovery and marking.

use std::collections::HashSet;

use tracing::{trace, warn};

use crate::format::markup::is_void_element;
use crate::model::{Document, EditType, ElementId, NodeId, Selector};

use super::{
    is_editor_ui, rendered_text, ATTR_DELETE_FOR, ATTR_EDITABLE, ATTR_EDIT_TYPE, ATTR_EDITOR_UI,
    ATTR_ELEMENT_ID, CLASS_DELETE_BUTTON,
};

/// Candidate selectors used when the configuration does not name its own.
pub const DEFAULT_SELECTORS: &[&str] = &[
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "p",
    "span",
    "li",
    "a",
    "button",
    "blockquote",
    "img",
    "div[class*=\"text\"]",
    ".hero-title",
    ".hero-subtitle",
    ".section-title",
    "[class*=\"title\"]",
    "[class*=\"heading\"]",
    ".about-text",
    ".service-description",
    ".review-text",
    "[data-edit]",
];

const ID_TEXT_CHARS: usize = 20;
const SKIPPED_TAGS: &[&str] = &["script", "style", "template", "noscript"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub node: NodeId,
    pub element_id: ElementId,
    pub edit_type: EditType,
}

/// Marks every qualifying element under `scope` (inclusive) and attaches delete affordances.
///
/// Elements that are already marked, that sit inside a marked element, or that are part of the
/// editor's own UI are left alone, so repeated passes are no-ops.
pub fn discover(doc: &mut Document, scope: NodeId, selectors: &[Selector]) -> Vec<Discovered> {
    let mut taken = marked_ids(doc);
    let mut found = Vec::new();

    for node in doc.subtree(scope) {
        if !qualifies(doc, node, selectors) {
            continue;
        }
        let edit_type = doc.tag(node).map(EditType::for_tag).unwrap_or(EditType::Text);

        let existing = doc
            .attr(node, ATTR_ELEMENT_ID)
            .filter(|id| !taken.contains(*id))
            .and_then(|id| ElementId::new(id).ok());
        let element_id = match existing {
            Some(id) => id,
            None => match ElementId::new(unique_id(derive_element_id(doc, node), &taken)) {
                Ok(id) => id,
                Err(err) => {
                    warn!(error = %err, "cannot derive element id");
                    continue;
                }
            },
        };
        taken.insert(element_id.as_str().to_owned());

        doc.set_attr(node, ATTR_EDITABLE, "true");
        doc.set_attr(node, ATTR_EDIT_TYPE, edit_type.as_str());
        doc.set_attr(node, ATTR_ELEMENT_ID, element_id.as_str());
        attach_delete_affordance(doc, node, &element_id);
        trace!(element_id = %element_id, %edit_type, "marked editable");

        found.push(Discovered {
            node,
            element_id,
            edit_type,
        });
    }
    found
}

fn qualifies(doc: &Document, node: NodeId, selectors: &[Selector]) -> bool {
    let Some(element) = doc.element(node) else {
        return false;
    };
    if node == doc.root() || element.has_attr(ATTR_EDITABLE) {
        return false;
    }
    if SKIPPED_TAGS.contains(&element.tag()) {
        return false;
    }
    let inside_ui_or_marked = doc.ancestors(node).any(|ancestor| {
        doc.element(ancestor)
            .is_some_and(|e| e.has_attr(ATTR_EDITABLE) || is_editor_ui(e))
    });
    if is_editor_ui(element) || inside_ui_or_marked {
        return false;
    }
    if !selectors.iter().any(|selector| selector.matches(doc, node)) {
        return false;
    }
    match EditType::for_tag(element.tag()) {
        EditType::Image => true,
        EditType::Text => !rendered_text(doc, node).trim().is_empty(),
    }
}

fn marked_ids(doc: &Document) -> HashSet<String> {
    doc.subtree(doc.root())
        .into_iter()
        .filter(|&node| doc.has_attr(node, ATTR_EDITABLE))
        .filter_map(|node| doc.attr(node, ATTR_ELEMENT_ID).map(str::to_owned))
        .collect()
}

/// `<tag>-<class>-<text>-<index>`, where text is the first characters of the rendered text and
/// index counts preceding siblings with the same tag.
pub fn derive_element_id(doc: &Document, node: NodeId) -> String {
    let tag = doc.tag(node).unwrap_or("node");
    let class = doc
        .attr(node, "class")
        .map(|c| c.split_whitespace().collect::<Vec<_>>().join("-"))
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "no-class".to_owned());
    let text = rendered_text(doc, node);
    let text = text
        .trim()
        .chars()
        .take(ID_TEXT_CHARS)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    let text = if text.is_empty() {
        "no-text".to_owned()
    } else {
        text
    };
    let index = doc
        .parent(node)
        .map(|parent| {
            doc.children(parent)
                .iter()
                .take_while(|&&sibling| sibling != node)
                .filter(|&&sibling| doc.tag(sibling) == Some(tag))
                .count()
        })
        .unwrap_or(0);

    sanitize_id(&format!("{tag}-{class}-{text}-{index}"))
}

fn sanitize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars().flat_map(char::to_lowercase) {
        let ch = if ch.is_alphanumeric() || ch == '_' { ch } else { '-' };
        if ch == '-' && out.ends_with('-') {
            continue;
        }
        out.push(ch);
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "element".to_owned()
    } else {
        trimmed.to_owned()
    }
}

fn unique_id(base: String, taken: &HashSet<String>) -> String {
    let mut candidate = base.clone();
    let mut suffix = 2usize;
    while taken.contains(&candidate) {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    candidate
}

fn attach_delete_affordance(doc: &mut Document, node: NodeId, element_id: &ElementId) {
    if find_delete_affordance(doc, node).is_some() {
        return;
    }
    let button = doc.create_element("button");
    doc.set_attr(button, "class", CLASS_DELETE_BUTTON);
    doc.set_attr(button, ATTR_EDITOR_UI, "delete");
    doc.set_attr(button, ATTR_DELETE_FOR, element_id.as_str());
    doc.set_attr(button, "title", "Delete element");
    let label = doc.create_text("\u{d7}");
    doc.append_child(button, label);

    let void = doc.tag(node).is_some_and(is_void_element);
    if void {
        doc.insert_after(node, button);
    } else {
        doc.append_child(node, button);
    }
}

/// The delete affordance belonging to `node`: a child, or the following sibling for void elements.
pub fn find_delete_affordance(doc: &Document, node: NodeId) -> Option<NodeId> {
    let element_id = doc.attr(node, ATTR_ELEMENT_ID)?;
    let is_affordance = |candidate: NodeId| {
        doc.attr(candidate, ATTR_EDITOR_UI) == Some("delete")
            && doc.attr(candidate, ATTR_DELETE_FOR) == Some(element_id)
    };
    if let Some(&child) = doc.children(node).iter().find(|&&c| is_affordance(c)) {
        return Some(child);
    }
    let parent = doc.parent(node)?;
    let siblings = doc.children(parent);
    let position = siblings.iter().position(|&c| c == node)?;
    siblings
        .get(position + 1)
        .copied()
        .filter(|&next| is_affordance(next))
}
