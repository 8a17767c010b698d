// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Headless document tree.
//!
//! Stands in for the browser document the editor is injected into: an arena of element and text
//! nodes with attributes, inline style, a class list, per-node layout boxes and a viewport. Freed
//! slots are recycled; every handle carries the generation of its slot, so a [`NodeId`] that
//! outlived its node simply resolves to nothing.

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;
use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    tag: SmolStr,
    attrs: IndexMap<SmolStr, String>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: SmolStr::new(tag.to_ascii_lowercase()),
            attrs: IndexMap::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_ascii_whitespace()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
}

#[derive(Debug, Clone)]
struct Entry {
    generation: u32,
    slot: Option<Slot>,
}

/// The document tree. The root is always a `<body>` element.
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Entry>,
    free: Vec<usize>,
    root: NodeId,
    layout: HashMap<NodeId, Rect>,
    viewport: Viewport,
    focused: Option<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let root_slot = Slot {
            data: NodeData::Element(ElementData::new("body")),
            parent: None,
            children: SmallVec::new(),
        };
        Self {
            slots: vec![Entry {
                generation: 0,
                slot: Some(root_slot),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            layout: HashMap::new(),
            viewport: Viewport::default(),
            focused: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    /// Returns true when the node exists and is attached (directly or transitively) to the root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        id == self.root || (self.contains(id) && self.ancestors(id).any(|a| a == self.root))
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(ElementData::new(tag)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let slot = Slot {
            data,
            parent: None,
            children: SmallVec::new(),
        };
        if let Some(index) = self.free.pop() {
            let entry = &mut self.slots[index];
            entry.generation = entry.generation.wrapping_add(1);
            entry.slot = Some(slot);
            return NodeId {
                index,
                generation: entry.generation,
            };
        }
        self.slots.push(Entry {
            generation: 0,
            slot: Some(slot),
        });
        NodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots
            .get(id.index)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.slot.as_ref())
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.slot.as_mut())
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.slot(id).map(|slot| &slot.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.data(id)? {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.slot_mut(id)?.data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(ElementData::tag)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id)? {
            NodeData::Text(text) => Some(text),
            NodeData::Element(_) => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slot(id).map(|slot| slot.children.as_slice()).unwrap_or(&[])
    }

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Returns `node` itself or its nearest ancestor matching `pred`.
    pub fn closest(&self, node: NodeId, mut pred: impl FnMut(NodeId) -> bool) -> Option<NodeId> {
        if self.contains(node) && pred(node) {
            return Some(node);
        }
        self.ancestors(node).find(|&a| pred(a))
    }

    /// Pre-order traversal of `id` and everything below it.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = self.subtree(id);
        if !out.is_empty() {
            out.remove(0);
        }
        out
    }

    pub fn find_first(&self, mut pred: impl FnMut(NodeId) -> bool) -> Option<NodeId> {
        self.subtree(self.root).into_iter().find(|&id| pred(id))
    }

    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|entry| entry.slot.is_some()).count()
    }

    /// Number of arena slots, live or free.
    pub fn slot_capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let index = self.children(parent).len();
        self.insert_at(parent, child, index)
    }

    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> bool {
        let Some(index) = self.children(parent).iter().position(|&c| c == reference) else {
            return false;
        };
        self.insert_at(parent, child, index)
    }

    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) -> bool {
        let Some(parent) = self.parent(sibling) else {
            return false;
        };
        let Some(index) = self.children(parent).iter().position(|&c| c == sibling) else {
            return false;
        };
        self.insert_at(parent, node, index + 1)
    }

    fn insert_at(&mut self, parent: NodeId, child: NodeId, index: usize) -> bool {
        if !self.is_element(parent) || !self.contains(child) || child == self.root {
            return false;
        }
        if child == parent || self.is_ancestor(child, parent) {
            return false;
        }

        let mut index = index;
        if self.parent(child) == Some(parent) {
            if let Some(old) = self.children(parent).iter().position(|&c| c == child) {
                if old < index {
                    index -= 1;
                }
            }
        }
        self.detach(child);

        let Some(parent_slot) = self.slot_mut(parent) else {
            return false;
        };
        let index = index.min(parent_slot.children.len());
        parent_slot.children.insert(index, child);
        if let Some(child_slot) = self.slot_mut(child) {
            child_slot.parent = Some(parent);
        }
        true
    }

    /// Unlinks `id` from its parent without freeing it.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if let Some(parent_slot) = self.slot_mut(parent) {
            parent_slot.children.retain(|c| *c != id);
        }
        if let Some(slot) = self.slot_mut(id) {
            slot.parent = None;
        }
        true
    }

    /// Detaches `id` and frees its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        self.detach(id);
        for node in self.subtree(id) {
            self.layout.remove(&node);
            if self.focused == Some(node) {
                self.focused = None;
            }
            self.slots[node.index].slot = None;
            self.free.push(node.index);
        }
        true
    }

    /// Puts `replacement` where `old` was and frees `old` (and anything still below it).
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) -> bool {
        let Some(parent) = self.parent(old) else {
            return false;
        };
        if !self.insert_before(parent, replacement, old) {
            return false;
        }
        self.remove(old)
    }

    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let children = self.children(from).to_vec();
        for child in children {
            self.append_child(to, child);
        }
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        for child in children {
            self.remove(child);
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> bool {
        match self.slot_mut(id).map(|slot| &mut slot.data) {
            Some(NodeData::Text(existing)) => {
                *existing = text.into();
                true
            }
            _ => false,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_attr(name))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> bool {
        let Some(element) = self.element_mut(id) else {
            return false;
        };
        element
            .attrs
            .insert(SmolStr::new(name.to_ascii_lowercase()), value.into());
        true
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id)?.attrs.shift_remove(name)
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_class(class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if !self.is_element(id) || self.has_class(id, class) {
            return;
        }
        let mut classes = self.attr(id, "class").unwrap_or_default().to_owned();
        if !classes.trim().is_empty() {
            classes = classes.trim().to_owned();
            classes.push(' ');
        } else {
            classes.clear();
        }
        classes.push_str(class);
        self.set_attr(id, "class", classes);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let remaining = self
            .element(id)
            .map(|e| e.classes().filter(|c| *c != class).collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        if remaining.is_empty() {
            self.remove_attr(id, "class");
        } else {
            self.set_attr(id, "class", remaining);
        }
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attr(id, "style")?;
        parse_style(style)
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Sets (`Some`) or clears (`None`) one inline style declaration, keeping the others in order.
    pub fn set_style(&mut self, id: NodeId, property: &str, value: Option<&str>) {
        if !self.is_element(id) {
            return;
        }
        let mut decls = self.attr(id, "style").map(parse_style).unwrap_or_default();
        let property = property.trim().to_ascii_lowercase();
        match value {
            Some(value) => {
                if let Some(existing) = decls.iter_mut().find(|(name, _)| *name == property) {
                    existing.1 = value.trim().to_owned();
                } else {
                    decls.push((property, value.trim().to_owned()));
                }
            }
            None => decls.retain(|(name, _)| *name != property),
        }

        if decls.is_empty() {
            self.remove_attr(id, "style");
        } else {
            let rendered = decls
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect::<Vec<_>>()
                .join("; ");
            self.set_attr(id, "style", rendered);
        }
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.text_content_where(id, |_| true)
    }

    /// Concatenated text below `id`, skipping element subtrees for which `include` is false.
    pub fn text_content_where(&self, id: NodeId, include: impl Fn(&ElementData) -> bool) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.data(current) {
                Some(NodeData::Text(text)) => out.push_str(text),
                Some(NodeData::Element(element)) => {
                    if current != id && !include(element) {
                        continue;
                    }
                    stack.extend(self.children(current).iter().rev().copied());
                }
                None => {}
            }
        }
        out
    }

    pub fn layout(&self, id: NodeId) -> Rect {
        self.layout.get(&id).copied().unwrap_or_default()
    }

    pub fn set_layout(&mut self, id: NodeId, rect: Rect) {
        if self.contains(id) {
            self.layout.insert(id, rect);
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn focus(&mut self, id: NodeId) {
        if self.contains(id) {
            self.focused = Some(id);
        }
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            (!name.is_empty() && !value.is_empty()).then(|| (name, value.to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Document, Rect};

    fn paragraph(doc: &mut Document, text: &str) -> super::NodeId {
        let p = doc.create_element("p");
        let t = doc.create_text(text);
        doc.append_child(p, t);
        doc.append_child(doc.root(), p);
        p
    }

    #[test]
    fn append_and_text_content() {
        let mut doc = Document::new();
        let p = paragraph(&mut doc, "Hello ");
        let b = doc.create_element("b");
        let t = doc.create_text("world");
        doc.append_child(b, t);
        doc.append_child(p, b);

        assert_eq!(doc.text_content(p), "Hello world");
        assert_eq!(doc.text_content_where(p, |e| e.tag() != "b"), "Hello ");
        assert!(doc.is_connected(t));
    }

    #[test]
    fn append_rejects_cycles() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(doc.root(), outer);
        doc.append_child(outer, inner);

        assert!(!doc.append_child(inner, outer));
        assert!(!doc.append_child(inner, doc.root()));
        assert_eq!(doc.parent(inner), Some(outer));
    }

    #[test]
    fn remove_frees_subtree_and_stale_ids_resolve_to_nothing() {
        let mut doc = Document::new();
        let p = paragraph(&mut doc, "gone");
        let text = doc.children(p)[0];
        doc.set_layout(p, Rect::new(1.0, 2.0, 3.0, 4.0));
        doc.focus(p);

        assert!(doc.remove(p));
        assert!(!doc.contains(p));
        assert!(!doc.contains(text));
        assert_eq!(doc.focused(), None);
        assert_eq!(doc.layout(p), Rect::default());
        assert!(doc.children(doc.root()).is_empty());
        assert!(!doc.remove(doc.root()));
    }

    #[test]
    fn freed_slots_are_recycled_under_a_new_generation() {
        let mut doc = Document::new();
        let old = paragraph(&mut doc, "old");
        let capacity = doc.slot_capacity();
        assert!(doc.remove(old));

        let fresh = paragraph(&mut doc, "fresh");
        assert_eq!(doc.slot_capacity(), capacity);
        assert_ne!(fresh, old);
        assert!(!doc.contains(old));
        assert_eq!(doc.text_content(fresh), "fresh");
        assert_eq!(doc.tag(old), None);
    }

    #[test]
    fn replace_keeps_position() {
        let mut doc = Document::new();
        let first = paragraph(&mut doc, "one");
        let second = paragraph(&mut doc, "two");
        let heading = doc.create_element("h2");
        doc.move_children(first, heading);

        assert!(doc.replace(first, heading));
        assert_eq!(doc.children(doc.root()), &[heading, second]);
        assert_eq!(doc.text_content(heading), "one");
    }

    #[test]
    fn reinserting_within_same_parent_moves_node() {
        let mut doc = Document::new();
        let a = paragraph(&mut doc, "a");
        let b = paragraph(&mut doc, "b");
        let c = paragraph(&mut doc, "c");

        assert!(doc.insert_after(c, a));
        assert_eq!(doc.children(doc.root()), &[b, c, a]);
        assert!(doc.insert_before(doc.root(), a, b));
        assert_eq!(doc.children(doc.root()), &[a, b, c]);
    }

    #[test]
    fn class_list_round_trip() {
        let mut doc = Document::new();
        let p = paragraph(&mut doc, "x");
        doc.add_class(p, "hero");
        doc.add_class(p, "active");
        doc.add_class(p, "hero");
        assert_eq!(doc.attr(p, "class"), Some("hero active"));

        doc.remove_class(p, "hero");
        assert_eq!(doc.attr(p, "class"), Some("active"));
        doc.remove_class(p, "active");
        assert_eq!(doc.attr(p, "class"), None);
    }

    #[test]
    fn inline_style_declarations_keep_order() {
        let mut doc = Document::new();
        let p = paragraph(&mut doc, "x");
        doc.set_attr(p, "style", "color: red;  margin : 0");
        doc.set_style(p, "font-weight", Some("bold"));
        doc.set_style(p, "color", Some("blue"));
        assert_eq!(doc.attr(p, "style"), Some("color: blue; margin: 0; font-weight: bold"));
        assert_eq!(doc.style(p, "margin").as_deref(), Some("0"));

        doc.set_style(p, "color", None);
        doc.set_style(p, "margin", None);
        doc.set_style(p, "font-weight", None);
        assert_eq!(doc.attr(p, "style"), None);
    }
}
