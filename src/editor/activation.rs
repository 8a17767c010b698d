// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Activation, deactivation and the floating toolbar.

use serde::Serialize;
use tracing::debug;

use crate::config::ToolbarGeometry;
use crate::model::{EditType, ElementId, NodeId, Rect, Viewport};
use crate::protocol::OutboundMessage;

use super::discovery::find_delete_affordance;
use super::{
    rendered_text, EditorSession, KeyInput, ATTR_DELETE_FOR, ATTR_EDITABLE, ATTR_EDITOR_UI,
    CLASS_ACTIVE,
};
use super::commands::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Above,
    Below,
}

/// Page coordinates of the toolbar's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToolbarPosition {
    pub top: f64,
    pub left: f64,
    pub placement: Placement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolbarMode {
    /// Formatting controls for in-place text editing.
    Text,
    /// Replace/URL controls for images.
    Image,
}

impl From<EditType> for ToolbarMode {
    fn from(edit_type: EditType) -> Self {
        match edit_type {
            EditType::Text => Self::Text,
            EditType::Image => Self::Image,
        }
    }
}

/// The toolbar is bound to the active element: shown iff something is active.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Toolbar {
    bound: Option<(NodeId, ToolbarMode, ToolbarPosition)>,
}

impl Toolbar {
    pub fn is_visible(&self) -> bool {
        self.bound.is_some()
    }

    pub fn target(&self) -> Option<NodeId> {
        self.bound.map(|(node, _, _)| node)
    }

    pub fn mode(&self) -> Option<ToolbarMode> {
        self.bound.map(|(_, mode, _)| mode)
    }

    pub fn position(&self) -> Option<ToolbarPosition> {
        self.bound.map(|(_, _, position)| position)
    }

    fn show(&mut self, node: NodeId, mode: ToolbarMode, position: ToolbarPosition) {
        self.bound = Some((node, mode, position));
    }

    fn hide(&mut self) {
        self.bound = None;
    }
}

/// Places the toolbar above `rect` (viewport-relative), or below it when there is no room above,
/// and clamps it horizontally into the viewport.
pub fn place_toolbar(rect: Rect, viewport: Viewport, geometry: &ToolbarGeometry) -> ToolbarPosition {
    let above = rect.top - geometry.height - geometry.gap;
    let (top, placement) = if above >= 0.0 {
        (above + viewport.scroll_y, Placement::Above)
    } else {
        (rect.bottom() + geometry.gap + viewport.scroll_y, Placement::Below)
    };

    let min_left = viewport.scroll_x + geometry.margin;
    let max_left = viewport.scroll_x + viewport.width - geometry.width - geometry.margin;
    let left = (rect.left + viewport.scroll_x).min(max_left).max(min_left);

    ToolbarPosition {
        top,
        left,
        placement,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ActiveSelection {
    pub(crate) node: NodeId,
    pub(crate) element_id: ElementId,
    pub(crate) edit_type: EditType,
    /// Whether typing in this activation already produced a history entry.
    pub(crate) typing_recorded: bool,
    /// Whether `contenteditable` was added on activation rather than written by the page.
    pub(crate) added_editable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Activated(NodeId),
    Deleted,
    Deactivated,
    Ignored,
}

impl EditorSession {
    pub fn active_node(&self) -> Option<NodeId> {
        self.active.as_ref().map(|active| active.node)
    }

    pub fn active_element_id(&self) -> Option<&ElementId> {
        self.active.as_ref().map(|active| &active.element_id)
    }

    /// Makes `node` the single active element. Returns false if it is not editable.
    pub fn activate(&mut self, node: NodeId) -> bool {
        if !self.doc.has_attr(node, ATTR_EDITABLE) || !self.doc.is_connected(node) {
            debug!(node = node.index(), "activation target is not editable");
            return false;
        }
        let Some(element_id) = self.element_id_of(node) else {
            return false;
        };
        self.deactivate();

        let edit_type = self.edit_type_of(node);
        self.doc.add_class(node, CLASS_ACTIVE);
        let added_editable =
            edit_type == EditType::Text && !self.doc.has_attr(node, "contenteditable");
        if added_editable {
            self.doc.set_attr(node, "contenteditable", "true");
        }
        self.doc.focus(node);

        let position = place_toolbar(
            self.doc.layout(node),
            self.doc.viewport(),
            &self.config.toolbar,
        );
        self.toolbar.show(node, edit_type.into(), position);

        let tag_name = self.doc.tag(node).unwrap_or_default().to_ascii_uppercase();
        let text = match edit_type {
            EditType::Text => rendered_text(&self.doc, node).trim().to_owned(),
            EditType::Image => self.doc.attr(node, "src").unwrap_or_default().to_owned(),
        };
        self.active = Some(ActiveSelection {
            node,
            element_id: element_id.clone(),
            edit_type,
            typing_recorded: false,
            added_editable,
        });
        debug!(element_id = %element_id, "activated");
        self.post(OutboundMessage::ElementSelected {
            element_id,
            tag_name,
            edit_type,
            text,
        });
        true
    }

    /// Clears the active element and hides the toolbar. No-op when nothing is active.
    pub fn deactivate(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.doc.remove_class(active.node, CLASS_ACTIVE);
        if active.added_editable {
            self.doc.remove_attr(active.node, "contenteditable");
        }
        if self.doc.focused() == Some(active.node) {
            self.doc.blur();
        }
        self.toolbar.hide();
        debug!(element_id = %active.element_id, "deactivated");
        self.post(OutboundMessage::ElementDeselected {
            element_id: active.element_id,
        });
    }

    /// Recomputes the toolbar position after layout or viewport changes.
    pub fn reposition_toolbar(&mut self) {
        let Some(active) = &self.active else {
            return;
        };
        let node = active.node;
        let mode = active.edit_type.into();
        let position = place_toolbar(
            self.doc.layout(node),
            self.doc.viewport(),
            &self.config.toolbar,
        );
        self.toolbar.show(node, mode, position);
    }

    /// Dispatches a click on `target`: delete affordances delete, editable elements (or their
    /// descendants) activate, anything else deactivates.
    pub fn click(&mut self, target: NodeId) -> ClickOutcome {
        if let Some(button) = self
            .doc
            .closest(target, |n| self.doc.attr(n, ATTR_EDITOR_UI) == Some("delete"))
        {
            let owner = self
                .doc
                .attr(button, ATTR_DELETE_FOR)
                .and_then(|id| ElementId::new(id).ok())
                .and_then(|id| self.element_node(&id));
            return match owner {
                Some(node) if self.delete_element(node) => ClickOutcome::Deleted,
                _ => ClickOutcome::Ignored,
            };
        }

        if let Some(node) = self
            .doc
            .closest(target, |n| self.doc.has_attr(n, ATTR_EDITABLE))
        {
            if self.activate(node) {
                return ClickOutcome::Activated(node);
            }
            return ClickOutcome::Ignored;
        }

        self.click_outside()
    }

    /// A click that hit neither an editable element nor the toolbar.
    pub fn click_outside(&mut self) -> ClickOutcome {
        if self.active.is_none() {
            return ClickOutcome::Ignored;
        }
        self.deactivate();
        ClickOutcome::Deactivated
    }

    /// Handles editor shortcuts. Returns true when the key was consumed.
    pub fn key_down(&mut self, key: &KeyInput) -> bool {
        if key.key == "Escape" {
            let was_active = self.active.is_some();
            self.deactivate();
            return was_active;
        }
        if !key.has_modifier() {
            return false;
        }
        match key.key.to_ascii_lowercase().as_str() {
            "z" if key.shift => self.redo(),
            "z" => self.undo(),
            "y" => self.redo(),
            "b" => self.execute(Command::Bold).is_applied(),
            "i" => self.execute(Command::Italic).is_applied(),
            "u" => self.execute(Command::Underline).is_applied(),
            _ => false,
        }
    }

    /// Typing inside the active text element. The first keystroke of an activation records a
    /// history entry holding the text as it was before typing started.
    pub fn input(&mut self, node: NodeId, text: &str) -> bool {
        let Some(active) = &self.active else {
            debug!("input without an active element");
            return false;
        };
        if active.node != node || active.edit_type != EditType::Text {
            debug!(node = node.index(), "input outside the active text element");
            return false;
        }
        if !active.typing_recorded {
            self.save_history_state("Edit text");
            if let Some(active) = self.active.as_mut() {
                active.typing_recorded = true;
            }
        }
        super::set_element_text(&mut self.doc, node, text);
        self.content_changed(node);
        true
    }

    /// Removes an editable element, records history first and notifies the backend when
    /// authenticated.
    pub fn delete_element(&mut self, node: NodeId) -> bool {
        let Some(element_id) = self.element_id_of(node) else {
            return false;
        };
        if !self.doc.has_attr(node, ATTR_EDITABLE) {
            return false;
        }
        let tag = self.doc.tag(node).unwrap_or_default().to_owned();
        self.save_history_state(&format!("Delete {tag}"));
        self.deactivate();

        if let Some(affordance) = find_delete_affordance(&self.doc, node) {
            self.doc.remove(affordance);
        }
        self.doc.remove(node);
        self.autosave.cancel(&element_id);

        if self.authenticated {
            if let Some(record) = self.records.get_mut(&element_id) {
                record.mark_remote_deleted();
            }
            self.effects.push_back(super::Effect::Delete {
                page_id: self.page_id.clone(),
                element_id: element_id.clone(),
            });
        }
        debug!(element_id = %element_id, "element deleted");
        self.post(OutboundMessage::ElementDeleted { element_id });
        true
    }
}
