// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The inline editor session.
//!
//! One [`EditorSession`] is injected per document and owns everything the editor tracks for it:
//! the active selection, the floating toolbar, the undo/redo history, per-element save state,
//! the save status indicator and the queue of effects (network calls, parent-frame messages)
//! the host still has to carry out.
//!
//! Every operation mutates the document synchronously. Errors are logged and swallowed at the
//! boundary of the operation that caused them.

pub mod activation;
pub mod autosave;
pub mod commands;
pub mod discovery;
pub mod history;


use std::collections::{HashMap, VecDeque};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::format::{insert_fragment, parse_fragment, serialize_children, MarkupError};
use crate::model::{
    Document, EditContent, EditType, ElementData, ElementId, NodeId, PageEdit, PageId, Selector,
    SelectorError,
};
use crate::protocol::{InboundMessage, OutboundMessage, SaveStatus};

pub use activation::{place_toolbar, ClickOutcome, Placement, Toolbar, ToolbarMode, ToolbarPosition};
pub use autosave::{ElementRecord, SaveRequest, SaveTicket, StatusIndicator};
pub use commands::{Command, CommandError, CommandOutcome, FontSize, HeadingLevel};
pub use discovery::DEFAULT_SELECTORS;
pub use history::{History, HistoryEntry, SnapshotFilter, UndoStep};

use activation::ActiveSelection;
use autosave::Autosave;

pub const ATTR_EDITABLE: &str = "data-editable";
pub const ATTR_ELEMENT_ID: &str = "data-element-id";
pub const ATTR_EDIT_TYPE: &str = "data-edit-type";
pub const ATTR_EDITOR_UI: &str = "data-editor-ui";
pub const ATTR_DELETE_FOR: &str = "data-delete-for";
pub const ATTR_MOUNTED: &str = "data-editor-mounted";
pub const CLASS_ACTIVE: &str = "editor-active";
pub const CLASS_DELETE_BUTTON: &str = "editor-delete-btn";

/// Work the host carries out on the session's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Save(SaveRequest),
    Delete {
        page_id: PageId,
        element_id: ElementId,
    },
    Post(OutboundMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyInput {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyInput {
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_ctrl(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: true,
            ..Self::default()
        }
    }

    pub fn shifted(mut self) -> Self {
        self.shift = true;
        self
    }

    fn has_modifier(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("an editor is already mounted on this document")]
    AlreadyMounted,
    #[error("invalid candidate selector: {0}")]
    Selector(#[from] SelectorError),
}

#[derive(Debug)]
pub struct EditorSession {
    doc: Document,
    page_id: PageId,
    config: EditorConfig,
    selectors: Vec<Selector>,
    authenticated: bool,
    active: Option<ActiveSelection>,
    toolbar: Toolbar,
    records: HashMap<ElementId, ElementRecord>,
    history: History,
    autosave: Autosave,
    status: StatusIndicator,
    effects: VecDeque<Effect>,
}

impl EditorSession {
    /// Mounts the editor on `doc`: marks editable elements and records the initial history state.
    ///
    /// A document that already carries the mount flag is refused.
    pub fn inject(
        mut doc: Document,
        page_id: PageId,
        config: EditorConfig,
        authenticated: bool,
    ) -> Result<Self, InjectError> {
        let root = doc.root();
        if doc.has_attr(root, ATTR_MOUNTED) {
            return Err(InjectError::AlreadyMounted);
        }
        let selectors = config
            .selectors
            .iter()
            .map(|s| Selector::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        doc.set_attr(root, ATTR_MOUNTED, "true");

        let mut session = Self {
            doc,
            page_id,
            history: History::new(config.history_cap),
            autosave: Autosave::new(config.debounce()),
            status: StatusIndicator::new(config.status_hide_delay()),
            config,
            selectors,
            authenticated,
            active: None,
            toolbar: Toolbar::default(),
            records: HashMap::new(),
            effects: VecDeque::new(),
        };

        let marked = session.discover();
        let initial = session.snapshot_markup();
        session.history.reset(initial, "Initial state");
        info!(
            page_id = %session.page_id,
            marked,
            authenticated,
            "editor injected"
        );
        Ok(session)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Direct document access for host plumbing (layout boxes, viewport, focus).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Updates the auth gate. Dropping to unauthenticated discards any pending saves.
    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
        if !authenticated {
            self.autosave.clear();
        }
    }

    pub fn toolbar(&self) -> &Toolbar {
        &self.toolbar
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn save_status(&self) -> Option<SaveStatus> {
        self.status.visible_status()
    }

    pub fn record(&self, element_id: &ElementId) -> Option<&ElementRecord> {
        self.records.get(element_id)
    }

    pub fn original_content(&self, element_id: &ElementId) -> Option<&EditContent> {
        self.records.get(element_id).map(ElementRecord::original)
    }

    pub fn element_node(&self, element_id: &ElementId) -> Option<NodeId> {
        let root = self.doc.root();
        self.doc
            .subtree(root)
            .into_iter()
            .find(|&node| {
                self.doc.has_attr(node, ATTR_EDITABLE)
                    && self.doc.attr(node, ATTR_ELEMENT_ID) == Some(element_id.as_str())
            })
    }

    pub fn element_id_of(&self, node: NodeId) -> Option<ElementId> {
        self.doc
            .attr(node, ATTR_ELEMENT_ID)
            .and_then(|id| ElementId::new(id).ok())
    }

    pub fn edit_type_of(&self, node: NodeId) -> EditType {
        match self.doc.attr(node, ATTR_EDIT_TYPE) {
            Some("image") => EditType::Image,
            Some(_) => EditType::Text,
            None => self.doc.tag(node).map(EditType::for_tag).unwrap_or(EditType::Text),
        }
    }

    pub fn editable_elements(&self) -> Vec<NodeId> {
        let root = self.doc.root();
        self.doc
            .subtree(root)
            .into_iter()
            .filter(|&node| self.doc.has_attr(node, ATTR_EDITABLE))
            .collect()
    }

    /// Current content of an editable element in its persisted shape.
    pub fn capture_content(&self, node: NodeId) -> EditContent {
        match self.edit_type_of(node) {
            EditType::Image => {
                EditContent::image(self.doc.attr(node, "src").unwrap_or_default().to_owned())
            }
            EditType::Text => EditContent::text(rendered_text(&self.doc, node).trim().to_owned()),
        }
    }

    /// Runs discovery over the whole document. Safe to call repeatedly.
    pub fn discover(&mut self) -> usize {
        let root = self.doc.root();
        self.discover_within(root)
    }

    /// Runs discovery over `scope` and registers newly marked elements.
    pub fn discover_within(&mut self, scope: NodeId) -> usize {
        let found = discovery::discover(&mut self.doc, scope, &self.selectors);
        for item in &found {
            if !self.records.contains_key(&item.element_id) {
                let original = self.capture_content(item.node);
                self.records
                    .insert(item.element_id.clone(), ElementRecord::new(original));
            }
        }
        debug!(marked = found.len(), "discovery pass");
        found.len()
    }

    /// Inserts markup under `parent` (before `before`, or at the end) and runs discovery on the
    /// inserted subtrees, the way a mutation observer would.
    pub fn insert_markup(
        &mut self,
        parent: NodeId,
        before: Option<NodeId>,
        markup: &str,
    ) -> Result<Vec<NodeId>, MarkupError> {
        let nodes = parse_fragment(markup)?;
        let inserted = insert_fragment(&mut self.doc, parent, before, &nodes);
        for &node in &inserted {
            self.discover_within(node);
        }
        Ok(inserted)
    }

    /// Applies edits loaded from the backend and re-bases history on the result.
    pub fn apply_persisted_edits(
        &mut self,
        edits: impl IntoIterator<Item = (ElementId, EditContent)>,
    ) -> usize {
        let mut applied = 0;
        for (element_id, content) in edits {
            let Some(node) = self.element_node(&element_id) else {
                debug!(element_id = %element_id, "stored edit has no matching element");
                continue;
            };
            match (&content, self.edit_type_of(node)) {
                (EditContent::Text { text }, EditType::Text) => {
                    set_element_text(&mut self.doc, node, text);
                }
                (EditContent::Image { src }, EditType::Image) => {
                    self.doc.set_attr(node, "src", src.clone());
                }
                _ => {
                    warn!(element_id = %element_id, "stored edit type does not match element");
                    continue;
                }
            }
            self.records
                .insert(element_id, ElementRecord::new(content));
            applied += 1;
        }

        if applied > 0 {
            self.deactivate();
            let snapshot = self.snapshot_markup();
            self.history.reset(snapshot, "Loaded edits");
            self.post_history_changed();
        }
        info!(page_id = %self.page_id, applied, "applied stored edits");
        applied
    }

    /// Handles a cross-frame message. Malformed messages are logged and ignored.
    pub fn handle_message(&mut self, data: &serde_json::Value) -> bool {
        let message = match InboundMessage::from_value(data) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "ignoring bridge message");
                return false;
            }
        };

        match message {
            InboundMessage::Undo => self.undo(),
            InboundMessage::Redo => self.redo(),
            InboundMessage::EditorCmd { cmd, value } => {
                let value = value.map(|v| v.into_string());
                match Command::parse(&cmd, value.as_deref()) {
                    Ok(command) => self.execute(command).is_applied(),
                    Err(err) => {
                        warn!(cmd = %cmd, error = %err, "rejected bridge command");
                        false
                    }
                }
            }
            InboundMessage::ContentChange { element_id, text } => {
                self.apply_content_change(&element_id, &text)
            }
        }
    }

    /// Replaces an element's text from outside the element (e.g. an AI-assist answer).
    pub fn apply_content_change(&mut self, element_id: &ElementId, text: &str) -> bool {
        let Some(node) = self.element_node(element_id) else {
            warn!(element_id = %element_id, "content change for unknown element");
            return false;
        };
        if self.edit_type_of(node) != EditType::Text {
            warn!(element_id = %element_id, "content change targets an image");
            return false;
        }
        self.save_history_state("AI content change");
        set_element_text(&mut self.doc, node, text);
        self.content_changed(node);
        true
    }

    /// Bookkeeping after any content mutation of an editable element.
    fn content_changed(&mut self, node: NodeId) {
        let Some(element_id) = self.element_id_of(node) else {
            return;
        };
        self.note_edit(&element_id);
        let content = self.capture_content(node);
        self.post(OutboundMessage::EditorChange {
            element_id,
            content,
            timestamp: unix_millis(),
        });
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        self.effects.drain(..).collect()
    }

    pub fn pending_effects(&self) -> usize {
        self.effects.len()
    }

    fn post(&mut self, message: OutboundMessage) {
        self.effects.push_back(Effect::Post(message));
    }

    /// Clean markup of the document body, as stored in history snapshots.
    pub fn snapshot_markup(&self) -> String {
        let filter = SnapshotFilter {
            strip_active_editable: self.active.as_ref().is_some_and(|a| a.added_editable),
        };
        serialize_children(&self.doc, self.doc.root(), &filter)
    }

    fn build_page_edit(&self, element_id: &ElementId, edited: EditContent) -> Option<PageEdit> {
        let record = self.records.get(element_id)?;
        Some(PageEdit {
            page_id: self.page_id.clone(),
            element_id: element_id.clone(),
            edit_type: record.edit_type(),
            original_content: record.original().clone(),
            edited_content: edited,
        })
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub(crate) fn is_editor_ui(element: &ElementData) -> bool {
    element.has_attr(ATTR_EDITOR_UI)
}

/// Text a user sees in `node`, without editor affordances.
pub fn rendered_text(doc: &Document, node: NodeId) -> String {
    doc.text_content_where(node, |element| !is_editor_ui(element))
}

/// Replaces the content of `node` with `text`, keeping editor affordances attached.
pub(crate) fn set_element_text(doc: &mut Document, node: NodeId, text: &str) {
    let ui_children = doc
        .children(node)
        .iter()
        .copied()
        .filter(|&child| doc.element(child).is_some_and(is_editor_ui))
        .collect::<Vec<_>>();
    for &child in &ui_children {
        doc.detach(child);
    }
    doc.clear_children(node);
    let text_node = doc.create_text(text);
    doc.append_child(node, text_node);
    for child in ui_children {
        doc.append_child(node, child);
    }
}

/// Content children of `node`, i.e. everything except editor affordances.
pub(crate) fn content_children(doc: &Document, node: NodeId) -> Vec<NodeId> {
    doc.children(node)
        .iter()
        .copied()
        .filter(|&child| !doc.element(child).is_some_and(is_editor_ui))
        .collect()
}

/// Inserts `child` as the last content child of `node` (ahead of any affordance).
pub(crate) fn append_content_child(doc: &mut Document, node: NodeId, child: NodeId) {
    let first_ui = doc
        .children(node)
        .iter()
        .copied()
        .find(|&c| doc.element(c).is_some_and(is_editor_ui));
    match first_ui {
        Some(reference) => {
            doc.insert_before(node, child, reference);
        }
        None => {
            doc.append_child(node, child);
        }
    }
}

pub(crate) fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
