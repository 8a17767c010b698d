// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Snapshot undo/redo.
//!
//! History stores clean markup of the document body. The entry under the cursor is the state the
//! document was in when it was last recorded; edits made after a record leave an "unrecorded tip"
//! that is captured lazily on the next undo so redo can return to it.

use std::collections::VecDeque;

use tracing::{debug, error};

use crate::format::{insert_fragment, parse_fragment, MarkupFilter};
use crate::model::ElementData;
use crate::protocol::OutboundMessage;

use super::{
    unix_millis, EditorSession, ATTR_EDITABLE, ATTR_EDIT_TYPE, ATTR_EDITOR_UI, ATTR_MOUNTED,
    CLASS_ACTIVE,
};

pub const DEFAULT_HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    markup: String,
    description: String,
    recorded_at: u64,
}

impl HistoryEntry {
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Unix milliseconds.
    pub fn recorded_at(&self) -> u64 {
        self.recorded_at
    }
}

#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    cap: usize,
    tip_unrecorded: bool,
}

impl History {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            cap: cap.max(2),
            tip_unrecorded: false,
        }
    }

    /// Drops every entry and starts over from `markup`.
    pub fn reset(&mut self, markup: String, description: &str) {
        self.entries.clear();
        self.entries.push_back(entry(markup, description));
        self.cursor = 0;
        self.tip_unrecorded = false;
    }

    /// Records the state a mutation is about to leave. Any redo tail is discarded.
    pub fn record(&mut self, markup: String, description: &str) {
        self.entries.truncate(self.cursor + 1);
        let duplicate = self
            .entries
            .get(self.cursor)
            .is_some_and(|current| current.markup == markup);
        if !duplicate {
            self.entries.push_back(entry(markup, description));
            self.cursor = self.entries.len() - 1;
            self.evict();
        }
        self.tip_unrecorded = true;
    }

    /// Resolves the entry an undo should restore. When `live` diverged from an unrecorded tip the
    /// step carries it, so redo can return there once the undo is committed.
    pub fn prepare_undo(&self, live: String) -> Option<UndoStep> {
        let diverged = self.tip_unrecorded
            && self
                .entries
                .get(self.cursor)
                .is_some_and(|current| current.markup != live);
        if diverged {
            return Some(UndoStep {
                target: self.cursor,
                tip: Some(live),
            });
        }
        self.cursor.checked_sub(1).map(|target| UndoStep { target, tip: None })
    }

    /// Moves the cursor onto a prepared undo target, recording its tip first.
    pub fn commit_undo(&mut self, step: UndoStep) {
        self.tip_unrecorded = false;
        match step.tip {
            Some(live) => {
                self.entries.truncate(self.cursor + 1);
                self.entries.push_back(entry(live, "Current state"));
                self.evict();
                self.cursor = self.entries.len() - 2;
            }
            None => self.commit_cursor(step.target),
        }
    }

    /// Forgets an unrecorded tip that matches the entry under the cursor.
    pub fn settle_tip(&mut self) {
        self.tip_unrecorded = false;
    }

    pub fn prepare_redo(&self) -> Option<usize> {
        if self.tip_unrecorded {
            return None;
        }
        let next = self.cursor + 1;
        (next < self.entries.len()).then_some(next)
    }

    pub fn commit_cursor(&mut self, index: usize) {
        if index < self.entries.len() {
            self.cursor = index;
        }
    }

    fn evict(&mut self) {
        while self.entries.len() > self.cap {
            self.entries.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    pub fn entry(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0 || self.tip_unrecorded
    }

    pub fn can_redo(&self) -> bool {
        self.prepare_redo().is_some()
    }
}

/// An undo resolved against the current history but not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoStep {
    target: usize,
    tip: Option<String>,
}

impl UndoStep {
    /// Index of the entry to restore, valid until the step is committed.
    pub fn target(&self) -> usize {
        self.target
    }
}

#[cfg(test)]
impl History {
    pub(crate) fn from_entries(cap: usize, markups: &[&str], cursor: usize) -> Self {
        let mut history = Self::new(cap);
        history.entries = markups
            .iter()
            .map(|markup| entry((*markup).to_owned(), "planted"))
            .collect();
        history.cursor = cursor;
        history
    }
}

fn entry(markup: String, description: &str) -> HistoryEntry {
    HistoryEntry {
        markup,
        description: description.to_owned(),
        recorded_at: unix_millis(),
    }
}

/// Strips transient editor state: affordances, markers, the active highlight.
///
/// Element ids survive so restored elements keep their identity. A `contenteditable` the page
/// wrote itself is kept; only the one added to the active element is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotFilter {
    pub strip_active_editable: bool,
}

impl MarkupFilter for SnapshotFilter {
    fn skip_element(&self, element: &ElementData) -> bool {
        element.has_attr(ATTR_EDITOR_UI)
    }

    fn keep_attr(&self, element: &ElementData, name: &str) -> bool {
        match name {
            ATTR_EDITABLE | ATTR_EDIT_TYPE | ATTR_MOUNTED => false,
            "contenteditable" => {
                !(self.strip_active_editable && element.has_class(CLASS_ACTIVE))
            }
            _ => true,
        }
    }

    fn keep_class(&self, class: &str) -> bool {
        class != CLASS_ACTIVE
    }
}

impl EditorSession {
    /// Records the current document as the state before an upcoming mutation.
    pub fn save_history_state(&mut self, description: &str) {
        let snapshot = self.snapshot_markup();
        self.history.record(snapshot, description);
        debug!(description, entries = self.history.len(), "history recorded");
        self.post_history_changed();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Steps back one entry. A snapshot that fails to restore leaves document and history as
    /// they were.
    pub fn undo(&mut self) -> bool {
        let live = self.snapshot_markup();
        let Some(step) = self.history.prepare_undo(live) else {
            self.history.settle_tip();
            debug!("nothing to undo");
            return false;
        };
        if !self.restore(step.target()) {
            return false;
        }
        self.history.commit_undo(step);
        self.post_history_changed();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(target) = self.history.prepare_redo() else {
            debug!("nothing to redo");
            return false;
        };
        if !self.restore(target) {
            return false;
        }
        self.history.commit_cursor(target);
        self.post_history_changed();
        true
    }

    /// Rebuilds the body from a history entry. A snapshot that fails to parse leaves the
    /// document untouched.
    fn restore(&mut self, index: usize) -> bool {
        let Some(snapshot) = self.history.entry(index) else {
            return false;
        };
        let nodes = match parse_fragment(snapshot.markup()) {
            Ok(nodes) => nodes,
            Err(err) => {
                error!(index, error = %err, "history snapshot is malformed");
                return false;
            }
        };

        self.deactivate();
        let root = self.doc.root();
        self.doc.clear_children(root);
        insert_fragment(&mut self.doc, root, None, &nodes);
        self.discover();
        self.resync_after_restore();
        true
    }

    /// Queues saves for restored elements whose content no longer matches what was persisted.
    fn resync_after_restore(&mut self) {
        let mut stale = Vec::new();
        for node in self.editable_elements() {
            let Some(element_id) = self.element_id_of(node) else {
                continue;
            };
            let current = self.capture_content(node);
            let Some(record) = self.records.get_mut(&element_id) else {
                continue;
            };
            let resurrected = record.take_remote_deleted();
            if resurrected || record.original() != &current {
                stale.push(element_id);
            }
        }
        for element_id in stale {
            self.note_edit(&element_id);
        }
    }

    pub(crate) fn post_history_changed(&mut self) {
        let message = OutboundMessage::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        };
        self.post(message);
    }
}
