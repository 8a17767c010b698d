// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Debounced per-element autosave.
//!
//! Every content change bumps the element's edit sequence and (when authenticated) re-arms its
//! debounce timer. When a timer fires the session emits a [`SaveRequest`] carrying the sequence it
//! was built from; completions older than the last acknowledged sequence are ignored, so the most
//! recent edit always wins regardless of the order responses arrive in. A failure only counts
//! while no newer save of the same element was dispatched or acknowledged, and `saved` is shown
//! once no timer is armed and no save is in flight.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::BackendError;
use crate::model::{EditContent, EditType, ElementId, PageEdit};
use crate::protocol::{OutboundMessage, SaveStatus};

use super::{Effect, EditorSession};

pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
pub const DEFAULT_STATUS_HIDE_MS: u64 = 3_000;

/// What the session knows about one editable element across its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRecord {
    original: EditContent,
    edit_seq: u64,
    acked_seq: u64,
    remote_deleted: bool,
}

impl ElementRecord {
    pub fn new(original: EditContent) -> Self {
        Self {
            original,
            edit_seq: 0,
            acked_seq: 0,
            remote_deleted: false,
        }
    }

    /// Content as last acknowledged by the backend (or as first seen).
    pub fn original(&self) -> &EditContent {
        &self.original
    }

    pub fn edit_type(&self) -> EditType {
        self.original.edit_type()
    }

    pub fn edit_seq(&self) -> u64 {
        self.edit_seq
    }

    pub fn acked_seq(&self) -> u64 {
        self.acked_seq
    }

    pub fn is_dirty(&self) -> bool {
        self.edit_seq > self.acked_seq
    }

    pub(crate) fn mark_remote_deleted(&mut self) {
        self.remote_deleted = true;
    }

    pub(crate) fn take_remote_deleted(&mut self) -> bool {
        std::mem::take(&mut self.remote_deleted)
    }
}

/// Identifies which edit a save was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    pub element_id: ElementId,
    pub seq: u64,
    pub edited: EditContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub ticket: SaveTicket,
    pub edit: PageEdit,
}

/// Pending debounce deadlines keyed by element, plus the saves already handed to the host.
#[derive(Debug, Clone)]
pub(crate) struct Autosave {
    quiet_period: Duration,
    pending: HashMap<ElementId, Instant>,
    in_flight: usize,
    latest_dispatched: HashMap<ElementId, u64>,
    failed: HashSet<ElementId>,
}

impl Autosave {
    pub(crate) fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: HashMap::new(),
            in_flight: 0,
            latest_dispatched: HashMap::new(),
            failed: HashSet::new(),
        }
    }

    pub(crate) fn dispatched(&mut self, element_id: &ElementId, seq: u64) {
        self.in_flight += 1;
        self.latest_dispatched.insert(element_id.clone(), seq);
        self.failed.remove(element_id);
    }

    pub(crate) fn settled(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// True when a save newer than `seq` was dispatched for the element.
    pub(crate) fn is_superseded(&self, element_id: &ElementId, seq: u64) -> bool {
        self.latest_dispatched
            .get(element_id)
            .is_some_and(|latest| *latest > seq)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }

    pub(crate) fn schedule(&mut self, element_id: &ElementId, now: Instant) {
        self.pending
            .insert(element_id.clone(), now + self.quiet_period);
    }

    pub(crate) fn cancel(&mut self, element_id: &ElementId) -> bool {
        self.pending.remove(element_id).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<ElementId> {
        let mut due = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (*deadline, id.clone()))
            .collect::<Vec<_>>();
        due.sort();
        for (_, id) in &due {
            self.pending.remove(id);
        }
        due.into_iter().map(|(_, id)| id).collect()
    }

    pub(crate) fn take_all(&mut self) -> Vec<ElementId> {
        let mut all = self.pending.drain().map(|(id, _)| id).collect::<Vec<_>>();
        all.sort();
        all
    }

    pub(crate) fn is_pending(&self, element_id: &ElementId) -> bool {
        self.pending.contains_key(element_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

}

/// Transient save indicator: shown while saving, hidden a while after it settles.
#[derive(Debug, Clone)]
pub struct StatusIndicator {
    status: SaveStatus,
    hide_after: Duration,
    hide_at: Option<Instant>,
    visible: bool,
}

impl StatusIndicator {
    pub fn new(hide_after: Duration) -> Self {
        Self {
            status: SaveStatus::Idle,
            hide_after,
            hide_at: None,
            visible: false,
        }
    }

    pub fn show(&mut self, status: SaveStatus, now: Instant) {
        self.status = status;
        self.visible = true;
        self.hide_at = match status {
            SaveStatus::Saving => None,
            _ => Some(now + self.hide_after),
        };
    }

    /// Hides the indicator once its deadline passed. Returns true when it was hidden.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.hide_at {
            Some(deadline) if deadline <= now => {
                self.hide_at = None;
                self.visible = false;
                self.status = SaveStatus::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn visible_status(&self) -> Option<SaveStatus> {
        self.visible.then_some(self.status)
    }

    pub fn hide_at(&self) -> Option<Instant> {
        self.hide_at
    }
}

impl EditorSession {
    /// Registers a content change of `element_id` for autosave.
    pub(crate) fn note_edit(&mut self, element_id: &ElementId) {
        let Some(record) = self.records.get_mut(element_id) else {
            debug!(element_id = %element_id, "edit on unregistered element");
            return;
        };
        record.edit_seq += 1;
        if !self.authenticated {
            debug!(element_id = %element_id, "not authenticated; autosave skipped");
            return;
        }
        let now = self.now();
        self.autosave.schedule(element_id, now);
        self.set_status(SaveStatus::Saving, now);
    }

    pub fn has_pending_save(&self, element_id: &ElementId) -> bool {
        self.autosave.is_pending(element_id)
    }

    pub fn pending_save_count(&self) -> usize {
        self.autosave.len()
    }

    /// Saves emitted but not yet completed.
    pub fn saves_in_flight(&self) -> usize {
        self.autosave.in_flight()
    }

    /// The earliest instant [`EditorSession::poll_timers`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.autosave.next_deadline(), self.status.hide_at()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fires every debounce timer and indicator deadline that is due at `now`.
    pub fn poll_timers(&mut self, now: Instant) {
        for element_id in self.autosave.take_due(now) {
            self.dispatch_save(&element_id);
        }
        if self.status.tick(now) {
            debug!("save indicator hidden");
        }
    }

    /// Emits saves for every pending element immediately.
    pub fn flush_pending_saves(&mut self) -> usize {
        let pending = self.autosave.take_all();
        let count = pending.len();
        for element_id in pending {
            self.dispatch_save(&element_id);
        }
        count
    }

    fn dispatch_save(&mut self, element_id: &ElementId) {
        let Some(node) = self.element_node(element_id) else {
            debug!(element_id = %element_id, "element gone before save fired");
            return;
        };
        let edited = self.capture_content(node);
        let Some(edit) = self.build_page_edit(element_id, edited.clone()) else {
            return;
        };
        let seq = self
            .records
            .get(element_id)
            .map(ElementRecord::edit_seq)
            .unwrap_or_default();
        debug!(element_id = %element_id, seq, "dispatching save");
        self.autosave.dispatched(element_id, seq);
        self.effects.push_back(Effect::Save(SaveRequest {
            ticket: SaveTicket {
                element_id: element_id.clone(),
                seq,
                edited,
            },
            edit,
        }));
    }

    /// Applies the outcome of a save the host carried out.
    pub fn complete_save(&mut self, ticket: SaveTicket, result: Result<(), BackendError>) {
        let now = self.now();
        self.autosave.settled();
        let acked = self
            .records
            .get(&ticket.element_id)
            .map(ElementRecord::acked_seq);
        match (result, acked) {
            (_, None) => {
                debug!(element_id = %ticket.element_id, "save completed for unknown element");
            }
            (Ok(()), Some(acked)) if ticket.seq <= acked => {
                debug!(
                    element_id = %ticket.element_id,
                    seq = ticket.seq,
                    acked,
                    "stale save completion ignored"
                );
            }
            (Ok(()), Some(_)) => {
                if let Some(record) = self.records.get_mut(&ticket.element_id) {
                    record.acked_seq = ticket.seq;
                    record.original = ticket.edited;
                }
                self.autosave.failed.remove(&ticket.element_id);
                info!(element_id = %ticket.element_id, seq = ticket.seq, "edit saved");
            }
            (Err(err), Some(acked))
                if ticket.seq <= acked
                    || self.autosave.is_superseded(&ticket.element_id, ticket.seq) =>
            {
                debug!(
                    element_id = %ticket.element_id,
                    seq = ticket.seq,
                    error = %err,
                    "superseded save failure ignored"
                );
            }
            (Err(err), Some(_)) => {
                warn!(
                    element_id = %ticket.element_id,
                    seq = ticket.seq,
                    error = %err,
                    "save failed"
                );
                self.autosave.failed.insert(ticket.element_id.clone());
                self.set_status(SaveStatus::Error, now);
            }
        }

        if self.autosave.is_idle() && self.status.visible_status() == Some(SaveStatus::Saving) {
            let settled = if self.autosave.failed.is_empty() {
                SaveStatus::Saved
            } else {
                SaveStatus::Error
            };
            self.set_status(settled, now);
        }
    }

    fn set_status(&mut self, status: SaveStatus, now: Instant) {
        let changed = self.status.visible_status() != Some(status);
        self.status.show(status, now);
        if changed {
            self.effects
                .push_back(Effect::Post(OutboundMessage::SaveStatus { status }));
        }
    }
}
