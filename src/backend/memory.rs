// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{BackendError, PageEdit, PageEditBackend};
use crate::model::{ElementId, PageId};
use crate::store::StoredEdit;

#[derive(Debug, Default)]
struct MemoryState {
    authenticated: bool,
    auth_unavailable: bool,
    failing_saves: usize,
    save_delays: VecDeque<Duration>,
    saves: Vec<PageEdit>,
    deletes: Vec<(PageId, ElementId)>,
    stored: BTreeMap<PageId, BTreeMap<ElementId, StoredEdit>>,
    clock_ms: u64,
}

/// An in-process backend that records every call. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new(authenticated: bool) -> Self {
        let backend = Self::default();
        backend.with_state(|state| state.authenticated = authenticated);
        backend
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.with_state(|state| state.authenticated = authenticated);
    }

    /// Makes the auth check itself fail, as an unreachable endpoint would.
    pub fn set_auth_unavailable(&self, unavailable: bool) {
        self.with_state(|state| state.auth_unavailable = unavailable);
    }

    /// The next `count` saves answer with status 500.
    pub fn fail_next_saves(&self, count: usize) {
        self.with_state(|state| state.failing_saves = count);
    }

    /// Delays applied to upcoming saves, in order.
    pub fn delay_saves(&self, delays: impl IntoIterator<Item = Duration>) {
        self.with_state(|state| state.save_delays.extend(delays));
    }

    pub fn seed(&self, page_id: &PageId, edit: StoredEdit) {
        self.with_state(|state| {
            state
                .stored
                .entry(page_id.clone())
                .or_default()
                .insert(edit.element_id.clone(), edit);
        });
    }

    /// Every save that reached the backend, successful or not, in arrival order.
    pub fn saves(&self) -> Vec<PageEdit> {
        self.with_state(|state| state.saves.clone())
    }

    pub fn deletes(&self) -> Vec<(PageId, ElementId)> {
        self.with_state(|state| state.deletes.clone())
    }

    pub fn stored(&self, page_id: &PageId) -> BTreeMap<ElementId, StoredEdit> {
        self.with_state(|state| state.stored.get(page_id).cloned().unwrap_or_default())
    }
}

impl PageEditBackend for MemoryBackend {
    fn is_authenticated(&self) -> impl Future<Output = Result<bool, BackendError>> + Send {
        let result = self.with_state(|state| {
            if state.auth_unavailable {
                Err(BackendError::Transport("auth endpoint unreachable".into()))
            } else {
                Ok(state.authenticated)
            }
        });
        async move { result }
    }

    fn save_edit(&self, edit: PageEdit) -> impl Future<Output = Result<(), BackendError>> + Send {
        let backend = self.clone();
        async move {
            let delay = backend.with_state(|state| state.save_delays.pop_front());
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            backend.with_state(|state| {
                if !state.authenticated {
                    return Err(BackendError::Unauthorized);
                }
                state.saves.push(edit.clone());
                if state.failing_saves > 0 {
                    state.failing_saves -= 1;
                    return Err(BackendError::Status(500));
                }
                state.clock_ms += 1;
                let stored = StoredEdit {
                    element_id: edit.element_id.clone(),
                    edit_type: edit.edit_type,
                    original_content: edit.original_content,
                    edited_content: edit.edited_content,
                    last_modified: state.clock_ms,
                };
                state
                    .stored
                    .entry(edit.page_id)
                    .or_default()
                    .insert(edit.element_id, stored);
                Ok(())
            })
        }
    }

    fn delete_edit(
        &self,
        page_id: PageId,
        element_id: ElementId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        let result = self.with_state(|state| {
            if !state.authenticated {
                return Err(BackendError::Unauthorized);
            }
            if let Some(page) = state.stored.get_mut(&page_id) {
                page.remove(&element_id);
            }
            state.deletes.push((page_id, element_id));
            Ok(())
        });
        async move { result }
    }

    fn load_edits(
        &self,
        page_id: PageId,
    ) -> impl Future<Output = Result<Vec<StoredEdit>, BackendError>> + Send {
        let result = self.with_state(|state| {
            if !state.authenticated {
                return Err(BackendError::Unauthorized);
            }
            Ok(state
                .stored
                .get(&page_id)
                .map(|page| page.values().cloned().collect())
                .unwrap_or_default())
        });
        async move { result }
    }
}
