// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The save/delete/load/auth endpoints the editor consumes.
//!
//! The editor session never talks to a backend directly: it emits effects, and the host runs
//! them against a [`PageEditBackend`]. Results come back as [`BackendError`]s that the session
//! logs and surfaces through its status indicator.

mod folder;
mod http;
mod memory;

use std::future::Future;

pub use folder::FolderBackend;
pub use http::HttpBackend;
pub use memory::MemoryBackend;

pub use crate::model::PageEdit;
use crate::model::{ElementId, PageId};
use crate::store::{StoreError, StoredEdit};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("not authenticated")]
    Unauthorized,
    #[error("backend answered with status {0}")]
    Status(u16),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub trait PageEditBackend: Send + Sync + 'static {
    /// Whether the current session may persist edits.
    fn is_authenticated(&self) -> impl Future<Output = Result<bool, BackendError>> + Send;

    fn save_edit(&self, edit: PageEdit) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn delete_edit(
        &self,
        page_id: PageId,
        element_id: ElementId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn load_edits(
        &self,
        page_id: PageId,
    ) -> impl Future<Output = Result<Vec<StoredEdit>, BackendError>> + Send;
}
