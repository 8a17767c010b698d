// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::future::Future;

use tokio::task;

use super::{BackendError, PageEdit, PageEditBackend};
use crate::editor::unix_millis;
use crate::model::{ElementId, PageId};
use crate::store::{PageEditFolder, StoredEdit};

/// Persists straight into a [`PageEditFolder`], off the async threads.
#[derive(Debug, Clone)]
pub struct FolderBackend {
    folder: PageEditFolder,
    authenticated: bool,
}

impl FolderBackend {
    pub fn new(folder: PageEditFolder) -> Self {
        Self {
            folder,
            authenticated: true,
        }
    }

    /// An anonymous backend: auth checks say no and writes are refused.
    pub fn anonymous(folder: PageEditFolder) -> Self {
        Self {
            folder,
            authenticated: false,
        }
    }

    pub fn folder(&self) -> &PageEditFolder {
        &self.folder
    }

    async fn blocking<T, F>(&self, job: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(PageEditFolder) -> Result<T, BackendError> + Send + 'static,
    {
        if !self.authenticated {
            return Err(BackendError::Unauthorized);
        }
        let folder = self.folder.clone();
        task::spawn_blocking(move || job(folder))
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?
    }
}

impl PageEditBackend for FolderBackend {
    fn is_authenticated(&self) -> impl Future<Output = Result<bool, BackendError>> + Send {
        let authenticated = self.authenticated;
        async move { Ok(authenticated) }
    }

    fn save_edit(&self, edit: PageEdit) -> impl Future<Output = Result<(), BackendError>> + Send {
        self.blocking(move |folder| {
            folder.save_edit(&edit, unix_millis())?;
            Ok(())
        })
    }

    fn delete_edit(
        &self,
        page_id: PageId,
        element_id: ElementId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        self.blocking(move |folder| {
            folder.delete_edit(&page_id, &element_id)?;
            Ok(())
        })
    }

    fn load_edits(
        &self,
        page_id: PageId,
    ) -> impl Future<Output = Result<Vec<StoredEdit>, BackendError>> + Send {
        self.blocking(move |folder| Ok(folder.load_page(&page_id)?.into_values().collect()))
    }
}
