// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{EditContent, EditType, ElementId, PageEdit, PageId};

mod helpers;

use helpers::{encode_persisted_id_segment, write_atomic};

const PAGE_EDITS_SUFFIX: &str = ".edits.json";

#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    PageMismatch {
        path: PathBuf,
        expected: PageId,
        found: PageId,
    },
    InconsistentEdit {
        element_id: ElementId,
    },
    SymlinkRefused {
        path: PathBuf,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error at {path:?}: {source}"),
            Self::Json { path, source } => write!(f, "json error at {path:?}: {source}"),
            Self::PageMismatch {
                path,
                expected,
                found,
            } => write!(
                f,
                "page edits file {path:?} belongs to page {found}, expected {expected}"
            ),
            Self::InconsistentEdit { element_id } => write!(
                f,
                "edit for {element_id} carries content that does not match its edit type"
            ),
            Self::SymlinkRefused { path } => {
                write!(f, "refusing to write through symlink at {path:?}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::PageMismatch { .. } => None,
            Self::InconsistentEdit { .. } => None,
            Self::SymlinkRefused { .. } => None,
        }
    }
}

/// The persisted form of one element's latest edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEdit {
    pub element_id: ElementId,
    pub edit_type: EditType,
    pub original_content: EditContent,
    pub edited_content: EditContent,
    /// Unix milliseconds of the last save.
    pub last_modified: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageEditsFile {
    page_id: PageId,
    #[serde(default)]
    edits: BTreeMap<ElementId, StoredEdit>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WriteDurability {
    /// Temp file plus atomic rename, no fsync.
    #[default]
    BestEffort,

    /// Also flushes file contents and the rename to stable storage where the platform allows.
    Durable,
}

/// A directory of per-page edit documents.
///
/// Clones share one lock, so read-modify-write cycles from concurrent requests do not interleave.
#[derive(Debug, Clone)]
pub struct PageEditFolder {
    root: PathBuf,
    durability: WriteDurability,
    lock: Arc<Mutex<()>>,
}

impl PageEditFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            durability: WriteDurability::default(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn durability(&self) -> WriteDurability {
        self.durability
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn page_path(&self, page_id: &PageId) -> PathBuf {
        self.root.join(format!(
            "{}{PAGE_EDITS_SUFFIX}",
            encode_persisted_id_segment(page_id.as_str())
        ))
    }

    /// Stored edits for `page_id`; a page that was never saved has none.
    pub fn load_page(&self, page_id: &PageId) -> Result<BTreeMap<ElementId, StoredEdit>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_page(page_id)
    }

    /// Upserts the edit for its element. The first recorded original content is kept so the
    /// store always knows what the template shipped with.
    pub fn save_edit(&self, edit: &PageEdit, now_ms: u64) -> Result<StoredEdit, StoreError> {
        if !edit.is_consistent() {
            return Err(StoreError::InconsistentEdit {
                element_id: edit.element_id.clone(),
            });
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut edits = self.read_page(&edit.page_id)?;
        let original_content = edits
            .get(&edit.element_id)
            .filter(|existing| existing.edit_type == edit.edit_type)
            .map(|existing| existing.original_content.clone())
            .unwrap_or_else(|| edit.original_content.clone());
        let stored = StoredEdit {
            element_id: edit.element_id.clone(),
            edit_type: edit.edit_type,
            original_content,
            edited_content: edit.edited_content.clone(),
            last_modified: now_ms,
        };
        edits.insert(edit.element_id.clone(), stored.clone());
        self.write_page(&edit.page_id, edits)?;
        debug!(page_id = %edit.page_id, element_id = %edit.element_id, "stored page edit");
        Ok(stored)
    }

    /// Removes the edit for `element_id`. Returns whether one existed.
    pub fn delete_edit(&self, page_id: &PageId, element_id: &ElementId) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut edits = self.read_page(page_id)?;
        if edits.remove(element_id).is_none() {
            return Ok(false);
        }
        if edits.is_empty() {
            let path = self.page_path(page_id);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(source) if source.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(StoreError::Io { path, source }),
            }
        } else {
            self.write_page(page_id, edits)?;
        }
        debug!(page_id = %page_id, element_id = %element_id, "deleted page edit");
        Ok(true)
    }

    /// Pages with at least one stored edit, sorted.
    pub fn list_pages(&self) -> Result<Vec<PageId>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut pages = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            let is_page_file = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(PAGE_EDITS_SUFFIX) && !name.starts_with('.'));
            if !is_page_file {
                continue;
            }
            pages.push(read_page_file(&path)?.page_id);
        }
        pages.sort();
        Ok(pages)
    }

    fn read_page(&self, page_id: &PageId) -> Result<BTreeMap<ElementId, StoredEdit>, StoreError> {
        let path = self.page_path(page_id);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let file = read_page_file(&path)?;
        if &file.page_id != page_id {
            return Err(StoreError::PageMismatch {
                path,
                expected: page_id.clone(),
                found: file.page_id,
            });
        }
        Ok(file.edits)
    }

    fn write_page(
        &self,
        page_id: &PageId,
        edits: BTreeMap<ElementId, StoredEdit>,
    ) -> Result<(), StoreError> {
        let path = self.page_path(page_id);
        let file = PageEditsFile {
            page_id: page_id.clone(),
            edits,
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(
            &self.root,
            &path,
            format!("{json}\n").as_bytes(),
            self.durability,
        )
    }
}

fn read_page_file(path: &Path) -> Result<PageEditsFile, StoreError> {
    let raw = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}
