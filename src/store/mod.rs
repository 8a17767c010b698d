// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Persistence for page edits on disk.
//!
//! Each page keeps one JSON document (`<page-id>.edits.json`) holding the latest edit per element.
//! The folder backs both the HTTP endpoints and the stdio editor host.

pub mod page_edits;

pub use page_edits::{PageEditFolder, StoreError, StoredEdit, WriteDurability};
