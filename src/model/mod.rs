// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core data model.
//!
//! A headless document tree plus the small value types the editor and its wire formats share.

pub mod content;
pub mod dom;
pub mod ids;
pub mod selector;

pub use content::{EditContent, EditType, PageEdit};
pub use dom::{Document, ElementData, NodeData, NodeId, Rect, Viewport};
pub use ids::{ElementId, Id, IdError, PageId, DEFAULT_PAGE_ID};
pub use selector::{Selector, SelectorError};
