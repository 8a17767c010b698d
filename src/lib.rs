// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Editbridge: a headless in-page inline editor.
//!
//! An [`editor::EditorSession`] is injected into a [`model::Document`], marks editable elements,
//! tracks one active element with a floating toolbar, applies formatting commands, autosaves
//! through a [`backend::PageEditBackend`] and keeps a bounded snapshot history for undo/redo.
//! [`runtime::EditorHost`] drives a session from host events on a tokio runtime and
//! [`server`] exposes the page-edit endpoints over a file [`store`].

pub mod backend;
pub mod config;
pub mod editor;
pub mod format;
pub mod model;
pub mod protocol;
pub mod runtime;
pub mod server;
pub mod store;

#[cfg(test)]
mod test_utils;
