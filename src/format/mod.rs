// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Page markup parsing and serialization.
//!
//! Currently this module focuses on the XHTML-compatible markup the preview templates render and
//! the editor stores in history snapshots.

pub mod markup;

pub use markup::{
    insert_fragment, parse_document, parse_fragment, serialize_children, serialize_node, MarkupError,
    MarkupFilter, MarkupNode, Verbatim,
};
