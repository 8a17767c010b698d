// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{ElementId, PageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditType {
    Text,
    Image,
}

impl EditType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    pub fn for_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("img") {
            Self::Image
        } else {
            Self::Text
        }
    }
}

impl fmt::Display for EditType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted shape of an element's content: `{ "text": .. }` or `{ "src": .. }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EditContent {
    Text { text: String },
    Image { src: String },
}

impl EditContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(src: impl Into<String>) -> Self {
        Self::Image { src: src.into() }
    }

    pub fn edit_type(&self) -> EditType {
        match self {
            Self::Text { .. } => EditType::Text,
            Self::Image { .. } => EditType::Image,
        }
    }

    /// The text or the image source, whichever this content carries.
    pub fn value(&self) -> &str {
        match self {
            Self::Text { text } => text,
            Self::Image { src } => src,
        }
    }
}

/// One element edit as sent to the save endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEdit {
    pub page_id: PageId,
    pub element_id: ElementId,
    pub edit_type: EditType,
    pub original_content: EditContent,
    pub edited_content: EditContent,
}

impl PageEdit {
    /// Both contents must have the shape `edit_type` names.
    pub fn is_consistent(&self) -> bool {
        self.original_content.edit_type() == self.edit_type
            && self.edited_content.edit_type() == self.edit_type
    }
}

#[cfg(test)]
mod tests {
    use super::{EditContent, EditType, PageEdit};

    #[test]
    fn content_uses_payload_field_names() {
        let text = serde_json::to_value(EditContent::text("Hello")).expect("serialize");
        assert_eq!(text, serde_json::json!({ "text": "Hello" }));

        let image: EditContent =
            serde_json::from_value(serde_json::json!({ "src": "/a.png" })).expect("deserialize");
        assert_eq!(image, EditContent::image("/a.png"));
        assert_eq!(image.edit_type(), EditType::Image);
    }

    #[test]
    fn edit_type_follows_tag() {
        assert_eq!(EditType::for_tag("IMG"), EditType::Image);
        assert_eq!(EditType::for_tag("p"), EditType::Text);
        assert_eq!(serde_json::to_string(&EditType::Text).expect("serialize"), "\"text\"");
    }

    #[test]
    fn page_edit_wire_shape() {
        let edit: PageEdit = serde_json::from_value(serde_json::json!({
            "pageId": "homepage-v1",
            "elementId": "p-no-class-hello-0",
            "editType": "text",
            "originalContent": { "text": "Hello" },
            "editedContent": { "text": "Hello world" }
        }))
        .expect("deserialize");
        assert!(edit.is_consistent());
        assert_eq!(edit.edited_content.value(), "Hello world");

        let mismatched = PageEdit {
            edited_content: EditContent::image("/x.png"),
            ..edit
        };
        assert!(!mismatched.is_consistent());
    }
}
