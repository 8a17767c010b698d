// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Cross-frame message protocol.
//!
//! Every message is a JSON object tagged by `type`. Inbound messages come from any frame and are
//! validated before the session acts on them; outbound messages are notifications for the parent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{EditContent, EditType, ElementId};

const INBOUND_TYPES: &[&str] = &["undo", "redo", "editor-cmd", "content-change"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundMessage {
    Undo,
    Redo,
    EditorCmd {
        cmd: String,
        #[serde(default)]
        value: Option<CommandValue>,
    },
    #[serde(rename_all = "camelCase")]
    ContentChange { element_id: ElementId, text: String },
}

/// Command values arrive as strings, but numbers (font sizes) and booleans show up too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl CommandValue {
    pub fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
            Self::Flag(flag) => flag.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("message has no string `type` field")]
    MissingType,
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("malformed `{kind}` message: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl InboundMessage {
    /// Validates shape before decoding so unrelated traffic on the channel is reported precisely.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if !INBOUND_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_owned()));
        }
        serde_json::from_value(value.clone()).map_err(|source| ProtocolError::Malformed {
            kind: kind.to_owned(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let value = serde_json::from_str::<Value>(text)?;
        Self::from_value(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    #[serde(rename_all = "camelCase")]
    ElementSelected {
        element_id: ElementId,
        tag_name: String,
        edit_type: EditType,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ElementDeselected { element_id: ElementId },
    #[serde(rename_all = "camelCase")]
    ElementDeleted { element_id: ElementId },
    #[serde(rename_all = "camelCase")]
    HistoryChanged { can_undo: bool, can_redo: bool },
    SaveStatus { status: SaveStatus },
    #[serde(rename_all = "camelCase")]
    EditorChange {
        element_id: ElementId,
        content: EditContent,
        timestamp: u64,
    },
    #[serde(rename_all = "camelCase")]
    AiAssist {
        element_id: ElementId,
        text: String,
        prompt: String,
    },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ElementSelected { .. } => "element-selected",
            Self::ElementDeselected { .. } => "element-deselected",
            Self::ElementDeleted { .. } => "element-deleted",
            Self::HistoryChanged { .. } => "history-changed",
            Self::SaveStatus { .. } => "save-status",
            Self::EditorChange { .. } => "editor-change",
            Self::AiAssist { .. } => "ai-assist",
        }
    }
}
