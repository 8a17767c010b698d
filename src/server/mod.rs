// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! HTTP surface for page edits.
//!
//! Serves the endpoints the editor consumes (`/api/me`, save, load, delete) over a
//! [`PageEditFolder`]. A configured bearer token gates every route; without one every caller
//! counts as signed in.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task;
use tracing::{debug, info, warn};

use crate::editor::unix_millis;
use crate::model::{ElementId, PageEdit, PageId};
use crate::store::{PageEditFolder, StoreError, StoredEdit};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone)]
pub struct AppState {
    folder: PageEditFolder,
    token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(folder: PageEditFolder, token: Option<String>) -> Self {
        Self {
            folder,
            token: token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }

    pub fn folder(&self) -> &PageEditFolder {
        &self.folder
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = self.token.as_deref() else {
            return Ok(());
        };
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        match presented {
            Some(token) if token.trim() == expected => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }

    async fn with_folder<T, F>(&self, job: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(PageEditFolder) -> Result<T, StoreError> + Send + 'static,
    {
        let folder = self.folder.clone();
        task::spawn_blocking(move || job(folder))
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?
            .map_err(ApiError::from)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not authenticated")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::Store(StoreError::InconsistentEdit { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeResponse {
    pub authenticated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub edit: StoredEdit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEditsResponse {
    pub page_id: PageId,
    pub edits: std::collections::BTreeMap<ElementId, StoredEdit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/save-page-edit", post(save_page_edit))
        .route("/api/get-page-edits/{page_id}", get(get_page_edits))
        .route(
            "/api/delete-page-edit/{page_id}/{element_id}",
            delete(delete_page_edit),
        )
        .with_state(state)
}

/// Serves until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, pages = %state.folder.root().display(), "page edit server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<MeResponse>, ApiError> {
    state.authorize(&headers)?;
    Ok(Json(MeResponse {
        authenticated: true,
    }))
}

pub async fn save_page_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(edit): Json<PageEdit>,
) -> Result<Json<SaveResponse>, ApiError> {
    state.authorize(&headers)?;
    if !edit.is_consistent() {
        return Err(ApiError::BadRequest(format!(
            "content of {} does not match edit type {}",
            edit.element_id, edit.edit_type
        )));
    }
    debug!(page_id = %edit.page_id, element_id = %edit.element_id, "saving page edit");
    let stored = state
        .with_folder(move |folder| folder.save_edit(&edit, unix_millis()))
        .await?;
    Ok(Json(SaveResponse {
        success: true,
        edit: stored,
    }))
}

pub async fn get_page_edits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(page_id): Path<String>,
) -> Result<Json<PageEditsResponse>, ApiError> {
    state.authorize(&headers)?;
    let page_id = parse_page_id(page_id)?;
    let lookup = page_id.clone();
    let edits = state
        .with_folder(move |folder| folder.load_page(&lookup))
        .await?;
    Ok(Json(PageEditsResponse { page_id, edits }))
}

pub async fn delete_page_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((page_id, element_id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.authorize(&headers)?;
    let page_id = parse_page_id(page_id)?;
    let element_id =
        ElementId::new(element_id).map_err(|err| ApiError::BadRequest(err.to_string()))?;
    debug!(page_id = %page_id, element_id = %element_id, "deleting page edit");
    let deleted = state
        .with_folder(move |folder| folder.delete_edit(&page_id, &element_id))
        .await?;
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}

fn parse_page_id(raw: String) -> Result<PageId, ApiError> {
    PageId::new(raw).map_err(|err| ApiError::BadRequest(err.to_string()))
}
