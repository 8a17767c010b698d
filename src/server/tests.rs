// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use super::{
    delete_page_edit, get_page_edits, me, save_page_edit, serve, ApiError, AppState,
};
use crate::model::{EditContent, EditType, ElementId, PageEdit, PageId};
use crate::store::PageEditFolder;
use crate::test_utils::TempDir;

const TOKEN: &str = "s3cret";

struct ServerCtx {
    _tmp: TempDir,
    state: AppState,
}

#[fixture]
fn ctx() -> ServerCtx {
    let tmp = TempDir::new("server");
    let folder = PageEditFolder::new(tmp.path().join("pages"));
    ServerCtx {
        _tmp: tmp,
        state: AppState::new(folder, Some(TOKEN.to_owned())),
    }
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
    );
    headers
}

fn headline_edit(edited: &str) -> PageEdit {
    PageEdit {
        page_id: PageId::default_page(),
        element_id: ElementId::new("hero").expect("element id"),
        edit_type: EditType::Text,
        original_content: EditContent::text("Fresh bread"),
        edited_content: EditContent::text(edited),
    }
}

fn status_of(err: ApiError) -> StatusCode {
    err.into_response().status()
}

#[rstest]
#[tokio::test]
async fn me_requires_the_bearer_token(ctx: ServerCtx) {
    let Json(answer) = me(State(ctx.state.clone()), bearer(TOKEN)).await.expect("signed in");
    assert!(answer.authenticated);

    let err = me(State(ctx.state.clone()), HeaderMap::new())
        .await
        .expect_err("anonymous");
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);

    let err = me(State(ctx.state), bearer("guess")).await.expect_err("wrong token");
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn without_a_token_everyone_is_signed_in() {
    let tmp = TempDir::new("server-open");
    let state = AppState::new(PageEditFolder::new(tmp.path()), Some(String::new()));
    let Json(answer) = me(State(state), HeaderMap::new()).await.expect("open server");
    assert!(answer.authenticated);
}

#[rstest]
#[tokio::test]
async fn save_load_delete_round(ctx: ServerCtx) {
    let state = ctx.state;
    let Json(saved) = save_page_edit(
        State(state.clone()),
        bearer(TOKEN),
        Json(headline_edit("Fresh bread daily")),
    )
    .await
    .expect("save");
    assert!(saved.success);
    assert_eq!(saved.edit.edited_content, EditContent::text("Fresh bread daily"));

    save_page_edit(
        State(state.clone()),
        bearer(TOKEN),
        Json(PageEdit {
            original_content: EditContent::text("Fresh bread daily"),
            ..headline_edit("Sourdough Sundays")
        }),
    )
    .await
    .expect("second save");

    let Json(page) = get_page_edits(
        State(state.clone()),
        bearer(TOKEN),
        Path("homepage-v1".to_owned()),
    )
    .await
    .expect("load");
    assert_eq!(page.page_id, PageId::default_page());
    let stored = page
        .edits
        .get(&ElementId::new("hero").expect("element id"))
        .expect("stored hero");
    assert_eq!(stored.original_content, EditContent::text("Fresh bread"));
    assert_eq!(stored.edited_content, EditContent::text("Sourdough Sundays"));

    let Json(removed) = delete_page_edit(
        State(state.clone()),
        bearer(TOKEN),
        Path(("homepage-v1".to_owned(), "hero".to_owned())),
    )
    .await
    .expect("delete");
    assert!(removed.deleted);

    let Json(again) = delete_page_edit(
        State(state.clone()),
        bearer(TOKEN),
        Path(("homepage-v1".to_owned(), "hero".to_owned())),
    )
    .await
    .expect("delete again");
    assert!(!again.deleted);

    let Json(page) = get_page_edits(State(state), bearer(TOKEN), Path("homepage-v1".to_owned()))
        .await
        .expect("load after delete");
    assert!(page.edits.is_empty());
}

#[rstest]
#[tokio::test]
async fn inconsistent_edits_are_bad_requests(ctx: ServerCtx) {
    let edit = PageEdit {
        edited_content: EditContent::image("/img/a.png"),
        ..headline_edit("unused")
    };
    let err = save_page_edit(State(ctx.state), bearer(TOKEN), Json(edit))
        .await
        .expect_err("mismatched content");
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test]
async fn anonymous_writes_are_refused(ctx: ServerCtx) {
    let err = save_page_edit(
        State(ctx.state.clone()),
        HeaderMap::new(),
        Json(headline_edit("Nope")),
    )
    .await
    .expect_err("anonymous save");
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
    assert!(ctx
        .state
        .folder()
        .load_page(&PageId::default_page())
        .expect("load")
        .is_empty());
}

async fn raw_request(addr: std::net::SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(request.as_bytes()).await.expect("write request");
    let mut response = String::new();
    stream.read_to_string(&mut response).await.expect("read response");
    response
}

#[rstest]
#[tokio::test]
async fn routes_are_served_over_http(ctx: ServerCtx) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, ctx.state.clone(), async move {
        let _ = stop_rx.await;
    }));

    let body = serde_json::to_string(&headline_edit("Over the wire")).expect("json");
    let save = raw_request(
        addr,
        &format!(
            "POST /api/save-page-edit HTTP/1.1\r\nHost: localhost\r\nAuthorization: Bearer {TOKEN}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ),
    )
    .await;
    assert!(save.starts_with("HTTP/1.1 200"), "{save}");

    let load = raw_request(
        addr,
        &format!(
            "GET /api/get-page-edits/homepage-v1 HTTP/1.1\r\nHost: localhost\r\nAuthorization: Bearer {TOKEN}\r\nConnection: close\r\n\r\n"
        ),
    )
    .await;
    assert!(load.starts_with("HTTP/1.1 200"), "{load}");
    assert!(load.contains("\"Over the wire\""));

    let anonymous = raw_request(
        addr,
        "GET /api/me HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(anonymous.starts_with("HTTP/1.1 401"), "{anonymous}");

    let _ = stop_tx.send(());
    server.await.expect("server task").expect("serve");
}
