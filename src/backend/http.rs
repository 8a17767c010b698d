// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Client for the page-edit endpoints.
//!
//! Talks to a running `editbridge serve` (or anything speaking the same routes). A 2xx answer means
//! the call took effect; 401 maps to [`BackendError::Unauthorized`], any other status to
//! [`BackendError::Status`], and connection failures to [`BackendError::Transport`].

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{BackendError, PageEdit, PageEditBackend};
use crate::model::{ElementId, PageId};
use crate::store::StoredEdit;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct MeBody {
    authenticated: bool,
}

#[derive(Debug, Deserialize)]
struct PageEditsBody {
    #[serde(default)]
    edits: BTreeMap<ElementId, StoredEdit>,
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
    token: Option<Arc<str>>,
}

impl HttpBackend {
    /// `base` is the server origin (optionally with a path prefix); routes are appended to it.
    pub fn new(base: &str, token: Option<String>) -> Result<Self, BackendError> {
        let base = Url::parse(base)
            .map_err(|err| BackendError::Transport(format!("invalid server url {base}: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Transport(format!(
                "server url {base} cannot carry a path"
            )));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base,
            token: token.filter(|t| !t.is_empty()).map(Arc::from),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(segments));
        match self.token.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

async fn send(builder: RequestBuilder) -> Result<Response, BackendError> {
    let response = builder.send().await.map_err(transport)?;
    let status = response.status();
    debug!(url = %response.url(), status = status.as_u16(), "backend answered");
    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }
    if !status.is_success() {
        return Err(BackendError::Status(status.as_u16()));
    }
    Ok(response)
}

async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, BackendError> {
    send(builder).await?.json::<T>().await.map_err(transport)
}

impl PageEditBackend for HttpBackend {
    fn is_authenticated(&self) -> impl Future<Output = Result<bool, BackendError>> + Send {
        let request = self.request(Method::GET, &["api", "me"]);
        async move {
            match send_json::<MeBody>(request).await {
                Ok(body) => Ok(body.authenticated),
                Err(BackendError::Unauthorized) => Ok(false),
                Err(err) => Err(err),
            }
        }
    }

    fn save_edit(&self, edit: PageEdit) -> impl Future<Output = Result<(), BackendError>> + Send {
        let request = self
            .request(Method::POST, &["api", "save-page-edit"])
            .json(&edit);
        async move {
            send(request).await?;
            Ok(())
        }
    }

    fn delete_edit(
        &self,
        page_id: PageId,
        element_id: ElementId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        let request = self.request(
            Method::DELETE,
            &[
                "api",
                "delete-page-edit",
                page_id.as_str(),
                element_id.as_str(),
            ],
        );
        async move {
            send(request).await?;
            Ok(())
        }
    }

    fn load_edits(
        &self,
        page_id: PageId,
    ) -> impl Future<Output = Result<Vec<StoredEdit>, BackendError>> + Send {
        let request = self.request(Method::GET, &["api", "get-page-edits", page_id.as_str()]);
        async move {
            let body = send_json::<PageEditsBody>(request).await?;
            Ok(body.edits.into_values().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    use super::HttpBackend;
    use crate::backend::{BackendError, PageEditBackend};
    use crate::model::{EditContent, EditType, ElementId, PageEdit, PageId};
    use crate::server::{serve, AppState};
    use crate::store::PageEditFolder;
    use crate::test_utils::TempDir;

    const TOKEN: &str = "s3cret";

    struct Running {
        addr: SocketAddr,
        stop: oneshot::Sender<()>,
        server: JoinHandle<std::io::Result<()>>,
    }

    impl Running {
        fn url(&self) -> String {
            format!("http://{}", self.addr)
        }

        async fn stop(self) {
            let _ = self.stop.send(());
            self.server.await.expect("server task").expect("server");
        }
    }

    async fn start(folder: PageEditFolder) -> Running {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (stop, stopped) = oneshot::channel::<()>();
        let state = AppState::new(folder, Some(TOKEN.to_owned()));
        let server = tokio::spawn(serve(listener, state, async move {
            let _ = stopped.await;
        }));
        Running { addr, stop, server }
    }

    fn hero_edit(edited: &str) -> PageEdit {
        PageEdit {
            page_id: PageId::default_page(),
            element_id: ElementId::new("hero").expect("element id"),
            edit_type: EditType::Text,
            original_content: EditContent::text("Fresh bread"),
            edited_content: EditContent::text(edited),
        }
    }

    #[tokio::test]
    async fn signed_in_client_saves_loads_and_deletes() {
        let tmp = TempDir::new("http-backend");
        let running = start(PageEditFolder::new(tmp.path().join("pages"))).await;
        let backend = HttpBackend::new(&running.url(), Some(TOKEN.to_owned())).expect("backend");

        assert!(backend.is_authenticated().await.expect("auth check"));
        backend.save_edit(hero_edit("Warm bread")).await.expect("save");

        let edits = backend.load_edits(PageId::default_page()).await.expect("load");
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].element_id.as_str(), "hero");
        assert_eq!(edits[0].edited_content, EditContent::text("Warm bread"));

        backend
            .delete_edit(PageId::default_page(), ElementId::new("hero").expect("element id"))
            .await
            .expect("delete");
        let edits = backend.load_edits(PageId::default_page()).await.expect("load");
        assert!(edits.is_empty());

        drop(backend);
        running.stop().await;
    }

    #[rstest]
    #[case(None)]
    #[case(Some("guess"))]
    #[tokio::test]
    async fn rejected_token_means_unauthenticated(#[case] token: Option<&str>) {
        let tmp = TempDir::new("http-backend");
        let running = start(PageEditFolder::new(tmp.path().join("pages"))).await;
        let backend = HttpBackend::new(&running.url(), token.map(str::to_owned)).expect("backend");

        assert!(!backend.is_authenticated().await.expect("auth check"));
        let err = backend.save_edit(hero_edit("Sneaky")).await.expect_err("refused");
        assert!(matches!(err, BackendError::Unauthorized), "{err}");

        drop(backend);
        running.stop().await;
    }

    #[tokio::test]
    async fn server_failure_surfaces_its_status() {
        let tmp = TempDir::new("http-backend");
        let blocked = tmp.path().join("pages");
        std::fs::write(&blocked, "not a directory").expect("write blocker");
        let running = start(PageEditFolder::new(blocked)).await;
        let backend = HttpBackend::new(&running.url(), Some(TOKEN.to_owned())).expect("backend");

        let err = backend.save_edit(hero_edit("Lost")).await.expect_err("store fails");
        assert!(matches!(err, BackendError::Status(500)), "{err}");

        drop(backend);
        running.stop().await;
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        let backend = HttpBackend::new(&format!("http://{addr}"), None).expect("backend");

        let err = backend.is_authenticated().await.expect_err("nothing listening");
        assert!(matches!(err, BackendError::Transport(_)), "{err}");
    }

    #[rstest]
    #[case("http://127.0.0.1:4000", "http://127.0.0.1:4000/api/me")]
    #[case("http://127.0.0.1:4000/", "http://127.0.0.1:4000/api/me")]
    #[case("http://edit.example/bakery/", "http://edit.example/bakery/api/me")]
    fn endpoints_extend_the_base_path(#[case] base: &str, #[case] expected: &str) {
        let backend = HttpBackend::new(base, None).expect("backend");
        assert_eq!(backend.endpoint(&["api", "me"]).as_str(), expected);
    }

    #[test]
    fn ids_are_percent_encoded_as_single_segments() {
        let backend = HttpBackend::new("http://127.0.0.1:4000", None).expect("backend");
        let page = PageId::new("home page").expect("page id");
        let element = ElementId::new("p-a?b#c").expect("element id");
        let url = backend.endpoint(&["api", "delete-page-edit", page.as_str(), element.as_str()]);
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:4000/api/delete-page-edit/home%20page/p-a%3Fb%23c"
        );
    }

    #[test]
    fn rejects_urls_without_a_path() {
        assert!(HttpBackend::new("mailto:someone@example.com", None).is_err());
        assert!(HttpBackend::new("not a url", None).is_err());
    }
}
