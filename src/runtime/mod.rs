// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The async host around an [`EditorSession`].
//!
//! [`EditorHost`] owns a session and a backend. It feeds host events into the session, sleeps
//! until the session's next timer deadline, carries out the effects the session queues (saves and
//! deletes are spawned so the document never waits on the network) and hands completions back.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::backend::{BackendError, PageEditBackend};
use crate::config::EditorConfig;
use crate::editor::discovery::find_delete_affordance;
use crate::editor::{EditorSession, Effect, InjectError, KeyInput, SaveTicket};
use crate::model::{Document, ElementId, PageId, Rect, Viewport};
use crate::protocol::OutboundMessage;

#[cfg(test)]
mod tests;

/// Something that happened in the page, as reported by the host.
///
/// Elements are addressed by their editor id; a click without one landed outside every editable
/// element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum HostEvent {
    #[serde(rename_all = "camelCase")]
    Click {
        #[serde(default)]
        element_id: Option<ElementId>,
    },
    #[serde(rename_all = "camelCase")]
    ClickDelete { element_id: ElementId },
    #[serde(rename_all = "camelCase")]
    Input { element_id: ElementId, text: String },
    Key {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        meta: bool,
        #[serde(default)]
        shift: bool,
    },
    Message { data: serde_json::Value },
    #[serde(rename_all = "camelCase")]
    Layout {
        element_id: ElementId,
        top: f64,
        left: f64,
        width: f64,
        height: f64,
    },
    #[serde(rename_all = "camelCase")]
    Viewport {
        width: f64,
        height: f64,
        #[serde(default)]
        scroll_x: f64,
        #[serde(default)]
        scroll_y: f64,
    },
    #[serde(rename_all = "camelCase")]
    Insert {
        #[serde(default)]
        parent_element_id: Option<ElementId>,
        markup: String,
    },
    /// Fire every pending save now.
    Flush,
}

#[derive(Debug)]
enum Completion {
    Saved {
        ticket: SaveTicket,
        result: Result<(), BackendError>,
    },
    Deleted {
        element_id: ElementId,
        result: Result<(), BackendError>,
    },
}

pub struct EditorHost<B: PageEditBackend> {
    session: EditorSession,
    backend: Arc<B>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl<B: PageEditBackend> EditorHost<B> {
    /// Resolves auth, injects the editor and, when authenticated, applies the page's stored edits.
    ///
    /// A failing auth check counts as unauthenticated.
    pub async fn start(
        doc: Document,
        page_id: PageId,
        config: EditorConfig,
        backend: Arc<B>,
    ) -> Result<Self, InjectError> {
        let authenticated = match backend.is_authenticated().await {
            Ok(authenticated) => authenticated,
            Err(err) => {
                warn!(error = %err, "auth check failed; continuing unauthenticated");
                false
            }
        };

        let mut session = EditorSession::inject(doc, page_id.clone(), config, authenticated)?;
        if authenticated {
            match backend.load_edits(page_id.clone()).await {
                Ok(edits) => {
                    session.apply_persisted_edits(
                        edits
                            .into_iter()
                            .map(|edit| (edit.element_id, edit.edited_content)),
                    );
                }
                Err(err) => warn!(page_id = %page_id, error = %err, "loading stored edits failed"),
            }
        }

        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Ok(Self {
            session,
            backend,
            completions_tx,
            completions_rx,
            in_flight: 0,
        })
    }

    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut EditorSession {
        &mut self.session
    }

    pub fn into_session(self) -> EditorSession {
        self.session
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Applies one host event to the session. Returns false when the event had no effect.
    pub fn handle_event(&mut self, event: HostEvent) -> bool {
        let session = &mut self.session;
        match event {
            HostEvent::Click { element_id: None } => {
                session.click_outside();
                true
            }
            HostEvent::Click {
                element_id: Some(element_id),
            } => match session.element_node(&element_id) {
                Some(node) => {
                    session.click(node);
                    true
                }
                None => {
                    warn!(element_id = %element_id, "click on unknown element");
                    false
                }
            },
            HostEvent::ClickDelete { element_id } => {
                let button = session
                    .element_node(&element_id)
                    .and_then(|node| find_delete_affordance(session.document(), node));
                match button {
                    Some(button) => {
                        session.click(button);
                        true
                    }
                    None => {
                        warn!(element_id = %element_id, "no delete affordance for element");
                        false
                    }
                }
            }
            HostEvent::Input { element_id, text } => match session.element_node(&element_id) {
                Some(node) => session.input(node, &text),
                None => {
                    warn!(element_id = %element_id, "input on unknown element");
                    false
                }
            },
            HostEvent::Key {
                key,
                ctrl,
                meta,
                shift,
            } => session.key_down(&KeyInput {
                key,
                ctrl,
                meta,
                shift,
            }),
            HostEvent::Message { data } => session.handle_message(&data),
            HostEvent::Layout {
                element_id,
                top,
                left,
                width,
                height,
            } => {
                let Some(node) = session.element_node(&element_id) else {
                    return false;
                };
                session
                    .document_mut()
                    .set_layout(node, Rect::new(top, left, width, height));
                if session.active_node() == Some(node) {
                    session.reposition_toolbar();
                }
                true
            }
            HostEvent::Viewport {
                width,
                height,
                scroll_x,
                scroll_y,
            } => {
                session.document_mut().set_viewport(Viewport {
                    width,
                    height,
                    scroll_x,
                    scroll_y,
                });
                session.reposition_toolbar();
                true
            }
            HostEvent::Insert {
                parent_element_id,
                markup,
            } => {
                let parent = match parent_element_id {
                    Some(id) => match session.element_node(&id) {
                        Some(node) => node,
                        None => {
                            warn!(element_id = %id, "insert under unknown element");
                            return false;
                        }
                    },
                    None => session.document().root(),
                };
                match session.insert_markup(parent, None, &markup) {
                    Ok(_) => true,
                    Err(err) => {
                        warn!(error = %err, "inserted markup rejected");
                        false
                    }
                }
            }
            HostEvent::Flush => session.flush_pending_saves() > 0,
        }
    }

    /// Runs queued effects: posts go to `outbound`, network calls are spawned.
    pub fn dispatch_effects(&mut self, outbound: &mpsc::UnboundedSender<OutboundMessage>) {
        for effect in self.session.drain_effects() {
            match effect {
                Effect::Post(message) => {
                    if outbound.send(message).is_err() {
                        debug!("outbound channel closed");
                    }
                }
                Effect::Save(request) => {
                    self.in_flight += 1;
                    let backend = Arc::clone(&self.backend);
                    let done = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = backend.save_edit(request.edit).await;
                        let _ = done.send(Completion::Saved {
                            ticket: request.ticket,
                            result,
                        });
                    });
                }
                Effect::Delete {
                    page_id,
                    element_id,
                } => {
                    self.in_flight += 1;
                    let backend = Arc::clone(&self.backend);
                    let done = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = backend.delete_edit(page_id, element_id.clone()).await;
                        let _ = done.send(Completion::Deleted { element_id, result });
                    });
                }
            }
        }
    }

    fn apply_completion(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Saved { ticket, result } => self.session.complete_save(ticket, result),
            Completion::Deleted { element_id, result } => match result {
                Ok(()) => debug!(element_id = %element_id, "remote edit deleted"),
                Err(err) => warn!(element_id = %element_id, error = %err, "delete failed"),
            },
        }
    }

    /// Processes events until the channel closes, then settles and returns the session.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<HostEvent>,
        outbound: mpsc::UnboundedSender<OutboundMessage>,
    ) -> EditorSession {
        info!(page_id = %self.session.page_id(), "editor host running");
        loop {
            self.dispatch_effects(&outbound);
            let deadline = self.session.next_deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event);
                    }
                    None => break,
                },
                Some(completion) = self.completions_rx.recv() => self.apply_completion(completion),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.session.poll_timers(Instant::now());
                }
            }
        }
        self.settle(&outbound).await;
        self.session
    }

    /// Fires pending saves and waits for every in-flight network call to finish.
    pub async fn settle(&mut self, outbound: &mpsc::UnboundedSender<OutboundMessage>) {
        let flushed = self.session.flush_pending_saves();
        if flushed > 0 {
            debug!(flushed, "flushed pending saves");
        }
        self.dispatch_effects(outbound);
        while self.in_flight > 0 {
            match self.completions_rx.recv().await {
                Some(completion) => self.apply_completion(completion),
                None => break,
            }
            self.dispatch_effects(outbound);
        }
    }
}
