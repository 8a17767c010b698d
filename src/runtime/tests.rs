// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{EditorHost, HostEvent};
use crate::backend::MemoryBackend;
use crate::config::EditorConfig;
use crate::editor::EditorSession;
use crate::format::parse_document;
use crate::model::{EditContent, EditType, ElementId, PageId};
use crate::protocol::{OutboundMessage, SaveStatus};
use crate::store::StoredEdit;

const PAGE: &str = r#"<h1 data-element-id="hero">Fresh bread</h1><p data-element-id="intro">Hello</p>"#;

fn id(value: &str) -> ElementId {
    ElementId::new(value).expect("element id")
}

fn page_id() -> PageId {
    PageId::default_page()
}

fn click(element: &str) -> HostEvent {
    HostEvent::Click {
        element_id: Some(id(element)),
    }
}

fn input(element: &str, text: &str) -> HostEvent {
    HostEvent::Input {
        element_id: id(element),
        text: text.to_owned(),
    }
}

struct Running {
    events: mpsc::Sender<HostEvent>,
    outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    handle: JoinHandle<EditorSession>,
}

impl Running {
    async fn send(&self, event: HostEvent) {
        self.events.send(event).await.expect("host is running");
    }

    async fn finish(self) -> (EditorSession, Vec<OutboundMessage>) {
        let Self {
            events,
            mut outbound,
            handle,
        } = self;
        drop(events);
        let session = handle.await.expect("host task");
        let mut messages = Vec::new();
        while let Ok(message) = outbound.try_recv() {
            messages.push(message);
        }
        (session, messages)
    }
}

async fn spawn_host(backend: &MemoryBackend) -> Running {
    let doc = parse_document(PAGE).expect("page markup");
    let host = EditorHost::start(doc, page_id(), EditorConfig::default(), Arc::new(backend.clone()))
        .await
        .expect("inject");
    let (events, events_rx) = mpsc::channel(32);
    let (outbound_tx, outbound) = mpsc::unbounded_channel();
    let handle = tokio::spawn(host.run(events_rx, outbound_tx));
    Running {
        events,
        outbound,
        handle,
    }
}

fn statuses(messages: &[OutboundMessage]) -> Vec<SaveStatus> {
    messages
        .iter()
        .filter_map(|m| match m {
            OutboundMessage::SaveStatus { status } => Some(*status),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_save() {
    let backend = MemoryBackend::new(true);
    let host = spawn_host(&backend).await;

    host.send(click("intro")).await;
    host.send(input("intro", "Hello w")).await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    host.send(input("intro", "Hello wor")).await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    host.send(input("intro", "Hello world")).await;
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let saves = backend.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].element_id, id("intro"));
    assert_eq!(saves[0].edit_type, EditType::Text);
    assert_eq!(saves[0].original_content, EditContent::text("Hello"));
    assert_eq!(saves[0].edited_content, EditContent::text("Hello world"));

    let (session, messages) = host.finish().await;
    assert_eq!(
        session.original_content(&id("intro")),
        Some(&EditContent::text("Hello world"))
    );
    assert_eq!(statuses(&messages), vec![SaveStatus::Saving, SaveStatus::Saved]);
}

#[tokio::test(start_paused = true)]
async fn late_completion_does_not_roll_back_newer_save() {
    let backend = MemoryBackend::new(true);
    backend.delay_saves([Duration::from_secs(3), Duration::ZERO]);
    let host = spawn_host(&backend).await;

    host.send(click("intro")).await;
    host.send(input("intro", "First")).await;
    host.send(HostEvent::Flush).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    host.send(input("intro", "Second")).await;
    host.send(HostEvent::Flush).await;
    tokio::time::sleep(Duration::from_secs(4)).await;

    let arrived = backend
        .saves()
        .into_iter()
        .map(|edit| edit.edited_content)
        .collect::<Vec<_>>();
    assert_eq!(
        arrived,
        vec![EditContent::text("Second"), EditContent::text("First")]
    );

    let (session, _) = host.finish().await;
    let record = session.record(&id("intro")).expect("record");
    assert_eq!(record.original(), &EditContent::text("Second"));
    assert_eq!(record.acked_seq(), 2);
    assert!(!record.is_dirty());
}

#[tokio::test(start_paused = true)]
async fn unauthenticated_session_never_calls_the_backend() {
    let backend = MemoryBackend::new(false);
    let host = spawn_host(&backend).await;

    host.send(click("intro")).await;
    host.send(input("intro", "Local only")).await;
    host.send(HostEvent::ClickDelete {
        element_id: id("hero"),
    })
    .await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let (session, messages) = host.finish().await;
    assert!(backend.saves().is_empty());
    assert!(backend.deletes().is_empty());
    assert!(statuses(&messages).is_empty());
    assert!(!session.is_authenticated());
    assert!(session.snapshot_markup().contains("Local only"));
    assert!(session.element_node(&id("hero")).is_none());
}

#[tokio::test(start_paused = true)]
async fn failing_auth_check_means_unauthenticated() {
    let backend = MemoryBackend::new(true);
    backend.set_auth_unavailable(true);
    let host = spawn_host(&backend).await;

    host.send(click("intro")).await;
    host.send(input("intro", "Offline")).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let (session, _) = host.finish().await;
    assert!(!session.is_authenticated());
    assert!(backend.saves().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stored_edits_are_applied_at_startup() {
    let backend = MemoryBackend::new(true);
    backend.seed(
        &page_id(),
        StoredEdit {
            element_id: id("intro"),
            edit_type: EditType::Text,
            original_content: EditContent::text("Hello"),
            edited_content: EditContent::text("Welcome back"),
            last_modified: 1,
        },
    );
    let host = spawn_host(&backend).await;
    let (session, _) = host.finish().await;

    let node = session.element_node(&id("intro")).expect("intro");
    assert_eq!(
        session.capture_content(node),
        EditContent::text("Welcome back")
    );
    assert_eq!(
        session.original_content(&id("intro")),
        Some(&EditContent::text("Welcome back"))
    );
    assert!(!session.can_undo());
    assert!(backend.saves().is_empty());
}

#[tokio::test(start_paused = true)]
async fn delete_reaches_backend_without_blocking() {
    let backend = MemoryBackend::new(true);
    let host = spawn_host(&backend).await;

    host.send(HostEvent::ClickDelete {
        element_id: id("hero"),
    })
    .await;
    host.send(HostEvent::Key {
        key: "z".into(),
        ctrl: true,
        meta: false,
        shift: false,
    })
    .await;

    let (session, messages) = host.finish().await;
    assert_eq!(backend.deletes(), vec![(page_id(), id("hero"))]);
    assert!(session.element_node(&id("hero")).is_some());
    assert!(messages.contains(&OutboundMessage::ElementDeleted {
        element_id: id("hero")
    }));
    // The undo brought the element back, so its content is persisted again.
    assert_eq!(backend.saves().len(), 1);
    assert_eq!(backend.saves()[0].element_id, id("hero"));
}

#[tokio::test(start_paused = true)]
async fn failed_save_keeps_local_edit_and_reports_error() {
    let backend = MemoryBackend::new(true);
    backend.fail_next_saves(1);
    let host = spawn_host(&backend).await;

    host.send(click("intro")).await;
    host.send(input("intro", "Hello there")).await;
    tokio::time::sleep(Duration::from_millis(1_200)).await;

    let (session, messages) = host.finish().await;
    assert_eq!(statuses(&messages), vec![SaveStatus::Saving, SaveStatus::Error]);
    assert!(session.snapshot_markup().contains("Hello there"));
    let record = session.record(&id("intro")).expect("record");
    assert_eq!(record.original(), &EditContent::text("Hello"));
    assert!(record.is_dirty());
}

#[tokio::test(start_paused = true)]
async fn bridge_messages_drive_undo_and_commands() {
    let backend = MemoryBackend::new(false);
    let host = spawn_host(&backend).await;

    host.send(click("hero")).await;
    host.send(HostEvent::Message {
        data: serde_json::json!({"type": "editor-cmd", "cmd": "formatBlock", "value": "h2"}),
    })
    .await;
    host.send(HostEvent::Message {
        data: serde_json::json!({"type": "undo"}),
    })
    .await;
    host.send(HostEvent::Message {
        data: serde_json::json!({"type": "not-ours"}),
    })
    .await;

    let (session, messages) = host.finish().await;
    let hero = session.element_node(&id("hero")).expect("hero");
    assert_eq!(session.document().tag(hero), Some("h1"));
    assert!(session.can_redo());
    assert!(messages.contains(&OutboundMessage::HistoryChanged {
        can_undo: false,
        can_redo: true
    }));
}

#[test]
fn host_events_decode_from_json_lines() {
    let event: HostEvent = serde_json::from_str(
        r#"{"event":"layout","elementId":"intro","top":10,"left":20,"width":300,"height":40}"#,
    )
    .expect("layout event");
    assert_eq!(
        event,
        HostEvent::Layout {
            element_id: id("intro"),
            top: 10.0,
            left: 20.0,
            width: 300.0,
            height: 40.0
        }
    );

    let event: HostEvent = serde_json::from_str(r#"{"event":"click"}"#).expect("outside click");
    assert_eq!(event, HostEvent::Click { element_id: None });

    let event: HostEvent =
        serde_json::from_str(r#"{"event":"key","key":"Escape"}"#).expect("key event");
    assert!(matches!(event, HostEvent::Key { ref key, ctrl: false, .. } if key == "Escape"));
}
