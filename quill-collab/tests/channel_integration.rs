//! End-to-end channel tests against a real WebSocket hub.

mod common;

use std::sync::Arc;

use common::{wait_for, TestHub, TIMEOUT, TOKEN};
use quill_collab::{
    ChannelError, ChannelManager, ConnectFailure, ConnectionState, ConnectionStatus, CredentialStore,
    EventKind, HubEvent,
};
use quill_core::{
    Block, BlockImageRequest, CreateDocumentRequest, DocumentRole, EditBlockRequest, FileUpload,
    SendBlockRequest,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

fn channel(hub: &TestHub, token: &str) -> Arc<ChannelManager> {
    Arc::new(ChannelManager::new(
        hub.config(),
        Arc::new(CredentialStore::with_token(token)),
    ))
}

/// Forward every event of `kind` into a receiver.
fn collect(channel: &ChannelManager, kind: EventKind) -> mpsc::UnboundedReceiver<HubEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    channel.subscribe(kind, move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

#[tokio::test]
async fn test_concurrent_connects_share_one_handshake() {
    let hub = TestHub::start().await;
    let channel = channel(&hub, TOKEN);

    let (a, b, c) = tokio::join!(channel.connect(), channel.connect(), channel.connect());
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    // Connecting again once connected is a no-op too.
    channel.connect().await.unwrap();

    assert_eq!(channel.handshake_count(), 1);
    assert_eq!(hub.handshakes(), 1);
    assert_eq!(channel.state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn test_invocation_and_push_round_trip() {
    let hub = TestHub::start().await;
    let channel = channel(&hub, TOKEN);
    let mut blocks = collect(&channel, EventKind::ReceiveBlock);
    channel.connect().await.unwrap();
    assert_eq!(channel.state().await, ConnectionState::Connected);

    channel
        .send_block(&SendBlockRequest { text: "hello".into(), document_id: 7 })
        .await
        .unwrap();

    let event = timeout(TIMEOUT, blocks.recv()).await.unwrap().unwrap();
    let HubEvent::ReceiveBlock(block) = event else {
        panic!("unexpected event {event:?}");
    };
    assert_eq!(block.document_id, 7);
    assert_eq!(block.text, "hello");
    assert_eq!(hub.invocations("SendBlock").len(), 1);
}

#[tokio::test]
async fn test_unsolicited_push_reaches_handlers_in_order() {
    let hub = TestHub::start().await;
    let channel = channel(&hub, TOKEN);
    let (tx, mut rx) = mpsc::unbounded_channel();
    for tag in ["first", "second"] {
        let tx = tx.clone();
        channel.subscribe(EventKind::BlockEdited, move |_| {
            let _ = tx.send(tag);
        });
    }
    channel.connect().await.unwrap();

    hub.push(HubEvent::BlockEdited(Block::new(1, 1, "remote")));
    assert_eq!(timeout(TIMEOUT, rx.recv()).await.unwrap(), Some("first"));
    assert_eq!(timeout(TIMEOUT, rx.recv()).await.unwrap(), Some("second"));
}

#[tokio::test]
async fn test_rejected_token_is_auth_failure() {
    let hub = TestHub::start().await;
    let channel = channel(&hub, "wrong-token");

    let err = channel.connect().await.unwrap_err();
    assert!(
        matches!(err, ChannelError::ConnectFailed(ConnectFailure::Unauthorized(_))),
        "got {err:?}"
    );
    assert!(err.is_auth_failure());
    assert_eq!(channel.state().await, ConnectionState::Disconnected);
    assert_eq!(hub.handshakes(), 0);
}

#[tokio::test]
async fn test_unknown_collaborator_rejected_by_hub() {
    let hub = TestHub::start().await;
    let channel = channel(&hub, TOKEN);
    channel.connect().await.unwrap();

    let request = CreateDocumentRequest::new("Plan")
        .with_member("alice", DocumentRole::Editor)
        .with_member("zed", DocumentRole::Viewer);
    let err = channel.create_document(&request).await.unwrap_err();

    let ChannelError::RemoteRejected { method, message } = err else {
        panic!("expected RemoteRejected, got {err:?}");
    };
    assert_eq!(method, "CreateDocument");
    assert!(message.contains("zed"), "{message}");
    // The channel stays usable after a rejected call.
    assert_eq!(channel.state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn test_create_and_delete_document_pushes() {
    let hub = TestHub::start().await;
    let channel = channel(&hub, TOKEN);
    let mut created = collect(&channel, EventKind::DocumentCreated);
    let mut deleted = collect(&channel, EventKind::DocumentDeleted);
    channel.connect().await.unwrap();

    channel
        .create_document(&CreateDocumentRequest::new("Notes").with_member("bob", DocumentRole::Editor))
        .await
        .unwrap();
    let Some(HubEvent::DocumentCreated(document)) = timeout(TIMEOUT, created.recv()).await.unwrap() else {
        panic!("expected DocumentCreated");
    };
    assert_eq!(document.name, "Notes");

    channel.delete_document(document.id).await.unwrap();
    assert_eq!(
        timeout(TIMEOUT, deleted.recv()).await.unwrap(),
        Some(HubEvent::DocumentDeleted(document.id))
    );
}

#[tokio::test]
async fn test_image_upload_returns_descriptor() {
    let hub = TestHub::start().await;
    let block = hub.seed_block(3, "");
    let channel = channel(&hub, TOKEN);
    channel.connect().await.unwrap();

    let request = BlockImageRequest {
        block_id: block.id,
        url: String::new(),
        uploaded_on: "2024-05-01T12:00:00.000Z".into(),
        user_id: 0,
    };
    let upload = FileUpload {
        file_name: "cat.png".into(),
        content_type: "image/png".into(),
        content: vec![0x89, b'P', b'N', b'G'],
    };
    let image = channel.send_block_image(&request, &upload).await.unwrap();
    assert_eq!(image.url, "/images/cat.png");
    assert_eq!(image.marker(), format!("[image:{}]", image.id));

    // Bytes travel as a plain number array.
    let args = hub.invocations("SendBlockImage");
    assert_eq!(args[0][1]["content"], serde_json::json!([0x89, 80, 78, 71]));
}

#[tokio::test]
async fn test_drop_reconnects_and_refuses_sends_meanwhile() {
    let hub = TestHub::start().await;
    let channel = channel(&hub, TOKEN);
    let mut status = channel.subscribe_status();
    channel.connect().await.unwrap();
    wait_for(&mut status, |s| (*s == ConnectionStatus::Connected).then_some(())).await;

    hub.drop_connections();
    wait_for(&mut status, |s| matches!(s, ConnectionStatus::Reconnecting { attempt: 1 }).then_some(())).await;
    assert_eq!(channel.state().await, ConnectionState::Reconnecting);

    let invocations_before = hub.invocation_count();
    let result = channel
        .edit_block(&EditBlockRequest { id: 1, edited_text: "x".into() })
        .await;
    assert_eq!(result, Err(ChannelError::NotConnected));

    wait_for(&mut status, |s| (*s == ConnectionStatus::Reconnected).then_some(())).await;
    assert_eq!(channel.state().await, ConnectionState::Connected);
    assert_eq!(hub.handshakes(), 2);
    // The refused send never reached the hub and was not replayed.
    assert_eq!(hub.invocation_count(), invocations_before);
}

#[tokio::test]
async fn test_terminal_close_disconnects() {
    let hub = TestHub::start().await;
    let channel = channel(&hub, TOKEN);
    let mut status = channel.subscribe_status();
    channel.connect().await.unwrap();

    hub.close_clients("Server shutting down");
    let error = wait_for(&mut status, |s| match s {
        ConnectionStatus::Disconnected { error } => Some(error.clone()),
        _ => None,
    })
    .await;

    assert!(matches!(error, Some(ChannelError::RemoteRejected { .. })));
    assert_eq!(channel.state().await, ConnectionState::Disconnected);
    assert_eq!(hub.handshakes(), 1);
}

#[tokio::test]
async fn test_disconnect_then_connect_again() {
    let hub = TestHub::start().await;
    let channel = channel(&hub, TOKEN);
    let mut status = channel.subscribe_status();
    channel.connect().await.unwrap();

    channel.disconnect().await;
    wait_for(&mut status, |s| {
        (*s == ConnectionStatus::Disconnected { error: None }).then_some(())
    })
    .await;
    assert_eq!(channel.state().await, ConnectionState::Disconnected);
    assert_eq!(
        channel
            .send_block(&SendBlockRequest { text: String::new(), document_id: 1 })
            .await,
        Err(ChannelError::NotConnected)
    );

    channel.connect().await.unwrap();
    assert_eq!(channel.state().await, ConnectionState::Connected);
    assert_eq!(hub.handshakes(), 2);
}
