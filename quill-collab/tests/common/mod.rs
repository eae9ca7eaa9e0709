//! In-process document hub for integration tests.
//!
//! Speaks the same JSON hub protocol as the production server: bearer token
//! in the `access_token` query parameter, handshake record, invocations with
//! completions and broadcast pushes. Keeps blocks in memory and records every
//! invocation it receives.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use quill_collab::protocol::{decode_handshake_request, encode_handshake_response, split_records};
use quill_collab::{ApiError, ClientConfig, DocumentApi, HubEvent, HubMessage};
use quill_core::{
    Block, BlockImage, BlockImageRequest, CreateDocumentRequest, DocumentId, DocumentRole, EditBlockRequest,
    FileUpload, SendBlockRequest, UserDocument,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

pub const TOKEN: &str = "test-token";
pub const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct HubState {
    handshakes: AtomicUsize,
    invocations: Mutex<Vec<(String, Vec<Value>)>>,
    blocks: Mutex<Vec<Block>>,
    roles: Mutex<HashMap<DocumentId, DocumentRole>>,
    clients: Mutex<Vec<mpsc::UnboundedSender<String>>>,
    next_id: AtomicI64,
    kill: Option<broadcast::Sender<()>>,
}

pub struct TestHub {
    port: u16,
    state: Arc<HubState>,
}

impl TestHub {
    /// Bind a free port and start accepting connections.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (kill, _) = broadcast::channel(4);
        let state = Arc::new(HubState {
            next_id: AtomicI64::new(100),
            kill: Some(kill),
            ..HubState::default()
        });

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, accept_state.clone()));
            }
        });
        Self { port, state }
    }

    pub fn hub_url(&self) -> String {
        format!("ws://127.0.0.1:{}/documenthub", self.port)
    }

    /// Client settings pointing at this hub, with fast reconnects.
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            hub_url: self.hub_url(),
            credential_path: None,
            edit_quiet_period: Duration::from_millis(100),
            handshake_timeout: Duration::from_secs(2),
            reconnect_delays: vec![Duration::from_millis(300), Duration::from_millis(300)],
            ..ClientConfig::default()
        }
    }

    pub fn handshakes(&self) -> usize {
        self.state.handshakes.load(Ordering::SeqCst)
    }

    pub fn invocation_count(&self) -> usize {
        self.state.invocations.lock().unwrap().len()
    }

    /// Arguments of every invocation of `target`, in arrival order.
    pub fn invocations(&self, target: &str) -> Vec<Vec<Value>> {
        self.state
            .invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == target)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn seed_block(&self, document_id: DocumentId, text: &str) -> Block {
        let block = Block::new(self.state.next_id(), document_id, text);
        self.state.blocks.lock().unwrap().push(block.clone());
        block
    }

    pub fn set_role(&self, document_id: DocumentId, role: DocumentRole) {
        self.state.roles.lock().unwrap().insert(document_id, role);
    }

    pub fn blocks(&self, document_id: DocumentId) -> Vec<Block> {
        self.state.blocks(document_id)
    }

    /// Push an event to every connected client.
    pub fn push(&self, event: HubEvent) {
        self.state.broadcast(&event);
    }

    /// Sever every connection without a close handshake.
    pub fn drop_connections(&self) {
        if let Some(kill) = &self.state.kill {
            let _ = kill.send(());
        }
    }

    /// Send a terminal hub Close record to every client.
    pub fn close_clients(&self, error: &str) {
        let record = HubMessage::Close {
            error: Some(error.to_string()),
            allow_reconnect: false,
        }
        .encode()
        .unwrap();
        self.state.send_all(&record);
    }

    /// REST reads served from this hub's in-memory data.
    pub fn api(&self) -> Arc<HubApi> {
        Arc::new(HubApi(self.state.clone()))
    }
}

pub struct HubApi(Arc<HubState>);

#[async_trait]
impl DocumentApi for HubApi {
    async fn blocks_by_document(&self, document_id: DocumentId, _since: &str) -> Result<Vec<Block>, ApiError> {
        Ok(self.0.blocks(document_id))
    }

    async fn my_documents(&self) -> Result<Vec<UserDocument>, ApiError> {
        Ok(self
            .0
            .roles
            .lock()
            .unwrap()
            .iter()
            .map(|(&id, &role)| UserDocument {
                document: quill_core::Document {
                    id,
                    name: format!("doc-{id}"),
                    creator_id: 1,
                },
                role,
            })
            .collect())
    }
}

impl HubState {
    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn blocks(&self, document_id: DocumentId) -> Vec<Block> {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.document_id == document_id)
            .cloned()
            .collect()
    }

    fn send_all(&self, record: &str) {
        self.clients
            .lock()
            .unwrap()
            .retain(|client| client.send(record.to_string()).is_ok());
    }

    fn broadcast(&self, event: &HubEvent) {
        let (target, args) = event.encode().unwrap();
        let record = HubMessage::event(target, args).encode().unwrap();
        self.send_all(&record);
    }

    fn handle(&self, message: HubMessage, reply: &mpsc::UnboundedSender<String>) {
        let HubMessage::Invocation {
            invocation_id,
            target,
            arguments,
        } = message
        else {
            return;
        };
        self.invocations
            .lock()
            .unwrap()
            .push((target.clone(), arguments.clone()));

        let result = match target.as_str() {
            "SendBlock" => self.send_block(&arguments),
            "EditBlock" => self.edit_block(&arguments),
            "CreateDocument" => self.create_document(&arguments),
            "DeleteDocument" => arg::<DocumentId>(&arguments, 0).map(|id| {
                self.broadcast(&HubEvent::DocumentDeleted(id));
                Value::Null
            }),
            "SendBlockImage" => self.send_block_image(&arguments),
            other => Err(format!("Unknown hub method {other}")),
        };

        if let Some(invocation_id) = invocation_id {
            let record = HubMessage::Completion { invocation_id, result }.encode().unwrap();
            let _ = reply.send(record);
        }
    }

    fn send_block(&self, arguments: &[Value]) -> Result<Value, String> {
        let request: SendBlockRequest = arg(arguments, 0)?;
        let mut block = Block::new(self.next_id(), request.document_id, request.text);
        block.user_id = 1;
        block.sent_on = "2024-05-01T12:00:00".to_string();
        self.blocks.lock().unwrap().push(block.clone());
        self.broadcast(&HubEvent::ReceiveBlock(block));
        Ok(Value::Null)
    }

    fn edit_block(&self, arguments: &[Value]) -> Result<Value, String> {
        let request: EditBlockRequest = arg(arguments, 0)?;
        let edited = {
            let mut blocks = self.blocks.lock().unwrap();
            let block = blocks
                .iter_mut()
                .find(|b| b.id == request.id)
                .ok_or_else(|| format!("Block {} not found", request.id))?;
            block.text = request.edited_text;
            block.edited_on = Some("2024-05-01T12:00:01".to_string());
            block.clone()
        };
        self.broadcast(&HubEvent::BlockEdited(edited));
        Ok(Value::Null)
    }

    fn create_document(&self, arguments: &[Value]) -> Result<Value, String> {
        let request: CreateDocumentRequest = arg(arguments, 0)?;
        let unknown: Vec<&str> = request
            .usernames
            .iter()
            .map(String::as_str)
            .filter(|name| !["alice", "bob"].contains(name))
            .collect();
        if !unknown.is_empty() {
            return Err(format!("Users not found: {}", unknown.join(", ")));
        }
        let document = quill_core::Document {
            id: self.next_id(),
            name: request.name,
            creator_id: 1,
        };
        self.roles.lock().unwrap().insert(document.id, DocumentRole::Creator);
        self.broadcast(&HubEvent::DocumentCreated(document));
        Ok(Value::Null)
    }

    fn send_block_image(&self, arguments: &[Value]) -> Result<Value, String> {
        let request: BlockImageRequest = arg(arguments, 0)?;
        let upload: FileUpload = arg(arguments, 1)?;
        let image = BlockImage {
            id: self.next_id(),
            url: format!("/images/{}", upload.file_name),
            block_id: request.block_id,
            uploaded_on: Some(request.uploaded_on),
            user_id: 1,
        };
        self.broadcast(&HubEvent::ReceiveBlockImage(image.clone()));
        Ok(json!({ "id": image.id, "url": image.url }))
    }
}

fn arg<T: DeserializeOwned>(arguments: &[Value], index: usize) -> Result<T, String> {
    let value = arguments
        .get(index)
        .ok_or_else(|| format!("missing argument {index}"))?;
    serde_json::from_value(value.clone()).map_err(|e| e.to_string())
}

async fn serve(stream: TcpStream, state: Arc<HubState>) {
    let authorize = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let expected = format!("access_token={TOKEN}");
        let authorized = request
            .uri()
            .query()
            .is_some_and(|query| query.split('&').any(|pair| pair == expected));
        if authorized {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("unauthorized".to_string()));
            *rejection.status_mut() = StatusCode::UNAUTHORIZED;
            Err(rejection)
        }
    };
    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, authorize).await else {
        return;
    };
    let Some(kill) = &state.kill else {
        return;
    };
    let mut kill = kill.subscribe();
    let (mut sink, mut source) = ws.split();

    let Some(Ok(Message::Text(text))) = source.next().await else {
        return;
    };
    let accepted = split_records(text.as_str())
        .next()
        .is_some_and(|record| decode_handshake_request(record).is_ok());
    let answer = if accepted {
        encode_handshake_response(None)
    } else {
        encode_handshake_response(Some("bad handshake"))
    };
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    if accepted {
        state.clients.lock().unwrap().push(tx.clone());
        state.handshakes.fetch_add(1, Ordering::SeqCst);
    }
    if sink.send(Message::text(answer)).await.is_err() || !accepted {
        return;
    }

    loop {
        tokio::select! {
            _ = kill.recv() => return,
            Some(record) = rx.recv() => {
                if sink.send(Message::text(record)).await.is_err() {
                    return;
                }
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    for record in split_records(text.as_str()) {
                        if let Ok(message) = HubMessage::decode(record) {
                            state.handle(message, &tx);
                        }
                    }
                }
                Some(Ok(_)) => {}
                _ => return,
            },
        }
    }
}

/// Await `rx` until `pick` accepts a value, failing the test after [`TIMEOUT`].
pub async fn wait_for<T: Clone, R>(
    rx: &mut broadcast::Receiver<T>,
    mut pick: impl FnMut(&T) -> Option<R>,
) -> R {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(value) => {
                    if let Some(found) = pick(&value) {
                        return found;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(e) => panic!("status stream ended: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for status")
}
