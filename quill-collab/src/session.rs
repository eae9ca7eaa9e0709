//! One open document: store, focus, coalescer and event wiring.
//!
//! ```text
//!  ChannelManager ──handlers──► events mpsc ─┐
//!        │                                   ├─► next_update() ─► BlockStore
//!        └──status broadcast────────────────►┤         │
//!  EditCoalescer ──failures─────────────────►┘         └─► SessionUpdate
//! ```
//!
//! The session borrows the shared channel and never connects or disconnects
//! it. Handlers registered at open are removed at close (or drop), so only
//! one set of handlers per session exists. After `Reconnected` the whole
//! document is refetched, since pushes sent while the channel was down are
//! gone.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use quill_core::{
    Block, BlockId, BlockImage, BlockImageRequest, DocumentId, DocumentRole, FileUpload,
    SendBlockRequest,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

use crate::api::{ApiError, DocumentApi, EPOCH};
use crate::channel::{ChannelError, ChannelManager, ConnectionStatus, SubscriptionId};
use crate::coalescer::{EditCoalescer, FlushFailure};
use crate::events::{EventKind, HubEvent};
use crate::store::{BlockStore, StoreChange};

/// Wait between failed refetches when no reconnect delays are configured.
const RESYNC_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Events a session listens to.
const SESSION_EVENTS: [EventKind; 3] = [
    EventKind::ReceiveBlock,
    EventKind::BlockEdited,
    EventKind::ReceiveBlockImage,
];

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no access credential stored")]
    MissingCredential,
    #[error("document is read-only for role {0}")]
    ReadOnly(DocumentRole),
    #[error("block {0} is not in this document")]
    UnknownBlock(BlockId),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Something the UI should reflect.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Block(StoreChange),
    ImageAttached { block_id: BlockId, image: BlockImage },
    /// The document was refetched after a reconnect
    Reloaded { count: usize },
    ConnectionChanged(ConnectionStatus),
    /// A coalesced edit could not be sent; the local text was kept
    EditFailed(FlushFailure),
}

pub struct DocumentSession {
    document_id: DocumentId,
    channel: Arc<ChannelManager>,
    api: Arc<dyn DocumentApi>,
    store: BlockStore,
    images: Vec<BlockImage>,
    role: DocumentRole,
    focus: Option<BlockId>,
    coalescer: EditCoalescer,
    events_rx: mpsc::UnboundedReceiver<HubEvent>,
    status_rx: broadcast::Receiver<ConnectionStatus>,
    failures_rx: mpsc::UnboundedReceiver<FlushFailure>,
    subscriptions: Vec<(EventKind, SubscriptionId)>,
    /// Set by `Reconnected` (or lagged status); cleared once a refetch lands
    needs_reload: bool,
    /// Failed refetches since `needs_reload` was set
    reload_failures: usize,
}

impl DocumentSession {
    /// Open a document: subscribe to its pushes, then fetch its blocks and
    /// the user's role.
    ///
    /// A document missing from the user's listing opens read-only.
    pub async fn open(
        channel: Arc<ChannelManager>,
        api: Arc<dyn DocumentApi>,
        document_id: DocumentId,
    ) -> Result<Self, SessionError> {
        if !channel.credentials().has_credential() {
            return Err(SessionError::MissingCredential);
        }

        // Subscribe before fetching so nothing pushed in between is missed.
        // Replayed creations are no-ops and edits are full substitutions.
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let subscriptions: Vec<_> = SESSION_EVENTS
            .into_iter()
            .map(|kind| {
                let events_tx = events_tx.clone();
                let id = channel.subscribe(kind, move |event| {
                    if concerns_document(event, document_id) {
                        let _ = events_tx.send(event.clone());
                    }
                });
                (kind, id)
            })
            .collect();
        let status_rx = channel.subscribe_status();

        let mut coalescer = EditCoalescer::new(channel.clone(), channel.config().edit_quiet_period);
        let (_, failures_rx) = mpsc::unbounded_channel();
        let failures_rx = coalescer.take_failure_rx().unwrap_or(failures_rx);

        let mut session = Self {
            document_id,
            channel,
            api,
            store: BlockStore::new(),
            images: Vec::new(),
            role: DocumentRole::Viewer,
            focus: None,
            coalescer,
            events_rx,
            status_rx,
            failures_rx,
            subscriptions,
            needs_reload: false,
            reload_failures: 0,
        };
        // On error the drop impl removes the handlers again.
        let count = session.reload().await?;
        log::info!(
            "Opened document {document_id} ({count} blocks, role {})",
            session.role
        );
        Ok(session)
    }

    /// Refetch every block and the role. Returns the block count.
    ///
    /// Edits still waiting in the coalescer are laid back over the fetched
    /// copy, so text the user typed stays visible. Nothing changes until both
    /// fetches have completed.
    pub async fn reload(&mut self) -> Result<usize, SessionError> {
        let blocks = self.api.blocks_by_document(self.document_id, EPOCH).await?;
        let documents = self.api.my_documents().await?;

        self.role = match documents.iter().find(|d| d.document.id == self.document_id) {
            Some(entry) => entry.role,
            None => {
                log::warn!("Document {} not in listing; opening read-only", self.document_id);
                DocumentRole::Viewer
            }
        };

        self.store.load_initial(blocks);
        for block_id in self.coalescer.pending_ids() {
            if let Some(content) = self.coalescer.pending_content(block_id) {
                self.store.apply_local_edit(block_id, content);
            }
        }
        if self.focus.is_some_and(|id| !self.store.contains(id)) {
            self.focus = None;
        }
        let store = &self.store;
        self.images.retain(|image| store.contains(image.block_id));
        Ok(self.store.len())
    }

    /// Mark the block the user is working in. Unknown ids are ignored.
    pub fn focus(&mut self, block_id: BlockId) -> bool {
        if self.store.contains(block_id) {
            self.focus = Some(block_id);
            true
        } else {
            false
        }
    }

    pub fn clear_focus(&mut self) {
        self.focus = None;
    }

    /// Apply a local edit now and send it once typing pauses.
    pub fn edit_block(&mut self, block_id: BlockId, text: impl Into<String>) -> Result<StoreChange, SessionError> {
        self.require_edit()?;
        let text = text.into();
        let change = self.store.apply_local_edit(block_id, text.clone());
        if change.is_change() {
            self.coalescer.schedule(block_id, text);
        }
        Ok(change)
    }

    /// Ask the hub for a new empty block. It shows up through `ReceiveBlock`,
    /// placed after the focused block.
    pub async fn add_block(&self) -> Result<(), SessionError> {
        self.require_edit()?;
        let request = SendBlockRequest {
            text: String::new(),
            document_id: self.document_id,
        };
        self.channel.send_block(&request).await?;
        Ok(())
    }

    /// Upload an image and reference it from the end of the block's text.
    pub async fn attach_image(&mut self, block_id: BlockId, upload: FileUpload) -> Result<BlockImage, SessionError> {
        self.require_edit()?;
        if !self.store.contains(block_id) {
            return Err(SessionError::UnknownBlock(block_id));
        }

        let request = BlockImageRequest {
            block_id,
            url: String::new(),
            uploaded_on: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            user_id: 0,
        };
        let mut image = self.channel.send_block_image(&request, &upload).await?;
        image.block_id = block_id;
        self.record_image(image.clone());

        // The block may have been deleted while the upload was in flight.
        if let Some(block) = self.store.get(block_id) {
            let text = format!("{}\n{}", block.text, image.marker());
            self.edit_block(block_id, text)?;
        }
        Ok(image)
    }

    /// Apply one remote push. Returns `None` when it changed nothing.
    pub fn apply_event(&mut self, event: HubEvent) -> Option<SessionUpdate> {
        let change = match event {
            HubEvent::ReceiveBlock(block) if self.owns(&block) => {
                self.store.apply_remote_create(block, self.focus)
            }
            HubEvent::BlockEdited(block) if self.owns(&block) => {
                self.store.apply_remote_edit(block, self.focus)
            }
            HubEvent::ReceiveBlockImage(image) if self.store.contains(image.block_id) => {
                let block_id = image.block_id;
                return self
                    .record_image(image.clone())
                    .then_some(SessionUpdate::ImageAttached { block_id, image });
            }
            _ => StoreChange::Unchanged,
        };
        change.is_change().then_some(SessionUpdate::Block(change))
    }

    /// Wait for the next remote change, status change or failed edit and
    /// apply it. Returns `None` once the session can receive nothing more.
    ///
    /// Cancel-safe: a refetch owed after a reconnect survives the future
    /// being dropped and is retried by the next call.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            if self.needs_reload {
                return Some(self.resync().await);
            }
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    if let Some(update) = self.apply_event(event) {
                        return Some(update);
                    }
                }
                status = self.status_rx.recv() => match status {
                    Ok(ConnectionStatus::Reconnected) => self.mark_stale(),
                    Ok(status) => return Some(SessionUpdate::ConnectionChanged(status)),
                    Err(RecvError::Lagged(missed)) => {
                        log::warn!("Missed {missed} connection updates; resyncing");
                        self.mark_stale();
                    }
                    Err(RecvError::Closed) => return None,
                },
                Some(failure) = self.failures_rx.recv() => {
                    return Some(SessionUpdate::EditFailed(failure));
                }
                else => return None,
            }
        }
    }

    fn mark_stale(&mut self) {
        self.needs_reload = true;
        self.reload_failures = 0;
    }

    /// Refetch owed after a reconnect. A failed attempt waits out the
    /// channel's reconnect delay before the next one.
    async fn resync(&mut self) -> SessionUpdate {
        if self.reload_failures > 0 {
            let delays = &self.channel.config().reconnect_delays;
            let delay = delays
                .get(self.reload_failures - 1)
                .or(delays.last())
                .copied()
                .unwrap_or(RESYNC_RETRY_DELAY);
            tokio::time::sleep(delay).await;
        }
        match self.reload().await {
            Ok(count) => {
                self.needs_reload = false;
                self.reload_failures = 0;
                SessionUpdate::Reloaded { count }
            }
            Err(e) => {
                self.reload_failures += 1;
                log::warn!(
                    "Refetch of document {} failed (attempt {}): {e}",
                    self.document_id,
                    self.reload_failures
                );
                SessionUpdate::ConnectionChanged(ConnectionStatus::Reconnected)
            }
        }
    }

    /// Send pending edits, then detach from the channel.
    pub async fn close(mut self) {
        for block_id in self.coalescer.pending_ids() {
            if let Err(e) = self.coalescer.flush(block_id).await {
                log::warn!("Dropping unsent edit of block {block_id}: {e}");
            }
        }
        self.detach();
        log::info!("Closed document {}", self.document_id);
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.store
    }

    pub fn role(&self) -> DocumentRole {
        self.role
    }

    pub fn can_edit(&self) -> bool {
        self.role.can_edit()
    }

    pub fn focused(&self) -> Option<BlockId> {
        self.focus
    }

    pub fn images(&self) -> &[BlockImage] {
        &self.images
    }

    pub fn pending_edits(&self) -> usize {
        self.coalescer.pending_count()
    }

    fn owns(&self, block: &Block) -> bool {
        block.document_id == self.document_id
    }

    fn require_edit(&self) -> Result<(), SessionError> {
        if self.role.can_edit() {
            Ok(())
        } else {
            Err(SessionError::ReadOnly(self.role))
        }
    }

    /// Returns false for an image already known.
    fn record_image(&mut self, image: BlockImage) -> bool {
        if self.images.iter().any(|known| known.id == image.id) {
            return false;
        }
        self.images.push(image);
        true
    }

    fn detach(&mut self) {
        for (kind, id) in self.subscriptions.drain(..) {
            self.channel.unsubscribe(kind, id);
        }
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Image pushes carry no document id; they are matched against the store.
fn concerns_document(event: &HubEvent, document_id: DocumentId) -> bool {
    match event {
        HubEvent::ReceiveBlock(block) | HubEvent::BlockEdited(block) => block.document_id == document_id,
        HubEvent::ReceiveBlockImage(_) => true,
        _ => false,
    }
}
