//! Per-block coalescing of outbound edits.
//!
//! Every local change to a block overwrites that block's pending content and
//! restarts its quiet-period timer. Only when the timer runs out is a single
//! `EditBlock` with the latest content sent. Blocks coalesce independently.
//!
//! ```text
//!  "a"   "ab"   "abc"                 quiet period
//!   │     │      │ ◄───────────────────────────────► │
//!   ▼     ▼      ▼                                   ▼
//!  restart restart restart                  EditBlock{id, "abc"}
//! ```
//!
//! A failed send is not retried: it is logged and reported on the failure
//! channel, and the optimistic text in the block store stays as typed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use quill_core::{BlockId, EditBlockRequest};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::{ChannelError, ChannelManager};

/// Destination of coalesced edits.
#[async_trait]
pub trait EditSink: Send + Sync {
    async fn edit_block(&self, request: EditBlockRequest) -> Result<(), ChannelError>;
}

#[async_trait]
impl EditSink for ChannelManager {
    async fn edit_block(&self, request: EditBlockRequest) -> Result<(), ChannelError> {
        ChannelManager::edit_block(self, &request).await
    }
}

/// A coalesced send that did not go through.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushFailure {
    pub block_id: BlockId,
    pub content: String,
    pub error: ChannelError,
}

struct PendingEdit {
    latest_content: String,
    generation: u64,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct PendingTable {
    edits: HashMap<BlockId, PendingEdit>,
    next_generation: u64,
}

impl PendingTable {
    /// Remove the entry only if it still belongs to the timer that fired.
    fn take_if_current(&mut self, block_id: BlockId, generation: u64) -> Option<String> {
        let current = self
            .edits
            .get(&block_id)
            .is_some_and(|pending| pending.generation == generation);
        if current {
            self.edits.remove(&block_id).map(|p| p.latest_content)
        } else {
            None
        }
    }
}

fn lock(table: &Mutex<PendingTable>) -> MutexGuard<'_, PendingTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Debounces local edits per block in front of an [`EditSink`].
///
/// Must be used inside a tokio runtime; timers are spawned tasks.
pub struct EditCoalescer {
    sink: Arc<dyn EditSink>,
    quiet_period: Duration,
    pending: Arc<Mutex<PendingTable>>,
    failure_tx: mpsc::UnboundedSender<FlushFailure>,
    failure_rx: Option<mpsc::UnboundedReceiver<FlushFailure>>,
}

impl EditCoalescer {
    pub fn new(sink: Arc<dyn EditSink>, quiet_period: Duration) -> Self {
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        Self {
            sink,
            quiet_period,
            pending: Arc::new(Mutex::new(PendingTable::default())),
            failure_tx,
            failure_rx: Some(failure_rx),
        }
    }

    /// Take the failure receiver (can only be called once).
    pub fn take_failure_rx(&mut self) -> Option<mpsc::UnboundedReceiver<FlushFailure>> {
        self.failure_rx.take()
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Record a local change and (re)start the block's quiet-period timer.
    pub fn schedule(&self, block_id: BlockId, content: impl Into<String>) {
        let mut table = lock(&self.pending);
        table.next_generation += 1;
        let generation = table.next_generation;

        if let Some(previous) = table.edits.remove(&block_id) {
            previous.timer.abort();
        }

        let timer = tokio::spawn(fire_after(
            self.quiet_period,
            block_id,
            generation,
            self.pending.clone(),
            self.sink.clone(),
            self.failure_tx.clone(),
        ));
        table.edits.insert(
            block_id,
            PendingEdit {
                latest_content: content.into(),
                generation,
                timer,
            },
        );
    }

    /// Send a block's pending content now instead of waiting.
    ///
    /// Returns `Ok(false)` when nothing was pending for the block.
    pub async fn flush(&self, block_id: BlockId) -> Result<bool, ChannelError> {
        let pending = lock(&self.pending).edits.remove(&block_id);
        let Some(pending) = pending else {
            return Ok(false);
        };
        pending.timer.abort();
        self.sink
            .edit_block(EditBlockRequest {
                id: block_id,
                edited_text: pending.latest_content,
            })
            .await?;
        Ok(true)
    }

    /// Drop a block's pending edit without sending it.
    pub fn cancel(&self, block_id: BlockId) -> bool {
        match lock(&self.pending).edits.remove(&block_id) {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Drop every pending edit. Returns how many were discarded.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingEdit> = lock(&self.pending).edits.drain().map(|(_, p)| p).collect();
        for pending in &drained {
            pending.timer.abort();
        }
        drained.len()
    }

    pub fn has_pending(&self, block_id: BlockId) -> bool {
        lock(&self.pending).edits.contains_key(&block_id)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).edits.len()
    }

    pub fn pending_ids(&self) -> Vec<BlockId> {
        lock(&self.pending).edits.keys().copied().collect()
    }

    pub fn pending_content(&self, block_id: BlockId) -> Option<String> {
        lock(&self.pending)
            .edits
            .get(&block_id)
            .map(|p| p.latest_content.clone())
    }
}

impl Drop for EditCoalescer {
    fn drop(&mut self) {
        let discarded = self.cancel_all();
        if discarded > 0 {
            log::debug!("Discarded {discarded} pending edits on teardown");
        }
    }
}

async fn fire_after(
    quiet_period: Duration,
    block_id: BlockId,
    generation: u64,
    pending: Arc<Mutex<PendingTable>>,
    sink: Arc<dyn EditSink>,
    failure_tx: mpsc::UnboundedSender<FlushFailure>,
) {
    tokio::time::sleep(quiet_period).await;

    let Some(content) = lock(&pending).take_if_current(block_id, generation) else {
        return;
    };

    let request = EditBlockRequest {
        id: block_id,
        edited_text: content.clone(),
    };
    if let Err(error) = sink.edit_block(request).await {
        log::warn!("Coalesced edit of block {block_id} failed: {error}");
        let _ = failure_tx.send(FlushFailure {
            block_id,
            content,
            error,
        });
    }
}
