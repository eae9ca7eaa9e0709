//! # quill-collab: Client synchronization core for Quill
//!
//! Keeps a local, ordered block list consistent with a shared server copy
//! while several users edit the same document.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   JSON hub protocol   ┌─────────────┐
//! │ ChannelManager │ ◄───────────────────► │ Document    │
//! │ (one per app)  │      WebSocket        │ Hub         │
//! └───────┬────────┘                       └─────────────┘
//!         │ events / invocations
//!         ▼
//! ┌────────────────┐   coalesced edits   ┌───────────────┐
//! │ DocumentSession│ ──────────────────► │ EditCoalescer │
//! │ (per document) │                     └───────────────┘
//! └───────┬────────┘
//!         │ apply_* (local + remote)      ┌───────────────┐
//!         └─────────────────────────────► │ BlockStore    │
//!                                         └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Hub wire records (handshake, invocation, completion)
//! - [`events`]: Typed hub methods and server pushes
//! - [`channel`]: Persistent connection with reconnect and dispatch
//! - [`store`]: Ordered block collection and reconciliation
//! - [`coalescer`]: Per-block debouncing of outbound edits
//! - [`session`]: One open document wired to the above
//! - [`directory`]: The user's document listing
//! - [`api`]: REST reads used to bootstrap sessions
//! - [`config`], [`credentials`]: Client settings and the access token

pub mod api;
pub mod channel;
pub mod coalescer;
pub mod config;
pub mod credentials;
pub mod directory;
pub mod events;
pub mod protocol;
pub mod session;
pub mod store;

// Re-exports for convenience
pub use api::{ApiError, DocumentApi, HttpDocumentApi, EPOCH};
pub use channel::{
    ChannelError, ChannelManager, ConnectFailure, ConnectionState, ConnectionStatus, SubscriptionId,
};
pub use coalescer::{EditCoalescer, EditSink, FlushFailure};
pub use config::ClientConfig;
pub use credentials::{CredentialError, CredentialStore, Credentials};
pub use directory::DocumentDirectory;
pub use events::{EventKind, HubEvent, HubMethod};
pub use protocol::{HubMessage, MessageType, ProtocolError};
pub use session::{DocumentSession, SessionError, SessionUpdate};
pub use store::{BlockStore, StoreChange};
