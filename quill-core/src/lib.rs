//! Shared data model for the Quill collaborative block editor.
//!
//! These are the shapes exchanged with the collaboration hub and the REST
//! API. Field names serialize in camelCase to match the server contract.

pub mod block;
pub mod document;

pub use block::{Block, BlockImage, BlockImageRequest, EditBlockRequest, FileUpload, SendBlockRequest};
pub use document::{CreateDocumentRequest, Document, DocumentRole, ParseRoleError, UserDocument};

/// Server-assigned block identifier.
pub type BlockId = i64;

/// Server-assigned document identifier.
pub type DocumentId = i64;

/// Server-assigned user identifier.
pub type UserId = i64;
