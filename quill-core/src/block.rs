//! Blocks: the individually addressable units of document content.

use serde::{Deserialize, Serialize};

use crate::{BlockId, DocumentId, UserId};

/// A block of document content.
///
/// `id` and `document_id` never change once the server has assigned them.
/// `text` is opaque here: the editor stores serialized rich content in it.
/// The provenance fields are display metadata and play no part in merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    pub document_id: DocumentId,
    #[serde(default)]
    pub text: String,
    /// Author of the block
    #[serde(default)]
    pub user_id: UserId,
    #[serde(default)]
    pub sent_on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_on: Option<String>,
}

impl Block {
    pub fn new(id: BlockId, document_id: DocumentId, text: impl Into<String>) -> Self {
        Self {
            id,
            document_id,
            text: text.into(),
            user_id: 0,
            sent_on: String::new(),
            edited_on: None,
        }
    }

    /// Set the author, for building fixtures.
    pub fn with_author(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }
}

/// Payload of the `SendBlock` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBlockRequest {
    pub text: String,
    pub document_id: DocumentId,
}

/// Payload of the `EditBlock` invocation. Always carries the whole block text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditBlockRequest {
    pub id: BlockId,
    pub edited_text: String,
}

/// First argument of the `SendBlockImage` invocation.
///
/// The server overwrites `url` and `user_id`; clients send placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockImageRequest {
    pub block_id: BlockId,
    pub url: String,
    pub uploaded_on: String,
    pub user_id: UserId,
}

/// Second argument of the `SendBlockImage` invocation.
///
/// `content` serializes as a JSON array of byte values, which is what the
/// hub's binder expects (not base64).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// An uploaded image attached to a block.
///
/// The `SendBlockImage` reply only carries `id` and `url`; the
/// `ReceiveBlockImage` broadcast carries the full descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockImage {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub block_id: BlockId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_on: Option<String>,
    #[serde(default)]
    pub user_id: UserId,
}

impl BlockImage {
    /// Inline marker the editor embeds in block text to reference this image.
    pub fn marker(&self) -> String {
        format!("[image:{}]", self.id)
    }
}
