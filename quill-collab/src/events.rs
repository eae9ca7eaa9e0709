//! Hub method names and typed server-push events.

use std::fmt;

use quill_core::{Block, BlockImage, Document, DocumentId, UserId};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::protocol::ProtocolError;

/// Methods the client invokes on the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HubMethod {
    CreateDocument,
    DeleteDocument,
    SendBlock,
    EditBlock,
    SendBlockImage,
}

impl HubMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateDocument => "CreateDocument",
            Self::DeleteDocument => "DeleteDocument",
            Self::SendBlock => "SendBlock",
            Self::EditBlock => "EditBlock",
            Self::SendBlockImage => "SendBlockImage",
        }
    }
}

impl fmt::Display for HubMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of events the hub pushes. Subscriptions are keyed by these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DocumentCreated,
    DocumentDeleted,
    AddedToDocument,
    ReceiveBlock,
    BlockEdited,
    ReceiveBlockImage,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        Self::DocumentCreated,
        Self::DocumentDeleted,
        Self::AddedToDocument,
        Self::ReceiveBlock,
        Self::BlockEdited,
        Self::ReceiveBlockImage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DocumentCreated => "DocumentCreated",
            Self::DocumentDeleted => "DocumentDeleted",
            Self::AddedToDocument => "AddedToDocument",
            Self::ReceiveBlock => "ReceiveBlock",
            Self::BlockEdited => "BlockEdited",
            Self::ReceiveBlockImage => "ReceiveBlockImage",
        }
    }

    /// Hub method names are matched case-insensitively.
    pub fn from_target(target: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(target))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed server push.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    DocumentCreated(Document),
    DocumentDeleted(DocumentId),
    AddedToDocument(Vec<UserId>),
    ReceiveBlock(Block),
    BlockEdited(Block),
    ReceiveBlockImage(BlockImage),
}

impl HubEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::DocumentCreated(_) => EventKind::DocumentCreated,
            Self::DocumentDeleted(_) => EventKind::DocumentDeleted,
            Self::AddedToDocument(_) => EventKind::AddedToDocument,
            Self::ReceiveBlock(_) => EventKind::ReceiveBlock,
            Self::BlockEdited(_) => EventKind::BlockEdited,
            Self::ReceiveBlockImage(_) => EventKind::ReceiveBlockImage,
        }
    }

    /// Decode a pushed invocation. Unknown targets yield `Ok(None)`.
    pub fn decode(target: &str, arguments: &[Value]) -> Result<Option<Self>, ProtocolError> {
        let Some(kind) = EventKind::from_target(target) else {
            return Ok(None);
        };

        let event = match kind {
            EventKind::DocumentCreated => Self::DocumentCreated(first_arg(kind, arguments)?),
            EventKind::DocumentDeleted => Self::DocumentDeleted(first_arg(kind, arguments)?),
            EventKind::AddedToDocument => Self::AddedToDocument(first_arg(kind, arguments)?),
            EventKind::ReceiveBlock => Self::ReceiveBlock(first_arg(kind, arguments)?),
            EventKind::BlockEdited => Self::BlockEdited(first_arg(kind, arguments)?),
            EventKind::ReceiveBlockImage => Self::ReceiveBlockImage(first_arg(kind, arguments)?),
        };
        Ok(Some(event))
    }

    /// Encode as `(target, arguments)`; used by test hubs and tooling.
    pub fn encode(&self) -> Result<(&'static str, Vec<Value>), ProtocolError> {
        let arg = match self {
            Self::DocumentCreated(doc) => serde_json::to_value(doc),
            Self::DocumentDeleted(id) => serde_json::to_value(id),
            Self::AddedToDocument(ids) => serde_json::to_value(ids),
            Self::ReceiveBlock(block) | Self::BlockEdited(block) => serde_json::to_value(block),
            Self::ReceiveBlockImage(image) => serde_json::to_value(image),
        }
        .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        Ok((self.kind().as_str(), vec![arg]))
    }
}

fn first_arg<T: DeserializeOwned>(kind: EventKind, arguments: &[Value]) -> Result<T, ProtocolError> {
    let invalid = |reason: String| ProtocolError::InvalidArguments {
        target: kind.as_str().to_string(),
        reason,
    };
    let value = arguments
        .first()
        .ok_or_else(|| invalid("expected one argument".to_string()))?;
    serde_json::from_value(value.clone()).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_block_events() {
        let args = vec![json!({ "id": 5, "documentId": 1, "text": "a" })];
        assert_eq!(
            HubEvent::decode("ReceiveBlock", &args).unwrap(),
            Some(HubEvent::ReceiveBlock(Block::new(5, 1, "a")))
        );
        assert_eq!(
            HubEvent::decode("blockedited", &args).unwrap(),
            Some(HubEvent::BlockEdited(Block::new(5, 1, "a")))
        );
    }

    #[test]
    fn test_decode_document_deleted() {
        assert_eq!(
            HubEvent::decode("DocumentDeleted", &[json!(12)]).unwrap(),
            Some(HubEvent::DocumentDeleted(12))
        );
    }

    #[test]
    fn test_unknown_target_ignored() {
        assert_eq!(HubEvent::decode("UserTyping", &[json!(1)]).unwrap(), None);
    }

    #[test]
    fn test_bad_arguments_rejected() {
        assert!(HubEvent::decode("ReceiveBlock", &[]).is_err());
        assert!(HubEvent::decode("ReceiveBlock", &[json!("nope")]).is_err());
    }

    #[test]
    fn test_encode_matches_decode() {
        let event = HubEvent::AddedToDocument(vec![1, 2]);
        let (target, args) = event.encode().unwrap();
        assert_eq!(target, "AddedToDocument");
        assert_eq!(HubEvent::decode(target, &args).unwrap(), Some(event));
    }

    #[test]
    fn test_method_names() {
        assert_eq!(HubMethod::SendBlockImage.to_string(), "SendBlockImage");
        assert_eq!(EventKind::from_target("ReceiveBlockImage"), Some(EventKind::ReceiveBlockImage));
    }
}
