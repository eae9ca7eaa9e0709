//! Documents, membership roles, and document-list payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{DocumentId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    #[serde(default)]
    pub creator_id: UserId,
}

/// A participant's role in a document. Governs local mutability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentRole {
    Creator,
    Editor,
    Viewer,
}

impl DocumentRole {
    /// Whether local edits may be attempted at all under this role.
    pub fn can_edit(self) -> bool {
        matches!(self, Self::Creator | Self::Editor)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creator => "Creator",
            Self::Editor => "Editor",
            Self::Viewer => "Viewer",
        }
    }
}

impl fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document role: {0:?}")]
pub struct ParseRoleError(pub String);

impl FromStr for DocumentRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "creator" => Ok(Self::Creator),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// One entry of the "my documents" listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    pub document: Document,
    pub role: DocumentRole,
}

/// Payload of the `CreateDocument` invocation.
///
/// `usernames` and `roles` are parallel arrays: `roles[i]` is granted to
/// `usernames[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    pub name: String,
    pub usernames: Vec<String>,
    pub roles: Vec<DocumentRole>,
}

impl CreateDocumentRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a collaborator. Blank usernames are skipped.
    pub fn with_member(mut self, username: &str, role: DocumentRole) -> Self {
        let username = username.trim();
        if !username.is_empty() {
            self.usernames.push(username.to_string());
            self.roles.push(role);
        }
        self
    }
}
