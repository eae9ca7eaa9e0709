//! Document-list scope: the documents this user can open, with roles.

use indexmap::IndexMap;
use quill_core::{Document, DocumentId, DocumentRole, UserDocument};

use crate::events::HubEvent;

/// The user's documents in listing order.
#[derive(Debug, Clone, Default)]
pub struct DocumentDirectory {
    entries: IndexMap<DocumentId, UserDocument>,
}

impl DocumentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listing with a fresh `my documents` result.
    pub fn load(&mut self, entries: impl IntoIterator<Item = UserDocument>) {
        self.entries.clear();
        for entry in entries {
            self.entries.entry(entry.document.id).or_insert(entry);
        }
    }

    /// `DocumentCreated` is only pushed to the creator, so the new entry
    /// carries the Creator role. Returns false on a duplicate delivery.
    pub fn apply_created(&mut self, document: Document) -> bool {
        if self.entries.contains_key(&document.id) {
            return false;
        }
        self.entries.insert(
            document.id,
            UserDocument {
                document,
                role: DocumentRole::Creator,
            },
        );
        true
    }

    pub fn remove_document(&mut self, id: DocumentId) -> Option<UserDocument> {
        self.entries.shift_remove(&id)
    }

    /// Apply a document-list event. Returns whether the listing changed.
    pub fn apply_event(&mut self, event: &HubEvent) -> bool {
        match event {
            HubEvent::DocumentCreated(document) => self.apply_created(document.clone()),
            HubEvent::DocumentDeleted(id) => self.remove_document(*id).is_some(),
            _ => false,
        }
    }

    pub fn role_of(&self, id: DocumentId) -> Option<DocumentRole> {
        self.entries.get(&id).map(|entry| entry.role)
    }

    pub fn get(&self, id: DocumentId) -> Option<&UserDocument> {
        self.entries.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserDocument> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
