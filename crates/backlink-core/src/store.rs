use crate::tree::{Document, NodeRef};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// The collaborator that owns and persists documents.
///
/// Failures are opaque: callers only learn that an operation did not succeed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fresh read of one document. `Ok(None)` when it does not exist.
    async fn fetch_one(&self, document_id: &str) -> anyhow::Result<Option<Document>>;

    async fn list_all(&self) -> anyhow::Result<Vec<Document>>;

    /// Replace a document's content.
    async fn persist(&self, document_id: &str, root: Vec<NodeRef>) -> anyhow::Result<()>;

    async fn set_title(&self, document_id: &str, title: &str) -> anyhow::Result<()>;

    /// Delete a document. Deleting a missing document is a no-op.
    async fn remove(&self, document_id: &str) -> anyhow::Result<()>;

    /// Previously read listings and content may be stale.
    fn invalidate(&self);
}

/// In-process document store.
///
/// Readers get cheap clones: node trees are shared, never copied.
pub struct MemoryStore {
    documents: DashMap<String, Document>,
    generation: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let store = Self::new();
        for document in documents {
            store.insert(document);
        }
        store
    }

    /// Insert or replace a document by id.
    pub fn insert(&self, document: Document) {
        self.documents.insert(document.id.clone(), document);
    }

    pub fn get(&self, document_id: &str) -> Option<Document> {
        self.documents.get(document_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// All documents, ordered by id.
    pub fn snapshot(&self) -> Vec<Document> {
        let mut documents: Vec<Document> = self
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        documents
    }

    /// Number of times `invalidate` has been signalled.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_one(&self, document_id: &str) -> anyhow::Result<Option<Document>> {
        Ok(self.get(document_id))
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Document>> {
        Ok(self.snapshot())
    }

    async fn persist(&self, document_id: &str, root: Vec<NodeRef>) -> anyhow::Result<()> {
        let mut entry = self
            .documents
            .get_mut(document_id)
            .ok_or_else(|| anyhow::anyhow!("cannot persist missing document {}", document_id))?;
        entry.root = root;
        Ok(())
    }

    async fn set_title(&self, document_id: &str, title: &str) -> anyhow::Result<()> {
        let mut entry = self
            .documents
            .get_mut(document_id)
            .ok_or_else(|| anyhow::anyhow!("cannot rename missing document {}", document_id))?;
        entry.title = title.to_string();
        Ok(())
    }

    async fn remove(&self, document_id: &str) -> anyhow::Result<()> {
        self.documents.remove(document_id);
        Ok(())
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
