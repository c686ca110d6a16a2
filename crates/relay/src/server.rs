use anyhow::{Context, Result};
use backlink_core::{BacklinkService, Document, MemoryStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// On-disk shape of the document collection snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Collection {
    pub documents: Vec<Document>,
}

/// Shared state behind every tool call.
pub struct Server {
    backlinks: BacklinkService<MemoryStore>,
    collection_path: PathBuf,
    write_back: bool,
}

impl Server {
    pub fn new(documents: Vec<Document>, collection_path: PathBuf, write_back: bool) -> Arc<Self> {
        let store = Arc::new(MemoryStore::from_documents(documents));
        Arc::new(Self {
            backlinks: BacklinkService::new(store),
            collection_path,
            write_back,
        })
    }

    /// Load the collection snapshot at `collection_path`.
    pub async fn load(collection_path: &Path, write_back: bool) -> Result<Arc<Self>> {
        let content = fs::read_to_string(collection_path)
            .await
            .with_context(|| format!("Failed to read collection {:?}", collection_path))?;
        let collection: Collection = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse collection {:?}", collection_path))?;
        tracing::info!(
            "Loaded {} documents from {:?}",
            collection.documents.len(),
            collection_path
        );
        Ok(Self::new(
            collection.documents,
            collection_path.to_path_buf(),
            write_back,
        ))
    }

    pub fn backlinks(&self) -> &BacklinkService<MemoryStore> {
        &self.backlinks
    }

    pub fn store(&self) -> &MemoryStore {
        self.backlinks.store()
    }

    pub fn title_of(&self, document_id: &str) -> Option<String> {
        self.store().get(document_id).map(|doc| doc.title)
    }

    /// Write the current collection back to disk, if enabled.
    ///
    /// Writes to a sibling temp file first so a crash never leaves a torn snapshot.
    pub async fn save(&self) -> Result<()> {
        if !self.write_back {
            tracing::debug!("write_back disabled, not saving {:?}", self.collection_path);
            return Ok(());
        }

        let collection = Collection {
            documents: self.store().snapshot(),
        };
        let content = serde_json::to_string_pretty(&collection)?;
        let tmp_path = self.collection_path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        fs::rename(&tmp_path, &self.collection_path)
            .await
            .with_context(|| format!("Failed to replace {:?}", self.collection_path))?;

        tracing::info!(
            "Saved {} documents to {:?} (generation {})",
            collection.documents.len(),
            self.collection_path,
            self.store().generation()
        );
        Ok(())
    }
}
