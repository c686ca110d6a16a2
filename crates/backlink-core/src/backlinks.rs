use crate::error::{BacklinkError, DocumentFailure};
use crate::link_matcher::{find_linked_matches, find_outgoing_links, find_unlinked_matches, Match};
use crate::link_rewriter::{retitle_links, unwrap_links};
use crate::store::DocumentStore;
use crate::tree::{Document, NodeRef};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;

/// A document that refers to the queried one, with every place it does so.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backlink {
    pub document_id: String,
    pub title: String,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Backlinks {
    /// Documents holding explicit links to the queried document.
    pub linked: Vec<Backlink>,
    /// Documents mentioning the queried document's title in plain text.
    pub unlinked: Vec<Backlink>,
}

/// A document the queried one links to. `title` is `None` for dangling links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardLink {
    pub target_id: String,
    pub title: Option<String>,
    pub matches: Vec<Match>,
}

/// Outcome of a successful rename or delete propagation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Backlinked documents rewritten and persisted.
    pub updated: usize,
    /// Backlinked documents gone by the time they were re-fetched.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Pure computation over a collection
// ---------------------------------------------------------------------------

/// Linked and unlinked backlinks of `document_id` across `collection`.
///
/// Unlinked mentions are searched with the queried document's title, skipping
/// the document itself and any document carrying the exact same title. When
/// the queried document is not in the collection, `unlinked` is empty.
pub fn compute_backlinks(collection: &[Document], document_id: &str) -> Backlinks {
    let linked = linked_backlinks(collection, document_id);

    let Some(title) = collection
        .iter()
        .find(|doc| doc.id == document_id)
        .map(|doc| doc.title.as_str())
    else {
        return Backlinks {
            linked,
            unlinked: Vec::new(),
        };
    };

    let unlinked = collection
        .iter()
        .filter(|doc| doc.id != document_id && doc.title != title)
        .filter_map(|doc| backlink(doc, find_unlinked_matches(&doc.root, title)))
        .collect();

    Backlinks { linked, unlinked }
}

fn linked_backlinks(collection: &[Document], document_id: &str) -> Vec<Backlink> {
    collection
        .iter()
        .filter_map(|doc| backlink(doc, find_linked_matches(&doc.root, document_id)))
        .collect()
}

fn backlink(doc: &Document, matches: Vec<Match>) -> Option<Backlink> {
    if matches.is_empty() {
        return None;
    }
    Some(Backlink {
        document_id: doc.id.clone(),
        title: doc.title.clone(),
        matches,
    })
}

/// Outgoing links of `document`, grouped by target in first-occurrence order.
fn forward_links(collection: &[Document], document: &Document) -> Vec<ForwardLink> {
    let mut grouped: Vec<ForwardLink> = Vec::new();
    for link in find_outgoing_links(&document.root) {
        if let Some(existing) = grouped.iter_mut().find(|g| g.target_id == link.target_id) {
            existing.matches.push(link.found);
            continue;
        }
        let title = collection
            .iter()
            .find(|doc| doc.id == link.target_id)
            .map(|doc| doc.title.clone());
        grouped.push(ForwardLink {
            target_id: link.target_id,
            title,
            matches: vec![link.found],
        });
    }
    grouped
}

// ---------------------------------------------------------------------------
// Propagation against a document store
// ---------------------------------------------------------------------------

enum Refreshed {
    Persisted,
    Missing,
}

pub struct BacklinkService<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> BacklinkService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn get_backlinks(&self, document_id: &str) -> Result<Backlinks, BacklinkError> {
        let collection = self.store.list_all().await.map_err(BacklinkError::Store)?;
        let backlinks = compute_backlinks(&collection, document_id);
        tracing::debug!(
            "Doc {}: {} linked, {} unlinked backlink(s) across {} documents",
            document_id,
            backlinks.linked.len(),
            backlinks.unlinked.len(),
            collection.len()
        );
        Ok(backlinks)
    }

    pub async fn forward_links(&self, document_id: &str) -> Result<Vec<ForwardLink>, BacklinkError> {
        let collection = self.store.list_all().await.map_err(BacklinkError::Store)?;
        let document = collection
            .iter()
            .find(|doc| doc.id == document_id)
            .ok_or_else(|| BacklinkError::NotFound(document_id.to_string()))?;
        Ok(forward_links(&collection, document))
    }

    /// Rename a document and retitle every link pointing at it.
    pub async fn rename_and_propagate(
        &self,
        document_id: &str,
        new_title: &str,
    ) -> Result<PropagationReport, BacklinkError> {
        let collection = self.store.list_all().await.map_err(BacklinkError::Store)?;
        let document = collection
            .iter()
            .find(|doc| doc.id == document_id)
            .ok_or_else(|| BacklinkError::NotFound(document_id.to_string()))?;
        tracing::info!(
            "Rename {} -> {} (doc {})",
            document.title,
            new_title,
            document_id
        );

        let linked = linked_backlinks(&collection, document_id);
        self.store
            .set_title(document_id, new_title)
            .await
            .map_err(BacklinkError::Store)?;
        self.propagate_rename(&linked, document_id, new_title).await
    }

    /// Delete a document and unwrap every link pointing at it.
    pub async fn delete_and_propagate(&self, document_id: &str) -> Result<PropagationReport, BacklinkError> {
        let collection = self.store.list_all().await.map_err(BacklinkError::Store)?;
        if !collection.iter().any(|doc| doc.id == document_id) {
            return Err(BacklinkError::NotFound(document_id.to_string()));
        }
        tracing::info!("Delete doc {}", document_id);

        let linked = linked_backlinks(&collection, document_id);
        self.store
            .remove(document_id)
            .await
            .map_err(BacklinkError::Store)?;
        self.propagate_deletion(&linked, document_id).await
    }

    /// Retitle links to `document_id` in each backlinked document.
    ///
    /// Each document is re-fetched and re-matched first; the matches in
    /// `linked` only say which documents to visit.
    pub async fn propagate_rename(
        &self,
        linked: &[Backlink],
        document_id: &str,
        new_title: &str,
    ) -> Result<PropagationReport, BacklinkError> {
        self.propagate(linked, "rename", |fresh: &Document| {
            let matches = find_linked_matches(&fresh.root, document_id);
            retitle_links(&fresh.root, document_id, &matches, new_title)
        })
        .await
    }

    /// Unwrap links to `document_id` in each backlinked document.
    pub async fn propagate_deletion(
        &self,
        linked: &[Backlink],
        document_id: &str,
    ) -> Result<PropagationReport, BacklinkError> {
        self.propagate(linked, "delete", |fresh: &Document| {
            unwrap_links(&fresh.root, document_id)
        })
        .await
    }

    /// Run fetch -> rewrite -> persist for every backlinked document concurrently.
    ///
    /// All sequences run to completion; a failure in one does not stop or roll
    /// back the others. The store is invalidated once they have all settled.
    async fn propagate<F>(
        &self,
        linked: &[Backlink],
        action: &str,
        rewrite: F,
    ) -> Result<PropagationReport, BacklinkError>
    where
        F: Fn(&Document) -> Vec<NodeRef> + Sync,
    {
        tracing::info!(
            "Propagating {} to {} backlinked document(s)",
            action,
            linked.len()
        );

        let sequences = linked
            .iter()
            .map(|backlink| self.refresh_one(&backlink.document_id, &rewrite));
        let outcomes = join_all(sequences).await;

        self.store.invalidate();

        let mut report = PropagationReport::default();
        let mut failures = Vec::new();
        for (backlink, outcome) in linked.iter().zip(outcomes) {
            match outcome {
                Ok(Refreshed::Persisted) => report.updated += 1,
                Ok(Refreshed::Missing) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(
                        "Failed to {} links in {}: {:?}",
                        action,
                        backlink.document_id,
                        e
                    );
                    failures.push(DocumentFailure {
                        document_id: backlink.document_id.clone(),
                        source: e,
                    });
                }
            }
        }

        tracing::info!(
            "Propagated {}: {} updated, {} skipped, {} failed",
            action,
            report.updated,
            report.skipped,
            failures.len()
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(BacklinkError::PersistFailure {
                attempted: linked.len(),
                failures,
                report,
            })
        }
    }

    // The document may change between fetch and persist; such a write is lost.
    async fn refresh_one<F>(&self, document_id: &str, rewrite: &F) -> anyhow::Result<Refreshed>
    where
        F: Fn(&Document) -> Vec<NodeRef> + Sync,
    {
        let Some(fresh) = self.store.fetch_one(document_id).await? else {
            tracing::debug!("Backlinked doc {} no longer exists, skipping", document_id);
            return Ok(Refreshed::Missing);
        };
        let root = rewrite(&fresh);
        self.store.persist(document_id, root).await?;
        Ok(Refreshed::Persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tree::{resolve, Node};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Barrier;

    fn paragraph(children: Vec<Node>) -> Node {
        Node::element("paragraph", children)
    }

    /// Document whose single paragraph reads "See <title> for details." with a bound link.
    fn linking_doc(id: &str, title: &str, target_id: &str, link_text: &str) -> Document {
        Document::new(
            id,
            title,
            vec![paragraph(vec![
                Node::text("See "),
                Node::link(target_id, link_text, true, vec![Node::text(link_text)]),
                Node::text(" for details."),
            ])],
        )
    }

    fn plain_doc(id: &str, title: &str, text: &str) -> Document {
        Document::new(id, title, vec![paragraph(vec![Node::text(text)])])
    }

    fn service(documents: Vec<Document>) -> BacklinkService<MemoryStore> {
        BacklinkService::new(Arc::new(MemoryStore::from_documents(documents)))
    }

    /// Wraps a MemoryStore and fails `persist` for the configured ids.
    ///
    /// Optionally fails `fetch_one` for other ids, and can hold every fetch
    /// on a barrier until that many fetches are in flight.
    struct FlakyStore {
        inner: MemoryStore,
        failing: HashSet<String>,
        failing_fetch: HashSet<String>,
        fetch_barrier: Option<Barrier>,
        persisted: Mutex<Vec<String>>,
    }

    impl FlakyStore {
        fn new(documents: Vec<Document>, failing: &[&str]) -> Self {
            Self {
                inner: MemoryStore::from_documents(documents),
                failing: failing.iter().map(|s| s.to_string()).collect(),
                failing_fetch: HashSet::new(),
                fetch_barrier: None,
                persisted: Mutex::new(Vec::new()),
            }
        }

        fn with_failing_fetch(mut self, ids: &[&str]) -> Self {
            self.failing_fetch = ids.iter().map(|s| s.to_string()).collect();
            self
        }

        fn with_fetch_barrier(mut self, parties: usize) -> Self {
            self.fetch_barrier = Some(Barrier::new(parties));
            self
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn fetch_one(&self, document_id: &str) -> anyhow::Result<Option<Document>> {
            if let Some(barrier) = &self.fetch_barrier {
                barrier.wait().await;
            }
            if self.failing_fetch.contains(document_id) {
                anyhow::bail!("connection reset");
            }
            self.inner.fetch_one(document_id).await
        }

        async fn list_all(&self) -> anyhow::Result<Vec<Document>> {
            self.inner.list_all().await
        }

        async fn persist(&self, document_id: &str, root: Vec<NodeRef>) -> anyhow::Result<()> {
            if self.failing.contains(document_id) {
                anyhow::bail!("disk full");
            }
            self.persisted.lock().unwrap().push(document_id.to_string());
            self.inner.persist(document_id, root).await
        }

        async fn set_title(&self, document_id: &str, title: &str) -> anyhow::Result<()> {
            self.inner.set_title(document_id, title).await
        }

        async fn remove(&self, document_id: &str) -> anyhow::Result<()> {
            self.inner.remove(document_id).await
        }

        fn invalidate(&self) {
            self.inner.invalidate()
        }
    }

    // === compute_backlinks ===

    #[test]
    fn linked_backlinks_only_include_documents_with_matches() {
        let collection = vec![
            Document::new("target", "Target", vec![]),
            linking_doc("a", "Source A", "target", "Target"),
            plain_doc("b", "Source B", "nothing here"),
            linking_doc("c", "Source C", "elsewhere", "Elsewhere"),
        ];
        let backlinks = compute_backlinks(&collection, "target");
        assert_eq!(backlinks.linked.len(), 1);
        assert_eq!(backlinks.linked[0].document_id, "a");
        assert_eq!(backlinks.linked[0].title, "Source A");
        assert_eq!(backlinks.linked[0].matches[0].context, "See Target for details.");
    }

    #[test]
    fn unlinked_backlinks_use_queried_title() {
        let collection = vec![
            plain_doc("cats", "Cats", "about felines"),
            plain_doc("b", "Diary", "I love cats today"),
            plain_doc("c", "Other", "dogs only"),
        ];
        let backlinks = compute_backlinks(&collection, "cats");
        assert!(backlinks.linked.is_empty());
        assert_eq!(backlinks.unlinked.len(), 1);
        assert_eq!(backlinks.unlinked[0].document_id, "b");
        assert_eq!(backlinks.unlinked[0].matches[0].context, "I love cats today");
    }

    #[test]
    fn document_is_never_its_own_unlinked_source() {
        let collection = vec![plain_doc("cats", "Cats", "Cats are the topic of Cats")];
        let backlinks = compute_backlinks(&collection, "cats");
        assert!(backlinks.unlinked.is_empty());
    }

    #[test]
    fn same_titled_document_is_excluded_from_unlinked() {
        let collection = vec![
            plain_doc("cats-1", "Cats", "first"),
            plain_doc("cats-2", "Cats", "this one mentions cats a lot, cats!"),
            plain_doc("diary", "Diary", "cats again"),
        ];
        let backlinks = compute_backlinks(&collection, "cats-1");
        let ids: Vec<_> = backlinks.unlinked.iter().map(|b| b.document_id.as_str()).collect();
        assert_eq!(ids, vec!["diary"]);
    }

    #[test]
    fn unknown_document_has_no_unlinked_backlinks() {
        let collection = vec![
            linking_doc("a", "Source", "ghost", "Ghost"),
            plain_doc("b", "Other", "Ghost mentioned"),
        ];
        let backlinks = compute_backlinks(&collection, "ghost");
        assert_eq!(backlinks.linked.len(), 1, "links to a missing document still count");
        assert!(backlinks.unlinked.is_empty());
    }

    #[test]
    fn linked_document_can_also_be_unlinked_source() {
        let collection = vec![
            plain_doc("cats", "Cats", ""),
            Document::new(
                "a",
                "Notes",
                vec![
                    paragraph(vec![Node::link("cats", "Cats", true, vec![Node::text("Cats")])]),
                    paragraph(vec![Node::text("more about cats")]),
                ],
            ),
        ];
        let backlinks = compute_backlinks(&collection, "cats");
        assert_eq!(backlinks.linked.len(), 1);
        assert_eq!(backlinks.unlinked.len(), 1);
        assert_eq!(backlinks.unlinked[0].matches[0].path, vec![1]);
    }

    // === forward links ===

    #[tokio::test]
    async fn forward_links_grouped_by_target() {
        let svc = service(vec![
            Document::new(
                "a",
                "Notes",
                vec![paragraph(vec![
                    Node::link("b", "Bee", false, vec![Node::text("Bee")]),
                    Node::text(" / "),
                    Node::link("ghost", "Ghost", false, vec![Node::text("Ghost")]),
                    Node::link("b", "Bee", false, vec![Node::text("again")]),
                ])],
            ),
            plain_doc("b", "Bee", "x"),
        ]);
        let links = svc.forward_links("a").await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target_id, "b");
        assert_eq!(links[0].title.as_deref(), Some("Bee"));
        assert_eq!(links[0].matches.len(), 2);
        assert_eq!(links[1].target_id, "ghost");
        assert_eq!(links[1].title, None);
    }

    #[tokio::test]
    async fn forward_links_of_missing_document() {
        let svc = service(vec![]);
        assert!(matches!(
            svc.forward_links("nope").await,
            Err(BacklinkError::NotFound(_))
        ));
    }

    // === rename_and_propagate ===

    #[tokio::test]
    async fn rename_retitles_links_in_every_backlinker() {
        let svc = service(vec![
            plain_doc("abc", "Old", "target body"),
            linking_doc("a", "Source A", "abc", "Old"),
            linking_doc("b", "Source B", "abc", "Old"),
            plain_doc("c", "Unrelated", "Old but unlinked"),
        ]);

        let report = svc.rename_and_propagate("abc", "New").await.unwrap();
        assert_eq!(report, PropagationReport { updated: 2, skipped: 0 });

        let store = svc.store();
        assert_eq!(store.get("abc").unwrap().title, "New");
        for id in ["a", "b"] {
            let doc = store.get(id).unwrap();
            assert_eq!(doc.root[0].rendered_text(), "See New for details.");
            let link = resolve(&doc.root, &[0, 1]).unwrap().as_link().unwrap();
            assert_eq!(link.display_title, "New");
        }
        assert_eq!(store.get("c").unwrap().root[0].rendered_text(), "Old but unlinked");
        assert_eq!(store.generation(), 1, "invalidate fires once");
    }

    #[tokio::test]
    async fn rename_uses_fresh_content_not_stale_matches() {
        let svc = service(vec![
            plain_doc("abc", "Old", ""),
            linking_doc("a", "Source", "abc", "Old"),
        ]);
        let backlinks = svc.get_backlinks("abc").await.unwrap();

        // The backlinker changes after discovery: the link moves to a new paragraph
        svc.store().insert(Document::new(
            "a",
            "Source",
            vec![
                paragraph(vec![Node::text("Intro")]),
                paragraph(vec![Node::link("abc", "Old", true, vec![Node::text("Old")])]),
            ],
        ));

        svc.propagate_rename(&backlinks.linked, "abc", "New").await.unwrap();

        let doc = svc.store().get("a").unwrap();
        assert_eq!(doc.root[0].rendered_text(), "Intro");
        assert_eq!(doc.root[1].rendered_text(), "New");
    }

    #[tokio::test]
    async fn rename_skips_backlinker_deleted_before_refetch() {
        let svc = service(vec![
            plain_doc("abc", "Old", ""),
            linking_doc("a", "Source A", "abc", "Old"),
            linking_doc("b", "Source B", "abc", "Old"),
        ]);
        let backlinks = svc.get_backlinks("abc").await.unwrap();
        svc.store().remove("a").await.unwrap();

        let report = svc
            .propagate_rename(&backlinks.linked, "abc", "New")
            .await
            .unwrap();
        assert_eq!(report, PropagationReport { updated: 1, skipped: 1 });
    }

    #[tokio::test]
    async fn rename_of_missing_document_is_not_found() {
        let svc = service(vec![linking_doc("a", "Source", "abc", "Old")]);
        let result = svc.rename_and_propagate("abc", "New").await;
        assert!(matches!(result, Err(BacklinkError::NotFound(id)) if id == "abc"));
        assert_eq!(svc.store().generation(), 0);
    }

    #[tokio::test]
    async fn rename_twice_is_stable() {
        let svc = service(vec![
            plain_doc("abc", "Old", ""),
            linking_doc("a", "Source", "abc", "Old"),
        ]);
        svc.rename_and_propagate("abc", "New").await.unwrap();
        let first = svc.store().get("a").unwrap();
        svc.rename_and_propagate("abc", "New").await.unwrap();
        let second = svc.store().get("a").unwrap();
        assert_eq!(first, second);
    }

    // === delete_and_propagate ===

    #[tokio::test]
    async fn delete_unwraps_links_and_removes_document() {
        let svc = service(vec![
            plain_doc("abc", "New", ""),
            linking_doc("a", "Source", "abc", "New"),
        ]);

        let report = svc.delete_and_propagate("abc").await.unwrap();
        assert_eq!(report.updated, 1);
        assert!(svc.store().get("abc").is_none());

        let doc = svc.store().get("a").unwrap();
        assert_eq!(
            doc.root,
            vec![Arc::new(paragraph(vec![
                Node::text("See "),
                Node::text("New"),
                Node::text(" for details."),
            ]))]
        );
        assert_eq!(svc.store().generation(), 1);
    }

    #[tokio::test]
    async fn delete_unwraps_links_without_visible_text() {
        // Discovery only finds documents with visible links; the rewrite itself
        // unwraps every link to the target in a visited document.
        let svc = service(vec![
            plain_doc("abc", "Gone", ""),
            Document::new(
                "a",
                "Source",
                vec![paragraph(vec![
                    Node::link("abc", "Gone", false, vec![Node::text("visible")]),
                    Node::link("abc", "Gone", false, vec![Node::text("")]),
                ])],
            ),
        ]);
        svc.delete_and_propagate("abc").await.unwrap();
        let doc = svc.store().get("a").unwrap();
        assert_eq!(doc.root[0].as_element().unwrap().children.len(), 2);
        assert!(!doc.root[0].as_element().unwrap().children.iter().any(|c| c.is_link_to("abc")));
    }

    #[tokio::test]
    async fn delete_of_missing_document_is_not_found() {
        let svc = service(vec![]);
        assert!(matches!(
            svc.delete_and_propagate("abc").await,
            Err(BacklinkError::NotFound(_))
        ));
    }

    // === failure handling ===

    #[tokio::test]
    async fn persist_failure_is_aggregated_without_rollback() {
        let store = Arc::new(FlakyStore::new(
            vec![
                plain_doc("abc", "Old", ""),
                linking_doc("a", "Source A", "abc", "Old"),
                linking_doc("b", "Source B", "abc", "Old"),
                linking_doc("c", "Source C", "abc", "Old"),
            ],
            &["b"],
        ));
        let svc = BacklinkService::new(store.clone());

        let err = svc.rename_and_propagate("abc", "New").await.unwrap_err();
        match &err {
            BacklinkError::PersistFailure {
                attempted,
                failures,
                report,
            } => {
                assert_eq!(*attempted, 3);
                assert_eq!(report.updated, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].document_id, "b");
            }
            other => panic!("expected PersistFailure, got {other:?}"),
        }
        assert_eq!(err.to_string(), "1 of 3 backlinked document(s) failed to update");

        // Successful sequences stay applied
        let mut persisted = store.persisted.lock().unwrap().clone();
        persisted.sort();
        assert_eq!(persisted, vec!["a", "c"]);
        assert_eq!(
            store.inner.get("a").unwrap().root[0].rendered_text(),
            "See New for details."
        );
        assert_eq!(
            store.inner.get("b").unwrap().root[0].rendered_text(),
            "See Old for details."
        );
        assert_eq!(store.inner.generation(), 1, "invalidate fires even on failure");
    }

    #[tokio::test]
    async fn propagation_with_no_backlinks_still_invalidates() {
        let svc = service(vec![plain_doc("abc", "Old", "")]);
        let report = svc.rename_and_propagate("abc", "New").await.unwrap();
        assert_eq!(report, PropagationReport::default());
        assert_eq!(svc.store().generation(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_aggregated_with_other_outcomes() {
        let documents = vec![
            plain_doc("abc", "Old", ""),
            linking_doc("a", "Source A", "abc", "Old"),
            linking_doc("b", "Source B", "abc", "Old"),
            linking_doc("c", "Source C", "abc", "Old"),
        ];
        let linked = compute_backlinks(&documents, "abc").linked;
        assert_eq!(linked.len(), 3);

        let store = Arc::new(FlakyStore::new(documents, &[]).with_failing_fetch(&["b"]));
        // "c" disappears between discovery and re-fetch
        store.inner.remove("c").await.unwrap();
        let svc = BacklinkService::new(store.clone());

        let err = svc.propagate_rename(&linked, "abc", "New").await.unwrap_err();
        match &err {
            BacklinkError::PersistFailure {
                attempted,
                failures,
                report,
            } => {
                assert_eq!(*attempted, 3);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].document_id, "b");
                assert!(failures[0].source.to_string().contains("connection reset"));
                assert_eq!(
                    *report,
                    PropagationReport {
                        updated: 1,
                        skipped: 1
                    }
                );
            }
            other => panic!("expected PersistFailure, got {other:?}"),
        }

        assert_eq!(*store.persisted.lock().unwrap(), vec!["a"]);
        assert_eq!(
            store.inner.get("a").unwrap().root[0].rendered_text(),
            "See New for details."
        );
        assert_eq!(
            store.inner.get("b").unwrap().root[0].rendered_text(),
            "See Old for details.",
            "a failed fetch must leave the document untouched"
        );
        assert_eq!(store.inner.generation(), 1, "invalidate fires even on failure");
    }

    #[tokio::test]
    async fn per_document_sequences_run_concurrently() {
        let store = Arc::new(
            FlakyStore::new(
                vec![
                    plain_doc("abc", "Old", ""),
                    linking_doc("a", "Source A", "abc", "Old"),
                    linking_doc("b", "Source B", "abc", "Old"),
                    linking_doc("c", "Source C", "abc", "Old"),
                ],
                &[],
            )
            .with_fetch_barrier(3),
        );
        let svc = BacklinkService::new(store.clone());

        // Each fetch waits until all three are in flight; sequential fetches never get there
        let propagation = svc.rename_and_propagate("abc", "New");
        let report = tokio::time::timeout(Duration::from_secs(5), propagation)
            .await
            .expect("fetches did not overlap")
            .unwrap();

        assert_eq!(report.updated, 3);
        for id in ["a", "b", "c"] {
            assert_eq!(
                store.inner.get(id).unwrap().root[0].rendered_text(),
                "See New for details."
            );
        }
    }
}
