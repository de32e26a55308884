//! Background task for periodic index syncing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::indexer::ContentIndexer;
use super::traits::{ContentSource, DenseEmbedder, SparseEmbedder, VectorStore};

/// Runs the indexing pipeline on a fixed interval until shutdown.
///
/// The first cycle runs right away; afterwards the loop waits out the
/// interval. Cancellation is honored while sleeping and between cycles, so
/// shutdown never interrupts a document's delete-then-insert mid-way. A
/// failed cycle is logged and the loop keeps going.
pub async fn run_index_worker<C, D, S, V>(
    indexer: Arc<ContentIndexer<C, D, S, V>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    C: ContentSource,
    D: DenseEmbedder,
    S: SparseEmbedder,
    V: VectorStore,
{
    info!(
        interval_secs = interval.as_secs(),
        "Index worker background task started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                info!("Index worker shutting down");
                return;
            }
        }

        if *shutdown.borrow() {
            info!("Index worker shutting down");
            return;
        }

        match indexer.reindex_all().await {
            Ok(stats) => info!(
                indexed = stats.indexed,
                removed = stats.removed,
                unchanged = stats.unchanged,
                errors = stats.errors,
                "Index cycle completed"
            ),
            Err(e) => error!(error = %e, "Index cycle failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::search::embedder::{MockDenseEmbedder, MockSparseEmbedder};
    use crate::domain::search::indexer::IndexerConfig;
    use crate::domain::search::source::MockContentSource;
    use crate::domain::search::store::MemoryVectorStore;
    use crate::domain::search::types::{ContentItem, ContentType};

    fn post(slug: &str) -> ContentItem {
        ContentItem {
            id: format!("id-{}", slug),
            slug: slug.into(),
            title: slug.into(),
            html: None,
            plaintext: Some("Body".into()),
            url: format!("https://example.com/{}/", slug),
            published_at: None,
            updated_at: None,
            tags: vec![],
            authors: vec![],
            content_type: ContentType::Post,
        }
    }

    #[tokio::test]
    async fn worker_syncs_and_stops_on_shutdown() {
        let store = MemoryVectorStore::new();
        let indexer = Arc::new(ContentIndexer::new(
            MockContentSource::new().with_posts(vec![post("a")]),
            MockDenseEmbedder::default(),
            MockSparseEmbedder::default(),
            store.clone(),
            IndexerConfig::default(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_index_worker(
            indexer,
            Duration::from_millis(10),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop after shutdown")
            .unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn worker_survives_failing_cycles() {
        let indexer = Arc::new(ContentIndexer::new(
            MockContentSource::failing(),
            MockDenseEmbedder::default(),
            MockSparseEmbedder::default(),
            MemoryVectorStore::new(),
            IndexerConfig::default(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_index_worker(
            indexer,
            Duration::from_millis(10),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(40)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop after repeated failures")
            .unwrap();
    }
}
