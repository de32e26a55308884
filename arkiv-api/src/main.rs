use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use arkiv_api::app_state::AppState;
use arkiv_api::config::read_config;
use arkiv_api::domain::search::embedder::{GeminiEmbedder, SpladeEmbedder};
use arkiv_api::domain::search::query_log::{query_collection_schema, ChromaQueryLogSink};
use arkiv_api::domain::search::source::GhostContentSource;
use arkiv_api::domain::search::store::{chunk_collection_schema, ChromaVectorStore};
use arkiv_api::domain::search::{run_index_worker, ContentIndexer, QueryLogger, SearchService};
use arkiv_api::router;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = read_config().expect("Failed to read configuration");

    let content_client =
        ghost_admin::ContentClient::new(&settings.ghost.api_url, &settings.ghost.admin_api_key)
            .expect("Failed to create Ghost client");
    let source = GhostContentSource::new(content_client, settings.ghost.api_url.clone());

    let chroma_client = chroma::ChromaClient::new(
        &settings.chroma.tenant,
        &settings.chroma.database,
        &settings.chroma.api_key,
    )
    .expect("Failed to create Chroma client");

    let content_collection = chroma_client
        .get_or_create_collection(&settings.chroma.collection, Some(chunk_collection_schema()))
        .await
        .expect("Failed to open content collection");
    let query_collection = chroma_client
        .get_or_create_collection(
            &settings.chroma.query_collection,
            Some(query_collection_schema()),
        )
        .await
        .expect("Failed to open query collection");

    let dense_embedder = GeminiEmbedder::new().expect("Failed to create dense embedder");
    let sparse_embedder = tokio::task::spawn_blocking(SpladeEmbedder::new)
        .await
        .expect("Sparse embedder setup panicked")
        .expect("Failed to load sparse embedding model");

    let store = ChromaVectorStore::new(content_collection);
    let query_logger = Arc::new(QueryLogger::new(
        dense_embedder.clone(),
        ChromaQueryLogSink::new(query_collection),
    ));

    let search_service = Arc::new(SearchService::new(
        dense_embedder.clone(),
        sparse_embedder.clone(),
        store.clone(),
        query_logger,
        settings.search.ranker_config(),
        settings.search.search_config(),
    ));

    let indexer = Arc::new(ContentIndexer::new(
        source,
        dense_embedder,
        sparse_embedder,
        store,
        settings.indexing.indexer_config(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(run_index_worker(
        Arc::clone(&indexer),
        settings.indexing.poll_interval(),
        shutdown_rx,
    ));

    let app_state = AppState {
        search_service,
        indexer,
        admin_token: settings.application.admin_token.clone(),
        max_posts_per_page: settings.search.max_posts_per_page,
    };

    let app = router::create(app_state);
    let address = format!(
        "{}:{}",
        settings.application.host, settings.application.port
    );
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .expect("Failed to bind listener");

    info!(%address, "arkiv API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for shutdown signal");
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .expect("Server error");
}
