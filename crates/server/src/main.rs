//! Podwise server entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use podwise_config::{load_settings, Settings};
use podwise_core::{Embedder, VectorIndex, WebSearchProvider};
use podwise_llm::LlmPool;
use podwise_pipeline::{PipelineRunner, RunnerParts};
use podwise_recommender::{CfModel, InteractionSnapshot, RecommenderHandle};
use podwise_retrieval::{EmbeddingConfig, HttpEmbedder, IndexConfig, QdrantIndex};
use podwise_server::{
    create_router, init_metrics, AppState, HealthRegistry, HttpEpisodeStore,
};
use podwise_tags::{Vocabulary, VocabularyHandle};
use podwise_websearch::{CachingSearchProvider, HttpSearchProvider, SearchProviderConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("PODWISE_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized; ConfigError is the one fatal kind
            eprintln!("Fatal: failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&settings);
    tracing::info!("Starting Podwise server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?settings.environment,
        config = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    let metrics_handle = settings
        .observability
        .metrics_enabled
        .then(init_metrics);

    // Tag vocabulary: loaded once, swapped atomically on reload
    let vocabulary = match Vocabulary::load(&settings.tags.vocabulary_path) {
        Ok(vocabulary) => {
            tracing::info!(
                path = %settings.tags.vocabulary_path,
                tags = vocabulary.len(),
                "Tag vocabulary loaded"
            );
            Arc::new(VocabularyHandle::new(vocabulary))
        }
        Err(e) => {
            eprintln!("Fatal: tag vocabulary: {}", e);
            std::process::exit(1);
        }
    };

    // Embedding client; a dimension mismatch with the index is fatal
    let embedder = Arc::new(HttpEmbedder::new(EmbeddingConfig::from(&settings.retrieval))?);
    match embedder.probe_dimension().await {
        Ok(()) => tracing::info!(dim = settings.retrieval.embedding_dim, "Embedding backend probed"),
        Err(e) if matches!(e, podwise_retrieval::RetrievalError::DimensionMismatch { .. }) => {
            eprintln!("Fatal: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Embedding backend unreachable at startup, continuing");
        }
    }

    let index = Arc::new(QdrantIndex::new(IndexConfig::from(&settings.retrieval))?);
    let episodes = Arc::new(HttpEpisodeStore::new(&settings.episodes)?);

    // Interaction snapshot: load now, refresh on a cadence
    let recommender = Arc::new(RecommenderHandle::new(load_cf_model(&settings)));
    spawn_snapshot_watcher(settings.clone(), recommender.clone());

    let llm = match LlmPool::from_settings(&settings.llm) {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            eprintln!("Fatal: LLM pool: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(backends = llm.len(), "LLM pool ready");

    let raw_search = Arc::new(HttpSearchProvider::new(SearchProviderConfig::from(
        &settings.websearch,
    )));
    let websearch: Arc<dyn WebSearchProvider> = Arc::new(CachingSearchProvider::new(
        raw_search.clone(),
        Duration::from_secs(settings.websearch.ttl_s),
    ));

    let health = build_health_registry(
        embedder.clone(),
        index.clone(),
        llm.clone(),
        raw_search.clone(),
    );

    let runner = Arc::new(PipelineRunner::new(
        settings.clone(),
        RunnerParts {
            vocabulary: vocabulary.clone(),
            embedder: embedder.clone() as Arc<dyn Embedder>,
            index: index.clone() as Arc<dyn VectorIndex>,
            episodes: episodes.clone(),
            recommender: recommender.clone(),
            llm: llm.clone(),
            websearch,
        },
    ));

    let mut state = AppState::new(
        settings.clone(),
        runner,
        recommender,
        episodes,
        vocabulary,
        health,
    );
    if let Some(handle) = metrics_handle {
        state = state.with_metrics(handle);
        tracing::info!("Prometheus metrics at /metrics");
    }

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

/// Initialize tracing from observability settings
fn init_tracing(settings: &Settings) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("podwise={},tower_http=info", settings.observability.log_level).into()
    });

    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Build the CF model from the snapshot dump, empty when missing
fn load_cf_model(settings: &Settings) -> CfModel {
    let snapshot = match InteractionSnapshot::load(
        &settings.recommender.snapshot_path,
        settings.recommender.cf_halflife_days,
        Utc::now(),
    ) {
        Ok(snapshot) => {
            tracing::info!(
                path = %settings.recommender.snapshot_path,
                users = snapshot.user_count(),
                version = %snapshot.version(),
                "Interaction snapshot loaded"
            );
            snapshot
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Interaction snapshot unavailable, starting with empty matrix"
            );
            InteractionSnapshot::from_rows(Vec::new(), settings.recommender.cf_halflife_days, Utc::now())
        }
    };

    CfModel::new(
        snapshot,
        settings.recommender.k_cf,
        settings.recommender.min_interactions,
    )
}

/// Poll the snapshot dump and swap the model when a new version appears
fn spawn_snapshot_watcher(settings: Settings, handle: Arc<RecommenderHandle>) {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(settings.recommender.refresh_interval_s));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match InteractionSnapshot::load(
                &settings.recommender.snapshot_path,
                settings.recommender.cf_halflife_days,
                Utc::now(),
            ) {
                Ok(snapshot) => {
                    if snapshot.version() != handle.current().version() {
                        handle.refresh(
                            snapshot,
                            settings.recommender.k_cf,
                            settings.recommender.min_interactions,
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Snapshot refresh failed, keeping current model");
                }
            }
        }
    });
}

/// Wire component probes for /health
fn build_health_registry(
    embedder: Arc<HttpEmbedder>,
    index: Arc<QdrantIndex>,
    llm: Arc<LlmPool>,
    websearch: Arc<HttpSearchProvider>,
) -> HealthRegistry {
    HealthRegistry::new()
        .register("embedding", move || {
            let embedder = embedder.clone();
            Box::pin(async move { embedder.is_available().await })
        })
        .register("vector_index", move || {
            let index = index.clone();
            Box::pin(async move { index.is_available().await })
        })
        .register("llm", move || {
            let llm = llm.clone();
            Box::pin(async move { llm.any_available().await })
        })
        .register("web_search", move || {
            let websearch = websearch.clone();
            Box::pin(async move { websearch.is_available().await })
        })
}
