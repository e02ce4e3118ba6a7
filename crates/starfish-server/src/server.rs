use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use starfish_db_postgres::PostgresInventoryStore;
use starfish_storage::DynInventoryStore;
use starfish_sync::{
    HttpResourceGateway, ReconciliationEngine, SyncOrchestrator, SyncScheduler, build_registry,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::{AppConfig, StorageBackend},
    handlers,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub store: DynInventoryStore,
}

pub struct StarfishServer {
    addr: SocketAddr,
    app: Router,
    scheduler: SyncScheduler,
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let prefix = cfg.server.api_prefix.trim_end_matches('/');
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route(
            &format!("{prefix}/resource/{{resource_type}}/{{resource_id}}"),
            get(handlers::get_resource),
        )
        // Manual triggers run regardless of `sync.enabled`.
        .route("/sync/all", post(handlers::sync_all))
        .route("/sync/sites", post(handlers::sync_sites))
        .route("/sync/{resource_type}", post(handlers::sync_resource_type))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, _span: &tracing::Span| {
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
}

/// Opens the configured storage backend.
pub async fn create_store(cfg: &AppConfig) -> anyhow::Result<DynInventoryStore> {
    let store: DynInventoryStore = match cfg.storage.backend {
        StorageBackend::Postgres => {
            Arc::new(PostgresInventoryStore::from_config(&cfg.storage.postgres).await?)
        }
        StorageBackend::Memory => starfish_db_memory::create_inventory_store(),
    };
    tracing::info!(backend = store.backend_name(), "Storage initialized");
    Ok(store)
}

/// Wires registry, gateway, engine and orchestrator over `store`.
pub fn build_state(cfg: &AppConfig, store: DynInventoryStore) -> anyhow::Result<AppState> {
    let registry = build_registry(&cfg.registry)?;
    let gateway = Arc::new(HttpResourceGateway::new(&cfg.remote)?);
    let engine = ReconciliationEngine::new(store.clone());
    let orchestrator = Arc::new(SyncOrchestrator::new(
        registry,
        gateway,
        engine,
        cfg.sync.clone(),
    ));
    Ok(AppState {
        orchestrator,
        store,
    })
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    store: Option<DynInventoryStore>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            store: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Uses `store` instead of opening the configured backend.
    pub fn with_store(mut self, store: DynInventoryStore) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn build(self) -> anyhow::Result<StarfishServer> {
        let store = match self.store {
            Some(store) => store,
            None => create_store(&self.config).await?,
        };
        let state = build_state(&self.config, store)?;
        let scheduler = SyncScheduler::new(state.orchestrator.clone(), self.config.schedule.clone());
        let app = build_app(&self.config, state);

        Ok(StarfishServer {
            addr: self.addr,
            app,
            scheduler,
        })
    }
}

impl StarfishServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);

        let jobs = self.scheduler.start();
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.scheduler.shutdown();
        for job in jobs {
            if let Err(e) = job.await {
                tracing::warn!(error = %e, "Scheduled job ended abnormally");
            }
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
