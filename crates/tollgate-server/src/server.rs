use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderName, StatusCode};
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use tollgate_auth::crypto::hash_client_secret;
use tollgate_auth::token::{ExpiredCodeReaper, PatService, SystemAppRegistry, SystemTokenService};
use tollgate_auth::types::{Application, UserId};
use tollgate_auth::{
    ApplicationRegistry, AuthState, MemoryStorage, TokenStore, TrustedHeaderVerifier, oauth_router,
};
use tollgate_auth_postgres::PostgresAuthStorage;

use crate::config::{AppConfig, ClientConfig, StorageBackend, StorageConfig};

pub struct TollgateServer {
    addr: SocketAddr,
    app: Router,
    state: AuthState,
    reaper: ExpiredCodeReaper,
    reaper_interval: Duration,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub fn build_app(state: AuthState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    oauth_router(state)
        .route("/healthz", get(healthz))
        .layer(
            TraceLayer::new_for_http()
                // Query strings are left out: authorize requests carry state
                // and challenges, redirects carry codes.
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.path = %req.uri().path(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

struct Stores {
    tokens: Arc<dyn TokenStore>,
    applications: Arc<dyn ApplicationRegistry>,
}

async fn open_storage(cfg: &StorageConfig) -> anyhow::Result<Stores> {
    match cfg.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; grants are lost on restart");
            let storage = MemoryStorage::new();
            Ok(Stores {
                tokens: Arc::new(storage.clone()),
                applications: Arc::new(storage),
            })
        }
        StorageBackend::Postgres => {
            let pg = cfg
                .postgres
                .as_ref()
                .context("storage.postgres config is required")?;
            let storage = PostgresAuthStorage::connect(&pg.url, pg.max_connections)
                .await
                .context("failed to connect to PostgreSQL")?;
            if pg.run_migrations {
                storage.migrate().await.context("migrations failed")?;
                tracing::info!("Database migrations applied");
            }
            tracing::info!(max_connections = pg.max_connections, "PostgreSQL storage ready");
            Ok(Stores {
                tokens: Arc::new(storage.token_store()),
                applications: Arc::new(storage.application_registry()),
            })
        }
    }
}

async fn register_clients(
    applications: &dyn ApplicationRegistry,
    clients: &[ClientConfig],
) -> anyhow::Result<()> {
    for client in clients {
        let mut app = Application::new(
            Some(UserId(client.owner)),
            client.name.clone(),
            client.client_id.clone(),
            client.scopes.clone(),
            client.redirect_uris.clone(),
        );
        if let Some(ref secret) = client.secret {
            app = app.with_secret_hash(hash_client_secret(secret)?);
        }
        let stored = applications
            .upsert(&app)
            .await
            .with_context(|| format!("failed to register client '{}'", client.client_id))?;
        tracing::info!(
            client_id = %stored.client_id,
            application_id = %stored.id,
            confidential = stored.confidential,
            "Registered client application"
        );
    }
    Ok(())
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
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

    /// Opens storage, registers system and configured client applications,
    /// and assembles the router.
    pub async fn build(self) -> anyhow::Result<TollgateServer> {
        let cfg = self.config;
        let stores = open_storage(&cfg.storage).await?;

        let system_apps =
            SystemAppRegistry::register(stores.applications.as_ref(), &cfg.server.site_name)
                .await
                .context("failed to register system applications")?;
        register_clients(stores.applications.as_ref(), &cfg.clients).await?;

        let header = HeaderName::from_bytes(cfg.server.identity_header.as_bytes())
            .context("invalid server.identity_header")?;
        let identity = Arc::new(TrustedHeaderVerifier::new(header));

        let oauth = &cfg.auth.oauth;
        let reaper = ExpiredCodeReaper::new(stores.tokens.clone(), oauth.authorization_code_timeout);
        let reaper_interval = oauth.reaper_interval;

        let state = AuthState::new(
            stores.tokens,
            stores.applications,
            Arc::new(system_apps),
            identity,
            cfg.auth.clone(),
        );
        let app = build_app(state.clone(), &cfg);

        Ok(TollgateServer {
            addr: self.addr,
            app,
            state,
            reaper,
            reaper_interval,
        })
    }
}

impl TollgateServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// System applications as registered at build time.
    pub fn system_apps(&self) -> &SystemAppRegistry {
        &self.state.system_apps
    }

    pub fn pat_service(&self) -> Arc<PatService> {
        self.state.pats.clone()
    }

    /// Mints tokens for first-party system apps without a code exchange.
    pub fn system_tokens(&self) -> Arc<SystemTokenService> {
        self.state.system_tokens.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves, then
    /// stops the expired-code reaper.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let reaper = tokio::spawn(self.reaper.run(self.reaper_interval, stop_rx));

        tracing::info!("listening on {}", listener.local_addr()?);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await;

        let _ = stop_tx.send(true);
        if let Err(e) = reaper.await {
            tracing::warn!(error = %e, "Expired code reaper task failed");
        }
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
