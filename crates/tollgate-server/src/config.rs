use std::net::SocketAddr;

use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use tollgate_auth::config::AuthConfig;
use tollgate_auth::token::SystemApp;
use tollgate_auth::types::ScopeSet;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Authorization settings (code timeout, silent auth bound, PAT limits)
    #[serde(default)]
    pub auth: AuthConfig,
    /// Third-party client applications registered at startup
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        if self.server.site_name.trim().is_empty() {
            return Err("server.site_name must not be empty".into());
        }
        if HeaderName::from_bytes(self.server.identity_header.as_bytes()).is_err() {
            return Err(format!(
                "server.identity_header is not a valid header name: '{}'",
                self.server.identity_header
            ));
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Storage validation
        if self.storage.backend == StorageBackend::Postgres {
            let Some(ref pg) = self.storage.postgres else {
                return Err("storage.backend = \"postgres\" requires [storage.postgres]".into());
            };
            if pg.url.trim().is_empty() {
                return Err("storage.postgres.url must not be empty".into());
            }
            if pg.max_connections == 0 {
                return Err("storage.postgres.max_connections must be > 0".into());
            }
        }
        // Auth validation
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;
        // Client validations
        let mut seen = std::collections::HashSet::new();
        for client in &self.clients {
            client.validate()?;
            if !seen.insert(client.client_id.as_str()) {
                return Err(format!("clients: duplicate client_id '{}'", client.client_id));
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Display name of the first-party web application.
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Header carrying the authenticated user id, set by the fronting
    /// proxy after login.
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            site_name: default_site_name(),
            identity_header: default_identity_header(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    64 * 1024
}
fn default_site_name() -> String {
    "Tollgate".into()
}
fn default_identity_header() -> String {
    tollgate_auth::TrustedHeaderVerifier::DEFAULT_HEADER.into()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local; state is lost on restart.
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: Option<PostgresStorageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresStorageConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Apply pending schema migrations on startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

/// A third-party client application.
///
/// ```toml
/// [[clients]]
/// client_id = "editor"
/// name = "Map Editor"
/// owner = 42
/// scopes = ["read_prefs", "write_api"]
/// redirect_uris = ["https://editor.example/callback"]
/// secret = "s3cret"   # omit for public clients
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub name: String,
    /// User id of the registering owner.
    pub owner: i64,
    #[serde(default)]
    pub scopes: ScopeSet,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Plaintext secret for confidential clients. Only its Argon2 hash is
    /// stored.
    #[serde(default)]
    pub secret: Option<String>,
}

impl ClientConfig {
    fn validate(&self) -> Result<(), String> {
        if self.client_id.trim().is_empty() {
            return Err("clients: client_id must not be empty".into());
        }
        if SystemApp::from_client_id(&self.client_id).is_some() {
            return Err(format!(
                "clients: '{}' is reserved for a system application",
                self.client_id
            ));
        }
        if !self.scopes.is_subset(&ScopeSet::public()) {
            return Err(format!(
                "clients: '{}' requests a scope third-party applications cannot hold",
                self.client_id
            ));
        }
        if self.redirect_uris.is_empty() {
            return Err(format!(
                "clients: '{}' needs at least one redirect_uri",
                self.client_id
            ));
        }
        if self.secret.as_deref().is_some_and(str::is_empty) {
            return Err(format!("clients: '{}' has an empty secret", self.client_id));
        }
        Ok(())
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "tollgate.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., TOLLGATE__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("TOLLGATE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
