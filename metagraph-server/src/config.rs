// Copyright 2025 Metagraph (https://github.com/metagraph)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Metagraph Server Configuration
///
/// Loaded from a TOML file and overridden by environment variables
/// (file < env). See the per-field docs for the recognized variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: OidcConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub snapshots: SnapshotConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP listen address; env `METAGRAPH_HTTP_ADDR`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log threshold; env `LOG_LEVEL`, one of
    /// `debug, performance, info, warn, error`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Origins granted CORS access with credentials; env
    /// `CORS_ALLOWED_ORIGINS` (comma-separated). Empty disables CORS
    /// headers entirely.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Durable store binding; env `DATABASE_URL`.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Create tables/indexes at startup; env `INIT_DB` (1/true/yes).
    #[serde(default)]
    pub init_schema: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_entries")]
    pub max_entries: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

/// OIDC settings. The service has no unauthenticated mode: discovery URL
/// and client id are required at startup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OidcConfig {
    /// env `OIDC_DISCOVERY_URL`
    pub discovery_url: Option<String>,
    /// env `OIDC_CLIENT_ID`; doubles as the expected `aud`.
    pub client_id: Option<String>,
    /// env `OIDC_CLIENT_SECRET`; needed only for the callback exchange.
    pub client_secret: Option<String>,
}

/// Vector index coordinates. Vectorization is enabled only when `url` is
/// set; everything stays best-effort either way.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorConfig {
    /// env `VX_URL`
    pub url: Option<String>,
    /// env `VX_API_KEY`
    pub api_key: Option<String>,
    /// env `VX_EDGE_COLLECTION`
    #[serde(default = "default_edge_collection")]
    pub edge_collection: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// env `EP_API_KEY`
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotConfig {
    /// Object-store binding for export blobs; env `SNAPSHOT_DIR`.
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8788".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_url() -> String {
    "sqlite://metagraph.db".to_string()
}

fn default_cache_entries() -> u64 {
    10_000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_edge_collection() -> String {
    "edges".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("./snapshots")
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            cors_allowed_origins: vec![],
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            init_schema: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            edge_collection: default_edge_collection(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: default_snapshot_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: HttpServerConfig::default(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            auth: OidcConfig::default(),
            vector: VectorConfig::default(),
            embedding: EmbeddingConfig::default(),
            snapshots: SnapshotConfig::default(),
        }
    }
}

fn truthy(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env > file > defaults.
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        config.merge_env();
        Ok(config)
    }

    /// Apply environment overrides in place.
    pub fn merge_env(&mut self) {
        if let Ok(addr) = std::env::var("METAGRAPH_HTTP_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.server.log_level = level;
        }
        if let Ok(origins) = std::env::var("CORS_ALLOWED_ORIGINS") {
            self.server.cors_allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(init) = std::env::var("INIT_DB") {
            self.database.init_schema = truthy(&init);
        }
        if let Ok(url) = std::env::var("OIDC_DISCOVERY_URL") {
            self.auth.discovery_url = Some(url);
        }
        if let Ok(id) = std::env::var("OIDC_CLIENT_ID") {
            self.auth.client_id = Some(id);
        }
        if let Ok(secret) = std::env::var("OIDC_CLIENT_SECRET") {
            self.auth.client_secret = Some(secret);
        }
        if let Ok(url) = std::env::var("VX_URL") {
            self.vector.url = Some(url);
        }
        if let Ok(key) = std::env::var("VX_API_KEY") {
            self.vector.api_key = Some(key);
        }
        if let Ok(collection) = std::env::var("VX_EDGE_COLLECTION") {
            self.vector.edge_collection = collection;
        }
        if let Ok(key) = std::env::var("EP_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Ok(dir) = std::env::var("SNAPSHOT_DIR") {
            self.snapshots.dir = PathBuf::from(dir);
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// The tracing filter directive for the configured log level. The
    /// `performance` level keeps the app at info but turns on the
    /// debug-level timing targets.
    pub fn log_filter(&self) -> String {
        match self.server.log_level.as_str() {
            "debug" => "debug".to_string(),
            "performance" => "info,metagraph_server=debug,tower_http=debug".to_string(),
            "warn" => "warn".to_string(),
            "error" => "error".to_string(),
            _ => "info".to_string(),
        }
    }

    /// Validate configuration before serving.
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.auth.discovery_url.is_none() || self.auth.client_id.is_none() {
            anyhow::bail!(
                "OIDC_DISCOVERY_URL and OIDC_CLIENT_ID are required; \
                 the service has no unauthenticated mode"
            );
        }

        if self.vector.url.is_some() && self.embedding.api_key.is_none() {
            anyhow::bail!("VX_URL is set but EP_API_KEY is missing; vectorization needs both");
        }

        Ok(())
    }
}
