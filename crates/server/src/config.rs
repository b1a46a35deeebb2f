//! Server configuration and shared application state

use anyhow::{bail, Context};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::blobs::BlobStore;
use crate::presence::{DeliveryRouter, RouterConfig};
use crate::store::DocumentStore;

/// Which document store backs the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// One JSON file per collection under `documents_dir`
    Json,
    /// In-process only, lost on restart
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(StoreKind::Json),
            "memory" => Ok(StoreKind::Memory),
            other => bail!("unknown store kind `{}` (expected `json` or `memory`)", other),
        }
    }
}

/// Configuration for the SchoolHub server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Data root
    pub root_dir: PathBuf,
    /// Document collections directory
    pub documents_dir: PathBuf,
    /// Uploaded files directory
    pub uploads_dir: PathBuf,
    pub bind_address: IpAddr,
    pub port: u16,
    /// Bound on every document store call
    pub store_timeout: Duration,
    /// Max upload size in MB
    pub max_upload_mb: usize,
    /// Push each chat message back to its sender too
    pub echo_to_sender: bool,
    pub store: StoreKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_base_dir(schoolhub_common::DEFAULT_ROOT)
    }
}

impl ServerConfig {
    /// Default config with all data under `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let root_dir = base_dir.into();
        Self {
            documents_dir: schoolhub_common::documents_dir_in(&root_dir),
            uploads_dir: schoolhub_common::uploads_dir_in(&root_dir),
            root_dir,
            bind_address: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            store_timeout: Duration::from_secs(10),
            max_upload_mb: 25,
            echo_to_sender: true,
            store: StoreKind::Json,
        }
    }

    /// Build from process environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank variables
    /// keep their defaults; unparsable ones are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let root = get(schoolhub_common::ROOT_ENV).unwrap_or_else(|| schoolhub_common::DEFAULT_ROOT.into());
        let mut config = Self::with_base_dir(root);

        if let Some(addr) = get("SCHOOLHUB_BIND_ADDRESS") {
            config.bind_address = parse_var("SCHOOLHUB_BIND_ADDRESS", &addr)?;
        }
        if let Some((key, port)) = ["SCHOOLHUB_PORT", "PORT"]
            .into_iter()
            .find_map(|key| get(key).map(|port| (key, port)))
        {
            config.port = parse_var(key, &port)?;
        }
        if let Some(secs) = get("SCHOOLHUB_STORE_TIMEOUT_SECS") {
            let secs: u64 = parse_var("SCHOOLHUB_STORE_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                bail!("SCHOOLHUB_STORE_TIMEOUT_SECS must be at least 1");
            }
            config.store_timeout = Duration::from_secs(secs);
        }
        if let Some(mb) = get("SCHOOLHUB_MAX_UPLOAD_MB") {
            config.max_upload_mb = parse_var("SCHOOLHUB_MAX_UPLOAD_MB", &mb)?;
        }
        if let Some(echo) = get("SCHOOLHUB_ECHO_TO_SENDER") {
            config.echo_to_sender = parse_var("SCHOOLHUB_ECHO_TO_SENDER", &echo)?;
        }
        if let Some(kind) = get("SCHOOLHUB_STORE") {
            config.store = kind.parse()?;
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            echo_to_sender: self.echo_to_sender,
            store_timeout: self.store_timeout,
        }
    }

    /// Ensure all directories exist
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        let root = self.root_dir.clone();
        tokio::task::spawn_blocking(move || schoolhub_common::init_structure(&root)).await??;
        // Either may have been pointed outside the root
        tokio::fs::create_dir_all(&self.documents_dir).await?;
        tokio::fs::create_dir_all(&self.uploads_dir).await?;
        Ok(())
    }
}

fn parse_var<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value `{}` for {}", value, key))
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub router: Arc<DeliveryRouter>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let router = Arc::new(DeliveryRouter::new(store.clone(), config.router_config()));
        Self {
            config: Arc::new(config),
            store,
            blobs,
            router,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.root_dir, PathBuf::from("schoolhub_data"));
        assert_eq!(config.documents_dir, PathBuf::from("schoolhub_data/documents"));
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.store_timeout, Duration::from_secs(10));
        assert!(config.echo_to_sender);
        assert_eq!(config.store, StoreKind::Json);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SCHOOLHUB_ROOT", "/srv/school"),
            ("PORT", "9000"),
            ("SCHOOLHUB_BIND_ADDRESS", "127.0.0.1"),
            ("SCHOOLHUB_STORE_TIMEOUT_SECS", "3"),
            ("SCHOOLHUB_ECHO_TO_SENDER", "false"),
            ("SCHOOLHUB_STORE", "Memory"),
            ("SCHOOLHUB_MAX_UPLOAD_MB", "2"),
        ]))
        .unwrap();

        assert_eq!(config.uploads_dir, PathBuf::from("/srv/school/uploads"));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.store_timeout, Duration::from_secs(3));
        assert!(!config.echo_to_sender);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.max_upload_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_schoolhub_port_takes_precedence_over_port() {
        let config =
            ServerConfig::from_lookup(lookup(&[("PORT", "9000"), ("SCHOOLHUB_PORT", "9100")])).unwrap();
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("SCHOOLHUB_ECHO_TO_SENDER", "yes")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("SCHOOLHUB_STORE_TIMEOUT_SECS", "0")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("SCHOOLHUB_STORE", "mongo")])).is_err());
    }

    #[test]
    fn test_port_error_names_the_variable_that_was_set() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        let message = err.to_string();
        assert!(message.ends_with("for PORT"), "{}", message);

        let err = ServerConfig::from_lookup(lookup(&[("SCHOOLHUB_PORT", "x"), ("PORT", "80")])).unwrap_err();
        assert!(err.to_string().ends_with("for SCHOOLHUB_PORT"));
    }

    #[tokio::test]
    async fn test_ensure_dirs_creates_layout() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = ServerConfig::with_base_dir(temp_dir.path());
        config.ensure_dirs().await.unwrap();
        assert!(temp_dir.path().join("documents").is_dir());
        assert!(temp_dir.path().join("uploads").is_dir());
    }
}
