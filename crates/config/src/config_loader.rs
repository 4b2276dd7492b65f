use chatsync_common::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Default prefix for per-conversation cache keys
pub const DEFAULT_KEY_PREFIX: &str = "chat_messages_";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
    pub sync: SyncConfig,
    pub server: ServerConfig,
}

/// Remote channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the chat API; `None` runs fully offline
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub directory: PathBuf,
    pub key_prefix: String,
}

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Sender token stamped on locally composed messages
    pub local_sender: String,
    /// Seed dataset file; the bundled seeds are used when unset
    pub seed_file: Option<PathBuf>,
}

/// Mock remote server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig {
                base_url: None,
                timeout_secs: 10,
                connect_timeout_secs: 5,
            },
            cache: CacheConfig {
                directory: dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("chatsync/cache"),
                key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            },
            sync: SyncConfig {
                local_sender: chatsync_common::LOCAL_SENDER.to_string(),
                seed_file: None,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8090,
            },
        }
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<AppConfig> {
        if let Some(path) = path {
            if path.exists() {
                return Self::load_file(path);
            }
        }

        // Check default locations
        let default_paths = vec![
            PathBuf::from("chatsync.json"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("chatsync/config.json"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_file(&path);
            }
        }

        // Use defaults
        Ok(AppConfig::default())
    }

    fn load_file(path: &PathBuf) -> Result<AppConfig> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(config: &AppConfig, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
