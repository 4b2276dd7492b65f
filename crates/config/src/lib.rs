mod config_loader;
mod seed_data;


pub use config_loader::{
    AppConfig, CacheConfig, ConfigLoader, RemoteConfig, ServerConfig, SyncConfig,
    DEFAULT_KEY_PREFIX,
};
pub use seed_data::SeedData;
