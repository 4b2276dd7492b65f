mod cache;
mod file_store;
mod kv;


pub use cache::MessageCache;
pub use file_store::FileStore;
pub use kv::{KeyValueStore, MemoryStore};
