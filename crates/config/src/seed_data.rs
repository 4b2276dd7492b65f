use chatsync_common::{Error, Message, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Fallback seed dataset, keyed by conversation id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    pub version: String,
    pub conversations: BTreeMap<String, Vec<Message>>,
}

impl SeedData {
    /// Load the built-in seeds
    pub fn load_defaults() -> Result<Self> {
        let json = include_str!("default_seeds.json");
        Self::load_from_json(json)
    }

    /// Load seeds from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_json(&content)
    }

    /// Load seeds from JSON string
    pub fn load_from_json(json: &str) -> Result<Self> {
        let data: SeedData = serde_json::from_str(json)?;
        data.check_unique_ids()?;
        Ok(data)
    }

    /// Load from an optional file, falling back to the built-in seeds
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_defaults(),
        }
    }

    fn check_unique_ids(&self) -> Result<()> {
        for (chat_id, messages) in &self.conversations {
            let mut seen = std::collections::HashSet::new();
            for message in messages {
                if !seen.insert(message.id.as_str()) {
                    return Err(Error::ConfigError(format!(
                        "Duplicate seed message id {} in conversation {}",
                        message.id, chat_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Seed messages for one conversation
    pub fn messages(&self, chat_id: &str) -> &[Message] {
        self.conversations
            .get(chat_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// List seeded conversation ids
    pub fn conversation_ids(&self) -> Vec<String> {
        self.conversations.keys().cloned().collect()
    }

    /// Consume into the plain map
    pub fn into_conversations(self) -> BTreeMap<String, Vec<Message>> {
        self.conversations
    }

    /// Export seeds to JSON
    pub fn export(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::Serialization)
    }
}
