use crate::RemoteChannel;
use async_trait::async_trait;
use chatsync_common::{Error, Message, Result};
use chatsync_config::RemoteConfig;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// Remote channel over the chat HTTP API
///
/// - `GET  {base}/chats/{chat_id}/messages`
/// - `POST {base}/chats/{chat_id}/messages`
pub struct HttpRemote {
    client: Client,
    base_url: Url,
}

impl HttpRemote {
    pub fn new(base_url: &str, config: &RemoteConfig) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::ConfigError(format!("Invalid remote URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::ConfigError(format!("Remote URL {} cannot be a base", base_url)));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    fn messages_url(&self, chat_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Network(format!("Remote URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["chats", chat_id, "messages"]);
        Ok(url)
    }
}

#[async_trait]
impl RemoteChannel for HttpRemote {
    async fn fetch_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let url = self.messages_url(chat_id)?;
        debug!("Fetching messages from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Network(format!("Server error: {}", response.status())));
        }

        response
            .json::<Vec<Message>>()
            .await
            .map_err(|e| Error::Network(format!("Malformed response: {}", e)))
    }

    async fn send_message(&self, chat_id: &str, message: &Message) -> Result<()> {
        let url = self.messages_url(chat_id)?;
        debug!("Posting message {} to {}", message.id, url);

        let response = self
            .client
            .post(url)
            .json(message)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Network(format!("Server error: {}", response.status())));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RemoteConfig {
        RemoteConfig {
            base_url: None,
            timeout_secs: 1,
            connect_timeout_secs: 1,
        }
    }

    #[test]
    fn test_messages_url() {
        let remote = HttpRemote::new("http://localhost:8090", &config()).unwrap();
        assert_eq!(
            remote.messages_url("42").unwrap().as_str(),
            "http://localhost:8090/chats/42/messages"
        );

        // Base paths and trailing slashes are preserved
        let remote = HttpRemote::new("http://localhost:8090/api/", &config()).unwrap();
        assert_eq!(
            remote.messages_url("42").unwrap().as_str(),
            "http://localhost:8090/api/chats/42/messages"
        );
    }

    #[test]
    fn test_chat_id_is_escaped() {
        let remote = HttpRemote::new("http://localhost:8090", &config()).unwrap();
        assert_eq!(
            remote.messages_url("a/b c").unwrap().as_str(),
            "http://localhost:8090/chats/a%2Fb%20c/messages"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpRemote::new("not a url", &config()),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            HttpRemote::new("mailto:someone@example.com", &config()),
            Err(Error::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_unusable_url_is_network_error() {
        let remote = HttpRemote {
            client: Client::new(),
            base_url: Url::parse("mailto:someone@example.com").unwrap(),
        };

        assert!(matches!(remote.fetch_messages("1").await, Err(Error::Network(_))));
        assert!(matches!(
            remote.send_message("1", &Message::new("m1", "hi", "me")).await,
            Err(Error::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_network_error() {
        // Port 9 (discard) on localhost is almost never listening
        let remote = HttpRemote::new("http://127.0.0.1:9", &config()).unwrap();
        let result = remote.fetch_messages("1").await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
