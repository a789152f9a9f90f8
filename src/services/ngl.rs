use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use super::dispatch::Deliverer;
use crate::link::recipient_username;

const SUBMIT_URL: &str = "https://ngl.link/api/submit";
const TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitPayload<'a> {
    username: &'a str,
    question: &'a str,
    device_id: String,
    game_slug: &'a str,
    referrer: &'a str,
}

pub struct NglClient {
    client: Client,
    link_prefix: String,
    submit_url: String,
}

impl NglClient {
    pub fn new(link_prefix: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(TIMEOUT_DURATION)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            link_prefix,
            submit_url: SUBMIT_URL.to_string(),
        })
    }

    async fn submit(&self, username: &str, text: &str) -> Result<bool, reqwest::Error> {
        let payload = SubmitPayload {
            username,
            question: text,
            device_id: Uuid::new_v4().to_string(),
            game_slug: "",
            referrer: "",
        };

        let response = self
            .client
            .post(&self.submit_url)
            .header("Origin", "https://ngl.link")
            .header("Referer", format!("{}{}", self.link_prefix, username))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Submit to {} answered {}", username, status);
        }

        Ok(status.is_success())
    }
}

#[async_trait]
impl Deliverer for NglClient {
    async fn deliver(&self, endpoint_link: &str, text: &str) -> bool {
        let username = match recipient_username(endpoint_link, &self.link_prefix) {
            Ok(u) => u,
            Err(e) => {
                tracing::error!("Cannot deliver to {}: {}", endpoint_link, e);
                return false;
            }
        };

        match self.submit(&username, text).await {
            Ok(delivered) => delivered,
            Err(e) => {
                tracing::error!("Delivery to {} failed: {}", username, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_uses_camel_case_keys() {
        let payload = SubmitPayload {
            username: "alice",
            question: "hi",
            device_id: "web_1".to_string(),
            game_slug: "",
            referrer: "",
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["question"], "hi");
        assert_eq!(json["deviceId"], "web_1");
        assert_eq!(json["gameSlug"], "");
    }

    #[tokio::test]
    async fn test_invalid_link_is_a_failed_delivery() {
        let client = NglClient::new(crate::link::DEFAULT_LINK_PREFIX.to_string()).unwrap();
        assert!(!client.deliver("http://wrong.com/x", "hello").await);
    }
}
