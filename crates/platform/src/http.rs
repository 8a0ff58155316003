//! HTTP client for the messenger platform's REST API.
//!
//! Auth is OAuth client-credentials: the token is fetched lazily, cached,
//! and refreshed once on a 401 before the request is retried.

use std::time::Duration;

use {
    async_trait::async_trait,
    ferry_common::{InboundMessage, now_ms},
    reqwest::StatusCode,
    serde::Deserialize,
    tokio::sync::RwLock,
    tracing::{debug, warn},
};

use crate::{
    Platform,
    Result,
    config::PlatformConfig,
    error::Error,
};

/// Messages fetched per chat on each poll cycle.
const MESSAGES_PER_CHAT: u32 = 50;

pub struct HttpPlatform {
    http: reqwest::Client,
    config: PlatformConfig,
    token: RwLock<Option<String>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ChatsResponse {
    #[serde(default)]
    chats: Vec<ChatRef>,
}

#[derive(Deserialize)]
struct ChatRef {
    id: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    id: String,
    #[serde(default)]
    author_id: Option<serde_json::Value>,
    #[serde(default)]
    direction: String,
    #[serde(default)]
    is_read: bool,
    #[serde(default)]
    content: WireContent,
    #[serde(default)]
    created: Option<u64>,
}

#[derive(Default, Deserialize)]
struct WireContent {
    #[serde(default)]
    text: String,
}

impl HttpPlatform {
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config,
            token: RwLock::new(None),
        })
    }

    async fn fetch_token(&self) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/token", self.config.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.secret()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Auth {
                reason: format!("token endpoint returned {}", response.status()),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|_| Error::Auth {
            reason: "token missing from auth response".into(),
        })?;
        debug!("platform access token refreshed");
        Ok(token.access_token)
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        let token = self.fetch_token().await?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn refresh_token(&self) -> Result<String> {
        let token = self.fetch_token().await?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    /// Run a request with bearer auth, refreshing the token once on a 401.
    async fn authed<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let token = self.token().await?;
        let response = build(&self.http).bearer_auth(&token).send().await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            warn!("platform token expired, refreshing");
            let token = self.refresh_token().await?;
            build(&self.http).bearer_auth(&token).send().await?
        } else {
            response
        };

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    #[cfg(test)]
    async fn put_token(&self, token: &str) {
        *self.token.write().await = Some(token.to_string());
    }

    fn chats_url(&self) -> String {
        format!(
            "{}/messenger/v2/accounts/{}/chats",
            self.config.base_url, self.config.account_id
        )
    }
}

#[async_trait]
impl Platform for HttpPlatform {
    async fn fetch_unread(&self) -> Result<Vec<InboundMessage>> {
        let chats: ChatsResponse = self
            .authed(|http| http.get(self.chats_url()).query(&[("unread_only", "true")]))
            .await?
            .json()
            .await?;

        let mut inbound = Vec::new();
        for chat in &chats.chats {
            let url = format!("{}/{}/messages", self.chats_url(), chat.id);
            let messages: MessagesResponse = self
                .authed(|http| {
                    http.get(&url)
                        .query(&[("limit", MESSAGES_PER_CHAT.to_string())])
                })
                .await?
                .json()
                .await?;

            for msg in messages.messages {
                // Only unread inbound messages with text make it into the
                // pipeline; everything else stays on the platform.
                if msg.direction != "in" || msg.is_read || msg.content.text.is_empty() {
                    continue;
                }
                let author_id = match msg.author_id {
                    Some(serde_json::Value::String(s)) => s,
                    Some(serde_json::Value::Number(n)) => n.to_string(),
                    _ => String::new(),
                };
                inbound.push(InboundMessage {
                    id: msg.id,
                    chat_id: chat.id.clone(),
                    author_id,
                    text: msg.content.text,
                    received_at_ms: msg.created.map_or_else(now_ms, |secs| secs * 1000),
                });
            }
        }

        debug!(count = inbound.len(), "fetched unread messages");
        Ok(inbound)
    }

    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("{}/{chat_id}/messages", self.chats_url());
        let body = serde_json::json!({
            "message": { "text": text },
            "type": "text",
        });
        self.authed(|http| http.post(&url).json(&body)).await?;
        Ok(())
    }

    async fn mark_read(&self, chat_id: &str) -> Result<()> {
        let url = format!("{}/{chat_id}/read", self.chats_url());
        self.authed(|http| http.post(&url)).await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret};

    fn config(base_url: String) -> PlatformConfig {
        PlatformConfig {
            base_url,
            client_id: "cid".into(),
            client_secret: Secret::new("shh".into()),
            account_id: "acc".into(),
            timeout_secs: 5,
        }
    }

    fn token_mock(server: &mut mockito::ServerGuard, token: &str) -> mockito::Mock {
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"access_token":"{token}"}}"#))
    }

    #[tokio::test]
    async fn test_fetch_unread_filters_outbound_read_and_empty() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server, "t1").create_async().await;

        let _chats = server
            .mock("GET", "/messenger/v2/accounts/acc/chats")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"chats":[{"id":"c1"}]}"#)
            .create_async()
            .await;

        let _messages = server
            .mock("GET", "/messenger/v2/accounts/acc/chats/c1/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"messages":[
                    {"id":"m1","author_id":7,"direction":"in","is_read":false,
                     "content":{"text":"Need a laptop under 50000"},"created":1700000000},
                    {"id":"m2","direction":"out","content":{"text":"sent by us"}},
                    {"id":"m3","direction":"in","is_read":true,"content":{"text":"old"}},
                    {"id":"m4","direction":"in","is_read":false,"content":{"text":""}}
                ]}"#,
            )
            .create_async()
            .await;

        let platform = HttpPlatform::new(config(server.url())).unwrap();
        let messages = platform.fetch_unread().await.unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m1");
        assert_eq!(messages[0].chat_id, "c1");
        assert_eq!(messages[0].author_id, "7");
        assert_eq!(messages[0].received_at_ms, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_send_refreshes_token_on_401() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server, "fresh").create_async().await;

        let url = "/messenger/v2/accounts/acc/chats/c1/messages";
        let _unauthorized = server
            .mock("POST", url)
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .create_async()
            .await;
        let ok = server
            .mock("POST", url)
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let platform = HttpPlatform::new(config(server.url())).unwrap();
        platform.put_token("stale").await;
        platform.send("c1", "hello").await.unwrap();

        token.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_rejection_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server, "t1").create_async().await;
        let _rejected = server
            .mock("POST", "/messenger/v2/accounts/acc/chats/c1/messages")
            .with_status(403)
            .with_body("account blocked")
            .create_async()
            .await;

        let platform = HttpPlatform::new(config(server.url())).unwrap();
        let err = platform.send("c1", "hello").await.unwrap_err();
        assert_eq!(err.class(), ferry_common::ErrorClass::Permanent);
    }
}
