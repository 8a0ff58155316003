//! HTTP responder gateway client.

use std::time::Duration;

use {
    async_trait::async_trait,
    ferry_common::Turn,
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use crate::{Responder, Result, error::Error};

fn default_timeout_secs() -> u64 {
    60
}

fn default_fallback_reply() -> String {
    "Sorry, I could not come up with an answer. Please try rephrasing your question.".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponderConfig {
    /// Gateway root, e.g. `http://127.0.0.1:10002`.
    pub endpoint: String,

    /// Reply used when the gateway returns an empty string.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub struct HttpResponder {
    http: reqwest::Client,
    config: ResponderConfig,
}

#[derive(Serialize)]
struct RespondRequest<'a> {
    chat_id: &'a str,
    history: Vec<WireTurn<'a>>,
}

#[derive(Serialize)]
struct WireTurn<'a> {
    role: &'static str,
    text: &'a str,
}

#[derive(Deserialize)]
struct RespondResponse {
    #[serde(default)]
    reply: String,
}

impl HttpResponder {
    pub fn new(config: ResponderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl Responder for HttpResponder {
    async fn respond(&self, chat_id: &str, history: &[Turn]) -> Result<String> {
        let request = RespondRequest {
            chat_id,
            history: history
                .iter()
                .map(|turn| WireTurn {
                    role: turn.role.as_str(),
                    text: &turn.text,
                })
                .collect(),
        };

        let response = self
            .http
            .post(format!("{}/respond", self.config.endpoint))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: RespondResponse = response.json().await.map_err(|_| Error::Malformed {
            reason: "reply missing from responder payload".into(),
        })?;

        let reply = parsed.reply.trim().to_string();
        if reply.is_empty() {
            warn!(chat_id, "responder returned an empty reply, using fallback");
            return Ok(self.config.fallback_reply.clone());
        }
        debug!(chat_id, reply_len = reply.len(), "responder reply received");
        Ok(reply)
    }
}
