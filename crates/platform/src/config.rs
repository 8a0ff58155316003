use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

fn default_timeout_secs() -> u64 {
    30
}

/// Credentials and endpoint for one messenger-platform account.
#[derive(Clone, Deserialize)]
pub struct PlatformConfig {
    /// API root, e.g. `https://api.example.com`.
    pub base_url: String,

    /// OAuth client-credentials pair.
    pub client_id: String,
    pub client_secret: Secret<String>,

    /// Platform account whose chats are polled.
    pub account_id: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

impl PlatformConfig {
    #[must_use]
    pub fn secret(&self) -> &str {
        self.client_secret.expose_secret()
    }
}
