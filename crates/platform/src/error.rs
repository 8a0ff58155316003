use {ferry_common::ErrorClass, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("platform returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("platform auth failed: {reason}")]
    Auth { reason: String },

    #[error("malformed platform payload: {reason}")]
    Malformed { reason: String },
}

impl Error {
    /// Retry classification: 5xx/429/transport errors are worth retrying,
    /// other 4xx responses and malformed payloads are not.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Http(e) if e.is_decode() => ErrorClass::Permanent,
            Self::Http(_) | Self::Auth { .. } => ErrorClass::Transient,
            Self::Status { status, .. } => {
                if *status >= 500 || *status == 429 {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Permanent
                }
            },
            Self::Malformed { .. } => ErrorClass::Permanent,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
