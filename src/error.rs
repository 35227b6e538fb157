use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by sends, uploads and bot configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook rejected the request: errcode={code}, errmsg={message}")]
    Api { code: i64, message: String },

    #[error("upload succeeded but the response carried no media_id")]
    MissingMediaId,

    #[error("invalid usage: {0}")]
    Usage(String),

    #[error("invalid webhook url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to encode outbound message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to parse webhook response: {0}")]
    InvalidResponse(#[source] serde_json::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Crypt(#[from] CryptError),
}

impl Error {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }
}

/// Why an inbound callback payload could not be turned into a message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed payload: {0}")]
    Malformed(#[from] quick_xml::DeError),

    #[error("unsupported message type '{0}'")]
    Unsupported(String),
}

/// Rejection reported by the crypto gateway.
#[derive(Debug, Error)]
#[error("crypto gateway rejected the request: {0}")]
pub struct CryptError(pub String);
