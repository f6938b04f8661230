/// Shared error type used across all space-node crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Network or HTTP failure without a structured node error body.
    #[error("transport: {0}")]
    Transport(String),

    /// Structured error body returned by a space node.
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    /// Nonce or device-name mismatch in a handshake response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("decryption: {0}")]
    Decryption(String),

    /// Key parsing, encryption or key-derivation failure.
    #[error("crypto: {0}")]
    Crypto(String),

    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("catalog: {0}")]
    Catalog(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a `Node` error from a parsed error body.
    pub fn node(code: i64, message: impl Into<String>) -> Self {
        Error::Node {
            code,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
