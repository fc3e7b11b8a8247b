use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("engine rejected request ({status}): {body}")]
    Engine { status: u16, body: String },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("config file does not exist: {0}")]
    ConfigFile(PathBuf),
}

impl Error {
    /// Whether the failure came from the engine client (network, protocol,
    /// or an engine-side rejection).
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Engine { .. })
    }
}
