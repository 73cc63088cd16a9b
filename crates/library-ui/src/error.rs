use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The API answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid API url: {0}")]
    InvalidUrl(String),

    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(err) => err.status().map(|s| s.as_u16()),
            ClientError::InvalidUrl(_) | ClientError::Export(_) => None,
        }
    }

    /// Build an `Api` error from a response body, preferring `msg` then
    /// `message`, falling back to `HTTP <status>`.
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                ["msg", "message"]
                    .iter()
                    .find_map(|key| value.get(*key)?.as_str().map(str::to_string))
            })
            .unwrap_or_else(|| format!("HTTP {status}"));
        ClientError::Api { status, message }
    }
}
