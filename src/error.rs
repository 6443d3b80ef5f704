use thiserror::Error;

#[derive(Error, Debug)]
pub enum BirdError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("non-OK response ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("{0}")]
    Validation(String),
    #[error("{kind}: {message}")]
    Identity { kind: String, message: String },
    #[error("not signed in")]
    NotSignedIn,
    #[error("object storage error: {0}")]
    Storage(String),
    #[error("failed to read/write session file: {0}")]
    SessionIo(std::io::Error),
    #[error("failed to serialize/deserialize: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BirdError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}

impl From<s3::error::S3Error> for BirdError {
    fn from(value: s3::error::S3Error) -> Self {
        Self::Storage(value.to_string())
    }
}

pub type Result<T, E = BirdError> = std::result::Result<T, E>;
