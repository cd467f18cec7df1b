use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid token format")]
    Format,
    #[error("invalid base64 encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("missing or non-numeric exp claim")]
    MissingExp,
}
