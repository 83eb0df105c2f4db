use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Billing provider error: {0}")]
    Billing(String),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether this error was caused by what the user supplied rather than by
    /// a collaborator failing.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::UnsupportedFormat(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors() {
        assert!(Error::InvalidInput("print width".into()).is_user_error());
        assert!(Error::UnsupportedFormat("gif".into()).is_user_error());
        assert!(!Error::Storage("disk full".into()).is_user_error());
        assert!(!Error::InvalidSignature.is_user_error());
    }

    #[test]
    fn test_json_error_converts() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(err.to_string().starts_with("JSON serialization error"));
    }
}
