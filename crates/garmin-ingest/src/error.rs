use thiserror::Error;

/// Main error type for garmin-ingest
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;

impl IngestError {
    /// Create a parse error from a message
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an identity error from a message
    pub fn identity(msg: impl Into<String>) -> Self {
        Self::Identity(msg.into())
    }

    /// Create a database error from a message
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IngestError::parse("bad trackpoint");
        assert_eq!(err.to_string(), "Parse error: bad trackpoint");

        let err = IngestError::identity("activity id is not numeric");
        assert_eq!(err.to_string(), "Identity error: activity id is not numeric");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: IngestError = io.into();
        assert!(matches!(err, IngestError::Io(_)));
    }
}
