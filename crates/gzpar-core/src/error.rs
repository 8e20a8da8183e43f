use thiserror::Error;

#[derive(Debug, Error)]
pub enum GzparError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid format: {0}")]
    Format(&'static str),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid block index (expected at least {expected}, actual {actual})")]
    InvalidBlockId { expected: u32, actual: u32 },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<GzparError>,
    },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GzparError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns true when this error (or the error it wraps) is a malformed-record error.
    pub fn is_format(&self) -> bool {
        match self {
            Self::Format(_) | Self::InvalidBlockId { .. } => true,
            Self::Context { source, .. } => source.is_format(),
            _ => false,
        }
    }
}
