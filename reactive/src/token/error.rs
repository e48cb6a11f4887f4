use crate::storage::{EngineError, QueryShape};

/// A row transform rejected its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError {
    message: String,
}

impl TransformError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transform failed: {}", self.message)
    }
}

impl std::error::Error for TransformError {}

/// A running stream failed to recompute one of its constituents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputeError {
    /// Index of the failing constituent within the token.
    pub constituent: usize,
    /// The underlying fetch or transform failure.
    pub message: String,
}

impl std::fmt::Display for RecomputeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "recomputing constituent {} failed: {}",
            self.constituent, self.message
        )
    }
}

impl std::error::Error for RecomputeError {}

/// Errors returned by query tokens and their streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token was already consumed by `snapshot` or `stream`.
    Consumed,
    /// Tokens of different shapes cannot be combined.
    Incompatible {
        expected: QueryShape,
        found: QueryShape,
    },
    /// The storage engine failed.
    Engine(EngineError),
    /// A row transform failed.
    Transform(TransformError),
    /// A running stream failed and has terminated.
    Recompute(RecomputeError),
    /// Streaming needs a Tokio runtime and none is running.
    RuntimeUnavailable,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Consumed => write!(f, "query token has already been consumed"),
            Self::Incompatible { expected, found } => write!(
                f,
                "cannot combine query tokens of different shapes: expected '{expected}', found '{found}'"
            ),
            Self::Engine(e) => write!(f, "storage engine error: {e}"),
            Self::Transform(e) => write!(f, "{e}"),
            Self::Recompute(e) => write!(f, "{e}"),
            Self::RuntimeUnavailable => write!(f, "no Tokio runtime is running"),
        }
    }
}

impl std::error::Error for TokenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine(e) => Some(e),
            Self::Transform(e) => Some(e),
            Self::Recompute(e) => Some(e),
            Self::Consumed | Self::Incompatible { .. } | Self::RuntimeUnavailable => None,
        }
    }
}

impl From<EngineError> for TokenError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl From<TransformError> for TokenError {
    fn from(e: TransformError) -> Self {
        Self::Transform(e)
    }
}
