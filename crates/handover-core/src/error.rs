use thiserror::Error;

/// Error taxonomy for every operation in the platform. The HTTP layer maps
/// variants onto status codes: Validation → 400, NotFound → 404,
/// Conflict → 409, Parse/Upstream/Store → 500.
#[derive(Debug, Error)]
pub enum HandoverError {
    /// Malformed or missing required input.
    #[error("{0}")]
    Validation(String),
    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The requested state transition is not legal from the current state.
    #[error("{0}")]
    Conflict(String),
    /// The model response did not contain the expected envelope.
    #[error("failed to parse model response: {0}")]
    Parse(String),
    /// The LLM call itself was rejected or timed out.
    #[error("llm request failed: {0}")]
    Upstream(String),
    /// The document store failed.
    #[error("storage error: {0}")]
    Store(String),
}

impl HandoverError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{entity} not found: {id}"))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn upstream(err: anyhow::Error) -> Self {
        Self::Upstream(err.to_string())
    }

    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HandoverError>;

/// Internal shorthand for mapping store-layer failures.
pub(crate) trait StoreErrExt<T> {
    fn store_err(self) -> Result<T>;
}

impl<T> StoreErrExt<T> for anyhow::Result<T> {
    fn store_err(self) -> Result<T> {
        self.map_err(HandoverError::store)
    }
}
