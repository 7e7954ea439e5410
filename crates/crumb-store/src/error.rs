/// Errors that can occur in a session store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached (connection refused, pool
    /// exhausted, timeout).
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    /// The backend was reached but the operation failed.
    #[error("session store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps any backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}
