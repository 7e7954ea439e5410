//! Error types for token generation.

/// Errors that can occur while configuring a [`TokenGenerator`](crate::TokenGenerator).
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The requested token size would not carry enough entropy.
    #[error("token of {requested} bytes is too short (minimum {minimum})")]
    TooShort {
        /// Bytes the caller asked for.
        requested: usize,
        /// Smallest size the generator accepts.
        minimum: usize,
    },

    /// The requested token size would not fit comfortably in a cookie.
    #[error("token of {requested} bytes is too long (maximum {maximum})")]
    TooLong {
        /// Bytes the caller asked for.
        requested: usize,
        /// Largest size the generator accepts.
        maximum: usize,
    },
}
