//! Error types for the session layer.

use crumb_cookie::CookieError;
use crumb_store::StoreError;
use crumb_token::TokenError;

/// Errors returned by [`SessionManager`](crate::SessionManager) operations.
///
/// Authentication never returns one of these: an unknown, expired, or
/// unreadable token is an [`Authentication::Unauthenticated`](crate::Authentication)
/// outcome, not a failure.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The store failed while opening, renewing, saving, or closing a
    /// session.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The cookie configuration would produce an unsafe header.
    #[error(transparent)]
    Cookie(#[from] CookieError),

    /// The token generator configuration was rejected.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// A configuration value is out of range.
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),

    /// The session was closed or has expired, so it can't be renewed or
    /// saved. The caller should open a new one.
    #[error("session is no longer active")]
    NotActive,
}
