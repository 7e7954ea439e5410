//! Unified error type for Crumb.

use crumb_cookie::CookieError;
use crumb_session::SessionError;
use crumb_store::StoreError;
use crumb_token::TokenError;

/// Top-level error that wraps every crate-specific error.
///
/// When using the `crumb` facade you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CrumbError {
    /// A session operation failed (store outage, bad config, closed session).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A store call made directly by the application failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A cookie codec was built from unsafe attributes.
    #[error(transparent)]
    Cookie(#[from] CookieError),

    /// A token generator was configured outside the allowed length range.
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl CrumbError {
    /// Returns `true` if the error came from the store being unreachable
    /// or failing, whether directly or through a session operation.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Session(SessionError::Store(_))
        )
    }
}
