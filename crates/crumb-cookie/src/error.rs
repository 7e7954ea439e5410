//! Error types for the cookie layer.

/// Errors that can occur while building a [`CookieCodec`](crate::CookieCodec).
///
/// Every configurable attribute ends up verbatim in a response header, so
/// anything that could break out of the header line (CR, LF, other control
/// characters) or out of the attribute (`;`) is refused up front.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// A configured attribute contains characters that are not allowed.
    #[error("invalid cookie {attribute}: {reason}")]
    InvalidAttribute {
        /// Which attribute was rejected (`name`, `domain`, `path`).
        attribute: &'static str,
        /// Human-readable explanation.
        reason: String,
    },
}
