//! Cookie encoding for Crumb sessions.
//!
//! This crate defines how a session token travels to and from the client:
//!
//! - **Attributes** ([`CookieAttributes`], [`SameSite`]): the configurable
//!   parts of the cookie (name, domain, path, flags).
//! - **Codec** ([`CookieCodec`]): renders `Set-Cookie` header values for a
//!   live session and for deletion, and reads the token back out of a
//!   request `Cookie` header.
//! - **Errors** ([`CookieError`]): configuration that would produce an
//!   unsafe header.
//!
//! # Architecture
//!
//! The cookie layer knows nothing about stores or expiry rules. It turns
//! a token and a timestamp into a header line, and back.
//!
//! ```text
//! Session Manager (token, expires_at) → Cookie Codec → "Set-Cookie" value
//! ```

mod attributes;
mod codec;
mod error;

pub use attributes::{CookieAttributes, SameSite};
pub use codec::{CookieCodec, parse_request_cookie};
pub use error::CookieError;
