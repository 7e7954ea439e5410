//! Cookie attribute configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SameSite
// ---------------------------------------------------------------------------

/// The `SameSite` cookie attribute.
///
/// `None` is the "not configured" value: the attribute is left out of the
/// header entirely and the browser applies its own default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    /// Only sent on same-site requests.
    Strict,
    /// Sent on same-site requests and top-level cross-site navigations.
    #[default]
    Lax,
    /// Attribute omitted.
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// CookieAttributes
// ---------------------------------------------------------------------------

/// Everything about the session cookie except its value and expiry.
///
/// Empty `domain` / `path` strings mean "not configured" and the attribute
/// is omitted from the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieAttributes {
    /// Cookie name the token is stored under.
    pub name: String,
    /// `Domain` attribute.
    pub domain: String,
    /// `Path` attribute.
    pub path: String,
    /// Whether to send `HttpOnly`.
    pub http_only: bool,
    /// Whether to send `Secure`.
    pub secure: bool,
    /// `SameSite` attribute.
    pub same_site: SameSite,
}

impl CookieAttributes {
    /// Default cookie name.
    pub const DEFAULT_NAME: &'static str = "session_token";
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            domain: String::new(),
            path: "/".to_string(),
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
        }
    }
}
