//! Rendering and parsing of the session cookie.
//!
//! The header line layout is fixed:
//!
//! ```text
//! Name=Token;[ Domain=D;][ Path=P;][ HttpOnly;][ Secure;][ SameSite=S;] Expires=<RFC 1123>
//! ```
//!
//! and the delete variant keeps the same attributes, blanks the value, and
//! expires the cookie at the epoch:
//!
//! ```text
//! Name=;[ attributes] Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0
//! ```
//!
//! Everything except the token and the expiry date is known when the codec
//! is built, so that part (and the whole delete line) is rendered once in
//! [`CookieCodec::new`].

use chrono::{DateTime, Utc};

use crate::{CookieAttributes, CookieError, SameSite};

/// `strftime` pattern for RFC 1123 dates as used in `Expires`.
const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Expiry used by the delete variant.
const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Characters RFC 6265 forbids in a cookie name (besides CTLs and spaces).
const NAME_SEPARATORS: &[char] = &[
    '(', ')', '<', '>', '@', ',', ';', ':', '\\', '"', '/', '[', ']', '?',
    '=', '{', '}',
];

/// Renders `Set-Cookie` values for one cookie configuration.
///
/// Cheap to share: all methods take `&self`.
///
/// ## Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use crumb_cookie::{CookieAttributes, CookieCodec};
///
/// let codec = CookieCodec::new(CookieAttributes::default()).unwrap();
/// let expires = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
///
/// assert_eq!(
///     codec.render("abc", expires),
///     "session_token=abc; Path=/; HttpOnly; Secure; SameSite=Lax; Expires=Wed, 02 Jan 2030 03:04:05 GMT"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct CookieCodec {
    attributes: CookieAttributes,
    /// Pre-rendered `[ Domain=D;][ Path=P;]...` fragment.
    fragment: String,
    /// Pre-rendered delete line.
    delete: String,
}

impl CookieCodec {
    /// Validates the attributes and pre-renders the fixed parts.
    ///
    /// # Errors
    /// Returns [`CookieError::InvalidAttribute`] if the name is empty or
    /// not an RFC 6265 token, or if the domain or path contain control
    /// characters, `;`, or non-ASCII text.
    pub fn new(attributes: CookieAttributes) -> Result<Self, CookieError> {
        validate_name(&attributes.name)?;
        validate_value("domain", &attributes.domain, false)?;
        validate_value("path", &attributes.path, true)?;

        let fragment = render_fragment(&attributes);
        let delete = format!(
            "{}=;{fragment} Expires={EPOCH_EXPIRES}; Max-Age=0",
            attributes.name
        );

        Ok(Self {
            attributes,
            fragment,
            delete,
        })
    }

    /// Renders the `Set-Cookie` value carrying `token` until `expires`.
    ///
    /// `token` is expected to come from a `TokenGenerator`, whose alphabet
    /// is cookie-safe.
    pub fn render(&self, token: &str, expires: DateTime<Utc>) -> String {
        format!(
            "{}={token};{} Expires={}",
            self.attributes.name,
            self.fragment,
            expires.format(RFC1123_FORMAT)
        )
    }

    /// Returns the `Set-Cookie` value that tells the client to drop the
    /// cookie.
    pub fn render_delete(&self) -> &str {
        &self.delete
    }

    /// Extracts this codec's cookie from a request `Cookie` header.
    pub fn token_from_header<'a>(&self, header: &'a str) -> Option<&'a str> {
        parse_request_cookie(header, &self.attributes.name)
    }

    /// The cookie name.
    pub fn name(&self) -> &str {
        &self.attributes.name
    }

    /// The attributes this codec was built from.
    pub fn attributes(&self) -> &CookieAttributes {
        &self.attributes
    }
}

/// Finds the value of cookie `name` in a request `Cookie` header
/// (`a=1; b=2`).
///
/// Returns the first match. Surrounding double quotes are stripped, as
/// RFC 6265 allows quoted cookie values. Pairs without `=` are skipped.
pub fn parse_request_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key.trim() != name {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some(value)
    })
}

fn render_fragment(attributes: &CookieAttributes) -> String {
    let mut fragment = String::new();
    if !attributes.domain.is_empty() {
        fragment.push_str(&format!(" Domain={};", attributes.domain));
    }
    if !attributes.path.is_empty() {
        fragment.push_str(&format!(" Path={};", attributes.path));
    }
    if attributes.http_only {
        fragment.push_str(" HttpOnly;");
    }
    if attributes.secure {
        fragment.push_str(" Secure;");
    }
    if attributes.same_site != SameSite::None {
        fragment.push_str(&format!(" SameSite={};", attributes.same_site));
    }
    fragment
}

fn validate_name(name: &str) -> Result<(), CookieError> {
    if name.is_empty() {
        return Err(invalid("name", "must not be empty"));
    }
    if let Some(c) = name.chars().find(|c| {
        !c.is_ascii()
            || c.is_ascii_control()
            || c.is_ascii_whitespace()
            || NAME_SEPARATORS.contains(c)
    }) {
        return Err(invalid("name", format!("character {c:?} is not allowed")));
    }
    Ok(())
}

/// Checks a `Domain` or `Path` value. Paths may contain spaces, domains
/// may not.
fn validate_value(
    attribute: &'static str,
    value: &str,
    allow_space: bool,
) -> Result<(), CookieError> {
    if let Some(c) = value.chars().find(|&c| {
        !c.is_ascii() || c.is_ascii_control() || c == ';' || (c == ' ' && !allow_space)
    }) {
        return Err(invalid(attribute, format!("character {c:?} is not allowed")));
    }
    Ok(())
}

fn invalid(attribute: &'static str, reason: impl Into<String>) -> CookieError {
    CookieError::InvalidAttribute {
        attribute,
        reason: reason.into(),
    }
}
