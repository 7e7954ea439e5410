//! Session configuration.

use std::time::Duration;

use crumb_cookie::{CookieAttributes, SameSite};
use serde::{Deserialize, Serialize};

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
///
/// Sensible defaults are provided; override just the fields you care
/// about with struct update syntax:
///
/// ```rust
/// use std::time::Duration;
/// use crumb_session::SessionConfig;
///
/// let config = SessionConfig {
///     session_length: Duration::from_secs(3600),
///     auto_renew: true,
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.token_name, "session_token");
/// ```
///
/// Durations (de)serialize as whole seconds, so the config can live in a
/// JSON or TOML file next to the rest of a service's settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie name the token travels under.
    pub token_name: String,

    /// How long a session lives after it is opened or renewed (the TTL).
    ///
    /// Default: 20 minutes.
    #[serde(with = "duration_secs")]
    pub session_length: Duration,

    /// Time between reaper sweeps.
    ///
    /// Default: 10 minutes. Removal of expired records may lag by up to
    /// this long; authentication does not depend on it.
    #[serde(with = "duration_secs")]
    pub reap_interval: Duration,

    /// `Domain` cookie attribute. Empty means omitted.
    pub domain: String,

    /// `Path` cookie attribute. Empty means omitted.
    pub path: String,

    /// Send the `HttpOnly` attribute.
    pub http_only: bool,

    /// Send the `Secure` attribute.
    pub secure: bool,

    /// `SameSite` attribute; [`SameSite::None`] omits it.
    pub same_site: SameSite,

    /// Extend the session on every successful authentication.
    pub auto_renew: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let cookie = CookieAttributes::default();
        Self {
            token_name: cookie.name,
            session_length: Duration::from_secs(20 * 60),
            reap_interval: Duration::from_secs(10 * 60),
            domain: cookie.domain,
            path: cookie.path,
            http_only: cookie.http_only,
            secure: cookie.secure,
            same_site: cookie.same_site,
            auto_renew: false,
        }
    }
}

impl SessionConfig {
    /// Checks values the manager can't work with.
    ///
    /// Cookie attributes are checked separately when the cookie codec is
    /// built; the reap interval is clamped by the reaper.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidConfig`] for a zero session length
    /// or an empty token name.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.session_length.is_zero() {
            return Err(SessionError::InvalidConfig(
                "session_length must be greater than zero".into(),
            ));
        }
        if self.token_name.is_empty() {
            return Err(SessionError::InvalidConfig(
                "token_name must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// The cookie attributes described by this config.
    pub fn cookie_attributes(&self) -> CookieAttributes {
        CookieAttributes {
            name: self.token_name.clone(),
            domain: self.domain.clone(),
            path: self.path.clone(),
            http_only: self.http_only,
            secure: self.secure,
            same_site: self.same_site,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
