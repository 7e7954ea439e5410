//! Session types: what the manager hands back to request handlers.
//!
//! - [`Session`]: a live session the caller may read, edit, renew, save,
//!   or close.
//! - [`OpenedSession`]: a brand-new session plus the cookie that carries
//!   its token to the client.
//! - [`Authentication`]: the outcome of checking a request's token.

use std::fmt;

use chrono::{DateTime, Utc};
use crumb_store::SessionRecord;
use crumb_token::token_prefix;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A session retrieved from (or just written to) the store.
///
/// The payload is freely editable. The expiry is not: it only moves
/// through [`SessionManager::renew_session`](crate::SessionManager::renew_session),
/// which never moves it backwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Session<P> {
    record: SessionRecord<P>,
}

impl<P> Session<P> {
    pub(crate) fn from_record(record: SessionRecord<P>) -> Self {
        Self { record }
    }

    pub(crate) fn record(&self) -> &SessionRecord<P> {
        &self.record
    }

    pub(crate) fn set_expires_at(&mut self, expires_at: DateTime<Utc>) {
        self.record.expires_at = expires_at;
    }

    /// The session token (the cookie value).
    pub fn token(&self) -> &str {
        &self.record.id
    }

    /// When the session stops being valid (UTC).
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.record.expires_at
    }

    /// Returns `true` if the session is still valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.record.is_expired_at(now)
    }

    /// Application data.
    pub fn payload(&self) -> &P {
        &self.record.payload
    }

    /// Mutable application data. Call
    /// [`SessionManager::resave`](crate::SessionManager::resave) (or
    /// `renew_session`) to persist changes.
    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.record.payload
    }

    /// Consumes the session, returning its payload.
    pub fn into_payload(self) -> P {
        self.record.payload
    }
}

/// Debug output never shows the full token.
impl<P: fmt::Debug> fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &format_args!("{}…", token_prefix(&self.record.id)))
            .field("expires_at", &self.record.expires_at)
            .field("payload", &self.record.payload)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// OpenedSession
// ---------------------------------------------------------------------------

/// Result of [`SessionManager::open_session`](crate::SessionManager::open_session).
#[derive(Debug, Clone)]
pub struct OpenedSession<P> {
    /// The new session.
    pub session: Session<P>,
    /// `Set-Cookie` value to attach to the response.
    pub set_cookie: String,
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Why a request was not authenticated.
///
/// Callers should treat every reason the same way (the request has no
/// session). The distinction exists for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The request carried no token.
    Missing,
    /// The token can't have been issued by this manager.
    Malformed,
    /// No record exists for the token.
    NotFound,
    /// The record exists but has expired.
    Expired,
    /// The store couldn't be read.
    StoreUnavailable,
}

impl RejectReason {
    /// Short label for log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Malformed => "malformed",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::StoreUnavailable => "store_unavailable",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`SessionManager::authenticate`](crate::SessionManager::authenticate).
///
/// Either way, `set_cookie` is the header value (if any) the caller should
/// add to its response:
/// - authenticated with auto-renew on → the refreshed session cookie
/// - unauthenticated with a malformed, unknown, or expired token → the
///   delete cookie
/// - unauthenticated because no token was sent → nothing
/// - unauthenticated because the store couldn't be read → nothing. The
///   client keeps its cookie, so a store outage doesn't log everyone out;
///   the token is checked again on the next request.
#[derive(Debug, Clone)]
pub enum Authentication<P> {
    /// The token maps to a live session.
    Authenticated {
        /// The session.
        session: Session<P>,
        /// Renewed cookie, when auto-renew is on and the renewal was saved.
        set_cookie: Option<String>,
    },
    /// No usable session.
    Unauthenticated {
        /// Why (for logging only).
        reason: RejectReason,
        /// Delete cookie telling the client to drop its token. `None` for
        /// [`RejectReason::Missing`] and [`RejectReason::StoreUnavailable`].
        set_cookie: Option<String>,
    },
}

impl<P> Authentication<P> {
    /// Returns `true` for [`Authentication::Authenticated`].
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// The session, if authenticated.
    pub fn session(&self) -> Option<&Session<P>> {
        match self {
            Self::Authenticated { session, .. } => Some(session),
            Self::Unauthenticated { .. } => None,
        }
    }

    /// Consumes the outcome, returning the session if authenticated.
    pub fn into_session(self) -> Option<Session<P>> {
        match self {
            Self::Authenticated { session, .. } => Some(session),
            Self::Unauthenticated { .. } => None,
        }
    }

    /// The `Set-Cookie` value to send with the response, if any.
    pub fn set_cookie(&self) -> Option<&str> {
        match self {
            Self::Authenticated { set_cookie, .. } | Self::Unauthenticated { set_cookie, .. } => {
                set_cookie.as_deref()
            }
        }
    }

    /// The rejection reason, if unauthenticated.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Authenticated { .. } => None,
            Self::Unauthenticated { reason, .. } => Some(*reason),
        }
    }
}
