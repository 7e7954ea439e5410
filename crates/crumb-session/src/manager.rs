//! The session manager: issues, checks, renews, and closes sessions.
//!
//! This is the central piece of Crumb. It ties together:
//! - a [`TokenGenerator`] for fresh tokens
//! - a [`CookieCodec`] for the `Set-Cookie` lines handed back to callers
//! - a [`SessionStore`] that owns every record
//! - a reaper task that sweeps expired records in the background
//!
//! # Concurrency note
//!
//! Every operation takes `&self`, so one manager can be shared (usually in
//! an `Arc`) by all request handlers. The manager keeps no per-session
//! state of its own: each call reads or writes the store and returns.
//! Two concurrent writes to the same token race at "last write wins",
//! unless the backend offers something stronger.
//!
//! # Clock
//!
//! Every expiry decision, including the reaper's, uses the manager's
//! [`Clock`]. A record is valid while `now < expires_at`.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use crumb_cookie::CookieCodec;
use crumb_reaper::{ReaperConfig, ReaperHandle, ReaperStats};
use crumb_store::{SessionRecord, SessionStore};
use crumb_token::{TokenGenerator, is_well_formed, token_prefix};

use crate::{
    Authentication, Clock, OpenedSession, RejectReason, Session, SessionConfig, SessionError,
    SystemClock,
};

/// Manages the lifecycle of cookie sessions carrying a payload `P`.
///
/// ## Lifecycle
///
/// ```text
/// open_session() ──→ authenticate() ──→ renew_session() / resave()
///        │                  │                     │
///        ▼                  ▼                     ▼
///   [record in store] ── expires_at passes ──→ [expired]
///        │                                        │
///        ▼                                        ▼
///  close_session()                          reaper sweep
/// ```
///
/// ## Example
///
/// ```rust
/// use crumb_session::SessionManager;
/// use crumb_store::MemoryStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), crumb_session::SessionError> {
/// let manager = SessionManager::builder(MemoryStore::<String>::new()).build()?;
///
/// let opened = manager.open_session("alice".to_string()).await?;
/// let auth = manager.authenticate(opened.session.token()).await;
/// assert_eq!(auth.session().map(|s| s.payload().as_str()), Some("alice"));
///
/// manager.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct SessionManager<P, S> {
    store: Arc<S>,
    config: SessionConfig,
    /// `config.session_length` as a chrono delta, checked at build time.
    ttl: TimeDelta,
    codec: CookieCodec,
    tokens: TokenGenerator,
    clock: Arc<dyn Clock>,
    /// `None` once shut down, or when built without a reaper.
    reaper: Mutex<Option<ReaperHandle>>,
    _payload: PhantomData<fn() -> P>,
}

impl<P, S> SessionManager<P, S>
where
    P: Clone + Send + Sync + 'static,
    S: SessionStore<P>,
{
    /// Starts building a manager backed by `store`.
    pub fn builder(store: S) -> SessionManagerBuilder<P, S> {
        SessionManagerBuilder::new(store)
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Opens a new session holding `payload`.
    ///
    /// Any earlier session for the same user stays open; close it
    /// explicitly if it should end.
    ///
    /// # Errors
    /// Returns [`SessionError::Store`] if the record can't be written.
    pub async fn open_session(&self, payload: P) -> Result<OpenedSession<P>, SessionError> {
        let token = self.tokens.generate();
        let expires_at = self.expiry_from(self.clock.now());
        let record = SessionRecord::new(token, expires_at, payload);

        self.store().set(record.clone()).await?;

        let set_cookie = self.codec.render(&record.id, expires_at);
        tracing::info!(token = token_prefix(&record.id), %expires_at, "session opened");

        Ok(OpenedSession {
            session: Session::from_record(record),
            set_cookie,
        })
    }

    /// Extends `session` to `now + session_length`, saves it along with its
    /// current payload, and returns the refreshed `Set-Cookie` line.
    ///
    /// The expiry never moves backwards, even if the clock does.
    ///
    /// # Errors
    /// - [`SessionError::NotActive`]: the session was closed or has expired
    /// - [`SessionError::Store`]: the store failed
    pub async fn renew_session(&self, session: &mut Session<P>) -> Result<String, SessionError> {
        let now = self.clock.now();
        self.ensure_active(session.token(), now).await?;
        self.write_renewal(session, now).await
    }

    /// Saves the session's current payload without touching its expiry.
    ///
    /// # Errors
    /// - [`SessionError::NotActive`]: the session was closed or has expired
    /// - [`SessionError::Store`]: the store failed
    pub async fn resave(&self, session: &Session<P>) -> Result<(), SessionError> {
        let now = self.clock.now();
        self.ensure_active(session.token(), now).await?;

        self.store().set(session.record().clone()).await?;
        tracing::debug!(token = token_prefix(session.token()), "session saved");
        Ok(())
    }

    /// Closes `session` and returns the delete cookie line.
    ///
    /// Closing an already-closed session is not an error.
    ///
    /// # Errors
    /// Returns [`SessionError::Store`] if the store failed.
    pub async fn close_session(&self, session: &Session<P>) -> Result<String, SessionError> {
        self.close_token(session.token()).await
    }

    /// Closes whatever session `token` names. For logout endpoints that
    /// only have the cookie value.
    ///
    /// # Errors
    /// Returns [`SessionError::Store`] if the store failed.
    pub async fn close_token(&self, token: &str) -> Result<String, SessionError> {
        let existed = self.store().remove(token).await?;
        tracing::info!(token = token_prefix(token), existed, "session closed");
        Ok(self.codec.render_delete().to_owned())
    }

    /// Checks `token` against the store.
    ///
    /// Never fails: an unknown, expired, malformed, or unreadable token is
    /// an [`Authentication::Unauthenticated`] outcome. When the client is
    /// holding a token that will never work again, the outcome carries the
    /// delete cookie. A store failure carries no cookie: the token may
    /// still be good once the store is back.
    ///
    /// With `auto_renew` on, a successful check also renews the session and
    /// carries the refreshed cookie. If that renewal can't be saved, the
    /// request is still authenticated and the cookie is left unchanged.
    pub async fn authenticate(&self, token: &str) -> Authentication<P> {
        if token.is_empty() {
            return self.reject(token, RejectReason::Missing);
        }
        if !is_well_formed(token) {
            return self.reject(token, RejectReason::Malformed);
        }

        let now = self.clock.now();
        let record = match self.store().get(token).await {
            Ok(Some(record)) => record,
            Ok(None) => return self.reject(token, RejectReason::NotFound),
            Err(e) => {
                tracing::warn!(
                    token = token_prefix(token),
                    error = %e,
                    "session lookup failed, treating request as unauthenticated"
                );
                return self.reject(token, RejectReason::StoreUnavailable);
            }
        };
        if record.is_expired_at(now) {
            return self.reject(token, RejectReason::Expired);
        }

        let mut session = Session::from_record(record);
        let set_cookie = if self.config.auto_renew {
            match self.write_renewal(&mut session, now).await {
                Ok(cookie) => Some(cookie),
                Err(e) => {
                    tracing::warn!(
                        token = token_prefix(token),
                        error = %e,
                        "auto-renew failed, keeping current expiry"
                    );
                    None
                }
            }
        } else {
            None
        };

        tracing::debug!(
            token = token_prefix(token),
            renewed = set_cookie.is_some(),
            "session authenticated"
        );
        Authentication::Authenticated {
            session,
            set_cookie,
        }
    }

    /// Pulls the session token out of a request's `Cookie` header and
    /// authenticates it.
    ///
    /// A request without the cookie gets no delete cookie back, since
    /// there's nothing to clear.
    pub async fn authenticate_request(&self, cookie_header: Option<&str>) -> Authentication<P> {
        let token = cookie_header
            .and_then(|header| self.codec.token_from_header(header))
            .unwrap_or_default();
        self.authenticate(token).await
    }

    /// Stops the reaper and waits for an in-flight sweep to finish.
    ///
    /// The manager keeps working afterwards; expired records just stop
    /// being swept. Calling this twice is a no-op.
    pub async fn shutdown(&self) {
        let handle = self
            .reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut handle) = handle {
            handle.shutdown().await;
        }
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    /// The configuration the manager was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The codec producing this manager's cookie lines.
    pub fn cookie_codec(&self) -> &CookieCodec {
        &self.codec
    }

    /// Reaper counters, or `None` if the reaper isn't running.
    pub fn reaper_stats(&self) -> Option<ReaperStats> {
        self.reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(ReaperHandle::stats)
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    async fn ensure_active(&self, token: &str, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.store().get(token).await? {
            Some(record) if !record.is_expired_at(now) => Ok(()),
            _ => Err(SessionError::NotActive),
        }
    }

    async fn write_renewal(
        &self,
        session: &mut Session<P>,
        now: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let expires_at = session.expires_at().max(self.expiry_from(now));
        let mut record = session.record().clone();
        record.expires_at = expires_at;

        self.store().set(record).await?;
        session.set_expires_at(expires_at);

        tracing::debug!(token = token_prefix(session.token()), %expires_at, "session renewed");
        Ok(self.codec.render(session.token(), expires_at))
    }

    fn reject(&self, token: &str, reason: RejectReason) -> Authentication<P> {
        // Nothing to clear if the client sent nothing, and a store outage
        // says nothing about whether the token is still good.
        let set_cookie = match reason {
            RejectReason::Missing | RejectReason::StoreUnavailable => None,
            RejectReason::Malformed | RejectReason::NotFound | RejectReason::Expired => {
                Some(self.codec.render_delete().to_owned())
            }
        };
        tracing::debug!(
            token = token_prefix(token),
            reason = reason.as_str(),
            "request not authenticated"
        );
        Authentication::Unauthenticated { reason, set_cookie }
    }
}

impl<P, S> std::fmt::Debug for SessionManager<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`SessionManager`].
///
/// Everything except the store has a default: [`SessionConfig::default`],
/// the system clock, an OS-seeded token generator, and a reaper sweeping
/// every `config.reap_interval`.
pub struct SessionManagerBuilder<P, S> {
    store: S,
    config: SessionConfig,
    clock: Option<Arc<dyn Clock>>,
    tokens: Option<TokenGenerator>,
    token_bytes: Option<usize>,
    reaper_config: Option<ReaperConfig>,
    reaper_enabled: bool,
    _payload: PhantomData<fn() -> P>,
}

impl<P, S> SessionManagerBuilder<P, S>
where
    P: Clone + Send + Sync + 'static,
    S: SessionStore<P>,
{
    fn new(store: S) -> Self {
        Self {
            store,
            config: SessionConfig::default(),
            clock: None,
            tokens: None,
            token_bytes: None,
            reaper_config: None,
            reaper_enabled: true,
            _payload: PhantomData,
        }
    }

    /// Sets the session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the clock used for every expiry decision.
    pub fn clock<C: Clock>(mut self, clock: Arc<C>) -> Self {
        self.clock = Some(clock as Arc<dyn Clock>);
        self
    }

    /// Sets the token generator.
    pub fn token_generator(mut self, tokens: TokenGenerator) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Sets how many random bytes go into each token (default 32,
    /// minimum 24).
    pub fn token_bytes(mut self, byte_len: usize) -> Self {
        self.token_bytes = Some(byte_len);
        self
    }

    /// Overrides the reaper settings. The interval defaults to
    /// `config.reap_interval`.
    pub fn reaper_config(mut self, reaper_config: ReaperConfig) -> Self {
        self.reaper_config = Some(reaper_config);
        self
    }

    /// Builds without a reaper, for backends that expire records on their
    /// own (key TTLs, for example).
    pub fn without_reaper(mut self) -> Self {
        self.reaper_enabled = false;
        self
    }

    /// Validates everything and starts the reaper.
    ///
    /// # Errors
    /// - [`SessionError::InvalidConfig`]: bad config values, or a reaper
    ///   requested outside a Tokio runtime
    /// - [`SessionError::Cookie`]: cookie attributes that would produce an
    ///   unsafe header
    /// - [`SessionError::Token`]: a token length below the minimum
    pub fn build(self) -> Result<SessionManager<P, S>, SessionError> {
        self.config.validate()?;
        let ttl = TimeDelta::from_std(self.config.session_length).map_err(|_| {
            SessionError::InvalidConfig("session_length is out of range".into())
        })?;
        let codec = CookieCodec::new(self.config.cookie_attributes())?;

        let tokens = self.tokens.unwrap_or_default();
        let tokens = match self.token_bytes {
            Some(byte_len) => tokens.with_byte_len(byte_len)?,
            None => tokens,
        };

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let store = Arc::new(self.store);

        let reaper = if self.reaper_enabled {
            tokio::runtime::Handle::try_current().map_err(|_| {
                SessionError::InvalidConfig(
                    "the reaper needs a Tokio runtime; build inside one or call without_reaper()"
                        .into(),
                )
            })?;
            let reaper_config = self
                .reaper_config
                .unwrap_or_else(|| ReaperConfig::every(self.config.reap_interval));
            let reaper_clock = Arc::clone(&clock);
            Some(crumb_reaper::spawn::<P, _, _>(
                Arc::clone(&store),
                reaper_config,
                move || reaper_clock.now(),
            ))
        } else {
            None
        };

        tracing::info!(
            token_name = %self.config.token_name,
            session_length_secs = self.config.session_length.as_secs(),
            auto_renew = self.config.auto_renew,
            reaper = reaper.is_some(),
            "session manager ready"
        );

        Ok(SessionManager {
            store,
            config: self.config,
            ttl,
            codec,
            tokens,
            clock,
            reaper: Mutex::new(reaper),
            _payload: PhantomData,
        })
    }
}

// =========================================================================
// Tests
// =========================================================================
