//! # Crumb
//!
//! Server-side cookie sessions: opaque bearer tokens in a cookie, records
//! in a pluggable store, expiry checked on every read, and a background
//! reaper that sweeps what has expired.
//!
//! This crate re-exports the pieces so an application depends on one
//! crate and one error type:
//!
//! | Crate | What it provides |
//! |-------|------------------|
//! | `crumb-token` | [`TokenGenerator`] |
//! | `crumb-cookie` | [`CookieCodec`], [`CookieAttributes`], [`SameSite`] |
//! | `crumb-store` | [`SessionStore`], [`SessionRecord`], [`MemoryStore`] |
//! | `crumb-reaper` | [`ReaperConfig`], [`ReaperStats`] |
//! | `crumb-session` | [`SessionManager`], [`SessionConfig`], [`Authentication`] |
//!
//! ## Quick Start
//!
//! ```rust
//! use crumb::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), CrumbError> {
//! let manager = SessionManager::builder(MemoryStore::<String>::new())
//!     .config(SessionConfig {
//!         auto_renew: true,
//!         ..SessionConfig::default()
//!     })
//!     .build()?;
//!
//! // Login: store the payload, send the cookie.
//! let opened = manager.open_session("alice".to_string()).await?;
//! let response_cookie = opened.set_cookie;
//!
//! // Next request: read the Cookie header back.
//! let request_cookie = format!("session_token={}", opened.session.token());
//! let auth = manager.authenticate_request(Some(request_cookie.as_str())).await;
//! assert!(auth.is_authenticated());
//! # let _ = response_cookie;
//!
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::CrumbError;

pub use crumb_cookie::{CookieAttributes, CookieCodec, CookieError, SameSite, parse_request_cookie};
pub use crumb_reaper::{ReaperConfig, ReaperStats};
#[cfg(feature = "memory")]
pub use crumb_store::MemoryStore;
pub use crumb_store::{SessionRecord, SessionStore, StoreError};
pub use crumb_session::{
    Authentication, Clock, ManualClock, OpenedSession, RejectReason, Session, SessionConfig,
    SessionError, SessionManager, SessionManagerBuilder, SystemClock,
};
pub use crumb_token::{TokenError, TokenGenerator};

/// Everything an application usually needs, in one import.
pub mod prelude {
    pub use crate::{
        Authentication, CrumbError, RejectReason, Session, SessionConfig, SessionManager,
        SessionRecord, SessionStore, StoreError,
    };
    #[cfg(feature = "memory")]
    pub use crate::MemoryStore;
}

/// Installs a `tracing` subscriber that prints to stdout, filtered by
/// `RUST_LOG` (default `info`).
///
/// Meant for binaries and demos; libraries should leave subscriber setup
/// to the application. Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Err means another subscriber got there first, which is fine.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
