//! Cookie session lifecycle management for Crumb.
//!
//! This crate handles the lifecycle of a session cookie:
//!
//! 1. **Open** a session for a payload and hand back the `Set-Cookie` line
//! 2. **Authenticate** each request's token (expiry checked on every read)
//! 3. **Renew** or **resave** a live session
//! 4. **Close** it, handing back the delete cookie
//!
//! Expired records are swept by a background reaper owned by the
//! [`SessionManager`]; authentication never depends on that sweep having run.
//!
//! # How it fits in the stack
//!
//! ```text
//! Host request pipeline (above)  ← passes in the Cookie header, sends Set-Cookie
//!     ↕
//! Session layer (this crate)     ← SessionManager, SessionConfig, Clock
//!     ↕
//! crumb-token / crumb-cookie     ← fresh tokens, cookie lines
//! crumb-store / crumb-reaper     ← record storage, periodic sweeps
//! ```

#![allow(async_fn_in_trait)]

mod clock;
mod config;
mod error;
mod manager;
mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use error::SessionError;
pub use manager::{SessionManager, SessionManagerBuilder};
pub use session::{Authentication, OpenedSession, RejectReason, Session};
