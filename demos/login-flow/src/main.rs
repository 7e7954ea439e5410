use std::time::Duration;

use crumb::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// App types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: u64,
    name: String,
    visits: u32,
}

/// What a handler hands back to the HTTP layer.
#[derive(Debug)]
pub struct Response {
    status: u16,
    body: String,
    set_cookie: Option<String>,
}

impl Response {
    fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            set_cookie: None,
        }
    }

    fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.set_cookie = cookie;
        self
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub struct App {
    sessions: SessionManager<User, MemoryStore<User>>,
}

impl App {
    pub fn new(config: SessionConfig) -> Result<Self, CrumbError> {
        let sessions = SessionManager::builder(MemoryStore::new())
            .config(config)
            .build()?;
        Ok(Self { sessions })
    }

    /// POST /login
    pub async fn login(&self, id: u64, name: &str) -> Result<Response, CrumbError> {
        let user = User {
            id,
            name: name.into(),
            visits: 0,
        };
        let opened = self.sessions.open_session(user).await?;
        Ok(Response::new(200, format!("welcome, {name}"))
            .with_cookie(Some(opened.set_cookie)))
    }

    /// GET /me
    pub async fn me(&self, cookie: Option<&str>) -> Result<Response, CrumbError> {
        match self.sessions.authenticate_request(cookie).await {
            Authentication::Authenticated { mut session, set_cookie } => {
                session.payload_mut().visits += 1;
                self.sessions.resave(&session).await?;
                let body = serde_json::to_string(session.payload()).unwrap_or_default();
                Ok(Response::new(200, body).with_cookie(set_cookie))
            }
            Authentication::Unauthenticated { reason, set_cookie } => {
                tracing::info!(%reason, "rejected /me");
                Ok(Response::new(401, "please log in").with_cookie(set_cookie))
            }
        }
    }

    /// POST /logout
    pub async fn logout(&self, cookie: Option<&str>) -> Result<Response, CrumbError> {
        let session = match self.sessions.authenticate_request(cookie).await {
            Authentication::Authenticated { session, .. } => session,
            // Still clear a stale or unknown cookie on the way out.
            Authentication::Unauthenticated { set_cookie, .. } => {
                return Ok(Response::new(204, "").with_cookie(set_cookie));
            }
        };
        let delete = self.sessions.close_session(&session).await?;
        Ok(Response::new(200, "bye").with_cookie(Some(delete)))
    }

    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }
}

/// What a browser would send back: just `name=value` from a `Set-Cookie` line.
fn cookie_header(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    crumb::init_tracing();

    let app = App::new(SessionConfig {
        session_length: Duration::from_secs(15 * 60),
        auto_renew: true,
        secure: false,
        ..SessionConfig::default()
    })?;

    let login = app.login(7, "ada").await?;
    let set_cookie = login.set_cookie.unwrap_or_default();
    println!(
        "login  -> {} {}\n         Set-Cookie: {set_cookie}",
        login.status, login.body
    );

    let cookie = cookie_header(&set_cookie);
    for _ in 0..2 {
        let me = app.me(Some(cookie.as_str())).await?;
        println!("me     -> {} {}", me.status, me.body);
    }

    let logout = app.logout(Some(cookie.as_str())).await?;
    println!(
        "logout -> {} {}\n         Set-Cookie: {}",
        logout.status,
        logout.body,
        logout.set_cookie.unwrap_or_default()
    );

    let after = app.me(Some(cookie.as_str())).await?;
    println!("me     -> {} {}", after.status, after.body);

    app.shutdown().await;
    Ok(())
}
