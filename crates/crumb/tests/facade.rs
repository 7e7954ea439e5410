//! Integration tests for the `crumb` facade.
//!
//! These tests plug a custom backend into the manager through the public
//! API only, the way an application adding its own store would. The
//! backend keeps every record as a JSON document, so the tests also pin
//! the persisted record layout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use crumb::prelude::*;
use crumb::{ManualClock, SameSite};
use serde::Serialize;
use serde::de::DeserializeOwned;

// =========================================================================
// JSON document store
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
struct Cart {
    user: String,
    items: Vec<u32>,
}

/// Keeps serialized records keyed by token, like a document database.
#[derive(Default)]
struct JsonStore {
    docs: Mutex<HashMap<String, String>>,
    offline: AtomicBool,
}

impl JsonStore {
    fn online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("document store offline".into()));
        }
        Ok(())
    }

    fn raw(&self, id: &str) -> Option<String> {
        self.docs.lock().unwrap().get(id).cloned()
    }
}

impl<P> SessionStore<P> for JsonStore
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, id: &str) -> Result<Option<SessionRecord<P>>, StoreError> {
        self.online()?;
        let doc = self.docs.lock().unwrap().get(id).cloned();
        doc.map(|doc| serde_json::from_str(&doc).map_err(StoreError::backend))
            .transpose()
    }

    async fn set(&self, record: SessionRecord<P>) -> Result<(), StoreError> {
        self.online()?;
        let doc = serde_json::to_string(&record).map_err(StoreError::backend)?;
        self.docs.lock().unwrap().insert(record.id, doc);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.online()?;
        Ok(self.docs.lock().unwrap().remove(id).is_some())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.online()?;
        let mut docs = self.docs.lock().unwrap();
        let before = docs.len();
        docs.retain(|_, doc| {
            serde_json::from_str::<SessionRecord<serde_json::Value>>(doc)
                .map(|record| !record.is_expired_at(now))
                .unwrap_or(false)
        });
        Ok(before - docs.len())
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 20, 9, 30, 0).unwrap()
}

fn cart(user: &str) -> Cart {
    Cart {
        user: user.into(),
        items: vec![3, 1, 4],
    }
}

fn manager(
    store: Arc<JsonStore>,
    clock: Arc<ManualClock>,
) -> Result<SessionManager<Cart, Arc<JsonStore>>, CrumbError> {
    let manager = SessionManager::builder(store)
        .config(SessionConfig {
            token_name: "cart_session".into(),
            session_length: Duration::from_secs(30 * 60),
            domain: "shop.example".into(),
            same_site: SameSite::Strict,
            ..SessionConfig::default()
        })
        .clock(clock)
        .without_reaper()
        .build()?;
    Ok(manager)
}

// =========================================================================
// Custom backend through the facade
// =========================================================================

#[tokio::test]
async fn test_custom_store_full_lifecycle() -> Result<(), CrumbError> {
    let store = Arc::new(JsonStore::default());
    let clock = Arc::new(ManualClock::new(t0()));
    let manager = manager(Arc::clone(&store), Arc::clone(&clock))?;

    let opened = manager.open_session(cart("alice")).await?;
    assert_eq!(
        opened.set_cookie,
        format!(
            "cart_session={}; Domain=shop.example; Path=/; HttpOnly; Secure; SameSite=Strict; Expires=Thu, 20 Nov 2025 10:00:00 GMT",
            opened.session.token()
        )
    );

    let header = format!("cart_session={}", opened.session.token());
    let mut session = manager
        .authenticate_request(Some(header.as_str()))
        .await
        .into_session()
        .expect("fresh session");
    assert_eq!(session.payload(), &cart("alice"));

    session.payload_mut().items.push(9);
    manager.resave(&session).await?;
    clock.advance(TimeDelta::minutes(10));
    manager.renew_session(&mut session).await?;

    let reloaded = manager.authenticate(session.token()).await;
    assert_eq!(
        reloaded.session().map(|s| s.payload().items.clone()),
        Some(vec![3, 1, 4, 9])
    );
    assert_eq!(
        reloaded.session().map(|s| s.expires_at()),
        Some(t0() + TimeDelta::minutes(40))
    );

    let delete = manager.close_session(&session).await?;
    assert!(delete.starts_with("cart_session=; Domain=shop.example;"));
    assert!(delete.ends_with("Max-Age=0"));
    assert!(!manager.authenticate(session.token()).await.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn test_custom_store_persists_documented_record_layout() -> Result<(), CrumbError> {
    let store = Arc::new(JsonStore::default());
    let clock = Arc::new(ManualClock::new(t0()));
    let manager = manager(Arc::clone(&store), clock)?;

    let opened = manager.open_session(cart("bob")).await?;
    let doc: serde_json::Value =
        serde_json::from_str(&store.raw(opened.session.token()).expect("stored")).unwrap();

    assert_eq!(doc["id"], opened.session.token());
    assert_eq!(doc["expires_at"], "2025-11-20T10:00:00Z");
    assert_eq!(doc["payload"]["user"], "bob");
    Ok(())
}

#[tokio::test]
async fn test_custom_store_offline_errors_convert_to_crumb_error() {
    let store = Arc::new(JsonStore::default());
    let clock = Arc::new(ManualClock::new(t0()));
    let manager = manager(Arc::clone(&store), clock).unwrap();
    store.offline.store(true, Ordering::SeqCst);

    let result: Result<_, CrumbError> = manager
        .open_session(cart("carol"))
        .await
        .map_err(CrumbError::from);

    let err = result.expect_err("store is offline");
    assert!(err.is_store_failure());
    assert!(err.to_string().contains("document store offline"));
}

#[tokio::test]
async fn test_custom_store_remove_expired_keeps_live_documents() -> Result<(), CrumbError> {
    let store = JsonStore::default();
    let now = t0();
    for (id, expires_at, user) in [
        ("old", now - TimeDelta::seconds(1), "a"),
        ("edge", now, "b"),
        ("new", now + TimeDelta::seconds(1), "c"),
    ] {
        SessionStore::<Cart>::set(&store, SessionRecord::new(id, expires_at, cart(user))).await?;
    }

    let removed = SessionStore::<Cart>::remove_expired(&store, now).await?;

    assert_eq!(removed, 2);
    assert!(store.raw("new").is_some());
    assert_eq!(SessionStore::<Cart>::remove_expired(&store, now).await?, 0);
    Ok(())
}

// =========================================================================
// Errors and tracing
// =========================================================================

#[test]
fn test_build_bad_cookie_name_surfaces_as_crumb_error() {
    let result: Result<_, CrumbError> = SessionManager::<Cart, _>::builder(JsonStore::default())
        .config(SessionConfig {
            token_name: "bad name".into(),
            ..SessionConfig::default()
        })
        .without_reaper()
        .build()
        .map_err(CrumbError::from);

    assert!(matches!(
        result,
        Err(CrumbError::Session(crumb::SessionError::Cookie(_)))
    ));
}

#[test]
fn test_init_tracing_twice_is_harmless() {
    crumb::init_tracing();
    crumb::init_tracing();
}
