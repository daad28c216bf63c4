#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use authrelay_core::{
    ClientConfig, Clients, HttpTransport, ManualClock, Token, TokenPair, TokenStore,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use wiremock::MockServer;

pub const FAR_FUTURE: &str = "2099-01-01T00:00:00Z";

pub fn token_json(value: &str) -> Value {
    json!({ "token": value, "expires": FAR_FUTURE })
}

pub fn tokens_body(access: &str, refresh: &str) -> Value {
    json!({ "tokens": { "access": token_json(access), "refresh": token_json(refresh) } })
}

pub fn unauthorized_body() -> Value {
    json!({ "code": 401, "message": "Please authenticate" })
}

pub fn user_json() -> Value {
    json!({ "id": "5ebac534954b54139806c112", "email": "fake@example.com", "firstName": "Ada", "role": "user" })
}

pub struct Harness {
    pub clients: Clients,
    pub store: Arc<TokenStore>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(server: &MockServer) -> Harness {
    let config = ClientConfig {
        base_url: server.uri(),
        request_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    };
    let store = Arc::new(TokenStore::in_memory());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap(),
    ));
    let transport = HttpTransport::new(config.base_url.clone(), config.request_timeout)
        .expect("Failed to build transport");
    let clients = Clients::from_transport(Arc::new(transport), store.clone(), clock.clone(), &config);
    Harness {
        clients,
        store,
        clock,
    }
}

/// Store an already-expired access token and a live refresh token.
pub fn seed_expired_session(store: &TokenStore, access: &str, refresh: &str) {
    let issued = Utc.with_ymd_and_hms(2026, 6, 1, 11, 0, 0).unwrap();
    let expired = Utc.with_ymd_and_hms(2026, 6, 1, 11, 30, 0).unwrap();
    let far = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
    store
        .set_tokens(&TokenPair {
            access: Token::new(access, issued, expired).unwrap(),
            refresh: Token::new(refresh, issued, far).unwrap(),
        })
        .expect("Failed to seed session");
}
