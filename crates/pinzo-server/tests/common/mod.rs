#![allow(dead_code)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, EncodingKey, Header};

use pinzo_server::auth::{JwtAuthenticator, JwtClaims};
use pinzo_server::{AppState, ServerConfig};

pub const SECRET: &str = "integration-test-secret";

/// Mint a session token for `sub`, valid for an hour.
pub fn token(sub: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = JwtClaims {
        sub: sub.to_string(),
        exp: now + 3600,
        iat: Some(now),
        iss: None,
        aud: None,
        email: Some(format!("{}@example.com", sub)),
        name: None,
        avatar_url: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn config() -> ServerConfig {
    ServerConfig::new("127.0.0.1:0").with_public_url("https://pinzo.example")
}

/// App state backed by a fresh in-memory store. Needs a Tokio runtime.
pub fn state() -> AppState {
    let auth = Arc::new(JwtAuthenticator::with_secret_str(SECRET));
    AppState::new(config(), auth).0
}
