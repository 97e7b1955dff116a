//! Test fixtures and factory functions for creating test data.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use vocab_backend::routes::auth::Claims;

/// Sign a one-hour token for a user.
pub fn token_for(user_id: Uuid, secret: &str) -> String {
    signed(user_id, secret, Utc::now().timestamp() + 3600)
}

/// Sign a token that expired an hour ago.
pub fn expired_token_for(user_id: Uuid, secret: &str) -> String {
    signed(user_id, secret, Utc::now().timestamp() - 3600)
}

fn signed(user_id: Uuid, secret: &str, exp: i64) -> String {
    let claims = Claims {
        sub: user_id,
        exp: exp as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign test token")
}

/// `n` distinct ids.
pub fn ids(n: usize) -> Vec<Uuid> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}
