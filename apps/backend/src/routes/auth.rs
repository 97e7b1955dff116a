//! Authentication middleware

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::AppState;

/// Claims carried by access tokens. Tokens are issued elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    pub exp: usize,
}

/// Verifies HS256 bearer tokens
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                ApiError::Unauthorized("Invalid token".to_string())
            })
    }
}

/// Authenticated user info stored in request extensions
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Auth middleware - verifies the bearer token from the Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization format".to_string()))?;

    let claims = state.tokens.verify(token)?;

    request.extensions_mut().insert(AuthenticatedUser {
        user_id: claims.sub,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: Uuid, exp: usize) -> String {
        let claims = Claims { sub, exp };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_one_hour() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn test_valid_token() {
        let user = Uuid::new_v4();
        let verifier = TokenVerifier::new("secret");
        let claims = verifier.verify(&token("secret", user, in_one_hour())).unwrap();
        assert_eq!(claims.sub, user);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = TokenVerifier::new("secret");
        let result = verifier.verify(&token("other", Uuid::new_v4(), in_one_hour()));
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = TokenVerifier::new("secret");
        let expired = (chrono::Utc::now().timestamp() - 3600) as usize;
        assert!(verifier
            .verify(&token("secret", Uuid::new_v4(), expired))
            .is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let verifier = TokenVerifier::new("secret");
        assert!(verifier.verify("not-a-jwt").is_err());
    }

    #[test]
    fn test_extra_claims_are_ignored() {
        let user = Uuid::new_v4();
        let payload = serde_json::json!({
            "sub": user,
            "exp": in_one_hour(),
            "email": "someone@example.com",
        });
        let signed = encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let claims = TokenVerifier::new("secret").verify(&signed).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(
            serde_json::to_value(&claims).unwrap(),
            serde_json::json!({ "sub": user, "exp": claims.exp })
        );
    }
}
