use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Claims carried by identity-provider access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // Account id
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>, // Provider role, e.g. "authenticated"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: usize,    // Expiry timestamp
}

/// Who is calling, as asserted by a validated credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account_id: Uuid,
    pub email: String,
}

/// Validates HS256 bearer tokens issued by the identity provider.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, ApiError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            log::debug!("rejected credential: {e}");
            ApiError::Unauthorized
        })?;
        let account_id = Uuid::parse_str(&data.claims.sub).map_err(|_| ApiError::Unauthorized)?;
        let email = data
            .claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or(ApiError::Unauthorized)?;
        Ok(Identity {
            account_id,
            email: email.trim().to_lowercase(),
        })
    }

    /// Resolves the caller from the `Authorization: Bearer` header.
    pub fn authenticate(&self, req: &HttpRequest) -> Result<Identity, ApiError> {
        let token = bearer_token(req).ok_or(ApiError::Unauthorized)?;
        self.verify(token)
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Mints a token the way the identity provider does. Local development and tests only.
pub fn issue_token(
    account_id: &Uuid,
    email: &str,
    secret: &str,
    ttl: Duration,
) -> Result<String, String> {
    let expiration = Utc::now()
        .checked_add_signed(ttl)
        .ok_or("token lifetime out of range")?
        .timestamp() as usize;

    let claims = Claims {
        sub: account_id.to_string(),
        email: Some(email.to_string()),
        role: Some("authenticated".to_string()),
        aud: None,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|_| "Failed to generate JWT".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    const SECRET: &str = "test-secret";

    #[test]
    fn valid_token_yields_identity() {
        let id = Uuid::new_v4();
        let token = issue_token(&id, "Pat@Example.com", SECRET, Duration::hours(1)).unwrap();
        let identity = JwtVerifier::new(SECRET, None).verify(&token).unwrap();
        assert_eq!(identity.account_id, id);
        assert_eq!(identity.email, "pat@example.com");
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = issue_token(&Uuid::new_v4(), "a@b.c", SECRET, Duration::hours(1)).unwrap();
        let err = JwtVerifier::new("other", None).verify(&token).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let token = issue_token(&Uuid::new_v4(), "a@b.c", SECRET, Duration::hours(-2)).unwrap();
        assert!(JwtVerifier::new(SECRET, None).verify(&token).is_err());
    }

    #[test]
    fn audience_is_enforced_when_configured() {
        let token = issue_token(&Uuid::new_v4(), "a@b.c", SECRET, Duration::hours(1)).unwrap();
        assert!(JwtVerifier::new(SECRET, Some("authenticated")).verify(&token).is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            JwtVerifier::new(SECRET, None).authenticate(&req),
            Err(ApiError::Unauthorized)
        ));
    }
}
