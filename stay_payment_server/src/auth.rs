//! JWT access token handling.
//!
//! The server only ever *verifies* tokens. Issuance lives with the accounts service, which shares the
//! HS256 signing secret. [`TokenIssuer`] exists for the test suite and operational tooling.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use stay_payment_engine::db_types::{Role, Roles};

use crate::{config::AuthConfig, errors::AuthError, errors::ServerError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id, as assigned by the accounts service.
    pub sub: String,
    pub email: String,
    pub roles: Roles,
    pub exp: i64,
}

impl JwtClaims {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// Owner-or-admin check against a user id.
    pub fn can_access_user(&self, user_id: &str) -> bool {
        self.is_admin() || self.sub == user_id
    }

    /// Owner-or-admin check against a customer email.
    pub fn can_access_email(&self, email: &str) -> bool {
        self.is_admin() || self.email.eq_ignore_ascii_case(email)
    }
}

/// The ACL middleware inserts validated claims into the request extensions; handlers extract them
/// from there.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req
            .extensions()
            .get::<JwtClaims>()
            .cloned()
            .ok_or(ServerError::AuthenticationError(AuthError::MissingToken));
        ready(claims)
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { decoding_key, validation: Validation::default() }
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        Ok(data.claims)
    }
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { encoding_key }
    }

    /// Issues a signed access token. The caller is responsible for having authenticated the user.
    pub fn issue_token(
        &self,
        user_id: &str,
        email: &str,
        roles: Roles,
        duration: Option<Duration>,
    ) -> Result<String, AuthError> {
        let duration = duration.unwrap_or_else(|| Duration::hours(24));
        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            roles,
            exp: (Utc::now() + duration).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}
