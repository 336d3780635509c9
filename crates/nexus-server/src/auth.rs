//! Credentials — password hashing, access token issue/verify, and the
//! auth endpoints (register, login, me).
//!
//! Tokens are HS256 JWTs with the user's email as `sub` and a hard expiry.
//! Passwords are argon2id hashes with embedded salt. The [`Authenticator`]
//! doubles as the [`IdentityResolver`] the subscription admission machine
//! consumes.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use nexus_protocol::{
    AccessError, LoginParams, RegisterParams, TokenResponse, User, UserId,
};
use nexus_realtime::IdentityResolver;
use nexus_store::Store;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User email.
    pub sub: String,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

/// Issues and verifies bearer credentials against the user table.
pub struct Authenticator {
    store: Store,
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl: Duration,
}

impl Authenticator {
    pub fn new(store: Store, secret: &[u8], token_ttl: Duration) -> Self {
        Self {
            store,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            token_ttl,
        }
    }

    pub fn hash_password(password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| {
                error!("password hashing failed: {err}");
                ApiError::Access(AccessError::Unauthenticated)
            })
    }

    pub fn verify_password(password: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    /// Sign a token for an authenticated user.
    pub fn issue_token(&self, email: &str) -> Result<String, ApiError> {
        let claims = Claims {
            sub: email.to_string(),
            exp: (Utc::now() + self.token_ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding).map_err(|err| {
            error!("token signing failed: {err}");
            ApiError::Access(AccessError::Unauthenticated)
        })
    }

    /// Verify a bearer token and load the user it names. Any decode
    /// failure, expired token, or missing user resolves to
    /// `Unauthenticated`.
    pub async fn authenticate(&self, token: &str) -> Result<User, AccessError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AccessError::Unauthenticated)?;
        let credentials = self
            .store
            .user_by_email(&data.claims.sub)
            .await
            .map_err(|err| {
                // Fail closed when the user lookup itself fails.
                error!("user lookup failed during authentication: {err}");
                AccessError::Unauthenticated
            })?;
        credentials
            .map(|c| c.user)
            .ok_or(AccessError::Unauthenticated)
    }
}

impl IdentityResolver for Authenticator {
    async fn resolve(&self, credential: &str) -> Result<UserId, AccessError> {
        self.authenticate(credential).await.map(|user| user.id)
    }
}

/// Pull the `Authorization: Bearer` credential out of request headers.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Access(AccessError::Unauthenticated))
}

/// Authenticate the caller of a REST request.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = bearer_token(headers)?;
    Ok(state.auth.authenticate(token).await?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

pub async fn register(
    State(state): State<AppState>,
    Json(params): Json<RegisterParams>,
) -> Result<Json<User>, ApiError> {
    let password_hash = Authenticator::hash_password(&params.password)?;
    let user = state.store.create_user(&params.email, &password_hash).await?;
    Ok(Json(user))
}

pub async fn login(
    State(state): State<AppState>,
    Json(params): Json<LoginParams>,
) -> Result<Json<TokenResponse>, ApiError> {
    let credentials = state.store.user_by_email(&params.email).await?;
    let valid = credentials
        .as_ref()
        .map(|c| Authenticator::verify_password(&params.password, &c.password_hash))
        .unwrap_or(false);
    if !valid {
        warn!("failed login attempt for {}", params.email);
        return Err(ApiError::Access(AccessError::Unauthenticated));
    }
    let token = state.auth.issue_token(&params.email)?;
    Ok(Json(TokenResponse::bearer(token)))
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let user = current_user(&state, &headers).await?;
    Ok(Json(user))
}
