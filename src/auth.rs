use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{
    Algorithm, DecodingKey, Header, Validation, decode, decode_header,
    errors::ErrorKind as JwtErrorKind, jwk::JwkSet,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, marker::PhantomData, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    config::AppConfig,
    error::{ApiError, ErrorKind},
};

/// Issuer expected on tokens signed with the local development secret.
pub const LOCAL_ISSUER: &str = "https://album-vault.local/";
/// Audience expected on tokens signed with the local development secret.
pub const LOCAL_AUDIENCE: &str = "album-vault";

/// AuthError
///
/// Why a request was refused by the token validator or the permission guard. The display
/// text is the human-readable description placed in the response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header is expected.")]
    MissingHeader,
    #[error("Authorization header must start with \"Bearer\".")]
    InvalidScheme,
    #[error("Token not found.")]
    MissingToken,
    #[error("Authorization header must be bearer token.")]
    MalformedHeader,
    #[error("Token expired.")]
    Expired,
    #[error("Incorrect claims. Please, check the audience and issuer.")]
    InvalidClaims,
    #[error("Unable to find the appropriate key.")]
    UnknownKey,
    #[error("Unable to parse authentication token.")]
    InvalidToken,
    #[error("Unable to fetch signing keys.")]
    KeysUnavailable,
    #[error("User does not have the right permissions")]
    PermissionDenied,
}

impl AuthError {
    /// Machine-readable code sent alongside the description.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "authorization_header_missing",
            AuthError::InvalidScheme
            | AuthError::MissingToken
            | AuthError::MalformedHeader
            | AuthError::UnknownKey
            | AuthError::InvalidToken => "invalid_header",
            AuthError::Expired => "token_expired",
            AuthError::InvalidClaims => "invalid_claims",
            AuthError::KeysUnavailable => "jwks_unavailable",
            AuthError::PermissionDenied => "unauthorized",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::PermissionDenied => ErrorKind::Forbidden,
            _ => ErrorKind::Unauthorized,
        }
    }
}

/// Claims
///
/// The part of a verified access token the service cares about. `iss`, `aud` and `exp`
/// are checked during decoding and not kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the identity provider's user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Granted permission scopes. A token without the claim has none.
    #[serde(default)]
    pub permissions: HashSet<String>,
}

impl Claims {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Fails with `PermissionDenied` unless `permission` was granted.
    pub fn require(&self, permission: &str) -> Result<(), AuthError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied)
        }
    }
}

/// bearer_token
///
/// Pulls the token out of an `Authorization` header value of the exact form `Bearer <token>`.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?;
    let parts: Vec<&str> = header.split_whitespace().collect();
    match parts.as_slice() {
        [] => Err(AuthError::MissingHeader),
        [scheme, ..] if *scheme != "Bearer" => Err(AuthError::InvalidScheme),
        [_] => Err(AuthError::MissingToken),
        [_, token] => Ok(*token),
        _ => Err(AuthError::MalformedHeader),
    }
}

// --- Signing keys ---

/// KeyProvider
///
/// Resolves the key and algorithm a token must be verified with, based on its header.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn key_for(&self, header: &Header) -> Result<(DecodingKey, Algorithm), AuthError>;
}

/// SharedSecretKeyProvider
///
/// HS256 verification with one shared secret. Used in local mode and in tests.
pub struct SharedSecretKeyProvider {
    secret: Vec<u8>,
}

impl SharedSecretKeyProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }
}

#[async_trait]
impl KeyProvider for SharedSecretKeyProvider {
    async fn key_for(&self, header: &Header) -> Result<(DecodingKey, Algorithm), AuthError> {
        if header.alg != Algorithm::HS256 {
            return Err(AuthError::InvalidToken);
        }
        Ok((DecodingKey::from_secret(&self.secret), Algorithm::HS256))
    }
}

/// JwksKeyProvider
///
/// RS256 verification against the identity provider's published JWKS. The key set is
/// cached after the first fetch and refetched once when a token names an unknown `kid`,
/// which covers key rotation.
pub struct JwksKeyProvider {
    client: reqwest::Client,
    jwks_url: String,
    cache: RwLock<Option<JwkSet>>,
}

impl JwksKeyProvider {
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            jwks_url: jwks_url.into(),
            cache: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> Result<JwkSet, reqwest::Error> {
        self.client
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await
    }

    async fn refresh(&self) -> Result<JwkSet, AuthError> {
        match self.fetch().await {
            Ok(jwks) => {
                *self.cache.write().await = Some(jwks.clone());
                Ok(jwks)
            }
            Err(e) => {
                tracing::error!(url = %self.jwks_url, error = %e, "failed to fetch JWKS");
                Err(AuthError::KeysUnavailable)
            }
        }
    }
}

#[async_trait]
impl KeyProvider for JwksKeyProvider {
    async fn key_for(&self, header: &Header) -> Result<(DecodingKey, Algorithm), AuthError> {
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken);
        }
        let kid = header.kid.as_deref().ok_or(AuthError::InvalidToken)?;

        let cached = self
            .cache
            .read()
            .await
            .as_ref()
            .and_then(|jwks| jwks.find(kid).cloned());

        let jwk = match cached {
            Some(jwk) => jwk,
            None => self
                .refresh()
                .await?
                .find(kid)
                .cloned()
                .ok_or(AuthError::UnknownKey)?,
        };

        let key = DecodingKey::from_jwk(&jwk).map_err(|_| AuthError::UnknownKey)?;
        Ok((key, Algorithm::RS256))
    }
}

// --- Token validation ---

/// TokenValidator
///
/// Verifies bearer tokens: signature, expiry, issuer and audience. Cheap to clone.
#[derive(Clone)]
pub struct TokenValidator {
    keys: Arc<dyn KeyProvider>,
    issuer: String,
    audience: String,
}

impl TokenValidator {
    pub fn new(
        keys: Arc<dyn KeyProvider>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    /// Identity provider JWKS when one is configured, the local shared secret otherwise.
    pub fn from_config(config: &AppConfig) -> Self {
        match &config.auth0 {
            Some(auth0) => Self::new(
                Arc::new(JwksKeyProvider::new(auth0.jwks_url())),
                auth0.issuer(),
                auth0.audience.clone(),
            ),
            None => Self::new(
                Arc::new(SharedSecretKeyProvider::new(&config.dev_jwt_secret)),
                LOCAL_ISSUER,
                LOCAL_AUDIENCE,
            ),
        }
    }

    /// Validates the raw `Authorization` header value.
    pub async fn validate_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = bearer_token(header)?;
        self.validate(token).await
    }

    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::InvalidToken)?;
        let (key, algorithm) = self.keys.key_for(&header).await?;

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
            JwtErrorKind::ExpiredSignature => AuthError::Expired,
            JwtErrorKind::InvalidIssuer
            | JwtErrorKind::InvalidAudience
            | JwtErrorKind::MissingRequiredClaim(_) => AuthError::InvalidClaims,
            _ => AuthError::InvalidToken,
        })?;

        Ok(data.claims)
    }
}

// --- Permission guard ---

/// Permission
///
/// Marker for one permission scope a route requires.
pub trait Permission: Send + Sync + 'static {
    const SCOPE: &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct PostAlbums;
#[derive(Debug, Clone, Copy)]
pub struct PatchAlbums;
#[derive(Debug, Clone, Copy)]
pub struct DeleteAlbums;
#[derive(Debug, Clone, Copy)]
pub struct PostImages;
#[derive(Debug, Clone, Copy)]
pub struct DeleteImages;

impl Permission for PostAlbums {
    const SCOPE: &'static str = "post:albums";
}

impl Permission for PatchAlbums {
    const SCOPE: &'static str = "patch:albums";
}

impl Permission for DeleteAlbums {
    const SCOPE: &'static str = "delete:albums";
}

impl Permission for PostImages {
    const SCOPE: &'static str = "post:images";
}

impl Permission for DeleteImages {
    const SCOPE: &'static str = "delete:images";
}

/// Authorized Extractor Result
///
/// Proof that the request carried a valid token granting `P::SCOPE`. Placing it first in
/// a handler's arguments makes the guard run before any body is read; the decoded claims
/// are passed through to the handler.
#[derive(Debug, Clone)]
pub struct Authorized<P: Permission> {
    pub claims: Claims,
    permission: PhantomData<P>,
}

impl<P: Permission> Authorized<P> {
    /// Runs the permission check on already-verified claims.
    pub fn check(claims: Claims) -> Result<Self, AuthError> {
        claims.require(P::SCOPE)?;
        Ok(Self {
            claims,
            permission: PhantomData,
        })
    }
}

/// Authorized Extractor Implementation
///
/// Rejection: 401 for a missing or unverifiable token, 403 for a missing scope.
impl<S, P> FromRequestParts<S> for Authorized<P>
where
    S: Send + Sync,
    TokenValidator: FromRef<S>,
    P: Permission,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let validator = TokenValidator::from_ref(state);

        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .map(|value| value.to_str().map_err(|_| AuthError::MalformedHeader))
            .transpose()?;

        let claims = validator.validate_header(header).await?;
        let authorized = Self::check(claims)?;

        tracing::debug!(
            subject = authorized.claims.sub.as_deref().unwrap_or("unknown"),
            permission = P::SCOPE,
            "request authorized"
        );
        Ok(authorized)
    }
}
