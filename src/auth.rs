use crate::config::TokenTransport;
use crate::error::ApiError;
use crate::utils::get_token_cookie;
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Nothing is asserted beyond the signature itself, plus `exp` when a lifetime is configured.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

/// Issues and verifies HS256 tokens with the service-wide signing secret.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: Option<u64>,
}

impl TokenAuthority {
    pub fn new(secret: &str, ttl_secs: Option<u64>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = ttl_secs.is_some();
        if ttl_secs.is_some() {
            validation.set_required_spec_claims(&["exp"]);
        }
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> Option<u64> {
        self.ttl_secs
    }

    pub fn issue_token(&self) -> Result<String, TokenError> {
        let claims = Claims {
            exp: self
                .ttl_secs
                .map(|ttl| Utc::now().timestamp().saturating_add_unsigned(ttl)),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    /// `Ok(false)` for a well-formed token that fails verification, `Err` when it cannot be parsed.
    pub fn verify_token(&self, token: &str) -> Result<bool, TokenError> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(_) => Ok(true),
            Err(err) => match err.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::ExpiredSignature
                | ErrorKind::ImmatureSignature
                | ErrorKind::MissingRequiredClaim(_) => {
                    tracing::debug!("Token rejected: {}", err);
                    Ok(false)
                }
                _ => Err(TokenError::Malformed(err.to_string())),
            },
        }
    }
}

/// Middleware state: which authority verifies tokens and where they are carried.
#[derive(Clone)]
pub struct AccessGate {
    authority: Arc<TokenAuthority>,
    transport: TokenTransport,
}

impl AccessGate {
    pub fn new(authority: Arc<TokenAuthority>, transport: TokenTransport) -> Self {
        Self {
            authority,
            transport,
        }
    }
}

/// Runs the wrapped route only when the request carries a token the authority accepts.
pub async fn require_token(
    State(gate): State<AccessGate>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (token, request) = match gate.transport {
        TokenTransport::Body => token_from_body(request).await?,
        TokenTransport::Cookie => {
            let token = get_token_cookie(request.headers())?
                .ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;
            (token, request)
        }
    };
    if !gate.authority.verify_token(&token)? {
        tracing::debug!("Rejected {} {} with an invalid token", request.method(), request.uri());
        return Err(ApiError::Unauthorized("Invalid token".into()));
    }
    Ok(next.run(request).await)
}

/// Reads the `token` field of a JSON body and hands back a request with the body restored.
async fn token_from_body(request: Request) -> Result<(String, Request), ApiError> {
    if !matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    ) {
        return Err(ApiError::InvalidRequest("Invalid request method".into()));
    }
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::InvalidRequest("Failed to read request body".into()))?;
    let payload: Map<String, Value> = serde_json::from_slice(&bytes)
        .map_err(|_| ApiError::InvalidRequest("Invalid request payload".into()))?;
    let token = payload
        .get("token")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::InvalidRequest("Missing token".into()))?
        .to_string();
    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}
