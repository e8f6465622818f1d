use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::handlers::AppError;
use crate::AppState;
use crate::config::{AuthConfig, AuthMode};
use crate::domain::{Caller, Permission};
use crate::error::{RcvtestError, Result};

/// A configured bearer token and the caller it authenticates.
#[derive(Clone)]
pub struct BearerToken {
    token: String,
    caller: Caller,
}

impl BearerToken {
    pub fn new(token: impl Into<String>, caller: Caller) -> Self {
        Self {
            token: token.into(),
            caller,
        }
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"***")
            .field("caller", &self.caller)
            .finish()
    }
}

/// Read every configured token from its environment variable. Done once at
/// startup so requests never touch the environment.
pub fn load_tokens(auth: &AuthConfig) -> Result<Vec<BearerToken>> {
    if auth.mode != AuthMode::Bearer {
        return Ok(Vec::new());
    }

    auth.tokens
        .iter()
        .map(|t| {
            let token = std::env::var(&t.token_env)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    RcvtestError::Config(format!(
                        "token for {} not set in environment variable {}",
                        t.subject, t.token_env
                    ))
                })?;
            Ok(BearerToken::new(
                token,
                Caller::new(t.subject.clone(), t.org_id, t.permissions.clone()),
            ))
        })
        .collect()
}

/// Authenticate the request and attach its [`Caller`] as an extension.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let caller = match state.settings.http.auth.mode {
        AuthMode::None => Caller::new(
            "anonymous",
            state.settings.http.auth.default_org_id,
            vec![Permission::NotificationsWrite],
        ),
        AuthMode::Bearer => {
            let header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok());
            authenticate_bearer(&state.tokens, header)?
        }
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

fn authenticate_bearer(tokens: &[BearerToken], header: Option<&str>) -> Result<Caller> {
    let provided = match header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token.trim(),
        None => {
            tracing::warn!("missing or invalid Authorization header");
            return Err(RcvtestError::Unauthorized(
                "missing bearer token".to_string(),
            ));
        }
    };

    // Compare against every token so timing does not reveal which one matched
    let mut matched = None;
    for candidate in tokens {
        if constant_time_eq(provided.as_bytes(), candidate.token.as_bytes()) && matched.is_none() {
            matched = Some(candidate.caller.clone());
        }
    }

    matched.ok_or_else(|| {
        tracing::warn!("invalid bearer token");
        RcvtestError::Unauthorized("invalid bearer token".to_string())
    })
}

/// Testing receivers needs `notifications:write` or `receivers:test`.
pub fn authorize_test(caller: &Caller) -> Result<()> {
    if caller.can_test_receivers() {
        Ok(())
    } else {
        Err(RcvtestError::Forbidden(format!(
            "{} needs {} or {}",
            caller.subject,
            Permission::NotificationsWrite,
            Permission::ReceiversTest
        )))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}
