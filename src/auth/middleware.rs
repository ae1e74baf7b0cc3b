//! axum middleware enforcing bearer tokens

use super::{Claims, TokenService};
use crate::config::AuthConfig;
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;

/// Which requests need a token, and how to check it
#[derive(Clone)]
pub struct AuthPolicy {
    /// `None` disables authentication
    tokens: Option<Arc<TokenService>>,
    public_paths: Vec<String>,
    public_prefixes: Vec<String>,
}

impl AuthPolicy {
    pub fn new(
        tokens: Option<Arc<TokenService>>,
        public_paths: Vec<String>,
        public_prefixes: Vec<String>,
    ) -> Self {
        Self {
            tokens,
            public_paths,
            public_prefixes,
        }
    }

    /// Policy for the configured auth section
    pub fn from_config(config: &AuthConfig, tokens: Option<Arc<TokenService>>) -> Self {
        Self::new(
            tokens.filter(|_| config.enabled),
            config.public_paths.clone(),
            config.public_prefixes.clone(),
        )
    }

    /// Let every request through
    pub fn disabled() -> Self {
        Self::new(None, Vec::new(), Vec::new())
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
            || self.public_prefixes.iter().any(|p| path.starts_with(p))
    }

    fn authenticate(&self, tokens: &TokenService, header: Option<&str>) -> Result<Claims, String> {
        let header = header.ok_or_else(|| "Missing Authorization header".to_string())?;

        let mut parts = header.split_whitespace();
        let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err("Invalid token: malformed Authorization header".to_string());
        };
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err("Invalid authentication scheme".to_string());
        }

        tokens.verify(token).map_err(|e| match e {
            crate::domain::SyncError::Authentication(msg) => msg,
            other => format!("Invalid token: {other}"),
        })
    }
}

/// Reject requests without a valid bearer token
///
/// `OPTIONS` requests and public paths pass through. Verified claims are
/// stored in the request extensions.
pub async fn require_bearer(
    State(policy): State<Arc<AuthPolicy>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(tokens) = policy.tokens.as_deref() else {
        return next.run(request).await;
    };

    if request.method() == Method::OPTIONS || policy.is_public(request.uri().path()) {
        return next.run(request).await;
    }

    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match policy.authenticate(tokens, header) {
        Ok(claims) => {
            tracing::debug!(user = %claims.sub, path = %request.uri().path(), "Authenticated request");
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(detail) => {
            tracing::warn!(path = %request.uri().path(), reason = %detail, "Rejected request");
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(json!({ "detail": detail })),
            )
                .into_response()
        }
    }
}
