//! Authorization gate middleware

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    authz::{decide, login_location, policy_for, Decision, Policy},
    error::AppError,
    models::UserClaims,
    AppState,
};

/// Claims of a valid bearer token; anything else counts as no session
fn bearer_claims(headers: &HeaderMap, secret: &str) -> Option<UserClaims> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;

    match UserClaims::from_token(token.trim(), secret) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!("Ignoring bearer token: {}", e);
            None
        }
    }
}

/// Resolve the path's policy and either pass the request on (with the caller's
/// claims in its extensions), redirect to login, or refuse it.
pub async fn authorize(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let claims = bearer_claims(request.headers(), &state.config.auth.jwt_secret);
    let path = request.uri().path().to_string();
    let policy = policy_for(&path);

    match decide(policy, claims.as_ref()) {
        Decision::Allow => {
            if let Some(claims) = claims {
                request.extensions_mut().insert(claims);
            }
            next.run(request).await
        }
        Decision::RedirectToLogin => {
            let return_url = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or(path);
            tracing::debug!("Anonymous request to {} redirected to login", return_url);
            (
                StatusCode::FOUND,
                [(header::LOCATION, login_location(&return_url))],
            )
                .into_response()
        }
        Decision::Forbidden => {
            tracing::warn!(
                "Access to {} denied for {}",
                path,
                claims.map(|c| c.sub).unwrap_or_default()
            );
            let required = match policy {
                Policy::Role(role) => format!("The {} role is required for this page", role),
                _ => "Access to this page is not allowed".to_string(),
            };
            AppError::Authorization(required).into_response()
        }
    }
}
