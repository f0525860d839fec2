use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};
use tracing::warn;

use super::AuthError;
use crate::{error::ApiError, state::AppState};

/// Gate every method of `route` behind `permission`. Verified claims are
/// placed in the request extensions for the handler.
pub fn require(
    state: &AppState,
    permission: &'static str,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(
        state.clone(),
        move |State(state): State<AppState>, req: Request, next: Next| {
            authorize(state, permission, req, next)
        },
    ))
}

async fn authorize(
    state: AppState,
    permission: &'static str,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // owned copy: the request body is not Sync, so no borrow of `req` may
    // live across the await below
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .map(|v| v.to_str().map(str::to_owned))
        .transpose()
        .map_err(|_| ApiError::from(AuthError::MalformedHeader))?;

    let claims = state
        .verifier
        .verify(header.as_deref(), permission)
        .await
        .map_err(|e| {
            warn!(%permission, code = e.code(), "authorization failed");
            ApiError::from(e)
        })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
