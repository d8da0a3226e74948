use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use std::collections::HashMap;

use super::auth::{authenticate_request, unauthorized, CurrentUser};
use crate::{config::OwnershipPolicy, services::ResourceKind, AppState};

/// Authenticates the caller and requires that they own the transaction or
/// goal named by the `:id` route parameter.
///
/// Attach with `route_layer(from_fn_with_state((state, kind), resource_guard))`.
pub async fn resource_guard(
    State((state, kind)): State<(AppState, ResourceKind)>,
    Path(params): Path<HashMap<String, String>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate_request(&state, req.headers()).await?;

    let id = params.get("id").ok_or_else(|| not_found(kind))?;
    let owner = state
        .resource_owners
        .owner_of(kind, id)
        .await?
        .ok_or_else(|| not_found(kind))?;

    if owner != user.id {
        tracing::warn!(
            user_id = %user.id,
            resource = kind.collection(),
            resource_id = %id,
            "Access to foreign resource denied"
        );
        return Err(match state.config.security.ownership_policy {
            OwnershipPolicy::Distinguish => unauthorized(),
            OwnershipPolicy::Conceal => not_found(kind),
        });
    }

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

fn not_found(kind: ResourceKind) -> AppError {
    let label = match kind {
        ResourceKind::Transaction => "Transaction",
        ResourceKind::Goal => "Goal",
    };
    AppError::NotFound(anyhow::anyhow!("{} not found", label))
}
