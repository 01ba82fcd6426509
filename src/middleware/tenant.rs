use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::auth::{Claims, TokenVerifier};
use crate::database::models::TenantMembership;
use crate::database::{StoreError, StoreSession, TenantStore};
use crate::error::ApiError;
use crate::realtime::EventOutbox;
use crate::state::AppState;
use crate::types::Role;

/// Ways a request can fail tenant authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("no bearer token on the request")]
    AuthenticationRequired,

    #[error("bearer token failed verification")]
    InvalidToken,

    #[error("tenant inactive, unknown, or user not a member")]
    Forbidden,

    #[error("role not in the allow-list")]
    InsufficientRole,

    #[error("tenant store unavailable")]
    StoreUnavailable,

    #[error("tenant store query failed")]
    StoreFailure,
}

impl GateError {
    /// Message returned to the caller. Forbidden deliberately does not say
    /// which of tenant or membership was missing.
    pub fn public_message(&self) -> &'static str {
        match self {
            GateError::AuthenticationRequired => "Access denied. No token provided.",
            GateError::InvalidToken => "Invalid token.",
            GateError::Forbidden => "Access denied. Invalid tenant or user.",
            GateError::InsufficientRole => "Insufficient permissions.",
            GateError::StoreUnavailable => "Service temporarily unavailable.",
            GateError::StoreFailure => "An error occurred while processing your request",
        }
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        if err.is_connectivity() {
            tracing::error!("Tenant gate store unavailable: {}", err);
            GateError::StoreUnavailable
        } else {
            tracing::error!("Tenant gate query failed: {}", err);
            GateError::StoreFailure
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantScope {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserScope {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Verified tenant and user of one request. Built by the gate, dropped with
/// the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub tenant: TenantScope,
    pub user: UserScope,
}

impl RequestContext {
    pub fn new(claims: &Claims, membership: TenantMembership) -> Self {
        Self {
            user: UserScope {
                id: claims.user_id,
                email: claims.email.clone(),
                role: membership.role.clone(),
            },
            tenant: TenantScope {
                id: membership.id,
                name: membership.name,
                subdomain: membership.subdomain,
                role: membership.role,
            },
        }
    }

    pub fn role(&self) -> &Role {
        &self.user.role
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant.id
    }
}

/// The request's pinned store session, shared between the gate and the
/// handler. The gate takes it back after the handler to commit or roll back.
#[derive(Clone)]
pub struct TenantConnection(Arc<Mutex<Option<Box<dyn StoreSession>>>>);

impl TenantConnection {
    fn new(session: Box<dyn StoreSession>) -> Self {
        Self(Arc::new(Mutex::new(Some(session))))
    }

    /// Lock the session for a run of statements. `None` only after the gate
    /// has released it.
    pub async fn lock(&self) -> MutexGuard<'_, Option<Box<dyn StoreSession>>> {
        self.0.lock().await
    }

    async fn take(&self) -> Option<Box<dyn StoreSession>> {
        self.0.lock().await.take()
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GateError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(GateError::AuthenticationRequired)?;

    match value.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(GateError::AuthenticationRequired),
    }
}

/// Verify the bearer token of `headers`, resolve membership and scope a
/// fresh session to the tenant.
pub async fn authorize(
    verifier: &TokenVerifier,
    store: &dyn TenantStore,
    headers: &HeaderMap,
) -> Result<(RequestContext, Box<dyn StoreSession>), GateError> {
    authorize_token(verifier, store, bearer_token(headers)?).await
}

/// Same as [`authorize`] for a token that did not arrive in a header.
/// Membership lookup and scoping run on the same session.
pub async fn authorize_token(
    verifier: &TokenVerifier,
    store: &dyn TenantStore,
    token: &str,
) -> Result<(RequestContext, Box<dyn StoreSession>), GateError> {
    let claims = verifier.verify(token).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        GateError::InvalidToken
    })?;

    let mut session = store.begin().await?;

    let membership = session
        .find_membership(claims.tenant_id, claims.user_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!(
                "Tenant check failed for user {} in tenant {}",
                claims.user_id,
                claims.tenant_id
            );
            GateError::Forbidden
        })?;

    let context = RequestContext::new(&claims, membership);
    session.set_current_tenant(claims.tenant_id).await?;

    Ok((context, session))
}

/// Middleware guarding every tenant route. On success the request carries
/// `RequestContext`, `TenantConnection` and `EventOutbox` extensions.
pub async fn tenant_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (context, session) = authorize(&state.verifier, state.store.as_ref(), request.headers()).await?;

    tracing::debug!(
        "Tenant gate passed: user {} as {} in {} ({})",
        context.user.id,
        context.role(),
        context.tenant.name,
        context.tenant.id
    );

    let tenant_id = context.tenant_id();
    let connection = TenantConnection::new(session);
    let outbox = EventOutbox::default();

    request.extensions_mut().insert(context);
    request.extensions_mut().insert(connection.clone());
    request.extensions_mut().insert(outbox.clone());

    let response = next.run(request).await;

    let Some(session) = connection.take().await else {
        return Ok(response);
    };

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        if let Err(e) = session.rollback().await {
            tracing::error!("Rollback failed for tenant {}: {}", tenant_id, e);
        }
        return Ok(response);
    }

    session.commit().await?;
    outbox.publish(&state.broadcaster, tenant_id).await;

    Ok(response)
}
