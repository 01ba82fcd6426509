use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{authorize_token, bearer_token, GateError, RequestContext};
use crate::state::AppState;

use super::broadcaster::TenantBroadcaster;

/// Handshake parameters of `GET /ws`. Browsers cannot set headers on a
/// WebSocket, so the bearer token may also come as `token`.
#[derive(Debug, Default, Deserialize)]
pub struct Handshake {
    #[serde(rename = "tenantId")]
    pub tenant_id: Option<String>,
    pub token: Option<String>,
}

/// GET /ws?tenantId=<uuid>&token=<jwt> - join the tenant's broadcast group.
///
/// The caller passes the same gate as `/api`: a valid token for an active
/// membership in exactly the requested tenant.
pub async fn socket_handler(
    State(state): State<AppState>,
    Query(handshake): Query<Handshake>,
    headers: HeaderMap,
    upgrade: Option<WebSocketUpgrade>,
) -> Result<Response, ApiError> {
    let tenant_id = handshake_tenant(&handshake)?;
    let context = authenticate(&state, &handshake, &headers, tenant_id).await?;
    let upgrade = upgrade.ok_or_else(|| ApiError::bad_request("Expected a WebSocket upgrade request"))?;

    tracing::debug!("Socket handshake accepted for user {} in tenant {}", context.user.id, tenant_id);

    let broadcaster = state.broadcaster.clone();
    Ok(upgrade.on_upgrade(move |socket| run_socket(socket, broadcaster, tenant_id)))
}

async fn authenticate(
    state: &AppState,
    handshake: &Handshake,
    headers: &HeaderMap,
    tenant_id: Uuid,
) -> Result<RequestContext, GateError> {
    let token = match handshake.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => token,
        _ => bearer_token(headers)?,
    };

    let (context, session) = authorize_token(&state.verifier, state.store.as_ref(), token).await?;

    // the socket holds no transaction for its lifetime
    if let Err(e) = session.rollback().await {
        tracing::warn!("Releasing handshake session failed: {}", e);
    }

    if context.tenant_id() != tenant_id {
        tracing::warn!(
            "User {} of tenant {} asked to join tenant {}",
            context.user.id,
            context.tenant_id(),
            tenant_id
        );
        return Err(GateError::Forbidden);
    }

    Ok(context)
}

fn handshake_tenant(handshake: &Handshake) -> Result<Uuid, ApiError> {
    let raw = handshake
        .tenant_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Authentication error"))?;

    Uuid::parse_str(raw).map_err(|_| ApiError::invalid_field("tenantId", "must be a UUID"))
}

async fn run_socket(socket: WebSocket, broadcaster: TenantBroadcaster, tenant_id: Uuid) {
    let mut events = broadcaster.subscribe(tenant_id).await;
    tracing::info!("User connected to tenant {}", tenant_id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(message) => {
                    if sender.send(Message::Text(message.to_string())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Socket of tenant {} lagged, {} events dropped", tenant_id, missed);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // clients only listen; ping/pong is answered by axum
                Some(Ok(_)) => {}
            },
        }
    }

    broadcaster.unsubscribe(tenant_id).await;
    tracing::info!("User disconnected from tenant {}", tenant_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn handshake(tenant_id: Option<&str>) -> Handshake {
        Handshake {
            tenant_id: tenant_id.map(str::to_string),
            token: None,
        }
    }

    #[test]
    fn missing_tenant_is_authentication_error() {
        let err = handshake_tenant(&handshake(None)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = handshake_tenant(&handshake(Some("  "))).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn malformed_tenant_is_bad_request() {
        let err = handshake_tenant(&handshake(Some("tenant-1"))).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn accepts_uuid_tenant() {
        let id = Uuid::new_v4();
        assert_eq!(handshake_tenant(&handshake(Some(&id.to_string()))).unwrap(), id);
    }
}
