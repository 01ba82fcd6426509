use axum::extract::Extension;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{Card, CardMove, NewCard};
use crate::error::ApiError;
use crate::handlers::extract::{ApiJson, ApiPath};
use crate::middleware::{ApiResponse, ApiResult, RequestContext, TenantConnection};
use crate::realtime::{BoardEvent, EventOutbox};

use super::{optional_text, required_text, session};

#[derive(Debug, Deserialize)]
pub struct CreateCard {
    pub title: String,
    pub description: Option<String>,
}

/// Body of a drag-and-drop drop: the list the card landed on and optionally
/// its index there.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCard {
    pub list_id: Uuid,
    pub position: Option<i32>,
}

/// GET /api/lists/:id/cards
pub async fn list(
    Extension(context): Extension<RequestContext>,
    Extension(connection): Extension<TenantConnection>,
    ApiPath(list_id): ApiPath<Uuid>,
) -> ApiResult<Vec<Card>> {
    let mut guard = connection.lock().await;
    let cards = session(&mut guard)?
        .list_cards(context.tenant_id(), list_id)
        .await?
        .ok_or_else(|| ApiError::not_found("List not found"))?;

    Ok(ApiResponse::success(cards))
}

/// POST /api/lists/:id/cards
pub async fn create(
    Extension(context): Extension<RequestContext>,
    Extension(connection): Extension<TenantConnection>,
    Extension(outbox): Extension<EventOutbox>,
    ApiPath(list_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CreateCard>,
) -> ApiResult<Card> {
    let new_card = NewCard {
        title: required_text("title", &body.title)?,
        description: optional_text(body.description),
    };

    let mut guard = connection.lock().await;
    let card = session(&mut guard)?
        .create_card(context.tenant_id(), list_id, new_card)
        .await?
        .ok_or_else(|| ApiError::not_found("List not found"))?;

    outbox.push(BoardEvent::CardCreated(card.clone())).await;

    Ok(ApiResponse::created(card))
}

/// PATCH /api/cards/:id/move
pub async fn move_card(
    Extension(context): Extension<RequestContext>,
    Extension(connection): Extension<TenantConnection>,
    Extension(outbox): Extension<EventOutbox>,
    ApiPath(card_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<MoveCard>,
) -> ApiResult<Card> {
    if matches!(body.position, Some(position) if position < 0) {
        return Err(ApiError::invalid_field("position", "must not be negative"));
    }

    let target = CardMove {
        list_id: body.list_id,
        position: body.position,
    };

    let mut guard = connection.lock().await;
    let card = session(&mut guard)?
        .move_card(context.tenant_id(), card_id, target)
        .await?
        .ok_or_else(|| ApiError::not_found("Card or list not found"))?;

    tracing::debug!("Card {} moved to list {} at {}", card.id, card.list_id, card.position);
    outbox.push(BoardEvent::CardMoved(card.clone())).await;

    Ok(ApiResponse::success(card))
}
