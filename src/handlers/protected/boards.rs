use axum::extract::Extension;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{Board, BoardPatch, NewBoard};
use crate::error::ApiError;
use crate::handlers::extract::{ApiJson, ApiPath};
use crate::middleware::{ApiResponse, ApiResult, RequestContext, TenantConnection};
use crate::realtime::{BoardEvent, EventOutbox};

use super::{optional_text, required_text, session};

#[derive(Debug, Deserialize)]
pub struct CreateBoard {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBoard {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// GET /api/boards
pub async fn list(
    Extension(context): Extension<RequestContext>,
    Extension(connection): Extension<TenantConnection>,
) -> ApiResult<Vec<Board>> {
    let mut guard = connection.lock().await;
    let boards = session(&mut guard)?.list_boards(context.tenant_id()).await?;

    Ok(ApiResponse::success(boards))
}

/// POST /api/boards
pub async fn create(
    Extension(context): Extension<RequestContext>,
    Extension(connection): Extension<TenantConnection>,
    Extension(outbox): Extension<EventOutbox>,
    ApiJson(body): ApiJson<CreateBoard>,
) -> ApiResult<Board> {
    let new_board = NewBoard {
        name: required_text("name", &body.name)?,
        description: optional_text(body.description),
    };

    let mut guard = connection.lock().await;
    let board = session(&mut guard)?
        .create_board(context.tenant_id(), new_board)
        .await?;

    tracing::info!("Board {} created in tenant {} by {}", board.id, context.tenant.id, context.user.id);
    outbox.push(BoardEvent::BoardCreated(board.clone())).await;

    Ok(ApiResponse::created(board))
}

/// GET /api/boards/:id
pub async fn show(
    Extension(context): Extension<RequestContext>,
    Extension(connection): Extension<TenantConnection>,
    ApiPath(board_id): ApiPath<Uuid>,
) -> ApiResult<Board> {
    let mut guard = connection.lock().await;
    let board = session(&mut guard)?
        .get_board(context.tenant_id(), board_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Board not found"))?;

    Ok(ApiResponse::success(board))
}

/// PATCH /api/boards/:id
pub async fn update(
    Extension(context): Extension<RequestContext>,
    Extension(connection): Extension<TenantConnection>,
    Extension(outbox): Extension<EventOutbox>,
    ApiPath(board_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateBoard>,
) -> ApiResult<Board> {
    let patch = BoardPatch {
        name: body.name.as_deref().map(|name| required_text("name", name)).transpose()?,
        description: optional_text(body.description),
    };

    let mut guard = connection.lock().await;
    let board = session(&mut guard)?
        .update_board(context.tenant_id(), board_id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Board not found"))?;

    outbox.push(BoardEvent::BoardUpdated(board.clone())).await;

    Ok(ApiResponse::success(board))
}

/// DELETE /api/boards/:id (admin only)
pub async fn delete(
    Extension(context): Extension<RequestContext>,
    Extension(connection): Extension<TenantConnection>,
    Extension(outbox): Extension<EventOutbox>,
    ApiPath(board_id): ApiPath<Uuid>,
) -> ApiResult<()> {
    let mut guard = connection.lock().await;
    let deleted = session(&mut guard)?
        .delete_board(context.tenant_id(), board_id)
        .await?;

    if !deleted {
        return Err(ApiError::not_found("Board not found"));
    }

    tracing::info!("Board {} deleted in tenant {} by {}", board_id, context.tenant.id, context.user.id);
    outbox.push(BoardEvent::BoardDeleted { id: board_id }).await;

    Ok(ApiResponse::no_content())
}
