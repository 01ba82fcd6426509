use axum::extract::Extension;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{BoardList, NewList};
use crate::error::ApiError;
use crate::handlers::extract::{ApiJson, ApiPath};
use crate::middleware::{ApiResponse, ApiResult, RequestContext, TenantConnection};
use crate::realtime::{BoardEvent, EventOutbox};

use super::{required_text, session};

#[derive(Debug, Deserialize)]
pub struct CreateList {
    pub name: String,
}

/// GET /api/boards/:id/lists
pub async fn list(
    Extension(context): Extension<RequestContext>,
    Extension(connection): Extension<TenantConnection>,
    ApiPath(board_id): ApiPath<Uuid>,
) -> ApiResult<Vec<BoardList>> {
    let mut guard = connection.lock().await;
    let lists = session(&mut guard)?
        .list_lists(context.tenant_id(), board_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Board not found"))?;

    Ok(ApiResponse::success(lists))
}

/// POST /api/boards/:id/lists
pub async fn create(
    Extension(context): Extension<RequestContext>,
    Extension(connection): Extension<TenantConnection>,
    Extension(outbox): Extension<EventOutbox>,
    ApiPath(board_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CreateList>,
) -> ApiResult<BoardList> {
    let new_list = NewList {
        name: required_text("name", &body.name)?,
    };

    let mut guard = connection.lock().await;
    let list = session(&mut guard)?
        .create_list(context.tenant_id(), board_id, new_list)
        .await?
        .ok_or_else(|| ApiError::not_found("Board not found"))?;

    outbox.push(BoardEvent::ListCreated(list.clone())).await;

    Ok(ApiResponse::created(list))
}
