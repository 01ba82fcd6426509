use axum::extract::Extension;
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, RequestContext, TenantConnection};

use super::session;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Whoami {
    #[serde(flatten)]
    pub context: RequestContext,
    /// Tenant the database session is scoped to, as read back from the store.
    pub database_tenant_id: Option<Uuid>,
}

/// GET /api/me - resolved tenant and user of the caller
pub async fn whoami(
    Extension(context): Extension<RequestContext>,
    Extension(connection): Extension<TenantConnection>,
) -> ApiResult<Whoami> {
    let mut guard = connection.lock().await;
    let database_tenant_id = session(&mut guard)?.current_tenant().await?;

    Ok(ApiResponse::success(Whoami {
        context,
        database_tenant_id,
    }))
}
