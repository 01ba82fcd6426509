use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::Role;

/// One row of the tenant/membership join: an active tenant plus the role the
/// requesting user holds in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TenantMembership {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub role: Role,
}
