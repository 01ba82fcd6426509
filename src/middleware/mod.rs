pub mod rate_limit;
pub mod response;
pub mod role;
pub mod tenant;

pub use rate_limit::{rate_limit, RateLimit};
pub use response::{ApiResponse, ApiResult};
pub use role::{require_role, RoleGate};
pub use tenant::{
    authorize, authorize_token, bearer_token, tenant_gate, GateError, RequestContext,
    TenantConnection, TenantScope, UserScope,
};
