use std::sync::Arc;

use axum::{
    extract::{Extension, Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::types::Role;

use super::tenant::{GateError, RequestContext};

/// Allow-list of roles for a route.
///
/// The check consumes an already resolved `RequestContext`, so it can only
/// run on requests the tenant gate admitted. Mount it inside the gate:
///
/// ```rust,ignore
/// delete(boards::delete).layer(from_fn_with_state(RoleGate::new(["admin"]), require_role))
/// ```
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: Arc<[Role]>,
}

impl RoleGate {
    pub fn new<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            allowed: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, role: &Role) -> bool {
        self.allowed.contains(role)
    }

    pub fn check(&self, context: &RequestContext) -> Result<(), GateError> {
        if self.allows(context.role()) {
            Ok(())
        } else {
            tracing::warn!(
                "Role '{}' of user {} not allowed here",
                context.role(),
                context.user.id
            );
            Err(GateError::InsufficientRole)
        }
    }
}

pub async fn require_role(
    State(gate): State<RoleGate>,
    Extension(context): Extension<RequestContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate.check(&context)?;
    Ok(next.run(request).await)
}
