// handlers/protected/mod.rs - Tenant-scoped handlers
//
// Security Level: bearer token + active tenant membership
// Route Prefix: /api/*
// Middleware: tenant_gate (context, pinned session, event outbox), role gates per route
//
// Every handler runs its statements on the request's pinned session so the
// row-level-security scope set by the gate applies, and still filters by the
// context's tenant id explicitly.

pub mod boards;
pub mod cards;
pub mod lists;
pub mod me;

use crate::database::StoreSession;
use crate::error::ApiError;

pub const MAX_TEXT_LEN: usize = 200;

/// Borrow the pinned session out of a locked `TenantConnection`.
pub(crate) fn session(
    slot: &mut Option<Box<dyn StoreSession>>,
) -> Result<&mut (dyn StoreSession + 'static), ApiError> {
    slot.as_deref_mut().ok_or_else(|| {
        tracing::error!("Handler ran after the tenant session was released");
        ApiError::internal_server_error("An error occurred while processing your request")
    })
}

/// Trimmed, non-empty, bounded text field.
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ApiError::invalid_field(field, "must not be empty"));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ApiError::invalid_field(
            field,
            format!("must be at most {} characters", MAX_TEXT_LEN),
        ));
    }

    Ok(value.to_string())
}

/// Blank optional text counts as absent.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
