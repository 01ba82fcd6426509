use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::database::TenantStore;
use crate::realtime::TenantBroadcaster;

/// Shared, read-only handles every request can reach.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TenantStore>,
    pub verifier: Arc<TokenVerifier>,
    pub broadcaster: TenantBroadcaster,
}

impl AppState {
    pub fn new(store: Arc<dyn TenantStore>, verifier: TokenVerifier, broadcaster: TenantBroadcaster) -> Self {
        Self {
            store,
            verifier: Arc::new(verifier),
            broadcaster,
        }
    }
}
