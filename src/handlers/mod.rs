// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (bearer token + tenant membership)
pub mod extract;
pub mod protected; // /api/* behind the tenant gate
pub mod public; // /, /health
