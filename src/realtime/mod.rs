pub mod broadcaster;
pub mod events;
pub mod socket;

pub use broadcaster::{BroadcastMessage, TenantBroadcaster};
pub use events::{BoardEvent, EventOutbox};
pub use socket::socket_handler;
