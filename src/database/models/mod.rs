pub mod board;
pub mod tenant;

pub use board::{Board, BoardList, BoardPatch, Card, CardMove, NewBoard, NewCard, NewList};
pub use tenant::TenantMembership;
