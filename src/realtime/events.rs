use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::models::{Board, BoardList, Card};

use super::broadcaster::TenantBroadcaster;

/// Change notification pushed to every socket of the tenant.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BoardEvent {
    BoardCreated(Board),
    BoardUpdated(Board),
    BoardDeleted { id: Uuid },
    ListCreated(BoardList),
    CardCreated(Card),
    CardMoved(Card),
}

/// Events recorded by a handler during one request. They are published only
/// once the request's transaction has committed.
#[derive(Clone, Default)]
pub struct EventOutbox(Arc<Mutex<Vec<BoardEvent>>>);

impl EventOutbox {
    pub async fn push(&self, event: BoardEvent) {
        self.0.lock().await.push(event);
    }

    pub async fn drain(&self) -> Vec<BoardEvent> {
        std::mem::take(&mut *self.0.lock().await)
    }

    pub async fn publish(&self, broadcaster: &TenantBroadcaster, tenant_id: Uuid) {
        for event in self.drain().await {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    let receivers = broadcaster.broadcast(tenant_id, Arc::from(text)).await;
                    tracing::debug!(
                        "Published {} to {} sockets of tenant {}",
                        event_name(&event),
                        receivers,
                        tenant_id
                    );
                }
                Err(e) => tracing::error!("Failed to serialize board event: {}", e),
            }
        }
    }
}

fn event_name(event: &BoardEvent) -> &'static str {
    match event {
        BoardEvent::BoardCreated(_) => "board_created",
        BoardEvent::BoardUpdated(_) => "board_updated",
        BoardEvent::BoardDeleted { .. } => "board_deleted",
        BoardEvent::ListCreated(_) => "list_created",
        BoardEvent::CardCreated(_) => "card_created",
        BoardEvent::CardMoved(_) => "card_moved",
    }
}
