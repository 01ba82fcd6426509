use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::models::{
    Board, BoardList, BoardPatch, Card, CardMove, NewBoard, NewCard, NewList, TenantMembership,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// True when the failure is about reaching the store rather than the
    /// statement itself.
    pub fn is_connectivity(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Sqlx(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::WorkerCrashed
            ),
        }
    }
}

/// Hands out request-scoped sessions. Each session is one transaction on one
/// physical connection, held until it is committed, rolled back or dropped.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Tenant resolution and scoping on a pinned session.
#[async_trait]
pub trait TenantSession: Send {
    /// Active tenant joined to the user's membership row, if any.
    async fn find_membership(
        &mut self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TenantMembership>, StoreError>;

    /// Scopes every later statement of this session to `tenant_id`. The
    /// setting is transaction-local and ends with the session.
    async fn set_current_tenant(&mut self, tenant_id: Uuid) -> Result<(), StoreError>;

    async fn current_tenant(&mut self) -> Result<Option<Uuid>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Board, list and card queries. Every call takes the tenant explicitly on
/// top of the row-level-security scope.
#[async_trait]
pub trait BoardRepository: Send {
    async fn list_boards(&mut self, tenant_id: Uuid) -> Result<Vec<Board>, StoreError>;

    async fn create_board(&mut self, tenant_id: Uuid, board: NewBoard) -> Result<Board, StoreError>;

    async fn get_board(&mut self, tenant_id: Uuid, board_id: Uuid) -> Result<Option<Board>, StoreError>;

    async fn update_board(
        &mut self,
        tenant_id: Uuid,
        board_id: Uuid,
        patch: BoardPatch,
    ) -> Result<Option<Board>, StoreError>;

    async fn delete_board(&mut self, tenant_id: Uuid, board_id: Uuid) -> Result<bool, StoreError>;

    /// `None` when the board does not exist in this tenant.
    async fn list_lists(
        &mut self,
        tenant_id: Uuid,
        board_id: Uuid,
    ) -> Result<Option<Vec<BoardList>>, StoreError>;

    async fn create_list(
        &mut self,
        tenant_id: Uuid,
        board_id: Uuid,
        list: NewList,
    ) -> Result<Option<BoardList>, StoreError>;

    /// `None` when the list does not exist in this tenant.
    async fn list_cards(
        &mut self,
        tenant_id: Uuid,
        list_id: Uuid,
    ) -> Result<Option<Vec<Card>>, StoreError>;

    async fn create_card(
        &mut self,
        tenant_id: Uuid,
        list_id: Uuid,
        card: NewCard,
    ) -> Result<Option<Card>, StoreError>;

    /// `None` when either the card or the target list is missing.
    async fn move_card(
        &mut self,
        tenant_id: Uuid,
        card_id: Uuid,
        target: CardMove,
    ) -> Result<Option<Card>, StoreError>;
}

pub trait StoreSession: TenantSession + BoardRepository {}

impl<T: TenantSession + BoardRepository> StoreSession for T {}
