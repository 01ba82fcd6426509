use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::models::{
    Board, BoardList, BoardPatch, Card, CardMove, NewBoard, NewCard, NewList, TenantMembership,
};
use super::store::{BoardRepository, StoreError, StoreSession, TenantSession, TenantStore};

/// Session variable read by the row-level-security policies.
pub const TENANT_SETTING: &str = "app.current_tenant_id";

const MEMBERSHIP_QUERY: &str = r#"
    SELECT t.id, t.name, t.subdomain, tu.role
    FROM tenants t
    JOIN tenant_users tu ON t.id = tu.tenant_id
    WHERE t.id = $1 AND tu.user_id = $2 AND t.active = true
"#;

const CARD_COLUMNS: &str =
    "id, tenant_id, list_id, title, description, position, created_at, updated_at";

/// `TenantStore` over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// One transaction on one pooled connection. Dropping it without a commit
/// rolls the transaction back.
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TenantSession for PgSession {
    async fn find_membership(
        &mut self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TenantMembership>, StoreError> {
        let row = sqlx::query_as::<_, TenantMembership>(MEMBERSHIP_QUERY)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row)
    }

    async fn set_current_tenant(&mut self, tenant_id: Uuid) -> Result<(), StoreError> {
        // is_local = true: the setting dies with the transaction
        sqlx::query("SELECT set_config($1, $2, true)")
            .bind(TENANT_SETTING)
            .bind(tenant_id.to_string())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn current_tenant(&mut self) -> Result<Option<Uuid>, StoreError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT NULLIF(current_setting($1, true), '')")
                .bind(TENANT_SETTING)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(value.and_then(|v| Uuid::parse_str(&v).ok()))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl BoardRepository for PgSession {
    async fn list_boards(&mut self, tenant_id: Uuid) -> Result<Vec<Board>, StoreError> {
        let boards = sqlx::query_as::<_, Board>(
            "SELECT id, tenant_id, name, description, created_at, updated_at
             FROM boards
             WHERE tenant_id = $1
             ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(boards)
    }

    async fn create_board(&mut self, tenant_id: Uuid, board: NewBoard) -> Result<Board, StoreError> {
        let board = sqlx::query_as::<_, Board>(
            "INSERT INTO boards (id, tenant_id, name, description)
             VALUES ($1, $2, $3, $4)
             RETURNING id, tenant_id, name, description, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(board.name)
        .bind(board.description)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(board)
    }

    async fn get_board(&mut self, tenant_id: Uuid, board_id: Uuid) -> Result<Option<Board>, StoreError> {
        let board = sqlx::query_as::<_, Board>(
            "SELECT id, tenant_id, name, description, created_at, updated_at
             FROM boards
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(board_id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(board)
    }

    async fn update_board(
        &mut self,
        tenant_id: Uuid,
        board_id: Uuid,
        patch: BoardPatch,
    ) -> Result<Option<Board>, StoreError> {
        let board = sqlx::query_as::<_, Board>(
            "UPDATE boards
             SET name = COALESCE($3, name),
                 description = COALESCE($4, description),
                 updated_at = now()
             WHERE id = $1 AND tenant_id = $2
             RETURNING id, tenant_id, name, description, created_at, updated_at",
        )
        .bind(board_id)
        .bind(tenant_id)
        .bind(patch.name)
        .bind(patch.description)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(board)
    }

    async fn delete_board(&mut self, tenant_id: Uuid, board_id: Uuid) -> Result<bool, StoreError> {
        // lists and cards go with the board through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM boards WHERE id = $1 AND tenant_id = $2")
            .bind(board_id)
            .bind(tenant_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_lists(
        &mut self,
        tenant_id: Uuid,
        board_id: Uuid,
    ) -> Result<Option<Vec<BoardList>>, StoreError> {
        if self.get_board(tenant_id, board_id).await?.is_none() {
            return Ok(None);
        }

        let lists = sqlx::query_as::<_, BoardList>(
            "SELECT id, tenant_id, board_id, name, position
             FROM lists
             WHERE board_id = $1 AND tenant_id = $2
             ORDER BY position",
        )
        .bind(board_id)
        .bind(tenant_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Some(lists))
    }

    async fn create_list(
        &mut self,
        tenant_id: Uuid,
        board_id: Uuid,
        list: NewList,
    ) -> Result<Option<BoardList>, StoreError> {
        if self.get_board(tenant_id, board_id).await?.is_none() {
            return Ok(None);
        }

        let list = sqlx::query_as::<_, BoardList>(
            "INSERT INTO lists (id, tenant_id, board_id, name, position)
             VALUES ($1, $2, $3, $4,
                     (SELECT COALESCE(MAX(position) + 1, 0) FROM lists WHERE board_id = $3 AND tenant_id = $2))
             RETURNING id, tenant_id, board_id, name, position",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(board_id)
        .bind(list.name)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(Some(list))
    }

    async fn list_cards(
        &mut self,
        tenant_id: Uuid,
        list_id: Uuid,
    ) -> Result<Option<Vec<Card>>, StoreError> {
        if !self.list_exists(tenant_id, list_id).await? {
            return Ok(None);
        }

        let cards = sqlx::query_as::<_, Card>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE list_id = $1 AND tenant_id = $2 ORDER BY position"
        ))
        .bind(list_id)
        .bind(tenant_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Some(cards))
    }

    async fn create_card(
        &mut self,
        tenant_id: Uuid,
        list_id: Uuid,
        card: NewCard,
    ) -> Result<Option<Card>, StoreError> {
        if !self.list_exists(tenant_id, list_id).await? {
            return Ok(None);
        }

        let card = sqlx::query_as::<_, Card>(&format!(
            "INSERT INTO cards (id, tenant_id, list_id, title, description, position)
             VALUES ($1, $2, $3, $4, $5,
                     (SELECT COALESCE(MAX(position) + 1, 0) FROM cards WHERE list_id = $3 AND tenant_id = $2))
             RETURNING {CARD_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(list_id)
        .bind(card.title)
        .bind(card.description)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(Some(card))
    }

    async fn move_card(
        &mut self,
        tenant_id: Uuid,
        card_id: Uuid,
        target: CardMove,
    ) -> Result<Option<Card>, StoreError> {
        if !self.list_exists(tenant_id, target.list_id).await? {
            return Ok(None);
        }

        let position = match target.position {
            Some(position) => {
                sqlx::query(
                    "UPDATE cards SET position = position + 1
                     WHERE list_id = $1 AND tenant_id = $2 AND position >= $3 AND id <> $4",
                )
                .bind(target.list_id)
                .bind(tenant_id)
                .bind(position)
                .bind(card_id)
                .execute(&mut *self.tx)
                .await?;
                position
            }
            None => {
                sqlx::query_scalar::<_, i32>(
                    "SELECT COALESCE(MAX(position) + 1, 0) FROM cards
                     WHERE list_id = $1 AND tenant_id = $2 AND id <> $3",
                )
                .bind(target.list_id)
                .bind(tenant_id)
                .bind(card_id)
                .fetch_one(&mut *self.tx)
                .await?
            }
        };

        let card = sqlx::query_as::<_, Card>(&format!(
            "UPDATE cards
             SET list_id = $3, position = $4, updated_at = now()
             WHERE id = $1 AND tenant_id = $2
             RETURNING {CARD_COLUMNS}"
        ))
        .bind(card_id)
        .bind(tenant_id)
        .bind(target.list_id)
        .bind(position)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(card)
    }
}

impl PgSession {
    async fn list_exists(&mut self, tenant_id: Uuid, list_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM lists WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(list_id)
        .bind(tenant_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }
}
