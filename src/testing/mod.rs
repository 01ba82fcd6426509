//! In-memory `TenantStore` for router and gate tests.
//!
//! Models what matters for tenant isolation: a fixed pool of physical
//! connections, sessions that pin one of them, a transaction-local tenant
//! setting that is cleared when the session ends, and transactional writes
//! that only land on commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::TokenIssuer;
use crate::database::models::{
    Board, BoardList, BoardPatch, Card, CardMove, NewBoard, NewCard, NewList, TenantMembership,
};
use crate::database::{BoardRepository, StoreError, StoreSession, TenantSession, TenantStore};
use crate::types::Role;

pub const TEST_SECRET: &str = "router-test-secret";

pub fn issuer() -> TokenIssuer {
    TokenIssuer::new(TEST_SECRET, chrono::Duration::hours(1)).unwrap()
}

#[derive(Debug, Clone)]
struct TenantRow {
    name: String,
    subdomain: String,
    active: bool,
}

#[derive(Debug, Clone, Default)]
struct Data {
    tenants: HashMap<Uuid, TenantRow>,
    memberships: HashMap<(Uuid, Uuid), Role>,
    boards: Vec<Board>,
    lists: Vec<BoardList>,
    cards: Vec<Card>,
}

/// A physical connection. `session_tenant` mimics a plain `SET`, which
/// would survive on the connection; the gate must never rely on it.
#[derive(Debug, Default)]
struct Connection {
    session_tenant: Option<Uuid>,
}

struct Shared {
    data: Mutex<Data>,
    idle: Mutex<Vec<Connection>>,
    available: AtomicBool,
    failing: AtomicBool,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_pool_size(4)
    }

    pub fn with_pool_size(size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                data: Mutex::new(Data::default()),
                idle: Mutex::new((0..size).map(|_| Connection::default()).collect()),
                available: AtomicBool::new(true),
                failing: AtomicBool::new(false),
                commits: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
            }),
        }
    }

    pub fn add_tenant(&self, name: &str, subdomain: &str, active: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.shared.data.lock().unwrap().tenants.insert(
            id,
            TenantRow {
                name: name.to_string(),
                subdomain: subdomain.to_string(),
                active,
            },
        );
        id
    }

    pub fn add_member(&self, tenant_id: Uuid, user_id: Uuid, role: &str) {
        self.shared
            .data
            .lock()
            .unwrap()
            .memberships
            .insert((tenant_id, user_id), Role::new(role));
    }

    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Make membership lookups fail the way a broken schema would, with the
    /// store itself still reachable.
    pub fn fail_queries(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::SeqCst);
    }

    pub fn idle_connections(&self) -> usize {
        self.shared.idle.lock().unwrap().len()
    }

    pub fn commits(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }

    pub fn board_count(&self, tenant_id: Uuid) -> usize {
        self.shared
            .data
            .lock()
            .unwrap()
            .boards
            .iter()
            .filter(|b| b.tenant_id == tenant_id)
            .count()
    }

    /// Leave a connection-level tenant setting behind on every idle
    /// connection, as a plain `SET` from an earlier request would.
    pub fn poison_idle_connections(&self, tenant_id: Uuid) {
        for connection in self.shared.idle.lock().unwrap().iter_mut() {
            connection.session_tenant = Some(tenant_id);
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.shared.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        self.check_available()?;

        let connection = self
            .shared
            .idle
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| StoreError::Unavailable("pool exhausted".to_string()))?;
        let snapshot = self.shared.data.lock().unwrap().clone();

        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.shared),
            connection: Some(connection),
            data: snapshot,
            local_tenant: None,
            finished: false,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

pub struct MemorySession {
    shared: Arc<Shared>,
    connection: Option<Connection>,
    data: Data,
    local_tenant: Option<Uuid>,
    finished: bool,
}

impl MemorySession {
    fn scoped(&self, tenant_id: Uuid) -> bool {
        // row-level security: rows are only visible inside the scoped tenant
        self.local_tenant == Some(tenant_id)
    }

    fn list_visible(&self, tenant_id: Uuid, list_id: Uuid) -> bool {
        self.scoped(tenant_id)
            && self
                .data
                .lists
                .iter()
                .any(|l| l.id == list_id && l.tenant_id == tenant_id)
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(connection) = self.connection.take() {
            // transaction-local settings end with the transaction
            if let Ok(mut idle) = self.shared.idle.lock() {
                idle.push(connection);
            }
        }
    }
}

#[async_trait]
impl TenantSession for MemorySession {
    async fn find_membership(
        &mut self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TenantMembership>, StoreError> {
        if self.shared.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Sqlx(sqlx::Error::Protocol(
                "relation \"tenant_users\" does not exist".to_string(),
            )));
        }

        let tenant = self.data.tenants.get(&tenant_id).filter(|t| t.active);
        let role = self.data.memberships.get(&(tenant_id, user_id));

        Ok(tenant.zip(role).map(|(tenant, role)| TenantMembership {
            id: tenant_id,
            name: tenant.name.clone(),
            subdomain: tenant.subdomain.clone(),
            role: role.clone(),
        }))
    }

    async fn set_current_tenant(&mut self, tenant_id: Uuid) -> Result<(), StoreError> {
        self.local_tenant = Some(tenant_id);
        Ok(())
    }

    async fn current_tenant(&mut self) -> Result<Option<Uuid>, StoreError> {
        let connection_tenant = self.connection.as_ref().and_then(|c| c.session_tenant);
        Ok(self.local_tenant.or(connection_tenant))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        *this.shared.data.lock().unwrap() = std::mem::take(&mut this.data);
        this.shared.commits.fetch_add(1, Ordering::SeqCst);
        this.finished = true;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        this.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        this.finished = true;
        Ok(())
    }
}

#[async_trait]
impl BoardRepository for MemorySession {
    async fn list_boards(&mut self, tenant_id: Uuid) -> Result<Vec<Board>, StoreError> {
        if !self.scoped(tenant_id) {
            return Ok(Vec::new());
        }
        Ok(self
            .data
            .boards
            .iter()
            .filter(|b| b.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn create_board(&mut self, tenant_id: Uuid, board: NewBoard) -> Result<Board, StoreError> {
        let now = Utc::now();
        let board = Board {
            id: Uuid::new_v4(),
            tenant_id,
            name: board.name,
            description: board.description,
            created_at: now,
            updated_at: now,
        };
        self.data.boards.push(board.clone());
        Ok(board)
    }

    async fn get_board(&mut self, tenant_id: Uuid, board_id: Uuid) -> Result<Option<Board>, StoreError> {
        if !self.scoped(tenant_id) {
            return Ok(None);
        }
        Ok(self
            .data
            .boards
            .iter()
            .find(|b| b.id == board_id && b.tenant_id == tenant_id)
            .cloned())
    }

    async fn update_board(
        &mut self,
        tenant_id: Uuid,
        board_id: Uuid,
        patch: BoardPatch,
    ) -> Result<Option<Board>, StoreError> {
        if !self.scoped(tenant_id) {
            return Ok(None);
        }
        let Some(board) = self
            .data
            .boards
            .iter_mut()
            .find(|b| b.id == board_id && b.tenant_id == tenant_id)
        else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            board.name = name;
        }
        if let Some(description) = patch.description {
            board.description = Some(description);
        }
        board.updated_at = Utc::now();
        Ok(Some(board.clone()))
    }

    async fn delete_board(&mut self, tenant_id: Uuid, board_id: Uuid) -> Result<bool, StoreError> {
        if !self.scoped(tenant_id) {
            return Ok(false);
        }
        let before = self.data.boards.len();
        self.data
            .boards
            .retain(|b| !(b.id == board_id && b.tenant_id == tenant_id));
        if self.data.boards.len() == before {
            return Ok(false);
        }

        let list_ids: Vec<Uuid> = self
            .data
            .lists
            .iter()
            .filter(|l| l.board_id == board_id)
            .map(|l| l.id)
            .collect();
        self.data.lists.retain(|l| l.board_id != board_id);
        self.data.cards.retain(|c| !list_ids.contains(&c.list_id));
        Ok(true)
    }

    async fn list_lists(
        &mut self,
        tenant_id: Uuid,
        board_id: Uuid,
    ) -> Result<Option<Vec<BoardList>>, StoreError> {
        if self.get_board(tenant_id, board_id).await?.is_none() {
            return Ok(None);
        }
        let mut lists: Vec<BoardList> = self
            .data
            .lists
            .iter()
            .filter(|l| l.board_id == board_id && l.tenant_id == tenant_id)
            .cloned()
            .collect();
        lists.sort_by_key(|l| l.position);
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
        let position = self
            .data
            .lists
            .iter()
            .filter(|l| l.board_id == board_id)
            .map(|l| l.position + 1)
            .max()
            .unwrap_or(0);
        let list = BoardList {
            id: Uuid::new_v4(),
            tenant_id,
            board_id,
            name: list.name,
            position,
        };
        self.data.lists.push(list.clone());
        Ok(Some(list))
    }

    async fn list_cards(
        &mut self,
        tenant_id: Uuid,
        list_id: Uuid,
    ) -> Result<Option<Vec<Card>>, StoreError> {
        if !self.list_visible(tenant_id, list_id) {
            return Ok(None);
        }
        let mut cards: Vec<Card> = self
            .data
            .cards
            .iter()
            .filter(|c| c.list_id == list_id && c.tenant_id == tenant_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.position);
        Ok(Some(cards))
    }

    async fn create_card(
        &mut self,
        tenant_id: Uuid,
        list_id: Uuid,
        card: NewCard,
    ) -> Result<Option<Card>, StoreError> {
        if !self.list_visible(tenant_id, list_id) {
            return Ok(None);
        }
        let position = self
            .data
            .cards
            .iter()
            .filter(|c| c.list_id == list_id)
            .map(|c| c.position + 1)
            .max()
            .unwrap_or(0);
        let now = Utc::now();
        let card = Card {
            id: Uuid::new_v4(),
            tenant_id,
            list_id,
            title: card.title,
            description: card.description,
            position,
            created_at: now,
            updated_at: now,
        };
        self.data.cards.push(card.clone());
        Ok(Some(card))
    }

    async fn move_card(
        &mut self,
        tenant_id: Uuid,
        card_id: Uuid,
        target: CardMove,
    ) -> Result<Option<Card>, StoreError> {
        if !self.list_visible(tenant_id, target.list_id) {
            return Ok(None);
        }

        let position = match target.position {
            Some(position) => {
                for card in self.data.cards.iter_mut().filter(|c| {
                    c.list_id == target.list_id && c.position >= position && c.id != card_id
                }) {
                    card.position += 1;
                }
                position
            }
            None => self
                .data
                .cards
                .iter()
                .filter(|c| c.list_id == target.list_id && c.id != card_id)
                .map(|c| c.position + 1)
                .max()
                .unwrap_or(0),
        };

        let Some(card) = self
            .data
            .cards
            .iter_mut()
            .find(|c| c.id == card_id && c.tenant_id == tenant_id)
        else {
            return Ok(None);
        };

        card.list_id = target.list_id;
        card.position = position;
        card.updated_at = Utc::now();
        Ok(Some(card.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tenant_setting_does_not_survive_the_session() {
        let store = MemoryStore::with_pool_size(1);
        let tenant = Uuid::new_v4();

        let mut session = store.begin().await.unwrap();
        session.set_current_tenant(tenant).await.unwrap();
        assert_eq!(session.current_tenant().await.unwrap(), Some(tenant));
        session.commit().await.unwrap();

        let mut session = store.begin().await.unwrap();
        assert_eq!(session.current_tenant().await.unwrap(), None);
        session.rollback().await.unwrap();
        assert_eq!(store.idle_connections(), 1);
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();

        let mut session = store.begin().await.unwrap();
        session.set_current_tenant(tenant).await.unwrap();
        session
            .create_board(tenant, NewBoard { name: "Draft".to_string(), description: None })
            .await
            .unwrap();
        drop(session);

        assert_eq!(store.board_count(tenant), 0);
        assert_eq!(store.rollbacks(), 1);
    }
}
