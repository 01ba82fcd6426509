use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A column on a board. Named `BoardList` to stay clear of `std` collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BoardList {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub board_id: Uuid,
    pub name: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub list_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBoard {
    pub name: String,
    pub description: Option<String>,
}

/// Partial board update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct BoardPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewList {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct NewCard {
    pub title: String,
    pub description: Option<String>,
}

/// Target of a drag-and-drop move. Without a position the card goes last.
#[derive(Debug, Clone, Copy)]
pub struct CardMove {
    pub list_id: Uuid,
    pub position: Option<i32>,
}
