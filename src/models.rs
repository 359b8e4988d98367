//! Typed views of the rows the app reads and writes.
//!
//! The query layer stays schema-agnostic; these only exist so handlers can
//! decode and validate what they get back.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const PROFILES: &str = "profiles";
pub const FRIENDS: &str = "friends";
pub const TOURNAMENTS: &str = "tournaments";
pub const REGISTRATIONS: &str = "registrations";
pub const MESSAGES: &str = "messages";
pub const NOTIFICATIONS: &str = "notifications";

/// Soft cap on inbox size; reaching it only flips `is_full`.
pub const INBOX_CAPACITY: usize = 100;

/// Primary key of a non-profile row: bigint or text/uuid depending on table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Path segments arrive as text; numeric ones are bigint keys.
    pub fn parse(raw: &str) -> Self {
        raw.parse::<i64>()
            .map(RecordId::Int)
            .unwrap_or_else(|_| RecordId::Text(raw.to_string()))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::Int(n) => Value::from(n),
            RecordId::Text(s) => Value::from(s),
        }
    }
}

impl From<&RecordId> for Value {
    fn from(id: &RecordId) -> Self {
        id.clone().into()
    }
}

//////////////////////////////////////////////////
// Profiles
//////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// In-game UID; set at signup and never edited.
    #[serde(default)]
    pub cod_uid: Option<String>,
    #[serde(default)]
    pub in_game_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Profile {
    /// What other players may see in search results.
    pub fn public(mut self) -> Self {
        self.email = None;
        self.first_name = None;
        self.last_name = None;
        self
    }
}

/// Owner-editable profile fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar_url.is_none()
    }
}

//////////////////////////////////////////////////
// Friends
//////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendStatus {
    Pending,
    Accepted,
}

impl FriendStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FriendStatus::Pending => "pending",
            FriendStatus::Accepted => "accepted",
        }
    }
}

/// Directed edge: `user_id` asked `friend_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendEdge {
    pub id: RecordId,
    pub user_id: Uuid,
    pub friend_id: Uuid,
    pub status: FriendStatus,
}

impl FriendEdge {
    pub fn involves(&self, user: Uuid) -> bool {
        self.user_id == user || self.friend_id == user
    }

    /// The other end of the edge as seen from `user`.
    pub fn other(&self, user: Uuid) -> Uuid {
        if self.user_id == user {
            self.friend_id
        } else {
            self.user_id
        }
    }
}

//////////////////////////////////////////////////
// Tournaments & registrations
//////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentStatus {
    Registering,
    Open,
    #[serde(rename = "Last Call")]
    LastCall,
    Closed,
    #[serde(other)]
    Unknown,
}

impl TournamentStatus {
    pub fn accepts_registrations(self) -> bool {
        matches!(
            self,
            TournamentStatus::Registering | TournamentStatus::Open | TournamentStatus::LastCall
        )
    }
}

fn default_status() -> TournamentStatus {
    TournamentStatus::Registering
}

fn default_team_size() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default = "default_team_size")]
    pub team_size: u32,
    #[serde(default)]
    pub entry_fee: f64,
    #[serde(default)]
    pub prize_pool: f64,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default = "default_status")]
    pub status: TournamentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomCredentials {
    pub room_code: Option<String>,
    pub room_password: Option<String>,
}

impl Tournament {
    /// Drops the room credentials; they are only shown after registering.
    pub fn redacted(mut self) -> Self {
        self.room_code = None;
        self.room_password = None;
        self
    }

    pub fn credentials(&self) -> RoomCredentials {
        RoomCredentials {
            room_code: self.room_code.clone(),
            room_password: self.room_password.clone(),
        }
    }

    /// Case-insensitive substring match on the name.
    pub fn name_contains(&self, needle: &str) -> bool {
        let needle = needle.trim();
        needle.is_empty() || self.name.to_lowercase().contains(&needle.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub tournament_id: RecordId,
    pub user_id: Uuid,
    /// The registering user first, then selected teammates.
    #[serde(default)]
    pub team: Vec<Uuid>,
    #[serde(default)]
    pub paid: bool,
}

//////////////////////////////////////////////////
// Inbox & notifications
//////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
