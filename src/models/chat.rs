use serde::{ Serialize, Deserialize };

/// One user/assistant exchange. Immutable once appended to a record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub user_text: String,
    pub assistant_text: String,
    /// Unix millis, set when the turn is persisted.
    pub timestamp: i64,
}

/// Durable conversation log, one per user id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub user_id: String,
    pub turns: Vec<Turn>,
    pub updated_at: i64,
}

impl ConversationRecord {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            turns: Vec::new(),
            updated_at: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of the windowed context handed to the model bridge.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}
