use async_trait::async_trait;
use chrono::Utc;
use redis::{ AsyncCommands, Client, Script };

use super::{ ConversationStore, StoreError };
use crate::models::chat::{ ConversationRecord, Turn };

/// Compare-and-set against the raw value observed at load time. An empty
/// ARGV[1] stands for "record was absent". Returns 0 when another writer got
/// there first.
const CAS_SAVE_SCRIPT: &str = r#"
local cur = redis.call('GET', KEYS[1])
if cur == false then cur = '' end
if cur ~= ARGV[1] then return 0 end
redis.call('SET', KEYS[1], ARGV[2])
return 1
"#;

/// Atomic upsert-append: decode the document server-side, push the turn,
/// creating the record if absent. Scripts execute atomically, so this cannot
/// lose a concurrent append.
const PUSH_TURN_SCRIPT: &str = r#"
local doc
local raw = redis.call('GET', KEYS[1])
if raw then
    doc = cjson.decode(raw)
else
    doc = { userId = ARGV[1], turns = {}, updatedAt = 0 }
end
if doc.turns == nil then doc.turns = {} end
table.insert(doc.turns, cjson.decode(ARGV[2]))
doc.updatedAt = tonumber(ARGV[3])
redis.call('SET', KEYS[1], cjson.encode(doc))
return #doc.turns
"#;

/// Conversation log stored as one JSON document per user under
/// `{prefix}{userId}`.
pub struct RedisConversationStore {
    client: Client,
    key_prefix: String,
    cas_save: Script,
    push_turn: Script,
}

impl RedisConversationStore {
    pub fn new(
        host: &str,
        key_prefix: String
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self {
            client: Client::open(host)?,
            key_prefix,
            cas_save: Script::new(CAS_SAVE_SCRIPT),
            push_turn: Script::new(PUSH_TURN_SCRIPT),
        })
    }

    fn key(&self, user_id: &str) -> String {
        format!("{}{}", self.key_prefix, user_id)
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    async fn load(&self, user_id: &str) -> Result<Option<ConversationRecord>, StoreError> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = conn.get(self.key(user_id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn append_turn(
        &self,
        user_id: &str,
        turn: &Turn
    ) -> Result<ConversationRecord, StoreError> {
        let mut conn = self.get_connection().await?;
        let key = self.key(user_id);

        let observed: Option<String> = conn.get(&key).await?;
        let mut record = match &observed {
            Some(json) => serde_json::from_str(json)?,
            None => ConversationRecord::new(user_id),
        };
        record.turns.push(turn.clone());
        record.updated_at = Utc::now().timestamp_millis();
        let next = serde_json::to_string(&record)?;

        let swapped: i32 = self.cas_save
            .key(&key)
            .arg(observed.unwrap_or_default())
            .arg(&next)
            .invoke_async(&mut conn).await?;
        if swapped == 0 {
            return Err(StoreError::Conflict(user_id.to_string()));
        }
        Ok(record)
    }

    async fn push_turn(&self, user_id: &str, turn: &Turn) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let turn_json = serde_json::to_string(turn)?;
        let _len: i64 = self.push_turn
            .key(self.key(user_id))
            .arg(user_id)
            .arg(&turn_json)
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn).await?;
        Ok(())
    }
}
