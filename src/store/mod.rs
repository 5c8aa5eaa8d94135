mod memory;
mod redis;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use thiserror::Error;

use crate::cli::Args;
use crate::models::chat::{ ConversationRecord, Turn };

pub use self::memory::MemoryConversationStore;
pub use self::redis::RedisConversationStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The read-modify-write save raced with another writer.
    #[error("concurrent update detected for conversation '{0}'")]
    Conflict(String),
    #[error("storage backend error: {0}")]
    Backend(#[from] ::redis::RedisError),
    #[error("corrupt conversation record: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Durable per-user log of chat turns.
///
/// `load` never fails for an unknown user; absence is `Ok(None)`. Appends are
/// never deduplicated: writing the same turn value twice yields two entries.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<ConversationRecord>, StoreError>;

    /// Primary write path: read-modify-write with conflict detection.
    /// Creates the record on first append.
    async fn append_turn(
        &self,
        user_id: &str,
        turn: &Turn
    ) -> Result<ConversationRecord, StoreError>;

    /// Single server-side upsert-append, safe under concurrent writers.
    /// Used as the fallback when `append_turn` fails.
    async fn push_turn(&self, user_id: &str, turn: &Turn) -> Result<(), StoreError>;
}

pub fn create_conversation_store(
    args: &Args
) -> Result<Arc<dyn ConversationStore>, Box<dyn std::error::Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "redis" => {
            let store = RedisConversationStore::new(
                &args.history_host,
                args.history_redis_prefix.clone()
            )?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryConversationStore::new())),
        other =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported conversation store type: {}", other)
                    )
                )
            ),
    }
}

pub fn initialize_conversation_store(
    args: &Args
) -> Result<Arc<dyn ConversationStore>, Box<dyn std::error::Error + Send + Sync>> {
    info!("Conversation history will be stored in: {} at {}", args.history_type, args.history_host);
    create_conversation_store(args)
}
