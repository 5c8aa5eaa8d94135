use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use log::{ error, warn };
use std::sync::Arc;

use crate::history::window;
use crate::llm::chat::ModelStreamBridge;
use crate::models::chat::Turn;
use crate::store::ConversationStore;

/// The client side of the sink went away; further writes are pointless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Write side of the transport, as seen by the pipeline. `fail` carries the
/// underlying error detail; the transport decides how to render it (an HTTP
/// error before the first fragment, an in-band marker after).
#[async_trait]
pub trait TurnSink: Send {
    async fn write(&mut self, fragment: &str) -> Result<(), SinkClosed>;
    async fn fail(&mut self, detail: &str);
    async fn close(&mut self);
}

/// Orchestrates one chat turn: history load, windowing, model streaming,
/// fragment relay and durable persistence of the completed exchange.
pub struct ChatTurnPipeline {
    store: Arc<dyn ConversationStore>,
    bridge: Arc<dyn ModelStreamBridge>,
    system_instruction: String,
    max_history_turns: usize,
}

impl ChatTurnPipeline {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        bridge: Arc<dyn ModelStreamBridge>,
        system_instruction: String,
        max_history_turns: usize
    ) -> Self {
        Self {
            store,
            bridge,
            system_instruction,
            max_history_turns,
        }
    }

    /// Handles one turn end to end. Fragments are forwarded to `sink` in
    /// arrival order, with no batching. The transport commit and the
    /// durability commit are independent: once fragments have been streamed,
    /// a persistence failure is logged but never surfaced to the client.
    pub async fn handle_turn(&self, user_id: &str, prompt: &str, sink: &mut dyn TurnSink) {
        let record = match self.store.load(user_id).await {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to load conversation for '{}': {}", user_id, e);
                sink.fail(&e.to_string()).await;
                sink.close().await;
                return;
            }
        };

        let history = window(record.as_ref(), self.max_history_turns);

        let mut stream = match
            self.bridge.stream_reply(&self.system_instruction, &history, prompt).await
        {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to open model stream for '{}': {}", user_id, e);
                sink.fail(&e.to_string()).await;
                sink.close().await;
                return;
            }
        };

        let mut reply = String::new();
        // Set when the client disconnects; generation cost is already sunk,
        // so the stream is still drained and the turn persisted.
        let mut detached = false;

        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => {
                    reply.push_str(&fragment);
                    if !detached && sink.write(&fragment).await.is_err() {
                        warn!("Client for '{}' disconnected mid-stream", user_id);
                        detached = true;
                    }
                }
                Err(e) => {
                    // Fragments already relayed are delivered output; no
                    // generation retry, the partial reply is kept.
                    error!("Model stream failed for '{}': {}", user_id, e);
                    if !detached {
                        sink.fail(&e.to_string()).await;
                    }
                    break;
                }
            }
        }

        self.persist_turn(user_id, prompt, reply).await;
        sink.close().await;
    }

    async fn persist_turn(&self, user_id: &str, prompt: &str, reply: String) {
        let turn = Turn {
            user_text: prompt.to_string(),
            assistant_text: reply,
            timestamp: Utc::now().timestamp_millis(),
        };

        // Any primary-save error triggers the atomic fallback, not only true
        // version conflicts.
        if let Err(primary) = self.store.append_turn(user_id, &turn).await {
            warn!(
                "Primary save failed for '{}' ({}); retrying via atomic append",
                user_id,
                primary
            );
            if let Err(fallback) = self.store.push_turn(user_id, &turn).await {
                warn!(
                    "Fallback save failed for '{}'; turn lost from durable history: {}",
                    user_id,
                    fallback
                );
            }
        }
    }
}
