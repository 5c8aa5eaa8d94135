use async_trait::async_trait;
use log::info;
use serde::{ Deserialize, Serialize };

use super::{ http_stream_lines, BoxError, FragmentStream, ModelStreamBridge };
use crate::llm::LlmConfig;
use crate::models::chat::HistoryEntry;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3";

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct OllamaChunk {
    message: Option<OllamaChunkMessage>,
}

#[derive(Deserialize)]
struct OllamaChunkMessage {
    content: Option<String>,
}

/// Parses one NDJSON line of an `/api/chat` streaming response.
fn parse_ollama_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let chunk: OllamaChunk = serde_json::from_str(line).ok()?;
    chunk.message?
        .content
        .filter(|text| !text.is_empty())
}

/// Local-model bridge, useful for keyless development setups.
pub struct OllamaBridge {
    model: String,
    base_url: String,
}

impl OllamaBridge {
    pub fn from_config(config: &LlmConfig) -> Result<Self, BoxError> {
        Ok(Self {
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[async_trait]
impl ModelStreamBridge for OllamaBridge {
    async fn stream_reply(
        &self,
        system_instruction: &str,
        history: &[HistoryEntry],
        prompt: &str
    ) -> Result<FragmentStream, BoxError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(OllamaMessage {
            role: "system",
            content: system_instruction.to_string(),
        });
        for entry in history {
            messages.push(OllamaMessage {
                role: entry.role.as_str(),
                content: entry.text.clone(),
            });
        }
        messages.push(OllamaMessage {
            role: "user",
            content: prompt.to_string(),
        });

        let payload = OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: true,
        };
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        info!("OllamaBridge::stream_reply() → model={} history_entries={}", self.model, history.len());

        http_stream_lines(
            url,
            payload,
            parse_ollama_line,
            vec![("Content-Type".to_string(), "application/json".to_string())]
        ).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_message_content() {
        let line = r#"{"message":{"content":"Try "},"done":false}"#;
        assert_eq!(parse_ollama_line(line), Some("Try ".to_string()));
    }

    #[test]
    fn final_done_chunk_yields_nothing() {
        let line = r#"{"message":{"content":""},"done":true}"#;
        assert_eq!(parse_ollama_line(line), None);
    }
}
