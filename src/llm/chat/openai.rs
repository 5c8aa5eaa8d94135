use async_trait::async_trait;
use log::info;
use serde::{ Deserialize, Serialize };

use super::{ http_stream_lines, BoxError, FragmentStream, ModelStreamBridge };
use crate::llm::LlmConfig;
use crate::models::chat::HistoryEntry;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

fn parse_openai_line(line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    let chunk: OpenAIStreamChunk = serde_json::from_str(data).ok()?;
    chunk.choices
        .first()?
        .delta.content.clone()
        .filter(|text| !text.is_empty())
}

/// Works against the OpenAI chat-completions API and compatible endpoints.
pub struct OpenAIBridge {
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIBridge {
    pub fn from_config(config: &LlmConfig) -> Result<Self, BoxError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "OpenAI API key is required for OpenAIBridge".to_string())?;
        Ok(Self {
            api_key,
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[async_trait]
impl ModelStreamBridge for OpenAIBridge {
    async fn stream_reply(
        &self,
        system_instruction: &str,
        history: &[HistoryEntry],
        prompt: &str
    ) -> Result<FragmentStream, BoxError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(OpenAIMessage {
            role: "system",
            content: system_instruction.to_string(),
        });
        for entry in history {
            messages.push(OpenAIMessage {
                role: entry.role.as_str(),
                content: entry.text.clone(),
            });
        }
        messages.push(OpenAIMessage {
            role: "user",
            content: prompt.to_string(),
        });

        let payload = OpenAIRequest {
            model: self.model.clone(),
            messages,
            stream: true,
        };
        info!("OpenAIBridge::stream_reply() → model={} history_entries={}", self.model, history.len());

        http_stream_lines(
            self.base_url.clone(),
            payload,
            parse_openai_line,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), format!("Bearer {}", self.api_key))
            ]
        ).await
    }
}
