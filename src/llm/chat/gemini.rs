use async_trait::async_trait;
use log::info;
use serde::{ Deserialize, Serialize };

use super::{ http_stream_lines, BoxError, FragmentStream, ModelStreamBridge };
use crate::llm::LlmConfig;
use crate::models::chat::{ HistoryEntry, Role };

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Serialize)]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiTurnContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiTurnContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiChunkContent>,
}

#[derive(Deserialize)]
struct GeminiChunkContent {
    #[serde(default)]
    parts: Vec<GeminiChunkPart>,
}

#[derive(Deserialize)]
struct GeminiChunkPart {
    text: Option<String>,
}

/// Parses one SSE line of a `streamGenerateContent?alt=sse` response.
fn parse_gemini_line(line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    let chunk: GeminiChunk = serde_json::from_str(data).ok()?;
    let text: String = chunk.candidates
        .first()?
        .content.as_ref()?
        .parts.iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

pub struct GeminiBridge {
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBridge {
    pub fn from_config(config: &LlmConfig) -> Result<Self, BoxError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "Gemini API key is required for GeminiBridge".to_string())?;
        Ok(Self {
            api_key,
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[async_trait]
impl ModelStreamBridge for GeminiBridge {
    async fn stream_reply(
        &self,
        system_instruction: &str,
        history: &[HistoryEntry],
        prompt: &str
    ) -> Result<FragmentStream, BoxError> {
        let mut contents: Vec<GeminiTurnContent> = history
            .iter()
            .map(|entry| GeminiTurnContent {
                role: gemini_role(entry.role),
                parts: vec![GeminiPart { text: entry.text.clone() }],
            })
            .collect();
        contents.push(GeminiTurnContent {
            role: "user",
            parts: vec![GeminiPart { text: prompt.to_string() }],
        });

        let payload = GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart { text: system_instruction.to_string() }],
            },
            contents,
        };

        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        );
        info!("GeminiBridge::stream_reply() → model={} history_entries={}", self.model, history.len());

        http_stream_lines(
            url,
            payload,
            parse_gemini_line,
            vec![("Content-Type".to_string(), "application/json".to_string())]
        ).await
    }
}
