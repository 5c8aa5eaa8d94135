pub mod gemini;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ LlmConfig, LlmType };
use crate::models::chat::HistoryEntry;
use self::gemini::GeminiBridge;
use self::ollama::OllamaBridge;
use self::openai::OpenAIBridge;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Lazy, finite, forward-only sequence of reply fragments. Not restartable;
/// may yield an error at any point, including after fragments were emitted.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, BoxError>> + Send>>;

/// Adapter over a hosted generation provider.
#[async_trait]
pub trait ModelStreamBridge: Send + Sync {
    async fn stream_reply(
        &self,
        system_instruction: &str,
        history: &[HistoryEntry],
        prompt: &str
    ) -> Result<FragmentStream, BoxError>;
}

pub fn new_bridge(config: &LlmConfig) -> Result<Arc<dyn ModelStreamBridge>, BoxError> {
    let bridge: Arc<dyn ModelStreamBridge> = match config.llm_type {
        LlmType::Gemini => Arc::new(GeminiBridge::from_config(config)?),
        LlmType::OpenAI => Arc::new(OpenAIBridge::from_config(config)?),
        LlmType::Ollama => Arc::new(OllamaBridge::from_config(config)?),
    };
    Ok(bridge)
}

/// Reassembles wire lines from network chunks. The carry stays raw bytes and
/// splitting happens on `b'\n'`, so a multi-byte codepoint straddling a chunk
/// boundary is decoded only once its line is complete.
struct LineBuffer {
    carry: Vec<u8>,
}

impl LineBuffer {
    fn new() -> Self {
        Self { carry: Vec::new() }
    }

    /// Absorbs one chunk and returns the lines it completed, decoded and
    /// stripped of the trailing newline (and `\r` for CRLF framing).
    fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.carry.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.carry.drain(..=pos).collect();
            while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Decodes whatever is left after the last chunk (a body not ending in a
    /// newline).
    fn finish(self) -> Option<String> {
        if self.carry.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.carry).into_owned())
        }
    }
}

/// POSTs `payload` to `url` and relays the response body line by line through
/// `line_parser`, which maps one wire line to at most one text fragment.
/// Lines split across network chunks are carried over; a transport error is
/// forwarded in-stream and ends the sequence.
pub async fn http_stream_lines(
    url: String,
    payload: impl serde::Serialize + Send + 'static,
    line_parser: fn(&str) -> Option<String>,
    headers: Vec<(String, String)>
) -> Result<FragmentStream, BoxError> {
    let (tx, rx) = mpsc::channel(32);
    let client = reqwest::Client::new();

    tokio::spawn(async move {
        let mut req = client.post(&url).json(&payload);
        for (name, value) in headers {
            req = req.header(name, value);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                let _ = tx.send(Err(Box::new(e) as BoxError)).await;
                return;
            }
        };
        if let Err(e) = resp.error_for_status_ref() {
            let _ = tx.send(Err(Box::new(e) as BoxError)).await;
            return;
        }

        let mut bytes = resp.bytes_stream();
        let mut buffer = LineBuffer::new();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    for line in buffer.push_chunk(&buf) {
                        if let Some(fragment) = line_parser(&line) {
                            if tx.send(Ok(fragment)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(Box::new(e) as BoxError)).await;
                    return;
                }
            }
        }
        if let Some(fragment) = buffer.finish().as_deref().and_then(line_parser) {
            let _ = tx.send(Ok(fragment)).await;
        }
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codepoint_split_across_chunks_survives_intact() {
        // "no – yes\n" with the en dash (E2 80 93) straddling the chunk edge
        let mut buffer = LineBuffer::new();
        assert!(buffer.push_chunk(&[b'n', b'o', b' ', 0xE2, 0x80]).is_empty());
        let lines = buffer.push_chunk(&[0x93, b' ', b'y', b'e', b's', b'\n']);
        assert_eq!(lines, vec!["no \u{2013} yes".to_string()]);
    }

    #[test]
    fn line_split_across_chunks_is_reassembled() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push_chunk(b"data: {\"par").is_empty());
        let lines = buffer.push_chunk(b"tial\": 1}\ndata: next\n");
        assert_eq!(lines, vec!["data: {\"partial\": 1}".to_string(), "data: next".to_string()]);
    }

    #[test]
    fn crlf_framing_is_stripped() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push_chunk(b"data: x\r\n"), vec!["data: x".to_string()]);
    }

    #[test]
    fn finish_yields_the_unterminated_tail() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push_chunk("tail \u{2013} end".as_bytes()).is_empty());
        assert_eq!(buffer.finish(), Some("tail \u{2013} end".to_string()));

        assert_eq!(LineBuffer::new().finish(), None);
    }
}
