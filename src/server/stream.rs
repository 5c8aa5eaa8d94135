use async_trait::async_trait;
use futures::{ future, Stream, StreamExt };
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::pipeline::{ SinkClosed, TurnSink };

/// Appended in-band when generation fails after the response headers (and
/// possibly some fragments) have already gone out.
pub const ERROR_MARKER: &str = "\n\n[Error: Failed to complete response]";

#[derive(Debug, PartialEq)]
pub enum SinkEvent {
    Fragment(String),
    /// Terminal failure; carries the underlying error detail.
    Abort(String),
    End,
}

/// Pipeline-facing sink that forwards events over a bounded channel to the
/// HTTP response task. A closed receiver (client disconnect) turns writes
/// into `SinkClosed` errors.
pub struct ChannelSink {
    tx: mpsc::Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SinkEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TurnSink for ChannelSink {
    async fn write(&mut self, fragment: &str) -> Result<(), SinkClosed> {
        self.tx
            .send(SinkEvent::Fragment(fragment.to_string())).await
            .map_err(|_| SinkClosed)
    }

    async fn fail(&mut self, detail: &str) {
        let _ = self.tx.send(SinkEvent::Abort(detail.to_string())).await;
    }

    async fn close(&mut self) {
        let _ = self.tx.send(SinkEvent::End).await;
    }
}

/// Maps the remaining sink events to response-body chunks: fragments pass
/// through as they arrive, an abort renders the in-band marker, `End` (or a
/// dropped sender) terminates the body.
pub fn body_chunks(rx: mpsc::Receiver<SinkEvent>) -> impl Stream<Item = String> + Send {
    ReceiverStream::new(rx)
        .take_while(|event| future::ready(!matches!(event, SinkEvent::End)))
        .filter_map(|event|
            future::ready(match event {
                SinkEvent::Fragment(text) => Some(text),
                SinkEvent::Abort(_) => Some(ERROR_MARKER.to_string()),
                SinkEvent::End => None,
            })
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_events_arrive_in_write_order() {
        let (mut sink, mut rx) = ChannelSink::channel(8);
        sink.write("a").await.unwrap();
        sink.write("b").await.unwrap();
        sink.close().await;

        assert_eq!(rx.recv().await, Some(SinkEvent::Fragment("a".into())));
        assert_eq!(rx.recv().await, Some(SinkEvent::Fragment("b".into())));
        assert_eq!(rx.recv().await, Some(SinkEvent::End));
    }

    #[tokio::test]
    async fn write_after_receiver_drop_reports_sink_closed() {
        let (mut sink, rx) = ChannelSink::channel(8);
        drop(rx);
        assert_eq!(sink.write("a").await, Err(SinkClosed));
        // fail/close become no-ops rather than errors
        sink.fail("boom").await;
        sink.close().await;
    }

    #[tokio::test]
    async fn body_concatenates_fragments_until_end() {
        let (mut sink, rx) = ChannelSink::channel(8);
        tokio::spawn(async move {
            sink.write("Check ").await.unwrap();
            sink.write("the cable.").await.unwrap();
            sink.close().await;
        });

        let chunks: Vec<String> = body_chunks(rx).collect().await;
        assert_eq!(chunks.concat(), "Check the cable.");
    }

    #[tokio::test]
    async fn mid_stream_abort_renders_the_marker() {
        let (mut sink, rx) = ChannelSink::channel(8);
        tokio::spawn(async move {
            sink.write("Step 1: ").await.unwrap();
            sink.fail("connection reset").await;
            sink.close().await;
        });

        let chunks: Vec<String> = body_chunks(rx).collect().await;
        assert_eq!(chunks, vec!["Step 1: ".to_string(), ERROR_MARKER.to_string()]);
    }
}
