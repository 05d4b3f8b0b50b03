//! Tracing layer that mirrors warnings and errors into a Telegram chat.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::assistant::transport::Transport;

/// Flush at least this often.
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
/// Flush early once this many lines are waiting.
const MAX_BATCH: usize = 20;
/// Telegram rejects messages over 4096 characters.
const MAX_MESSAGE_CHARS: usize = 4000;

/// Events from the transport itself are never forwarded, otherwise a failing
/// log chat would report its own failures forever.
const SELF_TARGETS: [&str; 2] = ["leadbot::assistant::telegram", "leadbot::telegram_log"];

pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<String>,
}

impl TelegramLogLayer {
    /// Must be called inside a tokio runtime.
    pub fn new(transport: Arc<dyn Transport>, chat_id: i64) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut buffer: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    line = rx.recv() => match line {
                        Some(line) => {
                            buffer.push(line);
                            if buffer.len() >= MAX_BATCH {
                                flush(transport.as_ref(), chat_id, &mut buffer).await;
                            }
                        }
                        None => {
                            flush(transport.as_ref(), chat_id, &mut buffer).await;
                            break;
                        }
                    },
                    _ = interval.tick() => flush(transport.as_ref(), chat_id, &mut buffer).await,
                }
            }
        });

        Self { tx }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_MESSAGE_CHARS {
        let truncated: String = text.chars().take(MAX_MESSAGE_CHARS).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

async fn flush(transport: &dyn Transport, chat_id: i64, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let combined = crate::assistant::message::escape_html(&buffer.join("\n"));
    buffer.clear();
    if let Err(e) = transport.send_text(chat_id, &truncate(&combined), None).await {
        eprintln!("Failed to send log to Telegram: {e}");
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        if level > Level::WARN || SELF_TARGETS.iter().any(|t| metadata.target().starts_with(t)) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let line = match level {
            Level::ERROR => format!("❌ {}", visitor.message),
            _ => format!("⚠️ {}", visitor.message),
        };

        if self.tx.send(line).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::transport::testing::RecordingTransport;
    use tracing_subscriber::prelude::*;

    #[tokio::test]
    async fn test_forwards_warnings_and_errors_only() {
        let transport = Arc::new(RecordingTransport::default());
        let layer = TelegramLogLayer::new(transport.clone(), -100);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("lead captured");
            tracing::warn!("reply not delivered");
            tracing::error!("database <locked>");
        });

        tokio::time::sleep(FLUSH_INTERVAL + Duration::from_millis(500)).await;

        let texts = transport.texts_to(-100);
        let all = texts.join("\n");
        assert!(all.contains("⚠️ reply not delivered"));
        assert!(all.contains("❌ database &lt;locked&gt;"));
        assert!(!all.contains("lead captured"));
    }

    #[test]
    fn test_truncate_long_messages() {
        let long = "я".repeat(MAX_MESSAGE_CHARS + 10);
        let out = truncate(&long);
        assert_eq!(out.chars().count(), MAX_MESSAGE_CHARS + 3);
        assert_eq!(truncate("short"), "short");
    }
}
