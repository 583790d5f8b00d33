//! Long-running sub-process session streaming stream-JSON over stdio (§4.9).

use crate::error::RuntimeError;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

/// One event emitted by the session process.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Assistant { text: Option<String>, tool_uses: Vec<Value> },
    Result { payload: Value },
    Other(Value),
}

fn parse_event(line: &str) -> Option<SessionEvent> {
    let value: Value = serde_json::from_str(line).ok()?;
    match value.get("type").and_then(Value::as_str) {
        Some("assistant") => {
            let text = value.pointer("/message/content").and_then(|c| c.as_array()).and_then(|parts| {
                parts.iter().find_map(|p| {
                    if p.get("type").and_then(Value::as_str) == Some("text") {
                        p.get("text").and_then(Value::as_str).map(str::to_string)
                    } else {
                        None
                    }
                })
            });
            let tool_uses = value
                .pointer("/message/content")
                .and_then(|c| c.as_array())
                .map(|parts| parts.iter().filter(|p| p.get("type").and_then(Value::as_str) == Some("tool_use")).cloned().collect())
                .unwrap_or_default();
            Some(SessionEvent::Assistant { text, tool_uses })
        }
        Some("result") => Some(SessionEvent::Result { payload: value }),
        _ => Some(SessionEvent::Other(value)),
    }
}

/// A long-lived `Child` whose stdout is parsed as newline-delimited
/// stream-JSON events. An idle timer resets on every received line; once it
/// fires the session closes itself and the event channel is dropped.
pub struct Session {
    stdin: Mutex<ChildStdin>,
    child: Mutex<Child>,
    closed: Arc<AtomicBool>,
}

impl Session {
    pub fn spawn(program: &str, args: &[String], idle_timeout: Duration) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), RuntimeError> {
        let mut command = Command::new(program);
        command.args(args).stdin(std::process::Stdio::piped()).stdout(std::process::Stdio::piped()).stderr(std::process::Stdio::null());
        command.process_group(0);
        let mut child = command.spawn().map_err(RuntimeError::Spawn)?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let pid = child.id();
        let closed_reader = closed.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut idle = tokio::time::interval(idle_timeout);
            idle.tick().await; // first tick fires immediately; consume it

            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(raw)) => {
                            idle.reset();
                            if let Some(event) = parse_event(&raw) {
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                        }
                        Ok(None) => {
                            debug!("session process closed stdout");
                            break;
                        }
                        Err(err) => {
                            warn!(%err, "session stdout read error");
                            break;
                        }
                    },
                    _ = idle.tick() => {
                        warn!("session idle timeout, closing");
                        break;
                    }
                }
            }
            closed_reader.store(true, Ordering::Release);
            if let Some(pid) = pid {
                let _ = Command::new("kill").args(["-TERM", &format!("-{pid}")]).status().await;
            }
        });

        Ok((Self { stdin: Mutex::new(stdin), child: Mutex::new(child), closed }, rx))
    }

    pub async fn send(&self, text: &str) -> Result<(), RuntimeError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RuntimeError::SessionClosed);
        }
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(text.as_bytes()).await.map_err(RuntimeError::Io)?;
        stdin.write_all(b"\n").await.map_err(RuntimeError::Io)?;
        stdin.flush().await.map_err(RuntimeError::Io)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Idempotent: a second call is a no-op.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut child = self.child.lock().await;
        if let Some(pid) = child.id() {
            let _ = Command::new("kill").args(["-TERM", &format!("-{pid}")]).status().await;
        }
        let _ = child.kill().await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_event_extracts_assistant_text() {
        let raw = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hello"}]}}"#;
        let event = parse_event(raw).unwrap();
        match event {
            SessionEvent::Assistant { text, tool_uses } => {
                assert_eq!(text.as_deref(), Some("hello"));
                assert!(tool_uses.is_empty());
            }
            _ => panic!("expected Assistant event"),
        }
    }

    #[test]
    fn parse_event_extracts_tool_uses() {
        let raw = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"server_inspect"}]}}"#;
        let event = parse_event(raw).unwrap();
        match event {
            SessionEvent::Assistant { tool_uses, .. } => assert_eq!(tool_uses.len(), 1),
            _ => panic!("expected Assistant event"),
        }
    }

    #[test]
    fn parse_event_recognizes_result() {
        let raw = r#"{"type":"result","subtype":"success"}"#;
        assert!(matches!(parse_event(raw), Some(SessionEvent::Result { .. })));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (session, _rx) = Session::spawn("cat", &[], Duration::from_secs(5)).unwrap();
        assert!(session.close().await);
        assert!(!session.close().await);
    }
}
