//! Minimal DevTools protocol client: one websocket, request/response
//! correlation by command id, events logged and otherwise ignored.

use crate::BrowserError;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, BrowserError>>>;

pub struct CdpConnection {
    write: tokio::sync::Mutex<WsSink>,
    pending: Arc<Mutex<PendingMap>>,
    next_id: AtomicU64,
    connected: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl CdpConnection {
    /// Connect to a DevTools page websocket and start the read loop.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let (stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| BrowserError::Transport(format!("websocket connect failed: {e}")))?;
        let (write, mut read) = stream.split();

        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let reader_pending = pending.clone();
        let reader_connected = connected.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(error = %e, "DevTools websocket error");
                        break;
                    }
                };
                let Ok(text) = message.to_text() else {
                    continue;
                };
                match parse_incoming(text) {
                    Incoming::Reply { id, result } => {
                        let sender = reader_pending.lock().expect("pending map poisoned").remove(&id);
                        if let Some(sender) = sender {
                            let _ = sender
                                .send(result.map_err(BrowserError::Protocol));
                        }
                    }
                    Incoming::Event { method } => trace!(%method, "DevTools event"),
                    Incoming::Malformed => debug!("Discarding malformed DevTools frame"),
                }
            }

            // Socket gone: fail everything still waiting.
            reader_connected.store(false, Ordering::SeqCst);
            let mut pending = reader_pending.lock().expect("pending map poisoned");
            for (_, sender) in pending.drain() {
                let _ = sender.send(Err(BrowserError::Transport(
                    "devtools connection closed".to_string(),
                )));
            }
        });

        Ok(Self {
            write: tokio::sync::Mutex::new(write),
            pending,
            next_id: AtomicU64::new(1),
            connected,
            reader: Mutex::new(Some(reader)),
        })
    }

    /// Issue one protocol command and wait for its reply.
    pub async fn command(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        if !self.is_connected() {
            return Err(BrowserError::Transport(
                "devtools connection closed".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending map poisoned")
            .insert(id, tx);

        let payload = command_payload(id, method, params);
        let send_result = self
            .write
            .lock()
            .await
            .send(Message::Text(payload.into()))
            .await;
        if let Err(e) = send_result {
            self.pending
                .lock()
                .expect("pending map poisoned")
                .remove(&id);
            self.connected.store(false, Ordering::SeqCst);
            return Err(BrowserError::Transport(format!("websocket send failed: {e}")));
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(BrowserError::Transport(
                "devtools connection closed".to_string(),
            )),
            Err(_) => {
                self.pending
                    .lock()
                    .expect("pending map poisoned")
                    .remove(&id);
                Err(BrowserError::Timeout(COMMAND_TIMEOUT, method.to_string()))
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Stop the read loop and mark the connection dead.
    pub fn shutdown(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader.lock().expect("reader handle poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn command_payload(id: u64, method: &str, params: Value) -> String {
    json!({ "id": id, "method": method, "params": params }).to_string()
}

pub(crate) enum Incoming {
    Reply {
        id: u64,
        result: Result<Value, String>,
    },
    Event {
        method: String,
    },
    Malformed,
}

pub(crate) fn parse_incoming(text: &str) -> Incoming {
    let Ok(frame) = serde_json::from_str::<Value>(text) else {
        return Incoming::Malformed;
    };

    if let Some(id) = frame["id"].as_u64() {
        let result = if let Some(error) = frame.get("error") {
            Err(error["message"]
                .as_str()
                .unwrap_or("unknown devtools error")
                .to_string())
        } else {
            Ok(frame["result"].clone())
        };
        return Incoming::Reply { id, result };
    }

    if let Some(method) = frame["method"].as_str() {
        return Incoming::Event {
            method: method.to_string(),
        };
    }
    Incoming::Malformed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_id_method_params() {
        let payload = command_payload(7, "Page.navigate", json!({ "url": "https://example.com" }));
        let parsed: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["id"], 7);
        assert_eq!(parsed["method"], "Page.navigate");
        assert_eq!(parsed["params"]["url"], "https://example.com");
    }

    #[test]
    fn replies_and_events_are_distinguished() {
        match parse_incoming(r#"{"id":3,"result":{"frameId":"f"}}"#) {
            Incoming::Reply { id, result } => {
                assert_eq!(id, 3);
                assert_eq!(result.unwrap()["frameId"], "f");
            }
            _ => panic!("expected reply"),
        }

        match parse_incoming(r#"{"id":4,"error":{"code":-32000,"message":"no node"}}"#) {
            Incoming::Reply { id, result } => {
                assert_eq!(id, 4);
                assert_eq!(result.unwrap_err(), "no node");
            }
            _ => panic!("expected error reply"),
        }

        match parse_incoming(r#"{"method":"Page.loadEventFired","params":{}}"#) {
            Incoming::Event { method } => assert_eq!(method, "Page.loadEventFired"),
            _ => panic!("expected event"),
        }

        assert!(matches!(parse_incoming("not json"), Incoming::Malformed));
    }
}
