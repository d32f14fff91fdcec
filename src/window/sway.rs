//! sway/i3 IPC: focused-window query and window-event subscription.
//!
//! Speaks the i3 IPC protocol over `$SWAYSOCK`: a 14-byte header
//! (`"i3-ipc"` magic + u32 payload length + u32 message type) followed by a
//! JSON payload. Two connections are used, one for queries and one for the
//! event subscription, mirroring how swaymsg does it.

use crate::error::{Result, SpeakError};
use crate::window::WindowSnapshot;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

const MAGIC: &[u8; 6] = b"i3-ipc";
const MSG_SUBSCRIBE: u32 = 2;
const MSG_GET_TREE: u32 = 4;
const EVENT_WINDOW: u32 = 0x8000_0003;

pub struct SwayIpc {
    stream: UnixStream,
}

impl SwayIpc {
    /// Connect to the sway socket named by `$SWAYSOCK`.
    pub async fn connect() -> Result<Self> {
        let sock = std::env::var("SWAYSOCK").map_err(|_| SpeakError::WindowIpc {
            message: "$SWAYSOCK not set".to_string(),
        })?;
        let stream = UnixStream::connect(&sock)
            .await
            .map_err(|e| SpeakError::WindowIpc {
                message: format!("connect to {} failed: {}", sock, e),
            })?;
        Ok(Self { stream })
    }

    /// Query the layout tree and return the focused window, if any.
    pub async fn focused_window(&mut self) -> Result<WindowSnapshot> {
        self.send_message(MSG_GET_TREE, b"").await?;
        let (_, payload) = self.recv_message().await?;

        let tree: Value = serde_json::from_slice(&payload).map_err(|e| SpeakError::WindowIpc {
            message: format!("invalid GET_TREE payload: {}", e),
        })?;
        Ok(find_focused(&tree).unwrap_or_default())
    }

    /// Subscribe this connection to window events.
    pub async fn subscribe_window_events(&mut self) -> Result<()> {
        self.send_message(MSG_SUBSCRIBE, br#"["window"]"#).await?;
        let (_, payload) = self.recv_message().await?;

        let ack: Value = serde_json::from_slice(&payload).map_err(|e| SpeakError::WindowIpc {
            message: format!("invalid subscribe ack: {}", e),
        })?;
        if ack.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(SpeakError::WindowIpc {
                message: "window event subscription refused".to_string(),
            });
        }
        Ok(())
    }

    /// Read the next event; `Ok(Some)` only for focus changes.
    pub async fn read_focus_event(&mut self) -> Result<Option<WindowSnapshot>> {
        let (msg_type, payload) = self.recv_message().await?;
        if msg_type != EVENT_WINDOW {
            return Ok(None);
        }

        let event: Value = match serde_json::from_slice(&payload) {
            Ok(v) => v,
            Err(_) => return Ok(None),
        };
        if event.get("change").and_then(Value::as_str) != Some("focus") {
            return Ok(None);
        }

        Ok(event.get("container").map(snapshot_from_node))
    }

    async fn send_message(&mut self, msg_type: u32, payload: &[u8]) -> Result<()> {
        let mut header = [0u8; 14];
        header[..6].copy_from_slice(MAGIC);
        header[6..10].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        header[10..14].copy_from_slice(&msg_type.to_le_bytes());

        self.stream
            .write_all(&header)
            .await
            .map_err(|e| SpeakError::WindowIpc {
                message: format!("send failed: {}", e),
            })?;
        if !payload.is_empty() {
            self.stream
                .write_all(payload)
                .await
                .map_err(|e| SpeakError::WindowIpc {
                    message: format!("send failed: {}", e),
                })?;
        }
        Ok(())
    }

    async fn recv_message(&mut self) -> Result<(u32, Vec<u8>)> {
        let mut header = [0u8; 14];
        self.stream
            .read_exact(&mut header)
            .await
            .map_err(|e| SpeakError::WindowIpc {
                message: format!("recv failed: {}", e),
            })?;

        if &header[..6] != MAGIC {
            return Err(SpeakError::WindowIpc {
                message: "bad i3-ipc magic".to_string(),
            });
        }

        let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
        let msg_type = u32::from_le_bytes([header[10], header[11], header[12], header[13]]);

        let mut payload = vec![0u8; len];
        self.stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| SpeakError::WindowIpc {
                message: format!("recv failed: {}", e),
            })?;

        Ok((msg_type, payload))
    }
}

/// Connect, read the initially focused window, and spawn a task forwarding
/// focus changes onto the returned channel.
///
/// The channel closes when sway goes away; the daemon keeps running with
/// window context disabled from then on.
pub async fn watch() -> Result<(WindowSnapshot, mpsc::UnboundedReceiver<WindowSnapshot>)> {
    let mut query = SwayIpc::connect().await?;
    let initial = query.focused_window().await.unwrap_or_default();

    let mut events = SwayIpc::connect().await?;
    events.subscribe_window_events().await?;

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            match events.read_focus_event().await {
                Ok(Some(snapshot)) => {
                    if tx.send(snapshot).is_err() {
                        break;
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!("sway event stream closed: {}", e);
                    break;
                }
            }
        }
    });

    Ok((initial, rx))
}

fn snapshot_from_node(node: &Value) -> WindowSnapshot {
    WindowSnapshot {
        app_id: node
            .get("app_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        window_class: node
            .pointer("/window_properties/class")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        title: node
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        pid: node.get("pid").and_then(Value::as_i64).unwrap_or(0) as i32,
        ..Default::default()
    }
}

/// Depth-first search of the layout tree for the focused node.
fn find_focused(node: &Value) -> Option<WindowSnapshot> {
    if node.get("focused").and_then(Value::as_bool) == Some(true) {
        let snapshot = snapshot_from_node(node);
        if !snapshot.is_empty() {
            return Some(snapshot);
        }
    }

    for key in ["nodes", "floating_nodes"] {
        if let Some(children) = node.get(key).and_then(Value::as_array) {
            for child in children {
                if let Some(found) = find_focused(child) {
                    return Some(found);
                }
            }
        }
    }
    None
}
