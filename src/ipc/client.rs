//! IPC client for sending commands to the daemon.

use crate::defaults::CLIENT_TIMEOUT_SECS;
use crate::error::{Result, SpeakError};
use crate::ipc::protocol::{Request, Response};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// The default socket path: `$XDG_RUNTIME_DIR/speak-anywhere.sock`, with a
/// /tmp fallback.
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join(crate::defaults::SOCKET_FILE_NAME)
    } else {
        PathBuf::from("/tmp").join(crate::defaults::SOCKET_FILE_NAME)
    }
}

/// Send one command to the daemon and wait for its response.
///
/// Deferred responses (stop/toggle during recording) can take as long as a
/// transcription round-trip; the wait is bounded by
/// [`CLIENT_TIMEOUT_SECS`].
///
/// # Errors
/// `IpcConnection` if the daemon is unreachable or times out,
/// `IpcProtocol` if either side's frame fails to (de)serialize.
pub async fn send_command(socket_path: &Path, request: Request) -> Result<Response> {
    let exchange = async {
        let stream =
            UnixStream::connect(socket_path)
                .await
                .map_err(|e| SpeakError::IpcConnection {
                    message: format!("Failed to connect to daemon: {}", e),
                })?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let request_json = request.to_json().map_err(|e| SpeakError::IpcProtocol {
            message: format!("Failed to serialize command: {}", e),
        })?;

        writer
            .write_all(request_json.as_bytes())
            .await
            .map_err(|e| SpeakError::IpcConnection {
                message: format!("Failed to write command: {}", e),
            })?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| SpeakError::IpcConnection {
                message: format!("Failed to write newline: {}", e),
            })?;
        writer
            .flush()
            .await
            .map_err(|e| SpeakError::IpcConnection {
                message: format!("Failed to flush writer: {}", e),
            })?;

        let mut response_line = String::new();
        let n = reader
            .read_line(&mut response_line)
            .await
            .map_err(|e| SpeakError::IpcConnection {
                message: format!("Failed to read response: {}", e),
            })?;
        if n == 0 {
            return Err(SpeakError::IpcConnection {
                message: "Daemon closed the connection without responding".to_string(),
            });
        }

        Response::from_json(response_line.trim()).map_err(|e| SpeakError::IpcProtocol {
            message: format!("Failed to deserialize response: {}", e),
        })
    };

    tokio::time::timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS), exchange)
        .await
        .map_err(|_| SpeakError::IpcConnection {
            message: format!("No response from daemon after {}s", CLIENT_TIMEOUT_SECS),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::net::UnixListener;

    #[test]
    fn test_default_socket_path_shape() {
        let path = default_socket_path();
        let s = path.to_string_lossy();
        if std::env::var("XDG_RUNTIME_DIR").is_ok() {
            assert!(s.ends_with("speak-anywhere.sock"));
        } else {
            assert_eq!(s, "/tmp/speak-anywhere.sock");
        }
    }

    #[tokio::test]
    async fn test_send_command_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let listener = UnixListener::bind(&socket_path).unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);

            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            assert_eq!(
                Request::from_json(line.trim()).unwrap(),
                Request::Status
            );

            let reply = Response::state("idle", None).to_json().unwrap();
            writer
                .write_all(format!("{}\n", reply).as_bytes())
                .await
                .unwrap();
        });

        let response = send_command(&socket_path, Request::Status).await.unwrap();
        assert_eq!(response, Response::state("idle", None));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_command_connection_refused() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("missing.sock");

        let result = send_command(&socket_path, Request::Status).await;
        assert!(matches!(result, Err(SpeakError::IpcConnection { .. })));
    }

    #[tokio::test]
    async fn test_send_command_daemon_hangs_up() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let listener = UnixListener::bind(&socket_path).unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream); // close without responding
        });

        let result = send_command(&socket_path, Request::Status).await;
        assert!(matches!(result, Err(SpeakError::IpcConnection { .. })));

        server.await.unwrap();
    }
}
