//! Control socket between the CLI and the daemon
//!
//! Length-prefixed JSON over a Unix domain socket: a u32 little-endian byte
//! count followed by the serialized message. One request, one response.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use tracing::debug;

mod messages;
pub use messages::{ControlRequest, ControlResponse};

use crate::constants::ipc::{MAX_MESSAGE_SIZE, SOCKET_PATH};

/// Get default socket path (XDG_RUNTIME_DIR with fallback to cache)
pub fn default_socket_path() -> Result<PathBuf> {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(runtime_dir).join(SOCKET_PATH));
    }

    let cache = dirs::cache_dir()
        .context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(SOCKET_PATH))
}

/// CLI side of the control socket
pub struct ControlClient {
    stream: UnixStream,
}

impl ControlClient {
    pub fn connect() -> Result<Self> {
        let path = default_socket_path()?;
        Self::connect_to(&path)
    }

    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .with_context(|| format!("Failed to connect to daemon at {}", path.display()))?;
        Ok(Self { stream })
    }

    /// Send a request and wait for its response
    pub fn request(&mut self, req: &ControlRequest) -> Result<ControlResponse> {
        write_message(&mut self.stream, req)?;
        read_message(&mut self.stream)
    }
}

/// Daemon side: owns the socket file for its lifetime
pub struct ControlServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl ControlServer {
    pub fn bind() -> Result<Self> {
        Self::bind_to(default_socket_path()?)
    }

    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {}", parent.display()))?;
        }

        if socket_path.exists() {
            // A live daemon answers; a dead one left its socket behind
            if UnixStream::connect(&socket_path).is_ok() {
                return Err(anyhow!("Another glimmr daemon is already listening on {}", socket_path.display()));
            }
            debug!(socket = %socket_path.display(), "Removing stale socket");
            std::fs::remove_file(&socket_path)
                .with_context(|| format!("Failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind socket at {}", socket_path.display()))?;

        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        Ok(Self { listener, socket_path })
    }

    /// Accept incoming connection (blocking)
    pub fn accept(&self) -> Result<ControlConnection> {
        let (stream, _addr) = self.listener.accept().context("Failed to accept IPC connection")?;
        Ok(ControlConnection { stream })
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// One accepted CLI connection
pub struct ControlConnection {
    stream: UnixStream,
}

impl ControlConnection {
    pub fn recv_request(&mut self) -> Result<ControlRequest> {
        read_message(&mut self.stream)
    }

    pub fn send_response(&mut self, resp: &ControlResponse) -> Result<()> {
        write_message(&mut self.stream, resp)
    }
}

/// Write length-prefixed message to stream
fn write_message<W: Write, T: Serialize>(stream: &mut W, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    let len = u32::try_from(json.len()).context("Message too large to frame")?;

    stream
        .write_all(&len.to_le_bytes())
        .context("Failed to write message length")?;
    stream.write_all(&json).context("Failed to write message payload")?;
    stream.flush().context("Failed to flush stream")?;

    Ok(())
}

/// Read length-prefixed message from stream
fn read_message<R: Read, T: for<'de> Deserialize<'de>>(stream: &mut R) -> Result<T> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .context("Failed to read message length")?;
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, MAX_MESSAGE_SIZE));
    }

    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .context("Failed to read message payload")?;

    serde_json::from_slice(&json_buf).context("Failed to deserialize message from JSON")
}
