use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixSocket, UnixStream};

use crate::common::{ChannelError, ChannelPhase, ChannelResult, SetupError, SetupResult};
use crate::domains::coupling::{
    ChannelIdentity, ControllerLink, RawPayload, ACKNOWLEDGEMENT, MAX_PAYLOAD_BYTES,
};

const LISTEN_BACKLOG: u32 = 5;

/// Socket paths held by live channels in this process.
static CLAIMED_PATHS: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Exclusive claim on a socket path. Dropping it removes the socket file and frees the claim.
///
/// Claims are keyed by the canonical directory, so `dir/sub/..` and `dir` name the same socket.
#[derive(Debug)]
struct SocketPathGuard {
    path: PathBuf,
    key: PathBuf,
}

impl SocketPathGuard {
    fn claim(identity: ChannelIdentity, directory: &Path) -> SetupResult<Self> {
        let path = identity.checked_socket_path(directory)?;
        let key = std::fs::canonicalize(directory)
            .map_err(|source| SetupError::Io {
                phase: ChannelPhase::Bind,
                path: path.clone(),
                source,
            })?
            .join(identity.file_name());

        let mut claimed = CLAIMED_PATHS.lock().unwrap_or_else(|e| e.into_inner());
        if !claimed.insert(key.clone()) {
            return Err(SetupError::PathInUse { path });
        }
        Ok(Self { path, key })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketPathGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), "Failed to remove socket file: {}", e);
            }
        }
        let mut claimed = CLAIMED_PATHS.lock().unwrap_or_else(|e| e.into_inner());
        claimed.remove(&self.key);
    }
}

#[derive(Debug, Clone)]
pub struct CouplingSettings {
    pub directory: PathBuf,
    /// Upper bound on each wait for the controller; `None` waits forever.
    pub response_timeout: Option<Duration>,
}

impl Default for CouplingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            response_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Listening,
    Connected,
    Closed,
}

/// A bound, listening socket that has not accepted its controller yet.
pub struct ChannelListener {
    listener: UnixListener,
    guard: SocketPathGuard,
    response_timeout: Option<Duration>,
}

impl ChannelListener {
    /// Derives the socket path, replaces any stale socket file, binds and listens.
    ///
    /// Fails fast if another channel of this process already holds the path,
    /// however its directory is spelled. Must run inside a tokio runtime.
    pub fn bind(identity: ChannelIdentity, settings: &CouplingSettings) -> SetupResult<Self> {
        let guard = SocketPathGuard::claim(identity, &settings.directory)?;
        let io_error = |phase, source| SetupError::Io {
            phase,
            path: guard.path().to_path_buf(),
            source,
        };

        match std::fs::remove_file(guard.path()) {
            Ok(()) => tracing::info!(path = %guard.path().display(), "Removed stale socket file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(ChannelPhase::Bind, e)),
        }

        let socket = UnixSocket::new_stream().map_err(|e| io_error(ChannelPhase::Create, e))?;
        socket
            .bind(guard.path())
            .map_err(|e| io_error(ChannelPhase::Bind, e))?;
        let listener = socket
            .listen(LISTEN_BACKLOG)
            .map_err(|e| io_error(ChannelPhase::Listen, e))?;

        tracing::info!(path = %guard.path().display(), "Coupling socket listening");
        Ok(Self {
            listener,
            guard,
            response_timeout: settings.response_timeout,
        })
    }

    pub fn path(&self) -> &Path {
        self.guard.path()
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::Listening
    }

    /// Waits for the one controller this run will ever talk to.
    /// The listener is closed afterwards, so no second peer is accepted.
    pub async fn accept(self) -> SetupResult<CouplingChannel> {
        let (stream, _) = self.listener.accept().await.map_err(|source| SetupError::Io {
            phase: ChannelPhase::Accept,
            path: self.guard.path().to_path_buf(),
            source,
        })?;

        tracing::info!(path = %self.guard.path().display(), "Controller connected");
        Ok(CouplingChannel {
            stream: Some(stream),
            guard: self.guard,
            response_timeout: self.response_timeout,
            exchanges: 0,
        })
    }
}

/// Connection to the external controller, owned by the leader for the whole run.
///
/// There is no reconnection: once the controller disconnects or asks to
/// terminate, the channel stays closed.
pub struct CouplingChannel {
    stream: Option<UnixStream>,
    guard: SocketPathGuard,
    response_timeout: Option<Duration>,
    exchanges: u64,
}

impl CouplingChannel {
    /// Bind, listen and block until the controller connects.
    pub async fn open(identity: ChannelIdentity, settings: &CouplingSettings) -> SetupResult<Self> {
        ChannelListener::bind(identity, settings)?.accept().await
    }

    pub fn path(&self) -> &Path {
        self.guard.path()
    }

    pub fn state(&self) -> ChannelState {
        if self.stream.is_some() {
            ChannelState::Connected
        } else {
            ChannelState::Closed
        }
    }

    /// Number of completed request/response rounds.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Reads one message, then answers with the fixed acknowledgement.
    ///
    /// A zero-byte read, the termination keyword, a timeout or any I/O error
    /// closes the channel; later calls return [`ChannelError::Closed`].
    pub async fn exchange(&mut self) -> ChannelResult<RawPayload> {
        let path = self.guard.path().to_path_buf();
        let outcome = match self.stream.as_mut() {
            Some(stream) => round_trip(stream, &path, self.response_timeout).await,
            None => return Err(ChannelError::Closed { path }),
        };

        match outcome {
            Ok(payload) if payload.is_termination() => {
                tracing::info!(path = %path.display(), "Controller requested termination");
                self.close();
                Err(ChannelError::TerminationRequested { path })
            }
            Ok(payload) => {
                self.exchanges += 1;
                Ok(payload)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Closing coupling channel: {}", e);
                self.close();
                Err(e)
            }
        }
    }

    /// Shuts the connection down. The socket file stays until the channel is dropped.
    pub fn close(&mut self) {
        self.stream = None;
    }
}

async fn round_trip(
    stream: &mut UnixStream,
    path: &Path,
    response_timeout: Option<Duration>,
) -> ChannelResult<RawPayload> {
    let mut buf = [0u8; MAX_PAYLOAD_BYTES];
    let read = match response_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.read(&mut buf))
            .await
            .map_err(|_| ChannelError::Timeout {
                path: path.to_path_buf(),
                after: limit,
            })?,
        None => stream.read(&mut buf).await,
    };
    let received = read.map_err(|source| ChannelError::Io {
        phase: ChannelPhase::Read,
        path: path.to_path_buf(),
        source,
    })?;
    if received == 0 {
        return Err(ChannelError::PeerClosed { path: path.to_path_buf() });
    }

    let payload = RawPayload::from_received(&buf[..received]);
    tracing::debug!(path = %path.display(), bytes = received, "From controller: {}", payload.text());

    stream
        .write_all(&ACKNOWLEDGEMENT)
        .await
        .map_err(|source| ChannelError::Io {
            phase: ChannelPhase::Write,
            path: path.to_path_buf(),
            source,
        })?;

    Ok(payload)
}

#[async_trait]
impl ControllerLink for CouplingChannel {
    async fn exchange(&mut self) -> ChannelResult<RawPayload> {
        CouplingChannel::exchange(self).await
    }

    fn endpoint(&self) -> String {
        self.path().display().to_string()
    }
}
