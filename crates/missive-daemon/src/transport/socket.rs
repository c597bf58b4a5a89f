//! Unix-socket transport: newline-delimited JSON frames.
//!
//! One frame is one JSON document. A connection carries any number of
//! sequential request rounds: the client writes a signed message frame,
//! the server streams back event frames and the terminal frame closes the
//! round. Connections are independent; the server handles any number of
//! them concurrently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use missive_core::protocol::{Event, EventStream, Transport, TransportError};
use missive_core::Message;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use super::{MAX_FRAME_LENGTH, TRANSPORT_ERROR_STATUS};
use crate::server::Server;

/// Socket server binding a [`Server`] to a Unix socket path.
pub struct SocketServer {
    listener: UnixListener,
    server: Arc<Server>,
    path: PathBuf,
}

impl SocketServer {
    /// Binds to the socket path, replacing a stale socket file.
    ///
    /// The parent directory is created if missing. Binding fails if a
    /// live process still owns the path; removal only targets the dead
    /// remains of a previous run.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or socket cannot be set up.
    pub fn bind(path: impl AsRef<Path>, server: Arc<Server>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if path.exists() {
            debug!(path = %path.display(), "removing stale socket file");
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        info!(path = %path.display(), "socket transport listening");
        Ok(Self {
            listener,
            server,
            path,
        })
    }

    /// The bound socket path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepts connections until the listener fails, one task per
    /// connection.
    pub async fn serve(self) -> std::io::Result<()> {
        loop {
            let (stream, _addr) = self.listener.accept().await?;
            let server = Arc::clone(&self.server);
            tokio::spawn(async move {
                handle_connection(stream, server).await;
            });
        }
    }
}

/// Runs request rounds on one connection until it closes.
async fn handle_connection(stream: UnixStream, server: Arc<Server>) {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LENGTH));

    while let Some(frame) = framed.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "dropping connection on framing error");
                return;
            }
        };
        let message: Message = match serde_json::from_str(&frame) {
            Ok(message) => message,
            Err(err) => {
                debug!(%err, "undecodable request frame");
                let rejected = Event::Error {
                    message: "malformed message".to_string(),
                    status_code: 400,
                };
                if send_event(&mut framed, &rejected).await.is_err() {
                    return;
                }
                continue;
            }
        };

        let mut events = server.handle(message);
        while let Some(event) = events.recv().await {
            let terminal = event.is_terminal();
            if send_event(&mut framed, &event).await.is_err() {
                return;
            }
            if terminal {
                break;
            }
        }
    }
}

async fn send_event(
    framed: &mut Framed<UnixStream, LinesCodec>,
    event: &Event,
) -> Result<(), TransportError> {
    let frame = serde_json::to_string(event)?;
    framed.send(frame).await.map_err(codec_error)
}

/// Client side: connects per command and streams the response frames.
pub struct SocketTransport {
    path: PathBuf,
}

impl SocketTransport {
    /// Creates a transport targeting a socket path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Transport for SocketTransport {
    async fn send(&self, message: &Message) -> Result<EventStream, TransportError> {
        let stream = UnixStream::connect(&self.path).await?;
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LENGTH));
        framed
            .send(serde_json::to_string(message)?)
            .await
            .map_err(codec_error)?;

        // Yield frames until the terminal event; dropping the stream drops
        // the connection with it.
        let events = futures::stream::unfold(Some(framed), |state| async move {
            let mut framed = state?;
            match framed.next().await {
                None => None,
                Some(Ok(frame)) => match serde_json::from_str::<Event>(&frame) {
                    Ok(event) => {
                        let next = if event.is_terminal() { None } else { Some(framed) };
                        Some((event, next))
                    }
                    Err(err) => Some((
                        Event::Error {
                            message: format!("undecodable event frame: {err}"),
                            status_code: TRANSPORT_ERROR_STATUS,
                        },
                        None,
                    )),
                },
                Some(Err(err)) => Some((
                    Event::Error {
                        message: format!("connection failed: {err}"),
                        status_code: TRANSPORT_ERROR_STATUS,
                    },
                    None,
                )),
            }
        });
        Ok(events.boxed())
    }
}

fn codec_error(err: LinesCodecError) -> TransportError {
    match err {
        LinesCodecError::Io(io) => TransportError::Io(io),
        LinesCodecError::MaxLineLengthExceeded => TransportError::Connection {
            reason: "frame exceeds maximum length".to_string(),
        },
    }
}
