//! Client side of the wire protocol
//!
//! The client keeps no game logic: it forwards requested directions and
//! exposes the most recent snapshot the server sent.

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use snake_shared::{Direction, FrameCodec, GameConfig, Packet, ProtocolError, RoundStatus, Snapshot};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("server refused the connection: {0}")]
    Rejected(String),

    #[error("server closed the connection during the handshake")]
    HandshakeClosed,

    #[error("expected a welcome frame, got {0}")]
    UnexpectedPacket(&'static str),

    #[error("not connected to the server")]
    Disconnected,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Connection to a game server
pub struct GameClient {
    player_id: u32,
    config: GameConfig,
    input_tx: mpsc::UnboundedSender<Direction>,
    snapshots: watch::Receiver<Option<Arc<Snapshot>>>,
    connected: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl GameClient {
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        info!("Connecting to {}", addr);
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        Self::handshake(reader, writer).await
    }

    /// Waits for the welcome frame, then starts the reader and writer tasks
    pub async fn handshake<R, W>(reader: R, writer: W) -> Result<Self, ClientError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut frames = FramedRead::new(reader, FrameCodec::new());

        let frame = frames.next().await.ok_or(ClientError::HandshakeClosed)??;
        let (player_id, config) = match frame? {
            Packet::Welcome { player_id, config } => (player_id, config),
            Packet::Rejected { reason } => return Err(ClientError::Rejected(reason)),
            other => return Err(ClientError::UnexpectedPacket(other.kind())),
        };
        info!(
            "Joined as player {} on a {}x{} grid",
            player_id, config.width, config.height
        );

        let connected = Arc::new(AtomicBool::new(true));
        let (snapshot_tx, snapshots) = watch::channel(None);
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        let tasks = vec![
            tokio::spawn(read_loop(frames, snapshot_tx, Arc::clone(&connected))),
            tokio::spawn(write_loop(
                FramedWrite::new(writer, FrameCodec::new()),
                input_rx,
                Arc::clone(&connected),
            )),
        ];

        Ok(GameClient {
            player_id,
            config,
            input_tx,
            snapshots,
            connected,
            tasks,
        })
    }

    /// Slot assigned by the server in the welcome frame
    pub fn player_id(&self) -> u32 {
        self.player_id
    }

    /// Game settings the server is running with
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Queues a heading request for the server
    pub fn send_direction(&self, direction: Direction) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::Disconnected);
        }
        self.input_tx
            .send(direction)
            .map_err(|_| ClientError::Disconnected)
    }

    /// Most recent snapshot received, if any
    pub fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every snapshot
    pub fn snapshots(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.snapshots.clone()
    }

    /// False once either socket half has failed or the server closed
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn read_loop<R>(
    mut frames: FramedRead<R, FrameCodec>,
    snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
    connected: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match frames.next().await {
            Some(Ok(frame)) => frame,
            None => {
                info!("Server closed the connection");
                break;
            }
            Some(Err(e)) => {
                warn!("Error reading from server: {}", e);
                break;
            }
        };

        match frame {
            Ok(Packet::State(snapshot)) => {
                debug!("Snapshot for tick {}", snapshot.tick);
                if let RoundStatus::Ended { winner } = snapshot.status {
                    info!("Round ended, winner: {:?}", winner);
                }
                snapshot_tx.send_replace(Some(Arc::new(snapshot)));
            }
            Ok(other) => warn!("Ignoring unexpected {} frame", other.kind()),
            Err(e) => warn!("Ignoring frame: {}", e),
        }
    }

    connected.store(false, Ordering::Relaxed);
}

async fn write_loop<W>(
    mut frames: FramedWrite<W, FrameCodec>,
    mut input_rx: mpsc::UnboundedReceiver<Direction>,
    connected: Arc<AtomicBool>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(direction) = input_rx.recv().await {
        let packet = Packet::Input { direction };
        if let Err(e) = frames.send(&packet).await {
            warn!("Error sending input: {}", e);
            connected.store(false, Ordering::Relaxed);
            break;
        }
    }
}
