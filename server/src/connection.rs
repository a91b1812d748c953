//! Per-player connection handler
//!
//! Each accepted socket runs one handler task with two halves:
//! - the reader decodes `input` frames and forwards them to the server loop
//! - the writer sends the welcome frame, then every snapshot published on the
//!   watch channel until the round ends
//!
//! Whichever half fails first ends the connection. A failure before the round
//! is over is reported as [`ServerMessage::Disconnected`], which the server
//! loop turns into a forfeit.

use crate::error::{ConnectionError, ValidationError};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use snake_shared::{Direction, FrameCodec, Packet, Snapshot};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{FramedRead, FramedWrite};

/// Messages sent from connection tasks to the server loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Input { player_id: u32, direction: Direction },
    Disconnected { player_id: u32, reason: String },
}

/// Handler for one seated player's socket
pub struct Connection {
    pub player_id: u32,
    pub peer: SocketAddr,
    pub write_timeout: Duration,
}

impl Connection {
    pub fn new(player_id: u32, peer: SocketAddr, write_timeout: Duration) -> Self {
        Self {
            player_id,
            peer,
            write_timeout,
        }
    }

    /// Drives the connection until the socket fails, the round ends or the
    /// snapshot publisher goes away
    pub async fn run<R, W>(
        self,
        reader: R,
        writer: W,
        welcome: Packet,
        events: mpsc::UnboundedSender<ServerMessage>,
        snapshots: watch::Receiver<Arc<Snapshot>>,
    ) where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let player_id = self.player_id;
        let inbound = FramedRead::new(reader, FrameCodec::new());
        let outbound = FramedWrite::new(writer, FrameCodec::new());

        let result = tokio::select! {
            result = read_loop(player_id, inbound, &events) => result,
            result = write_loop(outbound, welcome, snapshots, self.write_timeout) => result,
        };

        match result {
            Ok(()) => info!("Connection to player {} at {} closed", player_id, self.peer),
            Err(e) => {
                warn!("Player {} at {} dropped: {}", player_id, self.peer, e);
                let _ = events.send(ServerMessage::Disconnected {
                    player_id,
                    reason: e.to_string(),
                });
            }
        }
    }
}

async fn read_loop<R>(
    player_id: u32,
    mut frames: FramedRead<R, FrameCodec>,
    events: &mpsc::UnboundedSender<ServerMessage>,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin,
{
    while let Some(frame) = frames.next().await {
        match frame? {
            Ok(Packet::Input { direction }) => {
                debug!("Player {} requested {}", player_id, direction);
                if events
                    .send(ServerMessage::Input {
                        player_id,
                        direction,
                    })
                    .is_err()
                {
                    // Server loop is gone, nothing left to feed
                    return Ok(());
                }
            }
            Ok(other) => warn!(
                "Dropping frame from player {}: {}",
                player_id,
                ValidationError::UnexpectedPacket(other.kind())
            ),
            Err(e) => warn!("Dropping frame from player {}: {}", player_id, e),
        }
    }

    Err(ConnectionError::Closed)
}

async fn write_loop<W>(
    mut frames: FramedWrite<W, FrameCodec>,
    welcome: Packet,
    mut snapshots: watch::Receiver<Arc<Snapshot>>,
    write_timeout: Duration,
) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    with_timeout(write_timeout, frames.send(&welcome)).await?;

    loop {
        let snapshot = Arc::clone(&snapshots.borrow_and_update());
        with_timeout(write_timeout, frames.send(&*snapshot)).await?;

        if snapshot.status.is_ended() {
            let _ = frames.get_mut().shutdown().await;
            return Ok(());
        }

        if snapshots.changed().await.is_err() {
            // Publisher dropped: server is shutting down
            return Ok(());
        }
    }
}

/// Bounds one frame write, flush included
async fn with_timeout<F>(write_timeout: Duration, write: F) -> Result<(), ConnectionError>
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match tokio::time::timeout(write_timeout, write).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameState;
    use crate::snake::MoveOutcome;
    use snake_shared::config::SpawnConfig;
    use snake_shared::{decode_frame, Cell, GameConfig, RoundStatus, MAX_FRAME_LEN};
    use std::io;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn snapshot(tick: u64, status: RoundStatus) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            tick,
            snakes: vec![],
            food: Some(Cell::new(1, 1)),
            status,
        })
    }

    fn welcome(player_id: u32) -> Packet {
        Packet::Welcome {
            player_id,
            config: GameConfig::default(),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn test_forwards_input_and_reports_read_failure() {
        let reader = tokio_test::io::Builder::new()
            .read(b"{\"kind\":\"input\",\"direction\":\"up\"}\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (_snapshot_tx, snapshot_rx) = watch::channel(snapshot(0, RoundStatus::Running));

        Connection::new(0, peer(), Duration::from_secs(1))
            .run(reader, tokio::io::sink(), welcome(0), events_tx, snapshot_rx)
            .await;

        let messages = drain(&mut events_rx);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            ServerMessage::Input {
                player_id: 0,
                direction: Direction::Up
            }
        );
        assert!(matches!(
            messages[1],
            ServerMessage::Disconnected { player_id: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_read_failure_mid_round_forfeits_only_that_player() {
        let config = GameConfig {
            players: 2,
            width: 10,
            height: 10,
            snakes: vec![
                SpawnConfig {
                    row: 1,
                    col: 1,
                    heading: Some(Direction::Right),
                    color: None,
                },
                SpawnConfig {
                    row: 8,
                    col: 8,
                    heading: Some(Direction::Left),
                    color: None,
                },
            ],
            food: Some(Cell::new(5, 5)),
            seed: Some(5),
            ..GameConfig::default()
        };
        let mut game = GameState::new(config);
        game.add_player(0);
        game.add_player(1);
        game.start_round();
        game.advance().unwrap();

        let reader = tokio_test::io::Builder::new()
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (_snapshot_tx, snapshot_rx) = watch::channel(Arc::new(game.snapshot()));

        Connection::new(1, peer(), Duration::from_secs(1))
            .run(reader, tokio::io::sink(), welcome(1), events_tx, snapshot_rx)
            .await;

        for message in drain(&mut events_rx) {
            if let ServerMessage::Disconnected { player_id, .. } = message {
                game.forfeit(player_id).unwrap();
            }
        }

        let report = game.advance().unwrap();
        assert_eq!(report.forfeited, vec![1]);
        assert!(!game.snake(1).unwrap().is_alive());
        assert_eq!(report.outcomes[&0], MoveOutcome::Moved);
        assert_eq!(game.snake(0).unwrap().head(), Cell::new(1, 3));
    }

    #[tokio::test]
    async fn test_sends_welcome_then_snapshots_until_round_end() {
        let (server_side, client_side) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_side);
        let (client_read, _client_write) = tokio::io::split(client_side);

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot(0, RoundStatus::WaitingForPlayers));

        let handler = tokio::spawn(
            Connection::new(2, peer(), Duration::from_secs(1)).run(
                server_read,
                server_write,
                welcome(2),
                events_tx,
                snapshot_rx,
            ),
        );

        let mut lines = BufReader::new(client_read).lines();
        let first = lines.next_line().await.unwrap().unwrap();
        assert_eq!(decode_frame(&first).unwrap(), welcome(2));

        let second = lines.next_line().await.unwrap().unwrap();
        match decode_frame(&second).unwrap() {
            Packet::State(s) => assert_eq!(s.status, RoundStatus::WaitingForPlayers),
            other => panic!("Unexpected packet: {:?}", other),
        }

        snapshot_tx.send_replace(snapshot(1, RoundStatus::Running));
        let third = lines.next_line().await.unwrap().unwrap();
        match decode_frame(&third).unwrap() {
            Packet::State(s) => assert_eq!(s.tick, 1),
            other => panic!("Unexpected packet: {:?}", other),
        }

        snapshot_tx.send_replace(snapshot(2, RoundStatus::Ended { winner: Some(2) }));
        let last = lines.next_line().await.unwrap().unwrap();
        match decode_frame(&last).unwrap() {
            Packet::State(s) => assert_eq!(s.status, RoundStatus::Ended { winner: Some(2) }),
            other => panic!("Unexpected packet: {:?}", other),
        }

        handler.await.unwrap();
        assert!(drain(&mut events_rx).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_frames_do_not_disconnect() {
        let reader = tokio_test::io::Builder::new()
            .read(b"garbage\n")
            .read(b"{\"kind\":\"input\",\"direction\":\"north\"}\n")
            .read(b"{\"kind\":\"state\",\"tick\":1,\"snakes\":[],\"food\":null,\"status\":\"running\"}\n")
            .read(b"\n")
            .read(b"\xc3\x28 not utf-8\n")
            .read(b"{\"kind\":\"input\",\"direction\":\"left\"}\n")
            .build();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (_snapshot_tx, snapshot_rx) = watch::channel(snapshot(0, RoundStatus::Running));

        Connection::new(0, peer(), Duration::from_secs(1))
            .run(reader, tokio::io::sink(), welcome(0), events_tx, snapshot_rx)
            .await;

        let messages = drain(&mut events_rx);
        assert_eq!(
            messages[0],
            ServerMessage::Input {
                player_id: 0,
                direction: Direction::Left
            }
        );
        // Clean EOF after the last frame
        assert!(matches!(
            messages[1],
            ServerMessage::Disconnected { player_id: 0, .. }
        ));
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_skipped() {
        let mut oversized = vec![b'x'; MAX_FRAME_LEN + 10];
        oversized.push(b'\n');
        let reader = tokio_test::io::Builder::new()
            .read(&oversized)
            .read(b"{\"kind\":\"input\",\"direction\":\"down\"}\n")
            .build();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (_snapshot_tx, snapshot_rx) = watch::channel(snapshot(0, RoundStatus::Running));

        Connection::new(0, peer(), Duration::from_secs(1))
            .run(reader, tokio::io::sink(), welcome(0), events_tx, snapshot_rx)
            .await;

        let messages = drain(&mut events_rx);
        assert_eq!(
            messages[0],
            ServerMessage::Input {
                player_id: 0,
                direction: Direction::Down
            }
        );
    }

    #[tokio::test]
    async fn test_stalled_client_times_out() {
        // The client never reads, so the tiny pipe fills during the welcome
        let (server_side, _client_side) = duplex(16);
        let (server_read, server_write) = tokio::io::split(server_side);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (_snapshot_tx, snapshot_rx) = watch::channel(snapshot(0, RoundStatus::Running));

        Connection::new(3, peer(), Duration::from_millis(50))
            .run(server_read, server_write, welcome(3), events_tx, snapshot_rx)
            .await;

        match events_rx.try_recv().unwrap() {
            ServerMessage::Disconnected { player_id, reason } => {
                assert_eq!(player_id, 3);
                assert_eq!(reason, ConnectionError::WriteTimeout.to_string());
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publisher_drop_ends_connection() {
        let (server_side, _client_side) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_side);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot(0, RoundStatus::Running));

        let handler = tokio::spawn(
            Connection::new(0, peer(), Duration::from_secs(1)).run(
                server_read,
                server_write,
                welcome(0),
                events_tx,
                snapshot_rx,
            ),
        );
        drop(snapshot_tx);

        handler.await.unwrap();
        assert!(drain(&mut events_rx).is_empty());
    }
}
