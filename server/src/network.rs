//! Server loop: accepts players, owns the game state and drives the tick timer

use crate::client_manager::ClientManager;
use crate::connection::{Connection, ServerMessage};
use crate::error::{CapacityError, Result, ServerError};
use crate::game::{GameState, TickReport};
use futures_util::SinkExt;
use log::{debug, error, info, warn};
use snake_shared::{FrameCodec, GameConfig, Packet, RoundStatus, Snapshot};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::codec::FramedWrite;

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Outcome of a finished round
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub ticks: u64,
    /// `None` for a draw
    pub winner: Option<u32>,
    pub final_snapshot: Snapshot,
}

/// Authoritative game server for a single round
pub struct Server {
    listener: TcpListener,
    config: GameConfig,
    clients: ClientManager,
    game_state: GameState,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,

    handles: Vec<JoinHandle<()>>,
    write_timeout: Duration,
    shutdown_grace: Duration,
}

impl Server {
    pub async fn bind(addr: &str, config: GameConfig) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!(
            "Server listening on {}, waiting for {} players",
            listener.local_addr()?,
            config.players
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let game_state = GameState::new(config.clone());
        let (snapshot_tx, _) = watch::channel(Arc::new(game_state.snapshot()));

        Ok(Server {
            listener,
            clients: ClientManager::new(config.players),
            config,
            game_state,
            server_tx,
            server_rx,
            snapshot_tx,
            handles: Vec::new(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        })
    }

    /// Sets how long a single frame write may take before the player forfeits
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Sets how long handlers get to flush the final snapshot
    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Receiver of every snapshot the server publishes
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Runs the round to completion
    pub async fn run(mut self) -> Result<RoundSummary> {
        let mut tick_interval = interval(self.config.tick_period());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let running = self.game_state.status() == RoundStatus::Running;

            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if self.handle_accept(stream, addr) {
                                tick_interval.reset();
                            }
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                // Always Some: the loop holds a sender
                Some(message) = self.server_rx.recv() => {
                    self.handle_message(message);
                },

                _ = tick_interval.tick(), if running => {
                    if let Some(report) = self.game_state.advance() {
                        self.log_tick(&report);
                        self.publish();
                    }
                },
            }

            if self.game_state.status().is_ended() {
                break;
            }
        }

        Ok(self.finish().await)
    }

    /// Seats a new player or refuses the connection
    ///
    /// Returns true when this arrival started the round.
    fn handle_accept(&mut self, stream: TcpStream, addr: SocketAddr) -> bool {
        let capacity = match self.game_state.status() {
            RoundStatus::WaitingForPlayers => self.clients.add_client(addr),
            RoundStatus::Running => Err(CapacityError::RoundInProgress),
            RoundStatus::Ended { .. } => Err(CapacityError::RoundEnded),
        };

        let player_id = match capacity {
            Ok(player_id) => player_id,
            Err(e) => {
                info!("Refusing connection from {}: {}", addr, e);
                self.reject(stream, e);
                return false;
            }
        };

        self.game_state.add_player(player_id);
        self.spawn_connection(stream, addr, player_id);
        info!(
            "Player {} joined ({}/{})",
            player_id,
            self.clients.len(),
            self.clients.required()
        );

        let started = self.clients.is_full();
        if started {
            self.game_state.start_round();
        }
        self.publish();
        started
    }

    fn spawn_connection(&mut self, stream: TcpStream, addr: SocketAddr, player_id: u32) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }
        let (reader, writer) = stream.into_split();

        let welcome = Packet::Welcome {
            player_id,
            config: self.config.clone(),
        };
        let connection = Connection::new(player_id, addr, self.write_timeout);
        let events = self.server_tx.clone();
        let snapshots = self.snapshot_tx.subscribe();

        self.handles.retain(|handle| !handle.is_finished());
        self.handles.push(tokio::spawn(connection.run(
            reader, writer, welcome, events, snapshots,
        )));
    }

    /// Sends a `rejected` frame and closes, off the server loop
    fn reject(&self, stream: TcpStream, reason: CapacityError) {
        let write_timeout = self.write_timeout;

        tokio::spawn(async move {
            let packet = Packet::Rejected {
                reason: reason.to_string(),
            };
            let mut frames = FramedWrite::new(stream, FrameCodec::new());

            let write = async {
                frames.send(&packet).await?;
                frames.get_mut().shutdown().await
            };
            match tokio::time::timeout(write_timeout, write).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Failed to deliver rejection: {}", e),
                Err(_) => debug!("Timed out delivering rejection"),
            }
        });
    }

    /// Processes events reported by connection handlers
    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Input {
                player_id,
                direction,
            } => {
                if let Err(e) = self.game_state.stage_heading(player_id, direction) {
                    warn!("Dropped input from player {}: {}", player_id, e);
                }
            }

            ServerMessage::Disconnected { player_id, reason } => match self.game_state.status() {
                RoundStatus::WaitingForPlayers => {
                    info!("Player {} left before the round started: {}", player_id, reason);
                    self.clients.remove_client(&player_id);
                    self.game_state.remove_player(player_id);
                    if self.clients.is_empty() {
                        info!("Roster is empty, waiting for players");
                    }
                    self.publish();
                }
                RoundStatus::Running => {
                    if self.clients.mark_disconnected(player_id) {
                        warn!(
                            "Player {} forfeits at tick {}: {}",
                            player_id,
                            self.game_state.tick(),
                            reason
                        );
                        if let Err(e) = self.game_state.forfeit(player_id) {
                            warn!("Could not forfeit player {}: {}", player_id, e);
                        }
                    }
                }
                RoundStatus::Ended { .. } => {
                    debug!("Player {} closed after the round: {}", player_id, reason);
                }
            },
        }
    }

    fn log_tick(&self, report: &TickReport) {
        for player_id in report.eaters() {
            debug!(
                "Tick {}: player {} ate, food now at {:?}",
                report.tick,
                player_id,
                self.game_state.food()
            );
        }
    }

    /// Replaces the latest snapshot; never waits on handlers
    fn publish(&self) {
        self.snapshot_tx
            .send_replace(Arc::new(self.game_state.snapshot()));
    }

    /// Lets handlers flush the final snapshot, then aborts stragglers
    async fn finish(mut self) -> RoundSummary {
        let final_snapshot = self.game_state.snapshot();
        self.snapshot_tx.send_replace(Arc::new(final_snapshot.clone()));

        let winner = match final_snapshot.status {
            RoundStatus::Ended { winner } => winner,
            _ => None,
        };
        match winner {
            Some(player_id) => info!(
                "Round ended after {} ticks, player {} wins",
                final_snapshot.tick, player_id
            ),
            None => info!("Round ended after {} ticks in a draw", final_snapshot.tick),
        }

        let deadline = Instant::now() + self.shutdown_grace;
        for mut handle in self.handles.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, &mut handle).await.is_err() {
                warn!("Aborting connection that did not close in time");
                handle.abort();
            }
        }

        RoundSummary {
            ticks: final_snapshot.tick,
            winner,
            final_snapshot,
        }
    }
}
