//! Player roster for the current round
//!
//! Tracks which player slots are taken and whether their sockets are still
//! open. Slots are numbered `0..required`; a new connection takes the lowest
//! free slot, so a player who drops out before the round starts frees their
//! slot for the next arrival.

use crate::error::CapacityError;
use log::info;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;

/// A player connection as seen by the server loop
#[derive(Debug)]
pub struct Client {
    pub id: u32,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Cleared once the connection handler reports the socket gone
    pub connected: bool,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            connected: true,
        }
    }
}

/// Slot allocation for the players of one round
///
/// Owned by the server loop; connection tasks never touch it directly.
pub struct ClientManager {
    clients: BTreeMap<u32, Client>,
    /// Players needed before the round starts; also the hard cap
    required: u32,
}

impl ClientManager {
    /// Creates an empty roster for `required` players
    pub fn new(required: u32) -> Self {
        Self {
            clients: BTreeMap::new(),
            required,
        }
    }

    /// Assigns the lowest free slot to a new connection
    pub fn add_client(&mut self, addr: SocketAddr) -> Result<u32, CapacityError> {
        let client_id = (0..self.required)
            .find(|id| !self.clients.contains_key(id))
            .ok_or(CapacityError::Full {
                required: self.required,
            })?;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));
        Ok(client_id)
    }

    /// Frees a slot entirely; only meaningful before the round starts
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} removed from {}", client.id, client.addr);
            true
        } else {
            false
        }
    }

    /// Records that a client's socket closed
    ///
    /// Returns true only the first time, so a forfeit is issued once.
    pub fn mark_disconnected(&mut self, client_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) if client.connected => {
                client.connected = false;
                info!(
                    "Client {} disconnected after {:?}",
                    client_id,
                    client.connected_at.elapsed()
                );
                true
            }
            _ => false,
        }
    }

    /// Returns true once every slot is taken
    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.required as usize
    }

    /// Returns the number of players the round needs
    pub fn required(&self) -> u32 {
        self.required
    }

    /// Returns the number of players holding a slot
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true when no slot is taken
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
