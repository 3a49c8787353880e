use std::collections::HashMap;
use std::net::SocketAddr;

use crate::world::EntityId;

#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub addr: SocketAddr,
    pub player_id: EntityId,
}

impl ClientConnection {
    pub fn new(addr: SocketAddr, player_id: EntityId) -> Self {
        Self { addr, player_id }
    }
}

/// Host-side table of joined clients, keyed by their datagram endpoint.
#[derive(Debug)]
pub struct ConnectionManager {
    clients: HashMap<SocketAddr, ClientConnection>,
    max_clients: usize,
}

impl ConnectionManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Returns `false` if the table is full or `addr` already joined.
    pub fn add(&mut self, addr: SocketAddr, player_id: EntityId) -> bool {
        if self.clients.contains_key(&addr) || self.is_full() {
            return false;
        }
        self.clients
            .insert(addr, ClientConnection::new(addr, player_id));
        true
    }

    pub fn player_for(&self, addr: &SocketAddr) -> Option<&EntityId> {
        self.clients.get(addr).map(|c| &c.player_id)
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.clients.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clear(&mut self) {
        self.clients.clear();
    }
}
