mod config;
mod dispatch;
mod error;
mod events;

use std::collections::VecDeque;
use std::net::{SocketAddr, SocketAddrV4};

use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::lobby::{LobbyCode, LobbyDirectory, local_ipv4};
use crate::net::{ConnectionManager, Inbound, Message, NetworkStats, Transport};
use crate::simulation::FixedTimestep;
use crate::world::{EntityId, World};

pub use config::SessionConfig;
pub use error::SessionError;
pub use events::SessionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Hosting,
    Joining,
    Connected,
}

/// The replication protocol for one peer.
///
/// Owns the transport and the peer table; the world is passed in on every
/// call so entity state stays on the simulation thread. A session starts
/// idle, becomes a host with [`Session::start_hosting`] or a client with
/// [`Session::join_by_code`], and returns to idle on [`Session::disconnect`].
pub struct Session {
    config: SessionConfig,
    directory: LobbyDirectory,
    rng: StdRng,
    state: SessionState,
    transport: Option<Transport>,
    connections: ConnectionManager,
    host_addr: Option<SocketAddr>,
    lobby_code: Option<LobbyCode>,
    join_code: String,
    local_id: Option<EntityId>,
    broadcast: FixedTimestep,
    pending_events: VecDeque<SessionEvent>,
    last_stats: NetworkStats,
}

impl Session {
    pub fn new(config: SessionConfig, directory: LobbyDirectory) -> Self {
        Self::with_rng(config, directory, StdRng::from_entropy())
    }

    pub fn with_rng(config: SessionConfig, directory: LobbyDirectory, rng: StdRng) -> Self {
        Self {
            connections: ConnectionManager::new(config.max_clients),
            broadcast: FixedTimestep::from_interval(config.broadcast_interval()),
            config,
            directory,
            rng,
            state: SessionState::Idle,
            transport: None,
            host_addr: None,
            lobby_code: None,
            join_code: String::new(),
            local_id: None,
            pending_events: VecDeque::new(),
            last_stats: NetworkStats::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> Option<Role> {
        match self.state {
            SessionState::Idle => None,
            SessionState::Hosting => Some(Role::Host),
            SessionState::Joining | SessionState::Connected => Some(Role::Client),
        }
    }

    pub fn is_host(&self) -> bool {
        self.state == SessionState::Hosting
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Hosting | SessionState::Connected)
    }

    pub fn lobby_code(&self) -> Option<&LobbyCode> {
        self.lobby_code.as_ref()
    }

    /// Identifier of this peer's own player once bound.
    pub fn local_id(&self) -> Option<&EntityId> {
        self.local_id.as_ref()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.as_ref().map(Transport::local_addr)
    }

    pub fn host_addr(&self) -> Option<SocketAddr> {
        self.host_addr
    }

    pub fn client_count(&self) -> usize {
        self.connections.len()
    }

    /// Players in the session as seen from here.
    pub fn player_count(&self) -> usize {
        match self.state {
            SessionState::Hosting => self.connections.len() + 1,
            SessionState::Connected => 2,
            SessionState::Idle | SessionState::Joining => 0,
        }
    }

    pub fn stats(&self) -> NetworkStats {
        self.transport
            .as_ref()
            .map(Transport::stats)
            .unwrap_or(self.last_stats)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.pending_events.drain(..)
    }

    /// Binds the configured port, publishes a lobby code and populates the
    /// world with the host's player and the balls.
    pub fn start_hosting(&mut self, world: &mut World) -> Result<LobbyCode, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyActive);
        }

        let transport = Transport::open(self.config.port)?;
        let port = transport.local_addr().port();
        let ip = self.config.advertise_addr.unwrap_or_else(local_ipv4);
        let code = LobbyCode::generate(&mut self.rng, ip);
        self.directory
            .insert(&code, SocketAddr::V4(SocketAddrV4::new(ip, port)));

        let local = world.populate_host();
        log::info!("Hosting on {}:{} with lobby code {}", ip, port, code);

        self.transport = Some(transport);
        self.lobby_code = Some(code.clone());
        self.local_id = Some(local);
        self.connections.clear();
        self.broadcast.reset();
        self.state = SessionState::Hosting;
        Ok(code)
    }

    /// Resolves `code` (this process's directory first, then the address
    /// embedded in the code) and joins the host there.
    pub fn join_by_code(&mut self, code: &str) -> Result<SocketAddr, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyActive);
        }

        let host = match self.directory.lookup(code) {
            Some(addr) => addr,
            None => {
                let parsed =
                    LobbyCode::parse(code).map_err(|source| SessionError::AddressResolution {
                        code: code.to_string(),
                        source,
                    })?;
                SocketAddr::V4(SocketAddrV4::new(parsed.address(), self.config.port))
            }
        };

        self.connect(host, code.trim().to_ascii_uppercase())?;
        Ok(host)
    }

    /// Joins a host at a known address, bypassing lobby codes.
    pub fn join_addr(&mut self, host: SocketAddr) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyActive);
        }
        self.connect(host, String::new())
    }

    fn connect(&mut self, host: SocketAddr, lobby_code: String) -> Result<(), SessionError> {
        let transport = Transport::open(0)?;
        self.state = SessionState::Joining;
        log::info!(
            "Joining {} from {} (code {:?})",
            host,
            transport.local_addr(),
            lobby_code
        );

        let join = Message::Join {
            lobby_code: lobby_code.clone(),
        };
        if let Err(e) = transport.send_to(&join, host) {
            self.state = SessionState::Idle;
            return Err(SessionError::Transport(e));
        }

        // No acknowledgement exists; the join is repeated until an identity
        // arrives.
        self.transport = Some(transport);
        self.join_code = lobby_code;
        self.host_addr = Some(host);
        self.local_id = None;
        self.broadcast.reset();
        self.state = SessionState::Connected;
        Ok(())
    }

    /// One simulation tick: apply everything received, step the world, then
    /// broadcast (host) or upload the local transform (client) when the
    /// broadcast interval has elapsed. A client still waiting for its
    /// identity repeats its join instead.
    pub fn update(&mut self, world: &mut World, dt: f32) {
        let inbound = self
            .transport
            .as_ref()
            .map(Transport::drain)
            .unwrap_or_default();
        for Inbound { message, from } in inbound {
            if let Err(e) = self.dispatch(world, message, from) {
                log::warn!("Ignoring message from {}: {}", from, e);
            }
        }

        for elimination in world.step(dt, self.is_host()) {
            self.pending_events.push_back(SessionEvent::PlayerEliminated {
                player: elimination.player,
                ball: elimination.ball,
            });
        }

        if !self.is_connected() {
            return;
        }

        self.broadcast.accumulate(dt);
        if self.broadcast.consume_all() == 0 {
            return;
        }

        match self.state {
            SessionState::Hosting => self.broadcast_state(world),
            SessionState::Connected if self.local_id.is_none() => {
                self.resend_join();
            }
            SessionState::Connected => {
                self.send_player_transform(world);
            }
            SessionState::Idle | SessionState::Joining => {}
        }
    }

    fn resend_join(&self) -> bool {
        log::debug!("No identity from host yet, repeating join");
        self.send_to_host(&Message::Join {
            lobby_code: self.join_code.clone(),
        })
    }

    /// Decodes and dispatches one raw datagram as if the transport had
    /// received it.
    pub fn handle_datagram(
        &mut self,
        world: &mut World,
        data: &[u8],
        from: SocketAddr,
    ) -> Result<(), SessionError> {
        let message = Message::decode(data)?;
        self.dispatch(world, message, from)
    }

    /// Sends the full transform and ball snapshots to every client.
    pub fn broadcast_state(&self, world: &World) {
        let Some(transport) = &self.transport else {
            return;
        };
        if self.connections.is_empty() {
            return;
        }

        let recipients = self.connections.addrs();
        transport.send_to_all_except(
            &Message::GameState(world.transform_snapshot()),
            recipients.iter().copied(),
            None,
        );
        transport.send_to_all_except(
            &Message::BallState(world.ball_records()),
            recipients,
            None,
        );
    }

    /// Client only: uploads the local player's transform to the host.
    pub fn send_player_transform(&self, world: &World) -> bool {
        if self.state != SessionState::Connected {
            return false;
        }
        let Some(record) = world.local_transform() else {
            return false;
        };
        self.send_to_host(&Message::PlayerTransform(record))
    }

    /// Launches a ball as the local player and tells the other peers.
    pub fn launch_ball(
        &mut self,
        world: &mut World,
        ball: &EntityId,
        direction: Vec3,
        position: Option<Vec3>,
    ) -> Result<(), SessionError> {
        let launcher = self
            .local_id
            .clone()
            .or_else(|| world.local_player().cloned())
            .ok_or(SessionError::NotConnected)?;
        let launch = world
            .launch_ball(ball, direction, &launcher, position)
            .ok_or_else(|| SessionError::UnknownEntity(ball.clone()))?;

        log::debug!("{} launched {} towards {:?}", launcher, ball, direction);
        let message = Message::BallLaunched(launch);
        match self.state {
            SessionState::Hosting => {
                self.send_to_clients(&message, None);
            }
            SessionState::Connected => {
                self.send_to_host(&message);
            }
            SessionState::Idle | SessionState::Joining => {}
        }
        Ok(())
    }

    pub fn send_chat(&mut self, text: &str) -> Result<(), SessionError> {
        let message = Message::Chat {
            text: text.to_string(),
        };
        match self.state {
            SessionState::Hosting => {
                self.send_to_clients(&message, None);
                Ok(())
            }
            SessionState::Connected => {
                self.send_to_host(&message);
                Ok(())
            }
            SessionState::Idle | SessionState::Joining => Err(SessionError::NotConnected),
        }
    }

    /// Host only: tells every client to load `level`.
    pub fn start_game(&mut self, level: &str) -> Result<usize, SessionError> {
        if self.state != SessionState::Hosting {
            return Err(SessionError::NotHost);
        }
        log::info!("Starting game on level {}", level);
        Ok(self.send_to_clients(
            &Message::StartGame {
                level: level.to_string(),
            },
            None,
        ))
    }

    fn send_to_host(&self, message: &Message) -> bool {
        let (Some(transport), Some(host)) = (&self.transport, self.host_addr) else {
            return false;
        };
        match transport.send_to(message, host) {
            Ok(_) => true,
            Err(e) => {
                log::error!("Failed to send {:?} to host {}: {}", message.kind(), host, e);
                false
            }
        }
    }

    fn send_to_clients(&self, message: &Message, excluded: Option<SocketAddr>) -> usize {
        match &self.transport {
            Some(transport) => {
                transport.send_to_all_except(message, self.connections.addrs(), excluded)
            }
            None => 0,
        }
    }

    fn send_to(&self, message: &Message, addr: SocketAddr) {
        let Some(transport) = &self.transport else {
            return;
        };
        if let Err(e) = transport.send_to(message, addr) {
            log::error!("Failed to send {:?} to {}: {}", message.kind(), addr, e);
        }
    }

    /// Stops the receive thread, closes the socket and forgets every peer.
    /// Safe to call repeatedly and from any state.
    pub fn disconnect(&mut self) {
        if self.state == SessionState::Idle && self.transport.is_none() {
            return;
        }

        if let Some(mut transport) = self.transport.take() {
            transport.close();
            self.last_stats = transport.stats();
        }
        if let Some(code) = self.lobby_code.take() {
            self.directory.remove(&code);
        }

        self.connections.clear();
        self.host_addr = None;
        self.join_code.clear();
        self.local_id = None;
        self.broadcast.reset();
        self.state = SessionState::Idle;
        self.pending_events.push_back(SessionEvent::Disconnected);
        log::info!("Disconnected");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}
