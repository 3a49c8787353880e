use std::net::SocketAddr;

use crate::net::{BallLaunch, Message, TransformRecord};
use crate::world::{EntityId, World};

use super::{Session, SessionError, SessionEvent, SessionState};

impl Session {
    /// Routes one received message by kind and role. Messages meant for the
    /// other role are dropped without complaint.
    pub(super) fn dispatch(
        &mut self,
        world: &mut World,
        message: Message,
        from: SocketAddr,
    ) -> Result<(), SessionError> {
        match self.state {
            SessionState::Hosting => self.dispatch_host(world, message, from),
            SessionState::Joining | SessionState::Connected => self.dispatch_client(world, message),
            SessionState::Idle => Ok(()),
        }
    }

    fn dispatch_host(
        &mut self,
        world: &mut World,
        message: Message,
        from: SocketAddr,
    ) -> Result<(), SessionError> {
        if let Message::Join { lobby_code } = &message {
            self.handle_join(world, from, lobby_code);
            return Ok(());
        }

        let Some(sender) = self.connections.player_for(&from).cloned() else {
            log::debug!("Ignoring {:?} from unknown peer {}", message.kind(), from);
            return Ok(());
        };

        match message {
            Message::PlayerTransform(record) => self.relay_transform(world, record, from),
            Message::BallLaunched(launch) => self.relay_launch(world, launch, from),
            Message::Chat { text } => {
                self.send_to_clients(&Message::Chat { text: text.clone() }, Some(from));
                self.pending_events.push_back(SessionEvent::Chat {
                    from: Some(sender),
                    text,
                });
                Ok(())
            }
            other => {
                log::debug!("Host ignoring {:?} from {}", other.kind(), from);
                Ok(())
            }
        }
    }

    /// Registers the sender, then pushes the existing players, the balls and
    /// finally the new identity to it alone. The new client is only included
    /// in periodic broadcasts after this bootstrap has gone out.
    fn handle_join(&mut self, world: &mut World, from: SocketAddr, lobby_code: &str) {
        if let Some(existing) = self.connections.player_for(&from).cloned() {
            log::debug!("Repeated join from {}, resending bootstrap", from);
            self.send_bootstrap(world, from, existing);
            return;
        }

        if self.connections.is_full() {
            log::warn!(
                "Rejecting join from {}: {} clients already connected",
                from,
                self.connections.len()
            );
            return;
        }

        let existing_players = world.player_records();
        let Some(player) = world.spawn_remote_player() else {
            log::warn!("Could not spawn a player for {}", from);
            return;
        };
        self.connections.add(from, player.clone());

        self.send_to(&Message::SyncExistingPlayers(existing_players), from);
        self.send_to(&Message::SyncExistingBalls(world.ball_records()), from);
        self.send_to(&Message::AssignIdentity { id: player.clone() }, from);

        log::info!("Client {} joined as {} (code {:?})", from, player, lobby_code);
        self.pending_events
            .push_back(SessionEvent::ClientJoined { addr: from, player });
    }

    fn send_bootstrap(&self, world: &World, to: SocketAddr, player: EntityId) {
        let others: Vec<TransformRecord> = world
            .player_records()
            .into_iter()
            .filter(|record| record.id != player)
            .collect();
        self.send_to(&Message::SyncExistingPlayers(others), to);
        self.send_to(&Message::SyncExistingBalls(world.ball_records()), to);
        self.send_to(&Message::AssignIdentity { id: player }, to);
    }

    fn relay_transform(
        &mut self,
        world: &mut World,
        record: TransformRecord,
        from: SocketAddr,
    ) -> Result<(), SessionError> {
        if self.local_id.as_ref() == Some(&record.id) {
            log::debug!("{} sent a transform for the host's own player", from);
            return Ok(());
        }

        if !world.apply_transform(&record.id, record.transform()) {
            return Err(SessionError::UnknownEntity(record.id));
        }

        self.send_to_clients(&Message::PlayerTransform(record), Some(from));
        Ok(())
    }

    fn relay_launch(
        &mut self,
        world: &mut World,
        launch: BallLaunch,
        from: SocketAddr,
    ) -> Result<(), SessionError> {
        if !world.apply_launch(&launch) {
            return Err(SessionError::UnknownEntity(launch.ball));
        }

        log::debug!("Relaying launch of {} by {}", launch.ball, launch.launcher);
        self.send_to_clients(&Message::BallLaunched(launch), Some(from));
        Ok(())
    }

    fn dispatch_client(&mut self, world: &mut World, message: Message) -> Result<(), SessionError> {
        match message {
            Message::AssignIdentity { id } => {
                self.bind_identity(world, id);
            }
            Message::SyncExistingPlayers(records) => {
                for record in records {
                    if world.local_player() == Some(&record.id) {
                        continue;
                    }
                    if world.contains(&record.id) {
                        world.apply_transform(&record.id, record.transform());
                    } else if world.spawn(record.id.clone(), record.transform()) {
                        self.pending_events
                            .push_back(SessionEvent::EntitySpawned { id: record.id });
                    }
                }
            }
            Message::SyncExistingBalls(records) => {
                for id in world.apply_ball_records(&records, true) {
                    self.pending_events
                        .push_back(SessionEvent::EntitySpawned { id });
                }
            }
            Message::GameState(batch) => {
                if self.local_id.is_none() {
                    log::debug!("Snapshot before identity assignment, skipping");
                    return Ok(());
                }
                let result = world.reconcile(&batch);
                for id in result.destroyed {
                    self.pending_events
                        .push_back(SessionEvent::EntityDestroyed { id });
                }
                for id in result.spawned {
                    self.pending_events
                        .push_back(SessionEvent::EntitySpawned { id });
                }
            }
            Message::BallState(records) => {
                if self.local_id.is_none() {
                    return Ok(());
                }
                world.apply_ball_records(&records, false);
            }
            Message::PlayerTransform(record) => {
                if world.local_player() != Some(&record.id)
                    && !world.apply_transform(&record.id, record.transform())
                {
                    log::debug!("Transform for unknown entity {}", record.id);
                }
            }
            Message::BallLaunched(launch) => {
                if !world.apply_launch(&launch) {
                    log::debug!("Launch of unknown ball {}", launch.ball);
                }
            }
            Message::Chat { text } => {
                self.pending_events
                    .push_back(SessionEvent::Chat { from: None, text });
            }
            Message::StartGame { level } => {
                log::info!("Host started level {}", level);
                self.pending_events
                    .push_back(SessionEvent::GameStarted { level });
            }
            Message::Join { .. } => {}
        }
        Ok(())
    }

    fn bind_identity(&mut self, world: &mut World, id: EntityId) {
        if self.local_id.as_ref() == Some(&id) {
            return;
        }

        let spawned = world.bind_local_player(id.clone());
        log::info!("Assigned identity {}", id);
        self.local_id = Some(id.clone());
        self.pending_events
            .push_back(SessionEvent::IdentityAssigned { player: id.clone() });
        if spawned {
            self.pending_events
                .push_back(SessionEvent::EntitySpawned { id });
        }
    }
}
