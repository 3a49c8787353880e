use std::net::SocketAddr;

use crate::world::EntityId;

/// Things the session observed during an update, drained by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ClientJoined {
        addr: SocketAddr,
        player: EntityId,
    },
    IdentityAssigned {
        player: EntityId,
    },
    EntitySpawned {
        id: EntityId,
    },
    EntityDestroyed {
        id: EntityId,
    },
    /// Emitted on the host only. The ball has already been respawned; what
    /// happens to the player is up to the caller.
    PlayerEliminated {
        player: EntityId,
        ball: EntityId,
    },
    Chat {
        /// Known on the host. Relayed chat carries no sender.
        from: Option<EntityId>,
        text: String,
    },
    GameStarted {
        level: String,
    },
    Disconnected,
}
