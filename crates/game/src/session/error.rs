use std::io;

use crate::lobby::LobbyCodeError;
use crate::net::PacketError;
use crate::world::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("malformed message: {0}")]
    Malformed(#[from] PacketError),
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),
    #[error("lobby code {code:?} does not resolve to an address: {source}")]
    AddressResolution {
        code: String,
        #[source]
        source: LobbyCodeError,
    },
    #[error("a session is already active")]
    AlreadyActive,
    #[error("not connected")]
    NotConnected,
    #[error("only the host can do that")]
    NotHost,
}
