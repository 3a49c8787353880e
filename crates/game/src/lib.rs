pub mod lobby;
pub mod net;
pub mod session;
pub mod simulation;
pub mod world;

pub use lobby::{LobbyCode, LobbyCodeError, LobbyDirectory};
pub use net::{
    BallLaunch, BallRecord, DEFAULT_BROADCAST_INTERVAL_MS, DEFAULT_PORT, Message, MessageKind,
    NetworkStats, PacketError, TransformRecord, Transport,
};
pub use session::{Role, Session, SessionConfig, SessionError, SessionEvent, SessionState};
pub use simulation::FixedTimestep;
pub use world::{
    Ball, BallConfig, BallState, EntityId, EntityKind, ObjectRegistry, Transform, World,
    WorldConfig,
};
