mod codec;
mod connection;
mod protocol;
mod stats;
mod transport;

pub use codec::{ByteReader, ByteWriter};
pub use connection::{ClientConnection, ConnectionManager};
pub use protocol::{
    BallLaunch, BallRecord, DEFAULT_BROADCAST_INTERVAL_MS, DEFAULT_PORT, MAX_PACKET_SIZE,
    Message, MessageKind, PacketError, TransformRecord,
};
pub use stats::NetworkStats;
pub use transport::{Inbound, Transport};
