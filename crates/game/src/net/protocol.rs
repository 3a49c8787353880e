use glam::{Quat, Vec3};

use crate::world::{BallState, EntityId, Transform};

use super::codec::{ByteReader, ByteWriter};

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_PACKET_SIZE: usize = 65_507;
pub const DEFAULT_PORT: u16 = 4567;
pub const DEFAULT_BROADCAST_INTERVAL_MS: u64 = 50;

/// First byte of every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Join = 0,
    Chat = 1,
    PlayerTransform = 2,
    GameState = 3,
    StartGame = 4,
    AssignIdentity = 5,
    SyncExistingPlayers = 6,
    BallState = 7,
    SyncExistingBalls = 8,
    BallLaunched = 9,
}

impl TryFrom<u8> for MessageKind {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Join,
            1 => Self::Chat,
            2 => Self::PlayerTransform,
            3 => Self::GameState,
            4 => Self::StartGame,
            5 => Self::AssignIdentity,
            6 => Self::SyncExistingPlayers,
            7 => Self::BallState,
            8 => Self::SyncExistingBalls,
            9 => Self::BallLaunched,
            other => return Err(PacketError::UnknownKind(other)),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("empty datagram")]
    Empty,
    #[error("unknown message kind {0}")]
    UnknownKind(u8),
    #[error("truncated at byte {offset}: needed {needed}, {remaining} left")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("string at byte {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },
    #[error("invalid ball state {0}")]
    InvalidBallState(u8),
    #[error("negative collection count {0}")]
    NegativeCount(i32),
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

/// Pose of one entity, as carried by transform updates and snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRecord {
    pub id: EntityId,
    pub position: Vec3,
    pub rotation: Quat,
}

impl TransformRecord {
    pub fn new(id: EntityId, transform: Transform) -> Self {
        Self {
            id,
            position: transform.position,
            rotation: transform.rotation,
        }
    }

    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation)
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer.write_str(self.id.as_str());
        writer.write_vec3(self.position);
        writer.write_quat(self.rotation);
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, PacketError> {
        Ok(Self {
            id: EntityId::from(reader.read_string()?),
            position: reader.read_vec3()?,
            rotation: reader.read_quat()?,
        })
    }
}

/// Full replicated state of one ball. An empty owner on the wire maps to
/// `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct BallRecord {
    pub id: EntityId,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub state: BallState,
    pub owner: Option<EntityId>,
    pub bounce_count: i32,
}

impl BallRecord {
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation)
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer.write_str(self.id.as_str());
        writer.write_vec3(self.position);
        writer.write_quat(self.rotation);
        writer.write_vec3(self.velocity);
        writer.write_u8(self.state as u8);
        writer.write_str(self.owner.as_ref().map_or("", EntityId::as_str));
        writer.write_i32(self.bounce_count);
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, PacketError> {
        let id = EntityId::from(reader.read_string()?);
        let position = reader.read_vec3()?;
        let rotation = reader.read_quat()?;
        let velocity = reader.read_vec3()?;
        let state_byte = reader.read_u8()?;
        let state =
            BallState::try_from(state_byte).map_err(|_| PacketError::InvalidBallState(state_byte))?;
        let owner = reader.read_string()?;
        let bounce_count = reader.read_i32()?;

        Ok(Self {
            id,
            position,
            rotation,
            velocity,
            state,
            owner: (!owner.is_empty()).then(|| EntityId::from(owner)),
            bounce_count,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BallLaunch {
    pub ball: EntityId,
    pub direction: Vec3,
    pub launcher: EntityId,
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Join { lobby_code: String },
    Chat { text: String },
    PlayerTransform(TransformRecord),
    GameState(Vec<TransformRecord>),
    StartGame { level: String },
    AssignIdentity { id: EntityId },
    SyncExistingPlayers(Vec<TransformRecord>),
    BallState(Vec<BallRecord>),
    SyncExistingBalls(Vec<BallRecord>),
    BallLaunched(BallLaunch),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Join { .. } => MessageKind::Join,
            Self::Chat { .. } => MessageKind::Chat,
            Self::PlayerTransform(_) => MessageKind::PlayerTransform,
            Self::GameState(_) => MessageKind::GameState,
            Self::StartGame { .. } => MessageKind::StartGame,
            Self::AssignIdentity { .. } => MessageKind::AssignIdentity,
            Self::SyncExistingPlayers(_) => MessageKind::SyncExistingPlayers,
            Self::BallState(_) => MessageKind::BallState,
            Self::SyncExistingBalls(_) => MessageKind::SyncExistingBalls,
            Self::BallLaunched(_) => MessageKind::BallLaunched,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(64);
        writer.write_u8(self.kind() as u8);

        match self {
            Self::Join { lobby_code } => writer.write_str(lobby_code),
            Self::Chat { text } => writer.write_str(text),
            Self::StartGame { level } => writer.write_str(level),
            Self::AssignIdentity { id } => writer.write_str(id.as_str()),
            Self::PlayerTransform(record) => record.write(&mut writer),
            Self::GameState(records) | Self::SyncExistingPlayers(records) => {
                writer.write_count(records.len());
                for record in records {
                    record.write(&mut writer);
                }
            }
            Self::BallState(records) | Self::SyncExistingBalls(records) => {
                writer.write_count(records.len());
                for record in records {
                    record.write(&mut writer);
                }
            }
            Self::BallLaunched(launch) => {
                writer.write_str(launch.ball.as_str());
                writer.write_vec3(launch.direction);
                writer.write_str(launch.launcher.as_str());
                writer.write_vec3(launch.position);
            }
        }

        writer.into_bytes()
    }

    pub fn peek_kind(data: &[u8]) -> Result<MessageKind, PacketError> {
        let first = *data.first().ok_or(PacketError::Empty)?;
        MessageKind::try_from(first)
    }

    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let kind = Self::peek_kind(data)?;
        let mut reader = ByteReader::new(&data[1..]);

        let message = match kind {
            MessageKind::Join => Self::Join {
                lobby_code: reader.read_string()?,
            },
            MessageKind::Chat => Self::Chat {
                text: reader.read_string()?,
            },
            MessageKind::StartGame => Self::StartGame {
                level: reader.read_string()?,
            },
            MessageKind::AssignIdentity => Self::AssignIdentity {
                id: EntityId::from(reader.read_string()?),
            },
            MessageKind::PlayerTransform => Self::PlayerTransform(TransformRecord::read(&mut reader)?),
            MessageKind::GameState => Self::GameState(reader.read_list(TransformRecord::read)?),
            MessageKind::SyncExistingPlayers => {
                Self::SyncExistingPlayers(reader.read_list(TransformRecord::read)?)
            }
            MessageKind::BallState => Self::BallState(reader.read_list(BallRecord::read)?),
            MessageKind::SyncExistingBalls => {
                Self::SyncExistingBalls(reader.read_list(BallRecord::read)?)
            }
            MessageKind::BallLaunched => Self::BallLaunched(BallLaunch {
                ball: EntityId::from(reader.read_string()?),
                direction: reader.read_vec3()?,
                launcher: EntityId::from(reader.read_string()?),
                position: reader.read_vec3()?,
            }),
        };

        reader.finish()?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ball(id: &str, owner: Option<&str>) -> BallRecord {
        BallRecord {
            id: EntityId::from(id),
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
            velocity: Vec3::new(0.0, 0.0, 20.0),
            state: if owner.is_some() {
                BallState::Hot
            } else {
                BallState::Cold
            },
            owner: owner.map(EntityId::from),
            bounce_count: 2,
        }
    }

    fn roundtrip(message: Message) {
        let bytes = message.encode();
        assert_eq!(bytes[0], message.kind() as u8);
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn every_kind_roundtrips() {
        let transform = TransformRecord {
            id: EntityId::player(1),
            position: Vec3::new(-4.5, 0.0, 12.25),
            rotation: Quat::from_rotation_x(1.0),
        };

        roundtrip(Message::Join {
            lobby_code: "AB3J000001".into(),
        });
        roundtrip(Message::Chat { text: "".into() });
        roundtrip(Message::Chat {
            text: "¡hola!".into(),
        });
        roundtrip(Message::PlayerTransform(transform.clone()));
        roundtrip(Message::GameState(vec![]));
        roundtrip(Message::GameState(vec![transform.clone(), transform.clone()]));
        roundtrip(Message::StartGame {
            level: "Map_1".into(),
        });
        roundtrip(Message::AssignIdentity {
            id: EntityId::player(2),
        });
        roundtrip(Message::SyncExistingPlayers(vec![transform]));
        roundtrip(Message::BallState(vec![
            sample_ball("ball_0", None),
            sample_ball("ball_1", Some("player_0")),
        ]));
        roundtrip(Message::SyncExistingBalls(vec![]));
        roundtrip(Message::BallLaunched(BallLaunch {
            ball: EntityId::ball(0),
            direction: Vec3::Z,
            launcher: EntityId::player(0),
            position: Vec3::new(0.0, 1.5, 0.0),
        }));
    }

    #[test]
    fn edge_values_roundtrip() {
        let long_text: String = "žluťoučký kůň 🐎 ".repeat(200);
        assert!(long_text.len() > long_text.chars().count());
        roundtrip(Message::Chat {
            text: long_text.clone(),
        });
        roundtrip(Message::AssignIdentity {
            id: EntityId::from(long_text.as_str()),
        });

        let extreme = TransformRecord {
            id: EntityId::player(u32::MAX),
            position: Vec3::new(f32::MAX, f32::MIN, f32::MIN_POSITIVE),
            rotation: Quat::from_xyzw(-0.0, f32::EPSILON, f32::MAX, f32::MIN),
        };
        roundtrip(Message::GameState(vec![extreme; 50]));

        let mut ball = sample_ball("ball_9", Some("player_1"));
        ball.bounce_count = i32::MIN;
        ball.velocity = Vec3::new(f32::MIN, -f32::MIN_POSITIVE, f32::MAX);
        roundtrip(Message::BallState(vec![ball.clone()]));
        ball.bounce_count = i32::MAX;
        roundtrip(Message::SyncExistingBalls(vec![ball]));
    }

    #[test]
    fn assign_identity_layout() {
        let bytes = Message::AssignIdentity {
            id: EntityId::from("p"),
        }
        .encode();
        assert_eq!(bytes, vec![5, 1, 0, 0, 0, b'p']);
    }

    #[test]
    fn empty_owner_decodes_as_none() {
        let bytes = Message::BallState(vec![sample_ball("ball_3", None)]).encode();
        match Message::decode(&bytes).unwrap() {
            Message::BallState(records) => assert_eq!(records[0].owner, None),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(Message::decode(&[]), Err(PacketError::Empty)));
        assert!(matches!(
            Message::decode(&[42]),
            Err(PacketError::UnknownKind(42))
        ));

        let mut bytes = Message::PlayerTransform(TransformRecord {
            id: EntityId::player(0),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        })
        .encode();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            Message::decode(&bytes),
            Err(PacketError::Truncated { .. })
        ));

        let mut bytes = Message::Chat { text: "x".into() }.encode();
        bytes.push(0);
        assert!(matches!(
            Message::decode(&bytes),
            Err(PacketError::TrailingBytes(1))
        ));
    }

    #[test]
    fn invalid_ball_state_byte_is_rejected() {
        let mut bytes = Message::BallState(vec![sample_ball("b", None)]).encode();
        // kind + count + id(4 + 1) + 10 floats
        let state_offset = 1 + 4 + 5 + 40;
        bytes[state_offset] = 7;
        assert!(matches!(
            Message::decode(&bytes),
            Err(PacketError::InvalidBallState(7))
        ));
    }
}
