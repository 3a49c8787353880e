use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::{Arc, RwLock};

use rand::Rng;

pub const CODE_LEN: usize = 10;
const PREFIX_LEN: usize = 2;
const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyCodeError {
    #[error("lobby code must be 10 characters, got {0}")]
    WrongLength(usize),
    #[error("invalid character {character:?} at position {position}")]
    InvalidCharacter { character: char, position: usize },
    #[error("octet {index} decodes to {value}, which is above 255")]
    OctetOutOfRange { index: usize, value: u32 },
}

/// Shareable join token: two random characters followed by the host's IPv4
/// address as four two-digit base-36 octets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LobbyCode {
    code: String,
    address: Ipv4Addr,
}

impl LobbyCode {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, address: Ipv4Addr) -> Self {
        let mut code = String::with_capacity(CODE_LEN);
        for _ in 0..PREFIX_LEN {
            code.push(char::from(DIGITS[rng.gen_range(0..DIGITS.len())]));
        }
        code.push_str(&encode_ipv4(address));

        Self { code, address }
    }

    /// Accepts surrounding whitespace and lowercase input.
    pub fn parse(input: &str) -> Result<Self, LobbyCodeError> {
        let code = input.trim().to_ascii_uppercase();
        let chars: Vec<char> = code.chars().collect();
        if chars.len() != CODE_LEN {
            return Err(LobbyCodeError::WrongLength(chars.len()));
        }

        let mut digits = [0u32; CODE_LEN];
        for (position, &character) in chars.iter().enumerate() {
            digits[position] = character
                .to_digit(36)
                .ok_or(LobbyCodeError::InvalidCharacter {
                    character,
                    position,
                })?;
        }

        let mut octets = [0u8; 4];
        for (index, pair) in digits[PREFIX_LEN..].chunks_exact(2).enumerate() {
            let value = pair[0] * 36 + pair[1];
            octets[index] =
                u8::try_from(value).map_err(|_| LobbyCodeError::OctetOutOfRange { index, value })?;
        }

        Ok(Self {
            code,
            address: Ipv4Addr::from(octets),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }
}

impl fmt::Display for LobbyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Eight characters: each octet as two base-36 digits.
pub fn encode_ipv4(address: Ipv4Addr) -> String {
    let mut encoded = String::with_capacity(8);
    for octet in address.octets() {
        let octet = usize::from(octet);
        encoded.push(char::from(DIGITS[octet / 36]));
        encoded.push(char::from(DIGITS[octet % 36]));
    }
    encoded
}

/// Codes this process has handed out, so a join in the same process skips
/// decoding. Clones share one table.
#[derive(Debug, Clone, Default)]
pub struct LobbyDirectory {
    entries: Arc<RwLock<HashMap<String, SocketAddr>>>,
}

impl LobbyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, code: &LobbyCode, addr: SocketAddr) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(code.as_str().to_string(), addr);
    }

    pub fn remove(&self, code: &LobbyCode) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(code.as_str());
    }

    pub fn lookup(&self, code: &str) -> Option<SocketAddr> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(&code.trim().to_ascii_uppercase()).copied()
    }
}

/// Address other machines on the LAN would reach this one at. Falls back to
/// loopback when no route is configured.
pub fn local_ipv4() -> Ipv4Addr {
    let probe = || -> std::io::Result<Ipv4Addr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        // connect() on UDP only picks a route, nothing is sent.
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        match socket.local_addr()? {
            SocketAddr::V4(addr) if !addr.ip().is_unspecified() => Ok(*addr.ip()),
            _ => Ok(Ipv4Addr::LOCALHOST),
        }
    };

    probe().unwrap_or_else(|e| {
        log::debug!("No routable local address ({}), using loopback", e);
        Ipv4Addr::LOCALHOST
    })
}
