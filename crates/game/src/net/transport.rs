use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use super::protocol::{MAX_PACKET_SIZE, Message};
use super::stats::{NetworkStats, StatsCounters};

/// How long the receive thread blocks before re-checking the stop flag.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A decoded datagram waiting for the simulation thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub message: Message,
    pub from: SocketAddr,
}

/// One UDP socket plus the background thread that reads it.
///
/// The receive thread only decodes and enqueues; nothing it does touches
/// world state. The simulation thread pulls decoded messages with
/// [`Transport::drain`].
pub struct Transport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    inbound: Receiver<Inbound>,
    running: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
    stats: Arc<StatsCounters>,
}

impl Transport {
    /// Binds every interface on `port`. Port 0 picks an ephemeral port.
    pub fn open(port: u16) -> io::Result<Self> {
        Self::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
    }

    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(RECV_POLL_INTERVAL))?;
        let local_addr = socket.local_addr()?;

        let socket = Arc::new(socket);
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(StatsCounters::default());
        let (sender, inbound) = channel::unbounded();

        let receiver = thread::Builder::new()
            .name(format!("recv-{}", local_addr.port()))
            .spawn({
                let socket = Arc::clone(&socket);
                let running = Arc::clone(&running);
                let stats = Arc::clone(&stats);
                move || receive_loop(&socket, &sender, &running, &stats)
            })?;

        log::debug!("Transport bound to {}", local_addr);

        Ok(Self {
            socket,
            local_addr,
            inbound,
            running,
            receiver: Some(receiver),
            stats,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_open(&self) -> bool {
        self.receiver.is_some()
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats.snapshot()
    }

    pub fn send_to(&self, message: &Message, addr: SocketAddr) -> io::Result<usize> {
        self.send_bytes(&message.encode(), addr)
    }

    /// Sends one encoding of `message` to every recipient except `excluded`.
    /// A failed send is logged and does not stop the others. Returns how many
    /// sends succeeded.
    pub fn send_to_all_except(
        &self,
        message: &Message,
        recipients: impl IntoIterator<Item = SocketAddr>,
        excluded: Option<SocketAddr>,
    ) -> usize {
        let data = message.encode();
        let mut delivered = 0;

        for addr in recipients {
            if Some(addr) == excluded {
                continue;
            }
            match self.send_bytes(&data, addr) {
                Ok(_) => delivered += 1,
                Err(e) => log::error!("Failed to send {:?} to {}: {}", message.kind(), addr, e),
            }
        }

        delivered
    }

    fn send_bytes(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        if data.len() > MAX_PACKET_SIZE {
            self.stats.record_send_failure();
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Datagram exceeds maximum UDP payload",
            ));
        }

        match self.socket.send_to(data, addr) {
            Ok(bytes) => {
                self.stats.record_sent(bytes);
                Ok(bytes)
            }
            Err(e) => {
                self.stats.record_send_failure();
                Err(e)
            }
        }
    }

    /// Everything received since the last call, in arrival order.
    pub fn drain(&self) -> Vec<Inbound> {
        self.inbound.try_iter().collect()
    }

    /// Stops the receive thread and waits for it to exit. Safe to call more
    /// than once.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.receiver.take() {
            if handle.join().is_err() {
                log::error!("Receive thread on {} panicked", self.local_addr);
            }
            log::debug!("Transport on {} closed", self.local_addr);
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

fn receive_loop(
    socket: &UdpSocket,
    inbound: &Sender<Inbound>,
    running: &AtomicBool,
    stats: &StatsCounters,
) {
    let mut buffer = vec![0u8; MAX_PACKET_SIZE];

    while running.load(Ordering::SeqCst) {
        let (size, from) = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                log::error!("Receive failed: {}", e);
                thread::sleep(RECV_POLL_INTERVAL);
                continue;
            }
        };

        stats.record_received(size);
        match Message::decode(&buffer[..size]) {
            Ok(message) => {
                if inbound.send(Inbound { message, from }).is_err() {
                    break;
                }
            }
            Err(e) => {
                stats.record_malformed();
                log::warn!("Dropping malformed datagram from {}: {}", from, e);
            }
        }
    }
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
    )
}
