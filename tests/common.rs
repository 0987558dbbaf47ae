//! Shared helpers for integration tests.

#![allow(unused)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use dtls_flight::certificate::generate_self_signed_certificate;
use dtls_flight::{Config, ConfigBuilder, DatagramChannel, Engine, Output};

/// Parsed record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecHdr {
    pub ctype: u8,
    pub epoch: u16,
    pub seq: u64,
}

pub const CHANGE_CIPHER_SPEC: u8 = 20;
pub const ALERT: u8 = 21;
pub const HANDSHAKE: u8 = 22;
pub const APPLICATION_DATA: u8 = 23;

/// Handshake message types (RFC 5246 / 6347).
pub const CLIENT_HELLO: u8 = 1;
pub const SERVER_HELLO: u8 = 2;
pub const HELLO_VERIFY_REQUEST: u8 = 3;
pub const CERTIFICATE: u8 = 11;
pub const SERVER_KEY_EXCHANGE: u8 = 12;
pub const CERTIFICATE_REQUEST: u8 = 13;
pub const SERVER_HELLO_DONE: u8 = 14;
pub const CLIENT_KEY_EXCHANGE: u8 = 16;

/// Parse record headers from a datagram.
pub fn parse_records(datagram: &[u8]) -> Vec<RecHdr> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 13 <= datagram.len() {
        let ctype = datagram[i];
        let epoch = u16::from_be_bytes([datagram[i + 3], datagram[i + 4]]);
        let seq_bytes = [
            0u8,
            0u8,
            datagram[i + 5],
            datagram[i + 6],
            datagram[i + 7],
            datagram[i + 8],
            datagram[i + 9],
            datagram[i + 10],
        ];
        let seq = u64::from_be_bytes(seq_bytes);
        let len = u16::from_be_bytes([datagram[i + 11], datagram[i + 12]]) as usize;
        out.push(RecHdr { ctype, epoch, seq });
        i += 13 + len;
    }
    out
}

/// Collect record headers from a slice of datagrams.
pub fn collect_headers(datagrams: &[Vec<u8>]) -> Vec<RecHdr> {
    datagrams.iter().flat_map(|d| parse_records(d)).collect()
}

/// Handshake message types of the plaintext handshake records in a datagram.
pub fn handshake_types(datagram: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 13 <= datagram.len() {
        let ctype = datagram[i];
        let epoch = u16::from_be_bytes([datagram[i + 3], datagram[i + 4]]);
        let len = u16::from_be_bytes([datagram[i + 11], datagram[i + 12]]) as usize;
        if ctype == HANDSHAKE && epoch == 0 && i + 13 < datagram.len() {
            out.push(datagram[i + 13]);
        }
        i += 13 + len;
    }
    out
}

/// Assert that retransmitted records keep their epochs but use new sequence numbers.
pub fn assert_epochs_and_seq_increased(init: &[RecHdr], resend: &[RecHdr]) {
    assert_eq!(
        init.len(),
        resend.len(),
        "record count must match between initial and resend"
    );
    for (a, b) in init.iter().zip(resend.iter()) {
        assert_eq!(a.epoch, b.epoch, "epoch must match on resend");
        assert!(
            b.seq > a.seq,
            "sequence must increase on resend: {:?} -> {:?}",
            a,
            b
        );
    }
}

/// Collected outputs from polling an engine to `Timeout`.
#[derive(Default, Debug)]
pub struct Drained {
    pub packets: Vec<Vec<u8>>,
    pub connected: bool,
    pub app_data: Vec<Vec<u8>>,
    pub timeout: Option<Instant>,
}

/// Poll until `Timeout`, collecting everything.
pub fn drain(engine: &mut Engine, now: Instant) -> Drained {
    let mut result = Drained::default();
    loop {
        match engine.poll_output(now) {
            Output::Packet(p) => result.packets.push(p),
            Output::Connected => result.connected = true,
            Output::ApplicationData(d) => result.app_data.push(d),
            Output::Timeout(t) => {
                result.timeout = Some(t);
                break;
            }
        }
    }
    result
}

/// Poll until `Timeout`, collecting only packets.
pub fn collect_packets(engine: &mut Engine, now: Instant) -> Vec<Vec<u8>> {
    drain(engine, now).packets
}

/// Deliver packets, ignoring errors.
pub fn deliver(packets: &[Vec<u8>], dest: &mut Engine, now: Instant) {
    for p in packets {
        let _ = dest.handle_packet(p, now);
    }
}

/// Trigger the flight timer by moving time past any jittered RTO.
pub fn trigger_timeout(engine: &mut Engine, now: &mut Instant) {
    *now += Duration::from_secs(2);
    engine.handle_timeout(*now).expect("handle_timeout");
}

pub fn client_builder() -> ConfigBuilder {
    let _ = env_logger::try_init();
    Config::builder()
}

pub fn server_builder() -> ConfigBuilder {
    let _ = env_logger::try_init();
    let cert = generate_self_signed_certificate().expect("gen server cert");
    Config::builder().certificate(cert)
}

pub fn client_config() -> Arc<Config> {
    Arc::new(client_builder().build().expect("client config"))
}

pub fn server_config() -> Arc<Config> {
    Arc::new(server_builder().build().expect("server config"))
}

/// A started client and server engine.
pub fn engines(client: Arc<Config>, server: Arc<Config>, now: Instant) -> (Engine, Engine) {
    let mut client = Engine::new(client, true).expect("client engine");
    let mut server = Engine::new(server, false).expect("server engine");
    client.start(now).expect("client start");
    server.start(now).expect("server start");
    (client, server)
}

/// Outcome of pumping packets between two engines.
#[derive(Default, Debug)]
pub struct Pumped {
    pub client_connected: bool,
    pub server_connected: bool,
    pub client_app_data: Vec<Vec<u8>>,
    pub server_app_data: Vec<Vec<u8>>,
}

/// Exchange packets until neither side has anything left to send.
pub fn pump(client: &mut Engine, server: &mut Engine, now: Instant) -> Pumped {
    let mut pumped = Pumped::default();
    for _ in 0..20 {
        let c = drain(client, now);
        pumped.client_connected |= c.connected;
        pumped.client_app_data.extend(c.app_data);
        deliver(&c.packets, server, now);

        let s = drain(server, now);
        pumped.server_connected |= s.connected;
        pumped.server_app_data.extend(s.app_data);
        deliver(&s.packets, client, now);

        if c.packets.is_empty() && s.packets.is_empty() {
            break;
        }
    }
    pumped
}

/// Run a full handshake and assert that both sides connected.
pub fn connect(client_config: Arc<Config>, server_config: Arc<Config>) -> (Engine, Engine) {
    let now = Instant::now();
    let (mut client, mut server) = engines(client_config, server_config, now);
    let pumped = pump(&mut client, &mut server, now);
    assert!(pumped.client_connected, "client should connect");
    assert!(pumped.server_connected, "server should connect");
    (client, server)
}

/// In-memory datagram channel. Datagrams sent on one end arrive at the other.
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: watch::Sender<bool>,
    /// Number of outgoing datagrams still to be dropped.
    drop_next: AtomicUsize,
}

impl MemoryChannel {
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        (MemoryChannel::new(tx_a, rx_b), MemoryChannel::new(tx_b, rx_a))
    }

    fn new(tx: mpsc::UnboundedSender<Vec<u8>>, rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        MemoryChannel {
            tx,
            rx: Mutex::new(rx),
            closed: watch::channel(false).0,
            drop_next: AtomicUsize::new(0),
        }
    }

    /// Silently lose the next `n` datagrams sent on this end.
    pub fn drop_next(self, n: usize) -> Self {
        self.drop_next.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl DatagramChannel for MemoryChannel {
    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let dropped = self
            .drop_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if dropped {
            return Ok(buf.len());
        }
        // The peer may already be gone, which is packet loss.
        let _ = self.tx.send(buf.to_vec());
        Ok(buf.len())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(io::ErrorKind::NotConnected.into());
        }

        let mut rx = self.rx.lock().await;
        tokio::select! {
            data = rx.recv() => match data {
                Some(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                None => Err(io::ErrorKind::ConnectionAborted.into()),
            },
            _ = closed.changed() => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    async fn close(&self) -> io::Result<()> {
        self.closed.send_replace(true);
        Ok(())
    }
}
