//! Sans-IO connection engine.
//!
//! The engine owns the handshake state, the cache, the fragment buffer and
//! the timers. It never touches a socket or a clock: datagrams and the
//! current time are fed in, and packets to send, application data and the
//! next deadline are polled out.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::HandshakeCache;
use crate::crypto::{KeyingMaterial, SrtpProfile, DTLS_AEAD_OVERHEAD};
use crate::flight::{Flight, FlightError, Next};
use crate::fragment::{FragmentBuffer, Pushed};
use crate::message::{Alert, AlertDescription, CipherSuite, ContentType, DTLSRecord};
use crate::message::{Handshake, MessageType, Sequence, HANDSHAKE_HEADER_LEN, RECORD_HEADER_LEN};
use crate::record_layer::{marshal, split_records};
use crate::state::State;
use crate::timer::ExponentialBackoff;
use crate::window::ReplayWindow;
use crate::{Config, Error, SeededRng};

/// Largest plaintext in one record.
const MAX_PLAINTEXT_LEN: usize = 1 << 14;

/// Something the caller must act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// A datagram to send to the peer.
    Packet(Vec<u8>),
    /// Decrypted application data from the peer.
    ApplicationData(Vec<u8>),
    /// The handshake completed. Emitted once.
    Connected,
    /// Nothing more to do. Call [`Engine::handle_timeout`] at this instant.
    Timeout(Instant),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timeout {
    Disabled,
    Unarmed,
    Armed(Instant),
}

/// A record of the current flight, kept for resends.
#[derive(Debug)]
struct Entry {
    content_type: ContentType,
    epoch: u16,
    fragment: Vec<u8>,
}

/// What handling a batch of records led to.
#[derive(Debug, Default)]
struct Progress {
    /// New peer handshake messages were cached.
    new_messages: bool,
    /// A fragment of an already completed message arrived.
    retransmit: bool,
}

pub struct Engine {
    config: Arc<Config>,

    /// Seedable random number generator for jitter and explicit nonces.
    rng: SeededRng,

    state: State,
    cache: HandshakeCache,
    fragments: FragmentBuffer,

    flight: Flight,

    /// Counters for sending records during epoch 0.
    ///
    /// Kept separate since resends of an epoch 0 flight continue this
    /// sequence even after epoch 1 started.
    sequence_epoch_0: Sequence,

    /// Counters for epoch 1.
    sequence_epoch_n: Sequence,

    /// Anti-replay window for epoch 1.
    replay: ReplayWindow,

    /// Epoch 1 records that arrived before we had the keys.
    queue_rx: VecDeque<Vec<u8>>,

    /// Datagrams ready to send.
    queue_tx: VecDeque<Vec<u8>>,

    /// Decrypted application data not yet polled.
    app_data: VecDeque<Vec<u8>>,

    /// The records that have been sent in the current flight.
    flight_saved_records: Vec<Entry>,

    flight_backoff: ExponentialBackoff,

    /// Timeout for the current flight.
    flight_timeout: Timeout,

    /// Global timeout for the entire handshake.
    connect_timeout: Timeout,

    started: bool,
    connected: bool,
    /// Connected not yet reported through poll_output.
    connected_pending: bool,
    closed: bool,
    failed: Option<Error>,
}

impl Engine {
    /// Create an engine for one side of a connection.
    ///
    /// A server needs a certificate in the config.
    pub fn new(config: Arc<Config>, is_client: bool) -> Result<Self, Error> {
        if !is_client && config.certificate().is_none() {
            return Err(Error::ConfigError("Server requires a certificate".into()));
        }

        let mut rng = SeededRng::new(config.rng_seed());
        let flight_backoff = ExponentialBackoff::new(
            config.flight_start_rto(),
            config.flight_max_rto(),
            config.flight_retries(),
            &mut rng,
        );

        Ok(Engine {
            rng,
            state: State::new(is_client),
            cache: HandshakeCache::new(),
            fragments: FragmentBuffer::new(config.max_buffered_messages()),
            flight: Flight::initial(is_client),
            sequence_epoch_0: Sequence::new(0, 0),
            sequence_epoch_n: Sequence::new(1, 0),
            replay: ReplayWindow::new(),
            queue_rx: VecDeque::new(),
            queue_tx: VecDeque::new(),
            app_data: VecDeque::new(),
            flight_saved_records: Vec::new(),
            flight_backoff,
            flight_timeout: Timeout::Disabled,
            connect_timeout: Timeout::Disabled,
            started: false,
            connected: false,
            connected_pending: false,
            closed: false,
            failed: None,
            config,
        })
    }

    /// Begin the handshake. A client queues its ClientHello, a server starts
    /// waiting for one.
    pub fn start(&mut self, now: Instant) -> Result<(), Error> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.connect_timeout = Timeout::Unarmed;

        debug!(
            "Start {} handshake",
            if self.state.is_client {
                "client"
            } else {
                "server"
            }
        );

        self.prepare(self.flight)?;
        self.arm_timers(now);
        Ok(())
    }

    pub fn is_client(&self) -> bool {
        self.state.is_client
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The negotiated cipher suite, once chosen.
    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.state.cipher_suite
    }

    pub fn srtp_profile(&self) -> Option<SrtpProfile> {
        self.state.srtp_profile
    }

    /// DER certificates presented by the peer, leaf first.
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.state.peer_certificates
    }

    /// SNI received by a server, or the name a client sent.
    pub fn server_name(&self) -> Option<&str> {
        if self.state.is_client {
            self.config.server_name()
        } else {
            self.state.server_name.as_deref()
        }
    }

    /// RFC 5705 keying material exporter. Available once connected.
    pub fn export_keying_material(&self, label: &str, len: usize) -> Result<KeyingMaterial, Error> {
        if !self.connected {
            return Err(Error::HandshakeInProgress);
        }
        let material = self.state.export_keying_material(label, len)?;
        Ok(KeyingMaterial::new(material))
    }

    /// DTLS-SRTP keying material, if an SRTP profile was negotiated.
    pub fn srtp_keying_material(&self) -> Result<Option<(KeyingMaterial, SrtpProfile)>, Error> {
        if !self.connected {
            return Err(Error::HandshakeInProgress);
        }
        self.state.srtp_keying_material()
    }

    fn check_usable(&self) -> Result<(), Error> {
        match &self.failed {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Process one datagram from the peer.
    pub fn handle_packet(&mut self, datagram: &[u8], now: Instant) -> Result<(), Error> {
        self.check_usable()?;
        if self.closed {
            trace!("Ignoring datagram on closed connection");
            return Ok(());
        }

        let records = match split_records(datagram) {
            Ok(v) => v,
            Err(e) => return Err(self.fail(e.into())),
        };

        let mut progress = Progress::default();
        for record in records {
            self.handle_record(record, &mut progress)?;
        }

        self.advance(progress)?;
        self.arm_timers(now);
        Ok(())
    }

    fn handle_record(&mut self, record: DTLSRecord<'_>, progress: &mut Progress) -> Result<(), Error> {
        let epoch = record.sequence.epoch;
        trace!(
            "Record {:?} epoch {} seq {} len {}",
            record.content_type,
            epoch,
            record.sequence.sequence_number,
            record.fragment.len()
        );

        let plaintext = match epoch {
            0 => record.fragment.to_vec(),
            1 => {
                let Some(keys) = &self.state.keys else {
                    if self.queue_rx.len() >= self.config.max_queue_rx() {
                        warn!(
                            "Receive queue full (max {}), dropping epoch 1 record",
                            self.config.max_queue_rx()
                        );
                    } else {
                        trace!("Queue epoch 1 record until keys are derived");
                        self.queue_rx.push_back(record.marshal());
                    }
                    return Ok(());
                };

                let seq = record.sequence.sequence_number;
                if !self.replay.check(seq) {
                    trace!("Drop replayed record seq {}", seq);
                    return Ok(());
                }

                match keys.open(record.content_type, record.sequence, record.fragment) {
                    Ok(v) => {
                        self.replay.update(seq);
                        v
                    }
                    Err(e) => return Err(self.fail(e.into())),
                }
            }
            _ => {
                debug!("Drop record for unknown epoch {}", epoch);
                return Ok(());
            }
        };

        match record.content_type {
            ContentType::Handshake => self.handle_handshake(&plaintext, epoch, progress),
            ContentType::ChangeCipherSpec => {
                trace!("ChangeCipherSpec from peer");
                self.state.remote_epoch = self.state.remote_epoch.max(1);
                Ok(())
            }
            ContentType::Alert => self.handle_alert(&plaintext),
            ContentType::ApplicationData => {
                if epoch == 0 {
                    debug!("Drop unencrypted application data");
                } else {
                    self.app_data.push_back(plaintext);
                }
                Ok(())
            }
            ContentType::Unknown(v) => {
                debug!("Drop record with unknown content type {}", v);
                Ok(())
            }
        }
    }

    fn handle_handshake(
        &mut self,
        mut input: &[u8],
        epoch: u16,
        progress: &mut Progress,
    ) -> Result<(), Error> {
        while !input.is_empty() {
            let (rest, pushed) = match self.fragments.push(input) {
                Ok(v) => v,
                Err(Error::FragmentBufferFull) => {
                    debug!("Drop handshake fragment, buffer full");
                    return Ok(());
                }
                Err(e) => return Err(self.fail(e.into())),
            };
            input = rest;

            match pushed {
                Pushed::Incomplete => {}
                Pushed::Retransmit => progress.retransmit = true,
                Pushed::Complete(message) => self.handle_message(message, epoch, progress)?,
            }
        }
        Ok(())
    }

    fn handle_message(
        &mut self,
        message: Vec<u8>,
        epoch: u16,
        progress: &mut Progress,
    ) -> Result<(), Error> {
        let header = match Handshake::parse(&message) {
            Ok((_, handshake)) => handshake.header,
            Err(e) => return Err(self.fail(Error::from(e).into())),
        };

        if matches!(
            header.msg_type,
            MessageType::Unknown(_) | MessageType::HelloRequest
        ) {
            debug!("Ignore handshake message {:?}", header.msg_type);
            return Ok(());
        }

        if self.connected {
            debug!(
                "Ignore {:?} after handshake completed",
                header.msg_type
            );
            return Ok(());
        }

        if self
            .cache
            .push(message, epoch, header.message_seq, header.msg_type, false)
        {
            progress.new_messages = true;
        } else {
            progress.retransmit = true;
        }
        Ok(())
    }

    fn handle_alert(&mut self, plaintext: &[u8]) -> Result<(), Error> {
        let alert = match Alert::parse(plaintext) {
            Ok((_, alert)) => alert,
            Err(e) => return Err(self.fail(Error::from(e).into())),
        };

        if alert.description == AlertDescription::CloseNotify {
            debug!("Peer sent close_notify");
            if !self.closed {
                self.close();
            }
            return Ok(());
        }

        if alert.is_fatal() {
            warn!("Peer sent fatal alert {:?}", alert.description);
            let err = Error::Alert(alert);
            self.failed = Some(err.clone());
            self.flight_stop_resend_timers();
            return Err(err);
        }

        debug!("Ignore warning alert {:?}", alert.description);
        Ok(())
    }

    /// Run the current flight's parse until it stops making progress.
    fn advance(&mut self, mut progress: Progress) -> Result<(), Error> {
        let mut prepared = false;

        while progress.new_messages {
            progress.new_messages = false;

            let had_keys = self.state.keys.is_some();
            prepared |= self.parse_flight()?;

            if !had_keys && self.state.keys.is_some() && !self.queue_rx.is_empty() {
                debug!("Replay {} queued epoch 1 records", self.queue_rx.len());
                let queued = mem::take(&mut self.queue_rx);
                for raw in queued {
                    let record = match DTLSRecord::unmarshal(&raw) {
                        Ok(v) => v,
                        Err(e) => return Err(self.fail(e.into())),
                    };
                    self.handle_record(record, &mut progress)?;
                }
            }
        }

        if progress.retransmit && !prepared && self.answers_retransmit() {
            self.flight_resend("peer retransmission")?;
        }

        Ok(())
    }

    fn answers_retransmit(&self) -> bool {
        if self.state.is_client {
            return false;
        }
        match self.flight {
            Flight::Flight2 => true,
            Flight::Flight6 => self.connected,
            _ => false,
        }
    }

    /// Returns true if a new flight was prepared.
    fn parse_flight(&mut self) -> Result<bool, Error> {
        let (_, parse) = self.flight.handlers();

        match parse(&mut self.state, &self.cache, &self.config) {
            Err(e) => Err(self.fail(e)),
            Ok(Next::Stay) => Ok(false),
            Ok(Next::Connected) => {
                self.handshake_complete();
                Ok(false)
            }
            Ok(Next::Flight(next)) => {
                debug!("Flight {:?} -> {:?}", self.flight, next);
                self.prepare(next)?;
                Ok(true)
            }
        }
    }

    /// Enter a flight and queue its packets.
    fn prepare(&mut self, flight: Flight) -> Result<(), Error> {
        self.flight = flight;
        self.flight_begin(flight);

        let (generate, _) = flight.handlers();
        let packets = match generate(&mut self.state, &mut self.cache, &self.config) {
            Ok(v) => v,
            Err(e) => return Err(self.fail(e)),
        };

        for packet in packets {
            if packet.epoch > self.state.local_epoch {
                self.state.local_epoch = packet.epoch;
            }
            let result = match packet.content_type {
                ContentType::Handshake => self.create_handshake(packet.epoch, &packet.data),
                _ => self.create_record(packet.content_type, packet.epoch, true, &packet.data),
            };
            if let Err(e) = result {
                return Err(self.fail(e.into()));
            }
        }

        if flight.is_last_send() {
            self.handshake_complete();
        }

        Ok(())
    }

    fn handshake_complete(&mut self) {
        if self.connected {
            return;
        }
        info!(
            "Handshake complete ({}) {:?}",
            if self.state.is_client {
                "client"
            } else {
                "server"
            },
            self.state.cipher_suite
        );
        self.connected = true;
        self.connected_pending = true;
        self.flight_stop_resend_timers();
    }

    /// Send a fatal alert, mark the connection failed and return the error.
    fn fail(&mut self, e: FlightError) -> Error {
        let alert = e.alert;
        let err = e.into_error();
        warn!("Connection failed, sending {:?}: {}", alert.description, err);

        let epoch = if self.state.keys.is_some() && self.state.local_epoch >= 1 {
            1
        } else {
            0
        };
        let mut body = Vec::with_capacity(2);
        alert.serialize(&mut body);
        if let Err(send_err) = self.create_record(ContentType::Alert, epoch, false, &body) {
            debug!("Could not queue alert: {}", send_err);
        }

        self.failed = Some(err.clone());
        self.flight_stop_resend_timers();
        err
    }

    /// Drive the retransmit and handshake timers.
    pub fn handle_timeout(&mut self, now: Instant) -> Result<(), Error> {
        self.check_usable()?;
        self.arm_timers(now);

        if let Timeout::Armed(connect_timeout) = self.connect_timeout {
            if now >= connect_timeout {
                let err = Error::Timeout("connect");
                self.failed = Some(err.clone());
                self.flight_stop_resend_timers();
                return Err(err);
            }
        }

        let Timeout::Armed(flight_timeout) = self.flight_timeout else {
            return Ok(());
        };

        if now >= flight_timeout {
            if self.flight_backoff.can_retry() {
                self.flight_backoff.attempt(&mut self.rng);
                debug!(
                    "Re-arm flight timeout due to resend in {:.03}s",
                    self.flight_backoff.rto().as_secs_f32()
                );
                self.flight_timeout = Timeout::Armed(now + self.flight_backoff.rto());
                self.flight_resend("flight timeout")?;
            } else {
                let err = Error::Timeout("handshake");
                self.failed = Some(err.clone());
                self.flight_stop_resend_timers();
                return Err(err);
            }
        }

        Ok(())
    }

    fn arm_timers(&mut self, now: Instant) {
        if self.connect_timeout == Timeout::Unarmed {
            debug!(
                "Connect timeout in: {:.03}s",
                self.config.handshake_timeout().as_secs_f32()
            );
            self.connect_timeout = Timeout::Armed(now + self.config.handshake_timeout());
        }
        if self.flight_timeout == Timeout::Unarmed {
            trace!(
                "Flight timeout in: {:.03}s",
                self.flight_backoff.rto().as_secs_f32()
            );
            self.flight_timeout = Timeout::Armed(now + self.flight_backoff.rto());
        }
    }

    /// Next thing to do. Call repeatedly until it returns [`Output::Timeout`].
    pub fn poll_output(&mut self, now: Instant) -> Output {
        self.arm_timers(now);

        if let Some(p) = self.queue_tx.pop_front() {
            return Output::Packet(p);
        }

        if self.connected_pending {
            self.connected_pending = false;
            return Output::Connected;
        }

        if self.connected {
            if let Some(data) = self.app_data.pop_front() {
                return Output::ApplicationData(data);
            }
        }

        Output::Timeout(self.poll_timeout(now))
    }

    fn poll_timeout(&self, now: Instant) -> Instant {
        const DISTANT_FUTURE: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

        match (self.connect_timeout, self.flight_timeout) {
            (Timeout::Armed(c), Timeout::Armed(f)) => c.min(f),
            (Timeout::Armed(c), _) => c,
            (_, Timeout::Armed(f)) => f,
            _ => now + DISTANT_FUTURE,
        }
    }

    /// Encrypt and queue application data. One call is one record.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.check_usable()?;
        if self.closed {
            return Err(Error::Closed);
        }
        if !self.connected {
            return Err(Error::HandshakeInProgress);
        }

        let max = (self.config.mtu() - RECORD_HEADER_LEN - DTLS_AEAD_OVERHEAD).min(MAX_PLAINTEXT_LEN);
        if data.len() > max {
            return Err(Error::DataTooLarge(data.len()));
        }

        self.create_record(ContentType::ApplicationData, 1, false, data)
    }

    /// Close the connection, sending close_notify if the handshake completed.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.flight_stop_resend_timers();

        if self.connected && self.failed.is_none() {
            debug!("Send close_notify");
            let mut body = Vec::with_capacity(2);
            Alert::close_notify().serialize(&mut body);
            if let Err(e) = self.create_record(ContentType::Alert, 1, false, &body) {
                debug!("Could not queue close_notify: {}", e);
            }
        }
    }

    fn flight_begin(&mut self, flight: Flight) {
        debug!("Begin flight {:?}", flight);
        self.flight_backoff.reset(&mut self.rng);
        self.flight_saved_records.clear();
        self.flight_timeout = if flight.has_retransmit() {
            Timeout::Unarmed
        } else {
            Timeout::Disabled
        };
    }

    fn flight_stop_resend_timers(&mut self) {
        trace!("Stop connect and flight timeouts");
        self.flight_timeout = Timeout::Disabled;
        self.connect_timeout = Timeout::Disabled;
    }

    fn flight_resend(&mut self, reason: &str) -> Result<(), Error> {
        debug!("Resending flight {:?} due to {}", self.flight, reason);
        // For lifetime issues, we take the entries out of self
        let records = mem::take(&mut self.flight_saved_records);

        let mut result = Ok(());
        for entry in &records {
            result = self.create_record(entry.content_type, entry.epoch, false, &entry.fragment);
            if result.is_err() {
                break;
            }
        }

        // Put the entries back into self
        self.flight_saved_records = records;

        result
    }

    /// Fragment a handshake message to fit the MTU and queue its records.
    fn create_handshake(&mut self, epoch: u16, message: &[u8]) -> Result<(), Error> {
        let aead_overhead = if epoch >= 1 { DTLS_AEAD_OVERHEAD } else { 0 };
        let max_body =
            self.config.mtu() - RECORD_HEADER_LEN - HANDSHAKE_HEADER_LEN - aead_overhead;

        for fragment in Handshake::fragments(message, max_body) {
            self.create_record(ContentType::Handshake, epoch, true, &fragment)?;
        }
        Ok(())
    }

    /// Create a DTLS record and pack it into the outgoing datagrams.
    fn create_record(
        &mut self,
        content_type: ContentType,
        epoch: u16,
        save_fragment: bool,
        fragment: &[u8],
    ) -> Result<(), Error> {
        // Use this as a marker to know whether we are to record fragments for resends.
        if save_fragment {
            self.flight_saved_records.push(Entry {
                content_type,
                epoch,
                fragment: fragment.to_vec(),
            });
        }

        let overhead = if epoch >= 1 { DTLS_AEAD_OVERHEAD } else { 0 };
        let record_wire_len = RECORD_HEADER_LEN + fragment.len() + overhead;

        // Decide whether to append to the existing last datagram or create a new one
        let can_append = self
            .queue_tx
            .back()
            .map(|b| b.len() + record_wire_len <= self.config.mtu())
            .unwrap_or(false);

        if !can_append && self.queue_tx.len() >= self.config.max_queue_tx() {
            warn!(
                "Transmit queue full (max {})",
                self.config.max_queue_tx()
            );
            return Err(Error::TransmitQueueFull);
        }

        let sequence = if epoch == 0 {
            self.sequence_epoch_0
        } else {
            self.sequence_epoch_n
        };
        if sequence.sequence_number > Sequence::MAX_SEQUENCE_NUMBER {
            return Err(Error::CryptoError(format!(
                "Record sequence exhausted for epoch {}",
                epoch
            )));
        }

        let payload = if epoch >= 1 {
            // Random explicit part of the nonce
            let explicit_nonce: [u8; 8] = self.rng.gen();
            let Some(keys) = &self.state.keys else {
                return Err(Error::CryptoError("Epoch 1 keys not available".into()));
            };
            keys.seal(content_type, sequence, fragment, explicit_nonce)?
        } else {
            fragment.to_vec()
        };

        let record = marshal(content_type, sequence, &payload);

        // Increment the sequence number for the next transmission
        if epoch == 0 {
            self.sequence_epoch_0.sequence_number += 1;
        } else {
            self.sequence_epoch_n.sequence_number += 1;
        }

        match self.queue_tx.back_mut() {
            Some(last) if can_append => last.extend_from_slice(&record),
            _ => self.queue_tx.push_back(record),
        }

        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("flight", &self.flight)
            .field("state", &self.state)
            .field("connected", &self.connected)
            .field("closed", &self.closed)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::generate_self_signed_certificate;

    fn now() -> Instant {
        Instant::now()
    }

    fn engines() -> (Engine, Engine) {
        let _ = env_logger::try_init();
        let client = Config::builder().rng_seed(1).build().unwrap();
        let server = Config::builder()
            .certificate(generate_self_signed_certificate().unwrap())
            .rng_seed(2)
            .build()
            .unwrap();
        (
            Engine::new(Arc::new(client), true).unwrap(),
            Engine::new(Arc::new(server), false).unwrap(),
        )
    }

    fn packets(engine: &mut Engine, now: Instant) -> Vec<Vec<u8>> {
        drain(engine, now).0
    }

    /// Poll until timeout, splitting packets from other output.
    fn drain(engine: &mut Engine, now: Instant) -> (Vec<Vec<u8>>, Vec<Output>) {
        let mut packets = Vec::new();
        let mut events = Vec::new();
        loop {
            match engine.poll_output(now) {
                Output::Packet(p) => packets.push(p),
                Output::Timeout(_) => return (packets, events),
                other => events.push(other),
            }
        }
    }

    #[test]
    fn server_needs_certificate() {
        let config = Arc::new(Config::default());
        assert!(matches!(
            Engine::new(config.clone(), false),
            Err(Error::ConfigError(_))
        ));
        assert!(Engine::new(config, true).is_ok());
    }

    #[test]
    fn client_starts_with_client_hello() {
        let (mut client, mut server) = engines();
        let t = now();
        client.start(t).unwrap();
        server.start(t).unwrap();

        let out = packets(&mut client, t);
        assert_eq!(out.len(), 1);
        let record = DTLSRecord::unmarshal(&out[0]).unwrap();
        assert_eq!(record.content_type, ContentType::Handshake);
        assert_eq!(record.sequence, Sequence::new(0, 0));

        // A server sends nothing until it hears from the client.
        assert!(packets(&mut server, t).is_empty());
        assert!(matches!(server.poll_output(t), Output::Timeout(_)));
    }

    #[test]
    fn no_application_data_before_connected() {
        let (mut client, _) = engines();
        client.start(now()).unwrap();
        assert!(matches!(
            client.send_application_data(b"early"),
            Err(Error::HandshakeInProgress)
        ));
        assert!(matches!(
            client.export_keying_material("EXPERIMENTAL", 16),
            Err(Error::HandshakeInProgress)
        ));
    }

    #[test]
    fn garbage_datagram_fails_with_decode_error() {
        let (_, mut server) = engines();
        let t = now();
        server.start(t).unwrap();

        let err = server.handle_packet(&[22, 0xFE, 0xFD, 0, 0], t).unwrap_err();
        assert!(matches!(err, Error::ParseError(_) | Error::ParseIncomplete));

        let out = packets(&mut server, t);
        assert_eq!(out.len(), 1);
        let record = DTLSRecord::unmarshal(&out[0]).unwrap();
        assert_eq!(record.content_type, ContentType::Alert);
        let (_, alert) = Alert::parse(record.fragment).unwrap();
        assert_eq!(alert.description, AlertDescription::DecodeError);
        assert!(alert.is_fatal());

        // The failure sticks.
        assert!(server.handle_timeout(t).is_err());
    }

    #[test]
    fn handshake_in_memory() {
        let (mut client, mut server) = engines();
        let t = now();
        client.start(t).unwrap();
        server.start(t).unwrap();

        let mut client_events = Vec::new();
        let mut server_events = Vec::new();
        for _ in 0..10 {
            let (out, events) = drain(&mut client, t);
            client_events.extend(events);
            for p in out {
                server.handle_packet(&p, t).unwrap();
            }
            let (out, events) = drain(&mut server, t);
            server_events.extend(events);
            for p in out {
                client.handle_packet(&p, t).unwrap();
            }
        }

        assert!(client.is_connected());
        assert!(server.is_connected());
        assert_eq!(client_events, vec![Output::Connected]);
        assert_eq!(server_events, vec![Output::Connected]);

        let a = client.export_keying_material("EXPERIMENTAL", 20).unwrap();
        let b = server.export_keying_material("EXPERIMENTAL", 20).unwrap();
        assert_eq!(&*a, &*b);

        client.send_application_data(b"hello").unwrap();
        for p in packets(&mut client, t) {
            server.handle_packet(&p, t).unwrap();
        }
        assert_eq!(
            server.poll_output(t),
            Output::ApplicationData(b"hello".to_vec())
        );
    }

    #[test]
    fn flight_timer_resends_client_hello() {
        let (mut client, _) = engines();
        let t = now();
        client.start(t).unwrap();
        let first = packets(&mut client, t);

        let Output::Timeout(deadline) = client.poll_output(t) else {
            panic!("expected timeout");
        };
        assert!(deadline > t);

        client.handle_timeout(deadline).unwrap();
        let resent = packets(&mut client, deadline);
        assert_eq!(resent.len(), 1);

        // Same handshake message, new record sequence number.
        let a = DTLSRecord::unmarshal(&first[0]).unwrap();
        let b = DTLSRecord::unmarshal(&resent[0]).unwrap();
        assert_eq!(a.fragment, b.fragment);
        assert_eq!(b.sequence.sequence_number, a.sequence.sequence_number + 1);
    }
}
