//! The handshake as a sequence of flights.
//!
//! ```text
//! Client                                   Server
//!
//! Flight1  ClientHello          -------->            Flight0
//!                               <--------  HelloVerifyRequest  Flight2
//! Flight3  ClientHello + cookie -------->
//!                                          ServerHello          Flight4
//!                                          Certificate
//!                                          ServerKeyExchange
//!                                          CertificateRequest*
//!                               <--------  ServerHelloDone
//! Flight5  Certificate*
//!          ClientKeyExchange
//!          CertificateVerify*
//!          ChangeCipherSpec
//!          Finished             -------->
//!                                          ChangeCipherSpec     Flight6
//!                               <--------  Finished
//! ```
//!
//! Every flight has a generate function producing the packets to send and a
//! parse function that inspects the handshake cache and decides what comes
//! next. Generate runs once when the flight is entered. Parse runs whenever
//! new peer messages have been cached.

use crate::cache::{HandshakeCache, PullRule};
use crate::config::Config;
use crate::crypto::SrtpProfile;
use crate::message::{Alert, AlertDescription, Body, CipherSuite, ContentType, Handshake};
use crate::message::{MessageType, NamedCurve, SrtpProfileId};
use crate::state::State;
use crate::Error;

mod flight0;
mod flight1;
mod flight2;
mod flight3;
mod flight4;
mod flight5;
mod flight6;

#[cfg(test)]
mod tests;

/// Length of the cookie a server hands out in HelloVerifyRequest.
pub(crate) const COOKIE_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flight {
    /// Server waiting for the first ClientHello.
    Flight0,
    /// Client sends ClientHello without cookie.
    Flight1,
    /// Server sends HelloVerifyRequest.
    Flight2,
    /// Client sends ClientHello with cookie.
    Flight3,
    /// Server sends ServerHello through ServerHelloDone.
    Flight4,
    /// Client sends its key exchange and Finished.
    Flight5,
    /// Server sends ChangeCipherSpec and Finished.
    Flight6,
}

pub(crate) type GenerateFn =
    fn(&mut State, &mut HandshakeCache, &Config) -> Result<Vec<Packet>, FlightError>;

pub(crate) type ParseFn = fn(&mut State, &HandshakeCache, &Config) -> Result<Next, FlightError>;

impl Flight {
    pub fn initial(is_client: bool) -> Self {
        if is_client {
            Flight::Flight1
        } else {
            Flight::Flight0
        }
    }

    pub fn handlers(self) -> (GenerateFn, ParseFn) {
        match self {
            Flight::Flight0 => (flight0::generate, flight0::parse),
            Flight::Flight1 => (flight1::generate, flight1::parse),
            Flight::Flight2 => (flight2::generate, flight2::parse),
            Flight::Flight3 => (flight3::generate, flight3::parse),
            Flight::Flight4 => (flight4::generate, flight4::parse),
            Flight::Flight5 => (flight5::generate, flight5::parse),
            Flight::Flight6 => (flight6::generate, flight6::parse),
        }
    }

    /// Sending this flight completes the handshake.
    pub fn is_last_send(self) -> bool {
        matches!(self, Flight::Flight6)
    }

    /// Whether a timer resends this flight until the peer answers.
    ///
    /// Flights 2 and 6 are only resent when the peer retransmits.
    pub fn has_retransmit(self) -> bool {
        matches!(
            self,
            Flight::Flight1 | Flight::Flight3 | Flight::Flight4 | Flight::Flight5
        )
    }
}

/// Outcome of a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Next {
    /// Not enough messages yet.
    Stay,
    /// Enter another flight. May be the current one, which regenerates it.
    Flight(Flight),
    /// The peer's final flight verified.
    Connected,
}

/// A handshake failure and the alert to tell the peer about it.
#[derive(Debug)]
pub(crate) struct FlightError {
    pub alert: Alert,
    pub error: Option<Error>,
}

impl FlightError {
    pub fn fatal(description: AlertDescription, error: Error) -> Self {
        FlightError {
            alert: Alert::fatal(description),
            error: Some(error),
        }
    }

    /// A local inconsistency. The peer gets internal_error.
    pub fn internal() -> Self {
        FlightError {
            alert: Alert::fatal(AlertDescription::InternalError),
            error: None,
        }
    }

    pub fn into_error(self) -> Error {
        match self.error {
            Some(e) => e,
            None => Error::AlertSent(self.alert.description),
        }
    }
}

impl From<Error> for FlightError {
    fn from(error: Error) -> Self {
        FlightError {
            alert: Alert::fatal(error.alert_description()),
            error: Some(error),
        }
    }
}

/// One message produced by a generate step, before record framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Packet {
    pub content_type: ContentType,
    pub epoch: u16,
    /// A complete handshake message, or the raw record payload otherwise.
    pub data: Vec<u8>,
}

/// Number the message, cache it as sent and wrap it for the record layer.
pub(crate) fn handshake_packet(
    state: &mut State,
    cache: &mut HandshakeCache,
    epoch: u16,
    body: Body<'_>,
) -> Packet {
    let message_seq = state.handshake_send_sequence;
    state.handshake_send_sequence = message_seq.wrapping_add(1);

    let msg_type = body.message_type();
    let data = Handshake::new(message_seq, body).marshal();
    cache.push(data.clone(), epoch, message_seq, msg_type, true);

    Packet {
        content_type: ContentType::Handshake,
        epoch,
        data,
    }
}

pub(crate) fn change_cipher_spec_packet() -> Packet {
    Packet {
        content_type: ContentType::ChangeCipherSpec,
        epoch: 0,
        data: vec![1],
    }
}

/// First suite in the peer's list that we also allow.
pub(crate) fn select_cipher_suite(
    offered: &[CipherSuite],
    local: &[CipherSuite],
) -> Option<CipherSuite> {
    offered
        .iter()
        .copied()
        .find(|s| s.is_supported() && local.contains(s))
}

pub(crate) fn select_curve(offered: &[NamedCurve], local: &[NamedCurve]) -> Option<NamedCurve> {
    offered
        .iter()
        .copied()
        .find(|c| c.is_supported() && local.contains(c))
}

pub(crate) fn select_srtp_profile(
    offered: &[SrtpProfileId],
    local: &[SrtpProfile],
) -> Option<SrtpProfile> {
    offered
        .iter()
        .filter_map(|id| SrtpProfile::from_id(*id))
        .find(|p| local.contains(p))
}

/// Where a transcript ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TranscriptEnd {
    /// Through ClientKeyExchange. Input to the extended master secret and
    /// to the CertificateVerify signature.
    ClientKeyExchange,
    /// Through CertificateVerify. Input to the client Finished.
    CertificateVerify,
    /// Through the client Finished. Input to the server Finished.
    ClientFinished,
}

/// Handshake messages covered by Finished and CertificateVerify, in order.
/// The flag is true for messages sent by the client.
const TRANSCRIPT: &[(MessageType, u16, bool)] = &[
    (MessageType::ClientHello, 0, true),
    (MessageType::ServerHello, 0, false),
    (MessageType::Certificate, 0, false),
    (MessageType::ServerKeyExchange, 0, false),
    (MessageType::CertificateRequest, 0, false),
    (MessageType::ServerHelloDone, 0, false),
    (MessageType::Certificate, 0, true),
    (MessageType::ClientKeyExchange, 0, true),
    (MessageType::CertificateVerify, 0, true),
    (MessageType::Finished, 1, true),
];

/// Concatenated handshake messages up to `end`.
///
/// HelloVerifyRequest and the cookie-less ClientHello are not part of the
/// transcript. The newest ClientHello is used.
pub(crate) fn transcript(cache: &HandshakeCache, is_client: bool, end: TranscriptEnd) -> Vec<u8> {
    let count = match end {
        TranscriptEnd::ClientKeyExchange => 8,
        TranscriptEnd::CertificateVerify => 9,
        TranscriptEnd::ClientFinished => 10,
    };

    let rules: Vec<PullRule> = TRANSCRIPT[..count]
        .iter()
        .map(|&(msg_type, epoch, from_client)| {
            PullRule::new(msg_type, epoch, from_client == is_client, true)
        })
        .collect();

    cache.pull_and_merge(&rules)
}

/// Rule for a message the peer sends.
pub(crate) const fn remote(msg_type: MessageType, epoch: u16, optional: bool) -> PullRule {
    PullRule::new(msg_type, epoch, false, optional)
}

/// Bytes signed in ServerKeyExchange.
pub(crate) fn server_key_exchange_signed_data(
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    params: &[u8],
) -> Vec<u8> {
    let mut data = Vec::with_capacity(64 + params.len());
    data.extend_from_slice(client_random);
    data.extend_from_slice(server_random);
    data.extend_from_slice(params);
    data
}

/// Next receive floor after a pull that matched up to `max_sequence`.
pub(crate) fn next_floor(max_sequence: Option<u16>, floor: u16) -> u16 {
    max_sequence.map(|s| s.wrapping_add(1)).unwrap_or(floor)
}
