use tinyvec::ArrayVec;

use crate::cache::HandshakeCache;
use crate::config::{Config, ExtendedMasterSecretPolicy};
use crate::message::{AlertDescription, Body, ClientHello, Cookie, ECPointFormatsExtension};
use crate::message::{Extension, MessageType, ProtocolVersion, Random, ServerNameExtension};
use crate::message::{SignatureAlgorithmsExtension, SupportedGroupsExtension, UseSrtpExtension};
use crate::state::State;
use crate::Error;

use super::flight3;
use super::{handshake_packet, next_floor, remote, Flight, FlightError, Next, Packet};

pub(super) fn generate(
    state: &mut State,
    cache: &mut HandshakeCache,
    config: &Config,
) -> Result<Vec<Packet>, FlightError> {
    state.local_epoch = 0;
    state.remote_epoch = 0;

    Ok(vec![client_hello_packet(
        state,
        cache,
        config,
        Cookie::empty(),
    )?])
}

pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    config: &Config,
) -> Result<Next, FlightError> {
    let floor = state.handshake_recv_sequence;
    let rules = [
        remote(MessageType::HelloVerifyRequest, 0, true),
        remote(MessageType::ServerHello, 0, true),
    ];
    let Some(pulled) = cache.full_pull_map(floor, &rules) else {
        return Ok(Next::Stay);
    };
    if pulled.max_sequence.is_none() {
        return Ok(Next::Stay);
    }

    if pulled.messages.contains_key(&MessageType::ServerHello) {
        // The server skipped HelloVerifyRequest.
        return flight3::parse(state, cache, config);
    }

    let Some(Body::HelloVerifyRequest(hvr)) =
        pulled.messages.get(&MessageType::HelloVerifyRequest)
    else {
        return Err(FlightError::internal());
    };

    accept_hello_verify_version(hvr.server_version)?;
    state.cookie = Some(hvr.cookie);
    state.handshake_recv_sequence = next_floor(pulled.max_sequence, floor);

    Ok(Next::Flight(Flight::Flight3))
}

/// Servers may answer with the DTLS 1.0 version in HelloVerifyRequest.
pub(super) fn accept_hello_verify_version(version: ProtocolVersion) -> Result<(), FlightError> {
    match version {
        ProtocolVersion::DTLS1_0 | ProtocolVersion::DTLS1_2 => Ok(()),
        _ => Err(FlightError::fatal(
            AlertDescription::ProtocolVersion,
            Error::UnsupportedProtocolVersion,
        )),
    }
}

pub(super) fn client_hello_packet(
    state: &mut State,
    cache: &mut HandshakeCache,
    config: &Config,
    cookie: Cookie,
) -> Result<Packet, FlightError> {
    let random = match state.local_random {
        Some(random) => random,
        None => {
            let random = Random::generate()?;
            state.local_random = Some(random);
            random
        }
    };

    let mut cipher_suites = ArrayVec::new();
    cipher_suites.extend(config.cipher_suites().iter().copied().take(64));

    let mut extensions = ArrayVec::new();
    if let Some(name) = config.server_name() {
        extensions.push(Extension::ServerName(ServerNameExtension::new(name)));
    }
    extensions.push(Extension::SupportedGroups(SupportedGroupsExtension::new(
        config.named_curves(),
    )));
    extensions.push(Extension::EcPointFormats(ECPointFormatsExtension::default()));
    extensions.push(Extension::SignatureAlgorithms(
        SignatureAlgorithmsExtension::default(),
    ));
    if !config.srtp_profiles().is_empty() {
        let mut profiles = ArrayVec::new();
        profiles.extend(config.srtp_profiles().iter().map(|p| p.id()));
        extensions.push(Extension::UseSrtp(UseSrtpExtension::new(profiles)));
    }
    if config.extended_master_secret() != ExtendedMasterSecretPolicy::Disable {
        extensions.push(Extension::ExtendedMasterSecret);
    }
    extensions.push(Extension::RenegotiationInfo);

    let hello = ClientHello::new(random, cookie, cipher_suites, extensions);
    Ok(handshake_packet(state, cache, 0, Body::ClientHello(hello)))
}
