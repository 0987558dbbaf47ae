use crate::cache::HandshakeCache;
use crate::config::{Config, ExtendedMasterSecretPolicy};
use crate::crypto::Keypair;
use crate::message::{AlertDescription, Body, ClientHello, Cookie, MessageType};
use crate::message::{ProtocolVersion, Random};
use crate::state::State;
use crate::Error;

use super::{next_floor, remote, select_cipher_suite, select_curve, select_srtp_profile};
use super::{Flight, FlightError, Next, Packet, COOKIE_LEN};

pub(super) fn generate(
    state: &mut State,
    _cache: &mut HandshakeCache,
    _config: &Config,
) -> Result<Vec<Packet>, FlightError> {
    state.local_epoch = 0;
    state.remote_epoch = 0;

    if state.cookie.is_none() {
        state.cookie = Some(Cookie::generate(COOKIE_LEN)?);
    }
    if state.local_random.is_none() {
        state.local_random = Some(Random::generate()?);
    }

    Ok(Vec::new())
}

pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    config: &Config,
) -> Result<Next, FlightError> {
    let rules = [remote(MessageType::ClientHello, 0, false)];
    let Some(pulled) = cache.full_pull_map(0, &rules) else {
        return Ok(Next::Stay);
    };

    let Some(Body::ClientHello(hello)) = pulled.messages.get(&MessageType::ClientHello) else {
        return Err(FlightError::internal());
    };

    negotiate(state, config, hello)?;
    state.handshake_recv_sequence = next_floor(pulled.max_sequence, 0);

    Ok(Next::Flight(Flight::Flight2))
}

/// Only DTLS 1.2 hellos are accepted, whatever the cookie says.
pub(super) fn check_client_version(hello: &ClientHello<'_>) -> Result<(), FlightError> {
    if hello.client_version != ProtocolVersion::DTLS1_2 {
        return Err(FlightError::fatal(
            AlertDescription::ProtocolVersion,
            Error::UnsupportedProtocolVersion,
        ));
    }
    Ok(())
}

/// Pick the connection parameters from a ClientHello.
pub(super) fn negotiate(
    state: &mut State,
    config: &Config,
    hello: &ClientHello<'_>,
) -> Result<(), FlightError> {
    check_client_version(hello)?;

    state.remote_random = Some(hello.random);

    let suite = select_cipher_suite(&hello.cipher_suites, config.cipher_suites())
        .ok_or(Error::CipherSuiteNoIntersection)?;

    let curve = hello
        .supported_groups()
        .and_then(|ext| select_curve(&ext.groups, config.named_curves()))
        .ok_or(Error::NoSupportedEllipticCurves)?;

    if let Some(signing_key) = config.signing_key() {
        let algorithm = signing_key.algorithm();
        let accepted = hello
            .signature_algorithms()
            .map(|ext| ext.contains(algorithm))
            .unwrap_or(true);
        if !accepted {
            return Err(Error::SignatureAlgorithmNoIntersection.into());
        }
    }

    state.srtp_profile = match hello.use_srtp() {
        Some(ext) => Some(
            select_srtp_profile(&ext.profiles, config.srtp_profiles())
                .ok_or(Error::ServerNoMatchingSrtpProfile)?,
        ),
        None => None,
    };

    state.extended_master_secret = match config.extended_master_secret() {
        ExtendedMasterSecretPolicy::Disable => false,
        ExtendedMasterSecretPolicy::Request => hello.has_extended_master_secret(),
        ExtendedMasterSecretPolicy::Require => {
            if !hello.has_extended_master_secret() {
                return Err(Error::ServerRequiredButNoClientEms.into());
            }
            true
        }
    };

    state.server_name = hello.server_name().map(str::to_string);
    state.cipher_suite = Some(suite);
    state.named_curve = Some(curve);

    let needs_keypair = state
        .local_keypair
        .as_ref()
        .map(|k| k.curve() != curve)
        .unwrap_or(true);
    if needs_keypair {
        state.local_keypair = Some(Keypair::generate(curve)?);
    }

    debug!(
        "Negotiated {:?} {:?} srtp: {:?} extended master secret: {}",
        suite, curve, state.srtp_profile, state.extended_master_secret
    );

    Ok(())
}
