use crate::cache::HandshakeCache;
use crate::config::{Config, ExtendedMasterSecretPolicy};
use crate::crypto::{verify_signature, Keypair, SrtpProfile};
use crate::message::{AlertDescription, Body, MessageType, ProtocolVersion};
use crate::state::State;
use crate::Error;

use super::flight1::{accept_hello_verify_version, client_hello_packet};
use super::{next_floor, remote, server_key_exchange_signed_data, Flight, FlightError, Next};
use super::Packet;

pub(super) fn generate(
    state: &mut State,
    cache: &mut HandshakeCache,
    config: &Config,
) -> Result<Vec<Packet>, FlightError> {
    let Some(cookie) = state.cookie else {
        return Err(FlightError::internal());
    };
    Ok(vec![client_hello_packet(state, cache, config, cookie)?])
}

pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    config: &Config,
) -> Result<Next, FlightError> {
    let floor = state.handshake_recv_sequence;

    // A server may send another HelloVerifyRequest with a new cookie.
    let rules = [remote(MessageType::HelloVerifyRequest, 0, false)];
    if let Some(pulled) = cache.full_pull_map(floor, &rules) {
        if let Some(Body::HelloVerifyRequest(hvr)) =
            pulled.messages.get(&MessageType::HelloVerifyRequest)
        {
            accept_hello_verify_version(hvr.server_version)?;
            debug!("New cookie from repeated HelloVerifyRequest");
            state.cookie = Some(hvr.cookie);
            state.handshake_recv_sequence = next_floor(pulled.max_sequence, floor);
            return Ok(Next::Flight(Flight::Flight3));
        }
    }

    let rules = [
        remote(MessageType::ServerHello, 0, false),
        remote(MessageType::Certificate, 0, false),
        remote(MessageType::ServerKeyExchange, 0, false),
        remote(MessageType::CertificateRequest, 0, true),
        remote(MessageType::ServerHelloDone, 0, false),
    ];
    let Some(pulled) = cache.full_pull_map(floor, &rules) else {
        return Ok(Next::Stay);
    };

    let (
        Some(Body::ServerHello(hello)),
        Some(Body::Certificate(chain)),
        Some(Body::ServerKeyExchange(ske)),
    ) = (
        pulled.messages.get(&MessageType::ServerHello),
        pulled.messages.get(&MessageType::Certificate),
        pulled.messages.get(&MessageType::ServerKeyExchange),
    )
    else {
        return Err(FlightError::internal());
    };

    if hello.server_version != ProtocolVersion::DTLS1_2 {
        return Err(FlightError::fatal(
            AlertDescription::ProtocolVersion,
            Error::UnsupportedProtocolVersion,
        ));
    }

    let suite = hello.cipher_suite;
    if !suite.is_supported() || !config.cipher_suites().contains(&suite) {
        return Err(Error::CipherSuiteNoIntersection.into());
    }

    state.srtp_profile = match hello.use_srtp() {
        Some(ext) => {
            let selected = match ext.profiles.as_slice() {
                [id] => SrtpProfile::from_id(*id).filter(|p| config.srtp_profiles().contains(p)),
                _ => None,
            };
            if selected.is_none() {
                return Err(FlightError::fatal(
                    AlertDescription::IllegalParameter,
                    Error::ServerNoMatchingSrtpProfile,
                ));
            }
            selected
        }
        None => None,
    };
    if !config.srtp_profiles().is_empty() && state.srtp_profile.is_none() {
        return Err(Error::ServerNoMatchingSrtpProfile.into());
    }

    state.extended_master_secret = match config.extended_master_secret() {
        ExtendedMasterSecretPolicy::Disable => false,
        ExtendedMasterSecretPolicy::Request => hello.has_extended_master_secret(),
        ExtendedMasterSecretPolicy::Require => {
            if !hello.has_extended_master_secret() {
                return Err(Error::ClientRequiredButNoServerEms.into());
            }
            true
        }
    };

    let Some(leaf) = chain.leaf() else {
        return Err(FlightError::fatal(
            AlertDescription::BadCertificate,
            Error::CertificateRejected("Empty server certificate".into()),
        ));
    };
    config
        .cert_verifier()
        .verify(&chain.certificate_list)
        .map_err(|e| FlightError::fatal(AlertDescription::BadCertificate, e))?;

    let curve = ske.named_curve;
    if !curve.is_supported() || !config.named_curves().contains(&curve) {
        return Err(FlightError::fatal(
            AlertDescription::IllegalParameter,
            Error::NoSupportedEllipticCurves,
        ));
    }

    let Some(local_random) = state.local_random else {
        return Err(FlightError::internal());
    };
    let signed_data = server_key_exchange_signed_data(
        &local_random.to_bytes(),
        &hello.random.to_bytes(),
        &ske.params(),
    );
    verify_signature(leaf, &signed_data, ske.signed.signature, ske.signed.algorithm)?;

    state.remote_random = Some(hello.random);
    state.cipher_suite = Some(suite);
    state.named_curve = Some(curve);
    state.remote_public_key = Some(ske.public_key.to_vec());
    state.peer_certificates = chain.certificate_list.iter().map(|c| c.to_vec()).collect();
    state.remote_requested_certificate =
        pulled.messages.contains_key(&MessageType::CertificateRequest);
    let needs_keypair = state
        .local_keypair
        .as_ref()
        .map(|k| k.curve() != curve)
        .unwrap_or(true);
    if needs_keypair {
        state.local_keypair = Some(Keypair::generate(curve)?);
    }
    state.handshake_recv_sequence = next_floor(pulled.max_sequence, floor);

    debug!(
        "Server selected {:?} {:?} srtp: {:?} extended master secret: {}",
        suite, curve, state.srtp_profile, state.extended_master_secret
    );

    Ok(Next::Flight(Flight::Flight5))
}
