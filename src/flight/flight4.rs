use tinyvec::ArrayVec;

use crate::cache::HandshakeCache;
use crate::config::Config;
use crate::crypto::{prf, verify_signature};
use crate::message::{AlertDescription, Body, Certificate, CertificateRequest, DigitallySigned};
use crate::message::{ECPointFormatsExtension, Extension, MessageType, ServerHello};
use crate::message::{ServerKeyExchange, UseSrtpExtension};
use crate::state::State;
use crate::Error;

use super::{handshake_packet, next_floor, remote, server_key_exchange_signed_data};
use super::{transcript, Flight, FlightError, Next, Packet, TranscriptEnd};

pub(super) fn generate(
    state: &mut State,
    cache: &mut HandshakeCache,
    config: &Config,
) -> Result<Vec<Packet>, FlightError> {
    let suite = state.cipher_suite()?;
    let (Some(local_random), Some(remote_random)) = (state.local_random, state.remote_random)
    else {
        return Err(FlightError::internal());
    };
    let (Some(certificate), Some(signing_key)) = (config.certificate(), config.signing_key())
    else {
        return Err(Error::ConfigError("Server requires a certificate".into()).into());
    };
    let Some(keypair) = &state.local_keypair else {
        return Err(FlightError::internal());
    };

    let curve = keypair.curve();
    let public_key = keypair.public_key().to_vec();

    let mut params = Vec::new();
    ServerKeyExchange::serialize_params(curve, &public_key, &mut params);
    let signed_data = server_key_exchange_signed_data(
        &remote_random.to_bytes(),
        &local_random.to_bytes(),
        &params,
    );
    let signature = signing_key.sign(&signed_data)?;

    let mut extensions = ArrayVec::new();
    extensions.push(Extension::RenegotiationInfo);
    if state.extended_master_secret {
        extensions.push(Extension::ExtendedMasterSecret);
    }
    if let Some(profile) = state.srtp_profile {
        let mut profiles = ArrayVec::new();
        profiles.push(profile.id());
        extensions.push(Extension::UseSrtp(UseSrtpExtension::new(profiles)));
    }
    extensions.push(Extension::EcPointFormats(ECPointFormatsExtension::default()));

    let mut packets = Vec::with_capacity(5);

    let server_hello = ServerHello::new(local_random, suite, extensions);
    packets.push(handshake_packet(
        state,
        cache,
        0,
        Body::ServerHello(server_hello),
    ));

    let chain = Certificate::new(certificate.certificate_chain.iter().map(|c| c.as_slice()));
    packets.push(handshake_packet(state, cache, 0, Body::Certificate(chain)));

    let signed = DigitallySigned::new(signing_key.algorithm(), &signature);
    let ske = ServerKeyExchange::new(curve, &public_key, signed);
    packets.push(handshake_packet(
        state,
        cache,
        0,
        Body::ServerKeyExchange(ske),
    ));

    if config.require_client_certificate() {
        packets.push(handshake_packet(
            state,
            cache,
            0,
            Body::CertificateRequest(CertificateRequest::ecdsa()),
        ));
    }

    packets.push(handshake_packet(state, cache, 0, Body::ServerHelloDone));

    Ok(packets)
}

pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    config: &Config,
) -> Result<Next, FlightError> {
    let floor = state.handshake_recv_sequence;

    // Keys must exist before the encrypted Finished can be read.
    if state.keys.is_none() {
        let rules = [
            remote(MessageType::Certificate, 0, true),
            remote(MessageType::ClientKeyExchange, 0, false),
        ];
        let Some(pulled) = cache.full_pull_map(floor, &rules) else {
            return Ok(Next::Stay);
        };

        if let Some(Body::Certificate(chain)) = pulled.messages.get(&MessageType::Certificate) {
            if !chain.certificate_list.is_empty() {
                config
                    .cert_verifier()
                    .verify(&chain.certificate_list)
                    .map_err(|e| FlightError::fatal(AlertDescription::BadCertificate, e))?;
            }
            state.peer_certificates = chain.certificate_list.iter().map(|c| c.to_vec()).collect();
        }

        if config.require_client_certificate() && state.peer_certificates.is_empty() {
            return Err(Error::ClientCertificateRequired.into());
        }

        let Some(Body::ClientKeyExchange(cke)) =
            pulled.messages.get(&MessageType::ClientKeyExchange)
        else {
            return Err(FlightError::internal());
        };
        let Some(keypair) = &state.local_keypair else {
            return Err(FlightError::internal());
        };

        let pre_master_secret = keypair
            .compute_shared_secret(cke.public_key)
            .map_err(|e| FlightError::fatal(AlertDescription::IllegalParameter, e))?;
        state.remote_public_key = Some(cke.public_key.to_vec());

        let session_hash = if state.extended_master_secret {
            let suite = state.cipher_suite()?;
            let messages = transcript(cache, false, TranscriptEnd::ClientKeyExchange);
            prf::hash(suite.hash_algorithm(), &messages)?
        } else {
            Vec::new()
        };

        state.init_cipher_suite(&pre_master_secret, &session_hash)?;
    }

    let rules = [
        remote(MessageType::Certificate, 0, true),
        remote(MessageType::ClientKeyExchange, 0, false),
        remote(MessageType::CertificateVerify, 0, true),
        remote(MessageType::Finished, 1, false),
    ];
    let Some(pulled) = cache.full_pull_map(floor, &rules) else {
        return Ok(Next::Stay);
    };

    if let Some(leaf) = state.peer_certificates.first() {
        let Some(Body::CertificateVerify(verify)) =
            pulled.messages.get(&MessageType::CertificateVerify)
        else {
            return Err(FlightError::fatal(
                AlertDescription::DecryptError,
                Error::InvalidSignature,
            ));
        };
        let signed = transcript(cache, false, TranscriptEnd::ClientKeyExchange);
        verify_signature(
            leaf,
            &signed,
            verify.signed.signature,
            verify.signed.algorithm,
        )?;
    }

    let Some(Body::Finished(finished)) = pulled.messages.get(&MessageType::Finished) else {
        return Err(FlightError::internal());
    };

    let suite = state.cipher_suite()?;
    let Some(master_secret) = &state.master_secret else {
        return Err(FlightError::internal());
    };
    let messages = transcript(cache, false, TranscriptEnd::CertificateVerify);
    let expected = prf::verify_data(master_secret, true, &messages, suite.hash_algorithm())?;
    if !finished.matches(&expected) {
        return Err(Error::VerifyDataMismatch.into());
    }

    state.handshake_recv_sequence = next_floor(pulled.max_sequence, floor);

    Ok(Next::Flight(Flight::Flight6))
}
