use crate::cache::HandshakeCache;
use crate::config::Config;
use crate::crypto::prf;
use crate::message::{AlertDescription, Body, Certificate, CertificateVerify, ClientKeyExchange};
use crate::message::{DigitallySigned, Finished, MessageType};
use crate::state::State;
use crate::Error;

use super::{change_cipher_spec_packet, handshake_packet, next_floor, remote, transcript};
use super::{FlightError, Next, Packet, TranscriptEnd};

pub(super) fn generate(
    state: &mut State,
    cache: &mut HandshakeCache,
    config: &Config,
) -> Result<Vec<Packet>, FlightError> {
    let suite = state.cipher_suite()?;
    let (Some(keypair), Some(remote_public_key)) =
        (&state.local_keypair, &state.remote_public_key)
    else {
        return Err(FlightError::internal());
    };

    let pre_master_secret = keypair
        .compute_shared_secret(remote_public_key)
        .map_err(|e| FlightError::fatal(AlertDescription::IllegalParameter, e))?;
    let public_key = keypair.public_key().to_vec();

    let mut packets = Vec::with_capacity(5);

    // Answer a CertificateRequest, with an empty chain if we have nothing.
    let mut sent_certificate = false;
    if state.remote_requested_certificate {
        let chain = match config.certificate() {
            Some(c) => Certificate::new(c.certificate_chain.iter().map(|c| c.as_slice())),
            None => Certificate::new(std::iter::empty::<&[u8]>()),
        };
        sent_certificate = !chain.certificate_list.is_empty();
        packets.push(handshake_packet(state, cache, 0, Body::Certificate(chain)));
    }

    let cke = ClientKeyExchange::new(&public_key);
    packets.push(handshake_packet(
        state,
        cache,
        0,
        Body::ClientKeyExchange(cke),
    ));

    let session_hash = if state.extended_master_secret {
        let messages = transcript(cache, true, TranscriptEnd::ClientKeyExchange);
        prf::hash(suite.hash_algorithm(), &messages)?
    } else {
        Vec::new()
    };
    state.init_cipher_suite(&pre_master_secret, &session_hash)?;

    if sent_certificate {
        let Some(signing_key) = config.signing_key() else {
            return Err(FlightError::internal());
        };
        let messages = transcript(cache, true, TranscriptEnd::ClientKeyExchange);
        let signature = signing_key.sign(&messages)?;
        let signed = DigitallySigned::new(signing_key.algorithm(), &signature);
        packets.push(handshake_packet(
            state,
            cache,
            0,
            Body::CertificateVerify(CertificateVerify::new(signed)),
        ));
    }

    packets.push(change_cipher_spec_packet());

    let Some(master_secret) = &state.master_secret else {
        return Err(FlightError::internal());
    };
    let messages = transcript(cache, true, TranscriptEnd::CertificateVerify);
    let verify_data = prf::verify_data(master_secret, true, &messages, suite.hash_algorithm())?;
    packets.push(handshake_packet(
        state,
        cache,
        1,
        Body::Finished(Finished::new(&verify_data)),
    ));

    Ok(packets)
}

pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    _config: &Config,
) -> Result<Next, FlightError> {
    let floor = state.handshake_recv_sequence;
    let rules = [remote(MessageType::Finished, 1, false)];
    let Some(pulled) = cache.full_pull_map(floor, &rules) else {
        return Ok(Next::Stay);
    };

    let Some(Body::Finished(finished)) = pulled.messages.get(&MessageType::Finished) else {
        return Err(FlightError::internal());
    };

    let suite = state.cipher_suite()?;
    let Some(master_secret) = &state.master_secret else {
        return Err(FlightError::internal());
    };
    let messages = transcript(cache, true, TranscriptEnd::ClientFinished);
    let expected = prf::verify_data(master_secret, false, &messages, suite.hash_algorithm())?;
    if !finished.matches(&expected) {
        return Err(Error::VerifyDataMismatch.into());
    }

    state.handshake_recv_sequence = next_floor(pulled.max_sequence, floor);

    Ok(Next::Connected)
}
