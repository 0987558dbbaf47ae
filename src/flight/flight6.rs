use crate::cache::HandshakeCache;
use crate::config::Config;
use crate::crypto::prf;
use crate::message::{Body, Finished};
use crate::state::State;

use super::{change_cipher_spec_packet, handshake_packet, transcript};
use super::{FlightError, Next, Packet, TranscriptEnd};

pub(super) fn generate(
    state: &mut State,
    cache: &mut HandshakeCache,
    _config: &Config,
) -> Result<Vec<Packet>, FlightError> {
    let suite = state.cipher_suite()?;
    let Some(master_secret) = &state.master_secret else {
        return Err(FlightError::internal());
    };

    let messages = transcript(cache, false, TranscriptEnd::ClientFinished);
    let verify_data = prf::verify_data(master_secret, false, &messages, suite.hash_algorithm())?;

    Ok(vec![
        change_cipher_spec_packet(),
        handshake_packet(state, cache, 1, Body::Finished(Finished::new(&verify_data))),
    ])
}

/// Nothing more to receive. Retransmissions of the client's last flight are
/// answered by resending this one.
pub(super) fn parse(
    _state: &mut State,
    _cache: &HandshakeCache,
    _config: &Config,
) -> Result<Next, FlightError> {
    Ok(Next::Stay)
}
