use crate::cache::HandshakeCache;
use crate::config::Config;
use crate::message::{AlertDescription, Body, HelloVerifyRequest, MessageType, ProtocolVersion};
use crate::state::State;
use crate::Error;

use super::flight0;
use super::{handshake_packet, next_floor, remote, Flight, FlightError, Next, Packet};

pub(super) fn generate(
    state: &mut State,
    cache: &mut HandshakeCache,
    _config: &Config,
) -> Result<Vec<Packet>, FlightError> {
    let Some(cookie) = state.cookie else {
        return Err(FlightError::internal());
    };

    // The exchange restarts after HelloVerifyRequest.
    state.handshake_send_sequence = 0;

    let hvr = HelloVerifyRequest::new(ProtocolVersion::DTLS1_2, cookie);
    Ok(vec![handshake_packet(
        state,
        cache,
        0,
        Body::HelloVerifyRequest(hvr),
    )])
}

pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    config: &Config,
) -> Result<Next, FlightError> {
    let floor = state.handshake_recv_sequence;
    let rules = [remote(MessageType::ClientHello, 0, false)];

    let Some(pulled) = cache.full_pull_map(floor, &rules) else {
        if !cache.has_remote_at_or_above(floor) {
            // Nothing new from the peer. Treat it as a fresh attempt.
            return flight0::parse(state, cache, config);
        }
        return Ok(Next::Stay);
    };

    state.handshake_recv_sequence = next_floor(pulled.max_sequence, floor);

    let Some(Body::ClientHello(hello)) = pulled.messages.get(&MessageType::ClientHello) else {
        return Err(FlightError::internal());
    };

    flight0::check_client_version(hello)?;

    if hello.cookie.is_empty() {
        trace!("ClientHello without cookie");
        return Ok(Next::Stay);
    }

    let Some(cookie) = &state.cookie else {
        return Err(FlightError::internal());
    };
    if *cookie != hello.cookie {
        return Err(FlightError::fatal(
            AlertDescription::AccessDenied,
            Error::CookieMismatch,
        ));
    }

    flight0::negotiate(state, config, hello)?;

    Ok(Next::Flight(Flight::Flight4))
}
