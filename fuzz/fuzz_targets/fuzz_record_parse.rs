#![no_main]

//! Fuzz target for record and handshake fragment parsing.
//!
//! The input is wrapped as the fragment of an epoch 0 handshake record, so
//! the fragment buffer and message parsers see bytes behind a valid header.
//!
//! Record header:
//! - ContentType: 1 byte
//! - ProtocolVersion: 2 bytes (0xFEFD)
//! - Epoch: 2 bytes
//! - Sequence Number: 6 bytes (u48)
//! - Length: 2 bytes

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use std::time::Instant;

use dtls_flight::{certificate, Config, Engine};

const RECORD_HEADER_LEN: usize = 13;
const MAX_FRAGMENT_SIZE: usize = 16384;

fuzz_target!(|data: &[u8]| {
    let cert = match certificate::generate_self_signed_certificate() {
        Ok(c) => c,
        Err(_) => return,
    };
    let config = match Config::builder().certificate(cert).build() {
        Ok(c) => Arc::new(c),
        Err(_) => return,
    };
    let now = Instant::now();

    let Ok(mut server) = Engine::new(config, false) else {
        return;
    };
    if server.start(now).is_err() {
        return;
    }

    let frag_len = data.len().min(MAX_FRAGMENT_SIZE);
    let mut record = Vec::with_capacity(RECORD_HEADER_LEN + frag_len);
    record.push(22u8);
    record.extend_from_slice(&[0xFE, 0xFD]);
    record.extend_from_slice(&[0, 0]);
    record.extend_from_slice(&[0, 0, 0, 0, 0, 1]);
    record.extend_from_slice(&(frag_len as u16).to_be_bytes());
    record.extend_from_slice(&data[..frag_len]);

    let _ = server.handle_packet(&record, now);
});
