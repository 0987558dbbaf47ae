#![no_main]

//! Fuzz target for datagram handling.
//!
//! Feeds arbitrary bytes to a fresh server and to a client that has sent its
//! ClientHello, looking for panics rather than errors.

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use std::time::Instant;

use dtls_flight::{certificate, Config, Engine, Output};

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

    if let Ok(mut server) = Engine::new(Arc::clone(&config), false) {
        let _ = server.start(now);
        let _ = server.handle_packet(data, now);
        drain(&mut server, now);
    }

    if let Ok(mut client) = Engine::new(config, true) {
        let _ = client.start(now);
        drain(&mut client, now);
        let _ = client.handle_packet(data, now);
        drain(&mut client, now);
    }
});

fn drain(engine: &mut Engine, now: Instant) {
    for _ in 0..32 {
        if let Output::Timeout(_) = engine.poll_output(now) {
            break;
        }
    }
}
