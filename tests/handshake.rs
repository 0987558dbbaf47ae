//! Handshakes between two engines.

mod common;

use std::sync::Arc;
use std::time::Instant;

use common::*;
use dtls_flight::certificate::{generate_self_signed_certificate, generate_self_signed_p384};
use dtls_flight::certificate::FingerprintVerifier;
use dtls_flight::message::{AlertDescription, CipherSuite};
use dtls_flight::{Error, ExtendedMasterSecretPolicy, SrtpProfile};

#[test]
fn handshake_with_cookie_exchange() {
    let now = Instant::now();
    let (mut client, mut server) = engines(client_config(), server_config(), now);

    // Flight 1: ClientHello without cookie
    let f1 = collect_packets(&mut client, now);
    assert_eq!(handshake_types(&f1[0]), vec![CLIENT_HELLO]);
    deliver(&f1, &mut server, now);

    // Flight 2: HelloVerifyRequest
    let f2 = collect_packets(&mut server, now);
    assert_eq!(handshake_types(&f2[0]), vec![HELLO_VERIFY_REQUEST]);
    deliver(&f2, &mut client, now);

    // Flight 3: ClientHello with cookie
    let f3 = collect_packets(&mut client, now);
    assert_eq!(handshake_types(&f3[0]), vec![CLIENT_HELLO]);
    deliver(&f3, &mut server, now);

    // Flight 4: ServerHello .. ServerHelloDone, no CertificateRequest by default
    let f4 = collect_packets(&mut server, now);
    let types: Vec<u8> = f4.iter().flat_map(|d| handshake_types(d)).collect();
    assert_eq!(
        types,
        vec![SERVER_HELLO, CERTIFICATE, SERVER_KEY_EXCHANGE, SERVER_HELLO_DONE]
    );
    deliver(&f4, &mut client, now);

    // Flight 5: ClientKeyExchange, ChangeCipherSpec, encrypted Finished
    let f5 = collect_packets(&mut client, now);
    let headers = collect_headers(&f5);
    let kinds: Vec<(u8, u16)> = headers.iter().map(|h| (h.ctype, h.epoch)).collect();
    assert_eq!(
        kinds,
        vec![(HANDSHAKE, 0), (CHANGE_CIPHER_SPEC, 0), (HANDSHAKE, 1)]
    );
    deliver(&f5, &mut server, now);

    // Flight 6: ChangeCipherSpec, encrypted Finished
    let out = drain(&mut server, now);
    assert!(out.connected);
    let kinds: Vec<(u8, u16)> = collect_headers(&out.packets)
        .iter()
        .map(|h| (h.ctype, h.epoch))
        .collect();
    assert_eq!(kinds, vec![(CHANGE_CIPHER_SPEC, 0), (HANDSHAKE, 1)]);
    deliver(&out.packets, &mut client, now);

    let out = drain(&mut client, now);
    assert!(out.connected);
    assert!(out.packets.is_empty());
    assert!(client.is_connected());
    assert!(server.is_connected());
}

#[test]
fn application_data_both_ways() {
    let now = Instant::now();
    let (mut client, mut server) = connect(client_config(), server_config());

    client.send_application_data(b"ping").expect("client send");
    server.send_application_data(b"pong").expect("server send");

    let pumped = pump(&mut client, &mut server, now);
    assert_eq!(pumped.server_app_data, vec![b"ping".to_vec()]);
    assert_eq!(pumped.client_app_data, vec![b"pong".to_vec()]);

    // Application data records are encrypted at epoch 1
    client.send_application_data(b"again").expect("client send");
    let packets = collect_packets(&mut client, now);
    let headers = collect_headers(&packets);
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].ctype, APPLICATION_DATA);
    assert_eq!(headers[0].epoch, 1);
}

#[test]
fn replayed_application_data_is_dropped() {
    let now = Instant::now();
    let (mut client, mut server) = connect(client_config(), server_config());

    client.send_application_data(b"once").expect("client send");
    let packets = collect_packets(&mut client, now);
    deliver(&packets, &mut server, now);
    deliver(&packets, &mut server, now);

    assert_eq!(drain(&mut server, now).app_data, vec![b"once".to_vec()]);
}

#[test]
fn oversized_application_data_is_rejected() {
    let (mut client, _server) = connect(client_config(), server_config());
    let data = vec![0u8; 2000];
    assert!(matches!(
        client.send_application_data(&data),
        Err(Error::DataTooLarge(2000))
    ));
}

#[test]
fn exported_keying_material_matches() {
    let (client, server) = connect(client_config(), server_config());

    let a = client.export_keying_material("EXPERIMENTAL-test", 32).expect("export");
    let b = server.export_keying_material("EXPERIMENTAL-test", 32).expect("export");
    assert_eq!(a.len(), 32);
    assert_eq!(&*a, &*b);

    // Labels used by the handshake itself are refused
    assert!(client.export_keying_material("master secret", 32).is_err());
}

#[test]
fn srtp_profile_and_keying_material() {
    let client = Arc::new(
        client_builder()
            .srtp_profiles(&[SrtpProfile::Aes128CmSha1_32, SrtpProfile::Aes128CmSha1_80])
            .build()
            .expect("client config"),
    );
    let server = Arc::new(
        server_builder()
            .srtp_profiles(&[SrtpProfile::Aes128CmSha1_80, SrtpProfile::Aes128CmSha1_32])
            .build()
            .expect("server config"),
    );
    let (client, server) = connect(client, server);

    // The server takes the first of the client's profiles it supports
    assert_eq!(client.srtp_profile(), Some(SrtpProfile::Aes128CmSha1_32));
    assert_eq!(server.srtp_profile(), Some(SrtpProfile::Aes128CmSha1_32));

    let (ck, cp) = client.srtp_keying_material().expect("km").expect("srtp");
    let (sk, sp) = server.srtp_keying_material().expect("km").expect("srtp");
    assert_eq!(cp, sp);
    assert_eq!(ck.len(), SrtpProfile::Aes128CmSha1_32.keying_material_len());
    assert_eq!(&*ck, &*sk);
}

#[test]
fn no_srtp_without_configuration() {
    let (client, server) = connect(client_config(), server_config());
    assert_eq!(client.srtp_profile(), None);
    assert!(server.srtp_keying_material().expect("km").is_none());
}

#[test]
fn mutual_authentication() {
    let client_cert = generate_self_signed_certificate().expect("gen client cert");
    let server_cert = generate_self_signed_certificate().expect("gen server cert");
    let client_der = client_cert.certificate_chain[0].clone();
    let server_der = server_cert.certificate_chain[0].clone();

    let client = Arc::new(
        client_builder()
            .certificate(client_cert.clone())
            .cert_verifier(Arc::new(FingerprintVerifier::new([
                server_cert.fingerprint()
            ])))
            .build()
            .expect("client config"),
    );
    let server = Arc::new(
        server_builder()
            .certificate(server_cert)
            .require_client_certificate(true)
            .cert_verifier(Arc::new(FingerprintVerifier::new([
                client_cert.fingerprint()
            ])))
            .build()
            .expect("server config"),
    );

    let (client, server) = connect(client, server);
    assert_eq!(client.peer_certificates(), &[server_der]);
    assert_eq!(server.peer_certificates(), &[client_der]);
}

#[test]
fn certificate_request_in_flight4() {
    let now = Instant::now();
    let server = Arc::new(
        server_builder()
            .require_client_certificate(true)
            .build()
            .expect("server config"),
    );
    let (mut client, mut server) = engines(client_config(), server, now);

    // ClientHello, HelloVerifyRequest, ClientHello
    for _ in 0..2 {
        let p = collect_packets(&mut client, now);
        deliver(&p, &mut server, now);
        let p = collect_packets(&mut server, now);
        if handshake_types(&p[0]) == vec![HELLO_VERIFY_REQUEST] {
            deliver(&p, &mut client, now);
            continue;
        }
        let types: Vec<u8> = p.iter().flat_map(|d| handshake_types(d)).collect();
        assert!(types.contains(&CERTIFICATE_REQUEST));
        deliver(&p, &mut client, now);
    }

    // A client without certificate answers with an empty chain and the
    // server refuses it.
    let f5 = collect_packets(&mut client, now);
    let types: Vec<u8> = f5.iter().flat_map(|d| handshake_types(d)).collect();
    assert_eq!(types, vec![CERTIFICATE, CLIENT_KEY_EXCHANGE]);

    let mut failed = None;
    for p in &f5 {
        if let Err(e) = server.handle_packet(p, now) {
            failed = Some(e);
        }
    }
    assert!(matches!(failed, Some(Error::ClientCertificateRequired)));

    // The alert reaches the client
    let alert = collect_packets(&mut server, now);
    let mut client_error = None;
    for p in &alert {
        if let Err(e) = client.handle_packet(p, now) {
            client_error = Some(e);
        }
    }
    match client_error {
        Some(Error::Alert(a)) => assert_eq!(a.description, AlertDescription::HandshakeFailure),
        other => panic!("expected alert, got {:?}", other),
    }
}

#[test]
fn p384_certificate_and_aes256() {
    let client = Arc::new(
        client_builder()
            .cipher_suites(&[CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384])
            .build()
            .expect("client config"),
    );
    let server = Arc::new(
        server_builder()
            .certificate(generate_self_signed_p384().expect("gen p384 cert"))
            .build()
            .expect("server config"),
    );
    let now = Instant::now();
    let (mut client, mut server) = connect(client, server);

    assert_eq!(
        client.cipher_suite(),
        Some(CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384)
    );
    assert_eq!(client.cipher_suite(), server.cipher_suite());

    client.send_application_data(b"p384").expect("send");
    let pumped = pump(&mut client, &mut server, now);
    assert_eq!(pumped.server_app_data, vec![b"p384".to_vec()]);
}

#[test]
fn each_supported_curve() {
    use dtls_flight::message::NamedCurve;

    for curve in [NamedCurve::X25519, NamedCurve::Secp256r1, NamedCurve::Secp384r1] {
        let client = Arc::new(
            client_builder()
                .named_curves(&[curve])
                .build()
                .expect("client config"),
        );
        let (client, server) = connect(client, server_config());
        let a = client.export_keying_material("EXPERIMENTAL", 16).expect("export");
        let b = server.export_keying_material("EXPERIMENTAL", 16).expect("export");
        assert_eq!(&*a, &*b, "{:?}", curve);
    }
}

#[test]
fn server_name_indication() {
    let client = Arc::new(
        client_builder()
            .server_name("example.com")
            .build()
            .expect("client config"),
    );
    let (client, server) = connect(client, server_config());
    assert_eq!(client.server_name(), Some("example.com"));
    assert_eq!(server.server_name(), Some("example.com"));
}

#[test]
fn extended_master_secret_required_by_client() {
    let now = Instant::now();
    let client = Arc::new(
        client_builder()
            .extended_master_secret(ExtendedMasterSecretPolicy::Require)
            .build()
            .expect("client config"),
    );
    let server = Arc::new(
        server_builder()
            .extended_master_secret(ExtendedMasterSecretPolicy::Disable)
            .build()
            .expect("server config"),
    );
    let (mut client, mut server) = engines(client, server, now);
    pump(&mut client, &mut server, now);

    assert!(!client.is_connected());
    assert!(matches!(
        client.handle_timeout(now),
        Err(Error::ClientRequiredButNoServerEms)
    ));
    match server.handle_timeout(now) {
        Err(Error::Alert(a)) => {
            assert_eq!(a.description, AlertDescription::InsufficientSecurity)
        }
        other => panic!("expected alert, got {:?}", other),
    }
}

#[test]
fn extended_master_secret_optional_on_both_sides() {
    for (c, s) in [
        (ExtendedMasterSecretPolicy::Request, ExtendedMasterSecretPolicy::Disable),
        (ExtendedMasterSecretPolicy::Disable, ExtendedMasterSecretPolicy::Request),
        (ExtendedMasterSecretPolicy::Require, ExtendedMasterSecretPolicy::Require),
    ] {
        let client = Arc::new(
            client_builder()
                .extended_master_secret(c)
                .build()
                .expect("client config"),
        );
        let server = Arc::new(
            server_builder()
                .extended_master_secret(s)
                .build()
                .expect("server config"),
        );
        let (client, server) = connect(client, server);
        let a = client.export_keying_material("EXPERIMENTAL", 16).expect("export");
        let b = server.export_keying_material("EXPERIMENTAL", 16).expect("export");
        assert_eq!(&*a, &*b);
    }
}

#[test]
fn no_common_cipher_suite() {
    let now = Instant::now();
    let client = Arc::new(
        client_builder()
            .cipher_suites(&[CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256])
            .build()
            .expect("client config"),
    );
    let server = Arc::new(
        server_builder()
            .cipher_suites(&[CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384])
            .build()
            .expect("server config"),
    );
    let (mut client, mut server) = engines(client, server, now);
    pump(&mut client, &mut server, now);

    assert!(matches!(
        server.handle_timeout(now),
        Err(Error::CipherSuiteNoIntersection)
    ));
    match client.handle_timeout(now) {
        Err(Error::Alert(a)) => {
            assert_eq!(a.description, AlertDescription::InsufficientSecurity)
        }
        other => panic!("expected alert, got {:?}", other),
    }
}

#[test]
fn close_notify_closes_peer() {
    let now = Instant::now();
    let (mut client, mut server) = connect(client_config(), server_config());

    client.close();
    assert!(client.is_closed());
    assert!(matches!(
        client.send_application_data(b"late"),
        Err(Error::Closed)
    ));

    let packets = collect_packets(&mut client, now);
    assert_eq!(collect_headers(&packets)[0].ctype, ALERT);
    deliver(&packets, &mut server, now);
    assert!(server.is_closed());
}
