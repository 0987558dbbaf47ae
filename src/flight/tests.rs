use tinyvec::ArrayVec;

use super::*;
use crate::certificate::{generate_self_signed_certificate, FingerprintVerifier};
use crate::config::ExtendedMasterSecretPolicy;
use crate::crypto::Keypair;
use crate::message::{ClientHello, Cookie, Extension, ProtocolVersion, Random};
use crate::message::SupportedGroupsExtension;

fn server_config() -> Config {
    let _ = env_logger::try_init();
    Config::builder()
        .certificate(generate_self_signed_certificate().unwrap())
        .build()
        .unwrap()
}

fn client_hello(seq: u16, cookie: &[u8], suites: &[CipherSuite], ems: bool) -> Vec<u8> {
    client_hello_version(seq, cookie, suites, ems, ProtocolVersion::DTLS1_2)
}

fn client_hello_version(
    seq: u16,
    cookie: &[u8],
    suites: &[CipherSuite],
    ems: bool,
    version: ProtocolVersion,
) -> Vec<u8> {
    let mut cipher_suites = ArrayVec::new();
    cipher_suites.extend(suites.iter().copied());

    let mut extensions = ArrayVec::new();
    extensions.push(Extension::SupportedGroups(SupportedGroupsExtension::new(&[
        NamedCurve::Secp256r1,
    ])));
    if ems {
        extensions.push(Extension::ExtendedMasterSecret);
    }

    let random = Random::generate().unwrap();
    let cookie = Cookie::try_new(cookie).unwrap();
    let mut hello = ClientHello::new(random, cookie, cipher_suites, extensions);
    hello.client_version = version;
    Handshake::new(seq, Body::ClientHello(hello)).marshal()
}

fn push_remote(cache: &mut HandshakeCache, message: Vec<u8>, epoch: u16) {
    let (_, handshake) = Handshake::parse(&message).unwrap();
    let header = handshake.header;
    cache.push(message, epoch, header.message_seq, header.msg_type, false);
}

/// Hand the handshake messages of a flight to the peer's cache.
fn deliver(packets: &[Packet], to: &mut HandshakeCache) {
    for packet in packets {
        if packet.content_type == ContentType::Handshake {
            push_remote(to, packet.data.clone(), packet.epoch);
        }
    }
}

struct Server {
    config: Config,
    state: State,
    cache: HandshakeCache,
}

impl Server {
    fn new(config: Config) -> Self {
        Server {
            config,
            state: State::new(false),
            cache: HandshakeCache::new(),
        }
    }

    fn generate(&mut self, flight: Flight) -> Result<Vec<Packet>, FlightError> {
        let (generate, _) = flight.handlers();
        generate(&mut self.state, &mut self.cache, &self.config)
    }

    fn parse(&mut self, flight: Flight) -> Result<Next, FlightError> {
        let (_, parse) = flight.handlers();
        parse(&mut self.state, &self.cache, &self.config)
    }

    /// Through HelloVerifyRequest, returning the cookie handed out.
    fn hello_verified(&mut self, suites: &[CipherSuite], ems: bool) -> Cookie {
        assert!(self.generate(Flight::Flight0).unwrap().is_empty());
        push_remote(&mut self.cache, client_hello(0, &[], suites, ems), 0);
        assert_eq!(
            self.parse(Flight::Flight0).unwrap(),
            Next::Flight(Flight::Flight2)
        );
        let hvr = self.generate(Flight::Flight2).unwrap();
        assert_eq!(hvr.len(), 1);
        self.state.cookie.unwrap()
    }
}

const SUITES: &[CipherSuite] = &[CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256];

#[test]
fn first_client_hello_moves_to_flight2() {
    let mut server = Server::new(server_config());
    server.generate(Flight::Flight0).unwrap();
    assert!(server.state.cookie.is_some());
    assert!(server.state.local_keypair.is_none());

    push_remote(&mut server.cache, client_hello(0, &[], SUITES, true), 0);
    let next = server.parse(Flight::Flight0).unwrap();

    assert_eq!(next, Next::Flight(Flight::Flight2));
    assert!(server.state.local_keypair.is_some());
    assert_eq!(server.state.named_curve, Some(NamedCurve::Secp256r1));
    assert_eq!(server.state.handshake_recv_sequence, 1);
}

#[test]
fn hello_verify_request_restarts_sequence() {
    let mut server = Server::new(server_config());
    server.hello_verified(SUITES, true);

    let packets = server.generate(Flight::Flight2).unwrap();
    let (_, hvr) = Handshake::parse(&packets[0].data).unwrap();
    assert_eq!(hvr.header.message_seq, 0);
    assert!(matches!(hvr.body, Body::HelloVerifyRequest(h) if h.cookie.len() == COOKIE_LEN));
}

#[test]
fn empty_cookie_stays() {
    let mut server = Server::new(server_config());
    server.hello_verified(SUITES, true);

    push_remote(&mut server.cache, client_hello(1, &[], SUITES, true), 0);
    assert_eq!(server.parse(Flight::Flight2).unwrap(), Next::Stay);
    assert_eq!(server.state.handshake_recv_sequence, 2);
}

#[test]
fn matching_cookie_moves_to_flight4() {
    let mut server = Server::new(server_config());
    let cookie = server.hello_verified(SUITES, true);
    assert_eq!(server.state.cookie, Some(cookie));

    push_remote(&mut server.cache, client_hello(1, &cookie, SUITES, true), 0);
    assert_eq!(
        server.parse(Flight::Flight2).unwrap(),
        Next::Flight(Flight::Flight4)
    );
    assert!(server.state.extended_master_secret);
    assert_eq!(server.state.cookie, Some(cookie));
}

#[test]
fn cookie_with_one_bit_flipped_is_access_denied() {
    let mut server = Server::new(server_config());
    let cookie = server.hello_verified(SUITES, true);

    let mut flipped = cookie.to_vec();
    let last = flipped.len() - 1;
    flipped[last] ^= 0x01;

    push_remote(&mut server.cache, client_hello(1, &flipped, SUITES, true), 0);
    let err = server.parse(Flight::Flight2).unwrap_err();
    assert_eq!(err.alert.description, AlertDescription::AccessDenied);
    assert!(matches!(err.into_error(), Error::CookieMismatch));
}

#[test]
fn old_version_without_cookie_is_rejected() {
    let mut server = Server::new(server_config());
    server.hello_verified(SUITES, true);

    let hello = client_hello_version(1, &[], SUITES, true, ProtocolVersion::DTLS1_0);
    push_remote(&mut server.cache, hello, 0);
    let err = server.parse(Flight::Flight2).unwrap_err();
    assert_eq!(err.alert.description, AlertDescription::ProtocolVersion);
    assert!(matches!(err.into_error(), Error::UnsupportedProtocolVersion));
}

#[test]
fn old_version_is_rejected_before_cookie_check() {
    let mut server = Server::new(server_config());
    server.hello_verified(SUITES, true);

    let hello = client_hello_version(1, &[9; 20], SUITES, true, ProtocolVersion::DTLS1_0);
    push_remote(&mut server.cache, hello, 0);
    let err = server.parse(Flight::Flight2).unwrap_err();
    assert_eq!(err.alert.description, AlertDescription::ProtocolVersion);
    assert!(matches!(err.into_error(), Error::UnsupportedProtocolVersion));
}

#[test]
fn flight2_without_new_messages_reparses_first_hello() {
    let mut server = Server::new(server_config());
    server.hello_verified(SUITES, true);
    let public_key = server
        .state
        .local_keypair
        .as_ref()
        .unwrap()
        .public_key()
        .to_vec();

    assert_eq!(
        server.parse(Flight::Flight2).unwrap(),
        Next::Flight(Flight::Flight2)
    );

    // The retry edge keeps the keypair from the first parse.
    let keypair = server.state.local_keypair.as_ref().unwrap();
    assert_eq!(keypair.public_key(), &public_key[..]);
}

#[test]
fn disjoint_suites_are_insufficient_security() {
    let mut server = Server::new(server_config());
    server.generate(Flight::Flight0).unwrap();

    let offered = [CipherSuite::ECDHE_RSA_AES128_GCM_SHA256];
    push_remote(&mut server.cache, client_hello(0, &[], &offered, true), 0);
    let err = server.parse(Flight::Flight0).unwrap_err();
    assert_eq!(err.alert.description, AlertDescription::InsufficientSecurity);
    assert!(matches!(err.error, Some(Error::CipherSuiteNoIntersection)));
}

#[test]
fn required_extended_master_secret() {
    let config = Config::builder()
        .certificate(generate_self_signed_certificate().unwrap())
        .extended_master_secret(ExtendedMasterSecretPolicy::Require)
        .build()
        .unwrap();
    let mut server = Server::new(config);
    server.generate(Flight::Flight0).unwrap();

    push_remote(&mut server.cache, client_hello(0, &[], SUITES, false), 0);
    let err = server.parse(Flight::Flight0).unwrap_err();
    assert_eq!(err.alert.description, AlertDescription::InsufficientSecurity);
    assert!(matches!(
        err.error,
        Some(Error::ServerRequiredButNoClientEms)
    ));
}

#[test]
fn selection_follows_peer_order() {
    let local = CipherSuite::supported();
    let offered = [
        CipherSuite::Unknown(0x1301),
        CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
        CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
    ];
    assert_eq!(
        select_cipher_suite(&offered, &local),
        Some(CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384)
    );

    let curves = [NamedCurve::X448, NamedCurve::Secp384r1, NamedCurve::X25519];
    assert_eq!(
        select_curve(&curves, &NamedCurve::supported()),
        Some(NamedCurve::Secp384r1)
    );
    assert_eq!(select_curve(&[NamedCurve::X448], &NamedCurve::supported()), None);

    let profiles = [
        SrtpProfileId::SrtpAes128CmSha1_32,
        SrtpProfileId::SrtpAeadAes128Gcm,
    ];
    assert_eq!(
        select_srtp_profile(&profiles, &[SrtpProfile::AeadAes128Gcm]),
        Some(SrtpProfile::AeadAes128Gcm)
    );
    assert_eq!(select_srtp_profile(&profiles, &[]), None);
}

struct Pair {
    client: Server,
    server: Server,
}

/// Run every flight by passing handshake messages straight between caches.
fn handshake(client_config: Config, server_config: Config) -> Result<Pair, FlightError> {
    let mut pair = Pair {
        client: Server {
            config: client_config,
            state: State::new(true),
            cache: HandshakeCache::new(),
        },
        server: Server::new(server_config),
    };
    let (c, s) = (&mut pair.client, &mut pair.server);

    s.generate(Flight::Flight0)?;

    let f1 = c.generate(Flight::Flight1)?;
    deliver(&f1, &mut s.cache);
    assert_eq!(s.parse(Flight::Flight0)?, Next::Flight(Flight::Flight2));

    let f2 = s.generate(Flight::Flight2)?;
    deliver(&f2, &mut c.cache);
    assert_eq!(c.parse(Flight::Flight1)?, Next::Flight(Flight::Flight3));

    let f3 = c.generate(Flight::Flight3)?;
    deliver(&f3, &mut s.cache);
    assert_eq!(s.parse(Flight::Flight2)?, Next::Flight(Flight::Flight4));

    let f4 = s.generate(Flight::Flight4)?;
    deliver(&f4, &mut c.cache);
    assert_eq!(c.parse(Flight::Flight3)?, Next::Flight(Flight::Flight5));

    let f5 = c.generate(Flight::Flight5)?;
    assert!(f5
        .iter()
        .any(|p| p.content_type == ContentType::ChangeCipherSpec));
    deliver(&f5, &mut s.cache);
    assert_eq!(s.parse(Flight::Flight4)?, Next::Flight(Flight::Flight6));

    let f6 = s.generate(Flight::Flight6)?;
    assert_eq!(f6[1].epoch, 1);
    deliver(&f6, &mut c.cache);
    assert_eq!(c.parse(Flight::Flight5)?, Next::Connected);

    Ok(pair)
}

fn client_config() -> Config {
    Config::builder().build().unwrap()
}

#[test]
fn all_flights_agree_on_secrets() {
    let pair = handshake(client_config(), server_config()).unwrap();
    let (c, s) = (&pair.client.state, &pair.server.state);

    assert!(c.master_secret.is_some());
    assert_eq!(c.master_secret, s.master_secret);
    assert!(c.extended_master_secret && s.extended_master_secret);
    assert_eq!(c.cipher_suite, s.cipher_suite);
    assert_eq!(c.peer_certificates.len(), 1);
    assert!(s.peer_certificates.is_empty());
}

#[test]
fn client_keypair_generated_once() {
    let mut client = Server {
        config: client_config(),
        state: State::new(true),
        cache: HandshakeCache::new(),
    };
    let mut server = Server::new(server_config());

    server.generate(Flight::Flight0).unwrap();
    let f1 = client.generate(Flight::Flight1).unwrap();
    deliver(&f1, &mut server.cache);
    assert_eq!(
        server.parse(Flight::Flight0).unwrap(),
        Next::Flight(Flight::Flight2)
    );

    let f2 = server.generate(Flight::Flight2).unwrap();
    deliver(&f2, &mut client.cache);
    assert_eq!(
        client.parse(Flight::Flight1).unwrap(),
        Next::Flight(Flight::Flight3)
    );

    let f3 = client.generate(Flight::Flight3).unwrap();
    deliver(&f3, &mut server.cache);
    assert_eq!(
        server.parse(Flight::Flight2).unwrap(),
        Next::Flight(Flight::Flight4)
    );
    let f4 = server.generate(Flight::Flight4).unwrap();
    deliver(&f4, &mut client.cache);

    let curve = server.state.named_curve.unwrap();
    let keypair = Keypair::generate(curve).unwrap();
    let public_key = keypair.public_key().to_vec();
    client.state.local_keypair = Some(keypair);

    assert_eq!(
        client.parse(Flight::Flight3).unwrap(),
        Next::Flight(Flight::Flight5)
    );
    let kept = client.state.local_keypair.as_ref().unwrap();
    assert_eq!(kept.public_key(), &public_key[..]);
}

#[test]
fn plain_master_secret_when_disabled() {
    let client = Config::builder()
        .extended_master_secret(ExtendedMasterSecretPolicy::Disable)
        .build()
        .unwrap();
    let pair = handshake(client, server_config()).unwrap();
    assert!(!pair.client.state.extended_master_secret);
    assert!(!pair.server.state.extended_master_secret);
    assert_eq!(
        pair.client.state.master_secret,
        pair.server.state.master_secret
    );
}

#[test]
fn client_certificate_is_verified() {
    let client_cert = generate_self_signed_certificate().unwrap();
    let fingerprint = client_cert.fingerprint();

    let client = Config::builder().certificate(client_cert).build().unwrap();
    let server = Config::builder()
        .certificate(generate_self_signed_certificate().unwrap())
        .require_client_certificate(true)
        .cert_verifier(std::sync::Arc::new(FingerprintVerifier::new([fingerprint])))
        .build()
        .unwrap();

    let pair = handshake(client, server).unwrap();
    assert_eq!(pair.server.state.peer_certificates.len(), 1);
    assert!(pair.client.state.remote_requested_certificate);
}

#[test]
fn missing_client_certificate_fails() {
    let server = Config::builder()
        .certificate(generate_self_signed_certificate().unwrap())
        .require_client_certificate(true)
        .build()
        .unwrap();

    let err = handshake(client_config(), server).err().unwrap();
    assert_eq!(err.alert.description, AlertDescription::HandshakeFailure);
}

#[test]
fn pinned_server_fingerprint_mismatch() {
    let client = Config::builder()
        .cert_verifier(std::sync::Arc::new(FingerprintVerifier::new([vec![0; 32]])))
        .build()
        .unwrap();

    let err = handshake(client, server_config()).err().unwrap();
    assert_eq!(err.alert.description, AlertDescription::BadCertificate);
}

#[test]
fn srtp_profile_negotiated() {
    let client = Config::builder()
        .srtp_profiles(&[SrtpProfile::Aes128CmSha1_80, SrtpProfile::AeadAes128Gcm])
        .build()
        .unwrap();
    let server = Config::builder()
        .certificate(generate_self_signed_certificate().unwrap())
        .srtp_profiles(&[SrtpProfile::AeadAes128Gcm])
        .build()
        .unwrap();

    let pair = handshake(client, server).unwrap();
    assert_eq!(
        pair.client.state.srtp_profile,
        Some(SrtpProfile::AeadAes128Gcm)
    );
    assert_eq!(
        pair.server.state.srtp_profile,
        Some(SrtpProfile::AeadAes128Gcm)
    );
}

#[test]
fn transcript_excludes_hello_verify_exchange() {
    let pair = handshake(client_config(), server_config()).unwrap();
    let client = transcript(
        &pair.client.cache,
        true,
        TranscriptEnd::ClientFinished,
    );
    let server = transcript(
        &pair.server.cache,
        false,
        TranscriptEnd::ClientFinished,
    );
    assert_eq!(client, server);

    // Starts with the second ClientHello.
    let (_, first) = Handshake::parse(&client).unwrap();
    assert_eq!(first.header.message_seq, 1);
    assert!(matches!(first.body, Body::ClientHello(h) if !h.cookie.is_empty()));

    let shorter = transcript(
        &pair.client.cache,
        true,
        TranscriptEnd::ClientKeyExchange,
    );
    assert!(shorter.len() < client.len());
    assert!(client.starts_with(&shorter));
}
