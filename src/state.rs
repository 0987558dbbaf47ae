//! Mutable per-connection handshake state.

use std::fmt;

use zeroize::Zeroizing;

use crate::crypto::{prf, KeyingMaterial, Keypair, SrtpProfile, SRTP_EXPORTER_LABEL};
use crate::message::{CipherSuite, Cookie, NamedCurve, Random};
use crate::record_layer::RecordProtection;
use crate::Error;

/// Exporter labels RFC 5705 reserves for the handshake itself.
const RESERVED_LABELS: &[&str] = &[
    "client finished",
    "server finished",
    "master secret",
    "extended master secret",
    "key expansion",
];

pub(crate) struct State {
    pub is_client: bool,

    pub local_epoch: u16,
    pub remote_epoch: u16,

    /// Sequence for the next handshake message we send.
    pub handshake_send_sequence: u16,
    /// Floor for the next cache pull of peer messages.
    pub handshake_recv_sequence: u16,

    pub cookie: Option<Cookie>,
    pub local_random: Option<Random>,
    pub remote_random: Option<Random>,

    pub cipher_suite: Option<CipherSuite>,
    pub named_curve: Option<NamedCurve>,
    pub local_keypair: Option<Keypair>,
    pub remote_public_key: Option<Vec<u8>>,

    /// Whether the extended master secret was negotiated.
    pub extended_master_secret: bool,
    pub master_secret: Option<Zeroizing<Vec<u8>>>,
    pub keys: Option<RecordProtection>,

    pub srtp_profile: Option<SrtpProfile>,
    pub peer_certificates: Vec<Vec<u8>>,
    /// SNI received by a server.
    pub server_name: Option<String>,
    /// Client only. The server sent a CertificateRequest.
    pub remote_requested_certificate: bool,
}

impl State {
    pub fn new(is_client: bool) -> Self {
        State {
            is_client,
            local_epoch: 0,
            remote_epoch: 0,
            handshake_send_sequence: 0,
            handshake_recv_sequence: 0,
            cookie: None,
            local_random: None,
            remote_random: None,
            cipher_suite: None,
            named_curve: None,
            local_keypair: None,
            remote_public_key: None,
            extended_master_secret: false,
            master_secret: None,
            keys: None,
            srtp_profile: None,
            peer_certificates: Vec::new(),
            server_name: None,
            remote_requested_certificate: false,
        }
    }

    fn randoms(&self) -> Result<([u8; 32], [u8; 32]), Error> {
        let (Some(local), Some(remote)) = (&self.local_random, &self.remote_random) else {
            return Err(Error::CryptoError("Hello randoms not exchanged".into()));
        };
        if self.is_client {
            Ok((local.to_bytes(), remote.to_bytes()))
        } else {
            Ok((remote.to_bytes(), local.to_bytes()))
        }
    }

    pub fn cipher_suite(&self) -> Result<CipherSuite, Error> {
        self.cipher_suite
            .ok_or_else(|| Error::CryptoError("Cipher suite not negotiated".into()))
    }

    /// Derive the master secret and record keys from the premaster secret.
    ///
    /// `session_hash` is the transcript hash through ClientKeyExchange and is
    /// only used when the extended master secret was negotiated.
    pub fn init_cipher_suite(
        &mut self,
        pre_master_secret: &[u8],
        session_hash: &[u8],
    ) -> Result<(), Error> {
        let suite = self.cipher_suite()?;
        let hash = suite.hash_algorithm();
        let (client_random, server_random) = self.randoms()?;

        let master_secret = if self.extended_master_secret {
            prf::extended_master_secret(pre_master_secret, session_hash, hash)?
        } else {
            prf::master_secret(pre_master_secret, &client_random, &server_random, hash)?
        };

        let keys = RecordProtection::derive(
            suite,
            &master_secret,
            &client_random,
            &server_random,
            self.is_client,
        )?;

        debug!(
            "Derived keys for {:?} (extended master secret: {})",
            suite, self.extended_master_secret
        );

        self.master_secret = Some(master_secret);
        self.keys = Some(keys);
        Ok(())
    }

    /// RFC 5705 exporter without context.
    pub fn export_keying_material(
        &self,
        label: &str,
        len: usize,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        if RESERVED_LABELS.contains(&label) {
            return Err(Error::CryptoError(format!("Reserved exporter label: {}", label)));
        }
        let Some(master_secret) = &self.master_secret else {
            return Err(Error::HandshakeInProgress);
        };
        let suite = self.cipher_suite()?;
        let (client_random, server_random) = self.randoms()?;

        prf::export_keying_material(
            master_secret,
            label,
            &client_random,
            &server_random,
            len,
            suite.hash_algorithm(),
        )
    }

    pub fn srtp_keying_material(&self) -> Result<Option<(KeyingMaterial, SrtpProfile)>, Error> {
        let Some(profile) = self.srtp_profile else {
            return Ok(None);
        };
        let material =
            self.export_keying_material(SRTP_EXPORTER_LABEL, profile.keying_material_len())?;
        Ok(Some((KeyingMaterial::new(material), profile)))
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("is_client", &self.is_client)
            .field("local_epoch", &self.local_epoch)
            .field("remote_epoch", &self.remote_epoch)
            .field("handshake_send_sequence", &self.handshake_send_sequence)
            .field("handshake_recv_sequence", &self.handshake_recv_sequence)
            .field("cipher_suite", &self.cipher_suite)
            .field("named_curve", &self.named_curve)
            .field("extended_master_secret", &self.extended_master_secret)
            .field("srtp_profile", &self.srtp_profile)
            .field("has_keys", &self.keys.is_some())
            .finish_non_exhaustive()
    }
}
