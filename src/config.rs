use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::certificate::{AcceptAnyVerifier, CertVerifier, DtlsCertificate};
use crate::crypto::{SigningKey, SrtpProfile, DTLS_AEAD_OVERHEAD};
use crate::message::{CipherSuite, NamedCurve, HANDSHAKE_HEADER_LEN, RECORD_HEADER_LEN};
use crate::Error;

/// Smallest MTU that leaves room for a handshake fragment in an encrypted record.
const MIN_MTU: usize = 256;

/// Extended master secret (RFC 7627) policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtendedMasterSecretPolicy {
    /// Never negotiate it.
    Disable,
    /// Negotiate it when the peer supports it.
    #[default]
    Request,
    /// Fail the handshake unless the peer supports it.
    Require,
}

/// DTLS configuration
#[derive(Clone)]
pub struct Config {
    mtu: usize,
    max_queue_rx: usize,
    max_queue_tx: usize,
    max_buffered_messages: usize,
    app_data_queue: usize,
    flight_start_rto: Duration,
    flight_max_rto: Duration,
    flight_retries: usize,
    handshake_timeout: Duration,
    cipher_suites: Vec<CipherSuite>,
    named_curves: Vec<NamedCurve>,
    srtp_profiles: Vec<SrtpProfile>,
    extended_master_secret: ExtendedMasterSecretPolicy,
    require_client_certificate: bool,
    certificate: Option<DtlsCertificate>,
    signing_key: Option<SigningKey>,
    cert_verifier: Arc<dyn CertVerifier>,
    server_name: Option<String>,
    rng_seed: Option<u64>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            mtu: 1150,
            max_queue_rx: 30,
            max_queue_tx: 10,
            max_buffered_messages: 8,
            app_data_queue: 16,
            flight_start_rto: Duration::from_secs(1),
            flight_max_rto: Duration::from_secs(60),
            flight_retries: 4,
            handshake_timeout: Duration::from_secs(40),
            cipher_suites: CipherSuite::supported().to_vec(),
            named_curves: NamedCurve::supported().to_vec(),
            srtp_profiles: Vec::new(),
            extended_master_secret: ExtendedMasterSecretPolicy::Request,
            require_client_certificate: false,
            certificate: None,
            cert_verifier: Arc::new(AcceptAnyVerifier),
            server_name: None,
            rng_seed: None,
        }
    }

    /// Max transmission unit.
    ///
    /// The largest size UDP packets we will produce.
    #[inline(always)]
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Max amount of encrypted records to hold while the keys for their epoch
    /// are not yet derived.
    #[inline(always)]
    pub fn max_queue_rx(&self) -> usize {
        self.max_queue_rx
    }

    /// Max amount of outgoing datagrams to buffer.
    #[inline(always)]
    pub fn max_queue_tx(&self) -> usize {
        self.max_queue_tx
    }

    /// Max number of handshake messages being reassembled at the same time.
    #[inline(always)]
    pub fn max_buffered_messages(&self) -> usize {
        self.max_buffered_messages
    }

    /// Capacity of the application data queue between the reader and `Conn::read`.
    #[inline(always)]
    pub fn app_data_queue(&self) -> usize {
        self.app_data_queue
    }

    /// Time of first retry.
    ///
    /// Every flight restarts with this value.
    /// Doubled for every retry with a ±25% jitter.
    #[inline(always)]
    pub fn flight_start_rto(&self) -> Duration {
        self.flight_start_rto
    }

    /// Upper bound for the doubled retry timer.
    #[inline(always)]
    pub fn flight_max_rto(&self) -> Duration {
        self.flight_max_rto
    }

    /// Max number of retries per flight.
    #[inline(always)]
    pub fn flight_retries(&self) -> usize {
        self.flight_retries
    }

    /// Timeout for the entire handshake, regardless of flights.
    #[inline(always)]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Cipher suites we offer (client) or accept (server), in preference order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    /// Curves for ECDHE, in preference order.
    #[inline(always)]
    pub fn named_curves(&self) -> &[NamedCurve] {
        &self.named_curves
    }

    /// SRTP profiles for use_srtp (RFC 5764). Empty disables the extension.
    #[inline(always)]
    pub fn srtp_profiles(&self) -> &[SrtpProfile] {
        &self.srtp_profiles
    }

    #[inline(always)]
    pub fn extended_master_secret(&self) -> ExtendedMasterSecretPolicy {
        self.extended_master_secret
    }

    /// For a server, require a client certificate.
    ///
    /// This will cause the server to send a CertificateRequest message.
    /// Makes the server fail if the client does not send a certificate.
    #[inline(always)]
    pub fn require_client_certificate(&self) -> bool {
        self.require_client_certificate
    }

    /// Local certificate chain and key.
    #[inline(always)]
    pub fn certificate(&self) -> Option<&DtlsCertificate> {
        self.certificate.as_ref()
    }

    #[inline(always)]
    pub(crate) fn signing_key(&self) -> Option<&SigningKey> {
        self.signing_key.as_ref()
    }

    /// Verifier for the peer's certificate chain.
    #[inline(always)]
    pub fn cert_verifier(&self) -> &dyn CertVerifier {
        &*self.cert_verifier
    }

    /// Server name sent as SNI by a client.
    #[inline(always)]
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// Seed for non-secret randomness (timer jitter and explicit nonces).
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("mtu", &self.mtu)
            .field("cipher_suites", &self.cipher_suites)
            .field("named_curves", &self.named_curves)
            .field("srtp_profiles", &self.srtp_profiles)
            .field("extended_master_secret", &self.extended_master_secret)
            .field("require_client_certificate", &self.require_client_certificate)
            .field("certificate", &self.certificate)
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

/// Builder for DTLS configuration.
pub struct ConfigBuilder {
    mtu: usize,
    max_queue_rx: usize,
    max_queue_tx: usize,
    max_buffered_messages: usize,
    app_data_queue: usize,
    flight_start_rto: Duration,
    flight_max_rto: Duration,
    flight_retries: usize,
    handshake_timeout: Duration,
    cipher_suites: Vec<CipherSuite>,
    named_curves: Vec<NamedCurve>,
    srtp_profiles: Vec<SrtpProfile>,
    extended_master_secret: ExtendedMasterSecretPolicy,
    require_client_certificate: bool,
    certificate: Option<DtlsCertificate>,
    cert_verifier: Arc<dyn CertVerifier>,
    server_name: Option<String>,
    rng_seed: Option<u64>,
}

impl ConfigBuilder {
    /// Set the max transmission unit (MTU).
    ///
    /// The largest size UDP packets we will produce.
    /// Defaults to 1150.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the max amount of encrypted records held before their keys exist.
    ///
    /// Defaults to 30.
    pub fn max_queue_rx(mut self, max_queue_rx: usize) -> Self {
        self.max_queue_rx = max_queue_rx;
        self
    }

    /// Set the max amount of outgoing datagrams to buffer.
    ///
    /// Defaults to 10.
    pub fn max_queue_tx(mut self, max_queue_tx: usize) -> Self {
        self.max_queue_tx = max_queue_tx;
        self
    }

    /// Set how many incomplete handshake messages may be buffered.
    ///
    /// Fragments starting a new message beyond this are dropped.
    /// Defaults to 8.
    pub fn max_buffered_messages(mut self, max: usize) -> Self {
        self.max_buffered_messages = max;
        self
    }

    /// Set the number of decrypted application records queued for the reader.
    ///
    /// Defaults to 16.
    pub fn app_data_queue(mut self, len: usize) -> Self {
        self.app_data_queue = len;
        self
    }

    /// Set the time of first retry.
    ///
    /// Every flight restarts with this value.
    /// Doubled for every retry with a ±25% jitter.
    /// Defaults to 1 second.
    pub fn flight_start_rto(mut self, rto: Duration) -> Self {
        self.flight_start_rto = rto;
        self
    }

    /// Set the cap for the doubled retry timer.
    ///
    /// Defaults to 60 seconds.
    pub fn flight_max_rto(mut self, rto: Duration) -> Self {
        self.flight_max_rto = rto;
        self
    }

    /// Set the max number of retries per flight.
    ///
    /// Defaults to 4.
    pub fn flight_retries(mut self, retries: usize) -> Self {
        self.flight_retries = retries;
        self
    }

    /// Set the timeout for the entire handshake, regardless of flights.
    ///
    /// Defaults to 40 seconds.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the cipher suites, in preference order.
    ///
    /// Defaults to ECDHE-ECDSA-AES128-GCM-SHA256, ECDHE-ECDSA-AES256-GCM-SHA384.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    /// Set the ECDHE curves, in preference order.
    ///
    /// Defaults to X25519, P-256, P-384.
    pub fn named_curves(mut self, curves: &[NamedCurve]) -> Self {
        self.named_curves = curves.to_vec();
        self
    }

    /// Set the SRTP protection profiles for DTLS-SRTP (RFC 5764).
    ///
    /// Defaults to none, which leaves out the use_srtp extension.
    pub fn srtp_profiles(mut self, profiles: &[SrtpProfile]) -> Self {
        self.srtp_profiles = profiles.to_vec();
        self
    }

    /// Set the extended master secret (RFC 7627) policy.
    ///
    /// Defaults to `Request`.
    pub fn extended_master_secret(mut self, policy: ExtendedMasterSecretPolicy) -> Self {
        self.extended_master_secret = policy;
        self
    }

    /// Set whether to require a client certificate (for servers).
    ///
    /// This will cause the server to send a CertificateRequest message.
    /// Makes the server fail if the client does not send a certificate.
    /// Defaults to false.
    pub fn require_client_certificate(mut self, require: bool) -> Self {
        self.require_client_certificate = require;
        self
    }

    /// Set the local certificate. Required for servers.
    pub fn certificate(mut self, certificate: DtlsCertificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Set the verifier for the peer's certificate.
    ///
    /// Defaults to accepting any certificate.
    pub fn cert_verifier(mut self, verifier: Arc<dyn CertVerifier>) -> Self {
        self.cert_verifier = verifier;
        self
    }

    /// Set the server name a client sends in the server_name extension.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Seed non-secret randomness for reproducible tests.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigError` if no supported cipher suite or curve
    /// remains, the MTU is too small, or the private key cannot be parsed.
    pub fn build(self) -> Result<Config, Error> {
        if !self.cipher_suites.iter().any(|s| s.is_supported()) {
            return Err(Error::ConfigError("No supported cipher suite".into()));
        }
        if !self.named_curves.iter().any(|c| c.is_supported()) {
            return Err(Error::ConfigError("No supported named curve".into()));
        }

        let overhead = RECORD_HEADER_LEN + HANDSHAKE_HEADER_LEN + DTLS_AEAD_OVERHEAD;
        if self.mtu < MIN_MTU.max(overhead + 1) {
            return Err(Error::ConfigError(format!("MTU {} too small", self.mtu)));
        }
        if self.max_queue_tx == 0 || self.app_data_queue == 0 {
            return Err(Error::ConfigError("Queue sizes must be non-zero".into()));
        }

        let signing_key = match &self.certificate {
            Some(cert) => {
                if cert.certificate_chain.is_empty() {
                    return Err(Error::ConfigError("Empty certificate chain".into()));
                }
                Some(SigningKey::from_pkcs8_der(&cert.private_key)?)
            }
            None => None,
        };

        let cipher_suites = self
            .cipher_suites
            .into_iter()
            .filter(|s| s.is_supported())
            .collect();
        let named_curves = self
            .named_curves
            .into_iter()
            .filter(|c| c.is_supported())
            .collect();

        Ok(Config {
            mtu: self.mtu,
            max_queue_rx: self.max_queue_rx,
            max_queue_tx: self.max_queue_tx,
            max_buffered_messages: self.max_buffered_messages,
            app_data_queue: self.app_data_queue,
            flight_start_rto: self.flight_start_rto,
            flight_max_rto: self.flight_max_rto,
            flight_retries: self.flight_retries,
            handshake_timeout: self.handshake_timeout,
            cipher_suites,
            named_curves,
            srtp_profiles: self.srtp_profiles,
            extended_master_secret: self.extended_master_secret,
            require_client_certificate: self.require_client_certificate,
            certificate: self.certificate,
            signing_key,
            cert_verifier: self.cert_verifier,
            server_name: self.server_name,
            rng_seed: self.rng_seed,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mtu: 1150,
            max_queue_rx: 30,
            max_queue_tx: 10,
            max_buffered_messages: 8,
            app_data_queue: 16,
            flight_start_rto: Duration::from_secs(1),
            flight_max_rto: Duration::from_secs(60),
            flight_retries: 4,
            handshake_timeout: Duration::from_secs(40),
            cipher_suites: CipherSuite::supported().to_vec(),
            named_curves: NamedCurve::supported().to_vec(),
            srtp_profiles: Vec::new(),
            extended_master_secret: ExtendedMasterSecretPolicy::Request,
            require_client_certificate: false,
            certificate: None,
            signing_key: None,
            cert_verifier: Arc::new(AcceptAnyVerifier),
            server_name: None,
            rng_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::generate_self_signed_certificate;

    #[test]
    fn defaults() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.mtu(), 1150);
        assert_eq!(config.max_buffered_messages(), 8);
        assert_eq!(config.flight_retries(), 4);
        assert_eq!(config.extended_master_secret(), ExtendedMasterSecretPolicy::Request);
        assert!(config.srtp_profiles().is_empty());
        assert!(config.certificate().is_none());
        assert_eq!(config.cipher_suites(), CipherSuite::supported().as_slice());
    }

    #[test]
    fn key_is_parsed_at_build() {
        let cert = generate_self_signed_certificate().unwrap();
        let config = Config::builder().certificate(cert).build().unwrap();
        assert!(config.signing_key().is_some());

        let broken = DtlsCertificate {
            certificate_chain: vec![vec![0x30]],
            private_key: vec![1, 2, 3],
        };
        assert!(matches!(
            Config::builder().certificate(broken).build(),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn unsupported_lists_rejected() {
        let only_rsa = Config::builder()
            .cipher_suites(&[CipherSuite::ECDHE_RSA_AES128_GCM_SHA256])
            .build();
        assert!(matches!(only_rsa, Err(Error::ConfigError(_))));

        let mixed = Config::builder()
            .cipher_suites(&[
                CipherSuite::ECDHE_RSA_AES128_GCM_SHA256,
                CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
            ])
            .build()
            .unwrap();
        assert_eq!(
            mixed.cipher_suites(),
            &[CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384]
        );

        assert!(Config::builder()
            .named_curves(&[NamedCurve::X448])
            .build()
            .is_err());
        assert!(Config::builder().mtu(100).build().is_err());
    }
}
