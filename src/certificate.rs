//! Certificates, fingerprints and peer certificate verification.
//!
//! Peers in a DTLS-SRTP setup typically use self-signed certificates and
//! authenticate each other by the SHA-256 fingerprint exchanged out of band.
//! [`FingerprintVerifier`] implements that model. Anything else plugs in
//! through [`CertVerifier`].

use std::fmt;

use rcgen::{
    Certificate as RcgenCertificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    SignatureAlgorithm, PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384,
};
use sha2::{Digest, Sha256};

use crate::Error;

/// Certificate chain and private key for the local end.
#[derive(Clone)]
pub struct DtlsCertificate {
    /// DER certificates, leaf first.
    pub certificate_chain: Vec<Vec<u8>>,
    /// PKCS#8 DER private key for the leaf.
    pub private_key: Vec<u8>,
}

impl DtlsCertificate {
    /// SHA-256 fingerprint of the leaf certificate.
    pub fn fingerprint(&self) -> Vec<u8> {
        self.certificate_chain
            .first()
            .map(|c| calculate_fingerprint(c))
            .unwrap_or_default()
    }

    /// Fingerprint as colon separated hex, for example "AF:12:F6:...".
    pub fn fingerprint_str(&self) -> String {
        format_fingerprint(&self.fingerprint())
    }
}

impl fmt::Debug for DtlsCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtlsCertificate")
            .field("certificate_chain", &self.certificate_chain.len())
            .field("private_key", &"..")
            .finish()
    }
}

/// Generate a self-signed P-256 certificate.
pub fn generate_self_signed_certificate() -> Result<DtlsCertificate, Error> {
    generate(&PKCS_ECDSA_P256_SHA256)
}

/// Generate a self-signed P-384 certificate.
pub fn generate_self_signed_p384() -> Result<DtlsCertificate, Error> {
    generate(&PKCS_ECDSA_P384_SHA384)
}

fn generate(alg: &'static SignatureAlgorithm) -> Result<DtlsCertificate, Error> {
    let key_pair = KeyPair::generate(alg).map_err(|e| Error::KeyGeneration(e.to_string()))?;

    let mut params = CertificateParams::new(vec!["dtls-flight".to_string()]);

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::OrganizationName, "dtls-flight".to_string());
    distinguished_name.push(DnType::CommonName, "DTLS Peer".to_string());
    params.distinguished_name = distinguished_name;
    params.is_ca = IsCa::NoCa;
    params.alg = alg;
    params.key_pair = Some(key_pair);

    let not_before = time::OffsetDateTime::now_utc() - time::Duration::days(1);
    params.not_before = not_before;
    params.not_after = not_before + time::Duration::days(365);

    let cert =
        RcgenCertificate::from_params(params).map_err(|e| Error::KeyGeneration(e.to_string()))?;
    let cert_der = cert
        .serialize_der()
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;

    Ok(DtlsCertificate {
        certificate_chain: vec![cert_der],
        private_key: cert.serialize_private_key_der(),
    })
}

/// SHA-256 over the DER certificate.
pub fn calculate_fingerprint(cert_der: &[u8]) -> Vec<u8> {
    Sha256::digest(cert_der).to_vec()
}

pub fn format_fingerprint(fingerprint: &[u8]) -> String {
    fingerprint
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(":")
}

/// Decides whether a peer's certificate chain is acceptable.
///
/// Called with the chain as received, leaf first. Signatures made with the
/// leaf key are checked by the handshake itself.
pub trait CertVerifier: Send + Sync + fmt::Debug {
    fn verify(&self, chain: &[&[u8]]) -> Result<(), Error>;
}

/// Accepts any chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAnyVerifier;

impl CertVerifier for AcceptAnyVerifier {
    fn verify(&self, _chain: &[&[u8]]) -> Result<(), Error> {
        Ok(())
    }
}

/// Accepts a leaf whose SHA-256 fingerprint is in a pinned set.
#[derive(Debug, Clone)]
pub struct FingerprintVerifier {
    fingerprints: Vec<Vec<u8>>,
}

impl FingerprintVerifier {
    pub fn new<I>(fingerprints: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        FingerprintVerifier {
            fingerprints: fingerprints.into_iter().collect(),
        }
    }
}

impl CertVerifier for FingerprintVerifier {
    fn verify(&self, chain: &[&[u8]]) -> Result<(), Error> {
        let Some(leaf) = chain.first() else {
            return Err(Error::CertificateRejected("Empty chain".into()));
        };
        let fingerprint = calculate_fingerprint(leaf);
        if self.fingerprints.iter().any(|f| *f == fingerprint) {
            Ok(())
        } else {
            Err(Error::CertificateRejected(format!(
                "Fingerprint {} not pinned",
                format_fingerprint(&fingerprint)
            )))
        }
    }
}
