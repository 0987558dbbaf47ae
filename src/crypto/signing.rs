use der::Decode;
use p256::ecdsa::{Signature as P256Signature, SigningKey as P256SigningKey};
use p256::ecdsa::VerifyingKey as P256VerifyingKey;
use p384::ecdsa::{Signature as P384Signature, SigningKey as P384SigningKey};
use p384::ecdsa::VerifyingKey as P384VerifyingKey;
use pkcs8::DecodePrivateKey;
use signature::hazmat::PrehashVerifier;
use signature::Signer;
use spki::ObjectIdentifier;

use super::prf;
use crate::message::{SignatureAlgorithm, SignatureAndHashAlgorithm};
use crate::Error;

const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// Private ECDSA key used for ServerKeyExchange and CertificateVerify.
#[derive(Clone)]
pub enum SigningKey {
    P256(P256SigningKey),
    P384(P384SigningKey),
}

impl SigningKey {
    /// Parse a PKCS#8 DER encoded P-256 or P-384 key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, Error> {
        if let Ok(key) = P256SigningKey::from_pkcs8_der(der) {
            return Ok(SigningKey::P256(key));
        }
        if let Ok(key) = P384SigningKey::from_pkcs8_der(der) {
            return Ok(SigningKey::P384(key));
        }
        Err(Error::ConfigError(
            "Private key is not a PKCS#8 P-256 or P-384 ECDSA key".into(),
        ))
    }

    /// The scheme signatures from this key are made with.
    pub fn algorithm(&self) -> SignatureAndHashAlgorithm {
        match self {
            SigningKey::P256(_) => SignatureAndHashAlgorithm::ECDSA_SHA256,
            SigningKey::P384(_) => SignatureAndHashAlgorithm::ECDSA_SHA384,
        }
    }

    /// DER encoded ECDSA signature over `data`.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let der = match self {
            SigningKey::P256(key) => {
                let sig: P256Signature = key
                    .try_sign(data)
                    .map_err(|e| Error::CryptoError(e.to_string()))?;
                sig.to_der().as_bytes().to_vec()
            }
            SigningKey::P384(key) => {
                let sig: P384Signature = key
                    .try_sign(data)
                    .map_err(|e| Error::CryptoError(e.to_string()))?;
                sig.to_der().as_bytes().to_vec()
            }
        };
        Ok(der)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningKey::P256(_) => f.write_str("SigningKey::P256"),
            SigningKey::P384(_) => f.write_str("SigningKey::P384"),
        }
    }
}

/// Verify `signature` over `data` with the public key of a DER certificate.
///
/// Both curves accept either hash, the digest is truncated as ECDSA requires.
pub fn verify_signature(
    certificate: &[u8],
    data: &[u8],
    signature: &[u8],
    algorithm: SignatureAndHashAlgorithm,
) -> Result<(), Error> {
    if algorithm.signature != SignatureAlgorithm::ECDSA {
        debug!("Unsupported signature algorithm {:?}", algorithm);
        return Err(Error::InvalidSignature);
    }

    let cert = x509_cert::Certificate::from_der(certificate)
        .map_err(|e| Error::CertificateRejected(e.to_string()))?;
    let spki = &cert.tbs_certificate.subject_public_key_info;
    if spki.algorithm.oid != ID_EC_PUBLIC_KEY {
        return Err(Error::CertificateRejected(format!(
            "Not an EC public key: {}",
            spki.algorithm.oid
        )));
    }

    let point = spki.subject_public_key.raw_bytes();
    let digest = prf::hash(algorithm.hash, data).map_err(|_| Error::InvalidSignature)?;

    // Uncompressed SEC1 points: 65 bytes for P-256, 97 for P-384.
    let verified = match point.len() {
        65 => {
            let key = P256VerifyingKey::from_sec1_bytes(point)
                .map_err(|e| Error::CertificateRejected(e.to_string()))?;
            let sig = P256Signature::from_der(signature).map_err(|_| Error::InvalidSignature)?;
            key.verify_prehash(&digest, &sig).is_ok()
        }
        97 => {
            let key = P384VerifyingKey::from_sec1_bytes(point)
                .map_err(|e| Error::CertificateRejected(e.to_string()))?;
            let sig = P384Signature::from_der(signature).map_err(|_| Error::InvalidSignature)?;
            key.verify_prehash(&digest, &sig).is_ok()
        }
        n => {
            return Err(Error::CertificateRejected(format!(
                "Unsupported EC public key length {}",
                n
            )))
        }
    };

    if verified {
        Ok(())
    } else {
        Err(Error::InvalidSignature)
    }
}
