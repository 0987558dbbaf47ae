use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::ecdh::EphemeralSecret as P256Secret;
use p384::ecdh::EphemeralSecret as P384Secret;
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret as X25519Secret};
use zeroize::Zeroizing;

use crate::message::NamedCurve;
use crate::Error;

/// Ephemeral ECDHE key pair.
pub struct Keypair {
    inner: Inner,
    public_key: Vec<u8>,
}

enum Inner {
    X25519(X25519Secret),
    P256(P256Secret),
    P384(P384Secret),
}

impl Keypair {
    pub fn generate(curve: NamedCurve) -> Result<Self, Error> {
        let (inner, public_key) = match curve {
            NamedCurve::X25519 => {
                let secret = X25519Secret::random_from_rng(OsRng);
                let public = X25519Public::from(&secret);
                (Inner::X25519(secret), public.as_bytes().to_vec())
            }
            NamedCurve::Secp256r1 => {
                let secret = P256Secret::random(&mut OsRng);
                let public = secret.public_key().to_encoded_point(false);
                (Inner::P256(secret), public.as_bytes().to_vec())
            }
            NamedCurve::Secp384r1 => {
                let secret = P384Secret::random(&mut OsRng);
                let public = secret.public_key().to_encoded_point(false);
                (Inner::P384(secret), public.as_bytes().to_vec())
            }
            _ => {
                return Err(Error::KeyGeneration(format!(
                    "Unsupported curve: {:?}",
                    curve
                )))
            }
        };

        Ok(Keypair { inner, public_key })
    }

    pub fn curve(&self) -> NamedCurve {
        match self.inner {
            Inner::X25519(_) => NamedCurve::X25519,
            Inner::P256(_) => NamedCurve::Secp256r1,
            Inner::P384(_) => NamedCurve::Secp384r1,
        }
    }

    /// Public key as sent on the wire (uncompressed point or 32 bytes for X25519).
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// The pre-master secret.
    pub fn compute_shared_secret(&self, peer: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        match &self.inner {
            Inner::X25519(secret) => {
                let bytes: [u8; 32] = peer
                    .try_into()
                    .map_err(|_| Error::CryptoError("Invalid X25519 public key".into()))?;
                let shared = secret.diffie_hellman(&X25519Public::from(bytes));
                if !shared.was_contributory() {
                    return Err(Error::CryptoError("Non-contributory X25519 key".into()));
                }
                Ok(Zeroizing::new(shared.as_bytes().to_vec()))
            }
            Inner::P256(secret) => {
                let point = p256::EncodedPoint::from_bytes(peer)
                    .map_err(|_| Error::CryptoError("Invalid P-256 public key".into()))?;
                let public = Option::<p256::PublicKey>::from(p256::PublicKey::from_encoded_point(
                    &point,
                ))
                .ok_or_else(|| Error::CryptoError("P-256 point not on curve".into()))?;
                let shared = secret.diffie_hellman(&public);
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            }
            Inner::P384(secret) => {
                let point = p384::EncodedPoint::from_bytes(peer)
                    .map_err(|_| Error::CryptoError("Invalid P-384 public key".into()))?;
                let public = Option::<p384::PublicKey>::from(p384::PublicKey::from_encoded_point(
                    &point,
                ))
                .ok_or_else(|| Error::CryptoError("P-384 point not on curve".into()))?;
                let shared = secret.diffie_hellman(&public);
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            }
        }
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("curve", &self.curve())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_on_every_supported_curve() {
        for curve in NamedCurve::supported() {
            let a = Keypair::generate(curve).unwrap();
            let b = Keypair::generate(curve).unwrap();
            assert_eq!(a.curve(), curve);

            let ab = a.compute_shared_secret(b.public_key()).unwrap();
            let ba = b.compute_shared_secret(a.public_key()).unwrap();
            assert_eq!(&ab[..], &ba[..]);
        }
    }

    #[test]
    fn public_key_sizes() {
        assert_eq!(Keypair::generate(NamedCurve::X25519).unwrap().public_key().len(), 32);
        assert_eq!(
            Keypair::generate(NamedCurve::Secp256r1).unwrap().public_key().len(),
            65
        );
        assert_eq!(
            Keypair::generate(NamedCurve::Secp384r1).unwrap().public_key().len(),
            97
        );
    }

    #[test]
    fn unsupported_curve() {
        assert!(matches!(
            Keypair::generate(NamedCurve::X448),
            Err(Error::KeyGeneration(_))
        ));
    }

    #[test]
    fn garbage_peer_key() {
        let a = Keypair::generate(NamedCurve::Secp256r1).unwrap();
        assert!(a.compute_shared_secret(&[4, 1, 2, 3]).is_err());
        let x = Keypair::generate(NamedCurve::X25519).unwrap();
        assert!(x.compute_shared_secret(&[0; 31]).is_err());
        assert!(x.compute_shared_secret(&[0; 32]).is_err());
    }
}
