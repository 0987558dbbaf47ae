use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm};

use super::{Aad, Nonce};
use crate::Error;

/// AES-GCM bulk cipher for one direction of a connection.
pub enum AesGcm {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl AesGcm {
    /// Key size picks the variant: 16 bytes for AES-128, 32 for AES-256.
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(|c| AesGcm::Aes128(Box::new(c)))
                .map_err(|_| Error::CryptoError("Failed to create AES-128-GCM".into())),
            32 => Aes256Gcm::new_from_slice(key)
                .map(|c| AesGcm::Aes256(Box::new(c)))
                .map_err(|_| Error::CryptoError("Failed to create AES-256-GCM".into())),
            n => Err(Error::CryptoError(format!("Invalid AES-GCM key size: {}", n))),
        }
    }

    /// Returns ciphertext with the tag appended.
    pub fn seal(&self, nonce: &Nonce, aad: &Aad, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let nonce = aes_gcm::Nonce::from_slice(&nonce.0);
        let payload = Payload {
            msg: plaintext,
            aad: &aad.0,
        };

        match self {
            AesGcm::Aes128(c) => c.encrypt(nonce, payload),
            AesGcm::Aes256(c) => c.encrypt(nonce, payload),
        }
        .map_err(|_| Error::CryptoError("Encryption failed".into()))
    }

    /// Fails if the tag does not authenticate.
    pub fn open(&self, nonce: &Nonce, aad: &Aad, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        let nonce = aes_gcm::Nonce::from_slice(&nonce.0);
        let payload = Payload {
            msg: ciphertext,
            aad: &aad.0,
        };

        match self {
            AesGcm::Aes128(c) => c.decrypt(nonce, payload),
            AesGcm::Aes256(c) => c.decrypt(nonce, payload),
        }
        .map_err(|_| Error::CryptoError("Record failed authentication".into()))
    }
}

impl std::fmt::Debug for AesGcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AesGcm::Aes128(_) => f.write_str("AesGcm::Aes128"),
            AesGcm::Aes256(_) => f.write_str("AesGcm::Aes256"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Iv;
    use crate::message::{ContentType, Sequence};

    fn material() -> (Nonce, Aad) {
        let nonce = Nonce::new(Iv([9; 4]), &[1, 2, 3, 4, 5, 6, 7, 8]);
        let aad = Aad::new(ContentType::ApplicationData, Sequence::new(1, 4), 5);
        (nonce, aad)
    }

    #[test]
    fn seal_then_open() {
        let cipher = AesGcm::new(&[7; 16]).unwrap();
        let (nonce, aad) = material();

        let sealed = cipher.seal(&nonce, &aad, b"hello").unwrap();
        assert_eq!(sealed.len(), 5 + 16);
        assert_eq!(cipher.open(&nonce, &aad, &sealed).unwrap(), b"hello");
    }

    #[test]
    fn tampering_fails_authentication() {
        let cipher = AesGcm::new(&[7; 32]).unwrap();
        let (nonce, aad) = material();
        let sealed = cipher.seal(&nonce, &aad, b"hello").unwrap();

        let mut flipped = sealed.clone();
        flipped[0] ^= 1;
        assert!(cipher.open(&nonce, &aad, &flipped).is_err());

        let mut other_aad = aad;
        other_aad.0[12] ^= 1;
        assert!(cipher.open(&nonce, &other_aad, &sealed).is_err());
    }

    #[test]
    fn bad_key_size() {
        assert!(AesGcm::new(&[0; 24]).is_err());
    }
}
