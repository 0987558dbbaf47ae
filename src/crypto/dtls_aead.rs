//! DTLS 1.2 AEAD record formatting (RFC 5288, RFC 6347).

use crate::message::{ContentType, ProtocolVersion, Sequence};

/// Explicit nonce length for DTLS AEAD records.
///
/// The explicit nonce is transmitted in front of every ciphertext.
pub const DTLS_EXPLICIT_NONCE_LEN: usize = 8;

/// GCM authentication tag length.
pub const GCM_TAG_LEN: usize = 16;

/// Overhead per AEAD record (explicit nonce + tag).
pub const DTLS_AEAD_OVERHEAD: usize = DTLS_EXPLICIT_NONCE_LEN + GCM_TAG_LEN;

/// Implicit part of the nonce, the 4 byte write IV from the key block.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Iv(pub [u8; 4]);

impl std::fmt::Debug for Iv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Iv(..)")
    }
}

/// Full AEAD nonce: write IV followed by the explicit nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; 12]);

impl Nonce {
    pub fn new(iv: Iv, explicit_nonce: &[u8; DTLS_EXPLICIT_NONCE_LEN]) -> Self {
        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(&iv.0);
        nonce[4..].copy_from_slice(explicit_nonce);
        Self(nonce)
    }
}

/// Additional authenticated data for a DTLS 1.2 record.
///
/// `epoch(2) || sequence_number(6) || type(1) || version(2) || length(2)`,
/// where length is the plaintext length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aad(pub [u8; 13]);

impl Aad {
    pub fn new(content_type: ContentType, sequence: Sequence, plaintext_len: u16) -> Self {
        let mut aad = [0u8; 13];

        aad[..8].copy_from_slice(&sequence.sequence_number.to_be_bytes());
        aad[..2].copy_from_slice(&sequence.epoch.to_be_bytes());
        aad[8] = content_type.as_u8();
        aad[9..11].copy_from_slice(&ProtocolVersion::DTLS1_2.as_u16().to_be_bytes());
        aad[11..].copy_from_slice(&plaintext_len.to_be_bytes());

        Aad(aad)
    }
}
