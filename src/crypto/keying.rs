//! DTLS-SRTP profiles and exported keying material (RFC 5764).
use std::ops::Deref;

use zeroize::Zeroizing;

use crate::message::SrtpProfileId;

/// Exporter label for DTLS-SRTP.
pub const SRTP_EXPORTER_LABEL: &str = "EXTRACTOR-dtls_srtp";

/// Keying material used as master key and salt for SRTP.
pub struct KeyingMaterial(Zeroizing<Vec<u8>>);

impl KeyingMaterial {
    pub fn new(m: Zeroizing<Vec<u8>>) -> Self {
        KeyingMaterial(m)
    }
}

impl Deref for KeyingMaterial {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Debug for KeyingMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyingMaterial({} bytes)", self.0.len())
    }
}

/// SRTP protection profiles that can be negotiated with use_srtp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrtpProfile {
    /// SRTP_AES128_CM_HMAC_SHA1_80 (RFC 5764)
    Aes128CmSha1_80,
    /// SRTP_AES128_CM_HMAC_SHA1_32 (RFC 5764)
    Aes128CmSha1_32,
    /// AEAD_AES_128_GCM (RFC 7714)
    AeadAes128Gcm,
    /// AEAD_AES_256_GCM (RFC 7714)
    AeadAes256Gcm,
}

impl SrtpProfile {
    /// All profiles ordered by preference.
    pub const ALL: &'static [SrtpProfile] = &[
        SrtpProfile::AeadAes256Gcm,
        SrtpProfile::AeadAes128Gcm,
        SrtpProfile::Aes128CmSha1_80,
        SrtpProfile::Aes128CmSha1_32,
    ];

    /// Bytes of keying material to export: two master keys and two salts.
    #[rustfmt::skip]
    pub fn keying_material_len(&self) -> usize {
        match self {
            SrtpProfile::Aes128CmSha1_80 => 16 * 2 + 14 * 2,
            SrtpProfile::Aes128CmSha1_32 => 16 * 2 + 14 * 2,
            SrtpProfile::AeadAes128Gcm   => 16 * 2 + 12 * 2,
            SrtpProfile::AeadAes256Gcm   => 32 * 2 + 12 * 2,
        }
    }

    pub fn id(&self) -> SrtpProfileId {
        match self {
            SrtpProfile::Aes128CmSha1_80 => SrtpProfileId::SrtpAes128CmSha1_80,
            SrtpProfile::Aes128CmSha1_32 => SrtpProfileId::SrtpAes128CmSha1_32,
            SrtpProfile::AeadAes128Gcm => SrtpProfileId::SrtpAeadAes128Gcm,
            SrtpProfile::AeadAes256Gcm => SrtpProfileId::SrtpAeadAes256Gcm,
        }
    }

    pub fn from_id(id: SrtpProfileId) -> Option<Self> {
        match id {
            SrtpProfileId::SrtpAes128CmSha1_80 => Some(SrtpProfile::Aes128CmSha1_80),
            SrtpProfileId::SrtpAes128CmSha1_32 => Some(SrtpProfile::Aes128CmSha1_32),
            SrtpProfileId::SrtpAeadAes128Gcm => Some(SrtpProfile::AeadAes128Gcm),
            SrtpProfileId::SrtpAeadAes256Gcm => Some(SrtpProfile::AeadAes256Gcm),
            SrtpProfileId::Unknown(_) => None,
        }
    }
}

impl std::fmt::Display for SrtpProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SrtpProfile::Aes128CmSha1_80 => write!(f, "SRTP_AES128_CM_SHA1_80"),
            SrtpProfile::Aes128CmSha1_32 => write!(f, "SRTP_AES128_CM_SHA1_32"),
            SrtpProfile::AeadAes128Gcm => write!(f, "SRTP_AEAD_AES_128_GCM"),
            SrtpProfile::AeadAes256Gcm => write!(f, "SRTP_AEAD_AES_256_GCM"),
        }
    }
}
