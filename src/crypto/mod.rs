//! Cryptographic primitives used by the handshake and record layer.

mod cipher;
mod dtls_aead;
mod key_exchange;
mod keying;
pub mod prf;
mod signing;

pub use cipher::AesGcm;
pub use dtls_aead::{Aad, Iv, Nonce};
pub use dtls_aead::{DTLS_AEAD_OVERHEAD, DTLS_EXPLICIT_NONCE_LEN, GCM_TAG_LEN};
pub use key_exchange::Keypair;
pub use keying::{KeyingMaterial, SrtpProfile, SRTP_EXPORTER_LABEL};
pub use signing::{verify_signature, SigningKey};
