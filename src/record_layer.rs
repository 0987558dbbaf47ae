//! Record framing and AEAD protection for epochs above 0.
//!
//! An encrypted record's fragment is `explicit_nonce(8) || ciphertext || tag(16)`.
//! The nonce is the 4 byte write IV followed by the explicit part, and the
//! additional data covers sequence, epoch, content type, version and the
//! plaintext length.

use zeroize::Zeroizing;

use crate::crypto::{prf, AesGcm, Aad, Iv, Nonce};
use crate::crypto::{DTLS_AEAD_OVERHEAD, DTLS_EXPLICIT_NONCE_LEN};
use crate::message::{CipherSuite, ContentType, DTLSRecord, Sequence};
use crate::Error;

/// Bulk ciphers for both directions of a connection.
#[derive(Debug)]
pub(crate) struct RecordProtection {
    local: AesGcm,
    local_iv: Iv,
    remote: AesGcm,
    remote_iv: Iv,
}

impl RecordProtection {
    /// Expand the master secret into write keys and IVs (RFC 5246 6.3).
    pub fn derive(
        suite: CipherSuite,
        master_secret: &[u8],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        is_client: bool,
    ) -> Result<Self, Error> {
        let key_len = suite.key_len();
        let iv_len = suite.fixed_iv_len();
        let key_block: Zeroizing<Vec<u8>> = prf::key_expansion(
            master_secret,
            client_random,
            server_random,
            2 * key_len + 2 * iv_len,
            suite.hash_algorithm(),
        )?;

        // client_write_key, server_write_key, client_write_IV, server_write_IV
        let (client_key, rest) = key_block.split_at(key_len);
        let (server_key, rest) = rest.split_at(key_len);
        let (client_iv, server_iv) = rest.split_at(iv_len);

        let client_iv = iv(client_iv)?;
        let server_iv = iv(server_iv)?;

        let client = AesGcm::new(client_key)?;
        let server = AesGcm::new(server_key)?;

        Ok(if is_client {
            RecordProtection {
                local: client,
                local_iv: client_iv,
                remote: server,
                remote_iv: server_iv,
            }
        } else {
            RecordProtection {
                local: server,
                local_iv: server_iv,
                remote: client,
                remote_iv: client_iv,
            }
        })
    }

    /// Encrypt a plaintext fragment to its wire form.
    pub fn seal(
        &self,
        content_type: ContentType,
        sequence: Sequence,
        plaintext: &[u8],
        explicit_nonce: [u8; DTLS_EXPLICIT_NONCE_LEN],
    ) -> Result<Vec<u8>, Error> {
        let nonce = Nonce::new(self.local_iv, &explicit_nonce);
        let aad = Aad::new(content_type, sequence, plaintext.len() as u16);
        let ciphertext = self.local.seal(&nonce, &aad, plaintext)?;

        let mut out = Vec::with_capacity(DTLS_EXPLICIT_NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&explicit_nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a received fragment. Any failure is [`Error::BadRecordMac`].
    pub fn open(
        &self,
        content_type: ContentType,
        sequence: Sequence,
        fragment: &[u8],
    ) -> Result<Vec<u8>, Error> {
        if fragment.len() < DTLS_AEAD_OVERHEAD {
            return Err(Error::BadRecordMac);
        }
        let (explicit, ciphertext) = fragment.split_at(DTLS_EXPLICIT_NONCE_LEN);
        let explicit: [u8; DTLS_EXPLICIT_NONCE_LEN] =
            explicit.try_into().map_err(|_| Error::BadRecordMac)?;

        let nonce = Nonce::new(self.remote_iv, &explicit);
        let plaintext_len = (fragment.len() - DTLS_AEAD_OVERHEAD) as u16;
        let aad = Aad::new(content_type, sequence, plaintext_len);

        self.remote
            .open(&nonce, &aad, ciphertext)
            .map_err(|_| Error::BadRecordMac)
    }
}

fn iv(bytes: &[u8]) -> Result<Iv, Error> {
    let fixed: [u8; 4] = bytes
        .try_into()
        .map_err(|_| Error::CryptoError(format!("Invalid IV length: {}", bytes.len())))?;
    Ok(Iv(fixed))
}

/// Serialize one record with the given payload.
pub(crate) fn marshal(content_type: ContentType, sequence: Sequence, payload: &[u8]) -> Vec<u8> {
    DTLSRecord::new(content_type, sequence, payload).marshal()
}

/// Split a datagram into its records. Any record that does not parse fails
/// the whole datagram.
pub(crate) fn split_records(datagram: &[u8]) -> Result<Vec<DTLSRecord<'_>>, Error> {
    let mut records = Vec::new();
    let mut input = datagram;
    while !input.is_empty() {
        let (rest, record) = DTLSRecord::parse(input)?;
        records.push(record);
        input = rest;
    }
    Ok(records)
}
