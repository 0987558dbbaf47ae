//! TLS 1.2 PRF (RFC 5246 section 5) and the secrets derived from it.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha384};
use zeroize::Zeroizing;

use crate::message::HashAlgorithm;
use crate::Error;

pub const MASTER_SECRET_LEN: usize = 48;

fn hmac(hash: HashAlgorithm, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, Error> {
    macro_rules! mac {
        ($d:ty) => {{
            let mut mac = <Hmac<$d> as Mac>::new_from_slice(key)
                .map_err(|e| Error::CryptoError(e.to_string()))?;
            for p in parts {
                mac.update(p);
            }
            Ok(mac.finalize().into_bytes().to_vec())
        }};
    }

    match hash {
        HashAlgorithm::SHA256 => mac!(Sha256),
        HashAlgorithm::SHA384 => mac!(Sha384),
        _ => Err(Error::CryptoError(format!(
            "Unsupported PRF hash: {:?}",
            hash
        ))),
    }
}

/// Digest of `data` with the suite hash.
pub fn hash(hash: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, Error> {
    match hash {
        HashAlgorithm::SHA256 => Ok(Sha256::digest(data).to_vec()),
        HashAlgorithm::SHA384 => Ok(Sha384::digest(data).to_vec()),
        _ => Err(Error::CryptoError(format!("Unsupported hash: {:?}", hash))),
    }
}

/// PRF(secret, label, seed) = P_<hash>(secret, label + seed)
pub fn prf_tls12(
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
    hash: HashAlgorithm,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let label = label.as_bytes();
    let mut out = Zeroizing::new(Vec::with_capacity(output_len));

    // A(1) = HMAC(secret, A(0)), A(0) = label + seed
    let mut a = hmac(hash, secret, &[label, seed])?;

    while out.len() < output_len {
        let block = hmac(hash, secret, &[&a, label, seed])?;
        let take = (output_len - out.len()).min(block.len());
        out.extend_from_slice(&block[..take]);
        a = hmac(hash, secret, &[&a])?;
    }

    Ok(out)
}

pub fn master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    hash: HashAlgorithm,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(client_random);
    seed[32..].copy_from_slice(server_random);
    prf_tls12(
        pre_master_secret,
        "master secret",
        &seed,
        MASTER_SECRET_LEN,
        hash,
    )
}

/// RFC 7627. `session_hash` is the transcript hash through ClientKeyExchange.
pub fn extended_master_secret(
    pre_master_secret: &[u8],
    session_hash: &[u8],
    hash: HashAlgorithm,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    prf_tls12(
        pre_master_secret,
        "extended master secret",
        session_hash,
        MASTER_SECRET_LEN,
        hash,
    )
}

/// Key block, RFC 5246 6.3. Note the seed order: server random first.
pub fn key_expansion(
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    len: usize,
    hash: HashAlgorithm,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(server_random);
    seed[32..].copy_from_slice(client_random);
    prf_tls12(master_secret, "key expansion", &seed, len, hash)
}

/// Finished verify data over the hash of the transcript.
pub fn verify_data(
    master_secret: &[u8],
    is_client: bool,
    transcript: &[u8],
    hash_alg: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    let label = if is_client {
        "client finished"
    } else {
        "server finished"
    };
    let handshake_hash = hash(hash_alg, transcript)?;
    let out = prf_tls12(master_secret, label, &handshake_hash, 12, hash_alg)?;
    Ok(out.to_vec())
}

/// Keying material exporter without context, RFC 5705.
pub fn export_keying_material(
    master_secret: &[u8],
    label: &str,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    len: usize,
    hash: HashAlgorithm,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(client_random);
    seed[32..].copy_from_slice(server_random);
    prf_tls12(master_secret, label, &seed, len, hash)
}
