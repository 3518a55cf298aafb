use const_oid::ObjectIdentifier;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{ProvKitError, Result};

/// Block size `v` of both supported digests.
const BLOCK_LEN: usize = 64;

/// Diversifiers of RFC 7292 B.3.
pub(crate) const CIPHER_KEY_ID: u8 = 1;
pub(crate) const CIPHER_IV_ID: u8 = 2;
const MAC_KEY_ID: u8 = 3;

/// Digests accepted for the archive integrity MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAlgorithm {
    Sha1,
    Sha256,
}

impl MacAlgorithm {
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            MacAlgorithm::Sha1 => const_oid::db::rfc5912::ID_SHA_1,
            MacAlgorithm::Sha256 => const_oid::db::rfc5912::ID_SHA_256,
        }
    }

    pub fn from_oid(oid: ObjectIdentifier) -> Result<Self> {
        match oid {
            const_oid::db::rfc5912::ID_SHA_1 => Ok(MacAlgorithm::Sha1),
            const_oid::db::rfc5912::ID_SHA_256 => Ok(MacAlgorithm::Sha256),
            other => Err(ProvKitError::UnsupportedAlgorithm(format!(
                "MAC digest {other}"
            ))),
        }
    }

    fn output_len(self) -> usize {
        match self {
            MacAlgorithm::Sha1 => 20,
            MacAlgorithm::Sha256 => 32,
        }
    }
}

/// Password as a NUL-terminated big-endian BMPString.
pub(crate) fn bmp_password(password: &str) -> Zeroizing<Vec<u8>> {
    let mut encoded: Vec<u8> = password
        .encode_utf16()
        .flat_map(u16::to_be_bytes)
        .collect();
    encoded.extend_from_slice(&[0, 0]);
    Zeroizing::new(encoded)
}

/// The RFC 7292 appendix B.2 key derivation.
///
/// # Arguments
/// * `password` - BMPString-encoded password, see [`bmp_password`].
/// * `salt` - Salt from the archive.
/// * `id` - Purpose diversifier: 1 key, 2 IV, 3 MAC key.
/// * `iterations` - Hash iteration count `r`.
/// * `len` - Number of bytes to produce.
pub(crate) fn derive_key<D: Digest>(
    password: &[u8],
    salt: &[u8],
    id: u8,
    iterations: u32,
    len: usize,
) -> Zeroizing<Vec<u8>> {
    let diversifier = [id; BLOCK_LEN];
    let mut input = Zeroizing::new(Vec::new());
    input.extend(fill_blocks(salt));
    input.extend(fill_blocks(password));

    let mut output = Zeroizing::new(Vec::with_capacity(len));
    while output.len() < len {
        let mut a = D::new()
            .chain_update(diversifier)
            .chain_update(input.as_slice())
            .finalize();
        for _ in 1..iterations {
            a = D::digest(&a);
        }
        let take = (len - output.len()).min(a.len());
        output.extend_from_slice(&a[..take]);
        if output.len() >= len {
            break;
        }

        let b: Vec<u8> = a.iter().copied().cycle().take(BLOCK_LEN).collect();
        for block in input.chunks_mut(BLOCK_LEN) {
            // block = (block + b + 1) mod 2^(8v)
            let mut carry = 1u16;
            for k in (0..BLOCK_LEN).rev() {
                let sum = u16::from(block[k]) + u16::from(b[k]) + carry;
                block[k] = sum as u8;
                carry = sum >> 8;
            }
        }
    }
    output
}

/// Repeats `data` to the smallest multiple of the block length that holds it.
fn fill_blocks(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let len = data.len().div_ceil(BLOCK_LEN) * BLOCK_LEN;
    data.iter().copied().cycle().take(len).collect()
}

/// HMAC over `data` keyed from the password, as stored in `MacData`.
pub(crate) fn compute_mac(
    algorithm: MacAlgorithm,
    password: &str,
    salt: &[u8],
    iterations: u32,
    data: &[u8],
) -> Result<Vec<u8>> {
    let password = bmp_password(password);
    let key_len = algorithm.output_len();
    let tag = match algorithm {
        MacAlgorithm::Sha1 => {
            let key = derive_key::<Sha1>(&password, salt, MAC_KEY_ID, iterations, key_len);
            let mut mac = Hmac::<Sha1>::new_from_slice(&key)
                .map_err(|e| ProvKitError::EncodingError(e.to_string()))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        MacAlgorithm::Sha256 => {
            let key = derive_key::<Sha256>(&password, salt, MAC_KEY_ID, iterations, key_len);
            let mut mac = Hmac::<Sha256>::new_from_slice(&key)
                .map_err(|e| ProvKitError::EncodingError(e.to_string()))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(tag)
}

/// Checks a stored MAC; any mismatch reads as a wrong password.
pub(crate) fn verify_mac(
    algorithm: MacAlgorithm,
    password: &str,
    salt: &[u8],
    iterations: u32,
    data: &[u8],
    expected: &[u8],
) -> Result<()> {
    let password = bmp_password(password);
    let key_len = algorithm.output_len();
    let verified = match algorithm {
        MacAlgorithm::Sha1 => {
            let key = derive_key::<Sha1>(&password, salt, MAC_KEY_ID, iterations, key_len);
            let mut mac = Hmac::<Sha1>::new_from_slice(&key)
                .map_err(|_| ProvKitError::DecryptionFailed)?;
            mac.update(data);
            mac.verify_slice(expected).is_ok()
        }
        MacAlgorithm::Sha256 => {
            let key = derive_key::<Sha256>(&password, salt, MAC_KEY_ID, iterations, key_len);
            let mut mac = Hmac::<Sha256>::new_from_slice(&key)
                .map_err(|_| ProvKitError::DecryptionFailed)?;
            mac.update(data);
            mac.verify_slice(expected).is_ok()
        }
    };
    if verified {
        Ok(())
    } else {
        Err(ProvKitError::DecryptionFailed)
    }
}
