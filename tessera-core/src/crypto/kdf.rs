//! HKDF-SHA-512 (RFC 5869)
//!
//! Key derivation for the HSM providers. Extract produces a PRK with
//! HMAC-SHA-512; expand chains HMAC blocks over `info` and a counter and
//! truncates to the requested length.

use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use crate::error::{CoreError, CoreResult};

/// SHA-512 block size in bytes
const BLOCK_SIZE: usize = 128;

/// SHA-512 output size in bytes
const HASH_SIZE: usize = 64;

/// HMAC-SHA-512
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; HASH_SIZE] {
    // Keys longer than a block are hashed first
    let mut key_block = [0u8; BLOCK_SIZE];
    if key.len() > BLOCK_SIZE {
        let digest = Sha512::digest(key);
        key_block[..HASH_SIZE].copy_from_slice(&digest);
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let mut ipad = [0x36u8; BLOCK_SIZE];
    let mut opad = [0x5cu8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        ipad[i] ^= key_block[i];
        opad[i] ^= key_block[i];
    }

    let mut inner = Sha512::new();
    inner.update(ipad);
    inner.update(data);
    let inner_hash = inner.finalize();

    let mut outer = Sha512::new();
    outer.update(opad);
    outer.update(inner_hash);
    let result = outer.finalize();

    key_block.zeroize();
    ipad.zeroize();
    opad.zeroize();

    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&result);
    out
}

/// HKDF-Extract: `PRK = HMAC-SHA-512(salt, IKM)`
pub fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> [u8; HASH_SIZE] {
    hmac_sha512(salt, ikm)
}

/// HKDF-Expand: chain `T(i) = HMAC(PRK, T(i-1) || info || i)` and
/// truncate the concatenation to `length` bytes.
pub fn hkdf_expand(prk: &[u8], info: &[u8], length: usize) -> CoreResult<Vec<u8>> {
    if length == 0 {
        return Err(CoreError::Validation("HKDF output length must be > 0".into()));
    }
    let blocks = length.div_ceil(HASH_SIZE);
    if blocks > 255 {
        return Err(CoreError::Validation(format!(
            "HKDF output length {} exceeds 255 blocks",
            length
        )));
    }

    let mut okm = Vec::with_capacity(blocks * HASH_SIZE);
    let mut t: Vec<u8> = Vec::new();
    for i in 1..=blocks as u8 {
        let mut input = Vec::with_capacity(t.len() + info.len() + 1);
        input.extend_from_slice(&t);
        input.extend_from_slice(info);
        input.push(i);
        t = hmac_sha512(prk, &input).to_vec();
        okm.extend_from_slice(&t);
    }
    t.zeroize();

    okm.truncate(length);
    Ok(okm)
}

/// Extract-then-expand in one call
pub fn hkdf_sha512(salt: &[u8], ikm: &[u8], info: &[u8], length: usize) -> CoreResult<Vec<u8>> {
    let mut prk = hkdf_extract(salt, ikm);
    let okm = hkdf_expand(&prk, info, length);
    prk.zeroize();
    okm
}
