//! Shamir's Secret Sharing over GF(256)
//!
//! A secret is split byte-wise: each byte gets its own random polynomial
//! of degree M-1 with the secret byte as constant term, evaluated at
//! x = 1..N. Any M shares reconstruct the secret via Lagrange
//! interpolation at zero; any M-1 shares are information-theoretically
//! independent of it.
//!
//! Shares carry no authentication. Integrity and custody are the callers'
//! concern; the HSM provider layers holder metadata on top.

use zeroize::Zeroize;

use super::gf256;
use crate::error::{CoreError, CoreResult};
use crate::types::validate_shamir_params;

/// One share: an x-coordinate and the per-byte polynomial evaluations.
/// Index 0 is reserved for the secret itself and never appears on a share.
#[derive(Clone, PartialEq, Eq)]
pub struct ShamirShare {
    pub index: u8,
    pub data: Vec<u8>,
}

impl Drop for ShamirShare {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl std::fmt::Debug for ShamirShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ShamirShare(index={}, [REDACTED {} bytes])",
            self.index,
            self.data.len()
        )
    }
}

/// Split `secret` into `total_shares` shares with reconstruction
/// threshold `threshold`.
///
/// A single failed read from the OS random source fails the entire split.
pub fn split(secret: &[u8], threshold: u8, total_shares: u8) -> CoreResult<Vec<ShamirShare>> {
    if secret.is_empty() {
        return Err(CoreError::Validation("cannot split an empty secret".into()));
    }
    validate_shamir_params(threshold, total_shares)?;

    let degree = threshold as usize - 1;

    // One RNG read covers every random coefficient for the whole split.
    let mut coefficients = vec![0u8; secret.len() * degree];
    getrandom::getrandom(&mut coefficients).map_err(|e| CoreError::RngFailure(e.to_string()))?;

    let mut shares: Vec<ShamirShare> = (1..=total_shares)
        .map(|index| ShamirShare {
            index,
            data: vec![0u8; secret.len()],
        })
        .collect();

    let mut poly = vec![0u8; threshold as usize];
    for (byte_index, &secret_byte) in secret.iter().enumerate() {
        poly[0] = secret_byte;
        poly[1..].copy_from_slice(&coefficients[byte_index * degree..(byte_index + 1) * degree]);

        for share in &mut shares {
            share.data[byte_index] = gf256::eval_polynomial(&poly, share.index);
        }
    }
    poly.zeroize();
    coefficients.zeroize();

    Ok(shares)
}

/// Reconstruct a secret from `k >= threshold` distinct shares.
pub fn reconstruct(shares: &[ShamirShare], threshold: u8) -> CoreResult<Vec<u8>> {
    validate_share_set(shares, threshold)?;

    let take = threshold as usize;
    let secret_len = shares[0].data.len();
    let mut secret = vec![0u8; secret_len];
    let mut points = Vec::with_capacity(take);

    for (byte_index, out) in secret.iter_mut().enumerate() {
        points.clear();
        for share in shares.iter().take(take) {
            points.push((share.index, share.data[byte_index]));
        }
        *out = gf256::lagrange_at_zero(&points);
    }

    Ok(secret)
}

/// Renew a share set without reconstructing the secret: add a random
/// polynomial with zero constant term to every share. Old and new share
/// sets cannot be mixed.
pub fn refresh(shares: &[ShamirShare], threshold: u8) -> CoreResult<Vec<ShamirShare>> {
    validate_share_set(shares, threshold)?;

    let degree = threshold as usize - 1;
    let secret_len = shares[0].data.len();

    let mut coefficients = vec![0u8; secret_len * degree];
    getrandom::getrandom(&mut coefficients).map_err(|e| CoreError::RngFailure(e.to_string()))?;

    let mut refreshed: Vec<ShamirShare> = shares
        .iter()
        .map(|s| ShamirShare {
            index: s.index,
            data: vec![0u8; secret_len],
        })
        .collect();

    let mut poly = vec![0u8; threshold as usize];
    for byte_index in 0..secret_len {
        poly[0] = 0;
        poly[1..].copy_from_slice(&coefficients[byte_index * degree..(byte_index + 1) * degree]);

        for (old, new) in shares.iter().zip(refreshed.iter_mut()) {
            let g = gf256::eval_polynomial(&poly, old.index);
            new.data[byte_index] = gf256::add(old.data[byte_index], g);
        }
    }
    poly.zeroize();
    coefficients.zeroize();

    Ok(refreshed)
}

fn validate_share_set(shares: &[ShamirShare], threshold: u8) -> CoreResult<()> {
    if threshold < 2 {
        return Err(CoreError::Validation(format!(
            "threshold {} below minimum of 2",
            threshold
        )));
    }
    if shares.len() < threshold as usize {
        return Err(CoreError::InsufficientShares {
            required: threshold,
            provided: shares.len(),
        });
    }

    let secret_len = shares[0].data.len();
    let mut seen = [false; 256];
    for share in shares {
        if share.index == 0 {
            return Err(CoreError::Validation(
                "share index 0 is reserved for the secret".into(),
            ));
        }
        if seen[share.index as usize] {
            return Err(CoreError::DuplicateShareIndices);
        }
        seen[share.index as usize] = true;

        if share.data.len() != secret_len {
            return Err(CoreError::InconsistentShareLength);
        }
    }
    Ok(())
}
