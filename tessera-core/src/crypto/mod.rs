//! Cryptographic primitives
//!
//! - [`aead`]: AES-256-GCM envelope encryption with AAD set binding
//! - [`kdf`]: HKDF-SHA-512 extract/expand
//! - [`gf256`]: table-driven arithmetic over the AES field
//! - [`shamir`]: byte-wise Shamir's Secret Sharing on top of [`gf256`]
//!
//! SHA-512 hashing lives on [`crate::types::Sha512Digest`].

pub mod aead;
pub mod gf256;
pub mod kdf;
pub mod shamir;

pub use aead::{decrypt, encrypt, re_encrypt, IV_SIZE, KEY_SIZE, TAG_SIZE};
pub use shamir::ShamirShare;
