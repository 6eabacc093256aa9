//! AES-256-GCM envelope operations
//!
//! Encryption binds every ciphertext to its content set by using the
//! set identifier's UTF-8 bytes as AAD, so an envelope substituted
//! between sets fails authentication. Decryption verifies in a fixed
//! order: stored ciphertext hash, then the AEAD tag, then the recovered
//! plaintext hash - each stage with its own error so audit records can
//! name the failing stage.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use chrono::Utc;
use zeroize::Zeroize;

use crate::error::{CoreError, CoreResult};
use crate::types::{ContentSetId, EncryptedEnvelope, KeyId, Sha512Digest, AES_256_GCM};

/// AES-256 key size
pub const KEY_SIZE: usize = 32;

/// GCM IV size
pub const IV_SIZE: usize = 12;

/// GCM authentication tag size
pub const TAG_SIZE: usize = 16;

fn check_key(key: &[u8]) -> CoreResult<()> {
    if key.len() != KEY_SIZE {
        return Err(CoreError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: key.len(),
        });
    }
    Ok(())
}

/// Encrypt a content-set payload under a 32-byte key.
///
/// Every call generates a fresh random IV; two encryptions of the same
/// plaintext never share ciphertext.
pub fn encrypt(
    plaintext: &[u8],
    key: &[u8],
    key_id: &KeyId,
    content_set_identifier: &ContentSetId,
) -> CoreResult<EncryptedEnvelope> {
    check_key(key)?;

    let plaintext_hash = Sha512Digest::compute(plaintext);

    let mut iv = [0u8; IV_SIZE];
    getrandom::getrandom(&mut iv).map_err(|e| CoreError::RngFailure(e.to_string()))?;

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| CoreError::Crypto(e.to_string()))?;
    let mut sealed = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: plaintext,
                aad: content_set_identifier.aad_bytes(),
            },
        )
        .map_err(|_| CoreError::Crypto("AES-256-GCM encryption failed".into()))?;

    // The aead crate appends the tag; the envelope stores it detached.
    let auth_tag = sealed.split_off(sealed.len() - TAG_SIZE);
    let ciphertext = sealed;
    let ciphertext_hash = Sha512Digest::compute(&ciphertext);

    Ok(EncryptedEnvelope {
        content_set_identifier: content_set_identifier.clone(),
        iv: iv.to_vec(),
        auth_tag,
        ciphertext,
        plaintext_hash,
        ciphertext_hash,
        key_id: key_id.clone(),
        algorithm: AES_256_GCM.to_string(),
        encrypted_at: Utc::now(),
    })
}

/// Decrypt an envelope, verifying ciphertext hash, AEAD tag, and
/// plaintext hash in that order.
pub fn decrypt(envelope: &EncryptedEnvelope, key: &[u8]) -> CoreResult<Vec<u8>> {
    check_key(key)?;

    let set = envelope.content_set_identifier.clone();

    if envelope.iv.len() != IV_SIZE {
        return Err(CoreError::Validation(format!(
            "envelope IV must be {} bytes, got {}",
            IV_SIZE,
            envelope.iv.len()
        )));
    }

    // Stage 1: stored ciphertext hash
    if !envelope.verify_ciphertext_hash() {
        return Err(CoreError::CiphertextIntegrityFailure(set.to_string()));
    }

    // Stage 2: GCM authentication, AAD bound to the set identity
    let mut sealed = Vec::with_capacity(envelope.ciphertext.len() + envelope.auth_tag.len());
    sealed.extend_from_slice(&envelope.ciphertext);
    sealed.extend_from_slice(&envelope.auth_tag);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| CoreError::Crypto(e.to_string()))?;
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&envelope.iv),
            Payload {
                msg: &sealed,
                aad: set.aad_bytes(),
            },
        )
        .map_err(|_| CoreError::AeadAuthenticationFailure(set.to_string()))?;

    // Stage 3: recovered plaintext hash
    if Sha512Digest::compute(&plaintext) != envelope.plaintext_hash {
        let mut plaintext = plaintext;
        plaintext.zeroize();
        return Err(CoreError::PlaintextIntegrityFailure(set.to_string()));
    }

    Ok(plaintext)
}

/// Decrypt under the old key (all three checks) and encrypt under the new
/// key for the same content set. The re-encrypted envelope carries the
/// original `plaintext_hash` and a fresh IV and ciphertext.
pub fn re_encrypt(
    envelope: &EncryptedEnvelope,
    old_key: &[u8],
    new_key: &[u8],
    new_key_id: &KeyId,
) -> CoreResult<EncryptedEnvelope> {
    let mut plaintext = decrypt(envelope, old_key)?;
    let result = encrypt(
        &plaintext,
        new_key,
        new_key_id,
        &envelope.content_set_identifier,
    );
    plaintext.zeroize();

    let new_envelope = result?;
    debug_assert_eq!(new_envelope.plaintext_hash, envelope.plaintext_hash);
    Ok(new_envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fill: u8) -> Vec<u8> {
        vec![fill; KEY_SIZE]
    }

    fn set_id() -> ContentSetId {
        ContentSetId::new("CS-CONFIDENTIAL")
    }

    #[test]
    fn test_roundtrip() {
        let k = key(0x42);
        let env = encrypt(b"Budget $4.2M.", &k, &KeyId::new("key:1"), &set_id()).unwrap();

        assert_eq!(env.iv.len(), IV_SIZE);
        assert_eq!(env.auth_tag.len(), TAG_SIZE);
        assert_eq!(env.algorithm, AES_256_GCM);
        assert_ne!(env.ciphertext, b"Budget $4.2M.");

        let plaintext = decrypt(&env, &k).unwrap();
        assert_eq!(plaintext, b"Budget $4.2M.");
    }

    #[test]
    fn test_invalid_key_length() {
        let err = encrypt(b"x", &[0u8; 16], &KeyId::new("key:1"), &set_id()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidKeyLength { expected: 32, actual: 16 }
        ));
    }

    #[test]
    fn test_iv_uniqueness() {
        let k = key(0x01);
        let a = encrypt(b"same plaintext", &k, &KeyId::new("key:1"), &set_id()).unwrap();
        let b = encrypt(b"same plaintext", &k, &KeyId::new("key:1"), &set_id()).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
        // Hash of the plaintext is stable
        assert_eq!(a.plaintext_hash, b.plaintext_hash);
    }

    #[test]
    fn test_aad_binding_between_sets() {
        let k = key(0x02);
        let env = encrypt(b"secret", &k, &KeyId::new("key:1"), &set_id()).unwrap();

        // Claiming a different content set must fail authentication even
        // though key, IV, tag and ciphertext are untouched.
        let mut forged = env.clone();
        forged.content_set_identifier = ContentSetId::new("CS-PUBLIC");
        assert!(matches!(
            decrypt(&forged, &k),
            Err(CoreError::AeadAuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_ciphertext_hash_checked_first() {
        let k = key(0x03);
        let mut env = encrypt(b"payload", &k, &KeyId::new("key:1"), &set_id()).unwrap();
        env.ciphertext[0] ^= 0xFF;

        assert!(matches!(
            decrypt(&env, &k),
            Err(CoreError::CiphertextIntegrityFailure(_))
        ));
    }

    #[test]
    fn test_tag_tampering_fails_authentication() {
        let k = key(0x04);
        let mut env = encrypt(b"payload", &k, &KeyId::new("key:1"), &set_id()).unwrap();
        env.auth_tag[0] ^= 0x01;

        // Ciphertext hash still matches, so the AEAD stage reports it
        assert!(matches!(
            decrypt(&env, &k),
            Err(CoreError::AeadAuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_plaintext_hash_mismatch() {
        let k = key(0x05);
        let mut env = encrypt(b"payload", &k, &KeyId::new("key:1"), &set_id()).unwrap();
        // Corrupt the recorded plaintext hash; decryption itself succeeds
        env.plaintext_hash = Sha512Digest::compute(b"different");

        assert!(matches!(
            decrypt(&env, &k),
            Err(CoreError::PlaintextIntegrityFailure(_))
        ));
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let env = encrypt(b"payload", &key(0x06), &KeyId::new("key:1"), &set_id()).unwrap();
        assert!(matches!(
            decrypt(&env, &key(0x07)),
            Err(CoreError::AeadAuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_re_encrypt_preserves_plaintext_hash() {
        let old_key = key(0x08);
        let new_key = key(0x09);
        let env = encrypt(b"rotate me", &old_key, &KeyId::new("key:old"), &set_id()).unwrap();

        let rotated = re_encrypt(&env, &old_key, &new_key, &KeyId::new("key:new")).unwrap();

        assert_eq!(rotated.plaintext_hash, env.plaintext_hash);
        assert_ne!(rotated.iv, env.iv);
        assert_ne!(rotated.ciphertext, env.ciphertext);
        assert_eq!(rotated.key_id, KeyId::new("key:new"));

        // New key decrypts; old key no longer does
        assert_eq!(decrypt(&rotated, &new_key).unwrap(), b"rotate me");
        assert!(decrypt(&rotated, &old_key).is_err());
    }

    #[test]
    fn test_empty_plaintext() {
        let k = key(0x0A);
        let env = encrypt(b"", &k, &KeyId::new("key:1"), &set_id()).unwrap();
        assert_eq!(decrypt(&env, &k).unwrap(), b"");
    }
}
