//! Cryptographic primitives: random bytes, password-based key derivation,
//! AES-256-CTR stream cipher, HMAC-SHA-256 MAC. Encrypt-then-MAC
//! throughout; callers combine these, never relying on either primitive
//! alone for authenticated confidentiality.

use crate::error::{Result, VaultError};
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 8;
pub const SALT_LEN: usize = 16;
pub const MAC_LEN: usize = 32;

const PBKDF2_ITERATIONS: u32 = 100_000;

type Aes256Ctr64BE = ctr::Ctr64BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Cryptographically strong random bytes.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// PBKDF2-HMAC-SHA256, 100,000 iterations, 32-byte output. Password is
/// UTF-8; salt is caller-supplied (16 bytes in this crate's usage).
pub fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// AES-256 in counter mode with a freshly generated 8-byte nonce.
/// Ciphertext length equals plaintext length.
pub fn stream_encrypt(key: &[u8], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN])> {
    let nonce_vec = random_bytes(NONCE_LEN);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&nonce_vec);
    let ciphertext = apply_ctr(key, &nonce, plaintext)?;
    Ok((ciphertext, nonce))
}

/// Inverse of `stream_encrypt`. Fails when `key` or `nonce` have the wrong
/// length.
pub fn stream_decrypt(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::InvalidArgument(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }
    apply_ctr(key, nonce, ciphertext)
}

fn apply_ctr(key: &[u8], nonce: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if key.len() != KEY_LEN {
        return Err(VaultError::InvalidArgument(format!(
            "key must be {KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    // AES block size is 16 bytes; the 8-byte nonce occupies the high half
    // of the IV and stays fixed, the low half is the per-block counter.
    let mut iv = [0u8; 16];
    iv[..NONCE_LEN].copy_from_slice(nonce);
    let mut cipher = Aes256Ctr64BE::new_from_slices(key, &iv)
        .map_err(|e| VaultError::InvalidArgument(e.to_string()))?;
    let mut buf = data.to_vec();
    cipher.apply_keystream(&mut buf);
    Ok(buf)
}

/// HMAC-SHA-256.
pub fn mac(key: &[u8], data: &[u8]) -> [u8; MAC_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Constant-time HMAC-SHA-256 verification.
pub fn verify_mac(key: &[u8], data: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(tag).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_round_trip() {
        let key = random_bytes(KEY_LEN);
        let (ct, nonce) = stream_encrypt(&key, b"hello vault").unwrap();
        assert_eq!(ct.len(), b"hello vault".len());
        let pt = stream_decrypt(&key, &nonce, &ct).unwrap();
        assert_eq!(pt, b"hello vault");
    }

    #[test]
    fn stream_encrypt_rejects_bad_key_length() {
        let key = random_bytes(10);
        assert!(stream_encrypt(&key, b"data").is_err());
    }

    #[test]
    fn stream_decrypt_rejects_bad_nonce_length() {
        let key = random_bytes(KEY_LEN);
        assert!(stream_decrypt(&key, &[0u8; 4], b"data").is_err());
    }

    #[test]
    fn mac_round_trip() {
        let key = random_bytes(KEY_LEN);
        let tag = mac(&key, b"payload");
        assert!(verify_mac(&key, b"payload", &tag));
        assert!(!verify_mac(&key, b"tampered", &tag));
    }

    #[test]
    fn derive_key_is_deterministic_per_salt() {
        let salt = random_bytes(SALT_LEN);
        let k1 = derive_key("hunter2", &salt);
        let k2 = derive_key("hunter2", &salt);
        assert_eq!(k1, k2);
        let k3 = derive_key("different", &salt);
        assert_ne!(k1, k3);
    }
}
