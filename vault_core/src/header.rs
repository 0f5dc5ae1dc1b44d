//! Fixed-size encrypted header codec for a single volume slot.
//!
//! A slot holds either a 108-byte encrypted [`HeaderPayload`], or noise
//! indistinguishable from it. Nothing in the slot's bytes says which;
//! only a successful authenticated decryption under the supplied password
//! reveals a slot as valid.

use crate::crypto::{self, KEY_LEN, MAC_LEN, NONCE_LEN, SALT_LEN};
use crate::error::{Result, VaultError};

/// Number of fixed header slots in every vault.
pub const NUM_HEADER_SLOTS: usize = 3;

/// Reserved byte length of one volume's encrypted region.
pub const VOLUME_SIZE: u64 = 1024 * 1024;

/// Plaintext header payload length: key(32) + offset(8) + size(8) + fsid(4).
const PAYLOAD_LEN: usize = KEY_LEN + 8 + 8 + 4;

/// Encrypted slot length: salt(16) + nonce(8) + mac(32) + ciphertext(52).
pub const HEADER_SLOT_SIZE: usize = SALT_LEN + NONCE_LEN + MAC_LEN + PAYLOAD_LEN;

/// Byte length of the header area at the front of the vault file.
pub const fn header_area_size() -> u64 {
    (NUM_HEADER_SLOTS * HEADER_SLOT_SIZE) as u64
}

/// Per-volume secret metadata, decrypted from a header slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPayload {
    /// 32-byte symmetric key for the volume's encrypted region.
    pub volume_key: [u8; KEY_LEN],
    /// Absolute byte offset of the volume's encrypted region in the vault.
    pub volume_offset: u64,
    /// Reserved byte length of that region.
    pub volume_size: u64,
    /// Small integer naming the volume (distinct from the slot index).
    pub fsid: u32,
}

impl HeaderPayload {
    /// Builds a payload for a freshly created volume at `fsid`, with a
    /// random key and the fixed offset/size derived from the on-disk
    /// layout (header area, then one `VOLUME_SIZE` region per fsid).
    pub fn new_volume(fsid: u32) -> Self {
        let mut volume_key = [0u8; KEY_LEN];
        volume_key.copy_from_slice(&crypto::random_bytes(KEY_LEN));
        let volume_offset = header_area_size() + (fsid as u64) * VOLUME_SIZE;
        HeaderPayload {
            volume_key,
            volume_offset,
            volume_size: VOLUME_SIZE,
            fsid,
        }
    }

    fn encode(&self) -> [u8; PAYLOAD_LEN] {
        let mut buf = [0u8; PAYLOAD_LEN];
        buf[..KEY_LEN].copy_from_slice(&self.volume_key);
        buf[KEY_LEN..KEY_LEN + 8].copy_from_slice(&self.volume_offset.to_le_bytes());
        buf[KEY_LEN + 8..KEY_LEN + 16].copy_from_slice(&self.volume_size.to_le_bytes());
        buf[KEY_LEN + 16..KEY_LEN + 20].copy_from_slice(&self.fsid.to_le_bytes());
        buf
    }

    fn decode(plain: &[u8]) -> Result<Self> {
        if plain.len() != PAYLOAD_LEN {
            return Err(VaultError::Corrupt);
        }
        let mut volume_key = [0u8; KEY_LEN];
        volume_key.copy_from_slice(&plain[..KEY_LEN]);
        let volume_offset = u64::from_le_bytes(plain[KEY_LEN..KEY_LEN + 8].try_into().unwrap());
        let volume_size =
            u64::from_le_bytes(plain[KEY_LEN + 8..KEY_LEN + 16].try_into().unwrap());
        let fsid = u32::from_le_bytes(plain[KEY_LEN + 16..KEY_LEN + 20].try_into().unwrap());

        if volume_offset < header_area_size() || volume_size == 0 {
            return Err(VaultError::Corrupt);
        }

        Ok(HeaderPayload {
            volume_key,
            volume_offset,
            volume_size,
            fsid,
        })
    }
}

impl Drop for HeaderPayload {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.volume_key);
    }
}

/// Encrypts a header payload under `password`, producing a 108-byte slot
/// blob: `salt ‖ nonce ‖ mac ‖ ciphertext`. The MAC covers the ciphertext
/// only, not the salt or nonce.
pub fn encrypt_header(payload: &HeaderPayload, password: &str) -> Vec<u8> {
    let salt = crypto::random_bytes(SALT_LEN);
    let key = crypto::derive_key(password, &salt);
    let plaintext = payload.encode();
    let (ciphertext, nonce) = crypto::stream_encrypt(&key, &plaintext)
        .expect("key is always KEY_LEN bytes here");
    let tag = crypto::mac(&key, &ciphertext);

    let mut blob = Vec::with_capacity(HEADER_SLOT_SIZE);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&tag);
    blob.extend_from_slice(&ciphertext);
    blob
}

/// Attempts to decrypt a slot blob under `password`. Failure means "not a
/// valid header for this password"; callers trial-decrypting a sequence
/// of slots should treat every error here as "try the next slot" and never
/// report which step failed.
pub fn decrypt_header(blob: &[u8], password: &str) -> Result<HeaderPayload> {
    if blob.len() < HEADER_SLOT_SIZE {
        return Err(VaultError::WrongPasswordOrCorrupt);
    }
    let salt = &blob[..SALT_LEN];
    let nonce = &blob[SALT_LEN..SALT_LEN + NONCE_LEN];
    let tag = &blob[SALT_LEN + NONCE_LEN..SALT_LEN + NONCE_LEN + MAC_LEN];
    let ciphertext = &blob[SALT_LEN + NONCE_LEN + MAC_LEN..HEADER_SLOT_SIZE];

    let key = crypto::derive_key(password, salt);
    if !crypto::verify_mac(&key, ciphertext, tag) {
        return Err(VaultError::WrongPasswordOrCorrupt);
    }
    let plain =
        crypto::stream_decrypt(&key, nonce, ciphertext).map_err(|_| VaultError::WrongPasswordOrCorrupt)?;
    HeaderPayload::decode(&plain).map_err(|_| VaultError::WrongPasswordOrCorrupt)
}
