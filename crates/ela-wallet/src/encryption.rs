//! AES-256-CBC keystore encryption.
//!
//! The password key is `SHA256(SHA256(password))` and the stored
//! verification value is `SHA256(password_key)`. Payloads are whole AES
//! blocks and are encrypted without padding; master key (32 bytes) and the
//! private-key buffer (96 bytes) both qualify.

use aes::Aes256;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::secret::SecretBytes;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// CBC initialisation vector length in bytes.
pub const IV_LEN: usize = 16;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

const BLOCK_LEN: usize = 16;

/// Derive the AES key protecting the master key from a password.
pub fn password_key(password: &[u8]) -> SecretBytes {
    let once: Zeroizing<[u8; 32]> = Zeroizing::new(Sha256::digest(password).into());
    let twice: Zeroizing<[u8; 32]> = Zeroizing::new(Sha256::digest(once.as_slice()).into());
    SecretBytes::from_slice(twice.as_slice())
}

/// Verification hash stored alongside the keystore.
pub fn password_hash(password_key: &SecretBytes) -> [u8; 32] {
    Sha256::digest(password_key.as_slice()).into()
}

fn check_block_aligned(len: usize) -> Result<(), WalletError> {
    if len == 0 || len % BLOCK_LEN != 0 {
        return Err(WalletError::Encryption(format!(
            "data length {len} is not a non-zero multiple of {BLOCK_LEN}"
        )));
    }
    Ok(())
}

/// Encrypt whole blocks with AES-256-CBC, no padding.
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, WalletError> {
    check_block_aligned(plaintext.len())?;
    let cipher = Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    let mut buf = plaintext.to_vec();
    cipher
        .encrypt_padded_mut::<NoPadding>(&mut buf, plaintext.len())
        .map_err(|_| WalletError::Encryption("block encryption failed".into()))?;
    Ok(buf)
}

/// Decrypt data produced by [`encrypt`]. The result is wiped on drop.
pub fn decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<SecretBytes, WalletError> {
    check_block_aligned(ciphertext.len())?;
    let cipher = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    let mut buf = SecretBytes::from_slice(ciphertext);
    cipher
        .decrypt_padded_mut::<NoPadding>(buf.as_mut_slice())
        .map_err(|_| WalletError::Encryption("block decryption failed".into()))?;
    Ok(buf)
}
