//! NIST P-256 ECDSA keys and the hash functions used by the ELA protocol.
//!
//! Signatures are deterministic (RFC 6979) over SHA-256 of the message and
//! encoded as the fixed 64-byte `r ‖ s` form. Public keys are carried in
//! SEC1 compressed form (33 bytes) inside scripts.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

use crate::constants::{COMPRESSED_PUBKEY_LEN, PRIVATE_KEY_LEN, SIGNATURE_LEN, UNCOMPRESSED_PUBKEY_LEN};
use crate::error::CryptoError;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// `RIPEMD160(SHA256(data))`.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// P-256 keypair for signing transactions.
///
/// The secret scalar is zeroized on drop by the underlying library.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Create a keypair from a 32-byte big-endian scalar.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(CryptoError::InvalidPrivateKey);
        }
        let signing_key = SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key().clone(),
        }
    }

    /// Raw secret scalar, wiped when the returned buffer is dropped.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_LEN]> {
        let mut scalar = self.signing_key.to_bytes();
        let mut out = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        out.copy_from_slice(&scalar);
        scalar.as_mut_slice().zeroize();
        out
    }

    /// Sign `message` (hashed with SHA-256), returning `r ‖ s`.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        let signature: Signature = self.signing_key.sign(message);
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(&signature.to_bytes());
        out
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// P-256 public key.
///
/// Ordering follows the X coordinate, then Y, both big-endian. Multisig
/// scripts list their keys in this order.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl PublicKey {
    /// Parse a SEC1 encoded key, compressed (33 bytes) or uncompressed (65 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != COMPRESSED_PUBKEY_LEN && bytes.len() != UNCOMPRESSED_PUBKEY_LEN {
            return Err(CryptoError::InvalidPublicKey);
        }
        let verifying_key =
            VerifyingKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key })
    }

    pub fn to_compressed(&self) -> [u8; COMPRESSED_PUBKEY_LEN] {
        let mut out = [0u8; COMPRESSED_PUBKEY_LEN];
        out.copy_from_slice(self.verifying_key.to_encoded_point(true).as_bytes());
        out
    }

    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_PUBKEY_LEN] {
        let mut out = [0u8; UNCOMPRESSED_PUBKEY_LEN];
        out.copy_from_slice(self.verifying_key.to_encoded_point(false).as_bytes());
        out
    }

    /// Verify an `r ‖ s` signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let signature = Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignature)?;
        self.verifying_key
            .verify(message, &signature)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Uncompressed form is 0x04 ‖ X ‖ Y.
        self.to_uncompressed()[1..].cmp(&other.to_uncompressed()[1..])
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_compressed()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_compressed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> KeyPair {
        KeyPair::from_secret_bytes(&[seed; 32]).unwrap()
    }

    #[test]
    fn sign_and_verify() {
        let kp = keypair(1);
        let sig = kp.sign(b"payload");
        assert!(kp.public_key().verify(b"payload", &sig).is_ok());
        assert_eq!(
            kp.public_key().verify(b"other", &sig),
            Err(CryptoError::VerificationFailed)
        );
    }

    #[test]
    fn signing_is_deterministic() {
        let kp = keypair(2);
        assert_eq!(kp.sign(b"msg"), kp.sign(b"msg"));
    }

    #[test]
    fn compressed_and_uncompressed_parse_to_same_key() {
        let pk = keypair(3).public_key();
        let a = PublicKey::from_bytes(&pk.to_compressed()).unwrap();
        let b = PublicKey::from_bytes(&pk.to_uncompressed()).unwrap();
        assert_eq!(a, b);
        assert_eq!(pk.to_compressed().len(), 33);
    }

    #[test]
    fn bad_key_lengths_rejected() {
        assert_eq!(PublicKey::from_bytes(&[2u8; 32]), Err(CryptoError::InvalidPublicKey));
        assert!(KeyPair::from_secret_bytes(&[1u8; 31]).is_err());
        assert!(KeyPair::from_secret_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn secret_bytes_round_trip() {
        let kp = KeyPair::generate();
        let again = KeyPair::from_secret_bytes(&*kp.secret_bytes()).unwrap();
        assert_eq!(kp.public_key(), again.public_key());
        assert_eq!(*keypair(7).secret_bytes(), [7u8; 32]);
    }

    #[test]
    fn ordering_uses_x_coordinate() {
        let mut keys: Vec<PublicKey> = (1..=5).map(|s| keypair(s).public_key()).collect();
        keys.sort();
        for pair in keys.windows(2) {
            assert!(pair[0].to_uncompressed()[1..33] <= pair[1].to_uncompressed()[1..33]);
        }
    }

    #[test]
    fn hash160_known_vector() {
        // RIPEMD160(SHA256("")).
        assert_eq!(
            hex::encode(hash160(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }
}
