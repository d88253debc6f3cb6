//! Password-protected custody of the wallet's signing key.
//!
//! # Record layout
//!
//! ```text
//! password_key    = SHA256(SHA256(password))
//! PasswordHash    = SHA256(password_key)
//! MasterKey       = AES-CBC(password_key, IV, master_key[32])
//! PrivateKeyEnc   = AES-CBC(master_key,   IV, X[32] ‖ Y[32] ‖ d[32])
//! ```
//!
//! Changing the password only re-wraps the master key; the private key
//! buffer is decrypted and re-encrypted under the unchanged master key so a
//! damaged buffer is detected before anything is replaced.
//!
//! All operations hold one mutex for their whole duration, so a signature
//! never races a password change.

use std::fmt;
use std::path::{Path, PathBuf};

use ela_core::constants::{PRIVATE_KEY_LEN, SIGNATURE_LEN, STANDARD_SCRIPT_LEN, UINT168_LEN};
use ela_core::script::{parse_standard_script, standard_program_hash, standard_redeem_script};
use ela_core::{KeyPair, ProgramHash, PublicKey};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::encryption::{self, IV_LEN, KEY_LEN};
use crate::error::WalletError;
use crate::secret::SecretBytes;

/// Record format version written by this crate.
pub const KEYSTORE_VERSION: &str = "1.0";

/// Default keystore file name inside the data directory.
pub const KEYSTORE_FILENAME: &str = "keystore.dat";

/// Uncompressed public key coordinates followed by the private scalar.
const KEY_BUFFER_LEN: usize = 96;
const PUBLIC_COORDS_LEN: usize = KEY_BUFFER_LEN - PRIVATE_KEY_LEN;

/// Persisted keystore, every binary field hex encoded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct KeystoreRecord {
    pub version: String,
    #[serde(rename = "IV")]
    pub iv: String,
    pub master_key: String,
    pub password_hash: String,
    pub private_key_encrypted: String,
    pub program_hash: String,
    pub redeem_script: String,
}

fn decode_field(name: &str, value: &str, expected_len: usize) -> Result<Vec<u8>, WalletError> {
    let bytes = hex::decode(value).map_err(|e| WalletError::CorruptState(format!("{name}: {e}")))?;
    if bytes.len() != expected_len {
        return Err(WalletError::CorruptState(format!(
            "{name}: expected {expected_len} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Clear-text identity of a keystore, checked once at load.
#[derive(Clone)]
struct Identity {
    public_key: PublicKey,
    redeem_script: Vec<u8>,
    program_hash: ProgramHash,
}

impl KeystoreRecord {
    fn identity(&self) -> Result<Identity, WalletError> {
        if self.version != KEYSTORE_VERSION {
            return Err(WalletError::CorruptState(format!(
                "unsupported keystore version {:?}",
                self.version
            )));
        }
        decode_field("IV", &self.iv, IV_LEN)?;
        decode_field("MasterKey", &self.master_key, KEY_LEN)?;
        decode_field("PasswordHash", &self.password_hash, 32)?;
        decode_field("PrivateKeyEncrypted", &self.private_key_encrypted, KEY_BUFFER_LEN)?;

        let redeem_script = decode_field("RedeemScript", &self.redeem_script, STANDARD_SCRIPT_LEN)?;
        let public_key = parse_standard_script(&redeem_script)
            .map_err(|e| WalletError::CorruptState(format!("RedeemScript: {e}")))?;
        let program_hash = ProgramHash::from_slice(&decode_field("ProgramHash", &self.program_hash, UINT168_LEN)?)?;
        if program_hash != standard_program_hash(&public_key) {
            return Err(WalletError::CorruptState("program hash does not match redeem script".into()));
        }
        Ok(Identity { public_key, redeem_script, program_hash })
    }

    fn iv(&self) -> Result<Vec<u8>, WalletError> {
        decode_field("IV", &self.iv, IV_LEN)
    }

    /// Check `password` and return the derived password key.
    fn authenticate(&self, password: &[u8]) -> Result<SecretBytes, WalletError> {
        let key = encryption::password_key(password);
        let stored = decode_field("PasswordHash", &self.password_hash, 32)?;
        if encryption::password_hash(&key).as_slice() != stored.as_slice() {
            return Err(WalletError::Authentication);
        }
        Ok(key)
    }

    fn master_key(&self, password_key: &SecretBytes) -> Result<SecretBytes, WalletError> {
        let wrapped = decode_field("MasterKey", &self.master_key, KEY_LEN)?;
        encryption::decrypt(&wrapped, password_key.as_slice(), &self.iv()?)
    }

    /// Decrypt the key buffer and check it against the stored public key.
    fn key_buffer(&self, master_key: &SecretBytes, identity: &Identity) -> Result<SecretBytes, WalletError> {
        let encrypted = decode_field("PrivateKeyEncrypted", &self.private_key_encrypted, KEY_BUFFER_LEN)?;
        let buffer = encryption::decrypt(&encrypted, master_key.as_slice(), &self.iv()?)?;
        if buffer.len() != KEY_BUFFER_LEN {
            return Err(WalletError::CorruptState(format!(
                "decrypted key buffer is {} bytes",
                buffer.len()
            )));
        }
        let expected = identity.public_key.to_uncompressed();
        if buffer.as_slice()[..PUBLIC_COORDS_LEN] != expected[1..] {
            return Err(WalletError::CorruptState("decrypted key does not match public key".into()));
        }
        Ok(buffer)
    }

    fn key_pair(&self, password: &[u8], identity: &Identity) -> Result<KeyPair, WalletError> {
        let password_key = self.authenticate(password)?;
        let master_key = self.master_key(&password_key)?;
        let buffer = self.key_buffer(&master_key, identity)?;
        let key_pair = KeyPair::from_secret_bytes(&buffer.as_slice()[PUBLIC_COORDS_LEN..])
            .map_err(|e| WalletError::CorruptState(e.to_string()))?;
        if key_pair.public_key() != identity.public_key {
            return Err(WalletError::CorruptState("private key does not match public key".into()));
        }
        Ok(key_pair)
    }
}

struct State {
    record: KeystoreRecord,
    path: Option<PathBuf>,
}

/// Encrypted signing key plus the clear-text identity derived from it.
pub struct KeyStore {
    state: Mutex<State>,
    identity: Identity,
}

impl KeyStore {
    /// Create a new in-memory keystore with a fresh random key.
    pub fn create(password: &[u8]) -> Result<Self, WalletError> {
        Self::create_with_key(password, KeyPair::generate())
    }

    /// Create a keystore wrapping an existing key.
    pub fn create_with_key(password: &[u8], key_pair: KeyPair) -> Result<Self, WalletError> {
        let iv = SecretBytes::random(IV_LEN);
        let master_key = SecretBytes::random(KEY_LEN);
        let password_key = encryption::password_key(password);

        let public_key = key_pair.public_key();
        let redeem_script = standard_redeem_script(&public_key);
        let program_hash = standard_program_hash(&public_key);

        let mut packed = Vec::with_capacity(KEY_BUFFER_LEN);
        packed.extend_from_slice(&public_key.to_uncompressed()[1..]);
        packed.extend_from_slice(&*key_pair.secret_bytes());
        let buffer = SecretBytes::new(packed);

        let record = KeystoreRecord {
            version: KEYSTORE_VERSION.to_string(),
            iv: hex::encode(iv.as_slice()),
            master_key: hex::encode(encryption::encrypt(
                master_key.as_slice(),
                password_key.as_slice(),
                iv.as_slice(),
            )?),
            password_hash: hex::encode(encryption::password_hash(&password_key)),
            private_key_encrypted: hex::encode(encryption::encrypt(
                buffer.as_slice(),
                master_key.as_slice(),
                iv.as_slice(),
            )?),
            program_hash: hex::encode(program_hash.as_bytes()),
            redeem_script: hex::encode(&redeem_script),
        };

        info!(address = %program_hash.to_address(), "created keystore");
        Ok(Self {
            state: Mutex::new(State { record, path: None }),
            identity: Identity { public_key, redeem_script, program_hash },
        })
    }

    /// Create a keystore and persist it at `path`. Refuses to overwrite.
    pub fn create_at(path: &Path, password: &[u8]) -> Result<Self, WalletError> {
        if path.exists() {
            return Err(WalletError::KeystoreExists(path.display().to_string()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self::create(password)?;
        {
            let mut state = store.state.lock();
            persist(path, &state.record)?;
            state.path = Some(path.to_path_buf());
        }
        Ok(store)
    }

    /// Load the keystore at `path` and check `password` against it.
    pub fn open(path: &Path, password: &[u8]) -> Result<Self, WalletError> {
        let data = std::fs::read(path)?;
        let record: KeystoreRecord = serde_json::from_slice(&data)
            .map_err(|e| WalletError::CorruptState(format!("keystore file: {e}")))?;
        let store = Self::from_record(record, password)?;
        store.state.lock().path = Some(path.to_path_buf());
        debug!(path = %path.display(), "opened keystore");
        Ok(store)
    }

    /// Validate a record and check `password` against it.
    pub fn from_record(record: KeystoreRecord, password: &[u8]) -> Result<Self, WalletError> {
        let identity = record.identity()?;
        record.key_pair(password, &identity)?;
        Ok(Self {
            state: Mutex::new(State { record, path: None }),
            identity,
        })
    }

    /// Snapshot of the persisted record.
    pub fn record(&self) -> KeystoreRecord {
        self.state.lock().record.clone()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.state.lock().path.clone()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.identity.public_key
    }

    pub fn redeem_script(&self) -> &[u8] {
        &self.identity.redeem_script
    }

    pub fn program_hash(&self) -> ProgramHash {
        self.identity.program_hash
    }

    pub fn address(&self) -> String {
        self.identity.program_hash.to_address()
    }

    /// Fails with [`WalletError::Authentication`] on a wrong password.
    pub fn verify_password(&self, password: &[u8]) -> Result<(), WalletError> {
        self.state.lock().record.authenticate(password).map(|_| ())
    }

    /// Re-wrap the master key under `new_password`.
    ///
    /// The replacement record is fully built (and written, when file backed)
    /// before it becomes visible; on any error the keystore is unchanged.
    pub fn change_password(&self, old_password: &[u8], new_password: &[u8]) -> Result<(), WalletError> {
        let mut state = self.state.lock();
        let record = &state.record;

        let old_key = record.authenticate(old_password)?;
        let master_key = record.master_key(&old_key)?;
        let buffer = record.key_buffer(&master_key, &self.identity)?;
        let iv = record.iv()?;

        let new_key = encryption::password_key(new_password);
        let mut updated = record.clone();
        updated.password_hash = hex::encode(encryption::password_hash(&new_key));
        updated.master_key = hex::encode(encryption::encrypt(master_key.as_slice(), new_key.as_slice(), &iv)?);
        updated.private_key_encrypted = hex::encode(encryption::encrypt(buffer.as_slice(), master_key.as_slice(), &iv)?);

        if let Some(path) = &state.path {
            persist(path, &updated)?;
        }
        state.record = updated;
        info!(address = %self.address(), "keystore password changed");
        Ok(())
    }

    /// Sign `data` with the custodied key, returning a 64-byte `r ‖ s`.
    pub fn sign(&self, password: &[u8], data: &[u8]) -> Result<[u8; SIGNATURE_LEN], WalletError> {
        let state = self.state.lock();
        let key_pair = state.record.key_pair(password, &self.identity)?;
        let signature = key_pair.sign(data);
        debug!(len = data.len(), "signed data");
        Ok(signature)
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Write through a temporary file so a crash never leaves a torn record.
fn persist(path: &Path, record: &KeystoreRecord) -> Result<(), WalletError> {
    let json = serde_json::to_vec_pretty(record).map_err(|e| WalletError::Io(e.to_string()))?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
