//! # ela-core
//! Wire types, codec, scripts and keys for the ELA main chain.

pub mod address;
pub mod amount;
pub mod codec;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod script;
pub mod transaction;
pub mod types;

pub use crypto::{KeyPair, PublicKey};
pub use error::{AddressError, CryptoError, ScriptError, SerializationError};
pub use transaction::{system_asset_id, Attribute, AttributeUsage, Input, Output, Payload, Program, Transaction, TxType};
pub use types::{Hash256, OutPoint, ProgramHash, SignType};
