//! Foundation types for kchain.
//!
//! Every other kchain crate depends on `kchain-types`.
//!
//! # Key Types
//!
//! - [`AssetId`] -- Identifier of a tracked asset (a "kitty")
//! - [`Address`] -- Owner address derived from an Ed25519 public key
//! - [`TxHash`] -- BLAKE3 content hash identifying a transaction

pub mod address;
pub mod asset;
pub mod error;
pub mod hash;
pub mod serde_hex;

pub use address::Address;
pub use asset::AssetId;
pub use error::TypeError;
pub use hash::TxHash;
