//! Single-authority asset ledger for kchain.
//!
//! This crate is the heart of kchain. It provides:
//! - The signed [`Transaction`] type with content-hash identity
//! - The verifier deciding whether a transaction may extend an asset's history
//! - `ChainLog` / `OwnershipProjection` trait boundaries
//! - `MemoryChainLog` / `MemoryProjection` implementations for tests and embedding
//! - Replay of a persisted log into a fresh projection
//! - [`LedgerEngine`], which serializes injections, serves concurrent reads,
//!   and dispatches committed transactions to a [`CommitHook`]

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod memory;
pub mod projection;
pub mod replay;
pub mod traits;
pub mod transaction;
pub mod validation;

pub use dispatch::{terminate_process, CommitHook, FatalHandler, HookError, LoggingHook, NoOpHook};
pub use engine::{LedgerConfig, LedgerEngine, TxPage};
pub use error::{
    EncodingError, FatalError, LedgerError, LedgerResult, StoreError, StoreResult, TxLookup,
    VerificationError,
};
pub use memory::{MemoryChainLog, MemoryProjection};
pub use projection::{AddressState, AssetState, Balance};
pub use replay::{rebuild, replay, ReplayReport};
pub use traits::{ChainLog, OwnershipProjection, TxCheck, TxRange};
pub use transaction::{Output, Transaction};
pub use validation::verify;
