//! Durable storage for the kchain ledger.
//!
//! [`FileChainLog`] is an append-only, single-file implementation of
//! [`kchain_ledger::ChainLog`]. Each transaction is written as one framed
//! record:
//!
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [4 bytes: CRC32 of the 8 bytes above (little-endian u32)]
//! [N bytes: payload (bincode-serialized Transaction)]
//! ```
//!
//! The whole log is read back and indexed in memory on open. Recovery is
//! strict: a partial record at the very end of the file (a torn write) is
//! truncated away, and anything else that does not check out fails the open.

pub mod file;

pub use file::{FileChainLog, SyncMode};
