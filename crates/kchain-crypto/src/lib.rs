//! Cryptographic primitives for kchain.
//!
//! Provides domain-separated BLAKE3 hashing and Ed25519 signing/verification.
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::ContentHasher;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
