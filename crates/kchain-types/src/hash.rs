use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{decode_fixed, TypeError};

/// Content hash identifying a transaction.
///
/// A `TxHash` is a 256-bit BLAKE3 digest. The all-zero hash is the null
/// hash: it is the input reference of a creation transaction and marks a
/// transaction whose hash has not been computed yet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxHash(
    #[serde(
        serialize_with = "crate::serde_hex::serialize",
        deserialize_with = "crate::serde_hex::deserialize_array"
    )]
    [u8; 32],
);

impl TxHash {
    /// Create a `TxHash` from a pre-computed digest.
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The null hash (all zeros).
    pub const fn null() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if this is the null hash.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        decode_fixed::<32>(s).map(Self)
    }
}

impl Default for TxHash {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self.short_hex())
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for TxHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for TxHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_all_zeros() {
        let null = TxHash::null();
        assert!(null.is_null());
        assert_eq!(null.as_bytes(), &[0u8; 32]);
        assert_eq!(TxHash::default(), null);
    }

    #[test]
    fn hex_roundtrip() {
        let hash = TxHash::from_hash([0xab; 32]);
        let parsed = TxHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = TxHash::from_hex("abcd").unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 32, actual: 2 });
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(TxHash::from_hash([1; 32]).short_hex().len(), 8);
    }

    #[test]
    fn json_uses_hex_string() {
        let hash = TxHash::from_hash([0x11; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "11".repeat(32)));
        let parsed: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn bincode_uses_raw_bytes() {
        let hash = TxHash::from_hash([0x22; 32]);
        let encoded = bincode::serialize(&hash).unwrap();
        // u64 length prefix followed by the digest
        assert_eq!(encoded.len(), 8 + 32);
        let decoded: TxHash = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded, hash);
    }
}
