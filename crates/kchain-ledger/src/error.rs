use std::fmt;

use kchain_types::{Address, AssetId, TxHash};

/// Reasons a candidate transaction may not extend an asset's history.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("malformed transaction: claimed hash {claimed}, computed {computed}")]
    MalformedTransaction { claimed: TxHash, computed: TxHash },

    #[error("unauthorized creation of asset {asset_id}: not a creation signed by the issuer")]
    UnauthorizedCreation { asset_id: AssetId },

    #[error("invalid signature on transfer of asset {asset_id}")]
    InvalidSignature { asset_id: AssetId },

    #[error("stale reference for asset {asset_id}: unspent is {expected}, input is {found}")]
    StaleReference {
        asset_id: AssetId,
        expected: TxHash,
        found: TxHash,
    },
}

impl VerificationError {
    /// Stable machine-readable code, used by the HTTP API.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedTransaction { .. } => "malformed_transaction",
            Self::UnauthorizedCreation { .. } => "unauthorized_creation",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::StaleReference { .. } => "stale_reference",
        }
    }
}

/// Key of a chain log lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxLookup {
    Sequence(u64),
    Hash(TxHash),
}

impl fmt::Display for TxLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence(seq) => write!(f, "seq {seq}"),
            Self::Hash(hash) => write!(f, "hash {hash}"),
        }
    }
}

/// Errors from chain log and ownership projection backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("transaction not found: {0}")]
    NotFound(TxLookup),

    #[error("asset {0} already exists")]
    DuplicateAsset(AssetId),

    #[error("asset {0} does not exist")]
    UnknownAsset(AssetId),

    #[error("stale ownership of asset {asset_id}: expected owner {expected}, live owner {actual}")]
    StaleOwnership {
        asset_id: AssetId,
        expected: Address,
        actual: Address,
    },

    #[error("transaction {0} is already in the chain log")]
    DuplicateTransaction(TxHash),

    #[error("append rejected: {0}")]
    Rejected(VerificationError),

    #[error("corrupt chain log at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from encoding or decoding transactions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("invalid binary encoding: {0}")]
    Binary(String),
}

/// Errors returned by the ledger engine.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid page size: per_page must be greater than zero")]
    InvalidPageSize,

    #[error("sequence gap: expected seq {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },

    #[error("replay failed at seq {seq}: {source}")]
    Replay {
        seq: u64,
        #[source]
        source: Box<LedgerError>,
    },

    #[error("chain log and ownership projection have diverged")]
    Diverged,

    #[error("ledger is closed")]
    Closed,

    #[error("ledger lock poisoned")]
    Poisoned,

    #[error("no tokio runtime available for the commit dispatcher")]
    NoRuntime,
}

impl LedgerError {
    /// Returns `true` if this error is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound(_)))
    }
}

/// Result alias for engine operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Invariant violations that must not be survived.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("projection diverged from chain log at seq {seq} ({hash}): {source}")]
    Diverged {
        seq: u64,
        hash: TxHash,
        source: StoreError,
    },

    #[error("commit hook failed at seq {seq} ({hash}): {reason}")]
    CommitHook {
        seq: u64,
        hash: TxHash,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_codes_are_stable() {
        let asset_id = AssetId::new(1);
        assert_eq!(
            VerificationError::UnauthorizedCreation { asset_id }.code(),
            "unauthorized_creation"
        );
        assert_eq!(
            VerificationError::StaleReference {
                asset_id,
                expected: TxHash::null(),
                found: TxHash::null(),
            }
            .code(),
            "stale_reference"
        );
    }

    #[test]
    fn not_found_is_detected() {
        let err = LedgerError::from(StoreError::NotFound(TxLookup::Sequence(3)));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "store error: transaction not found: seq 3");
        assert!(!LedgerError::InvalidPageSize.is_not_found());
    }
}
