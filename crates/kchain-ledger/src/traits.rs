use kchain_types::{Address, AssetId, TxHash};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::{StoreResult, VerificationError};
use crate::transaction::{Output, Transaction};

/// Validation run by [`ChainLog::append`] before anything is written.
pub type TxCheck<'a> = dyn Fn(&Transaction) -> Result<(), VerificationError> + 'a;

/// Append-only log of committed transactions, indexed by sequence and hash.
///
/// Implementations must satisfy these invariants:
/// - Sequence numbers are dense from 0 and assigned on append.
/// - Nothing is persisted unless the append check succeeds.
/// - The subscriber is notified of each transaction after it is persisted,
///   in append order.
pub trait ChainLog: Send + Sync {
    /// Number of committed transactions.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recently appended transaction.
    fn head(&self) -> Option<Transaction>;

    fn get_by_sequence(&self, seq: u64) -> StoreResult<Transaction>;

    fn get_by_hash(&self, hash: &TxHash) -> StoreResult<Transaction>;

    /// Lazily read up to `count` transactions starting at `start`.
    ///
    /// The range is truncated at the end of the log rather than failing.
    fn get_range(&self, start: u64, count: u64) -> TxRange<'_, Self>
    where
        Self: Sized,
    {
        TxRange::new(self, start, count)
    }

    /// Run `check` on `tx`, then persist it at the next sequence number.
    ///
    /// Returns the committed transaction with its sequence assigned. A
    /// failing check yields [`StoreError::Rejected`](crate::StoreError::Rejected)
    /// and leaves the log untouched.
    fn append(&mut self, tx: Transaction, check: &TxCheck<'_>) -> StoreResult<Transaction>;

    /// Register the single consumer of commit notifications.
    ///
    /// A new subscription replaces the previous one.
    fn subscribe(&mut self) -> UnboundedReceiver<Transaction>;
}

/// Materialized current ownership derived from the chain log.
pub trait OwnershipProjection: Send + Sync {
    /// Hash of the asset's current unspent transaction.
    fn unspent_of(&self, asset_id: AssetId) -> Option<TxHash>;

    fn owner_of(&self, asset_id: AssetId) -> Option<Address>;

    /// Assets currently held by `address`, in ascending id order.
    fn assets_of(&self, address: &Address) -> Vec<AssetId>;

    /// Record a newly created asset. Fails with `DuplicateAsset` if it exists.
    fn apply_creation(
        &mut self,
        tx_hash: TxHash,
        asset_id: AssetId,
        output: &Output,
    ) -> StoreResult<()>;

    /// Move an asset to `new_output`. Fails with `UnknownAsset` or, if the
    /// live owner is not `expected_prior.address`, `StaleOwnership`.
    fn apply_transfer(
        &mut self,
        tx_hash: TxHash,
        asset_id: AssetId,
        expected_prior: &Output,
        new_output: &Output,
    ) -> StoreResult<()>;
}

/// Restartable lazy range over a chain log.
///
/// Cloning a range yields an independent iterator starting where the
/// original currently is.
pub struct TxRange<'a, L: ?Sized> {
    log: &'a L,
    next: u64,
    end: u64,
}

impl<'a, L: ChainLog + ?Sized> TxRange<'a, L> {
    pub fn new(log: &'a L, start: u64, count: u64) -> Self {
        let end = start.saturating_add(count).min(log.len());
        Self {
            log,
            next: start,
            end,
        }
    }
}

impl<L: ?Sized> Clone for TxRange<'_, L> {
    fn clone(&self) -> Self {
        Self {
            log: self.log,
            next: self.next,
            end: self.end,
        }
    }
}

impl<L: ChainLog + ?Sized> Iterator for TxRange<'_, L> {
    type Item = StoreResult<Transaction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let item = self.log.get_by_sequence(self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl<L: ChainLog + ?Sized> ExactSizeIterator for TxRange<'_, L> {}
