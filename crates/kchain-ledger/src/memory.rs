use std::collections::{BTreeMap, BTreeSet, HashMap};

use kchain_types::{Address, AssetId, TxHash};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::error::{StoreError, StoreResult, TxLookup};
use crate::traits::{ChainLog, OwnershipProjection, TxCheck};
use crate::transaction::{Output, Transaction};

/// In-memory chain log for tests, local demos, and embedding.
///
/// Synchronization is left to the owner; the ledger engine guards it with
/// its own lock.
#[derive(Default)]
pub struct MemoryChainLog {
    txs: Vec<Transaction>,
    hash_index: HashMap<TxHash, u64>,
    subscriber: Option<UnboundedSender<Transaction>>,
}

impl MemoryChainLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load previously persisted transactions verbatim, without validation.
    ///
    /// Models a log that exists before the engine starts; the engine's replay
    /// is responsible for rejecting anything invalid in it.
    pub fn from_transactions(txs: Vec<Transaction>) -> Self {
        let hash_index = txs
            .iter()
            .enumerate()
            .map(|(index, tx)| (tx.hash, index as u64))
            .collect();
        Self {
            txs,
            hash_index,
            subscriber: None,
        }
    }

    /// All committed transactions in sequence order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.txs
    }
}

impl ChainLog for MemoryChainLog {
    fn len(&self) -> u64 {
        self.txs.len() as u64
    }

    fn head(&self) -> Option<Transaction> {
        self.txs.last().cloned()
    }

    fn get_by_sequence(&self, seq: u64) -> StoreResult<Transaction> {
        usize::try_from(seq)
            .ok()
            .and_then(|index| self.txs.get(index))
            .cloned()
            .ok_or(StoreError::NotFound(TxLookup::Sequence(seq)))
    }

    fn get_by_hash(&self, hash: &TxHash) -> StoreResult<Transaction> {
        self.hash_index
            .get(hash)
            .and_then(|seq| self.txs.get(*seq as usize))
            .cloned()
            .ok_or(StoreError::NotFound(TxLookup::Hash(*hash)))
    }

    fn append(&mut self, tx: Transaction, check: &TxCheck<'_>) -> StoreResult<Transaction> {
        check(&tx).map_err(StoreError::Rejected)?;
        if self.hash_index.contains_key(&tx.hash) {
            return Err(StoreError::DuplicateTransaction(tx.hash));
        }

        let seq = self.len();
        let tx = tx.with_seq(seq);
        self.hash_index.insert(tx.hash, seq);
        self.txs.push(tx.clone());
        debug!(seq, hash = %tx.hash.short_hex(), "memory log append");

        let delivered = self
            .subscriber
            .as_ref()
            .map(|subscriber| subscriber.send(tx.clone()).is_ok());
        if delivered == Some(false) {
            debug!(seq, "commit subscriber gone; dropping notifications");
            self.subscriber = None;
        }
        Ok(tx)
    }

    fn subscribe(&mut self) -> UnboundedReceiver<Transaction> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscriber = Some(sender);
        receiver
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AssetRecord {
    owner: Address,
    unspent: TxHash,
}

/// In-memory ownership projection.
///
/// Two projections compare equal when every asset has the same owner and
/// unspent transaction and every address holds the same assets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryProjection {
    assets: BTreeMap<AssetId, AssetRecord>,
    holdings: BTreeMap<Address, BTreeSet<AssetId>>,
}

impl MemoryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of assets created so far.
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    fn release(&mut self, address: &Address, asset_id: AssetId) {
        if let Some(held) = self.holdings.get_mut(address) {
            held.remove(&asset_id);
            if held.is_empty() {
                self.holdings.remove(address);
            }
        }
    }
}

impl OwnershipProjection for MemoryProjection {
    fn unspent_of(&self, asset_id: AssetId) -> Option<TxHash> {
        self.assets.get(&asset_id).map(|r| r.unspent)
    }

    fn owner_of(&self, asset_id: AssetId) -> Option<Address> {
        self.assets.get(&asset_id).map(|r| r.owner)
    }

    fn assets_of(&self, address: &Address) -> Vec<AssetId> {
        self.holdings
            .get(address)
            .map(|held| held.iter().copied().collect())
            .unwrap_or_default()
    }

    fn apply_creation(
        &mut self,
        tx_hash: TxHash,
        asset_id: AssetId,
        output: &Output,
    ) -> StoreResult<()> {
        if self.assets.contains_key(&asset_id) {
            return Err(StoreError::DuplicateAsset(asset_id));
        }
        self.assets.insert(
            asset_id,
            AssetRecord {
                owner: output.address,
                unspent: tx_hash,
            },
        );
        self.holdings
            .entry(output.address)
            .or_default()
            .insert(asset_id);
        Ok(())
    }

    fn apply_transfer(
        &mut self,
        tx_hash: TxHash,
        asset_id: AssetId,
        expected_prior: &Output,
        new_output: &Output,
    ) -> StoreResult<()> {
        let record = self
            .assets
            .get_mut(&asset_id)
            .ok_or(StoreError::UnknownAsset(asset_id))?;
        if record.owner != expected_prior.address {
            return Err(StoreError::StaleOwnership {
                asset_id,
                expected: expected_prior.address,
                actual: record.owner,
            });
        }

        let previous_owner = record.owner;
        record.owner = new_output.address;
        record.unspent = tx_hash;

        self.release(&previous_owner, asset_id);
        self.holdings
            .entry(new_output.address)
            .or_default()
            .insert(asset_id);
        Ok(())
    }
}
