use kchain_types::{Address, AssetId, TxHash};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerResult, StoreResult};
use crate::traits::{ChainLog, OwnershipProjection};
use crate::transaction::Transaction;

/// Current owner and unspent transaction of one asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetState {
    pub asset_id: AssetId,
    pub owner: Address,
    pub unspent: TxHash,
}

/// Assets currently held by one address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressState {
    pub address: Address,
    pub assets: Vec<AssetId>,
}

/// Number of assets held by one address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: Address,
    pub asset_count: u64,
}

pub(crate) fn asset_state<P: OwnershipProjection + ?Sized>(
    projection: &P,
    asset_id: AssetId,
) -> Option<AssetState> {
    let unspent = projection.unspent_of(asset_id)?;
    let owner = projection.owner_of(asset_id)?;
    Some(AssetState {
        asset_id,
        owner,
        unspent,
    })
}

/// Resolve the asset's unspent transaction through the projection.
pub(crate) fn unspent_tx<C, P>(
    chain: &C,
    projection: &P,
    asset_id: AssetId,
) -> LedgerResult<Option<Transaction>>
where
    C: ChainLog + ?Sized,
    P: OwnershipProjection + ?Sized,
{
    match projection.unspent_of(asset_id) {
        None => Ok(None),
        Some(hash) => Ok(Some(chain.get_by_hash(&hash)?)),
    }
}

/// Apply a verified transaction whose predecessor is `unspent`.
pub(crate) fn apply_tx<P: OwnershipProjection + ?Sized>(
    projection: &mut P,
    tx: &Transaction,
    unspent: Option<&Transaction>,
) -> StoreResult<()> {
    match unspent {
        None => projection.apply_creation(tx.hash, tx.asset_id, &tx.output),
        Some(prev) => projection.apply_transfer(tx.hash, tx.asset_id, &prev.output, &tx.output),
    }
}

#[cfg(test)]
mod tests {
    use kchain_crypto::SigningKey;

    use super::*;
    use crate::memory::{MemoryChainLog, MemoryProjection};
    use crate::transaction::Output;

    #[test]
    fn asset_state_combines_owner_and_unspent() {
        let issuer = SigningKey::from_bytes([1; 32]);
        let owner = SigningKey::from_bytes([2; 32]);
        let tx = Transaction::creation(AssetId::new(5), Output::new(owner.address()), &issuer);

        let mut projection = MemoryProjection::default();
        assert_eq!(asset_state(&projection, AssetId::new(5)), None);

        apply_tx(&mut projection, &tx, None).unwrap();
        assert_eq!(
            asset_state(&projection, AssetId::new(5)),
            Some(AssetState {
                asset_id: AssetId::new(5),
                owner: owner.address(),
                unspent: tx.hash,
            })
        );
    }

    #[test]
    fn unspent_tx_reads_through_the_log() {
        let issuer = SigningKey::from_bytes([1; 32]);
        let tx = Transaction::creation(AssetId::new(1), Output::new(issuer.address()), &issuer);

        let mut chain = MemoryChainLog::new();
        let committed = chain.append(tx, &|_| Ok(())).unwrap();
        let mut projection = MemoryProjection::default();
        apply_tx(&mut projection, &committed, None).unwrap();

        let found = unspent_tx(&chain, &projection, AssetId::new(1)).unwrap();
        assert_eq!(found, Some(committed));
        assert_eq!(unspent_tx(&chain, &projection, AssetId::new(2)).unwrap(), None);
    }

    #[test]
    fn unspent_missing_from_log_is_not_found() {
        let issuer = SigningKey::from_bytes([1; 32]);
        let tx = Transaction::creation(AssetId::new(1), Output::new(issuer.address()), &issuer);

        let chain = MemoryChainLog::new();
        let mut projection = MemoryProjection::default();
        apply_tx(&mut projection, &tx, None).unwrap();

        let err = unspent_tx(&chain, &projection, AssetId::new(1)).unwrap_err();
        assert!(err.is_not_found());
    }
}
