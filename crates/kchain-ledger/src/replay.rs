use kchain_crypto::VerifyingKey;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::projection::{apply_tx, unspent_tx};
use crate::traits::{ChainLog, OwnershipProjection};
use crate::validation::verify;

/// Counts from replaying a chain log into a projection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub applied: u64,
    pub creations: u64,
    pub transfers: u64,
}

/// Re-verify every transaction in `chain` and apply it to `projection`.
///
/// The first failure aborts the replay; nothing is skipped. The projection
/// is expected to start empty.
pub fn replay<C, P>(chain: &C, projection: &mut P, issuer: &VerifyingKey) -> LedgerResult<ReplayReport>
where
    C: ChainLog,
    P: OwnershipProjection,
{
    let mut report = ReplayReport::default();

    for (expected, item) in (0u64..).zip(chain.get_range(0, chain.len())) {
        let at = |source: LedgerError| LedgerError::Replay {
            seq: expected,
            source: Box::new(source),
        };

        let tx = item.map_err(|e| at(e.into()))?;
        if tx.seq != expected {
            return Err(at(LedgerError::SequenceGap {
                expected,
                found: tx.seq,
            }));
        }
        debug!(seq = tx.seq, tx = %tx, "replaying transaction");

        let unspent = unspent_tx(chain, projection, tx.asset_id).map_err(at)?;
        verify(&tx, unspent.as_ref(), issuer).map_err(|e| at(e.into()))?;
        apply_tx(projection, &tx, unspent.as_ref()).map_err(|e| at(e.into()))?;

        report.applied += 1;
        if unspent.is_none() {
            report.creations += 1;
        } else {
            report.transfers += 1;
        }
    }

    Ok(report)
}

/// Build a fresh projection from the whole chain log.
pub fn rebuild<C, P>(chain: &C, issuer: &VerifyingKey) -> LedgerResult<P>
where
    C: ChainLog,
    P: OwnershipProjection + Default,
{
    let mut projection = P::default();
    replay(chain, &mut projection, issuer)?;
    Ok(projection)
}
