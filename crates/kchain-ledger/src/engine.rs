use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

use kchain_crypto::VerifyingKey;
use kchain_types::{Address, AssetId, TxHash};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, error, info};

use crate::dispatch::{terminate_process, CommitHook, Dispatcher, FatalHandler};
use crate::error::{FatalError, LedgerError, LedgerResult, StoreError, StoreResult};
use crate::projection::{self, apply_tx, unspent_tx, AddressState, AssetState, Balance};
use crate::replay::{rebuild, replay};
use crate::traits::{ChainLog, OwnershipProjection};
use crate::transaction::Transaction;
use crate::validation::verify;

/// Engine configuration.
#[derive(Clone)]
pub struct LedgerConfig {
    /// The only key allowed to create assets.
    pub issuer: VerifyingKey,
    /// Called on divergence or commit hook failure.
    pub on_fatal: FatalHandler,
}

impl LedgerConfig {
    /// Configuration with the process-terminating fatal handler.
    pub fn new(issuer: VerifyingKey) -> Self {
        Self {
            issuer,
            on_fatal: terminate_process(),
        }
    }

    pub fn with_fatal_handler(mut self, on_fatal: FatalHandler) -> Self {
        self.on_fatal = on_fatal;
        self
    }
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("issuer", &self.issuer.to_hex())
            .finish_non_exhaustive()
    }
}

/// One page of the transaction history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxPage {
    pub transactions: Vec<Transaction>,
    pub total_page_count: u64,
}

struct LedgerState<C, P> {
    chain: C,
    projection: P,
}

/// The ledger: a chain log and its ownership projection behind one lock.
///
/// `inject` holds the write lock for the whole verify, append, apply
/// sequence, so two spends of the same unspent transaction can never both
/// be accepted. Readers share the lock and see either the state before or
/// after an injection. Commit hooks run on a background task that never
/// touches the lock.
pub struct LedgerEngine<C, P> {
    config: LedgerConfig,
    state: RwLock<LedgerState<C, P>>,
    dispatcher: Mutex<Option<Dispatcher>>,
    closed: AtomicBool,
    diverged: AtomicBool,
}

impl<C, P> LedgerEngine<C, P>
where
    C: ChainLog,
    P: OwnershipProjection,
{
    /// Replay `chain` into `projection` and start the commit dispatcher.
    ///
    /// Must be called within a tokio runtime. Any replay failure aborts the
    /// open; the engine never starts from a partially verified state.
    pub fn open(
        config: LedgerConfig,
        mut chain: C,
        mut projection: P,
        hook: Arc<dyn CommitHook>,
    ) -> LedgerResult<Self> {
        let runtime = Handle::try_current().map_err(|_| LedgerError::NoRuntime)?;

        let report = replay(&chain, &mut projection, &config.issuer)?;
        info!(
            applied = report.applied,
            creations = report.creations,
            transfers = report.transfers,
            "ledger replayed"
        );

        let commits = chain.subscribe();
        let dispatcher = Dispatcher::spawn(&runtime, commits, hook, config.on_fatal.clone());

        Ok(Self {
            config,
            state: RwLock::new(LedgerState { chain, projection }),
            dispatcher: Mutex::new(Some(dispatcher)),
            closed: AtomicBool::new(false),
            diverged: AtomicBool::new(false),
        })
    }

    /// Stop accepting injections and wait for the dispatcher to exit.
    pub async fn close(&self) {
        {
            // Wait out any in-flight injection.
            let _guard = self.state.write();
            self.closed.store(true, Ordering::Release);
        }

        let dispatcher = match self.dispatcher.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(dispatcher) = dispatcher {
            dispatcher.shutdown().await;
            info!("ledger closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn issuer(&self) -> &VerifyingKey {
        &self.config.issuer
    }

    /// Verify `tx`, append it to the chain log and apply it to the projection.
    ///
    /// Returns the committed transaction with its sequence number.
    pub fn inject(&self, tx: Transaction) -> LedgerResult<Transaction> {
        let mut guard = self.state.write().map_err(|_| LedgerError::Poisoned)?;
        if self.closed.load(Ordering::Acquire) {
            return Err(LedgerError::Closed);
        }
        if self.diverged.load(Ordering::Acquire) {
            return Err(LedgerError::Diverged);
        }

        let LedgerState { chain, projection } = &mut *guard;
        let issuer = &self.config.issuer;

        let unspent = unspent_tx(&*chain, &*projection, tx.asset_id)?;
        verify(&tx, unspent.as_ref(), issuer)?;

        let committed = chain
            .append(tx, &|candidate: &Transaction| verify(candidate, unspent.as_ref(), issuer))
            .map_err(|e| match e {
                StoreError::Rejected(reason) => LedgerError::Verification(reason),
                other => LedgerError::Store(other),
            })?;

        if let Err(source) = apply_tx(projection, &committed, unspent.as_ref()) {
            self.diverged.store(true, Ordering::Release);
            let fatal = FatalError::Diverged {
                seq: committed.seq,
                hash: committed.hash,
                source,
            };
            error!(error = %fatal, "chain log and projection diverged");
            (self.config.on_fatal)(&fatal);
            return Err(LedgerError::Diverged);
        }

        debug!(seq = committed.seq, tx = %committed, "transaction injected");
        Ok(committed)
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, LedgerState<C, P>>> {
        self.state.read().map_err(|_| LedgerError::Poisoned)
    }

    /// Number of committed transactions.
    pub fn len(&self) -> LedgerResult<u64> {
        Ok(self.read()?.chain.len())
    }

    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn head(&self) -> LedgerResult<Option<Transaction>> {
        Ok(self.read()?.chain.head())
    }

    pub fn get_by_hash(&self, hash: &TxHash) -> LedgerResult<Transaction> {
        Ok(self.read()?.chain.get_by_hash(hash)?)
    }

    pub fn get_by_sequence(&self, seq: u64) -> LedgerResult<Transaction> {
        Ok(self.read()?.chain.get_by_sequence(seq)?)
    }

    /// Current owner and unspent transaction, or `None` for an unknown asset.
    pub fn asset_state(&self, asset_id: AssetId) -> LedgerResult<Option<AssetState>> {
        Ok(projection::asset_state(&self.read()?.projection, asset_id))
    }

    /// Assets held by `address`; empty for an address that holds nothing.
    pub fn address_state(&self, address: &Address) -> LedgerResult<AddressState> {
        let state = self.read()?;
        Ok(AddressState {
            address: *address,
            assets: state.projection.assets_of(address),
        })
    }

    /// Asset counts for each address, in the order given.
    pub fn balances(&self, addresses: &[Address]) -> LedgerResult<Vec<Balance>> {
        let state = self.read()?;
        Ok(addresses
            .iter()
            .map(|address| Balance {
                address: *address,
                asset_count: state.projection.assets_of(address).len() as u64,
            })
            .collect())
    }

    /// Page `current_page` (zero-based) of the history, `per_page` per page.
    ///
    /// Pages past the end are empty; `total_page_count` is always reported.
    pub fn page(&self, current_page: u64, per_page: u64) -> LedgerResult<TxPage> {
        if per_page == 0 {
            return Err(LedgerError::InvalidPageSize);
        }

        let state = self.read()?;
        let len = state.chain.len();
        let total_page_count = len.div_ceil(per_page);

        let transactions = match current_page.checked_mul(per_page) {
            Some(start) if start < len => state
                .chain
                .get_range(start, per_page)
                .collect::<StoreResult<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(TxPage {
            transactions,
            total_page_count,
        })
    }
}

impl<C, P> LedgerEngine<C, P>
where
    C: ChainLog,
    P: OwnershipProjection + Default + PartialEq,
{
    /// Rebuild a projection from the log and compare it with the live one.
    pub fn audit(&self) -> LedgerResult<bool> {
        let state = self.read()?;
        let rebuilt: P = rebuild(&state.chain, &self.config.issuer)?;
        let consistent = rebuilt == state.projection;
        if consistent {
            info!(len = state.chain.len(), "audit passed");
        } else {
            error!(len = state.chain.len(), "audit found projection drift");
        }
        Ok(consistent)
    }
}

impl<C, P> LedgerEngine<C, P>
where
    C: ChainLog,
    P: OwnershipProjection + Clone,
{
    /// A copy of the live projection.
    pub fn projection_snapshot(&self) -> LedgerResult<P> {
        Ok(self.read()?.projection.clone())
    }
}
