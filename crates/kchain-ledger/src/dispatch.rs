use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::FatalError;
use crate::transaction::Transaction;

/// Failure reported by a [`CommitHook`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

/// Side effect run for every committed transaction, in commit order.
///
/// Hooks run on the dispatcher task, outside the ledger lock. A failing hook
/// is a fatal condition, and so is a panicking one: it is passed to the
/// engine's [`FatalHandler`] and the dispatcher stops.
#[async_trait]
pub trait CommitHook: Send + Sync {
    async fn on_commit(&self, tx: &Transaction) -> Result<(), HookError>;
}

pub struct NoOpHook;

#[async_trait]
impl CommitHook for NoOpHook {
    async fn on_commit(&self, _tx: &Transaction) -> Result<(), HookError> {
        Ok(())
    }
}

/// Logs each committed transaction at info level.
pub struct LoggingHook;

#[async_trait]
impl CommitHook for LoggingHook {
    async fn on_commit(&self, tx: &Transaction) -> Result<(), HookError> {
        info!(
            seq = tx.seq,
            hash = %tx.hash,
            asset = %tx.asset_id,
            owner = %tx.output.address,
            creation = tx.is_creation(),
            "transaction committed"
        );
        Ok(())
    }
}

/// Escalation for invariant violations.
pub type FatalHandler = Arc<dyn Fn(&FatalError) + Send + Sync>;

/// The default [`FatalHandler`]: log and exit the process with status 1.
pub fn terminate_process() -> FatalHandler {
    Arc::new(|fatal: &FatalError| {
        error!(error = %fatal, "fatal ledger condition; terminating process");
        std::process::exit(1);
    })
}

/// Background task draining commit notifications into a hook.
pub(crate) struct Dispatcher {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Dispatcher {
    pub(crate) fn spawn(
        runtime: &Handle,
        mut commits: UnboundedReceiver<Transaction>,
        hook: Arc<dyn CommitHook>,
        on_fatal: FatalHandler,
    ) -> Self {
        let (stop, mut stopped) = oneshot::channel::<()>();
        let task = runtime.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stopped => break,
                    next = commits.recv() => {
                        let Some(tx) = next else { break };
                        if let Err(reason) = run_hook(&hook, &tx).await {
                            let fatal = FatalError::CommitHook {
                                seq: tx.seq,
                                hash: tx.hash,
                                reason,
                            };
                            error!(error = %fatal, "commit hook failed");
                            on_fatal(&fatal);
                            break;
                        }
                    }
                }
            }
            debug!("commit dispatcher stopped");
        });
        Self { stop, task }
    }

    /// Signal the task to stop and wait for it to finish.
    ///
    /// Notifications still queued when the signal arrives are not run.
    pub(crate) async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "commit dispatcher task failed");
        }
    }
}

/// Run the hook on its own task so a panic surfaces as a failure.
async fn run_hook(hook: &Arc<dyn CommitHook>, tx: &Transaction) -> Result<(), String> {
    let hook = Arc::clone(hook);
    let tx = tx.clone();
    match tokio::spawn(async move { hook.on_commit(&tx).await }).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("hook panicked: {message}"))
        }
        Err(e) => Err(e.to_string()),
    }
}
