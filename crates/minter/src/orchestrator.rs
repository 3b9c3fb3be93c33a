use std::sync::Arc;

use alloy_primitives::{Address, TxHash};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    backend::{Backend, MintReceipt, MintedEvent},
    config::MinterConfig,
    error::{MinterError, Result},
    notice::{Notice, Notifier},
};

/// Lifecycle of a mint operation.
///
/// `Idle -> Submitting -> AwaitingConfirmation -> Settled -> Idle`, and `Failed -> Idle` from
/// either in-flight phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MintPhase {
    #[default]
    Idle,
    Submitting,
    AwaitingConfirmation,
    Settled,
    Failed,
}

impl MintPhase {
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Submitting | Self::AwaitingConfirmation)
    }
}

/// What a call to [`MintOrchestrator::request_mint`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MintOutcome {
    /// The mint was submitted and confirmed.
    Confirmed(MintReceipt),
    /// Another mint is in flight; nothing was submitted.
    AlreadyInFlight,
    /// No wallet session; nothing was submitted.
    NotConnected,
}

/// The mint most recently submitted by this client, used to recognize its minted event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct MintTicket {
    pub tx_hash: TxHash,
    pub minter: Address,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RecentMint(Arc<Mutex<Option<MintTicket>>>);

impl RecentMint {
    pub(crate) fn record(&self, ticket: MintTicket) {
        *self.0.lock() = Some(ticket);
    }

    pub(crate) fn forget(&self, tx_hash: TxHash) {
        let mut ticket = self.0.lock();
        if ticket.is_some_and(|t| t.tx_hash == tx_hash) {
            *ticket = None;
        }
    }

    /// Takes the ticket if `event` belongs to it. Events carrying a transaction hash are matched
    /// on it, others on the minting account.
    pub(crate) fn claim(&self, event: &MintedEvent) -> Option<MintTicket> {
        let mut ticket = self.0.lock();
        let matches = ticket.is_some_and(|t| match event.tx_hash {
            Some(hash) => hash == t.tx_hash,
            None => event.from == t.minter,
        });
        if matches { ticket.take() } else { None }
    }
}

/// Drives one mint at a time through submit, confirm and settle.
#[derive(Clone, Debug)]
pub struct MintOrchestrator {
    inner: Arc<OrchestratorInner>,
}

#[derive(Debug)]
struct OrchestratorInner {
    backend: Option<Backend>,
    session: watch::Receiver<Option<Address>>,
    /// Authoritative phase. `phase_tx` and `in_flight` are written while holding it.
    phase: Mutex<MintPhase>,
    phase_tx: watch::Sender<MintPhase>,
    in_flight: watch::Sender<bool>,
    config: Arc<MinterConfig>,
    recent: RecentMint,
    notifier: Notifier,
}

impl MintOrchestrator {
    pub(crate) fn new(
        backend: Option<Backend>,
        session: watch::Receiver<Option<Address>>,
        config: Arc<MinterConfig>,
        recent: RecentMint,
        notifier: Notifier,
    ) -> Self {
        let (phase_tx, _) = watch::channel(MintPhase::Idle);
        let (in_flight, _) = watch::channel(false);
        Self {
            inner: Arc::new(OrchestratorInner {
                backend,
                session,
                phase: Mutex::new(MintPhase::Idle),
                phase_tx,
                in_flight,
                config,
                recent,
                notifier,
            }),
        }
    }

    pub fn phase(&self) -> MintPhase {
        *self.inner.phase.lock()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<MintPhase> {
        self.inner.phase_tx.subscribe()
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase().is_in_flight()
    }

    /// Subscribes to the in-flight flag, true iff the phase is `Submitting` or
    /// `AwaitingConfirmation`.
    pub fn subscribe_in_flight(&self) -> watch::Receiver<bool> {
        self.inner.in_flight.subscribe()
    }

    /// Submits one mint and waits for its confirmation.
    ///
    /// Returns without submitting when another mint is in flight or no session is connected.
    /// Any failure is logged, reported as a notice and returned; the phase is back to `Idle`
    /// whenever this returns. Nothing is retried.
    ///
    /// The count is not updated here: it arrives through the minted event.
    pub async fn request_mint(&self) -> Result<MintOutcome> {
        let Some(backend) = &self.inner.backend else {
            debug!("wallet provider does not exist");
            self.inner.notifier.notify(Notice::InstallWallet);
            return Err(MinterError::ProviderAbsent);
        };
        let account = *self.inner.session.borrow();
        let Some(account) = account else {
            debug!("no connected session, ignoring mint request");
            return Ok(MintOutcome::NotConnected);
        };
        if !self.try_begin() {
            debug!("mint already in flight, ignoring mint request");
            return Ok(MintOutcome::AlreadyInFlight);
        }
        let op = Operation::new(self);

        info!(%account, "going to pop wallet now to pay gas");
        let pending = match backend.contract.submit_mint(account).await {
            Ok(pending) => pending,
            Err(err) => return Err(op.fail(err)),
        };

        let tx_hash = pending.tx_hash();
        self.inner.recent.record(MintTicket { tx_hash, minter: account });
        self.set_phase(MintPhase::AwaitingConfirmation);
        info!(%tx_hash, "mining, please wait");

        let receipt = match pending.confirmed().await {
            Ok(receipt) if receipt.success => receipt,
            Ok(receipt) => {
                self.inner.recent.forget(tx_hash);
                return Err(op.fail(MinterError::Transaction {
                    tx_hash: Some(receipt.tx_hash),
                    reason: "transaction reverted".to_string(),
                }));
            }
            Err(err) => {
                self.inner.recent.forget(tx_hash);
                return Err(op.fail(err));
            }
        };

        let link = self.inner.config.transaction_url(receipt.tx_hash);
        info!(tx_hash = %receipt.tx_hash, %link, "mined");
        op.settle();
        self.inner.notifier.notify(Notice::MintConfirmed { tx_hash: receipt.tx_hash, link });
        Ok(MintOutcome::Confirmed(receipt))
    }

    /// Moves `Idle` to `Submitting`. The check and the write happen under one lock.
    fn try_begin(&self) -> bool {
        let mut phase = self.inner.phase.lock();
        if *phase != MintPhase::Idle {
            return false;
        }
        *phase = MintPhase::Submitting;
        self.publish(MintPhase::Submitting);
        true
    }

    fn set_phase(&self, next: MintPhase) {
        let mut phase = self.inner.phase.lock();
        trace!(from = ?*phase, to = ?next, "mint phase");
        *phase = next;
        self.publish(next);
    }

    /// Publishes `terminal` and returns to `Idle` under one lock, so `Idle` is never observed
    /// late by a new request.
    fn finish(&self, terminal: MintPhase) {
        let mut phase = self.inner.phase.lock();
        trace!(from = ?*phase, to = ?terminal, "mint phase");
        self.publish(terminal);
        *phase = MintPhase::Idle;
        self.publish(MintPhase::Idle);
    }

    fn publish(&self, phase: MintPhase) {
        self.inner.phase_tx.send_replace(phase);
        let in_flight = phase.is_in_flight();
        self.inner.in_flight.send_if_modified(|current| {
            let changed = *current != in_flight;
            *current = in_flight;
            changed
        });
    }
}

/// An in-flight mint. Returns the orchestrator to `Idle` when finished, or when dropped early.
struct Operation<'a> {
    orchestrator: &'a MintOrchestrator,
    finished: bool,
}

impl<'a> Operation<'a> {
    fn new(orchestrator: &'a MintOrchestrator) -> Self {
        Self { orchestrator, finished: false }
    }

    fn settle(mut self) {
        self.finish(MintPhase::Settled);
    }

    fn fail(mut self, err: MinterError) -> MinterError {
        let notifier = &self.orchestrator.inner.notifier;
        match &err {
            MinterError::Rejected { operation, reason } => {
                warn!(%reason, "mint rejected");
                notifier.notify(Notice::Rejected { operation: *operation });
            }
            err => {
                error!(%err, "mint failed");
                notifier.notify(Notice::MintFailed { reason: err.to_string() });
            }
        }
        self.finish(MintPhase::Failed);
        err
    }

    fn finish(&mut self, terminal: MintPhase) {
        self.orchestrator.finish(terminal);
        self.finished = true;
    }
}

impl Drop for Operation<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("mint abandoned before settling");
            self.finish(MintPhase::Failed);
        }
    }
}
