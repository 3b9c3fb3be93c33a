use std::{fmt, sync::Arc};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    backend::{ContractClient, MintedEvent, MintedEventStream},
    config::{CountMerge, MinterConfig},
    error::Result,
    notice::{Notice, Notifier},
    orchestrator::RecentMint,
};

/// Minted count relative to the collection size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintProgress {
    pub minted: u64,
    pub max_supply: u64,
}

impl MintProgress {
    pub fn is_sold_out(&self) -> bool {
        self.minted >= self.max_supply
    }
}

impl fmt::Display for MintProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} so far", self.minted, self.max_supply)
    }
}

/// Owns the authoritative "minted so far" count.
///
/// The count comes from two sources: one read of the contract per session, and the stream of
/// minted events. The read only applies while no event has landed in the current session, so
/// a slow read can never overwrite a newer event.
#[derive(Clone, Debug)]
pub struct MintCounter {
    inner: Arc<CounterInner>,
}

#[derive(Debug)]
struct CounterInner {
    count: watch::Sender<u64>,
    /// Set once an event has been applied in the current session. Writers of `count` hold this
    /// lock.
    event_landed: Mutex<bool>,
    config: Arc<MinterConfig>,
    recent: RecentMint,
    notifier: Notifier,
}

impl MintCounter {
    pub(crate) fn new(config: Arc<MinterConfig>, recent: RecentMint, notifier: Notifier) -> Self {
        let (count, _) = watch::channel(0);
        Self {
            inner: Arc::new(CounterInner {
                count,
                event_landed: Mutex::new(false),
                config,
                recent,
                notifier,
            }),
        }
    }

    /// The current count.
    pub fn count(&self) -> u64 {
        *self.inner.count.borrow()
    }

    pub fn progress(&self) -> MintProgress {
        MintProgress { minted: self.count(), max_supply: self.inner.config.max_supply }
    }

    /// Subscribes to count changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.count.subscribe()
    }

    /// Reads the total from the contract and applies it unless an event already landed in this
    /// session. Returns the value read.
    pub async fn load_initial(&self, contract: &dyn ContractClient) -> Result<u64> {
        let total = contract.read_total_minted().await?;

        let event_landed = self.inner.event_landed.lock();
        if *event_landed {
            debug!(total, current = self.count(), "ignoring initial read, an event already landed");
        } else {
            self.inner.count.send_replace(total);
            debug!(total, "loaded total minted so far");
        }
        Ok(total)
    }

    /// Applies a minted event. The token id is the new total.
    pub fn on_minted_event(&self, event: MintedEvent) {
        let MintedEvent { from, token_id, .. } = event;
        info!(%from, token_id, "minted event");

        {
            let mut event_landed = self.inner.event_landed.lock();
            *event_landed = true;

            let current = self.count();
            match self.inner.config.count_merge {
                CountMerge::Monotonic if token_id < current => {
                    warn!(token_id, current, "ignoring stale minted event");
                }
                CountMerge::Monotonic if token_id == current => {
                    trace!(token_id, "duplicate minted event");
                }
                CountMerge::Monotonic | CountMerge::LastWrite => {
                    self.inner.count.send_replace(token_id);
                }
            }
        }

        if self.inner.recent.claim(&event).is_some() {
            self.inner.notifier.notify(Notice::Minted {
                token_id,
                link: self.inner.config.token_url(token_id),
            });
        }
    }

    /// Consumes `events` on a background task until the stream ends or the task is aborted.
    pub fn listen(&self, mut events: MintedEventStream) -> JoinHandle<()> {
        let counter = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => counter.on_minted_event(event),
                    Err(err) => warn!(%err, "minted event subscription error"),
                }
            }
            debug!("minted event subscription closed");
        })
    }

    /// Starts a new session: the next initial read is authoritative again.
    pub(crate) fn reset_session(&self) {
        *self.inner.event_landed.lock() = false;
    }
}
