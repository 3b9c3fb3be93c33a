//! In-memory wallet provider and contract client used by the unit tests.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy_primitives::{Address, B256, ChainId, TxHash, address};
use async_trait::async_trait;
use futures::{FutureExt, StreamExt, channel::mpsc};
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

use crate::{
    backend::{
        Backend, ContractClient, MintReceipt, MintedEvent, MintedEventStream, PendingMint,
        WalletProvider,
    },
    error::{MinterError, Result},
};

pub(crate) const ALICE: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub(crate) const BOB: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");

/// Waits until the watched value satisfies `f`, failing the test after a few seconds.
pub(crate) async fn wait_until<T>(rx: &mut watch::Receiver<T>, f: impl FnMut(&T) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(f))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

pub(crate) fn tx_hash(n: usize) -> TxHash {
    B256::with_last_byte(n as u8)
}

#[derive(Debug)]
pub(crate) struct FakeWallet {
    chain_id: Mutex<ChainId>,
    authorized: Mutex<Vec<Address>>,
    granted: Mutex<Vec<Address>>,
    reject: Mutex<bool>,
    chain_gate: Mutex<Option<oneshot::Receiver<()>>>,
    requests: AtomicUsize,
}

impl FakeWallet {
    pub(crate) fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id: Mutex::new(chain_id),
            authorized: Mutex::new(Vec::new()),
            granted: Mutex::new(vec![ALICE]),
            reject: Mutex::new(false),
            chain_gate: Mutex::new(None),
            requests: AtomicUsize::new(0),
        }
    }

    /// Accounts already authorized before the client starts.
    pub(crate) fn with_authorized(self, accounts: Vec<Address>) -> Self {
        *self.authorized.lock() = accounts;
        self
    }

    pub(crate) fn set_chain_id(&self, chain_id: ChainId) {
        *self.chain_id.lock() = chain_id;
    }

    /// Accounts the user approves on the next prompt.
    pub(crate) fn grant(&self, accounts: Vec<Address>) {
        *self.granted.lock() = accounts;
    }

    pub(crate) fn reject_prompts(&self, reject: bool) {
        *self.reject.lock() = reject;
    }

    /// Blocks the next chain id read until the returned sender fires.
    pub(crate) fn gate_chain_id(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.chain_gate.lock() = Some(rx);
        tx
    }

    pub(crate) fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if *self.reject.lock() {
            return Err(MinterError::rejected("Connect", "User rejected the request."));
        }
        let granted = self.granted.lock().clone();
        *self.authorized.lock() = granted.clone();
        Ok(granted)
    }

    async fn authorized_accounts(&self) -> Result<Vec<Address>> {
        tokio::task::yield_now().await;
        Ok(self.authorized.lock().clone())
    }

    async fn chain_id(&self) -> Result<ChainId> {
        let gate = self.chain_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(*self.chain_id.lock())
    }
}

/// Scripted behaviour of the next `submit_mint` call.
pub(crate) enum Script {
    /// The user declines the signature prompt.
    Reject,
    /// The transaction is confirmed as soon as it is awaited.
    Confirm,
    /// The transaction is mined but reverts.
    Revert,
    /// Confirmation resolves when the test sends on the paired sender.
    Hold(oneshot::Receiver<Result<MintReceipt>>),
}

impl Script {
    pub(crate) fn hold() -> (Self, oneshot::Sender<Result<MintReceipt>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Hold(rx), tx)
    }
}

#[derive(Default)]
pub(crate) struct FakeContract {
    total: Mutex<u64>,
    read_gate: Mutex<Option<oneshot::Receiver<()>>>,
    scripts: Mutex<VecDeque<Script>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Result<MintedEvent>>>>,
    submissions: AtomicUsize,
    subscriptions: AtomicUsize,
    reads: AtomicUsize,
}

impl FakeContract {
    pub(crate) fn new(total: u64) -> Self {
        Self { total: Mutex::new(total), ..Default::default() }
    }

    pub(crate) fn set_total(&self, total: u64) {
        *self.total.lock() = total;
    }

    pub(crate) fn script(&self, script: Script) {
        self.scripts.lock().push_back(script);
    }

    /// Blocks the next read until the returned sender fires.
    pub(crate) fn gate_read(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.read_gate.lock() = Some(rx);
        tx
    }

    /// Delivers an event to every live subscription.
    pub(crate) fn emit(&self, event: MintedEvent) {
        self.subscribers.lock().retain(|tx| tx.unbounded_send(Ok(event)).is_ok());
    }

    /// Delivers a transport error to every live subscription.
    pub(crate) fn emit_error(&self, reason: &str) {
        self.subscribers
            .lock()
            .retain(|tx| tx.unbounded_send(Err(MinterError::provider(reason))).is_ok());
    }

    pub(crate) fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub(crate) fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of subscriptions whose stream is still being consumed.
    pub(crate) fn live_subscriptions(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

#[async_trait]
impl ContractClient for FakeContract {
    async fn read_total_minted(&self) -> Result<u64> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let gate = self.read_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(*self.total.lock())
    }

    async fn submit_mint(&self, _from: Address) -> Result<PendingMint> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;
        let hash = tx_hash(n);
        let receipt = MintReceipt { tx_hash: hash, block_number: Some(n as u64), success: true };
        let script = self.scripts.lock().pop_front().unwrap_or(Script::Confirm);
        let confirmation = match script {
            Script::Reject => {
                return Err(MinterError::rejected("Mint", "User denied transaction signature."));
            }
            Script::Confirm => async move { Ok::<_, MinterError>(receipt) }.boxed(),
            Script::Revert => {
                async move { Ok(MintReceipt { success: false, ..receipt }) }.boxed()
            }
            Script::Hold(rx) => async move {
                rx.await.unwrap_or_else(|_| {
                    Err(MinterError::Transaction {
                        tx_hash: Some(hash),
                        reason: "transaction dropped".to_string(),
                    })
                })
            }
            .boxed(),
        };
        Ok(PendingMint::new(hash, confirmation))
    }

    async fn subscribe_minted(&self) -> Result<MintedEventStream> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.lock().push(tx);
        Ok(rx.boxed())
    }
}

pub(crate) fn backend(wallet: &Arc<FakeWallet>, contract: &Arc<FakeContract>) -> Backend {
    Backend::new(wallet.clone(), contract.clone())
}
