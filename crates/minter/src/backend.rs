//! Collaborator interfaces consumed by the mint client.

use std::{fmt, sync::Arc};

use alloy_primitives::{Address, ChainId, TxHash};
use async_trait::async_trait;
use futures::{future::BoxFuture, stream::BoxStream};

use crate::error::Result;

/// Account and network access exposed by an injected wallet (EIP-1193).
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Requests account authorization, possibly prompting the user (`eth_requestAccounts`).
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    /// Returns the already authorized accounts without prompting (`eth_accounts`).
    async fn authorized_accounts(&self) -> Result<Vec<Address>>;

    /// Returns the chain the wallet is currently pointed at (`eth_chainId`).
    async fn chain_id(&self) -> Result<ChainId>;
}

/// Read, write and event access to the deployed mint contract.
#[async_trait]
pub trait ContractClient: Send + Sync {
    /// Reads the total number of tokens minted so far.
    async fn read_total_minted(&self) -> Result<u64>;

    /// Submits the mint transaction from `from`. Resolves once the wallet has signed and
    /// broadcast it.
    async fn submit_mint(&self, from: Address) -> Result<PendingMint>;

    /// Subscribes to `NewEpicNFTMinted` events.
    async fn subscribe_minted(&self) -> Result<MintedEventStream>;
}

/// Stream of minted events pushed by the contract client.
pub type MintedEventStream = BoxStream<'static, Result<MintedEvent>>;

/// A minted event as delivered by the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintedEvent {
    /// The account that minted.
    pub from: Address,
    /// The token id, interpreted as the new total.
    pub token_id: u64,
    /// Hash of the transaction that emitted the event, when known.
    pub tx_hash: Option<TxHash>,
}

/// Confirmation receipt of a mint transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    /// False if the transaction was included but reverted.
    pub success: bool,
}

/// A broadcast mint transaction awaiting confirmation.
///
/// There is no way to abort the confirmation wait once the transaction is submitted.
pub struct PendingMint {
    tx_hash: TxHash,
    confirmation: BoxFuture<'static, Result<MintReceipt>>,
}

impl PendingMint {
    pub fn new(tx_hash: TxHash, confirmation: BoxFuture<'static, Result<MintReceipt>>) -> Self {
        Self { tx_hash, confirmation }
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Waits for the confirmation receipt.
    pub async fn confirmed(self) -> Result<MintReceipt> {
        self.confirmation.await
    }
}

impl fmt::Debug for PendingMint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingMint").field("tx_hash", &self.tx_hash).finish_non_exhaustive()
    }
}

/// The injected wallet capability. The contract client is reached through the wallet, so
/// neither exists without the other.
#[derive(Clone)]
pub struct Backend {
    pub wallet: Arc<dyn WalletProvider>,
    pub contract: Arc<dyn ContractClient>,
}

impl Backend {
    pub fn new(wallet: Arc<dyn WalletProvider>, contract: Arc<dyn ContractClient>) -> Self {
        Self { wallet, contract }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}
