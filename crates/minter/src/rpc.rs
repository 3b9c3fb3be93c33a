//! JSON-RPC backed [`WalletProvider`] and [`ContractClient`].
//!
//! The wallet side speaks the EIP-1193 account methods (`eth_requestAccounts`, `eth_accounts`,
//! `eth_chainId`) to the configured endpoint, which is expected to hold the accounts it reports
//! (a browser wallet bridge or a development node). Mint transactions are sent unsigned with
//! `eth_sendTransaction` so the endpoint signs them.

use std::{fmt, sync::Arc, time::Duration};

use alloy_json_rpc::ErrorPayload;
use alloy_network::ReceiptResponse;
use alloy_primitives::{Address, ChainId, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::Log;
use alloy_sol_types::sol;
use alloy_transport::TransportError;
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use url::Url;

use crate::{
    backend::{
        Backend, ContractClient, MintReceipt, MintedEvent, MintedEventStream, PendingMint,
        WalletProvider,
    },
    config::MinterConfig,
    error::{MinterError, Result},
};

sol! {
    #[sol(rpc)]
    interface EpicNft {
        function makeAnEpicNFT() external;
        function getTotalNFTsMintedSoFar() external view returns (uint256);
        event NewEpicNFTMinted(address sender, uint256 tokenId);
    }
}

/// EIP-1193 error code for a request the user declined.
const USER_REJECTED: i64 = 4001;
/// JSON-RPC error code for an unknown method.
const METHOD_NOT_FOUND: i64 = -32601;

/// Connects to the configured endpoint. Returns `None` when no endpoint is configured, which the
/// client treats as an absent wallet provider.
pub fn connect(config: &MinterConfig) -> Result<Option<Backend>> {
    let Some(rpc_url) = config.rpc_url.as_deref() else {
        debug!("no rpc url configured");
        return Ok(None);
    };
    let url: Url =
        rpc_url.parse().map_err(|err| MinterError::provider(format!("{rpc_url}: {err}")))?;
    let provider = ProviderBuilder::new().connect_http(url).erased();
    if let Some(interval) = config.poll_interval_ms {
        provider.client().set_poll_interval(Duration::from_millis(interval));
    }
    debug!(%rpc_url, contract = %config.contract, "connected wallet provider");

    let wallet = RpcWallet::new(provider.clone());
    let contract = RpcMintContract::new(provider, config.contract);
    Ok(Some(Backend::new(Arc::new(wallet), Arc::new(contract))))
}

/// Wallet provider over JSON-RPC.
#[derive(Clone)]
pub struct RpcWallet {
    provider: DynProvider,
}

impl fmt::Debug for RpcWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcWallet").finish_non_exhaustive()
    }
}

impl RpcWallet {
    pub fn new(provider: DynProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let res: Result<Vec<Address>, TransportError> =
            self.provider.client().request_noparams("eth_requestAccounts").await;
        match res {
            Ok(accounts) => Ok(accounts),
            // plain nodes don't prompt, their accounts are always authorized
            Err(err) if error_code(&err) == Some(METHOD_NOT_FOUND) => {
                trace!("eth_requestAccounts not supported, falling back to eth_accounts");
                self.authorized_accounts().await
            }
            Err(err) => Err(classify("Connect", err)),
        }
    }

    async fn authorized_accounts(&self) -> Result<Vec<Address>> {
        self.provider.get_accounts().await.map_err(|err| classify("Connect", err))
    }

    async fn chain_id(&self) -> Result<ChainId> {
        self.provider.get_chain_id().await.map_err(MinterError::provider)
    }
}

/// The mint contract over JSON-RPC.
#[derive(Clone)]
pub struct RpcMintContract {
    contract: EpicNft::EpicNftInstance<DynProvider>,
}

impl fmt::Debug for RpcMintContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcMintContract").field("address", self.contract.address()).finish()
    }
}

impl RpcMintContract {
    pub fn new(provider: DynProvider, address: Address) -> Self {
        Self { contract: EpicNft::new(address, provider) }
    }

    pub fn address(&self) -> Address {
        *self.contract.address()
    }
}

#[async_trait]
impl ContractClient for RpcMintContract {
    async fn read_total_minted(&self) -> Result<u64> {
        let total = self
            .contract
            .getTotalNFTsMintedSoFar()
            .call()
            .await
            .map_err(|err| contract_error("Read", err))?;
        to_u64(total)
    }

    async fn submit_mint(&self, from: Address) -> Result<PendingMint> {
        let pending = self
            .contract
            .makeAnEpicNFT()
            .from(from)
            .send()
            .await
            .map_err(|err| contract_error("Mint", err))?;
        let tx_hash = *pending.tx_hash();
        trace!(%tx_hash, "sent mint transaction");

        let confirmation = async move {
            let receipt = pending.get_receipt().await.map_err(|err| MinterError::Transaction {
                tx_hash: Some(tx_hash),
                reason: err.to_string(),
            })?;
            Ok(MintReceipt {
                tx_hash: receipt.transaction_hash(),
                block_number: receipt.block_number(),
                success: receipt.status(),
            })
        };
        Ok(PendingMint::new(tx_hash, confirmation.boxed()))
    }

    async fn subscribe_minted(&self) -> Result<MintedEventStream> {
        let poller = self
            .contract
            .NewEpicNFTMinted_filter()
            .watch()
            .await
            .map_err(MinterError::provider)?;
        let events = poller.into_stream().map(|res| {
            let (event, log) = res.map_err(MinterError::provider)?;
            minted_event(&event, &log)
        });
        Ok(events.boxed())
    }
}

fn minted_event(event: &EpicNft::NewEpicNFTMinted, log: &Log) -> Result<MintedEvent> {
    Ok(MintedEvent {
        from: event.sender,
        token_id: to_u64(event.tokenId)?,
        tx_hash: log.transaction_hash,
    })
}

fn to_u64(value: U256) -> Result<u64> {
    u64::try_from(value).map_err(|_| MinterError::provider(format!("{value} does not fit in u64")))
}

fn error_code(err: &TransportError) -> Option<i64> {
    err.as_error_resp().map(|payload| payload.code)
}

/// Maps a transport error, recognizing a declined wallet prompt.
fn classify(operation: &'static str, err: TransportError) -> MinterError {
    match err.as_error_resp() {
        Some(ErrorPayload { code: USER_REJECTED, message, .. }) => {
            MinterError::rejected(operation, message.to_string())
        }
        _ => MinterError::provider(err),
    }
}

fn contract_error(operation: &'static str, err: alloy_contract::Error) -> MinterError {
    match err {
        alloy_contract::Error::TransportError(err) => classify(operation, err),
        err => MinterError::provider(err),
    }
}
