//! # minter
//!
//! Wallet session and mint state machine for an NFT mint client.
//!
//! This crate reconciles four sources of truth into one consistent view:
//! - the wallet connection (disconnected, or connected with an address)
//! - the network the wallet is pointed at
//! - the lifecycle of a mint transaction submitted by this client
//! - `NewEpicNFTMinted` events pushed by the contract at arbitrary times
//!
//! ## Architecture
//!
//! - [`NetworkGuard`]: soft check of the wallet's chain id against the expected one.
//! - [`SessionManager`]: owns the session address, performs the connect handshake and the
//!   silent reconnection check, and arms the event subscription once per session.
//! - [`MintCounter`]: owns the "minted so far" count and merges the initial read with pushed
//!   events so the count never regresses on stale data.
//! - [`MintOrchestrator`]: owns the mint phase and drives submit, confirm and settle, allowing
//!   at most one mint in flight.
//! - [`MintClient`]: wires the above together and exposes the signals a presentation layer
//!   observes (`session_address`, `minted_count`, `mint_in_flight`) and the actions it invokes
//!   (`connect`, `request_mint`).
//!
//! The wallet provider and the contract client are injected through [`Backend`]. With the `rpc`
//! feature, [`rpc`] provides implementations talking EIP-1193 style JSON-RPC via alloy.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

mod backend;
mod client;
mod config;
mod counter;
mod error;
mod network;
mod notice;
mod orchestrator;
mod session;

#[cfg(feature = "rpc")]
pub mod rpc;

#[cfg(test)]
mod testing;

pub use backend::{
    Backend, ContractClient, MintReceipt, MintedEvent, MintedEventStream, PendingMint,
    WalletProvider,
};
pub use client::MintClient;
pub use config::{CountMerge, MinterConfig};
pub use counter::{MintCounter, MintProgress};
pub use error::{MinterError, Result};
pub use network::{NetworkGuard, NetworkStatus};
pub use notice::{Notice, Notifier};
pub use orchestrator::{MintOrchestrator, MintOutcome, MintPhase};
pub use session::{Session, SessionManager};
