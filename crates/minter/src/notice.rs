use std::fmt;

use alloy_primitives::{ChainId, TxHash};
use tokio::sync::broadcast;

/// Capacity of the notice channel. Slow receivers lag and skip the oldest notices.
const NOTICE_CAPACITY: usize = 64;

/// A user-facing notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// No wallet provider is installed.
    InstallWallet,
    /// The wallet is on a different chain than the contract. Non-blocking.
    WrongNetwork { expected: ChainId, actual: ChainId },
    /// The user declined a wallet prompt.
    Rejected { operation: &'static str },
    /// This client's mint transaction was mined.
    MintConfirmed { tx_hash: TxHash, link: String },
    /// The contract reported the token minted by this client.
    Minted { token_id: u64, link: String },
    /// This client's mint failed.
    MintFailed { reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstallWallet => f.write_str("Get MetaMask!"),
            Self::WrongNetwork { expected, actual } => write!(
                f,
                "You are not connected to the expected network (wallet is on chain {actual}, expected {expected})"
            ),
            Self::Rejected { operation } => write!(f, "{operation} was rejected in the wallet"),
            Self::MintConfirmed { link, .. } => write!(f, "Mined, see transaction: {link}"),
            Self::Minted { link, .. } => write!(
                f,
                "Hey there! We've minted your NFT and sent it to your wallet. \
                 It may be blank right now. It can take a max of 10 minutes to appear on the marketplace. \
                 Here's the link: {link}"
            ),
            Self::MintFailed { reason } => write!(f, "Mint failed: {reason}"),
        }
    }
}

/// Broadcasts [`Notice`]s to any number of subscribers.
///
/// Sending never fails: with no subscriber the notice is dropped.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn notify(&self, notice: Notice) {
        trace!(%notice, "notice");
        let _ = self.tx.send(notice);
    }
}
