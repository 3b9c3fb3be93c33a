use alloy_primitives::ChainId;

use crate::{backend::WalletProvider, error::Result};

/// Result of comparing the wallet's chain against the expected one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkStatus {
    Ok,
    Mismatch { expected: ChainId, actual: ChainId },
}

impl NetworkStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Soft check of the wallet's network.
///
/// A mismatch is reported to the caller but never blocks wallet or contract calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkGuard {
    expected: ChainId,
}

impl NetworkGuard {
    pub fn new(expected: ChainId) -> Self {
        Self { expected }
    }

    pub fn expected(&self) -> ChainId {
        self.expected
    }

    pub fn validate(&self, actual: ChainId) -> NetworkStatus {
        if actual == self.expected {
            NetworkStatus::Ok
        } else {
            NetworkStatus::Mismatch { expected: self.expected, actual }
        }
    }

    /// Reads the wallet's current chain and validates it. The chain id is never cached.
    pub async fn check(&self, wallet: &dyn WalletProvider) -> Result<NetworkStatus> {
        let chain_id = wallet.chain_id().await?;
        debug!(chain_id, "connected to chain");
        let status = self.validate(chain_id);
        if let NetworkStatus::Mismatch { expected, actual } = status {
            warn!(expected, actual, "wallet is not connected to the expected network");
        }
        Ok(status)
    }
}
