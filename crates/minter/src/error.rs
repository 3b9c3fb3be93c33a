use alloy_primitives::TxHash;

/// Errors surfaced by the wallet session and mint operations.
///
/// There is no wrong network variant: a mismatch is reported as
/// [`NetworkStatus::Mismatch`](crate::NetworkStatus::Mismatch) and never fails an action.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MinterError {
    /// No wallet provider is available.
    #[error("no wallet provider found, install a wallet such as MetaMask")]
    ProviderAbsent,
    /// The user declined a wallet prompt.
    #[error("{operation} rejected by user: {reason}")]
    Rejected { operation: &'static str, reason: String },
    /// The wallet provider or contract client failed.
    #[error("wallet provider error: {0}")]
    Provider(String),
    /// A submitted transaction could not be confirmed.
    #[error("transaction {} failed: {reason}", .tx_hash.map(|h| h.to_string()).unwrap_or_else(|| "<unsent>".to_string()))]
    Transaction { tx_hash: Option<TxHash>, reason: String },
}

impl MinterError {
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected { operation, reason: reason.into() }
    }

    pub fn provider(err: impl std::fmt::Display) -> Self {
        Self::Provider(err.to_string())
    }

    /// Returns true if the user declined the prompt.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

pub type Result<T, E = MinterError> = std::result::Result<T, E>;
