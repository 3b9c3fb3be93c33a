use std::sync::Arc;

use alloy_primitives::Address;
use tokio::sync::{broadcast, watch};

use crate::{
    backend::Backend,
    config::MinterConfig,
    counter::{MintCounter, MintProgress},
    error::{MinterError, Result},
    network::NetworkGuard,
    notice::{Notice, Notifier},
    orchestrator::{MintOrchestrator, MintOutcome, RecentMint},
    session::{Session, SessionManager},
};

/// The mint client: a session, a counter and an orchestrator sharing one backend.
///
/// A presentation layer observes [`session_address`](Self::session_address),
/// [`minted_count`](Self::minted_count) and [`mint_in_flight`](Self::mint_in_flight), invokes
/// [`connect`](Self::connect) and [`request_mint`](Self::request_mint), and shows the
/// [`notices`](Self::notices).
///
/// Cloning is cheap and every clone drives the same state.
#[derive(Clone, Debug)]
pub struct MintClient {
    config: Arc<MinterConfig>,
    backend: Option<Backend>,
    sessions: SessionManager,
    counter: MintCounter,
    orchestrator: MintOrchestrator,
    notifier: Notifier,
}

impl MintClient {
    /// Creates a client. `None` means no wallet provider is installed.
    pub fn new(config: MinterConfig, backend: Option<Backend>) -> Self {
        let config = Arc::new(config);
        let notifier = Notifier::new();
        let recent = RecentMint::default();
        let counter = MintCounter::new(config.clone(), recent.clone(), notifier.clone());
        let sessions = SessionManager::new(
            backend.clone(),
            NetworkGuard::new(config.chain_id),
            counter.clone(),
            notifier.clone(),
        );
        let orchestrator = MintOrchestrator::new(
            backend.clone(),
            sessions.subscribe(),
            config.clone(),
            recent,
            notifier.clone(),
        );
        Self { config, backend, sessions, counter, orchestrator, notifier }
    }

    pub fn config(&self) -> &MinterConfig {
        &self.config
    }

    pub fn has_provider(&self) -> bool {
        self.backend.is_some()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn counter(&self) -> &MintCounter {
        &self.counter
    }

    pub fn orchestrator(&self) -> &MintOrchestrator {
        &self.orchestrator
    }

    /// The connected account, `None` while disconnected.
    pub fn session_address(&self) -> watch::Receiver<Option<Address>> {
        self.sessions.subscribe()
    }

    /// The number of tokens minted so far.
    pub fn minted_count(&self) -> watch::Receiver<u64> {
        self.counter.subscribe()
    }

    /// True while this client's mint is submitting or awaiting confirmation.
    pub fn mint_in_flight(&self) -> watch::Receiver<bool> {
        self.orchestrator.subscribe_in_flight()
    }

    pub fn progress(&self) -> MintProgress {
        self.counter.progress()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    /// See [`SessionManager::connect`].
    pub async fn connect(&self) -> Result<Session> {
        self.sessions.connect().await
    }

    /// See [`SessionManager::check_existing_connection`].
    pub async fn check_existing_connection(&self) -> Result<Session> {
        self.sessions.check_existing_connection().await
    }

    /// See [`SessionManager::accounts_changed`].
    pub async fn accounts_changed(&self, accounts: &[Address]) {
        self.sessions.accounts_changed(accounts).await
    }

    pub fn disconnect(&self) {
        self.sessions.disconnect();
    }

    /// See [`MintOrchestrator::request_mint`].
    pub async fn request_mint(&self) -> Result<MintOutcome> {
        self.orchestrator.request_mint().await
    }

    /// Reads the total from the contract. An event that already landed in this session wins
    /// over the value read.
    pub async fn load_initial(&self) -> Result<u64> {
        let backend = self.backend.as_ref().ok_or(MinterError::ProviderAbsent)?;
        self.counter.load_initial(&*backend.contract).await
    }
}
