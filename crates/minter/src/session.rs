use std::{mem, sync::Arc};

use alloy_primitives::Address;
use parking_lot::Mutex;
use tokio::{sync::watch, task::AbortHandle};

use crate::{
    backend::Backend,
    counter::MintCounter,
    error::{MinterError, Result},
    network::{NetworkGuard, NetworkStatus},
    notice::{Notice, Notifier},
};

/// Snapshot of the wallet session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Session {
    address: Option<Address>,
}

impl Session {
    pub fn connected(address: Address) -> Self {
        Self { address: Some(address) }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }
}

/// Owns the session address and the minted event subscription tied to it.
///
/// Both [`connect`](Self::connect) and [`check_existing_connection`](Self::check_existing_connection)
/// end in the same wiring step: subscribe to minted events, then load the initial count. The
/// wiring runs at most once per session no matter how many times or how concurrently these are
/// called.
#[derive(Clone, Debug)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    backend: Option<Backend>,
    guard: NetworkGuard,
    address: watch::Sender<Option<Address>>,
    wiring: Mutex<Wiring>,
    counter: MintCounter,
    notifier: Notifier,
}

#[derive(Debug, Default)]
struct Wiring {
    /// Bumped on every teardown so an arming that straddles a disconnect can tell.
    generation: u64,
    state: WiringState,
}

#[derive(Debug, Default)]
enum WiringState {
    #[default]
    Unarmed,
    Arming,
    Armed(AbortHandle),
}

impl SessionManager {
    pub(crate) fn new(
        backend: Option<Backend>,
        guard: NetworkGuard,
        counter: MintCounter,
        notifier: Notifier,
    ) -> Self {
        let (address, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                backend,
                guard,
                address,
                wiring: Mutex::default(),
                counter,
                notifier,
            }),
        }
    }

    pub fn session(&self) -> Session {
        Session { address: self.address() }
    }

    pub fn address(&self) -> Option<Address> {
        *self.inner.address.borrow()
    }

    /// Subscribes to the session address.
    pub fn subscribe(&self) -> watch::Receiver<Option<Address>> {
        self.inner.address.subscribe()
    }

    pub fn network_guard(&self) -> NetworkGuard {
        self.inner.guard
    }

    /// Whether the minted event subscription is live for the current session.
    pub fn is_armed(&self) -> bool {
        matches!(self.inner.wiring.lock().state, WiringState::Armed(_))
    }

    /// Silently adopts an account the wallet already authorized. Never prompts.
    ///
    /// Without a wallet provider, or without an authorized account, the session stays
    /// disconnected and nothing is wired.
    pub async fn check_existing_connection(&self) -> Result<Session> {
        let Some(backend) = &self.inner.backend else {
            debug!("make sure you have a wallet provider");
            return Ok(self.session());
        };
        debug!("wallet provider found");

        let accounts = backend.wallet.authorized_accounts().await?;
        let Some(&account) = accounts.first() else {
            debug!("no authorized account found");
            if self.session().is_connected() {
                self.disconnect();
            }
            return Ok(self.session());
        };
        info!(%account, "found an authorized account");

        self.establish(backend, account).await;
        Ok(self.session())
    }

    /// Prompts the wallet for account access and adopts the first account returned.
    ///
    /// A rejected prompt leaves the session as it was and is reported as a notice.
    pub async fn connect(&self) -> Result<Session> {
        let Some(backend) = &self.inner.backend else {
            debug!("wallet provider does not exist");
            self.inner.notifier.notify(Notice::InstallWallet);
            return Err(MinterError::ProviderAbsent);
        };

        let accounts = match backend.wallet.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                match &err {
                    MinterError::Rejected { operation, reason } => {
                        warn!(%reason, "wallet connection rejected");
                        self.inner.notifier.notify(Notice::Rejected { operation: *operation });
                    }
                    err => error!(%err, "failed to connect wallet"),
                }
                return Err(err);
            }
        };
        let Some(&account) = accounts.first() else {
            return Err(MinterError::provider("wallet returned no accounts"));
        };
        info!(%account, "connected");

        self.establish(backend, account).await;
        Ok(self.session())
    }

    /// Ends the session and tears down the event subscription.
    pub fn disconnect(&self) {
        let previous = self.teardown();
        if let Some(address) = previous {
            info!(%address, "disconnected");
        }
    }

    /// Applies an account list pushed by the wallet. An empty list ends the session, a new
    /// first account becomes the session address.
    pub async fn accounts_changed(&self, accounts: &[Address]) {
        let Some(&account) = accounts.first() else {
            self.disconnect();
            return;
        };
        let Some(backend) = &self.inner.backend else { return };
        debug!(%account, "wallet accounts changed");
        self.establish(backend, account).await;
    }

    async fn establish(&self, backend: &Backend, account: Address) {
        // the address and the generation it belongs to are read together
        let (adopted, generation) = {
            let wiring = self.inner.wiring.lock();
            (self.adopt(account), wiring.generation)
        };
        if adopted {
            self.validate_network(backend).await;
        } else {
            trace!(%account, "session already connected");
        }
        self.arm(backend, generation).await;
    }

    /// Sets the session address. Returns whether it changed.
    fn adopt(&self, account: Address) -> bool {
        self.inner.address.send_if_modified(|current| {
            if *current == Some(account) {
                return false;
            }
            *current = Some(account);
            true
        })
    }

    async fn validate_network(&self, backend: &Backend) {
        match self.inner.guard.check(&*backend.wallet).await {
            Ok(NetworkStatus::Ok) => {}
            Ok(NetworkStatus::Mismatch { expected, actual }) => {
                self.inner.notifier.notify(Notice::WrongNetwork { expected, actual });
            }
            Err(err) => warn!(%err, "failed to read wallet chain id"),
        }
    }

    /// Subscribes to minted events and loads the initial count, once per session.
    ///
    /// The subscription is live before the read is issued so no event can fall between them.
    /// Nothing is wired if the session of `generation` has ended in the meantime.
    async fn arm(&self, backend: &Backend, generation: u64) {
        {
            let mut wiring = self.inner.wiring.lock();
            if wiring.generation != generation {
                debug!("session ended before setting up event listener");
                return;
            }
            if !matches!(wiring.state, WiringState::Unarmed) {
                trace!("event listener already set up");
                return;
            }
            wiring.state = WiringState::Arming;
        }

        let events = match backend.contract.subscribe_minted().await {
            Ok(events) => events,
            Err(err) => {
                warn!(%err, "failed to subscribe to minted events");
                let mut wiring = self.inner.wiring.lock();
                if wiring.generation == generation {
                    wiring.state = WiringState::Unarmed;
                }
                return;
            }
        };

        let listener = self.inner.counter.listen(events);
        {
            let mut wiring = self.inner.wiring.lock();
            if wiring.generation != generation {
                debug!("session ended while setting up event listener");
                listener.abort();
                return;
            }
            wiring.state = WiringState::Armed(listener.abort_handle());
        }
        debug!("setup event listener");

        if let Err(err) = self.inner.counter.load_initial(&*backend.contract).await {
            warn!(%err, "failed to load total minted so far");
        }
    }

    /// Clears the address and ends the current generation. Returns the previous address.
    fn teardown(&self) -> Option<Address> {
        let previous = {
            let mut wiring = self.inner.wiring.lock();
            let previous = self.inner.address.send_replace(None);
            wiring.generation += 1;
            if let WiringState::Armed(listener) = mem::take(&mut wiring.state) {
                listener.abort();
                debug!("event listener removed");
            }
            previous
        };
        self.inner.counter.reset_session();
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MinterConfig,
        orchestrator::RecentMint,
        testing::{ALICE, BOB, FakeContract, FakeWallet, backend, wait_until},
    };

    struct Harness {
        sessions: SessionManager,
        counter: MintCounter,
        wallet: Arc<FakeWallet>,
        contract: Arc<FakeContract>,
        notifier: Notifier,
    }

    fn harness(wallet: FakeWallet, total: u64) -> Harness {
        let wallet = Arc::new(wallet);
        let contract = Arc::new(FakeContract::new(total));
        let notifier = Notifier::new();
        let counter = MintCounter::new(
            Arc::new(MinterConfig::default()),
            RecentMint::default(),
            notifier.clone(),
        );
        let sessions = SessionManager::new(
            Some(backend(&wallet, &contract)),
            NetworkGuard::new(4),
            counter.clone(),
            notifier.clone(),
        );
        Harness { sessions, counter, wallet, contract, notifier }
    }

    async fn wait_for_live(contract: &FakeContract, live: usize) {
        for _ in 0..100 {
            if contract.live_subscriptions() == live {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {live} live subscriptions, got {}", contract.live_subscriptions());
    }

    #[tokio::test]
    async fn no_authorized_account_wires_nothing() {
        let h = harness(FakeWallet::new(4), 7);

        let session = h.sessions.check_existing_connection().await.unwrap();
        assert!(!session.is_connected());
        assert_eq!(h.contract.subscriptions(), 0);
        assert_eq!(h.contract.reads(), 0);
        assert_eq!(h.wallet.requests(), 0);
    }

    #[tokio::test]
    async fn existing_connection_is_wired_once() {
        let h = harness(FakeWallet::new(4).with_authorized(vec![ALICE]), 7);

        let session = h.sessions.check_existing_connection().await.unwrap();
        assert_eq!(session, Session::connected(ALICE));
        assert!(h.sessions.is_armed());
        assert_eq!(h.counter.count(), 7);

        h.sessions.check_existing_connection().await.unwrap();
        h.sessions.connect().await.unwrap();
        assert_eq!(h.contract.subscriptions(), 1);
        assert_eq!(h.contract.reads(), 1);
    }

    #[tokio::test]
    async fn concurrent_connects_subscribe_once() {
        let h = harness(FakeWallet::new(4).with_authorized(vec![ALICE]), 7);

        let (a, b, c) = tokio::join!(
            h.sessions.connect(),
            h.sessions.check_existing_connection(),
            h.sessions.connect(),
        );
        for session in [a, b, c] {
            assert_eq!(session.unwrap().address(), Some(ALICE));
        }
        assert_eq!(h.contract.subscriptions(), 1);
        assert_eq!(h.contract.reads(), 1);
    }

    #[tokio::test]
    async fn connect_without_provider() {
        let notifier = Notifier::new();
        let mut notices = notifier.subscribe();
        let counter = MintCounter::new(
            Arc::new(MinterConfig::default()),
            RecentMint::default(),
            notifier.clone(),
        );
        let sessions = SessionManager::new(None, NetworkGuard::new(4), counter, notifier);

        assert_eq!(sessions.connect().await.unwrap_err(), MinterError::ProviderAbsent);
        assert_eq!(sessions.address(), None);
        assert_eq!(notices.try_recv().unwrap(), Notice::InstallWallet);

        // the silent check just reports no session
        assert!(!sessions.check_existing_connection().await.unwrap().is_connected());
    }

    #[tokio::test]
    async fn rejected_connect_stays_disconnected() {
        let h = harness(FakeWallet::new(4), 0);
        let mut notices = h.notifier.subscribe();
        h.wallet.reject_prompts(true);

        let err = h.sessions.connect().await.unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(h.sessions.address(), None);
        assert_eq!(h.contract.subscriptions(), 0);
        assert_eq!(notices.try_recv().unwrap(), Notice::Rejected { operation: "Connect" });

        h.wallet.reject_prompts(false);
        h.wallet.grant(vec![BOB]);
        assert_eq!(h.sessions.connect().await.unwrap(), Session::connected(BOB));
    }

    #[tokio::test]
    async fn disconnect_during_network_check_wires_nothing() {
        let h = harness(FakeWallet::new(4), 3);
        let gate = h.wallet.gate_chain_id();
        let mut address = h.sessions.subscribe();

        let connect = tokio::spawn({
            let sessions = h.sessions.clone();
            async move { sessions.connect().await }
        });
        // the address is adopted before the chain id is read
        wait_until(&mut address, |a| *a == Some(ALICE)).await;
        h.sessions.disconnect();
        gate.send(()).unwrap();

        assert_eq!(connect.await.unwrap().unwrap(), Session::disconnected());
        assert_eq!(h.sessions.address(), None);
        assert!(!h.sessions.is_armed());
        assert_eq!(h.contract.subscriptions(), 0);
        assert_eq!(h.contract.reads(), 0);

        // the next session is wired and reads the count
        assert_eq!(h.sessions.connect().await.unwrap(), Session::connected(ALICE));
        assert!(h.sessions.is_armed());
        assert_eq!(h.contract.subscriptions(), 1);
        assert_eq!(h.counter.count(), 3);
    }

    #[tokio::test]
    async fn wrong_network_still_connects() {
        let h = harness(FakeWallet::new(1), 3);
        let mut notices = h.notifier.subscribe();

        assert_eq!(h.sessions.connect().await.unwrap(), Session::connected(ALICE));
        assert_eq!(notices.try_recv().unwrap(), Notice::WrongNetwork { expected: 4, actual: 1 });
        assert!(h.sessions.is_armed());
        assert_eq!(h.counter.count(), 3);
    }

    #[tokio::test]
    async fn disconnect_tears_down_subscription() {
        let h = harness(FakeWallet::new(4).with_authorized(vec![ALICE]), 2);
        let mut address = h.sessions.subscribe();

        h.sessions.check_existing_connection().await.unwrap();
        wait_until(&mut address, |a| *a == Some(ALICE)).await;
        assert_eq!(h.contract.live_subscriptions(), 1);

        h.sessions.disconnect();
        assert_eq!(h.sessions.address(), None);
        assert!(!h.sessions.is_armed());
        wait_for_live(&h.contract, 0).await;

        // a new session wires again and its initial read is authoritative
        h.contract.set_total(5);
        h.sessions.check_existing_connection().await.unwrap();
        assert_eq!(h.contract.subscriptions(), 2);
        assert_eq!(h.contract.live_subscriptions(), 1);
        assert_eq!(h.counter.count(), 5);
    }

    #[tokio::test]
    async fn accounts_changed_switches_or_ends_session() {
        let h = harness(FakeWallet::new(4).with_authorized(vec![ALICE]), 0);
        h.sessions.check_existing_connection().await.unwrap();

        h.sessions.accounts_changed(&[BOB, ALICE]).await;
        assert_eq!(h.sessions.address(), Some(BOB));
        assert_eq!(h.contract.subscriptions(), 1);

        h.sessions.accounts_changed(&[]).await;
        assert_eq!(h.sessions.session(), Session::disconnected());
        assert!(!h.sessions.is_armed());
    }
}
