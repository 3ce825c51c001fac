pub mod store;

use std::{fmt, sync::Arc};

use tokio::sync::mpsc::error::TryRecvError;

use crate::{
    client::{
        BackendKind, ChainClient, CredentialResolutions, InFlightGuard, MockChainClient,
        MockLatency, RealChainClient, MOCK_WALLET_ADDRESS,
    },
    config::WalletConfig,
    errors::{Operation, WalletError},
    metadata::{DataUriCodec, MetadataCodec},
    provider::{ProviderEvent, ProviderSubscription, WalletProvider},
    types::{Address, ChainId, Identity, ProfileUpdate, UserRole},
};

pub use self::store::{
    FileSessionStore, MemorySessionStore, PersistedSession, SessionStore, SessionStoreError,
    SESSION_SLOT,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Disconnected,
    AccountChanged { previous: Address, current: Address },
    NetworkChanged(ChainId),
}

#[derive(Clone)]
pub struct ActiveSession {
    pub address: Address,
    pub epoch: u64,
    pub client: Arc<dyn ChainClient>,
}

enum Backend {
    Real(Arc<RealChainClient>),
    Mock(Arc<MockChainClient>),
}

impl Backend {
    fn client(&self) -> Arc<dyn ChainClient> {
        match self {
            Backend::Real(client) => client.clone(),
            Backend::Mock(client) => client.clone(),
        }
    }

    fn kind(&self) -> BackendKind {
        match self {
            Backend::Real(_) => BackendKind::Real,
            Backend::Mock(_) => BackendKind::Mock,
        }
    }
}

pub struct SessionManager {
    config: WalletConfig,
    provider: Option<Arc<dyn WalletProvider>>,
    store: Arc<dyn SessionStore>,
    codec: Arc<dyn MetadataCodec>,
    guard: Arc<InFlightGuard>,
    resolutions: Arc<CredentialResolutions>,
    mock_latency: MockLatency,
    // NOTE: one mock ledger per manager, so reconnecting keeps its balances
    mock: Option<Arc<MockChainClient>>,
    state: SessionState,
    identity: Option<Identity>,
    backend: Option<Backend>,
    subscription: Option<ProviderSubscription>,
    restored: Option<Identity>,
    epoch: u64,
}

impl SessionManager {
    pub fn new(
        config: WalletConfig,
        provider: Option<Arc<dyn WalletProvider>>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        SessionManager {
            config,
            provider,
            store,
            codec: Arc::new(DataUriCodec),
            guard: Arc::new(InFlightGuard::default()),
            resolutions: Arc::new(CredentialResolutions::default()),
            mock_latency: MockLatency::default(),
            mock: None,
            state: SessionState::Disconnected,
            identity: None,
            backend: None,
            subscription: None,
            restored: None,
            epoch: 0,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn MetadataCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_mock_latency(mut self, latency: MockLatency) -> Self {
        self.mock_latency = latency;
        self
    }

    /// Rehydrates the persisted slot. A stored identity triggers a reconnect
    /// that carries its role and profile over; a failed reconnect leaves the
    /// session disconnected and the slot untouched.
    pub async fn init(&mut self) -> SessionState {
        let persisted = match self.store.load() {
            Ok(persisted) => persisted,
            Err(e) => {
                log::warn!("ignoring unreadable {}: {}", SESSION_SLOT, e);
                None
            }
        };

        let identity = match persisted.and_then(PersistedSession::into_identity) {
            Some(identity) if identity.is_connected => identity,
            _ => return self.state,
        };

        log::info!("restoring session for {}", identity.address);
        self.restored = Some(identity);
        if let Err(e) = self.connect().await {
            log::warn!("could not restore session: {}", e);
        }
        self.restored = None;
        self.state
    }

    pub async fn connect(&mut self) -> Result<Identity, WalletError> {
        self.state = SessionState::Connecting;

        let (address, backend) = match self.select_backend().await {
            Ok(selected) => selected,
            Err(e) => {
                log::error!("connect failed: {}", e);
                self.release();
                return Err(e);
            }
        };

        let carried = self.identity.take().or_else(|| self.restored.take());
        let mut identity = Identity::new(address);
        if let Some(previous) = carried {
            identity.name = previous.name;
            identity.email = previous.email;
            identity.role = previous.role;
        }

        match backend {
            Backend::Real(_) => self.subscribe(),
            Backend::Mock(_) => self.unsubscribe(),
        }

        // NOTE: mock and real sessions can share an address, never an epoch
        // across a connect
        self.epoch += 1;
        log::info!("connected {} via {} backend, epoch {}", address, backend.kind(), self.epoch);
        self.backend = Some(backend);
        self.identity = Some(identity.clone());
        self.state = SessionState::Connected;
        self.persist();
        Ok(identity)
    }

    async fn select_backend(&mut self) -> Result<(Address, Backend), WalletError> {
        if self.config.mock_enabled {
            return self.mock_backend();
        }

        let provider = match &self.provider {
            Some(provider) => provider.clone(),
            None if self.config.mock_fallback_allowed() => {
                log::warn!("no wallet provider detected, using mock backend");
                return self.mock_backend();
            }
            None => return Err(WalletError::NoProvider),
        };

        match self.real_backend(provider).await {
            Ok(selected) => Ok(selected),
            Err(e) if self.config.mock_fallback_allowed() => {
                log::warn!("wallet provider unavailable ({}), using mock backend", e);
                self.mock_backend()
            }
            Err(e) => Err(e),
        }
    }

    async fn real_backend(
        &self,
        provider: Arc<dyn WalletProvider>,
    ) -> Result<(Address, Backend), WalletError> {
        let accounts = provider
            .request_accounts()
            .await
            .map_err(|e| WalletError::chain_call(Operation::RequestAccounts, e))?;
        let address = accounts.first().copied().ok_or_else(|| {
            WalletError::chain_call(
                Operation::RequestAccounts,
                anyhow::anyhow!("wallet exposed no accounts"),
            )
        })?;

        let client = RealChainClient::bind(
            provider,
            &self.config,
            address,
            self.codec.clone(),
            self.guard.clone(),
            self.resolutions.clone(),
        )?;
        Ok((address, Backend::Real(Arc::new(client))))
    }

    fn mock_backend(&mut self) -> Result<(Address, Backend), WalletError> {
        let client = match &self.mock {
            Some(client) => client.clone(),
            None => {
                let client = Arc::new(MockChainClient::new(
                    self.codec.clone(),
                    self.mock_latency,
                    self.guard.clone(),
                )?);
                self.mock = Some(client.clone());
                client
            }
        };
        Ok((MOCK_WALLET_ADDRESS, Backend::Mock(client)))
    }

    pub fn disconnect(&mut self) {
        if let Some(identity) = &self.identity {
            log::info!("disconnecting {}", identity.address);
        }
        self.release();
        if let Err(e) = self.store.clear() {
            log::warn!("failed to clear {}: {}", SESSION_SLOT, e);
        }
    }

    /// Releases the provider subscription and in-memory session but keeps the
    /// persisted slot for the next `init`.
    pub fn teardown(&mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.unsubscribe();
        self.identity = None;
        self.backend = None;
        self.state = SessionState::Disconnected;
    }

    fn subscribe(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        if let Some(provider) = &self.provider {
            let subscription = provider.subscribe();
            log::debug!("subscribed to provider events as {:?}", subscription.id);
            self.subscription = Some(subscription);
        }
    }

    fn unsubscribe(&mut self) {
        if let (Some(subscription), Some(provider)) = (self.subscription.take(), &self.provider) {
            provider.unsubscribe(subscription.id);
            log::debug!("unsubscribed {:?}", subscription.id);
        }
    }

    pub fn set_role(&mut self, role: UserRole) -> Result<(), WalletError> {
        self.connected_identity()?.role = role;
        self.persist();
        Ok(())
    }

    pub fn update_profile(&mut self, update: ProfileUpdate) -> Result<(), WalletError> {
        self.connected_identity()?.apply(update);
        self.persist();
        Ok(())
    }

    fn connected_identity(&mut self) -> Result<&mut Identity, WalletError> {
        match (self.state, self.identity.as_mut()) {
            (SessionState::Connected, Some(identity)) => Ok(identity),
            _ => Err(WalletError::NoSession),
        }
    }

    fn persist(&self) {
        if let Some(identity) = &self.identity {
            if let Err(e) = self.store.save(&PersistedSession::new(identity.clone())) {
                log::warn!("failed to persist {}: {}", SESSION_SLOT, e);
            }
        }
    }

    pub fn handle_provider_event(&mut self, event: ProviderEvent) -> Option<SessionEvent> {
        if self.state != SessionState::Connected {
            log::debug!("ignoring {:?} while {}", event, self.state);
            return None;
        }

        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
                None => {
                    log::info!("wallet exposed no accounts, disconnecting");
                    self.disconnect();
                    Some(SessionEvent::Disconnected)
                }
                Some(current) => self.rebind(*current),
            },
            ProviderEvent::ChainChanged(chain_id) => {
                // NOTE: contract bindings are rebuilt from scratch and every
                // cached read is invalidated through the epoch
                if let Some(Backend::Real(client)) = &self.backend {
                    let rebuilt = client.rebind(*client.signer());
                    self.backend = Some(Backend::Real(Arc::new(rebuilt)));
                }
                self.epoch += 1;
                log::info!("network changed to {}, epoch {}", chain_id, self.epoch);
                Some(SessionEvent::NetworkChanged(chain_id))
            }
        }
    }

    fn rebind(&mut self, current: Address) -> Option<SessionEvent> {
        let identity = self.identity.as_mut()?;
        let previous = identity.address;
        if previous == current {
            return None;
        }
        identity.address = current;

        if let Some(Backend::Real(client)) = &self.backend {
            self.backend = Some(Backend::Real(Arc::new(client.rebind(current))));
        }

        log::info!("account changed from {} to {}", previous, current);
        self.persist();
        Some(SessionEvent::AccountChanged { previous, current })
    }

    pub fn pump_events(&mut self) -> Vec<SessionEvent> {
        let mut pending = Vec::new();
        if let Some(subscription) = self.subscription.as_mut() {
            loop {
                match subscription.events.try_recv() {
                    Ok(event) => pending.push(event),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        }

        pending.into_iter().filter_map(|event| self.handle_provider_event(event)).collect()
    }

    /// Waits for the next notification that changes the session. `None` once
    /// there is no subscription left to wait on.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            let event = self.subscription.as_mut()?.events.recv().await?;
            if let Some(session_event) = self.handle_provider_event(event) {
                return Some(session_event);
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn address(&self) -> Option<Address> {
        self.identity.as_ref().map(|identity| identity.address)
    }

    pub fn backend(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(Backend::kind)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn client(&self) -> Result<Arc<dyn ChainClient>, WalletError> {
        match (self.state, &self.backend) {
            (SessionState::Connected, Some(backend)) => Ok(backend.client()),
            _ => Err(WalletError::NoSession),
        }
    }

    pub fn active(&self) -> Result<ActiveSession, WalletError> {
        let client = self.client()?;
        let address = self.address().ok_or(WalletError::NoSession)?;
        Ok(ActiveSession { address, epoch: self.epoch, client })
    }
}
