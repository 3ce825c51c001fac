pub mod credentials;
pub mod stake;
pub mod verification;

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::{
    errors::WalletError,
    session::{ActiveSession, SessionManager},
    types::Address,
};

pub use self::{
    credentials::CredentialStore, stake::StakeStore, verification::VerificationRequestBook,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryKey {
    pub address: Address,
    pub epoch: u64,
}

impl QueryKey {
    pub fn of(session: &ActiveSession) -> Self {
        QueryKey { address: session.address, epoch: session.epoch }
    }

    pub fn live(session: &SessionManager) -> Option<Self> {
        session.active().ok().map(|active| QueryKey::of(&active))
    }
}

#[derive(Clone, Debug)]
pub struct QueryState<T> {
    pub key: Option<QueryKey>,
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<Arc<WalletError>>,
    generation: u64,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        QueryState { key: None, data: None, is_loading: false, error: None, generation: 0 }
    }
}

impl<T> QueryState<T> {
    pub fn is_stale(&self) -> bool {
        self.data.is_some() && self.error.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> QueryKey {
        self.key
    }
}

pub struct PendingFetch<T> {
    ticket: FetchTicket,
    future: BoxFuture<'static, Result<T, WalletError>>,
}

pub struct FetchOutcome<T> {
    ticket: FetchTicket,
    result: Result<T, WalletError>,
}

impl<T> PendingFetch<T> {
    pub fn ticket(&self) -> FetchTicket {
        self.ticket
    }

    pub async fn run(self) -> FetchOutcome<T> {
        FetchOutcome { ticket: self.ticket, result: self.future.await }
    }
}

impl<T> FetchOutcome<T> {
    pub fn ticket(&self) -> FetchTicket {
        self.ticket
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct QueryCache<T> {
    name: &'static str,
    tx: watch::Sender<QueryState<T>>,
}

impl<T> QueryCache<T> {
    pub fn new(name: &'static str) -> Self {
        let (tx, _) = watch::channel(QueryState::default());
        QueryCache { name, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.tx.subscribe()
    }

    pub fn key(&self) -> Option<QueryKey> {
        self.tx.borrow().key
    }

    pub fn read<R>(&self, read: impl FnOnce(&QueryState<T>) -> R) -> R {
        read(&self.tx.borrow())
    }

    /// Starts a fetch for `session`. Data cached for a different key is
    /// dropped so it is never shown under the new one.
    pub fn prepare<F>(&self, session: ActiveSession, fetch: F) -> PendingFetch<T>
    where
        F: FnOnce(ActiveSession) -> BoxFuture<'static, Result<T, WalletError>>,
    {
        let key = QueryKey::of(&session);
        let mut generation = 0;
        self.tx.send_modify(|state| {
            if state.key != Some(key) {
                state.key = Some(key);
                state.data = None;
                state.error = None;
            }
            state.generation += 1;
            state.is_loading = true;
            generation = state.generation;
        });

        PendingFetch { ticket: FetchTicket { key, generation }, future: fetch(session) }
    }

    /// Applies a finished fetch. Returns `false` when the result was
    /// superseded or no longer belongs to the `live` session.
    pub fn complete(&self, outcome: FetchOutcome<T>, live: Option<QueryKey>) -> bool {
        let FetchOutcome { ticket, result } = outcome;
        let name = self.name;
        self.tx.send_if_modified(|state| {
            if live != Some(ticket.key)
                || state.generation != ticket.generation
                || state.key != Some(ticket.key)
            {
                log::debug!(
                    "discarding stale {} fetch for {} (epoch {})",
                    name,
                    ticket.key.address,
                    ticket.key.epoch
                );
                return false;
            }

            state.is_loading = false;
            match result {
                Ok(data) => {
                    state.data = Some(data);
                    state.error = None;
                }
                Err(e) => {
                    log::warn!("{} fetch failed: {}", name, e);
                    state.error = Some(Arc::new(e));
                }
            }
            true
        })
    }

    pub fn invalidate(&self) {
        self.tx.send_modify(|state| {
            state.generation += 1;
            state.is_loading = false;
        });
    }

    pub fn clear(&self) {
        self.tx.send_modify(|state| {
            *state = QueryState { generation: state.generation + 1, ..QueryState::default() };
        });
    }

    pub fn is_current(&self, key: QueryKey) -> bool {
        self.tx.borrow().key == Some(key)
    }

    pub fn data_for(&self, live: Option<QueryKey>) -> Option<T>
    where
        T: Clone,
    {
        let state = self.tx.borrow();
        match live {
            Some(key) if state.key == Some(key) => state.data.clone(),
            _ => None,
        }
    }
}

pub(crate) fn prepare_for<T, F>(
    cache: &QueryCache<T>,
    session: &SessionManager,
    fetch: F,
) -> Option<PendingFetch<T>>
where
    F: FnOnce(ActiveSession) -> BoxFuture<'static, Result<T, WalletError>>,
{
    match session.active() {
        Ok(active) => Some(cache.prepare(active, fetch)),
        Err(_) => {
            cache.clear();
            None
        }
    }
}

#[cfg(test)]
pub mod tests {
    use futures::FutureExt;

    use super::*;
    use crate::{
        client::{InFlightGuard, MockChainClient, MockLatency},
        metadata::DataUriCodec,
        test_utils::create_random_address,
    };

    fn active(address: Address, epoch: u64) -> ActiveSession {
        let client = MockChainClient::new(
            Arc::new(DataUriCodec),
            MockLatency::none(),
            Arc::new(InFlightGuard::default()),
        )
        .unwrap();
        ActiveSession { address, epoch, client: Arc::new(client) }
    }

    fn constant(
        value: u32,
    ) -> impl FnOnce(ActiveSession) -> BoxFuture<'static, Result<u32, WalletError>> {
        move |_| async move { Ok::<_, WalletError>(value) }.boxed()
    }

    #[actix_rt::test]
    async fn test_completed_fetch_is_published() {
        let cache = QueryCache::new("test");
        let mut rx = cache.subscribe();

        let session = active(create_random_address(), 0);
        let key = QueryKey::of(&session);
        let pending = cache.prepare(session, constant(7));
        assert!(rx.borrow_and_update().is_loading);
        assert!(cache.complete(pending.run().await, Some(key)));

        let state = rx.borrow_and_update().clone();
        assert_eq!(state.data, Some(7));
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[actix_rt::test]
    async fn test_result_for_previous_address_is_discarded() {
        let cache = QueryCache::new("test");
        let first = create_random_address();
        let second = create_random_address();

        let stale = cache.prepare(active(first, 0), constant(1));
        let fresh = cache.prepare(active(second, 0), constant(2));
        let live = Some(fresh.ticket().key());
        let fresh = fresh.run().await;
        let stale = stale.run().await;

        assert!(cache.complete(fresh, live));
        assert!(!cache.complete(stale, live));
        cache.read(|state| {
            assert_eq!(state.key.map(|key| key.address), Some(second));
            assert_eq!(state.data, Some(2));
        });
    }

    #[actix_rt::test]
    async fn test_result_for_previous_epoch_is_discarded() {
        let cache = QueryCache::new("test");
        let address = create_random_address();

        let stale = cache.prepare(active(address, 0), constant(1)).run().await;
        let fresh = cache.prepare(active(address, 1), constant(2));

        assert!(!cache.complete(stale, Some(fresh.ticket().key())));
        cache.read(|state| assert!(state.data.is_none()));
    }

    #[actix_rt::test]
    async fn test_result_for_departed_session_is_discarded() {
        let cache = QueryCache::new("test");
        let first = active(create_random_address(), 0);
        let second = QueryKey { address: create_random_address(), epoch: 0 };

        let pending = cache.prepare(first.clone(), constant(1));

        assert!(!cache.complete(pending.run().await, Some(second)));
        assert!(cache.data_for(Some(QueryKey::of(&first))).is_none());
        assert!(cache.data_for(Some(second)).is_none());
    }

    #[actix_rt::test]
    async fn test_data_is_only_served_to_its_own_key() {
        let cache = QueryCache::new("test");
        let session = active(create_random_address(), 0);
        let key = QueryKey::of(&session);

        cache.complete(cache.prepare(session, constant(4)).run().await, Some(key));

        assert_eq!(cache.data_for(Some(key)), Some(4));
        assert_eq!(cache.data_for(Some(QueryKey { epoch: 1, ..key })), None);
        assert_eq!(cache.data_for(None), None);
    }

    #[actix_rt::test]
    async fn test_failure_keeps_last_data_and_flags_it_stale() {
        let cache = QueryCache::new("test");
        let session = active(create_random_address(), 0);
        let key = Some(QueryKey::of(&session));

        cache.complete(cache.prepare(session.clone(), constant(5)).run().await, key);
        let failing = cache
            .prepare(session, |_| async { Err::<u32, _>(WalletError::NoSession) }.boxed());
        assert!(cache.complete(failing.run().await, key));

        cache.read(|state| {
            assert_eq!(state.data, Some(5));
            assert!(state.is_stale());
            assert!(!state.is_loading);
        });
    }

    #[actix_rt::test]
    async fn test_invalidate_supersedes_in_flight_fetch() {
        let cache = QueryCache::new("test");

        let pending = cache.prepare(active(create_random_address(), 0), constant(3));
        let live = Some(pending.ticket().key());
        cache.invalidate();

        assert!(!cache.complete(pending.run().await, live));
    }

    #[test]
    pub fn test_clear_forgets_key() {
        let cache: QueryCache<u32> = QueryCache::new("test");
        let session = active(create_random_address(), 0);
        let key = QueryKey::of(&session);
        let _pending = cache.prepare(session, constant(1));

        assert!(cache.is_current(key));
        cache.clear();

        assert!(!cache.is_current(key));
        assert!(cache.key().is_none());
    }
}
