use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use futures::FutureExt;
use tokio::sync::watch;

use super::{prepare_for, FetchOutcome, PendingFetch, QueryCache, QueryKey, QueryState};
use crate::{
    client::{Confirmation, RewardClaim},
    config::WalletConfig,
    errors::WalletError,
    session::SessionManager,
    types::{Amount, StakeAccount},
};

pub struct StakeStore {
    cache: QueryCache<StakeAccount>,
    poll_interval: Duration,
    last_fetch: Mutex<Option<Instant>>,
}

impl StakeStore {
    pub fn new(poll_interval: Duration) -> Self {
        StakeStore {
            cache: QueryCache::new("stake"),
            poll_interval,
            last_fetch: Mutex::new(None),
        }
    }

    pub fn from_config(config: &WalletConfig) -> Self {
        Self::new(config.stake_poll_interval)
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<StakeAccount>> {
        self.cache.subscribe()
    }

    pub fn account(&self, session: &SessionManager) -> Option<StakeAccount> {
        self.cache.data_for(QueryKey::live(session))
    }

    pub fn prepare(&self, session: &SessionManager) -> Option<PendingFetch<StakeAccount>> {
        let pending = prepare_for(&self.cache, session, |active| {
            async move { active.client.stake_account(&active.address).await }.boxed()
        });
        *self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        pending
    }

    pub fn complete(
        &self,
        session: &SessionManager,
        outcome: FetchOutcome<StakeAccount>,
    ) -> bool {
        self.cache.complete(outcome, QueryKey::live(session))
    }

    pub async fn refresh(&self, session: &SessionManager) {
        if let Some(pending) = self.prepare(session) {
            self.complete(session, pending.run().await);
        }
    }

    /// Polling step. Returns a fetch when the session changed or the poll
    /// interval has elapsed at `now`.
    pub fn tick(
        &self,
        session: &SessionManager,
        now: Instant,
    ) -> Option<PendingFetch<StakeAccount>> {
        let active = match session.active() {
            Ok(active) => active,
            Err(_) => return self.prepare(session),
        };

        let due = match *self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(last) => now.saturating_duration_since(last) >= self.poll_interval,
            None => true,
        };
        if due || !self.cache.is_current(QueryKey::of(&active)) {
            return self.prepare(session);
        }
        None
    }

    pub async fn stake(
        &self,
        session: &SessionManager,
        amount: &str,
    ) -> Result<Confirmation, WalletError> {
        let active = session.active()?;
        let amount = parse_positive(amount)?;
        self.ensure_covered(session, amount, |account| account.balance)?;

        let confirmation = active.client.stake(&active.address, amount).await?;
        log::info!("staked {} EDU", amount);

        self.cache.invalidate();
        self.refresh(session).await;
        Ok(confirmation)
    }

    pub async fn unstake(
        &self,
        session: &SessionManager,
        amount: &str,
    ) -> Result<Confirmation, WalletError> {
        let active = session.active()?;
        let amount = parse_positive(amount)?;
        self.ensure_covered(session, amount, |account| account.staked_balance)?;

        let confirmation = active.client.unstake(&active.address, amount).await?;
        log::info!("unstaked {} EDU", amount);

        self.cache.invalidate();
        self.refresh(session).await;
        Ok(confirmation)
    }

    pub async fn claim_rewards(
        &self,
        session: &SessionManager,
    ) -> Result<RewardClaim, WalletError> {
        let active = session.active()?;
        let cached = self.account(session);
        if cached.map_or(false, |account| account.pending_rewards.is_zero()) {
            return Err(WalletError::Validation("no rewards to claim".to_string()));
        }

        let claim = active.client.claim_rewards(&active.address).await?;
        log::info!("claimed {} EDU", claim.amount);

        self.cache.invalidate();
        self.refresh(session).await;
        Ok(claim)
    }

    // NOTE: checked against the cached figures only; the backend checks again
    fn ensure_covered(
        &self,
        session: &SessionManager,
        amount: Amount,
        source: impl Fn(&StakeAccount) -> Amount,
    ) -> Result<(), WalletError> {
        match self.account(session).map(|account| source(&account)) {
            Some(available) if amount > available => {
                Err(WalletError::InsufficientFunds { requested: amount, available })
            }
            _ => Ok(()),
        }
    }
}

fn parse_positive(amount: &str) -> Result<Amount, WalletError> {
    let amount = Amount::parse_ether(amount)?;
    if amount.is_zero() {
        return Err(WalletError::Validation("amount must be greater than zero".to_string()));
    }
    Ok(amount)
}
