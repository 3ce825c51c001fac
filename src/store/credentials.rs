use futures::FutureExt;
use tokio::sync::watch;

use super::{prepare_for, FetchOutcome, PendingFetch, QueryCache, QueryKey, QueryState};
use crate::{
    client::Confirmation,
    errors::WalletError,
    session::SessionManager,
    types::{Address, Credential, CredentialMetadata, CredentialStatus, TokenId},
};

pub struct CredentialStore {
    cache: QueryCache<Vec<Credential>>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        CredentialStore { cache: QueryCache::new("credentials") }
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<Vec<Credential>>> {
        self.cache.subscribe()
    }

    /// Credentials fetched for the current session. Empty while the cache
    /// belongs to another address or network.
    pub fn credentials(&self, session: &SessionManager) -> Vec<Credential> {
        self.cache.data_for(QueryKey::live(session)).unwrap_or_default()
    }

    pub fn prepare(&self, session: &SessionManager) -> Option<PendingFetch<Vec<Credential>>> {
        prepare_for(&self.cache, session, |active| {
            async move { active.client.list_credentials(&active.address).await }.boxed()
        })
    }

    pub fn complete(
        &self,
        session: &SessionManager,
        outcome: FetchOutcome<Vec<Credential>>,
    ) -> bool {
        self.cache.complete(outcome, QueryKey::live(session))
    }

    pub fn sync(&self, session: &SessionManager) -> Option<PendingFetch<Vec<Credential>>> {
        match session.active() {
            Ok(active) if self.cache.is_current(QueryKey::of(&active)) => None,
            _ => self.prepare(session),
        }
    }

    pub async fn refresh(&self, session: &SessionManager) {
        if let Some(pending) = self.prepare(session) {
            self.complete(session, pending.run().await);
        }
    }

    pub async fn issue(
        &self,
        session: &SessionManager,
        recipient: &str,
        metadata: &CredentialMetadata,
    ) -> Result<TokenId, WalletError> {
        let recipient: Address = recipient.trim().parse()?;
        let active = session.active()?;

        let token_id =
            active.client.issue_credential(&active.address, &recipient, metadata).await?;

        self.cache.invalidate();
        self.refresh(session).await;
        Ok(token_id)
    }

    pub async fn verify(
        &self,
        session: &SessionManager,
        token_id: TokenId,
        approved: bool,
    ) -> Result<Confirmation, WalletError> {
        let active = session.active()?;
        let cached = self
            .credentials(session)
            .into_iter()
            .find(|credential| credential.token_id == token_id)
            .map(|credential| credential.status);
        if cached.map_or(false, CredentialStatus::is_terminal) {
            return Err(WalletError::CredentialAlreadyResolved(token_id));
        }

        let confirmation =
            active.client.verify_credential(&active.address, token_id, approved).await?;

        self.cache.invalidate();
        self.refresh(session).await;
        Ok(confirmation)
    }

    pub fn search(
        &self,
        session: &SessionManager,
        text: &str,
        status: Option<CredentialStatus>,
    ) -> Vec<Credential> {
        self.credentials(session)
            .into_iter()
            .filter(|credential| status.map_or(true, |status| credential.status == status))
            .filter(|credential| credential.matches(text))
            .collect()
    }

    pub fn export_json(&self, session: &SessionManager) -> Result<String, WalletError> {
        let credentials = self.credentials(session);
        serde_json::to_string_pretty(&credentials)
            .map_err(|e| WalletError::Validation(format!("cannot export credentials: {}", e)))
    }
}
