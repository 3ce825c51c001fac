#[cfg(test)]
pub mod mocks;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{
    contracts::{CredentialContract, TokenContract, TransactionReceipt, TxHash},
    types::{Address, ChainId},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The wallet's exposed accounts changed. Empty means the wallet locked or
    /// revoked access.
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

// NOTE: dropping a subscription does not unregister it
#[derive(Debug)]
pub struct ProviderSubscription {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<ProviderEvent>,
}

#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request_accounts(&self) -> anyhow::Result<Vec<Address>>;
    async fn chain_id(&self) -> anyhow::Result<ChainId>;
    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> anyhow::Result<TransactionReceipt>;

    fn subscribe(&self) -> ProviderSubscription;
    fn unsubscribe(&self, id: SubscriptionId);

    fn token_contract(&self, at: &Address, signer: &Address) -> Arc<dyn TokenContract>;
    fn credential_contract(&self, at: &Address, signer: &Address) -> Arc<dyn CredentialContract>;
}
