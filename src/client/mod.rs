pub mod guard;
pub mod mock;
pub mod real;

use std::fmt;

use crate::{
    contracts::TxHash,
    errors::WalletError,
    types::{Address, Amount, Credential, CredentialMetadata, StakeAccount, TokenId},
};

pub use self::{
    guard::{InFlightGuard, InFlightTicket},
    mock::{MockChainClient, MockLatency, MOCK_WALLET_ADDRESS},
    real::{CredentialResolutions, RealChainClient},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Real,
    Mock,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Real => f.write_str("real"),
            BackendKind::Mock => f.write_str("mock"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewardClaim {
    pub confirmation: Confirmation,
    pub amount: Amount,
}

/// Everything the wallet can ask of the chain. Writes resolve only after
/// confirmation and change nothing locally before that.
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    fn backend(&self) -> BackendKind;

    async fn balance_of(&self, owner: &Address) -> Result<Amount, WalletError>;
    async fn staked_balance(&self, owner: &Address) -> Result<Amount, WalletError>;
    async fn rewards(&self, owner: &Address) -> Result<Amount, WalletError>;

    async fn stake_account(&self, owner: &Address) -> Result<StakeAccount, WalletError> {
        Ok(StakeAccount {
            balance: self.balance_of(owner).await?,
            staked_balance: self.staked_balance(owner).await?,
            pending_rewards: self.rewards(owner).await?,
        })
    }

    async fn stake(&self, from: &Address, amount: Amount) -> Result<Confirmation, WalletError>;
    async fn unstake(&self, from: &Address, amount: Amount)
        -> Result<Confirmation, WalletError>;
    async fn claim_rewards(&self, from: &Address) -> Result<RewardClaim, WalletError>;

    async fn issue_credential(
        &self,
        from: &Address,
        recipient: &Address,
        metadata: &CredentialMetadata,
    ) -> Result<TokenId, WalletError>;
    async fn verify_credential(
        &self,
        from: &Address,
        token_id: TokenId,
        approved: bool,
    ) -> Result<Confirmation, WalletError>;

    async fn tokens_of(&self, owner: &Address) -> Result<Vec<TokenId>, WalletError>;
    async fn credential_metadata(&self, token_id: TokenId)
        -> Result<CredentialMetadata, WalletError>;
    async fn credential(&self, owner: &Address, token_id: TokenId)
        -> Result<Credential, WalletError>;

    async fn list_credentials(&self, owner: &Address) -> Result<Vec<Credential>, WalletError> {
        let mut credentials = Vec::new();
        for token_id in self.tokens_of(owner).await? {
            credentials.push(self.credential(owner, token_id).await?);
        }
        Ok(credentials)
    }
}

pub(crate) fn ensure_positive(amount: Amount) -> Result<(), WalletError> {
    if amount.is_zero() {
        return Err(WalletError::Validation("amount must be greater than zero".to_string()));
    }
    Ok(())
}
