use std::fmt;

use thiserror::Error;

use crate::{
    config::ConfigError,
    metadata::MetadataCodecError,
    types::{AddressError, Amount, AmountError, ChainId, TokenId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    RequestAccounts,
    ChainId,
    BalanceOf,
    StakedBalance,
    Rewards,
    Stake,
    Unstake,
    ClaimRewards,
    IssueCredential,
    VerifyCredential,
    TokensOf,
    CredentialData,
}

impl Operation {
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Operation::Stake
                | Operation::Unstake
                | Operation::ClaimRewards
                | Operation::IssueCredential
                | Operation::VerifyCredential
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::RequestAccounts => "requestAccounts",
            Operation::ChainId => "chainId",
            Operation::BalanceOf => "balanceOf",
            Operation::StakedBalance => "getStakedBalance",
            Operation::Rewards => "getRewards",
            Operation::Stake => "stake",
            Operation::Unstake => "unstake",
            Operation::ClaimRewards => "claimRewards",
            Operation::IssueCredential => "issueCredential",
            Operation::VerifyCredential => "verifyCredential",
            Operation::TokensOf => "tokensOf",
            Operation::CredentialData => "getCredentialData",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no wallet provider detected and mock mode is disabled")]
    NoProvider,
    #[error("operation requires a connected session")]
    NoSession,
    #[error("wrong network: expected {expected}, connected to {actual}")]
    WrongNetwork { expected: ChainId, actual: ChainId },
    #[error("{operation} failed: {cause:#}")]
    ChainCall { operation: Operation, cause: anyhow::Error },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Amount, available: Amount },
    #[error("{0} is already in flight for this session")]
    OperationInFlight(Operation),
    #[error("credential not found: {0}")]
    CredentialNotFound(TokenId),
    #[error("credential {0} has already been resolved")]
    CredentialAlreadyResolved(TokenId),
    #[error("verification request not found: {0}")]
    RequestNotFound(String),
    #[error("verification request {0} has already been resolved")]
    RequestAlreadyResolved(String),
}

impl WalletError {
    pub fn chain_call(operation: Operation, cause: impl Into<anyhow::Error>) -> Self {
        WalletError::ChainCall { operation, cause: cause.into() }
    }
}

impl From<AddressError> for WalletError {
    fn from(e: AddressError) -> Self {
        WalletError::Validation(e.to_string())
    }
}

impl From<AmountError> for WalletError {
    fn from(e: AmountError) -> Self {
        WalletError::Validation(e.to_string())
    }
}

impl From<MetadataCodecError> for WalletError {
    fn from(e: MetadataCodecError) -> Self {
        WalletError::Validation(e.to_string())
    }
}
