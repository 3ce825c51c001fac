use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::{ensure_positive, BackendKind, ChainClient, Confirmation, InFlightGuard, RewardClaim};
use crate::{
    config::{ConfigError, WalletConfig},
    contracts::{
        CredentialContract, TokenContract, TransactionReceipt, TxHash, CREDENTIAL_ISSUED_EVENT,
    },
    errors::{Operation, WalletError},
    metadata::MetadataCodec,
    provider::WalletProvider,
    types::{
        Address, Amount, ChainId, Credential, CredentialMetadata, CredentialStatus, TokenId,
    },
};

// NOTE: the credential contract exposes no status getter; one record is
// shared by every client a session builds
#[derive(Debug, Default)]
pub struct CredentialResolutions {
    decided: Mutex<BTreeMap<TokenId, CredentialStatus>>,
}

impl CredentialResolutions {
    pub fn get(&self, token_id: TokenId) -> Option<CredentialStatus> {
        self.lock().get(&token_id).copied()
    }

    pub fn record(&self, token_id: TokenId, status: CredentialStatus) {
        self.lock().insert(token_id, status);
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<TokenId, CredentialStatus>> {
        self.decided.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct RealChainClient {
    provider: Arc<dyn WalletProvider>,
    codec: Arc<dyn MetadataCodec>,
    guard: Arc<InFlightGuard>,
    token_address: Address,
    credential_address: Address,
    token: Arc<dyn TokenContract>,
    credentials: Arc<dyn CredentialContract>,
    signer: Address,
    expected_chain_id: Option<ChainId>,
    resolutions: Arc<CredentialResolutions>,
}

impl RealChainClient {
    pub fn bind(
        provider: Arc<dyn WalletProvider>,
        config: &WalletConfig,
        signer: Address,
        codec: Arc<dyn MetadataCodec>,
        guard: Arc<InFlightGuard>,
        resolutions: Arc<CredentialResolutions>,
    ) -> Result<Self, WalletError> {
        let contracts = config.contracts.ok_or(ConfigError::MissingContracts)?;
        let token = provider.token_contract(&contracts.edu_token, &signer);
        let credentials = provider.credential_contract(&contracts.credential_nft, &signer);

        log::debug!(
            "bound contracts token={} credential={} signer={}",
            contracts.edu_token,
            contracts.credential_nft,
            signer
        );

        Ok(RealChainClient {
            provider,
            codec,
            guard,
            token_address: contracts.edu_token,
            credential_address: contracts.credential_nft,
            token,
            credentials,
            signer,
            expected_chain_id: config.expected_chain_id,
            resolutions,
        })
    }

    pub fn rebind(&self, signer: Address) -> Self {
        RealChainClient {
            provider: self.provider.clone(),
            codec: self.codec.clone(),
            guard: self.guard.clone(),
            token_address: self.token_address,
            credential_address: self.credential_address,
            token: self.provider.token_contract(&self.token_address, &signer),
            credentials: self.provider.credential_contract(&self.credential_address, &signer),
            signer,
            expected_chain_id: self.expected_chain_id,
            resolutions: self.resolutions.clone(),
        }
    }

    pub fn signer(&self) -> &Address {
        &self.signer
    }

    fn ensure_signer(&self, from: &Address) -> Result<(), WalletError> {
        if *from != self.signer {
            return Err(WalletError::Validation(format!(
                "{} cannot sign for bound account {}",
                from, self.signer
            )));
        }
        Ok(())
    }

    async fn ensure_network(&self) -> Result<(), WalletError> {
        let expected = match self.expected_chain_id {
            Some(v) => v,
            None => return Ok(()),
        };
        let actual = self
            .provider
            .chain_id()
            .await
            .map_err(|e| WalletError::chain_call(Operation::ChainId, e))?;

        if actual != expected {
            log::warn!("provider is on {}, expected {}", actual, expected);
            return Err(WalletError::WrongNetwork { expected, actual });
        }
        Ok(())
    }

    async fn confirm(
        &self,
        operation: Operation,
        submitted: anyhow::Result<TxHash>,
    ) -> Result<TransactionReceipt, WalletError> {
        let tx_hash = submitted.map_err(|e| {
            log::error!("{} submission failed: {:?}", operation, e);
            WalletError::chain_call(operation, e)
        })?;
        log::info!("{} submitted: {}", operation, tx_hash);

        let receipt = self.provider.wait_for_receipt(&tx_hash).await.map_err(|e| {
            log::error!("{} receipt unavailable: {:?}", operation, e);
            WalletError::chain_call(operation, e)
        })?;

        if !receipt.success {
            log::error!("{} reverted: {}", operation, tx_hash);
            return Err(WalletError::chain_call(
                operation,
                anyhow::anyhow!("transaction {} reverted", tx_hash),
            ));
        }

        log::info!("{} confirmed in block {}", operation, receipt.block_number);
        Ok(receipt)
    }

    fn current_status(&self, token_id: TokenId, metadata: &CredentialMetadata) -> CredentialStatus {
        self.resolutions.get(token_id).or(metadata.status).unwrap_or(CredentialStatus::Verified)
    }
}

fn confirmation(receipt: &TransactionReceipt) -> Confirmation {
    Confirmation { tx_hash: receipt.tx_hash, block_number: receipt.block_number }
}

#[async_trait::async_trait]
impl ChainClient for RealChainClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Real
    }

    async fn balance_of(&self, owner: &Address) -> Result<Amount, WalletError> {
        self.token
            .balance_of(owner)
            .await
            .map_err(|e| WalletError::chain_call(Operation::BalanceOf, e))
    }

    async fn staked_balance(&self, owner: &Address) -> Result<Amount, WalletError> {
        self.token
            .get_staked_balance(owner)
            .await
            .map_err(|e| WalletError::chain_call(Operation::StakedBalance, e))
    }

    async fn rewards(&self, owner: &Address) -> Result<Amount, WalletError> {
        self.token
            .get_rewards(owner)
            .await
            .map_err(|e| WalletError::chain_call(Operation::Rewards, e))
    }

    async fn stake(&self, from: &Address, amount: Amount) -> Result<Confirmation, WalletError> {
        self.ensure_signer(from)?;
        ensure_positive(amount)?;
        let _ticket = self.guard.acquire(from, Operation::Stake)?;
        self.ensure_network().await?;

        let available = self.balance_of(from).await?;
        if amount > available {
            return Err(WalletError::InsufficientFunds { requested: amount, available });
        }

        let receipt = self.confirm(Operation::Stake, self.token.stake(amount).await).await?;
        Ok(confirmation(&receipt))
    }

    async fn unstake(&self, from: &Address, amount: Amount) -> Result<Confirmation, WalletError> {
        self.ensure_signer(from)?;
        ensure_positive(amount)?;
        let _ticket = self.guard.acquire(from, Operation::Unstake)?;
        self.ensure_network().await?;

        let available = self.staked_balance(from).await?;
        if amount > available {
            return Err(WalletError::InsufficientFunds { requested: amount, available });
        }

        let receipt = self.confirm(Operation::Unstake, self.token.unstake(amount).await).await?;
        Ok(confirmation(&receipt))
    }

    async fn claim_rewards(&self, from: &Address) -> Result<RewardClaim, WalletError> {
        self.ensure_signer(from)?;
        let _ticket = self.guard.acquire(from, Operation::ClaimRewards)?;
        self.ensure_network().await?;

        let receipt =
            self.confirm(Operation::ClaimRewards, self.token.claim_rewards().await).await?;

        // NOTE: the claimed amount is the data word of the first log
        let amount = match receipt.logs.first().map(|log| Amount::from_word(&log.data)) {
            Some(Ok(amount)) => amount,
            Some(Err(e)) => {
                log::warn!("claim {} carried an unreadable amount: {}", receipt.tx_hash, e);
                Amount::ZERO
            }
            None => {
                log::warn!("claim {} emitted no logs", receipt.tx_hash);
                Amount::ZERO
            }
        };

        Ok(RewardClaim { confirmation: confirmation(&receipt), amount })
    }

    async fn issue_credential(
        &self,
        from: &Address,
        recipient: &Address,
        metadata: &CredentialMetadata,
    ) -> Result<TokenId, WalletError> {
        self.ensure_signer(from)?;
        let uri = self.codec.encode(metadata)?;
        let _ticket = self.guard.acquire(from, Operation::IssueCredential)?;
        self.ensure_network().await?;

        let submitted = self.credentials.issue_credential(recipient, &uri).await;
        let receipt = self.confirm(Operation::IssueCredential, submitted).await?;

        let word = receipt
            .find_event(CREDENTIAL_ISSUED_EVENT)
            .and_then(|log| log.topics.get(3))
            .ok_or_else(|| {
                WalletError::chain_call(
                    Operation::IssueCredential,
                    anyhow::anyhow!("{} emitted no CredentialIssued event", receipt.tx_hash),
                )
            })?;
        let token_id = TokenId::from_word(word)
            .map_err(|e| WalletError::chain_call(Operation::IssueCredential, e))?;

        log::info!("issued credential {} to {}", token_id, recipient);
        Ok(token_id)
    }

    async fn verify_credential(
        &self,
        from: &Address,
        token_id: TokenId,
        approved: bool,
    ) -> Result<Confirmation, WalletError> {
        self.ensure_signer(from)?;
        let _ticket = self.guard.acquire(from, Operation::VerifyCredential)?;
        self.ensure_network().await?;

        let metadata = self.credential_metadata(token_id).await?;
        if self.current_status(token_id, &metadata).is_terminal() {
            return Err(WalletError::CredentialAlreadyResolved(token_id));
        }

        let submitted = self.credentials.verify_credential(token_id, approved).await;
        let receipt = self.confirm(Operation::VerifyCredential, submitted).await?;

        self.resolutions.record(token_id, CredentialStatus::from_decision(approved));
        Ok(confirmation(&receipt))
    }

    async fn tokens_of(&self, owner: &Address) -> Result<Vec<TokenId>, WalletError> {
        self.credentials
            .tokens_of(owner)
            .await
            .map_err(|e| WalletError::chain_call(Operation::TokensOf, e))
    }

    async fn credential_metadata(
        &self,
        token_id: TokenId,
    ) -> Result<CredentialMetadata, WalletError> {
        let uri = self
            .credentials
            .get_credential_data(token_id)
            .await
            .map_err(|e| WalletError::chain_call(Operation::CredentialData, e))?;
        self.codec.decode(&uri).map_err(|e| WalletError::chain_call(Operation::CredentialData, e))
    }

    async fn credential(
        &self,
        owner: &Address,
        token_id: TokenId,
    ) -> Result<Credential, WalletError> {
        let metadata = self.credential_metadata(token_id).await?;
        let status = self.current_status(token_id, &metadata);
        Ok(Credential::from_metadata(token_id, *owner, metadata, status))
    }
}
