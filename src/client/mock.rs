use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use sha3::{Digest, Keccak256};

use super::{ensure_positive, BackendKind, ChainClient, Confirmation, InFlightGuard, RewardClaim};
use crate::{
    contracts::TxHash,
    errors::{Operation, WalletError},
    metadata::MetadataCodec,
    types::{
        Address, Amount, Credential, CredentialMetadata, CredentialStatus, StakeAccount, TokenId,
    },
};

pub const MOCK_WALLET_ADDRESS: Address = Address::from_bytes([
    0xf3, 0x9f, 0xd6, 0xe5, 0x1a, 0xad, 0x88, 0xf6, 0xf4, 0xce, 0x6a, 0xb8, 0x82, 0x72, 0x79,
    0xcf, 0xff, 0xb9, 0x22, 0x66,
]);

const STARTING_ACCOUNT: StakeAccount = StakeAccount {
    balance: Amount::from_tokens(1000),
    staked_balance: Amount::from_tokens(500),
    pending_rewards: Amount::from_tokens(25),
};

const FIRST_ISSUED_TOKEN: u128 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockLatency {
    pub read: Duration,
    pub write: Duration,
}

impl Default for MockLatency {
    fn default() -> Self {
        MockLatency { read: Duration::from_millis(1000), write: Duration::from_millis(1500) }
    }
}

impl MockLatency {
    pub fn none() -> Self {
        MockLatency { read: Duration::ZERO, write: Duration::ZERO }
    }
}

struct MockToken {
    owner: Address,
    uri: String,
    status: CredentialStatus,
}

struct MockLedger {
    accounts: BTreeMap<Address, StakeAccount>,
    tokens: BTreeMap<TokenId, MockToken>,
    next_token_id: u128,
    block: u64,
}

impl MockLedger {
    fn account(&mut self, owner: &Address) -> &mut StakeAccount {
        self.accounts.entry(*owner).or_insert(STARTING_ACCOUNT)
    }

    fn next_confirmation(&mut self) -> Confirmation {
        self.block += 1;
        let tx_hash = TxHash(Keccak256::digest(self.block.to_be_bytes()).into());
        Confirmation { tx_hash, block_number: self.block }
    }
}

/// In-memory stand-in for the wallet provider and both contracts. Every write
/// is applied atomically after the simulated confirmation delay.
pub struct MockChainClient {
    codec: Arc<dyn MetadataCodec>,
    latency: MockLatency,
    guard: Arc<InFlightGuard>,
    ledger: Mutex<MockLedger>,
}

impl MockChainClient {
    pub fn new(
        codec: Arc<dyn MetadataCodec>,
        latency: MockLatency,
        guard: Arc<InFlightGuard>,
    ) -> Result<Self, WalletError> {
        let mut tokens = BTreeMap::new();
        for (token_id, metadata, status) in seeded_credentials() {
            let uri = codec.encode(&metadata)?;
            tokens.insert(token_id, MockToken { owner: MOCK_WALLET_ADDRESS, uri, status });
        }

        Ok(MockChainClient {
            codec,
            latency,
            guard,
            ledger: Mutex::new(MockLedger {
                accounts: BTreeMap::new(),
                tokens,
                next_token_id: FIRST_ISSUED_TOKEN,
                block: 0,
            }),
        })
    }

    fn ledger(&self) -> MutexGuard<'_, MockLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    async fn read_account(&self, owner: &Address) -> StakeAccount {
        self.delay(self.latency.read).await;
        *self.ledger().account(owner)
    }

    fn decode_token(
        &self,
        token_id: TokenId,
    ) -> Result<(CredentialMetadata, CredentialStatus), WalletError> {
        let (uri, status) = {
            let ledger = self.ledger();
            let token =
                ledger.tokens.get(&token_id).ok_or(WalletError::CredentialNotFound(token_id))?;
            (token.uri.clone(), token.status)
        };
        let metadata = self
            .codec
            .decode(&uri)
            .map_err(|e| WalletError::chain_call(Operation::CredentialData, e))?;
        Ok((metadata, status))
    }
}

fn seeded_credentials() -> Vec<(TokenId, CredentialMetadata, CredentialStatus)> {
    let bachelor = CredentialMetadata {
        title: Some("Bachelor of Computer Science".to_string()),
        issuer: Some("Tech University".to_string()),
        description: Some("Bachelor's degree in Computer Science with honors".to_string()),
        issued_at: Some(1_684_108_800_000),
        skills: vec![
            "Programming".to_string(),
            "Algorithms".to_string(),
            "Data Structures".to_string(),
        ],
        status: Some(CredentialStatus::Verified),
        ..Default::default()
    };
    let web = CredentialMetadata {
        title: Some("Web Development Certification".to_string()),
        issuer: Some("CodeAcademy".to_string()),
        description: Some("Advanced web development certification".to_string()),
        issued_at: Some(1_691_625_600_000),
        skills: vec!["React".to_string(), "Node.js".to_string(), "TypeScript".to_string()],
        status: Some(CredentialStatus::Pending),
        ..Default::default()
    };

    vec![
        (TokenId(1), bachelor, CredentialStatus::Verified),
        (TokenId(2), web, CredentialStatus::Pending),
    ]
}

#[async_trait::async_trait]
impl ChainClient for MockChainClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Mock
    }

    async fn balance_of(&self, owner: &Address) -> Result<Amount, WalletError> {
        Ok(self.read_account(owner).await.balance)
    }

    async fn staked_balance(&self, owner: &Address) -> Result<Amount, WalletError> {
        Ok(self.read_account(owner).await.staked_balance)
    }

    async fn rewards(&self, owner: &Address) -> Result<Amount, WalletError> {
        Ok(self.read_account(owner).await.pending_rewards)
    }

    async fn stake_account(&self, owner: &Address) -> Result<StakeAccount, WalletError> {
        Ok(self.read_account(owner).await)
    }

    async fn stake(&self, from: &Address, amount: Amount) -> Result<Confirmation, WalletError> {
        ensure_positive(amount)?;
        let _ticket = self.guard.acquire(from, Operation::Stake)?;
        self.delay(self.latency.write).await;

        let mut ledger = self.ledger();
        let account = ledger.account(from);
        let available = account.balance;
        let balance = account
            .balance
            .checked_sub(amount)
            .ok_or(WalletError::InsufficientFunds { requested: amount, available })?;
        let staked = account
            .staked_balance
            .checked_add(amount)
            .ok_or_else(|| WalletError::Validation("staked balance overflow".to_string()))?;
        account.balance = balance;
        account.staked_balance = staked;

        log::debug!("mock stake {} from {}", amount, from);
        Ok(ledger.next_confirmation())
    }

    async fn unstake(&self, from: &Address, amount: Amount) -> Result<Confirmation, WalletError> {
        ensure_positive(amount)?;
        let _ticket = self.guard.acquire(from, Operation::Unstake)?;
        self.delay(self.latency.write).await;

        let mut ledger = self.ledger();
        let account = ledger.account(from);
        let available = account.staked_balance;
        let staked = account
            .staked_balance
            .checked_sub(amount)
            .ok_or(WalletError::InsufficientFunds { requested: amount, available })?;
        let balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| WalletError::Validation("balance overflow".to_string()))?;
        account.balance = balance;
        account.staked_balance = staked;

        log::debug!("mock unstake {} to {}", amount, from);
        Ok(ledger.next_confirmation())
    }

    async fn claim_rewards(&self, from: &Address) -> Result<RewardClaim, WalletError> {
        let _ticket = self.guard.acquire(from, Operation::ClaimRewards)?;
        self.delay(self.latency.write).await;

        let mut ledger = self.ledger();
        let account = ledger.account(from);
        let amount = account.pending_rewards;
        let balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| WalletError::Validation("balance overflow".to_string()))?;
        account.balance = balance;
        account.pending_rewards = Amount::ZERO;

        log::debug!("mock claim {} for {}", amount, from);
        Ok(RewardClaim { confirmation: ledger.next_confirmation(), amount })
    }

    async fn issue_credential(
        &self,
        from: &Address,
        recipient: &Address,
        metadata: &CredentialMetadata,
    ) -> Result<TokenId, WalletError> {
        let uri = self.codec.encode(metadata)?;
        let _ticket = self.guard.acquire(from, Operation::IssueCredential)?;
        self.delay(self.latency.write).await;

        let mut ledger = self.ledger();
        let token_id = TokenId(ledger.next_token_id);
        ledger.next_token_id += 1;
        let status = metadata.status.unwrap_or(CredentialStatus::Verified);
        ledger.tokens.insert(token_id, MockToken { owner: *recipient, uri, status });
        ledger.next_confirmation();

        log::info!("mock issued credential {} to {}", token_id, recipient);
        Ok(token_id)
    }

    async fn verify_credential(
        &self,
        from: &Address,
        token_id: TokenId,
        approved: bool,
    ) -> Result<Confirmation, WalletError> {
        let _ticket = self.guard.acquire(from, Operation::VerifyCredential)?;
        self.delay(self.latency.write).await;

        let mut ledger = self.ledger();
        let token =
            ledger.tokens.get_mut(&token_id).ok_or(WalletError::CredentialNotFound(token_id))?;
        if token.status.is_terminal() {
            return Err(WalletError::CredentialAlreadyResolved(token_id));
        }
        token.status = CredentialStatus::from_decision(approved);

        log::debug!("mock verified credential {} approved={}", token_id, approved);
        Ok(ledger.next_confirmation())
    }

    async fn tokens_of(&self, owner: &Address) -> Result<Vec<TokenId>, WalletError> {
        self.delay(self.latency.read).await;
        let ledger = self.ledger();
        Ok(ledger
            .tokens
            .iter()
            .filter(|(_, token)| token.owner == *owner)
            .map(|(token_id, _)| *token_id)
            .collect())
    }

    async fn credential_metadata(
        &self,
        token_id: TokenId,
    ) -> Result<CredentialMetadata, WalletError> {
        self.delay(self.latency.read).await;
        self.decode_token(token_id).map(|(metadata, _)| metadata)
    }

    async fn credential(
        &self,
        owner: &Address,
        token_id: TokenId,
    ) -> Result<Credential, WalletError> {
        self.delay(self.latency.read).await;
        let (metadata, status) = self.decode_token(token_id)?;
        Ok(Credential::from_metadata(token_id, *owner, metadata, status))
    }
}
