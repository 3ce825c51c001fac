use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use sha3::{Digest, Keccak256};
use tokio::sync::mpsc;

use super::*;
use crate::{
    contracts::{
        event_topic, Log, Word, CREDENTIAL_ISSUED_EVENT, CREDENTIAL_VERIFIED_EVENT, STAKED_EVENT,
    },
    types::{Amount, StakeAccount, TokenId},
};

fn address_word(address: &Address) -> Word {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

#[derive(Default)]
struct FakeChainState {
    accounts: Vec<Address>,
    chain_id: Option<ChainId>,
    reject_accounts: Option<String>,
    fail_next: Option<String>,
    receipt_delay: Option<Duration>,
    ledger: BTreeMap<Address, StakeAccount>,
    tokens: BTreeMap<TokenId, (Address, String)>,
    receipts: HashMap<TxHash, TransactionReceipt>,
    block: u64,
    listeners: BTreeMap<SubscriptionId, mpsc::UnboundedSender<ProviderEvent>>,
    next_subscription: u64,
    submitted: usize,
}

#[derive(Clone, Default)]
pub struct FakeChain {
    state: Arc<Mutex<FakeChainState>>,
}

impl FakeChain {
    pub fn new(accounts: Vec<Address>, chain_id: ChainId) -> Self {
        let chain = FakeChain::default();
        {
            let mut state = chain.lock();
            state.accounts = accounts;
            state.chain_id = Some(chain_id);
        }
        chain
    }

    fn lock(&self) -> MutexGuard<'_, FakeChainState> {
        self.state.lock().unwrap()
    }

    pub fn fund(&self, owner: Address, account: StakeAccount) {
        self.lock().ledger.insert(owner, account);
    }

    pub fn account(&self, owner: &Address) -> StakeAccount {
        self.lock().ledger.get(owner).copied().unwrap_or_default()
    }

    pub fn mint(&self, owner: Address, uri: &str) -> TokenId {
        let mut state = self.lock();
        let token_id = TokenId(state.tokens.len() as u128 + 1);
        state.tokens.insert(token_id, (owner, uri.to_string()));
        token_id
    }

    pub fn token_uri(&self, token_id: TokenId) -> Option<String> {
        self.lock().tokens.get(&token_id).map(|(_, uri)| uri.clone())
    }

    pub fn fail_next(&self, reason: &str) {
        self.lock().fail_next = Some(reason.to_string());
    }

    pub fn set_receipt_delay(&self, delay: Duration) {
        self.lock().receipt_delay = Some(delay);
    }

    pub fn reject_accounts(&self, reason: &str) {
        self.lock().reject_accounts = Some(reason.to_string());
    }

    pub fn accept_accounts(&self) {
        self.lock().reject_accounts = None;
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.lock().accounts = accounts;
    }

    pub fn set_chain_id(&self, chain_id: ChainId) {
        self.lock().chain_id = Some(chain_id);
    }

    pub fn emit(&self, event: ProviderEvent) {
        let mut state = self.lock();
        state.listeners.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn submitted(&self) -> usize {
        self.lock().submitted
    }

    fn submit<F>(&self, apply: F) -> anyhow::Result<TxHash>
    where
        F: FnOnce(&mut FakeChainState) -> Option<Vec<Log>>,
    {
        let mut state = self.lock();
        if let Some(reason) = state.fail_next.take() {
            anyhow::bail!(reason);
        }

        state.block += 1;
        state.submitted += 1;
        let block_number = state.block;
        let tx_hash = TxHash(Keccak256::digest(block_number.to_be_bytes()).into());

        let (success, logs) = match apply(&mut *state) {
            Some(logs) => (true, logs),
            None => (false, vec![]),
        };
        state
            .receipts
            .insert(tx_hash, TransactionReceipt { tx_hash, block_number, success, logs });
        Ok(tx_hash)
    }

    fn read<T>(&self, read: impl FnOnce(&FakeChainState) -> T) -> anyhow::Result<T> {
        let mut state = self.lock();
        if let Some(reason) = state.fail_next.take() {
            anyhow::bail!(reason);
        }
        Ok(read(&*state))
    }
}

#[async_trait::async_trait]
impl WalletProvider for FakeChain {
    async fn request_accounts(&self) -> anyhow::Result<Vec<Address>> {
        let state = self.lock();
        match &state.reject_accounts {
            Some(reason) => anyhow::bail!(reason.clone()),
            None => Ok(state.accounts.clone()),
        }
    }

    async fn chain_id(&self) -> anyhow::Result<ChainId> {
        self.lock().chain_id.ok_or_else(|| anyhow::anyhow!("chain id unavailable"))
    }

    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> anyhow::Result<TransactionReceipt> {
        let delay = self.lock().receipt_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.lock()
            .receipts
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown transaction {}", tx_hash))
    }

    fn subscribe(&self) -> ProviderSubscription {
        let mut state = self.lock();
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        let (tx, events) = mpsc::unbounded_channel();
        state.listeners.insert(id, tx);
        ProviderSubscription { id, events }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().listeners.remove(&id);
    }

    fn token_contract(&self, at: &Address, signer: &Address) -> Arc<dyn TokenContract> {
        Arc::new(FakeToken { chain: self.clone(), at: *at, signer: *signer })
    }

    fn credential_contract(&self, at: &Address, signer: &Address) -> Arc<dyn CredentialContract> {
        Arc::new(FakeCredentialNft { chain: self.clone(), at: *at, signer: *signer })
    }
}

pub struct FakeToken {
    chain: FakeChain,
    at: Address,
    signer: Address,
}

#[async_trait::async_trait]
impl TokenContract for FakeToken {
    async fn balance_of(&self, owner: &Address) -> anyhow::Result<Amount> {
        self.chain.read(|s| s.ledger.get(owner).map(|a| a.balance).unwrap_or_default())
    }

    async fn get_staked_balance(&self, owner: &Address) -> anyhow::Result<Amount> {
        self.chain.read(|s| s.ledger.get(owner).map(|a| a.staked_balance).unwrap_or_default())
    }

    async fn get_rewards(&self, owner: &Address) -> anyhow::Result<Amount> {
        self.chain.read(|s| s.ledger.get(owner).map(|a| a.pending_rewards).unwrap_or_default())
    }

    async fn stake(&self, amount: Amount) -> anyhow::Result<TxHash> {
        let (at, signer) = (self.at, self.signer);
        self.chain.submit(|s| {
            let account = s.ledger.entry(signer).or_default();
            let balance = account.balance.checked_sub(amount)?;
            let staked = account.staked_balance.checked_add(amount)?;
            account.balance = balance;
            account.staked_balance = staked;
            let topics = vec![event_topic(STAKED_EVENT), address_word(&signer)];
            Some(vec![Log { address: at, topics, data: amount.to_word().to_vec() }])
        })
    }

    async fn unstake(&self, amount: Amount) -> anyhow::Result<TxHash> {
        let signer = self.signer;
        self.chain.submit(|s| {
            let account = s.ledger.entry(signer).or_default();
            let staked = account.staked_balance.checked_sub(amount)?;
            let balance = account.balance.checked_add(amount)?;
            account.balance = balance;
            account.staked_balance = staked;
            Some(vec![])
        })
    }

    async fn claim_rewards(&self) -> anyhow::Result<TxHash> {
        let (at, signer) = (self.at, self.signer);
        self.chain.submit(|s| {
            let account = s.ledger.entry(signer).or_default();
            let rewards = account.pending_rewards;
            let balance = account.balance.checked_add(rewards)?;
            account.balance = balance;
            account.pending_rewards = Amount::ZERO;
            Some(vec![Log { address: at, topics: vec![], data: rewards.to_word().to_vec() }])
        })
    }
}

pub struct FakeCredentialNft {
    chain: FakeChain,
    at: Address,
    signer: Address,
}

#[async_trait::async_trait]
impl CredentialContract for FakeCredentialNft {
    async fn tokens_of(&self, owner: &Address) -> anyhow::Result<Vec<TokenId>> {
        self.chain.read(|s| {
            s.tokens.iter().filter(|(_, (o, _))| o == owner).map(|(id, _)| *id).collect()
        })
    }

    async fn get_credential_data(&self, token_id: TokenId) -> anyhow::Result<String> {
        self.chain
            .read(|s| s.tokens.get(&token_id).map(|(_, uri)| uri.clone()))?
            .ok_or_else(|| anyhow::anyhow!("execution reverted: nonexistent token"))
    }

    async fn issue_credential(&self, recipient: &Address, uri: &str) -> anyhow::Result<TxHash> {
        let (at, signer, recipient) = (self.at, self.signer, *recipient);
        let uri = uri.to_string();
        self.chain.submit(move |s| {
            let token_id = TokenId(s.tokens.len() as u128 + 1);
            s.tokens.insert(token_id, (recipient, uri));
            let topics = vec![
                event_topic(CREDENTIAL_ISSUED_EVENT),
                address_word(&signer),
                address_word(&recipient),
                token_id.to_word(),
            ];
            Some(vec![Log { address: at, topics, data: vec![] }])
        })
    }

    async fn verify_credential(
        &self,
        token_id: TokenId,
        _approved: bool,
    ) -> anyhow::Result<TxHash> {
        let (at, signer) = (self.at, self.signer);
        self.chain.submit(|s| {
            s.tokens.get(&token_id)?;
            let topics = vec![event_topic(CREDENTIAL_VERIFIED_EVENT), address_word(&signer)];
            Some(vec![Log { address: at, topics, data: token_id.to_word().to_vec() }])
        })
    }
}
