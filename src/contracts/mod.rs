use std::fmt;

use sha3::{Digest, Keccak256};

use crate::types::{Address, Amount, TokenId};

pub const CREDENTIAL_ISSUED_EVENT: &str = "CredentialIssued(address,address,uint256)";
pub const CREDENTIAL_VERIFIED_EVENT: &str = "CredentialVerified(uint256,address)";
pub const STAKED_EVENT: &str = "Staked(address,uint256,uint256)";

pub type Word = [u8; 32];

pub fn event_topic(signature: &str) -> Word {
    Keccak256::digest(signature.as_bytes()).into()
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub Word);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Word>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// `false` when the transaction was mined but reverted.
    pub success: bool,
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    pub fn find_event(&self, signature: &str) -> Option<&Log> {
        let topic = event_topic(signature);
        self.logs.iter().find(|log| log.topics.first() == Some(&topic))
    }
}

#[async_trait::async_trait]
pub trait TokenContract: Send + Sync {
    async fn balance_of(&self, owner: &Address) -> anyhow::Result<Amount>;
    async fn get_staked_balance(&self, owner: &Address) -> anyhow::Result<Amount>;
    async fn get_rewards(&self, owner: &Address) -> anyhow::Result<Amount>;
    async fn stake(&self, amount: Amount) -> anyhow::Result<TxHash>;
    async fn unstake(&self, amount: Amount) -> anyhow::Result<TxHash>;
    async fn claim_rewards(&self) -> anyhow::Result<TxHash>;
}

#[async_trait::async_trait]
pub trait CredentialContract: Send + Sync {
    async fn tokens_of(&self, owner: &Address) -> anyhow::Result<Vec<TokenId>>;
    async fn get_credential_data(&self, token_id: TokenId) -> anyhow::Result<String>;
    async fn issue_credential(&self, recipient: &Address, uri: &str) -> anyhow::Result<TxHash>;
    async fn verify_credential(&self, token_id: TokenId, approved: bool)
        -> anyhow::Result<TxHash>;
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_transfer_topic() {
        assert_eq!(
            hex::encode(event_topic("Transfer(address,address,uint256)")),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    pub fn test_find_event() {
        let address = "0x2222222222222222222222222222222222222222".parse().unwrap();
        let issued = Log {
            address,
            topics: vec![event_topic(CREDENTIAL_ISSUED_EVENT), [0u8; 32], [0u8; 32], [1u8; 32]],
            data: vec![],
        };
        let receipt = TransactionReceipt {
            tx_hash: TxHash([9u8; 32]),
            block_number: 1,
            success: true,
            logs: vec![
                Log { address, topics: vec![event_topic(STAKED_EVENT)], data: vec![] },
                issued.clone(),
            ],
        };

        assert_eq!(receipt.find_event(CREDENTIAL_ISSUED_EVENT), Some(&issued));
        assert_eq!(receipt.find_event(CREDENTIAL_VERIFIED_EVENT), None);
    }
}
