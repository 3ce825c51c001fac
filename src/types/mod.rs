pub mod address;
pub mod amount;
pub mod credential;
pub mod identity;

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub use self::{
    address::{Address, AddressError},
    amount::{Amount, AmountError},
    credential::{
        Credential, CredentialMetadata, CredentialStatus, RequestStatus, VerificationRequest,
    },
    identity::{Identity, ProfileUpdate, UserRole},
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid chain id: {0}")]
pub struct ChainIdError(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl FromStr for ChainId {
    type Err = ChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse(),
        };
        parsed.map(ChainId).map_err(|_| ChainIdError(s.to_string()))
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(pub u128);

impl TokenId {
    pub fn from_word(word: &[u8; 32]) -> Result<Self, AmountError> {
        Amount::from_word(word).map(|amount| TokenId(amount.units()))
    }

    pub fn to_word(self) -> [u8; 32] {
        Amount::from_units(self.0).to_word()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TokenId)
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeAccount {
    #[serde(rename = "balance")]
    pub balance: Amount,

    #[serde(rename = "stakedBalance")]
    pub staked_balance: Amount,

    #[serde(rename = "pendingRewards")]
    pub pending_rewards: Amount,
}

impl StakeAccount {
    pub fn total(&self) -> Option<Amount> {
        self.balance.checked_add(self.staked_balance)?.checked_add(self.pending_rewards)
    }
}
