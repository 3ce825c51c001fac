use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::types::{Address, ChainId};

pub const DEFAULT_CHAIN_ID: ChainId = ChainId(0x7a69);
pub const DEFAULT_STAKE_POLL_INTERVAL: Duration = Duration::from_secs(30);

const TOKEN_ADDRESS_KEY: &str = "EDU_TOKEN_ADDRESS";
const CREDENTIAL_NFT_ADDRESS_KEY: &str = "CREDENTIAL_NFT_ADDRESS";
const CHAIN_ID_KEY: &str = "EDU_CHAIN_ID";
const ENABLE_MOCK_KEY: &str = "EDU_ENABLE_MOCK";
const ENVIRONMENT_KEY: &str = "EDU_ENV";
const STAKE_POLL_SECS_KEY: &str = "EDU_STAKE_POLL_SECS";
const SESSION_DIR_KEY: &str = "EDU_SESSION_DIR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is invalid: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("contract addresses are not configured")]
    MissingContracts,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContractAddresses {
    pub edu_token: Address,
    pub credential_nft: Address,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletConfig {
    pub contracts: Option<ContractAddresses>,
    /// Writes are refused when the provider reports a different chain. `None`
    /// disables the check.
    pub expected_chain_id: Option<ChainId>,
    pub mock_enabled: bool,
    pub development: bool,
    pub stake_poll_interval: Duration,
    pub session_dir: Option<PathBuf>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        WalletConfig {
            contracts: None,
            expected_chain_id: Some(DEFAULT_CHAIN_ID),
            mock_enabled: false,
            development: false,
            stake_poll_interval: DEFAULT_STAKE_POLL_INTERVAL,
            session_dir: None,
        }
    }
}

impl WalletConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = WalletConfig::default();

        let token = lookup(TOKEN_ADDRESS_KEY).map(|v| parse_address(TOKEN_ADDRESS_KEY, &v));
        let nft = lookup(CREDENTIAL_NFT_ADDRESS_KEY)
            .map(|v| parse_address(CREDENTIAL_NFT_ADDRESS_KEY, &v));
        config.contracts = match (token, nft) {
            (Some(token), Some(nft)) => {
                Some(ContractAddresses { edu_token: token?, credential_nft: nft? })
            }
            (None, None) => None,
            _ => return Err(ConfigError::MissingContracts),
        };

        if let Some(value) = lookup(CHAIN_ID_KEY) {
            let chain_id = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: CHAIN_ID_KEY, value })?;
            config.expected_chain_id = Some(chain_id);
        }

        config.mock_enabled = lookup(ENABLE_MOCK_KEY).map_or(false, |v| is_truthy(&v));
        config.development = lookup(ENVIRONMENT_KEY)
            .map_or(false, |v| v.trim().eq_ignore_ascii_case("development"));

        if let Some(value) = lookup(STAKE_POLL_SECS_KEY) {
            let secs: u64 = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: STAKE_POLL_SECS_KEY, value })?;
            config.stake_poll_interval = Duration::from_secs(secs);
        }

        config.session_dir = lookup(SESSION_DIR_KEY).map(PathBuf::from);

        Ok(config)
    }

    pub fn with_contracts(mut self, edu_token: Address, credential_nft: Address) -> Self {
        self.contracts = Some(ContractAddresses { edu_token, credential_nft });
        self
    }

    pub fn with_expected_chain_id(mut self, chain_id: Option<ChainId>) -> Self {
        self.expected_chain_id = chain_id;
        self
    }

    pub fn with_mock(mut self, mock_enabled: bool) -> Self {
        self.mock_enabled = mock_enabled;
        self
    }

    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    pub fn mock_fallback_allowed(&self) -> bool {
        self.mock_enabled || self.development
    }
}

fn parse_address(key: &'static str, value: &str) -> Result<Address, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue { key, value: value.to_string() })
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}
