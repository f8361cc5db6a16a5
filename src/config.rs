use std::env;

use ethers_core::types::Address;
use once_cell::sync::Lazy;

static BASE_USDC: Lazy<Address> = Lazy::new(|| {
    "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
        .parse()
        .expect("!usdc")
});

static BASE_SEPOLIA_USDC: Lazy<Address> = Lazy::new(|| {
    "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
        .parse()
        .expect("!usdc")
});

/// Networks the relay knows out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// Base mainnet
    Base,
    /// Base Sepolia testnet
    BaseSepolia,
}

impl Network {
    /// EIP-155 chain id
    pub fn chain_id(self) -> u64 {
        match self {
            Network::Base => 8453,
            Network::BaseSepolia => 84532,
        }
    }

    /// Public RPC endpoint used when none is configured
    pub fn default_rpc(self) -> &'static str {
        match self {
            Network::Base => "https://mainnet.base.org",
            Network::BaseSepolia => "https://sepolia.base.org",
        }
    }

    /// Canonical USDC deployment on this network
    pub fn default_token(self) -> Address {
        match self {
            Network::Base => *BASE_USDC,
            Network::BaseSepolia => *BASE_SEPOLIA_USDC,
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is absent
    #[error("{0} is required")]
    Missing(&'static str),
    /// A variable is present but unusable
    #[error("{name} is not valid: {value}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// The offending value
        value: String,
    },
}

/// Process-wide relayer configuration, loaded once at startup by the
/// composition root and owned explicitly from there on. Nothing in the
/// crate reads the environment after this.
#[derive(Debug, Clone)]
pub struct RelayerConfig {
    /// Which network the relayer serves
    pub network: Network,
    /// RPC endpoint URL
    pub rpc_url: String,
    /// Hex-encoded private key of the relayer account
    pub relayer_key: String,
    /// Deployed wagering contract
    pub game_address: Address,
    /// EIP-2612 token wagers are denominated in
    pub token_address: Address,
    /// Version string of the token's EIP-712 domain
    pub token_domain_version: String,
    /// Port the HTTP surface listens on
    pub port: u16,
}

impl RelayerConfig {
    /// Read configuration from the environment.
    ///
    /// `NETWORK=mainnet` selects Base; anything else (or nothing) selects
    /// Base Sepolia. `RELAYER_PRIVATE_KEY` and `DICE_GAME_ADDRESS` are
    /// required; everything else falls back to per-network defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let network = match env::var("NETWORK").ok().as_deref() {
            Some("mainnet") => Network::Base,
            _ => Network::BaseSepolia,
        };

        let relayer_key =
            env::var("RELAYER_PRIVATE_KEY").map_err(|_| ConfigError::Missing("RELAYER_PRIVATE_KEY"))?;

        let game_address = required_addr("DICE_GAME_ADDRESS")?;
        let token_address = match optional("TOKEN_ADDRESS") {
            Some(raw) => parse_addr("TOKEN_ADDRESS", &raw)?,
            None => network.default_token(),
        };

        let rpc_url = optional("RPC_URL").unwrap_or_else(|| network.default_rpc().to_owned());
        let token_domain_version = optional("TOKEN_DOMAIN_VERSION").unwrap_or_else(|| "2".to_owned());

        let port = match optional("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => 3001,
        };

        Ok(Self {
            network,
            rpc_url,
            relayer_key,
            game_address,
            token_address,
            token_domain_version,
            port,
        })
    }

    /// EIP-155 chain id of the configured network
    pub fn chain_id(&self) -> u64 {
        self.network.chain_id()
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn required_addr(name: &'static str) -> Result<Address, ConfigError> {
    let raw = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    parse_addr(name, &raw)
}

fn parse_addr(name: &'static str, raw: &str) -> Result<Address, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_owned(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn networks_resolve_their_defaults() {
        assert_eq!(Network::Base.chain_id(), 8453);
        assert_eq!(Network::BaseSepolia.chain_id(), 84532);
        assert_ne!(Network::Base.default_token(), Network::BaseSepolia.default_token());
        assert!(Network::BaseSepolia.default_rpc().starts_with("https://"));
    }
}
