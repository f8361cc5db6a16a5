use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers_contract::abigen;
use ethers_core::types::{Address, TransactionReceipt, TxHash, U256};
use ethers_middleware::SignerMiddleware;
use ethers_providers::{
    Http, HttpRateLimitRetryPolicy, Middleware, Provider, RetryClient, RetryClientBuilder,
};
use ethers_signers::{LocalWallet, Signer};
use url::Url;

use crate::config::RelayerConfig;
use crate::types::RollRequest;

abigen!(
    DiceGame,
    r#"[
        function rollWithPermit(address player, uint8 target, bool isUnder, uint256 amount, uint256 deadline, uint8 v, bytes32 r, bytes32 s)
        function fee() view returns (uint256)
        function owner() view returns (address)
        function withdraw(uint256 amount)
        function transferOwnership(address newOwner)
        event BetPlaced(address indexed player, uint256 amount, uint8 target, bool isUnder, uint8 roll, bool isWin, uint256 payout)
    ]"#
);

abigen!(
    PermitToken,
    r#"[
        function balanceOf(address account) view returns (uint256)
        function nonces(address owner) view returns (uint256)
        function name() view returns (string)
    ]"#
);

// Transport policy: a handful of quick retries inside the provider, one
// request timeout over everything. Callers see a single failed call, not
// the individual hiccups.
const RPC_RETRIES: u32 = 3;
const RPC_RETRY_DELAY: Duration = Duration::from_millis(200);
const RPC_TIMEOUT: Duration = Duration::from_secs(20);

/// Provider stack behind every chain interaction: retrying HTTP transport
/// with the relayer wallet attached for writes.
pub type RelayerMiddleware = SignerMiddleware<Provider<RetryClient<Http>>, LocalWallet>;

/// Chain access error
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Endpoint URL did not parse
    #[error("invalid rpc endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    /// Relayer key did not parse
    #[error("invalid relayer key: {0}")]
    Key(#[from] ethers_signers::WalletError),
    /// HTTP transport could not be constructed
    #[error("http transport: {0}")]
    Transport(#[from] reqwest::Error),
    /// A read or write against the node failed; underlying message preserved
    #[error("{0}")]
    Call(String),
}

fn call_err<E: std::fmt::Display>(err: E) -> ChainError {
    ChainError::Call(err.to_string())
}

/// The chain reads and the single privileged write the relay performs.
///
/// The relay service holds this as a trait object so tests can count calls
/// and prove that rejected requests never reach the chain.
#[async_trait]
pub trait ChainOps: Send + Sync {
    /// Token balance of an arbitrary account, in base units
    async fn token_balance(&self, account: Address) -> Result<U256, ChainError>;

    /// Token balance held by the wagering contract itself
    async fn house_balance(&self) -> Result<U256, ChainError>;

    /// Submit `rollWithPermit` from the relayer account, returning the
    /// transaction hash without waiting for confirmation
    async fn submit_roll(&self, roll: &RollRequest) -> Result<TxHash, ChainError>;
}

/// The reads the permit signer needs fresh from chain before signing.
#[async_trait]
pub trait PermitChain: Send + Sync {
    /// The token's `name()`, used verbatim in the EIP-712 domain
    async fn token_name(&self) -> Result<String, ChainError>;

    /// The owner's current permit nonce
    async fn permit_nonce(&self, owner: Address) -> Result<U256, ChainError>;
}

/// Receipt lookups for settlement watching.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    /// The receipt of a transaction, or `None` while it is unmined
    async fn tx_receipt(&self, hash: TxHash)
        -> Result<Option<TransactionReceipt>, ChainError>;
}

/// One EVM endpoint, one relayer account, two contracts.
///
/// Every read and write the system performs against the wagering game or
/// its token goes through here.
#[derive(Debug, Clone)]
pub struct ChainClient {
    middleware: Arc<RelayerMiddleware>,
    game: DiceGame<RelayerMiddleware>,
    token: PermitToken<RelayerMiddleware>,
    game_address: Address,
    relayer: Address,
}

impl ChainClient {
    /// Connect to the configured endpoint with the relayer key attached.
    pub fn new(cfg: &RelayerConfig) -> Result<Self, ChainError> {
        let url: Url = cfg.rpc_url.parse()?;
        let http = reqwest::Client::builder().timeout(RPC_TIMEOUT).build()?;
        let transport = RetryClientBuilder::default()
            .rate_limit_retries(RPC_RETRIES)
            .timeout_retries(RPC_RETRIES)
            .initial_backoff(RPC_RETRY_DELAY)
            .build(
                Http::new_with_client(url, http),
                Box::new(HttpRateLimitRetryPolicy),
            );

        let wallet: LocalWallet = cfg.relayer_key.parse()?;
        let wallet = wallet.with_chain_id(cfg.chain_id());
        let relayer = wallet.address();

        let middleware = Arc::new(SignerMiddleware::new(Provider::new(transport), wallet));
        Ok(Self {
            game: DiceGame::new(cfg.game_address, middleware.clone()),
            token: PermitToken::new(cfg.token_address, middleware.clone()),
            game_address: cfg.game_address,
            relayer,
            middleware,
        })
    }

    /// The account paying gas for every relayed transaction.
    pub fn relayer(&self) -> Address {
        self.relayer
    }

    /// The wagering contract's protocol fee.
    pub async fn fee(&self) -> Result<U256, ChainError> {
        self.game.fee().call().await.map_err(call_err)
    }

    /// Current owner of the wagering contract.
    pub async fn game_owner(&self) -> Result<Address, ChainError> {
        self.game.owner().call().await.map_err(call_err)
    }

    /// Withdraw house funds. Reverts on-chain unless the relayer is the owner.
    pub async fn withdraw(&self, amount: U256) -> Result<TxHash, ChainError> {
        let call = self.game.withdraw(amount);
        let pending = call.send().await.map_err(call_err)?;
        Ok(pending.tx_hash())
    }

    /// Hand the wagering contract to a new owner.
    pub async fn transfer_ownership(&self, new_owner: Address) -> Result<TxHash, ChainError> {
        let call = self.game.transfer_ownership(new_owner);
        let pending = call.send().await.map_err(call_err)?;
        Ok(pending.tx_hash())
    }
}

#[async_trait]
impl ChainOps for ChainClient {
    async fn token_balance(&self, account: Address) -> Result<U256, ChainError> {
        self.token.balance_of(account).call().await.map_err(call_err)
    }

    async fn house_balance(&self) -> Result<U256, ChainError> {
        self.token_balance(self.game_address).await
    }

    async fn submit_roll(&self, roll: &RollRequest) -> Result<TxHash, ChainError> {
        let call = self.game.roll_with_permit(
            roll.player,
            roll.target,
            roll.is_under,
            roll.amount,
            U256::from(roll.deadline),
            roll.v,
            roll.r.to_fixed_bytes(),
            roll.s.to_fixed_bytes(),
        );
        let pending = call.send().await.map_err(call_err)?;
        Ok(pending.tx_hash())
    }
}

#[async_trait]
impl PermitChain for ChainClient {
    async fn token_name(&self) -> Result<String, ChainError> {
        self.token.name().call().await.map_err(call_err)
    }

    async fn permit_nonce(&self, owner: Address) -> Result<U256, ChainError> {
        self.token.nonces(owner).call().await.map_err(call_err)
    }
}

#[async_trait]
impl ReceiptSource for ChainClient {
    async fn tx_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        self.middleware
            .get_transaction_receipt(hash)
            .await
            .map_err(call_err)
    }
}
