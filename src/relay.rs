use std::sync::Arc;

use ethers_core::types::{TxHash, U256};

use crate::chain::{ChainError, ChainOps};
use crate::types::{RelayParams, RollRequest, ValidationError};
use crate::utils::unix_now;

/// Highest multiplier in the odds table. A winning 1%-chance bet pays
/// amount * 99; every liquidity bound derives from this.
const MAX_MULTIPLIER: u64 = 99;

/// Why a relay attempt produced no transaction.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Request failed validation; no chain I/O was performed
    #[error(transparent)]
    Rejected(#[from] ValidationError),
    /// Player's token balance cannot fund the bet
    #[error("Insufficient token balance")]
    InsufficientBalance {
        /// What the player holds
        balance: U256,
        /// What the bet needs
        required: U256,
    },
    /// House balance cannot honor the worst-case payout
    #[error("Insufficient contract liquidity")]
    InsufficientLiquidity {
        /// What the house holds
        available: U256,
        /// The worst-case payout of this bet
        required: U256,
    },
    /// A chain read or the submission itself failed
    #[error("{0}")]
    Chain(#[from] ChainError),
}

impl RelayError {
    /// Whether the fault lies with the request rather than with the relay
    /// or the chain. Drives the 4xx/5xx split at the HTTP boundary.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, RelayError::Chain(_))
    }
}

/// Gates every use of the relayer's signing key.
///
/// One operation: take an untrusted [`RelayParams`], decide whether it is
/// safe to spend gas on, and if so submit the wager. Stateless: nothing
/// survives a request except the transaction it may have sent. Concurrent
/// requests carrying the same permit are not deduplicated here; the token's
/// nonce consumption on-chain is the sole serialization point.
#[derive(Clone)]
pub struct RelayService {
    chain: Arc<dyn ChainOps>,
}

impl RelayService {
    /// Build a service around the given chain access.
    pub fn new(chain: Arc<dyn ChainOps>) -> Self {
        Self { chain }
    }

    /// Validate, pre-flight, and conditionally submit one bet.
    ///
    /// Returns the transaction hash as soon as the node accepts the
    /// submission; confirmation is the caller's concern.
    pub async fn relay(&self, params: &RelayParams) -> Result<TxHash, RelayError> {
        self.relay_at(params, unix_now()).await
    }

    /// [`relay`](Self::relay) against an explicit clock.
    pub async fn relay_at(&self, params: &RelayParams, now: u64) -> Result<TxHash, RelayError> {
        // Cheap checks first: nothing below this line runs for a request
        // that is malformed or already expired.
        let roll = params.validate(now)?;

        let balance = self.chain.token_balance(roll.player).await?;
        if balance < roll.amount {
            tracing::debug!(player = ?roll.player, %balance, amount = %roll.amount, "player cannot fund bet");
            return Err(RelayError::InsufficientBalance {
                balance,
                required: roll.amount,
            });
        }

        let required = worst_case_payout(roll.amount, roll.target, roll.is_under);
        let available = self.chain.house_balance().await?;
        if available < required {
            tracing::warn!(%available, %required, "house cannot honor worst-case payout");
            return Err(RelayError::InsufficientLiquidity {
                available,
                required,
            });
        }

        let tx_hash = self.chain.submit_roll(&roll).await?;
        tracing::info!(
            player = ?roll.player,
            target = roll.target,
            is_under = roll.is_under,
            amount = %roll.amount,
            ?tx_hash,
            "bet relayed"
        );
        Ok(tx_hash)
    }
}

/// The most the house could owe on this bet: `amount * 99 / max(1, winChance)`
/// where `winChance` is `target` for an under bet and `99 - target` for an
/// over bet. 99 is the ceiling of the odds table, so this bounds every
/// payout the contract could produce for the bet.
pub fn worst_case_payout(amount: U256, target: u8, is_under: bool) -> U256 {
    let win_chance = if is_under { target } else { 99 - target };
    amount * U256::from(MAX_MULTIPLIER) / U256::from(win_chance.max(1))
}
