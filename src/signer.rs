use std::time::Duration;

use ethers_core::types::{Address, U256};

use crate::chain::{ChainError, PermitChain};
use crate::permit::{Permit, PermitDomain, PermitError};
use crate::retry::RetryPolicy;
use crate::types::RelayParams;
use crate::utils::unix_now;

/// Permits expire ten minutes after signing.
const PERMIT_TTL_SECS: u64 = 600;

/// Reads behind the signature get four attempts with 400ms backoff. The
/// nonce must be fresh (a stale one signs a message the token rejects), so
/// exhaustion is an error, not a fallback.
const READ_RETRY: RetryPolicy = RetryPolicy::new(4, Duration::from_millis(400));

/// Permit signing workflow error
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// Chain reads exhausted their retry budget
    #[error("chain read failed after retries: {0}")]
    Read(#[from] ChainError),
    /// Wallet refused or mismatched the permit
    #[error(transparent)]
    Permit(#[from] PermitError),
}

/// Client-side counterpart of the relay service: turns a bet into the
/// signed [`RelayParams`] the service will accept and the wagering contract
/// will validate.
#[derive(Debug, Clone)]
pub struct PermitSigner<C, S> {
    chain: C,
    wallet: S,
    spender: Address,
    token: Address,
    token_version: String,
    chain_id: u64,
}

impl<C, S> PermitSigner<C, S>
where
    C: PermitChain,
    S: ethers_signers::Signer,
    S::Error: 'static,
{
    /// A signer for the given wallet, authorizing `spender` (the wagering
    /// contract) to pull bets from the `token` deployment on `chain_id`.
    pub fn new(
        chain: C,
        wallet: S,
        spender: Address,
        token: Address,
        chain_id: u64,
        token_version: impl Into<String>,
    ) -> Self {
        Self {
            chain,
            wallet,
            spender,
            token,
            token_version: token_version.into(),
            chain_id,
        }
    }

    /// Build a signed relay request for one bet of `amount` base units.
    ///
    /// The token name and the owner's permit nonce are read from chain
    /// immediately before signing; both feed the signature, and caching
    /// either produces one the contract rejects.
    pub async fn build_request(
        &self,
        target: u8,
        is_under: bool,
        amount: U256,
    ) -> Result<RelayParams, SignError> {
        let name = READ_RETRY.run(|| self.chain.token_name()).await?;

        let owner = self.wallet.address();
        let nonce = READ_RETRY.run(|| self.chain.permit_nonce(owner)).await?;

        let deadline = unix_now() + PERMIT_TTL_SECS;

        let permit = Permit {
            domain: PermitDomain {
                name,
                version: self.token_version.clone(),
                chain_id: self.chain_id,
                verifying_contract: self.token,
            },
            owner,
            spender: self.spender,
            value: amount,
            nonce,
            deadline: deadline.into(),
        };

        let sig = permit.sign(&self.wallet).await?;
        tracing::debug!(?owner, target, is_under, %amount, deadline, "permit signed");

        Ok(RelayParams::new(owner, target, is_under, amount, deadline, sig))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::ChainError;
    use async_trait::async_trait;
    use ethers::signers::{LocalWallet, Signer};
    use std::sync::atomic::{AtomicU32, Ordering};

    const GAME: &str = "0x61bBe925A5D646cE074369A6335e5095Ea7abB7A";
    const TOKEN: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

    /// Chain stub whose nonce read fails a set number of times first.
    #[derive(Debug, Default)]
    struct FlakyChain {
        nonce_failures: u32,
        name_calls: AtomicU32,
        nonce_calls: AtomicU32,
    }

    #[async_trait]
    impl PermitChain for FlakyChain {
        async fn token_name(&self) -> Result<String, ChainError> {
            self.name_calls.fetch_add(1, Ordering::SeqCst);
            Ok("USDC".to_owned())
        }

        async fn permit_nonce(&self, _owner: Address) -> Result<U256, ChainError> {
            let call = self.nonce_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.nonce_failures {
                Err(ChainError::Call("nonce read timed out".to_owned()))
            } else {
                Ok(U256::from(7u64))
            }
        }
    }

    fn signer(chain: FlakyChain) -> PermitSigner<FlakyChain, LocalWallet> {
        let wallet: LocalWallet = "42".repeat(32).parse().unwrap();
        PermitSigner::new(
            chain,
            wallet,
            GAME.parse().unwrap(),
            TOKEN.parse().unwrap(),
            84532,
            "2",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn it_builds_a_request_the_relay_would_accept() {
        let signer = signer(FlakyChain::default());
        let params = signer
            .build_request(50, true, U256::from(100_000u64))
            .await
            .unwrap();

        let now = unix_now();
        let roll = params.validate(now).unwrap();
        assert_eq!(roll.player, signer.wallet.address());
        assert_eq!(roll.target, 50);
        assert!(roll.is_under);
        assert_eq!(roll.amount, U256::from(100_000u64));
        assert!(roll.v == 27 || roll.v == 28);
        // ten-minute signing window from the wall clock
        assert!(roll.deadline >= now + PERMIT_TTL_SECS - 1);
        assert!(roll.deadline <= now + PERMIT_TTL_SECS + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn nonce_reads_survive_three_failures() {
        let signer = signer(FlakyChain {
            nonce_failures: 3,
            ..Default::default()
        });

        signer
            .build_request(50, true, U256::from(100_000u64))
            .await
            .unwrap();

        assert_eq!(signer.chain.nonce_calls.load(Ordering::SeqCst), 4);
        assert_eq!(signer.chain.name_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn nonce_reads_give_up_after_four_failures() {
        let signer = signer(FlakyChain {
            nonce_failures: 4,
            ..Default::default()
        });

        let err = signer
            .build_request(50, true, U256::from(100_000u64))
            .await
            .unwrap_err();

        assert!(matches!(err, SignError::Read(_)));
        assert_eq!(signer.chain.nonce_calls.load(Ordering::SeqCst), 4);
    }
}
