use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ethers_core::types::{Address, TxHash, H256, U256};
use tracing_test::traced_test;

use dice_relay::chain::{ChainError, ChainOps};
use dice_relay::relay::{RelayError, RelayService};
use dice_relay::types::{RelayParams, RollRequest, ValidationError};

const PLAYER: &str = "0x4e4f0d95bc1a4275b748a63221796080b1aa5c10";
const WORD: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
const NOW: u64 = 1_700_000_000;

/// Chain stub with canned balances and call counters. The counters are the
/// point: they prove which requests never reach the chain.
#[derive(Debug)]
struct StubChain {
    player_balance: U256,
    house_balance: U256,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl StubChain {
    fn new(player_balance: u64, house_balance: u64) -> Arc<Self> {
        Arc::new(Self {
            player_balance: player_balance.into(),
            house_balance: house_balance.into(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainOps for StubChain {
    async fn token_balance(&self, _account: Address) -> Result<U256, ChainError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.player_balance)
    }

    async fn house_balance(&self) -> Result<U256, ChainError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.house_balance)
    }

    async fn submit_roll(&self, _roll: &RollRequest) -> Result<TxHash, ChainError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(H256::from_low_u64_be(0xd1ce))
    }
}

fn params(target: i64, is_under: bool, amount: &str) -> RelayParams {
    RelayParams {
        player: PLAYER.into(),
        target,
        is_under,
        amount: amount.into(),
        deadline: NOW as i64 + 600,
        v: 27,
        r: WORD.into(),
        s: WORD.into(),
    }
}

#[tokio::test]
async fn out_of_range_targets_never_touch_the_chain() {
    let chain = StubChain::new(1_000_000, 1_000_000_000);
    let service = RelayService::new(chain.clone());

    for target in [0, 100, -5, 1000] {
        let err = service
            .relay_at(&params(target, true, "100000"), NOW)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::Rejected(ValidationError::TargetOutOfRange(_))
        ));
    }

    assert_eq!(chain.reads(), 0);
    assert_eq!(chain.writes(), 0);
}

#[tokio::test]
async fn expired_deadlines_never_touch_the_chain() {
    let chain = StubChain::new(1_000_000, 1_000_000_000);
    let service = RelayService::new(chain.clone());

    let mut p = params(50, true, "100000");
    p.deadline = NOW as i64 - 10;
    let err = service.relay_at(&p, NOW).await.unwrap_err();

    assert!(matches!(
        err,
        RelayError::Rejected(ValidationError::ExpiredDeadline { .. })
    ));
    assert_eq!(chain.reads(), 0);
    assert_eq!(chain.writes(), 0);
}

#[tokio::test]
async fn bad_recovery_ids_are_rejected() {
    let chain = StubChain::new(1_000_000, 1_000_000_000);
    let service = RelayService::new(chain.clone());

    for v in [0, 1, 26, 29] {
        let mut p = params(50, true, "100000");
        p.v = v;
        let err = service.relay_at(&p, NOW).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::Rejected(ValidationError::BadRecoveryId(_))
        ));
    }

    assert_eq!(chain.reads(), 0);
}

#[tokio::test]
async fn a_bet_the_player_cannot_fund_is_refused() {
    // balance 50_000 < amount 100_000
    let chain = StubChain::new(50_000, 1_000_000_000);
    let service = RelayService::new(chain.clone());

    let err = service
        .relay_at(&params(50, true, "100000"), NOW)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::InsufficientBalance { .. }));
    assert!(err.is_rejection());
    assert_eq!(chain.reads(), 1, "house balance is not read after the player check fails");
    assert_eq!(chain.writes(), 0);
}

#[tokio::test]
async fn a_balance_exactly_covering_the_bet_passes() {
    let chain = StubChain::new(100_000, 1_000_000_000);
    let service = RelayService::new(chain.clone());

    service
        .relay_at(&params(50, true, "100000"), NOW)
        .await
        .unwrap();
    assert_eq!(chain.writes(), 1);
}

#[tokio::test]
#[traced_test]
async fn a_funded_bet_with_a_solvent_house_is_submitted() {
    // 0.10 tokens under 50: winChance 50, maxPayout 198_000 <= 20_000_000
    let chain = StubChain::new(200_000, 20_000_000);
    let service = RelayService::new(chain.clone());

    let tx_hash = service
        .relay_at(&params(50, true, "100000"), NOW)
        .await
        .unwrap();

    assert_eq!(tx_hash, H256::from_low_u64_be(0xd1ce));
    assert_eq!(chain.reads(), 2);
    assert_eq!(chain.writes(), 1);
    assert!(logs_contain("bet relayed"));
}

#[tokio::test]
async fn a_house_that_cannot_pay_out_blocks_submission() {
    // same bet, house only holds 100_000 < maxPayout 198_000
    let chain = StubChain::new(200_000, 100_000);
    let service = RelayService::new(chain.clone());

    let err = service
        .relay_at(&params(50, true, "100000"), NOW)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RelayError::InsufficientLiquidity {
            required,
            ..
        } if required == U256::from(198_000u64)
    ));
    assert_eq!(chain.writes(), 0);
}

#[tokio::test]
async fn a_house_exactly_at_the_payout_bound_passes() {
    let chain = StubChain::new(200_000, 198_000);
    let service = RelayService::new(chain.clone());

    service
        .relay_at(&params(50, true, "100000"), NOW)
        .await
        .unwrap();
    assert_eq!(chain.writes(), 1);
}

#[tokio::test]
async fn long_shot_over_bets_demand_deep_liquidity() {
    // over 98: winChance 1, maxPayout = 99x the amount
    let chain = StubChain::new(1_000_000, 9_899_999);
    let service = RelayService::new(chain.clone());

    let err = service
        .relay_at(&params(98, false, "100000"), NOW)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::InsufficientLiquidity { .. }));

    let chain = StubChain::new(1_000_000, 9_900_000);
    let service = RelayService::new(chain.clone());
    service
        .relay_at(&params(98, false, "100000"), NOW)
        .await
        .unwrap();
}

/// Chain stub whose reads fail like a dead RPC endpoint.
#[derive(Debug)]
struct DeadChain;

#[async_trait]
impl ChainOps for DeadChain {
    async fn token_balance(&self, _account: Address) -> Result<U256, ChainError> {
        Err(ChainError::Call("connection refused".to_owned()))
    }

    async fn house_balance(&self) -> Result<U256, ChainError> {
        Err(ChainError::Call("connection refused".to_owned()))
    }

    async fn submit_roll(&self, _roll: &RollRequest) -> Result<TxHash, ChainError> {
        Err(ChainError::Call("connection refused".to_owned()))
    }
}

#[tokio::test]
async fn chain_failures_surface_as_server_faults_with_the_message() {
    let service = RelayService::new(Arc::new(DeadChain));

    let err = service
        .relay_at(&params(50, true, "100000"), NOW)
        .await
        .unwrap_err();

    assert!(!err.is_rejection());
    assert!(err.to_string().contains("connection refused"));
}
