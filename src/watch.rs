use futures_timer::Delay;
use futures_util::ready;
use pin_project::pin_project;

use ethers_contract::EthEvent;
use ethers_core::abi::RawLog;
use ethers_core::types::{Address, TransactionReceipt, TxHash, U256};

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use crate::chain::{BetPlacedFilter, ChainError, ReceiptSource};
use crate::types::{Direction, NewBet};

/// Settlement watch error
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// chain
    #[error("{0}")]
    Chain(#[from] ChainError),
    /// Transaction confirmed without a BetPlaced event
    #[error("no BetPlaced event in receipt")]
    NoSettlement,
    /// Unmined for the whole polling budget
    #[error("transaction not mined within polling budget")]
    TimedOut,
}

// convenience
type PinBoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const DEFAULT_POLLS: usize = 150;
const DEFAULT_DELAY: u64 = 2;

/// A relayed roll awaiting its receipt.
///
/// Polls the chain on a fixed interval. Polls that find the transaction
/// still unmined draw down a bounded budget; chain errors are terminal here,
/// since the chain client has already applied its own retry underneath.
#[pin_project(project = PendingRollProj)]
pub struct PendingRoll<'a> {
    /// Transaction being watched
    hash: TxHash,
    /// Receipt reads
    chain: &'a dyn ReceiptSource,
    /// watch state
    state: WatchState<'a>,
    /// unmined polls remaining
    polls_left: usize,
    /// delay between polls
    delay: Duration,
}

enum WatchState<'a> {
    /// Waiting out the polling interval
    Delaying(Pin<Box<Delay>>),
    /// Receipt request in flight
    Requesting(PinBoxFut<'a, Result<Option<TransactionReceipt>, ChainError>>),
}

impl std::fmt::Debug for PendingRoll<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRoll").field("hash", &self.hash).finish()
    }
}

impl<'a> PendingRoll<'a> {
    /// Watch a transaction via the given receipt source.
    pub fn new(hash: TxHash, chain: &'a dyn ReceiptSource) -> Self {
        let delay = Duration::from_secs(DEFAULT_DELAY);
        Self {
            hash,
            chain,
            state: WatchState::Delaying(Box::pin(Delay::new(delay))),
            polls_left: DEFAULT_POLLS,
            delay,
        }
    }

    /// Set the unmined-poll budget.
    #[must_use]
    pub fn polls(mut self, polls: usize) -> Self {
        self.polls_left = polls;
        self
    }

    /// Sets the polling delay (the time between poll attempts)
    #[must_use]
    pub fn polling_interval<T: Into<Duration>>(mut self, duration: T) -> Self {
        self.delay = duration.into();

        if matches!(self.state, WatchState::Delaying(_)) {
            self.state = WatchState::Delaying(Box::pin(Delay::new(self.delay)))
        }

        self
    }
}

impl Future for PendingRoll<'_> {
    type Output = Result<TransactionReceipt, WatchError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let this: PendingRollProj = self.project();
        let chain: &dyn ReceiptSource = *this.chain;

        let receipt_fut = match this.state {
            // early returns only :)
            WatchState::Delaying(delay) => {
                ready!(delay.as_mut().poll(cx));
                *this.state = WatchState::Requesting(chain.tx_receipt(*this.hash));
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            // just unpack the future
            WatchState::Requesting(fut) => fut,
        };

        match ready!(receipt_fut.as_mut().poll(cx)) {
            Err(err) => Poll::Ready(Err(err.into())),
            Ok(Some(receipt)) => Poll::Ready(Ok(receipt)),
            Ok(None) => {
                if *this.polls_left == 0 {
                    return Poll::Ready(Err(WatchError::TimedOut));
                }
                *this.polls_left -= 1;
                *this.state = WatchState::Delaying(Box::pin(Delay::new(*this.delay)));
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }
}

/// The decoded outcome of one settled roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollSettlement {
    /// Account that placed the bet
    pub player: Address,
    /// Wagered amount in base units
    pub amount: U256,
    /// Target the bet was placed around
    pub target: u8,
    /// Bet direction
    pub is_under: bool,
    /// The rolled number
    pub roll: u8,
    /// Whether the bet won
    pub is_win: bool,
    /// Paid out amount, zero on a loss
    pub payout: U256,
    /// The settling transaction
    pub tx_hash: TxHash,
}

/// Pull the settlement out of a confirmed receipt.
///
/// Scans the logs for the first decodable `BetPlaced` event; other events in
/// the receipt are ignored.
pub fn settlement_of(receipt: &TransactionReceipt) -> Result<RollSettlement, WatchError> {
    for log in &receipt.logs {
        let raw = RawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        };
        if let Ok(ev) = BetPlacedFilter::decode_log(&raw) {
            return Ok(RollSettlement {
                player: ev.player,
                amount: ev.amount,
                target: ev.target,
                is_under: ev.is_under,
                roll: ev.roll,
                is_win: ev.is_win,
                payout: ev.payout,
                tx_hash: receipt.transaction_hash,
            });
        }
    }
    Err(WatchError::NoSettlement)
}

impl RollSettlement {
    /// Denormalize into the record the history store keeps.
    pub fn into_record(self) -> NewBet {
        NewBet {
            player: self.player,
            amount: self.amount,
            result: self.roll,
            target: self.target,
            direction: if self.is_under {
                Direction::Under
            } else {
                Direction::Over
            },
            is_win: self.is_win,
            payout: self.payout,
            tx_hash: self.tx_hash,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_trait::async_trait;
    use ethers_core::abi::{self, Token};
    use ethers_core::types::{Bytes, Log, H256};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bet_placed_log(player: Address) -> Log {
        let data = abi::encode(&[
            Token::Uint(U256::from(100_000u64)),   // amount
            Token::Uint(U256::from(50u64)),        // target
            Token::Bool(true),                     // isUnder
            Token::Uint(U256::from(42u64)),        // roll
            Token::Bool(true),                     // isWin
            Token::Uint(U256::from(198_000u64)),   // payout
        ]);
        Log {
            topics: vec![BetPlacedFilter::signature(), H256::from(player)],
            data: Bytes::from(data),
            ..Default::default()
        }
    }

    fn receipt(logs: Vec<Log>) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: H256::from_low_u64_be(0xd1ce),
            logs,
            ..Default::default()
        }
    }

    #[test]
    fn it_decodes_the_settlement_event() {
        let player: Address = "0x4e4f0d95bc1a4275b748a63221796080b1aa5c10".parse().unwrap();
        let settlement = settlement_of(&receipt(vec![bet_placed_log(player)])).unwrap();

        assert_eq!(settlement.player, player);
        assert_eq!(settlement.roll, 42);
        assert!(settlement.is_win);
        assert_eq!(settlement.payout, U256::from(198_000u64));

        let record = settlement.into_record();
        assert_eq!(record.result, 42);
        assert_eq!(record.direction, Direction::Under);
        assert_eq!(record.tx_hash, H256::from_low_u64_be(0xd1ce));
    }

    #[test]
    fn foreign_logs_are_skipped() {
        let player: Address = "0x4e4f0d95bc1a4275b748a63221796080b1aa5c10".parse().unwrap();
        let noise = Log {
            topics: vec![H256::from_low_u64_be(1)],
            data: Bytes::from(vec![0u8; 4]),
            ..Default::default()
        };
        let settlement =
            settlement_of(&receipt(vec![noise, bet_placed_log(player)])).unwrap();
        assert_eq!(settlement.player, player);
    }

    #[test]
    fn a_receipt_without_the_event_is_an_error() {
        let err = settlement_of(&receipt(vec![])).unwrap_err();
        assert!(matches!(err, WatchError::NoSettlement));
    }

    /// Receipt source that stays unmined for a set number of polls.
    struct SlowChain {
        unmined_polls: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReceiptSource for SlowChain {
        async fn tx_receipt(
            &self,
            hash: TxHash,
        ) -> Result<Option<TransactionReceipt>, ChainError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.unmined_polls {
                Ok(None)
            } else {
                Ok(Some(TransactionReceipt {
                    transaction_hash: hash,
                    ..Default::default()
                }))
            }
        }
    }

    #[tokio::test]
    async fn it_polls_until_the_receipt_lands() {
        let chain = SlowChain {
            unmined_polls: 2,
            calls: AtomicUsize::new(0),
        };
        let hash = H256::from_low_u64_be(0xd1ce);

        let receipt = PendingRoll::new(hash, &chain)
            .polling_interval(Duration::from_millis(5))
            .await
            .unwrap();

        assert_eq!(receipt.transaction_hash, hash);
        assert_eq!(chain.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn it_gives_up_when_the_budget_runs_out() {
        let chain = SlowChain {
            unmined_polls: usize::MAX,
            calls: AtomicUsize::new(0),
        };

        let err = PendingRoll::new(H256::from_low_u64_be(1), &chain)
            .polling_interval(Duration::from_millis(1))
            .polls(2)
            .await
            .unwrap_err();

        assert!(matches!(err, WatchError::TimedOut));
        assert_eq!(chain.calls.load(Ordering::SeqCst), 3);
    }
}
