use std::collections::HashMap;
use std::sync::RwLock;

use ethers_core::types::{Address, TxHash};

use crate::types::{BetRecord, NewBet};
use crate::utils::unix_now;

/// Largest page `recent` will return regardless of what was asked for.
pub const MAX_PAGE: usize = 200;

/// Insertion conflict: this transaction hash is already recorded.
///
/// One settled transaction maps to exactly one record, so a duplicate
/// submission is answered with this instead of a second row. The client
/// treats it as "already saved", not as a failure.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
#[error("Bet already recorded")]
pub struct DuplicateBet(pub TxHash);

/// Settled-bet history, unique by transaction hash.
///
/// The reference deployment keeps these rows in a document store; nothing in
/// the relay depends on how they persist, only on the uniqueness constraint
/// and newest-first reads, so this keeps them in memory behind a lock.
#[derive(Debug, Default)]
pub struct BetStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    by_hash: HashMap<TxHash, usize>,
    rows: Vec<BetRecord>,
}

impl BetStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a settled bet. The second record for a transaction hash is
    /// refused, whatever its other fields say.
    pub fn insert(&self, bet: NewBet) -> Result<BetRecord, DuplicateBet> {
        let mut inner = self.inner.write().expect("bet store poisoned");
        if inner.by_hash.contains_key(&bet.tx_hash) {
            return Err(DuplicateBet(bet.tx_hash));
        }

        let idx = inner.rows.len();
        let record = BetRecord {
            id: idx as u64,
            created_at: unix_now(),
            bet,
        };
        inner.by_hash.insert(record.bet.tx_hash, idx);
        inner.rows.push(record.clone());
        Ok(record)
    }

    /// The most recent records, newest first, optionally for one player.
    /// `limit` is capped at [`MAX_PAGE`].
    pub fn recent(&self, limit: usize, player: Option<Address>) -> Vec<BetRecord> {
        let limit = limit.min(MAX_PAGE);
        let inner = self.inner.read().expect("bet store poisoned");
        inner
            .rows
            .iter()
            .rev()
            .filter(|record| player.map_or(true, |p| record.bet.player == p))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.read().expect("bet store poisoned").rows.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
