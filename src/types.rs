use ethers_core::types::{Address, TxHash, H256, U256};
use serde::{Deserialize, Serialize};

use crate::permit::SignatureParts;

/// A relay request exactly as it arrives on the wire: untrusted, loosely
/// typed, and not yet safe to hand to anything that talks to the chain.
///
/// The only way forward from here is [`RelayParams::validate`], which either
/// produces a [`RollRequest`] or names the reason the request is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayParams {
    /// Account placing the bet, as a 0x-prefixed hex string
    pub player: String,
    /// Dice target the player is betting around
    pub target: i64,
    /// Whether the bet is that the roll lands under `target`
    pub is_under: bool,
    /// Bet amount in token base units, as a decimal string
    pub amount: String,
    /// Unix timestamp after which the permit is void
    pub deadline: i64,
    /// ECDSA recovery id of the permit signature
    pub v: i64,
    /// First 32 bytes of the permit signature, 0x-hex
    pub r: String,
    /// Second 32 bytes of the permit signature, 0x-hex
    pub s: String,
}

/// Why a [`RelayParams`] was rejected before any chain interaction.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Player field does not parse as an account address
    #[error("Invalid player address")]
    InvalidPlayer,
    /// Target outside the playable range
    #[error("Target must be between 1 and 99")]
    TargetOutOfRange(i64),
    /// Amount is not a decimal string of base units
    #[error("Amount must be a decimal string of token base units")]
    InvalidAmount,
    /// Deadline is not in the future by the server clock
    #[error("Deadline must be a future timestamp")]
    ExpiredDeadline {
        /// The deadline the request carried
        deadline: i64,
        /// The server clock it was checked against
        now: u64,
    },
    /// Recovery id outside the canonical range for this signature scheme
    #[error("v must be 27 or 28")]
    BadRecoveryId(i64),
    /// `r` or `s` is not a 32-byte hex value
    #[error("r and s must be 32-byte hex values")]
    MalformedSignatureWord,
}

impl RelayParams {
    /// Assemble wire parameters from already-typed values. Used by the
    /// client side after signing; the server never constructs these.
    pub fn new(
        player: Address,
        target: u8,
        is_under: bool,
        amount: U256,
        deadline: u64,
        sig: SignatureParts,
    ) -> Self {
        Self {
            player: format!("{player:#x}"),
            target: target.into(),
            is_under,
            amount: amount.to_string(),
            deadline: deadline as i64,
            v: sig.v.into(),
            r: format!("{:#x}", sig.r),
            s: format!("{:#x}", sig.s),
        }
    }

    /// Parse and validate against the given clock (seconds since epoch).
    ///
    /// Checks run in a fixed order and fail fast; none of them touches the
    /// chain. The amount is parsed as an arbitrary-precision integer, never
    /// through a float.
    pub fn validate(&self, now: u64) -> Result<RollRequest, ValidationError> {
        let player: Address = self
            .player
            .parse()
            .map_err(|_| ValidationError::InvalidPlayer)?;

        if !(1..=99).contains(&self.target) {
            return Err(ValidationError::TargetOutOfRange(self.target));
        }

        if self.amount.is_empty() {
            return Err(ValidationError::InvalidAmount);
        }
        let amount =
            U256::from_dec_str(&self.amount).map_err(|_| ValidationError::InvalidAmount)?;

        if self.deadline <= now as i64 {
            return Err(ValidationError::ExpiredDeadline {
                deadline: self.deadline,
                now,
            });
        }

        let v = match self.v {
            27 | 28 => self.v as u8,
            other => return Err(ValidationError::BadRecoveryId(other)),
        };

        let r: H256 = self
            .r
            .parse()
            .map_err(|_| ValidationError::MalformedSignatureWord)?;
        let s: H256 = self
            .s
            .parse()
            .map_err(|_| ValidationError::MalformedSignatureWord)?;

        Ok(RollRequest {
            player,
            target: self.target as u8,
            is_under: self.is_under,
            amount,
            deadline: self.deadline as u64,
            v,
            r,
            s,
        })
    }
}

/// A validated bet, ready for pre-flight checks and submission.
///
/// Only [`RelayParams::validate`] constructs one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollRequest {
    /// Account placing the bet
    pub player: Address,
    /// Dice target, in [1, 99]
    pub target: u8,
    /// Bet direction
    pub is_under: bool,
    /// Bet amount in token base units
    pub amount: U256,
    /// Permit expiry, strictly in the future at validation time
    pub deadline: u64,
    /// Signature recovery id, 27 or 28
    pub v: u8,
    /// Signature `r` word
    pub r: H256,
    /// Signature `s` word
    pub s: H256,
}

/// Successful relay response: the hash of the submitted transaction.
///
/// The transaction is not yet confirmed when this is returned; watching for
/// the receipt is the caller's responsibility.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    /// Hash of the submitted `rollWithPermit` transaction
    pub tx_hash: TxHash,
}

/// Structured failure body returned by every rejected or failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Human-readable reason
    pub error: String,
}

/// Bet direction as the history store records it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Roll must land strictly under the target
    Under,
    /// Roll must land strictly over the target
    Over,
}

/// A settled bet as submitted to the history store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewBet {
    /// Account that placed the bet
    pub player: Address,
    /// Wagered amount in token base units
    #[serde(with = "crate::ser::decimal_u256")]
    pub amount: U256,
    /// The rolled number
    pub result: u8,
    /// The target the bet was placed around
    pub target: u8,
    /// Bet direction
    pub direction: Direction,
    /// Whether the bet won
    pub is_win: bool,
    /// Amount paid out, zero on a loss
    #[serde(with = "crate::ser::decimal_u256")]
    pub payout: U256,
    /// Hash of the settling transaction; unique per record
    pub tx_hash: TxHash,
}

/// A stored bet: the submitted record plus store-assigned fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BetRecord {
    /// Store-assigned sequence number
    pub id: u64,
    /// The settled bet
    #[serde(flatten)]
    pub bet: NewBet,
    /// Insertion time, seconds since epoch
    pub created_at: u64,
}
