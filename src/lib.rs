//! A gasless dice-wager relay in rust
//!
//! Players sign an EIP-2612 permit off-chain; the relay validates the bet,
//! proves it is fundable on both sides, and pays the gas to put it on-chain.
//! The crate carries both halves of that exchange, the authorization
//! service guarding the relayer's key and the client-side signer that
//! produces requests the service will accept, plus the settled-bet history
//! the UI reads.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![forbid(unsafe_code)]

/// Wire and domain types
pub mod types;
pub use types::*;

/// lib utils
pub(crate) mod utils;

/// serde helpers
pub(crate) mod ser;

/// EIP-2612 permit construction and signing
pub mod permit;

/// Bounded retry with exponential backoff
pub mod retry;

/// Chain access for the relayer account
pub mod chain;

/// The relay authorization pipeline
pub mod relay;

/// Client-side permit signing workflow
pub mod signer;

/// HTTP client for the relay API
pub mod client;

/// Settled-bet history
pub mod store;

/// Receipt polling and settlement decoding
pub mod watch;

/// HTTP surface
pub mod api;

/// Process configuration
pub mod config;

/// Re-export reqwest for convenience
pub use reqwest;

pub use chain::{ChainClient, ChainError, ChainOps, PermitChain, ReceiptSource};
pub use client::{ClientError, RelayApiClient};
pub use config::RelayerConfig;
pub use permit::{Permit, PermitDomain, SignatureParts};
pub use relay::{RelayError, RelayService};
pub use retry::RetryPolicy;
pub use signer::PermitSigner;
pub use store::BetStore;
pub use watch::PendingRoll;
