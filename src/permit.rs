use ethers_core::{
    abi::{self, Token},
    types::{
        transaction::eip712::{EIP712Domain, Eip712},
        Address, Signature, H256, U256,
    },
    utils::keccak256,
};

use serde::{Deserialize, Serialize};

const PERMIT_TYPE: &str =
    "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

/// EIP-712 domain of the permit token.
///
/// `name` must match the token contract's on-chain `name()` byte for byte.
/// The token mixes it into its domain separator, so a mismatch invalidates
/// every signature produced under it. Read it from chain, never hardcode it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermitDomain {
    /// Token name, as `name()` returns it
    pub name: String,
    /// Domain version string the token was deployed with
    pub version: String,
    /// Chain id
    pub chain_id: u64,
    /// The token contract address
    pub verifying_contract: Address,
}

/// An EIP-2612 permit: an off-chain authorization for `spender` to pull
/// `value` tokens from `owner`, consumable until `deadline`.
///
/// `nonce` must equal the owner's current on-chain permit nonce when the
/// contract executes it; a stale one signs a message the token will reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permit {
    /// Domain the signature is bound to
    pub domain: PermitDomain,
    /// Token owner granting the allowance
    pub owner: Address,
    /// Contract allowed to pull the tokens
    pub spender: Address,
    /// Allowance in token base units
    pub value: U256,
    /// The owner's current permit nonce
    pub nonce: U256,
    /// Unix timestamp the permit expires at
    pub deadline: U256,
}

/// Permit signing error
#[derive(Debug, thiserror::Error)]
pub enum PermitError {
    /// Wrong Signer
    #[error(
        "Wrong signer. Permit owner is {expected:?}. Attempted to sign with key belonging to: {actual:?}"
    )]
    WrongSigner {
        /// Owner named in the permit
        expected: Address,
        /// Address belonging to the signer
        actual: Address,
    },
    /// Signer errored
    #[error("{0}")]
    SignerError(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Eip712 for Permit {
    type Error = PermitError;

    fn domain(&self) -> Result<EIP712Domain, Self::Error> {
        Ok(EIP712Domain {
            name: Some(self.domain.name.clone()),
            version: Some(self.domain.version.clone()),
            chain_id: Some(self.domain.chain_id.into()),
            verifying_contract: Some(self.domain.verifying_contract),
            salt: None,
        })
    }

    fn type_hash() -> Result<[u8; 32], Self::Error> {
        Ok(keccak256(PERMIT_TYPE))
    }

    fn struct_hash(&self) -> Result<[u8; 32], Self::Error> {
        let encoded_permit = abi::encode(&[
            Token::FixedBytes(Self::type_hash()?.to_vec()),
            Token::Address(self.owner),
            Token::Address(self.spender),
            Token::Uint(self.value),
            Token::Uint(self.nonce),
            Token::Uint(self.deadline),
        ]);

        Ok(keccak256(encoded_permit))
    }
}

impl Permit {
    /// Sign the permit with the specified signer and split the result.
    ///
    /// The signer must hold the key for `owner`; anything else produces a
    /// signature the token would recover to the wrong account.
    pub async fn sign<S>(&self, signer: &S) -> Result<SignatureParts, PermitError>
    where
        S: ethers_signers::Signer,
        S::Error: 'static,
    {
        let signer_addr = signer.address();
        if signer_addr != self.owner {
            return Err(PermitError::WrongSigner {
                expected: self.owner,
                actual: signer_addr,
            });
        }

        let signature = signer
            .sign_typed_data(self)
            .await
            .map_err(Box::new)
            .map_err(|e| PermitError::SignerError(e))?;
        Ok(SignatureParts::from(signature))
    }
}

/// The `v`/`r`/`s` decomposition of a 65-byte rsv signature, in the shape
/// `rollWithPermit` consumes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureParts {
    /// Recovery id, byte 64
    pub v: u8,
    /// Bytes 0–31
    pub r: H256,
    /// Bytes 32–63
    pub s: H256,
}

impl From<Signature> for SignatureParts {
    fn from(sig: Signature) -> Self {
        let bytes = sig.to_vec();
        Self {
            r: H256::from_slice(&bytes[0..32]),
            s: H256::from_slice(&bytes[32..64]),
            v: bytes[64],
        }
    }
}
