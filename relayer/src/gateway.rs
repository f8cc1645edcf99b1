//! Decryption gateway boundary.
//!
//! The gateway is the only party able to decrypt. The relayer hands it a
//! single ciphertext handle, the encrypted tier, and receives the plaintext
//! tier plus an attestation. Profile handles (income, collateral, debt)
//! have no representation on this side of the boundary.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::acl::AccountId;
use crate::error::GatewayError;
use crate::relayer::RequestId;

const PROOF_CONTEXT: &str = "zama-cco relayer 2024 decryption proof v1";

/// 32-byte ciphertext handle issued by the FHE executor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CiphertextHandle(pub [u8; 32]);

impl CiphertextHandle {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns the hex decoding error for malformed or wrongly sized input.
    pub fn from_hex(text: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text.trim_start_matches("0x"), &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextHandle({self})")
    }
}

/// Plaintext credit tier, the only value ever decrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CreditTier {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl CreditTier {
    #[must_use]
    pub const fn from_ordinal(ordinal: u32) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Poor),
            1 => Some(Self::Fair),
            2 => Some(Self::Good),
            3 => Some(Self::Excellent),
            _ => None,
        }
    }

    #[must_use]
    pub const fn ordinal(self) -> u32 {
        match self {
            Self::Poor => 0,
            Self::Fair => 1,
            Self::Good => 2,
            Self::Excellent => 3,
        }
    }

    /// Tier for a score in `[0, 1000]`.
    #[must_use]
    pub const fn from_score(score: u32) -> Self {
        if score < 300 {
            Self::Poor
        } else if score < 550 {
            Self::Fair
        } else if score < 750 {
            Self::Good
        } else {
            Self::Excellent
        }
    }
}

impl fmt::Display for CreditTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Poor => "Poor",
            Self::Fair => "Fair",
            Self::Good => "Good",
            Self::Excellent => "Excellent",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    pub request_id: RequestId,
    pub handle: CiphertextHandle,
    /// Recipient of the plaintext.
    pub lender: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub tier: CreditTier,
    /// Opaque gateway signature or KMS attestation over the result.
    pub attestation: Vec<u8>,
}

/// Threshold-decryption service.
#[async_trait]
pub trait DecryptionGateway: Send + Sync {
    /// Decrypt the tier behind `request.handle` for `request.lender`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Timeout`] and [`GatewayError::Network`] are treated
    /// as transient; [`GatewayError::Rejected`] is final.
    async fn decrypt_tier(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError>;
}

/// Evidence that `tier` is the decryption of `handle` for this exact
/// request: a blake3 binding over the request parameters plus the
/// gateway's attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof {
    pub binding: [u8; 32],
    pub attestation: Vec<u8>,
}

impl DecryptionProof {
    #[must_use]
    pub fn bind(
        request_id: &RequestId,
        borrower: &AccountId,
        lender: &AccountId,
        handle: &CiphertextHandle,
        tier: CreditTier,
        attestation: Vec<u8>,
    ) -> Self {
        let binding = binding_digest(request_id, borrower, lender, handle, tier);
        Self {
            binding: *binding.as_bytes(),
            attestation,
        }
    }

    /// Recompute the binding and compare in constant time.
    #[must_use]
    pub fn verify(
        &self,
        request_id: &RequestId,
        borrower: &AccountId,
        lender: &AccountId,
        handle: &CiphertextHandle,
        tier: CreditTier,
    ) -> bool {
        binding_digest(request_id, borrower, lender, handle, tier)
            == blake3::Hash::from(self.binding)
    }
}

fn binding_digest(
    request_id: &RequestId,
    borrower: &AccountId,
    lender: &AccountId,
    handle: &CiphertextHandle,
    tier: CreditTier,
) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new_derive_key(PROOF_CONTEXT);
    hasher.update(request_id.as_bytes());
    update_str(&mut hasher, borrower.as_str());
    update_str(&mut hasher, lender.as_str());
    hasher.update(handle.as_bytes());
    hasher.update(&tier.ordinal().to_be_bytes());
    hasher.finalize()
}

/// Length-prefixed so adjacent strings cannot be shifted into each other.
pub(crate) fn update_str(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}
