//! # Types
//!
//! Shared data structures used across all modules of the ZamaCCO contract.
//!
//! ## Ciphertext handles
//!
//! Every encrypted value is represented by a 32-byte handle issued by the FHE
//! executor contract. The ZamaCCO contract never sees plaintext financial
//! values; it only stores handles and feeds them back to the executor.
//!
//! ## Profile lifecycle
//!
//! ```text
//! (none) ──submit──► Submitted ──score──► Scored
//!                        ▲                  │
//!                        └─────submit───────┘   (tier cleared)
//! ```
//!
//! A resubmission replaces the whole profile. The previous tier handle is
//! dropped because it was computed from data that no longer exists.

use soroban_sdk::{contracttype, Address, Bytes, BytesN};

/// Coarse, non-reversible credit classification. The only plaintext ever
/// released for a borrower.
#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum CreditTier {
    Poor = 0,
    Fair = 1,
    Good = 2,
    Excellent = 3,
}

impl CreditTier {
    /// Map an ordinal (0–3) back to a tier. Out-of-range ordinals return `None`.
    pub fn from_ordinal(ordinal: u32) -> Option<CreditTier> {
        match ordinal {
            0 => Some(CreditTier::Poor),
            1 => Some(CreditTier::Fair),
            2 => Some(CreditTier::Good),
            3 => Some(CreditTier::Excellent),
            _ => None,
        }
    }

    pub fn ordinal(self) -> u32 {
        self as u32
    }
}

/// A borrower's encrypted financial profile.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Profile {
    /// Owner of the profile; also the storage key.
    pub borrower: Address,
    pub encrypted_income: BytesN<32>,
    pub encrypted_collateral: BytesN<32>,
    pub encrypted_debt: BytesN<32>,
    /// Proof that the three handles were produced by `borrower`'s client.
    pub input_proof: Bytes,
    /// Ledger timestamp of the latest submission.
    pub submitted_at: u64,
    /// Handle of the encrypted tier. `None` until `compute_credit_score` runs
    /// against this submission.
    pub encrypted_tier: Option<BytesN<32>>,
    /// Ledger timestamp of the latest tier computation.
    pub computed_at: Option<u64>,
}

impl Profile {
    pub fn is_scored(&self) -> bool {
        self.encrypted_tier.is_some()
    }
}
