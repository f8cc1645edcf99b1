#![allow(dead_code)]

extern crate std;

use crate::events::DecryptionRequested;
use crate::types::{CreditTier, Profile};

/// INV-1: a tier handle and its computation timestamp appear together, and
/// scoring never predates the submission it scored.
pub fn assert_profile_invariants(profile: &Profile) {
    assert_eq!(
        profile.encrypted_tier.is_some(),
        profile.computed_at.is_some(),
        "INV-1 violated: tier handle and computed_at disagree"
    );
    if let Some(computed_at) = profile.computed_at {
        assert!(
            computed_at >= profile.submitted_at,
            "INV-1 violated: tier computed at {} before submission at {}",
            computed_at,
            profile.submitted_at
        );
    }
}

/// INV-2: a resubmission keeps the owner and replaces every ciphertext; no
/// field of the old submission survives.
pub fn assert_resubmission_replaced(before: &Profile, after: &Profile) {
    assert_eq!(before.borrower, after.borrower, "INV-2 violated: owner changed");
    assert_ne!(
        before.encrypted_income, after.encrypted_income,
        "INV-2 violated: income handle merged from old submission"
    );
    assert_ne!(
        before.encrypted_collateral, after.encrypted_collateral,
        "INV-2 violated: collateral handle merged from old submission"
    );
    assert_ne!(
        before.encrypted_debt, after.encrypted_debt,
        "INV-2 violated: debt handle merged from old submission"
    );
    assert!(
        after.encrypted_tier.is_none(),
        "INV-2 violated: stale tier survived resubmission"
    );
}

/// INV-3: a revealed tier ordinal is always one of the four tiers.
pub fn assert_valid_tier(ordinal: u32) -> CreditTier {
    match CreditTier::from_ordinal(ordinal) {
        Some(tier) => tier,
        None => panic!("INV-3 violated: tier ordinal {} out of range", ordinal),
    }
}

/// INV-4: decryption request sequence numbers are dense and start at zero.
pub fn assert_sequential_requests(requests: &[DecryptionRequested]) {
    for (i, request) in requests.iter().enumerate() {
        assert_eq!(
            request.seq, i as u64,
            "INV-4 violated: expected seq {}, got {}",
            i, request.seq
        );
    }
}
