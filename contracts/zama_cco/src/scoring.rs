//! # Credit scoring
//!
//! Clear-text definition of the score:
//!
//! ```text
//! x'    = min(x, 100_000)                      for income, collateral, debt
//! raw   = (400·income' + 350·collateral' − 250·debt') / 100_000
//! score = clamp(round(raw), 0, 1000)
//! tier  = Poor (<300) | Fair (<550) | Good (<750) | Excellent
//! ```
//!
//! The on-chain circuit never divides and never goes negative. Since
//! `round(raw) < T ⇔ 2·(400·I' + 350·C') < 2·250·D' + (2T − 1)·100_000`,
//! each threshold becomes one encrypted comparison between two sums of
//! scaled, capped inputs. The largest intermediate value is below 2·10⁸, well
//! inside the 32-bit ciphertext range.

use soroban_sdk::BytesN;

use crate::fhe::FheExecutorClient;
use crate::types::{CreditTier, Profile};

/// Inputs are normalized by this cap; anything above it counts as the cap.
pub const NORMALIZATION_CAP: u32 = 100_000;

pub const INCOME_WEIGHT: u32 = 400;
pub const COLLATERAL_WEIGHT: u32 = 350;
pub const DEBT_WEIGHT: u32 = 250;

pub const MAX_SCORE: u32 = 1000;

/// Lower bounds of Fair, Good and Excellent.
pub const FAIR_THRESHOLD: u32 = 300;
pub const GOOD_THRESHOLD: u32 = 550;
pub const EXCELLENT_THRESHOLD: u32 = 750;

/// Evaluate the scoring circuit over the profile's ciphertext handles and
/// return the handle of the encrypted tier ordinal.
pub fn compute_encrypted_tier(fhe: &FheExecutorClient, profile: &Profile) -> BytesN<32> {
    let income = fhe.min_scalar(&profile.encrypted_income, &NORMALIZATION_CAP);
    let collateral = fhe.min_scalar(&profile.encrypted_collateral, &NORMALIZATION_CAP);
    let debt = fhe.min_scalar(&profile.encrypted_debt, &NORMALIZATION_CAP);

    // Both sides doubled so the rounding half-step stays integral.
    let positive = fhe.add(
        &fhe.mul_scalar(&income, &(2 * INCOME_WEIGHT)),
        &fhe.mul_scalar(&collateral, &(2 * COLLATERAL_WEIGHT)),
    );
    let negative = fhe.mul_scalar(&debt, &(2 * DEBT_WEIGHT));

    let below = |threshold: u32| {
        let bound = fhe.add(&negative, &fhe.as_encrypted(&threshold_offset(threshold)));
        fhe.lt(&positive, &bound)
    };
    let below_fair = below(FAIR_THRESHOLD);
    let below_good = below(GOOD_THRESHOLD);
    let below_excellent = below(EXCELLENT_THRESHOLD);

    let tier = |t: CreditTier| fhe.as_encrypted(&t.ordinal());
    let good_or_better = fhe.select(
        &below_excellent,
        &tier(CreditTier::Good),
        &tier(CreditTier::Excellent),
    );
    let fair_or_better = fhe.select(&below_good, &tier(CreditTier::Fair), &good_or_better);
    fhe.select(&below_fair, &tier(CreditTier::Poor), &fair_or_better)
}

/// `(2T − 1) · cap`: the doubled, rounding-adjusted threshold.
fn threshold_offset(threshold: u32) -> u32 {
    (2 * threshold - 1) * NORMALIZATION_CAP
}

/// Plaintext reference score. Never called on-chain against real data; it
/// documents what the circuit computes and backs the tests.
pub fn plain_score(income: u32, collateral: u32, debt: u32) -> u32 {
    let cap = NORMALIZATION_CAP as i64;
    let norm = |x: u32| (x as i64).min(cap);
    let numerator = INCOME_WEIGHT as i64 * norm(income)
        + COLLATERAL_WEIGHT as i64 * norm(collateral)
        - DEBT_WEIGHT as i64 * norm(debt);
    if numerator <= 0 {
        return 0;
    }
    // Round half up, as the score is rounded before comparing to thresholds.
    let rounded = (2 * numerator + cap) / (2 * cap);
    (rounded as u32).min(MAX_SCORE)
}

pub fn score_to_tier(score: u32) -> CreditTier {
    if score < FAIR_THRESHOLD {
        CreditTier::Poor
    } else if score < GOOD_THRESHOLD {
        CreditTier::Fair
    } else if score < EXCELLENT_THRESHOLD {
        CreditTier::Good
    } else {
        CreditTier::Excellent
    }
}

pub fn plain_tier(income: u32, collateral: u32, debt: u32) -> CreditTier {
    score_to_tier(plain_score(income, collateral, debt))
}
