//! # Storage
//!
//! Provides typed helpers over Soroban's two storage tiers used by ZamaCCO:
//!
//! ## Instance storage (contract-lifetime TTL)
//!
//! | Key             | Type      | Description                              |
//! |-----------------|-----------|------------------------------------------|
//! | `FheExecutor`   | `Address` | Contract that evaluates FHE operations   |
//! | `RewardToken`   | `Address` | Optional SAC token paid out as rewards   |
//! | `RequestCount`  | `u64`     | Decryption request sequence counter      |
//! | `Paused`        | `bool`    | Emergency halt flag                      |
//!
//! Instance TTL is bumped by **7 days** whenever it falls below 1 day remaining.
//!
//! ## Persistent storage (per-entry TTL)
//!
//! | Key                    | Type      | Description                         |
//! |------------------------|-----------|-------------------------------------|
//! | `Profile(borrower)`    | `Profile` | Encrypted profile and tier handle   |
//! | `RewardBalance(user)`  | `i128`    | Accumulated distributed rewards     |
//!
//! Persistent TTL is bumped by **30 days** whenever it falls below 7 days remaining.
//!
//! Profiles are never removed. The submission history lives in the event log.

use soroban_sdk::{contracttype, Address, Env};

use crate::types::Profile;

// ── TTL Constants ────────────────────────────────────────────────────

/// Approximate ledgers per day (~5 seconds per ledger).
const DAY_IN_LEDGERS: u32 = 17_280;

/// Instance storage: bump by 7 days when below 1 day remaining.
const INSTANCE_BUMP_AMOUNT: u32 = 7 * DAY_IN_LEDGERS;
const INSTANCE_LIFETIME_THRESHOLD: u32 = DAY_IN_LEDGERS;

/// Persistent storage: bump by 30 days when below 7 days remaining.
const PERSISTENT_BUMP_AMOUNT: u32 = 30 * DAY_IN_LEDGERS;
const PERSISTENT_LIFETIME_THRESHOLD: u32 = 7 * DAY_IN_LEDGERS;

// ── Storage Keys ─────────────────────────────────────────────────────

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    /// FHE executor contract address (Instance).
    FheExecutor,
    /// Reward token address, if rewards are paid in a token (Instance).
    RewardToken,
    /// Monotonic decryption request counter (Instance).
    RequestCount,
    /// Protocol pause flag (Instance).
    Paused,
    /// Encrypted profile keyed by borrower (Persistent).
    Profile(Address),
    /// Distributed reward total keyed by recipient (Persistent).
    RewardBalance(Address),
}

// ── Instance Storage Helpers ─────────────────────────────────────────

fn bump_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}

pub fn has_fhe_executor(env: &Env) -> bool {
    env.storage().instance().has(&DataKey::FheExecutor)
}

pub fn set_fhe_executor(env: &Env, executor: &Address) {
    env.storage().instance().set(&DataKey::FheExecutor, executor);
    bump_instance(env);
}

/// Read the FHE executor address, returning `None` before init.
pub fn get_fhe_executor(env: &Env) -> Option<Address> {
    bump_instance(env);
    env.storage().instance().get(&DataKey::FheExecutor)
}

pub fn set_reward_token(env: &Env, token: &Address) {
    env.storage().instance().set(&DataKey::RewardToken, token);
    bump_instance(env);
}

pub fn get_reward_token(env: &Env) -> Option<Address> {
    env.storage().instance().get(&DataKey::RewardToken)
}

/// Atomically read and increment the decryption request counter.
/// Returns the sequence number assigned to the current request.
pub fn next_request_seq(env: &Env) -> u64 {
    bump_instance(env);
    let current: u64 = env
        .storage()
        .instance()
        .get(&DataKey::RequestCount)
        .unwrap_or(0);
    env.storage()
        .instance()
        .set(&DataKey::RequestCount, &(current + 1));
    current
}

pub fn request_count(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&DataKey::RequestCount)
        .unwrap_or(0)
}

pub fn set_paused(env: &Env, paused: bool) {
    env.storage().instance().set(&DataKey::Paused, &paused);
    bump_instance(env);
}

pub fn is_paused(env: &Env) -> bool {
    env.storage()
        .instance()
        .get(&DataKey::Paused)
        .unwrap_or(false)
}

// ── Persistent Storage Helpers ───────────────────────────────────────

fn bump_persistent(env: &Env, key: &DataKey) {
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);
}

/// Write `profile` under its borrower, replacing any previous entry.
pub fn save_profile(env: &Env, profile: &Profile) {
    let key = DataKey::Profile(profile.borrower.clone());
    env.storage().persistent().set(&key, profile);
    bump_persistent(env, &key);
}

/// Load the profile for `borrower`, or `None` if it was never submitted.
pub fn load_profile(env: &Env, borrower: &Address) -> Option<Profile> {
    let key = DataKey::Profile(borrower.clone());
    let profile: Option<Profile> = env.storage().persistent().get(&key);
    if profile.is_some() {
        bump_persistent(env, &key);
    }
    profile
}

pub fn has_profile(env: &Env, borrower: &Address) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::Profile(borrower.clone()))
}

pub fn get_reward_balance(env: &Env, user: &Address) -> i128 {
    let key = DataKey::RewardBalance(user.clone());
    let balance: Option<i128> = env.storage().persistent().get(&key);
    match balance {
        Some(balance) => {
            bump_persistent(env, &key);
            balance
        }
        None => 0,
    }
}

pub fn set_reward_balance(env: &Env, user: &Address, balance: i128) {
    let key = DataKey::RewardBalance(user.clone());
    env.storage().persistent().set(&key, &balance);
    bump_persistent(env, &key);
}
