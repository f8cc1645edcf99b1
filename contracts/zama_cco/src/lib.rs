//! # ZamaCCO: Confidential Credit Oracle Contract
//!
//! Stores FHE-encrypted borrower financial profiles, derives an encrypted
//! credit tier homomorphically, and records every decryption request in the
//! event log. The contract never holds plaintext income, collateral, or debt.
//!
//! | Phase        | Entry Point(s)                                          |
//! |--------------|---------------------------------------------------------|
//! | Bootstrap    | [`ZamaCco::init`]                                       |
//! | Role admin   | `grant_role`, `revoke_role`, `transfer_super_admin`     |
//! | Submission   | [`ZamaCco::submit_encrypted_data`]                      |
//! | Scoring      | [`ZamaCco::compute_credit_score`]                       |
//! | Decryption   | [`ZamaCco::request_decryption`]                         |
//! | Rewards      | [`ZamaCco::distribute_reward`], `set_reward_token`      |
//! | Queries      | `get_profile`, `get_public_credit_tier`, `reward_balance`, `role_of` |
//!
//! ## Confidentiality boundary
//!
//! `request_decryption` does **not** consult any access list. The chain keeps
//! an immutable record of who asked; the off-chain relayer decides whether the
//! tier is actually decrypted for that lender.
//!
//! ## Architecture
//!
//! Authorization is delegated to [`rbac`], storage to `storage`, homomorphic
//! evaluation to the executor behind [`fhe::FheExecutorClient`], and the
//! circuit itself to [`scoring`]. This file holds the entry points and event
//! emissions.

#![no_std]

use soroban_sdk::{
    contract, contracterror, contractimpl, panic_with_error, token, Address, Bytes, BytesN, Env,
};

pub mod events;
pub mod fhe;
pub mod rbac;
pub mod scoring;
mod storage;
mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod mock_fhe;
#[cfg(test)]
mod test_events;

use fhe::FheExecutorClient;
pub use rbac::Role;
pub use types::{CreditTier, Profile};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    /// No profile has been submitted for the borrower.
    NotFound = 1,
    /// The executor rejected an input handle or its proof.
    InvalidProof = 2,
    /// A profile exists but no tier has been computed for it yet.
    TierNotComputed = 3,
    NotAuthorized = 4,
    AlreadyInitialized = 5,
    NotInitialized = 6,
    InvalidAmount = 7,
    Overflow = 8,
    ProtocolPaused = 9,
}

#[contract]
pub struct ZamaCco;

#[contractimpl]
impl ZamaCco {
    // ─────────────────────────────────────────────────────────
    // Initialisation
    // ─────────────────────────────────────────────────────────

    /// Initialise the contract: set the first SuperAdmin and bind the FHE
    /// executor. Subsequent calls panic with `Error::AlreadyInitialized`.
    pub fn init(env: Env, super_admin: Address, fhe_executor: Address) {
        super_admin.require_auth();
        if storage::has_fhe_executor(&env) {
            panic_with_error!(&env, Error::AlreadyInitialized);
        }
        rbac::init_super_admin(&env, &super_admin);
        storage::set_fhe_executor(&env, &fhe_executor);
    }

    pub fn fhe_executor(env: Env) -> Address {
        Self::executor_address(&env)
    }

    // ─────────────────────────────────────────────────────────
    // Role management
    // ─────────────────────────────────────────────────────────

    /// Grant `role` to `target`. `caller` must hold `SuperAdmin` or `Admin`;
    /// only `SuperAdmin` can grant `SuperAdmin`.
    pub fn grant_role(env: Env, caller: Address, target: Address, role: Role) {
        rbac::grant_role(&env, &caller, &target, role);
    }

    pub fn revoke_role(env: Env, caller: Address, target: Address) {
        rbac::revoke_role(&env, &caller, &target);
    }

    pub fn transfer_super_admin(env: Env, current_super_admin: Address, new_super_admin: Address) {
        rbac::transfer_super_admin(&env, &current_super_admin, &new_super_admin);
    }

    pub fn role_of(env: Env, address: Address) -> Option<Role> {
        rbac::role_of(&env, address)
    }

    pub fn has_role(env: Env, address: Address, role: Role) -> bool {
        rbac::has_role(&env, address, role)
    }

    // ─────────────────────────────────────────────────────────
    // Emergency Control
    // ─────────────────────────────────────────────────────────

    /// Halt submissions, scoring, decryption requests and reward payouts.
    /// Reads keep working.
    pub fn pause(env: Env, caller: Address) {
        caller.require_auth();
        rbac::require_admin_or_above(&env, &caller);
        storage::set_paused(&env, true);
        events::emit_protocol_paused(&env, caller);
    }

    pub fn unpause(env: Env, caller: Address) {
        caller.require_auth();
        rbac::require_admin_or_above(&env, &caller);
        storage::set_paused(&env, false);
        events::emit_protocol_unpaused(&env, caller);
    }

    pub fn is_paused(env: Env) -> bool {
        storage::is_paused(&env)
    }

    // ─────────────────────────────────────────────────────────
    // Profile store
    // ─────────────────────────────────────────────────────────

    /// Store `borrower`'s encrypted profile.
    ///
    /// Every handle is checked against `input_proof` by the FHE executor;
    /// a single rejection panics with `Error::InvalidProof`. Any previous
    /// profile, including its computed tier, is replaced wholesale.
    pub fn submit_encrypted_data(
        env: Env,
        borrower: Address,
        encrypted_income: BytesN<32>,
        encrypted_collateral: BytesN<32>,
        encrypted_debt: BytesN<32>,
        input_proof: Bytes,
    ) {
        Self::require_not_paused(&env);
        borrower.require_auth();

        let fhe = Self::executor(&env);
        for handle in [&encrypted_income, &encrypted_collateral, &encrypted_debt] {
            if !fhe.verify_input(&borrower, handle, &input_proof) {
                panic_with_error!(&env, Error::InvalidProof);
            }
        }

        let mut packed = Bytes::new(&env);
        packed.extend_from_array(&encrypted_income.to_array());
        packed.extend_from_array(&encrypted_collateral.to_array());
        packed.extend_from_array(&encrypted_debt.to_array());
        let data_digest: BytesN<32> = env.crypto().sha256(&packed).to_bytes();

        let now = env.ledger().timestamp();
        let profile = Profile {
            borrower: borrower.clone(),
            encrypted_income,
            encrypted_collateral,
            encrypted_debt,
            input_proof,
            submitted_at: now,
            encrypted_tier: None,
            computed_at: None,
        };
        storage::save_profile(&env, &profile);

        events::emit_profile_submitted(&env, borrower, data_digest, now);
    }

    /// Return the stored profile. Panics with `Error::NotFound` if absent.
    pub fn get_profile(env: Env, borrower: Address) -> Profile {
        Self::require_profile(&env, &borrower)
    }

    pub fn has_profile(env: Env, borrower: Address) -> bool {
        storage::has_profile(&env, &borrower)
    }

    // ─────────────────────────────────────────────────────────
    // Scoring
    // ─────────────────────────────────────────────────────────

    /// Evaluate the scoring circuit over `borrower`'s ciphertexts and store
    /// the encrypted tier.
    ///
    /// Open to every caller: triggering the computation reveals nothing, and
    /// access to the result is gated by the relayer.
    pub fn compute_credit_score(env: Env, borrower: Address) -> BytesN<32> {
        Self::require_not_paused(&env);
        let mut profile = Self::require_profile(&env, &borrower);

        let fhe = Self::executor(&env);
        let encrypted_tier = scoring::compute_encrypted_tier(&fhe, &profile);
        fhe.allow(&encrypted_tier, &env.current_contract_address());

        profile.encrypted_tier = Some(encrypted_tier.clone());
        profile.computed_at = Some(env.ledger().timestamp());
        storage::save_profile(&env, &profile);

        events::emit_credit_score_computed(&env, borrower, encrypted_tier.clone());
        encrypted_tier
    }

    /// Handle of the encrypted tier: the only tier-adjacent value the
    /// contract exposes.
    ///
    /// Panics with `Error::NotFound` without a profile and with
    /// `Error::TierNotComputed` before the first scoring of the current
    /// submission.
    pub fn get_public_credit_tier(env: Env, borrower: Address) -> BytesN<32> {
        let profile = Self::require_profile(&env, &borrower);
        match profile.encrypted_tier {
            Some(tier) => tier,
            None => panic_with_error!(&env, Error::TierNotComputed),
        }
    }

    // ─────────────────────────────────────────────────────────
    // Decryption requests
    // ─────────────────────────────────────────────────────────

    /// Log that `lender` wants `borrower`'s tier decrypted.
    ///
    /// No access check happens here: the event is the audit record and the
    /// relayer enforces the borrower's grants. Returns the request sequence
    /// number carried by the event.
    pub fn request_decryption(env: Env, lender: Address, borrower: Address) -> u64 {
        Self::require_not_paused(&env);
        lender.require_auth();
        Self::require_profile(&env, &borrower);

        let seq = storage::next_request_seq(&env);
        events::emit_decryption_requested(&env, borrower, lender, env.ledger().timestamp(), seq);
        seq
    }

    pub fn request_count(env: Env) -> u64 {
        storage::request_count(&env)
    }

    // ─────────────────────────────────────────────────────────
    // Rewards
    // ─────────────────────────────────────────────────────────

    /// Set the token paid out by `distribute_reward`. Without one, rewards
    /// are only recorded in the ledger.
    pub fn set_reward_token(env: Env, caller: Address, token: Address) {
        caller.require_auth();
        rbac::require_admin_or_above(&env, &caller);
        storage::set_reward_token(&env, &token);
    }

    pub fn reward_token(env: Env) -> Option<Address> {
        storage::get_reward_token(&env)
    }

    /// Credit `amount` to `user`, transferring the reward token from the
    /// contract's own balance when one is configured.
    ///
    /// `caller` must hold `RewardDistributor`, `Admin`, or `SuperAdmin`.
    pub fn distribute_reward(env: Env, caller: Address, user: Address, amount: i128) {
        Self::require_not_paused(&env);
        caller.require_auth();
        rbac::require_can_distribute(&env, &caller);

        if amount <= 0 {
            panic_with_error!(&env, Error::InvalidAmount);
        }

        let balance = storage::get_reward_balance(&env, &user);
        let new_balance = match balance.checked_add(amount) {
            Some(value) => value,
            None => panic_with_error!(&env, Error::Overflow),
        };

        if let Some(token) = storage::get_reward_token(&env) {
            let from = env.current_contract_address();
            token::Client::new(&env, &token).transfer(&from, &user, &amount);
        }

        storage::set_reward_balance(&env, &user, new_balance);
        events::emit_reward_distributed(&env, user, amount);
    }

    pub fn reward_balance(env: Env, user: Address) -> i128 {
        storage::get_reward_balance(&env, &user)
    }

    // ─────────────────────────────────────────────────────────
    // Internal Helpers
    // ─────────────────────────────────────────────────────────

    fn require_not_paused(env: &Env) {
        if storage::is_paused(env) {
            panic_with_error!(env, Error::ProtocolPaused);
        }
    }

    fn require_profile(env: &Env, borrower: &Address) -> Profile {
        match storage::load_profile(env, borrower) {
            Some(profile) => profile,
            None => panic_with_error!(env, Error::NotFound),
        }
    }

    fn executor_address(env: &Env) -> Address {
        match storage::get_fhe_executor(env) {
            Some(address) => address,
            None => panic_with_error!(env, Error::NotInitialized),
        }
    }

    fn executor(env: &Env) -> FheExecutorClient<'_> {
        FheExecutorClient::new(env, &Self::executor_address(env))
    }
}
