//! On-chain event payloads. These events are the only observable side channel
//! of the contract; indexers and the relayer consume them in ledger order.

use soroban_sdk::{contracttype, symbol_short, Address, BytesN, Env};

use crate::rbac::Role;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProfileSubmitted {
    pub borrower: Address,
    /// sha256 over the three submitted handles.
    pub data_digest: BytesN<32>,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreditScoreComputed {
    pub borrower: Address,
    pub encrypted_tier: BytesN<32>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecryptionRequested {
    pub borrower: Address,
    pub lender: Address,
    pub timestamp: u64,
    /// Contract-wide request sequence number.
    pub seq: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RewardDistributed {
    pub user: Address,
    pub amount: i128,
}

/// `role` is `None` when the account lost its role.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoleChanged {
    pub account: Address,
    pub role: Option<Role>,
    pub by: Address,
}

pub fn emit_profile_submitted(
    env: &Env,
    borrower: Address,
    data_digest: BytesN<32>,
    timestamp: u64,
) {
    let topics = (symbol_short!("submitted"), borrower.clone());
    let data = ProfileSubmitted {
        borrower,
        data_digest,
        timestamp,
    };
    env.events().publish(topics, data);
}

pub fn emit_credit_score_computed(env: &Env, borrower: Address, encrypted_tier: BytesN<32>) {
    let topics = (symbol_short!("scored"), borrower.clone());
    let data = CreditScoreComputed {
        borrower,
        encrypted_tier,
    };
    env.events().publish(topics, data);
}

pub fn emit_decryption_requested(
    env: &Env,
    borrower: Address,
    lender: Address,
    timestamp: u64,
    seq: u64,
) {
    let topics = (symbol_short!("decrypt"), borrower.clone(), lender.clone());
    let data = DecryptionRequested {
        borrower,
        lender,
        timestamp,
        seq,
    };
    env.events().publish(topics, data);
}

pub fn emit_reward_distributed(env: &Env, user: Address, amount: i128) {
    let topics = (symbol_short!("reward"), user.clone());
    let data = RewardDistributed { user, amount };
    env.events().publish(topics, data);
}

pub fn emit_protocol_paused(env: &Env, by: Address) {
    env.events().publish((symbol_short!("paused"),), by);
}

pub fn emit_protocol_unpaused(env: &Env, by: Address) {
    env.events().publish((symbol_short!("unpaused"),), by);
}

pub fn emit_role_changed(env: &Env, account: Address, role: Option<Role>, by: Address) {
    let topics = (symbol_short!("role"), account.clone());
    env.events().publish(topics, RoleChanged { account, role, by });
}
