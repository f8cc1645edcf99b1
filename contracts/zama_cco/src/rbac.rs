//! # Roles
//!
//! Only the operator surface of the oracle is role-gated. Borrowers submit
//! their own profiles, anyone may trigger scoring and any lender may log a
//! decryption request; none of that needs a role.
//!
//! | Role                | Administer roles | Pause / token config | Distribute rewards |
//! |---------------------|------------------|----------------------|--------------------|
//! | `SuperAdmin`        | all but SuperAdmin | yes                | yes                |
//! | `Admin`             | all but SuperAdmin | yes                | yes                |
//! | `RewardDistributor` | no               | no                   | yes                |
//! | `Auditor`           | no               | no                   | no                 |
//!
//! An address holds at most one role. There is exactly one SuperAdmin seat;
//! it moves only through [`transfer_super_admin`] and cannot be revoked or
//! overwritten by a grant.
//!
//! Every change publishes a [`crate::events::RoleChanged`] event.

use soroban_sdk::{contracttype, panic_with_error, Address, Env};

use crate::{events, Error};

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Role {
    SuperAdmin,
    Admin,
    RewardDistributor,
    /// Off-chain reviewer. Holds no on-chain capability.
    Auditor,
}

impl Role {
    fn administers(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }

    fn distributes(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin | Role::RewardDistributor)
    }

    /// Whether a holder of `self` may hand out `role`. The SuperAdmin seat
    /// is never granted, only transferred.
    fn may_grant(&self, role: &Role) -> bool {
        match role {
            Role::SuperAdmin => false,
            _ => self.administers(),
        }
    }
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
enum RoleKey {
    SuperAdmin,
    Holder(Address),
}

fn load(env: &Env, account: &Address) -> Option<Role> {
    env.storage()
        .persistent()
        .get(&RoleKey::Holder(account.clone()))
}

fn store(env: &Env, account: &Address, role: Option<&Role>, by: &Address) {
    let key = RoleKey::Holder(account.clone());
    match role {
        Some(role) => env.storage().persistent().set(&key, role),
        None => env.storage().persistent().remove(&key),
    }
    events::emit_role_changed(env, account.clone(), role.cloned(), by.clone());
}

fn super_admin(env: &Env) -> Option<Address> {
    env.storage().persistent().get(&RoleKey::SuperAdmin)
}

fn require(env: &Env, account: &Address, allowed: impl Fn(&Role) -> bool) -> Role {
    match load(env, account) {
        Some(role) if allowed(&role) => role,
        _ => panic_with_error!(env, Error::NotAuthorized),
    }
}

/// Seat the first SuperAdmin. A second call fails with
/// `Error::AlreadyInitialized`.
pub fn init_super_admin(env: &Env, account: &Address) {
    if super_admin(env).is_some() {
        panic_with_error!(env, Error::AlreadyInitialized);
    }
    env.storage().persistent().set(&RoleKey::SuperAdmin, account);
    store(env, account, Some(&Role::SuperAdmin), account);
}

/// Give `target` the role `role`, replacing whatever it held.
pub fn grant_role(env: &Env, caller: &Address, target: &Address, role: Role) {
    caller.require_auth();
    require(env, caller, |held| held.may_grant(&role));

    if super_admin(env).as_ref() == Some(target) {
        panic_with_error!(env, Error::NotAuthorized);
    }
    store(env, target, Some(&role), caller);
}

/// Strip `target` of its role. No-op, and no event, if it holds none.
pub fn revoke_role(env: &Env, caller: &Address, target: &Address) {
    caller.require_auth();
    require(env, caller, Role::administers);

    if super_admin(env).as_ref() == Some(target) {
        panic_with_error!(env, Error::NotAuthorized);
    }
    if load(env, target).is_some() {
        store(env, target, None, caller);
    }
}

/// Move the SuperAdmin seat from `current` to `next`. Only the seat holder
/// may call this; `next` loses whatever role it held before.
pub fn transfer_super_admin(env: &Env, current: &Address, next: &Address) {
    current.require_auth();
    if super_admin(env).as_ref() != Some(current) {
        panic_with_error!(env, Error::NotAuthorized);
    }
    require(env, current, |held| *held == Role::SuperAdmin);

    store(env, current, None, current);
    env.storage().persistent().set(&RoleKey::SuperAdmin, next);
    store(env, next, Some(&Role::SuperAdmin), current);
}

pub fn require_admin_or_above(env: &Env, account: &Address) {
    require(env, account, Role::administers);
}

pub fn require_can_distribute(env: &Env, account: &Address) {
    require(env, account, Role::distributes);
}

pub fn role_of(env: &Env, account: Address) -> Option<Role> {
    load(env, &account)
}

pub fn has_role(env: &Env, account: Address, role: Role) -> bool {
    load(env, &account) == Some(role)
}
