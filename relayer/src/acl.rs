//! Borrower-granted access control list.
//!
//! A borrower grants a lender the right to have the borrower's credit tier
//! decrypted, optionally for a limited number of days. Grants are keyed by
//! the `(borrower, lender)` pair; re-granting updates the existing record,
//! revoking only flips `is_active`, and nothing is ever deleted so the
//! history stays inspectable through [`AccessControlList::permissions`].
//!
//! Expiry is evaluated lazily: the first [`AccessControlList::has_access`]
//! call that observes an elapsed `expires_at` deactivates the record.
//!
//! Addresses compare case-insensitively. [`AccountId`] normalizes to
//! lowercase on construction.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A chain address, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    #[must_use]
    pub fn new(address: &str) -> Self {
        Self(address.trim().to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One lender's grant from one borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPermission {
    pub lender: AccountId,
    pub granted_at: DateTime<Utc>,
    /// `None` means the grant never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl AccessPermission {
    /// A grant stays valid through its `expires_at` instant and lapses
    /// strictly after it.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at < now)
    }

    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Persistence for grants. Implementations must make each method atomic with
/// respect to the others.
pub trait PermissionStore: Send + Sync {
    fn load(&self, borrower: &AccountId, lender: &AccountId) -> Option<AccessPermission>;

    /// Insert the grant, or replace the borrower's existing grant for the
    /// same lender in place.
    fn upsert(&self, borrower: &AccountId, permission: AccessPermission);

    /// Mark the grant inactive. Returns `false` if no grant exists.
    fn deactivate(&self, borrower: &AccountId, lender: &AccountId) -> bool;

    /// Mark the grant inactive only if it is still active and expired at
    /// `now`. Returns whether it was deactivated.
    fn deactivate_expired(
        &self,
        borrower: &AccountId,
        lender: &AccountId,
        now: DateTime<Utc>,
    ) -> bool;

    /// All grants of `borrower`, in first-grant order.
    fn list(&self, borrower: &AccountId) -> Vec<AccessPermission>;
}

/// Process-local [`PermissionStore`].
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    grants: RwLock<HashMap<AccountId, Vec<AccessPermission>>>,
}

impl InMemoryPermissionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionStore for InMemoryPermissionStore {
    fn load(&self, borrower: &AccountId, lender: &AccountId) -> Option<AccessPermission> {
        let grants = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        grants
            .get(borrower)?
            .iter()
            .find(|p| &p.lender == lender)
            .cloned()
    }

    fn upsert(&self, borrower: &AccountId, permission: AccessPermission) {
        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        let entries = grants.entry(borrower.clone()).or_default();
        match entries.iter_mut().find(|p| p.lender == permission.lender) {
            Some(existing) => *existing = permission,
            None => entries.push(permission),
        }
    }

    fn deactivate(&self, borrower: &AccountId, lender: &AccountId) -> bool {
        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        let Some(existing) = grants
            .get_mut(borrower)
            .and_then(|entries| entries.iter_mut().find(|p| &p.lender == lender))
        else {
            return false;
        };
        existing.is_active = false;
        true
    }

    fn deactivate_expired(
        &self,
        borrower: &AccountId,
        lender: &AccountId,
        now: DateTime<Utc>,
    ) -> bool {
        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        let Some(existing) = grants
            .get_mut(borrower)
            .and_then(|entries| entries.iter_mut().find(|p| &p.lender == lender))
        else {
            return false;
        };
        if existing.is_active && existing.is_expired_at(now) {
            existing.is_active = false;
            return true;
        }
        false
    }

    fn list(&self, borrower: &AccountId) -> Vec<AccessPermission> {
        let grants = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        grants.get(borrower).cloned().unwrap_or_default()
    }
}

// =============================================================================
// Clock
// =============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Saturates at the ends of the representable range.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        let limit = if by < Duration::zero() {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        };
        *now = now.checked_add_signed(by).unwrap_or(limit);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// AccessControlList
// =============================================================================

pub struct AccessControlList {
    store: Arc<dyn PermissionStore>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for AccessControlList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessControlList").finish_non_exhaustive()
    }
}

impl AccessControlList {
    #[must_use]
    pub fn new(store: Arc<dyn PermissionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// In-memory store driven by the system clock.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryPermissionStore::new()), Arc::new(SystemClock))
    }

    /// Grant (or re-grant) `lender` access to `borrower`'s tier.
    ///
    /// `expiry_days` of `None` or `Some(0)` yields a grant that never
    /// expires. An expiry beyond the representable range is clamped to
    /// [`DateTime::<Utc>::MAX_UTC`]. A re-grant resets `granted_at`,
    /// replaces the expiry and reactivates a revoked or lapsed record.
    pub fn grant_access(
        &self,
        borrower: &AccountId,
        lender: &AccountId,
        expiry_days: Option<u32>,
    ) -> AccessPermission {
        let now = self.clock.now();
        let expires_at = expiry_days
            .filter(|days| *days > 0)
            .map(|days| {
                Duration::try_days(i64::from(days))
                    .and_then(|window| now.checked_add_signed(window))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            });
        let permission = AccessPermission {
            lender: lender.clone(),
            granted_at: now,
            expires_at,
            is_active: true,
        };
        self.store.upsert(borrower, permission.clone());
        info!(%borrower, %lender, ?expires_at, "access granted");
        permission
    }

    /// Returns `false` when the borrower never granted this lender anything.
    pub fn revoke_access(&self, borrower: &AccountId, lender: &AccountId) -> bool {
        let revoked = self.store.deactivate(borrower, lender);
        if revoked {
            info!(%borrower, %lender, "access revoked");
        }
        revoked
    }

    pub fn has_access(&self, borrower: &AccountId, lender: &AccountId) -> bool {
        let Some(permission) = self.store.load(borrower, lender) else {
            return false;
        };
        if !permission.is_active {
            return false;
        }
        let now = self.clock.now();
        if permission.is_expired_at(now) {
            if self.store.deactivate_expired(borrower, lender, now) {
                debug!(%borrower, %lender, "grant expired");
            }
            return false;
        }
        true
    }

    #[must_use]
    pub fn permissions(&self, borrower: &AccountId) -> Vec<AccessPermission> {
        self.store.list(borrower)
    }
}
