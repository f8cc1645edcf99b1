//! Decryption request fulfillment.
//!
//! Each request moves through a small state machine:
//!
//! ```text
//! Requested ──ACL ok──► Forwarded ──gateway ok──► Decrypted
//!     │                     │
//!     └──ACL denied──► Rejected ◄──permanent failure / ACL revoked
//! ```
//!
//! `Decrypted` and `Rejected` are terminal and cached: a repeated call for
//! the same [`RequestId`] returns the cached outcome without touching the
//! gateway again. The cache keeps the `max_cached_requests` most recent
//! terminal requests. A request whose transient failures exhaust the retry
//! budget drops back to `Requested` and is forgotten once no caller waits
//! on it, so a later call starts afresh.
//!
//! # Invariants
//!
//! - The gateway is never called unless the ACL grants access at intake.
//! - The gateway only sees the tier handle the contract currently holds for
//!   the request's borrower.
//! - Both checks are repeated immediately before every forward attempt.
//! - Every gateway call is bounded by `gateway_timeout`.
//! - Concurrent calls for the same request are serialized; only one of them
//!   reaches the gateway.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::acl::{AccessControlList, AccountId};
use crate::config::RelayerConfig;
use crate::error::{EventSourceError, GatewayError, RelayerError};
use crate::gateway::{
    update_str, CiphertextHandle, CreditTier, DecryptionGateway, DecryptionProof, GatewayRequest,
};

const REQUEST_ID_CONTEXT: &str = "zama-cco relayer 2024 request id v1";

/// Content-derived request identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId([u8; 32]);

impl RequestId {
    /// blake3 over the borrower, lender, tier handle and on-chain sequence
    /// number of the request.
    #[must_use]
    pub fn derive(
        borrower: &AccountId,
        lender: &AccountId,
        handle: &CiphertextHandle,
        seq: u64,
    ) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(REQUEST_ID_CONTEXT);
        update_str(&mut hasher, borrower.as_str());
        update_str(&mut hasher, lender.as_str());
        hasher.update(handle.as_bytes());
        hasher.update(&seq.to_be_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", &self.to_hex()[..16])
    }
}

/// A lender's request to learn one borrower's tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionRequest {
    pub borrower: AccountId,
    pub lender: AccountId,
    pub encrypted_tier: CiphertextHandle,
    /// Sequence number assigned by the contract's `request_decryption`.
    pub seq: u64,
}

impl DecryptionRequest {
    #[must_use]
    pub fn id(&self) -> RequestId {
        RequestId::derive(&self.borrower, &self.lender, &self.encrypted_tier, self.seq)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionOutcome {
    pub request_id: RequestId,
    pub borrower: AccountId,
    pub lender: AccountId,
    pub encrypted_tier: CiphertextHandle,
    pub tier: CreditTier,
    pub proof: DecryptionProof,
}

impl DecryptionOutcome {
    /// # Errors
    ///
    /// Returns [`RelayerError::InvalidProof`] if the proof does not bind
    /// this outcome's parameters.
    pub fn verify(&self) -> Result<(), RelayerError> {
        if self.proof.verify(
            &self.request_id,
            &self.borrower,
            &self.lender,
            &self.encrypted_tier,
            self.tier,
        ) {
            Ok(())
        } else {
            Err(RelayerError::InvalidProof {
                request_id: self.request_id.to_hex(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Requested,
    /// In flight at the gateway; `attempt` counts from 1.
    Forwarded { attempt: u32 },
    Decrypted,
    Rejected,
}

impl RequestState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Decrypted | Self::Rejected)
    }
}

/// Contract state reads the relayer needs.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current encrypted tier handle of `borrower`, or `None` if the
    /// borrower has no profile or it has not been scored.
    async fn encrypted_tier(
        &self,
        borrower: &AccountId,
    ) -> Result<Option<CiphertextHandle>, EventSourceError>;
}

#[derive(Debug)]
struct RequestRecord {
    state: RequestState,
    result: Option<Result<DecryptionOutcome, RelayerError>>,
}

impl RequestRecord {
    const fn new() -> Self {
        Self {
            state: RequestState::Requested,
            result: None,
        }
    }

    fn reject(&mut self, err: RelayerError) -> Result<DecryptionOutcome, RelayerError> {
        self.state = RequestState::Rejected;
        self.result = Some(Err(err.clone()));
        Err(err)
    }

    /// Like [`Self::reject`], except that a failed chain read leaves the
    /// request open.
    fn refuse(&mut self, err: RelayerError) -> Result<DecryptionOutcome, RelayerError> {
        if matches!(err, RelayerError::EventSource(_)) {
            self.state = RequestState::Requested;
            return Err(err);
        }
        self.reject(err)
    }
}

type Slot = Arc<Mutex<RequestRecord>>;

#[derive(Default)]
struct RequestTable {
    slots: HashMap<RequestId, Slot>,
    /// Terminal requests, oldest first.
    settled: VecDeque<RequestId>,
}

/// Gatekeeper between lenders and the decryption gateway.
pub struct Relayer {
    acl: Arc<AccessControlList>,
    reader: Arc<dyn ChainReader>,
    gateway: Arc<dyn DecryptionGateway>,
    config: RelayerConfig,
    requests: Mutex<RequestTable>,
}

impl fmt::Debug for Relayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relayer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Relayer {
    /// # Errors
    ///
    /// Returns [`RelayerError::Config`] if `config` fails validation.
    pub fn new(
        acl: Arc<AccessControlList>,
        reader: Arc<dyn ChainReader>,
        gateway: Arc<dyn DecryptionGateway>,
        config: RelayerConfig,
    ) -> Result<Self, RelayerError> {
        config.validate()?;
        Ok(Self {
            acl,
            reader,
            gateway,
            config,
            requests: Mutex::new(RequestTable::default()),
        })
    }

    #[must_use]
    pub fn acl(&self) -> &AccessControlList {
        &self.acl
    }

    pub async fn state(&self, id: &RequestId) -> Option<RequestState> {
        let slot = self.requests.lock().await.slots.get(id).cloned()?;
        let record = slot.lock().await;
        Some(record.state)
    }

    /// Number of requests currently held in the request table.
    pub async fn tracked_requests(&self) -> usize {
        self.requests.lock().await.slots.len()
    }

    /// The tier handle the contract currently holds for `borrower`.
    ///
    /// # Errors
    ///
    /// - [`RelayerError::NotFound`] if the borrower has no scored profile.
    /// - [`RelayerError::EventSource`] if the chain cannot be read.
    pub async fn current_tier(
        &self,
        borrower: &AccountId,
    ) -> Result<CiphertextHandle, RelayerError> {
        self.reader
            .encrypted_tier(borrower)
            .await?
            .ok_or_else(|| RelayerError::NotFound {
                borrower: borrower.to_string(),
            })
    }

    /// Run `request` through the ACL gate and the gateway.
    ///
    /// # Errors
    ///
    /// - [`RelayerError::AccessDenied`] if the lender has no valid grant at
    ///   intake or loses it between attempts, or if `encrypted_tier` is not
    ///   the borrower's current tier handle.
    /// - [`RelayerError::NotFound`] if the borrower has no scored profile.
    /// - [`RelayerError::EventSource`] if the borrower's handle cannot be
    ///   read. The request stays open.
    /// - [`RelayerError::GatewayRejected`] on a permanent gateway refusal.
    /// - [`RelayerError::GatewayTimeout`] or [`RelayerError::NetworkError`]
    ///   once `max_attempts` transient failures have been seen.
    pub async fn fulfill_decryption(
        &self,
        request: &DecryptionRequest,
    ) -> Result<DecryptionOutcome, RelayerError> {
        let request_id = request.id();
        let slot = {
            let mut requests = self.requests.lock().await;
            requests
                .slots
                .entry(request_id)
                .or_insert_with(|| Arc::new(Mutex::new(RequestRecord::new())))
                .clone()
        };
        let mut record = slot.lock().await;

        if let Some(result) = &record.result {
            debug!(%request_id, state = ?record.state, "returning cached result");
            return result.clone();
        }

        let result = self.forward(&mut record, request, request_id).await;
        let terminal = record.state.is_terminal();
        drop(record);
        self.settle(request_id, &slot, terminal).await;
        result
    }

    async fn forward(
        &self,
        record: &mut RequestRecord,
        request: &DecryptionRequest,
        request_id: RequestId,
    ) -> Result<DecryptionOutcome, RelayerError> {
        let gateway_request = GatewayRequest {
            request_id,
            handle: request.encrypted_tier,
            lender: request.lender.clone(),
        };
        let gateway_timeout = self.config.gateway_timeout();

        let mut attempt = 0;
        loop {
            attempt += 1;

            if let Err(err) = self.authorize(request).await {
                warn!(
                    %request_id,
                    attempt,
                    borrower = %request.borrower,
                    lender = %request.lender,
                    error = %err,
                    "decryption request not forwarded"
                );
                return record.refuse(err);
            }

            record.state = RequestState::Forwarded { attempt };
            debug!(
                %request_id,
                attempt,
                handle = %request.encrypted_tier,
                "forwarding to gateway"
            );

            let call = timeout(gateway_timeout, self.gateway.decrypt_tier(&gateway_request));
            let err = match call.await {
                Ok(Ok(response)) => {
                    let outcome = DecryptionOutcome {
                        request_id,
                        borrower: request.borrower.clone(),
                        lender: request.lender.clone(),
                        encrypted_tier: request.encrypted_tier,
                        tier: response.tier,
                        proof: DecryptionProof::bind(
                            &request_id,
                            &request.borrower,
                            &request.lender,
                            &request.encrypted_tier,
                            response.tier,
                            response.attestation,
                        ),
                    };
                    record.state = RequestState::Decrypted;
                    record.result = Some(Ok(outcome.clone()));
                    info!(%request_id, attempt, tier = %outcome.tier, "tier decrypted");
                    return Ok(outcome);
                },
                Ok(Err(gateway_err)) => self.map_gateway_error(gateway_err),
                Err(_elapsed) => RelayerError::GatewayTimeout {
                    timeout_ms: self.config.gateway_timeout_ms,
                },
            };

            if !err.is_retryable() {
                warn!(%request_id, attempt, error = %err, "gateway refused request");
                return record.reject(err);
            }

            if attempt >= self.config.max_attempts {
                warn!(%request_id, attempt, error = %err, "retry budget exhausted");
                record.state = RequestState::Requested;
                return Err(err);
            }

            let delay = self.config.backoff_delay(attempt);
            debug!(
                %request_id,
                attempt,
                error = %err,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying after backoff"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// The lender must hold a live grant, and the handle must be the one the
    /// contract holds for the borrower right now.
    async fn authorize(&self, request: &DecryptionRequest) -> Result<(), RelayerError> {
        if !self.acl.has_access(&request.borrower, &request.lender) {
            return Err(self.access_denied(request));
        }
        let current = self.current_tier(&request.borrower).await?;
        if current != request.encrypted_tier {
            return Err(self.access_denied(request));
        }
        Ok(())
    }

    /// Record where a finished call left its request. Terminal requests join
    /// the bounded cache; open ones are dropped once nobody waits on them.
    async fn settle(&self, request_id: RequestId, slot: &Slot, terminal: bool) {
        let mut table = self.requests.lock().await;
        if terminal {
            table.settled.push_back(request_id);
            while table.settled.len() > self.config.max_cached_requests {
                if let Some(oldest) = table.settled.pop_front() {
                    table.slots.remove(&oldest);
                    debug!(request_id = %oldest, "evicted cached result");
                }
            }
            return;
        }
        let idle = table
            .slots
            .get(&request_id)
            .is_some_and(|held| Arc::ptr_eq(held, slot) && Arc::strong_count(slot) == 2);
        if idle {
            table.slots.remove(&request_id);
        }
    }

    fn access_denied(&self, request: &DecryptionRequest) -> RelayerError {
        RelayerError::AccessDenied {
            borrower: request.borrower.to_string(),
            lender: request.lender.to_string(),
        }
    }

    fn map_gateway_error(&self, err: GatewayError) -> RelayerError {
        match err {
            GatewayError::Timeout => RelayerError::GatewayTimeout {
                timeout_ms: self.config.gateway_timeout_ms,
            },
            GatewayError::Network(message) => RelayerError::NetworkError(message),
            GatewayError::Rejected(message) => RelayerError::GatewayRejected(message),
        }
    }
}
