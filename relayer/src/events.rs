//! Contract event log subscription.
//!
//! [`EventSource`] is the RPC collaborator: a range query over the
//! contract's events plus the current chain head. [`EventPoller`] walks the
//! chain in bounded block windows and pushes matching events, in
//! `(block_number, log_index)` order and at most once each, into a tokio
//! channel. Its cursor can be persisted and handed back to resume.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::acl::AccountId;
use crate::config::RelayerConfig;
use crate::error::EventSourceError;
use crate::gateway::CiphertextHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEventKind {
    ProfileSubmitted {
        borrower: AccountId,
        data_digest: [u8; 32],
        timestamp: u64,
    },
    CreditScoreComputed {
        borrower: AccountId,
        encrypted_tier: CiphertextHandle,
    },
    DecryptionRequested {
        borrower: AccountId,
        lender: AccountId,
        timestamp: u64,
        seq: u64,
    },
    RewardDistributed {
        user: AccountId,
        amount: i128,
    },
}

/// Discriminant of [`ChainEventKind`], for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ProfileSubmitted,
    CreditScoreComputed,
    DecryptionRequested,
    RewardDistributed,
}

impl ChainEventKind {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ProfileSubmitted { .. } => EventKind::ProfileSubmitted,
            Self::CreditScoreComputed { .. } => EventKind::CreditScoreComputed,
            Self::DecryptionRequested { .. } => EventKind::DecryptionRequested,
            Self::RewardDistributed { .. } => EventKind::RewardDistributed,
        }
    }

    /// The borrower the event concerns. Reward events have none.
    #[must_use]
    pub const fn borrower(&self) -> Option<&AccountId> {
        match self {
            Self::ProfileSubmitted { borrower, .. }
            | Self::CreditScoreComputed { borrower, .. }
            | Self::DecryptionRequested { borrower, .. } => Some(borrower),
            Self::RewardDistributed { .. } => None,
        }
    }

    #[must_use]
    pub const fn lender(&self) -> Option<&AccountId> {
        match self {
            Self::DecryptionRequested { lender, .. } => Some(lender),
            _ => None,
        }
    }
}

/// One contract event with its chain coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub block_number: u64,
    pub log_index: u32,
    pub tx_hash: String,
    pub kind: ChainEventKind,
}

impl ChainEvent {
    #[must_use]
    pub const fn position(&self) -> (u64, u32) {
        (self.block_number, self.log_index)
    }
}

/// Which events to fetch. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub borrower: Option<AccountId>,
    pub lender: Option<AccountId>,
}

impl EventFilter {
    #[must_use]
    pub fn decryption_requests() -> Self {
        Self {
            kind: Some(EventKind::DecryptionRequested),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_borrower(mut self, borrower: AccountId) -> Self {
        self.borrower = Some(borrower);
        self
    }

    #[must_use]
    pub fn for_lender(mut self, lender: AccountId) -> Self {
        self.lender = Some(lender);
        self
    }

    #[must_use]
    pub fn matches(&self, event: &ChainEvent) -> bool {
        if self.kind.is_some_and(|kind| kind != event.kind.kind()) {
            return false;
        }
        if let Some(borrower) = &self.borrower {
            if event.kind.borrower() != Some(borrower) {
                return false;
            }
        }
        if let Some(lender) = &self.lender {
            if event.kind.lender() != Some(lender) {
                return false;
            }
        }
        true
    }
}

/// Read access to the contract's event log.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn latest_block(&self) -> Result<u64, EventSourceError>;

    /// Events matching `filter` with `from <= block_number <= to`.
    async fn query_events(
        &self,
        filter: &EventFilter,
        from: u64,
        to: u64,
    ) -> Result<Vec<ChainEvent>, EventSourceError>;
}

/// Ordered, de-duplicating poller over an [`EventSource`].
pub struct EventPoller {
    source: Arc<dyn EventSource>,
    filter: EventFilter,
    next_block: u64,
    last_delivered: Option<(u64, u32)>,
    max_block_range: u64,
    poll_interval: std::time::Duration,
}

impl EventPoller {
    /// Start scanning at `start_block` (inclusive).
    #[must_use]
    pub fn new(
        source: Arc<dyn EventSource>,
        filter: EventFilter,
        start_block: u64,
        config: &RelayerConfig,
    ) -> Self {
        Self {
            source,
            filter,
            next_block: start_block,
            last_delivered: None,
            max_block_range: config.max_block_range.max(1),
            poll_interval: config.poll_interval(),
        }
    }

    /// First block not yet scanned. Persist it to resume later.
    ///
    /// Once `u64::MAX` has been scanned the cursor stays there; later polls
    /// rescan that block without re-sending what was already delivered.
    #[must_use]
    pub const fn cursor(&self) -> u64 {
        self.next_block
    }

    /// Scan from the cursor up to the current head, sending every new
    /// matching event. Returns how many events were sent.
    ///
    /// On error the cursor stays at the window that failed; events from
    /// earlier windows are already delivered and will not be re-sent.
    ///
    /// # Errors
    ///
    /// Propagates source failures and returns
    /// [`EventSourceError::ChannelClosed`] if the receiver is gone.
    pub async fn poll_once(
        &mut self,
        tx: &mpsc::Sender<ChainEvent>,
    ) -> Result<usize, EventSourceError> {
        let head = self.source.latest_block().await?;
        let mut sent = 0;

        while self.next_block <= head {
            let from = self.next_block;
            let to = from.saturating_add(self.max_block_range - 1).min(head);

            let mut events = self.source.query_events(&self.filter, from, to).await?;
            events.retain(|event| {
                (from..=to).contains(&event.block_number) && self.filter.matches(event)
            });
            events.sort_by_key(ChainEvent::position);
            events.dedup_by_key(|event| event.position());

            for event in events {
                if self.last_delivered.is_some_and(|last| event.position() <= last) {
                    continue;
                }
                let position = event.position();
                tx.send(event)
                    .await
                    .map_err(|_| EventSourceError::ChannelClosed)?;
                self.last_delivered = Some(position);
                sent += 1;
            }

            debug!(from, to, "scanned block window");
            let Some(next) = to.checked_add(1) else {
                self.next_block = to;
                break;
            };
            self.next_block = next;
        }

        Ok(sent)
    }

    /// Poll until the receiver is dropped. Source errors are logged and the
    /// window is retried on the next tick.
    ///
    /// # Errors
    ///
    /// Currently never returns an error; the signature leaves room for
    /// unrecoverable source failures.
    pub async fn run(mut self, tx: mpsc::Sender<ChainEvent>) -> Result<(), EventSourceError> {
        loop {
            match self.poll_once(&tx).await {
                Ok(_) => {},
                Err(EventSourceError::ChannelClosed) => return Ok(()),
                Err(err) => warn!(error = %err, cursor = self.next_block, "event poll failed"),
            }
            if tx.is_closed() {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
