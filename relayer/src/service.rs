//! Event-driven relayer loop.
//!
//! Consumes the ordered [`ChainEvent`] stream produced by an
//! [`crate::EventPoller`], turns every `DecryptionRequested` into a
//! fulfillment and hands exactly one [`Delivery`] per request to the
//! [`OutcomeSink`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::acl::AccountId;
use crate::error::RelayerError;
use crate::events::{ChainEvent, ChainEventKind};
use crate::relayer::{DecryptionOutcome, DecryptionRequest, Relayer};

/// Final word on one on-chain decryption request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Decrypted(DecryptionOutcome),
    Failed {
        borrower: AccountId,
        lender: AccountId,
        seq: u64,
        error: RelayerError,
    },
}

/// Where results go: the lender-facing notification channel.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn deliver(&self, delivery: Delivery);
}

pub struct RelayerService {
    relayer: Arc<Relayer>,
    sink: Arc<dyn OutcomeSink>,
}

impl RelayerService {
    #[must_use]
    pub fn new(relayer: Arc<Relayer>, sink: Arc<dyn OutcomeSink>) -> Self {
        Self { relayer, sink }
    }

    /// Process one event. Events other than `DecryptionRequested` are
    /// ignored and produce no delivery.
    pub async fn handle_event(&self, event: &ChainEvent) -> Option<Delivery> {
        let ChainEventKind::DecryptionRequested {
            borrower,
            lender,
            seq,
            ..
        } = &event.kind
        else {
            return None;
        };
        debug!(
            block = event.block_number,
            tx = %event.tx_hash,
            %borrower,
            %lender,
            seq,
            "decryption requested"
        );

        let delivery = match self.fulfill(borrower, lender, *seq).await {
            Ok(outcome) => Delivery::Decrypted(outcome),
            Err(error) => {
                warn!(%borrower, %lender, seq, %error, "decryption request failed");
                Delivery::Failed {
                    borrower: borrower.clone(),
                    lender: lender.clone(),
                    seq: *seq,
                    error,
                }
            },
        };
        self.sink.deliver(delivery.clone()).await;
        Some(delivery)
    }

    async fn fulfill(
        &self,
        borrower: &AccountId,
        lender: &AccountId,
        seq: u64,
    ) -> Result<DecryptionOutcome, RelayerError> {
        let encrypted_tier = self.relayer.current_tier(borrower).await?;

        let request = DecryptionRequest {
            borrower: borrower.clone(),
            lender: lender.clone(),
            encrypted_tier,
            seq,
        };
        let outcome = self.relayer.fulfill_decryption(&request).await?;
        outcome.verify()?;
        Ok(outcome)
    }

    /// Drain `events` until the sender side closes. Returns the number of
    /// deliveries made.
    pub async fn run(&self, mut events: mpsc::Receiver<ChainEvent>) -> usize {
        let mut delivered = 0;
        while let Some(event) = events.recv().await {
            if self.handle_event(&event).await.is_some() {
                delivered += 1;
            }
        }
        info!(delivered, "event stream closed");
        delivered
    }
}
