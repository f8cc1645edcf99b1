//! End-to-end relayer flow: event log → poller → service → gateway → sink.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use proptest::prelude::*;
use tokio::sync::mpsc;
use zama_cco_relayer::{
    AccessControlList, AccountId, ChainEvent, ChainEventKind, ChainReader, CiphertextHandle,
    CreditTier, DecryptionGateway, DecryptionRequest, Delivery, EventFilter, EventPoller,
    EventSource, EventSourceError, GatewayError, GatewayRequest, GatewayResponse, OutcomeSink,
    Relayer, RelayerConfig, RelayerError, RelayerService,
};

// =============================================================================
// Collaborator stubs
// =============================================================================

#[derive(Default)]
struct Chain {
    events: Mutex<Vec<ChainEvent>>,
    tiers: Mutex<HashMap<AccountId, CiphertextHandle>>,
}

impl Chain {
    fn score(&self, borrower: &AccountId, handle: CiphertextHandle) {
        self.tiers.lock().unwrap().insert(borrower.clone(), handle);
    }

    fn request(&self, borrower: &AccountId, lender: &AccountId) -> u64 {
        let mut events = self.events.lock().unwrap();
        let seq = events.len() as u64;
        events.push(ChainEvent {
            block_number: 10 + seq,
            log_index: 0,
            tx_hash: format!("0x{seq:064x}"),
            kind: ChainEventKind::DecryptionRequested {
                borrower: borrower.clone(),
                lender: lender.clone(),
                timestamp: 1_700_000_000 + seq,
                seq,
            },
        });
        seq
    }
}

#[async_trait]
impl EventSource for Chain {
    async fn latest_block(&self) -> Result<u64, EventSourceError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.block_number)
            .max()
            .unwrap_or(0))
    }

    async fn query_events(
        &self,
        filter: &EventFilter,
        from: u64,
        to: u64,
    ) -> Result<Vec<ChainEvent>, EventSourceError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| (from..=to).contains(&e.block_number) && filter.matches(e))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ChainReader for Chain {
    async fn encrypted_tier(
        &self,
        borrower: &AccountId,
    ) -> Result<Option<CiphertextHandle>, EventSourceError> {
        Ok(self.tiers.lock().unwrap().get(borrower).copied())
    }
}

/// Gateway that knows the plaintext behind each tier handle.
#[derive(Default)]
struct Gateway {
    plaintext: Mutex<HashMap<CiphertextHandle, CreditTier>>,
    calls: AtomicU32,
}

#[async_trait]
impl DecryptionGateway for Gateway {
    async fn decrypt_tier(
        &self,
        request: &GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.plaintext.lock().unwrap().get(&request.handle) {
            Some(tier) => Ok(GatewayResponse {
                tier: *tier,
                attestation: request.request_id.as_bytes().to_vec(),
            }),
            None => Err(GatewayError::Rejected("unknown handle".into())),
        }
    }
}

#[derive(Default)]
struct Inbox {
    deliveries: Mutex<Vec<Delivery>>,
}

#[async_trait]
impl OutcomeSink for Inbox {
    async fn deliver(&self, delivery: Delivery) {
        self.deliveries.lock().unwrap().push(delivery);
    }
}

struct Harness {
    chain: Arc<Chain>,
    gateway: Arc<Gateway>,
    inbox: Arc<Inbox>,
    acl: Arc<AccessControlList>,
    relayer: Arc<Relayer>,
    service: RelayerService,
}

impl Harness {
    fn new() -> Self {
        let chain = Arc::new(Chain::default());
        let gateway = Arc::new(Gateway::default());
        let inbox = Arc::new(Inbox::default());
        let acl = Arc::new(AccessControlList::in_memory());
        let relayer = Relayer::new(
            acl.clone(),
            chain.clone(),
            gateway.clone(),
            RelayerConfig::default(),
        )
        .unwrap();
        let relayer = Arc::new(relayer);
        let service = RelayerService::new(relayer.clone(), inbox.clone());
        Self {
            chain,
            gateway,
            inbox,
            acl,
            relayer,
            service,
        }
    }

    async fn pump(&self) -> usize {
        let mut poller = EventPoller::new(
            self.chain.clone(),
            EventFilter::decryption_requests(),
            0,
            &RelayerConfig::default(),
        );
        let (tx, rx) = mpsc::channel(64);
        poller.poll_once(&tx).await.unwrap();
        drop(tx);
        self.service.run(rx).await
    }

    fn deliveries(&self) -> Vec<Delivery> {
        self.inbox.deliveries.lock().unwrap().clone()
    }

    fn gateway_calls(&self) -> u32 {
        self.gateway.calls.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn granted_lender_receives_verified_tier() {
    let h = Harness::new();
    let borrower = AccountId::new("GBORROWER");
    let lender = AccountId::new("GLENDER");
    let handle = CiphertextHandle([0x11; 32]);
    h.chain.score(&borrower, handle);
    h.gateway.plaintext.lock().unwrap().insert(handle, CreditTier::Good);
    h.acl.grant_access(&borrower, &lender, Some(30));
    h.chain.request(&borrower, &lender);

    assert_eq!(h.pump().await, 1);

    let deliveries = h.deliveries();
    let [Delivery::Decrypted(outcome)] = deliveries.as_slice() else {
        panic!("expected one decrypted delivery, got {deliveries:?}");
    };
    assert_eq!(outcome.tier, CreditTier::Good);
    assert_eq!(outcome.lender, lender);
    assert_eq!(outcome.encrypted_tier, handle);
    outcome.verify().unwrap();
    assert_eq!(h.gateway_calls(), 1);
}

#[tokio::test]
async fn unauthorized_lender_is_denied_without_gateway_call() {
    let h = Harness::new();
    let borrower = AccountId::new("GBORROWER");
    let stranger = AccountId::new("GSTRANGER");
    let handle = CiphertextHandle([0x22; 32]);
    h.chain.score(&borrower, handle);
    h.gateway.plaintext.lock().unwrap().insert(handle, CreditTier::Excellent);
    let seq = h.chain.request(&borrower, &stranger);

    h.pump().await;

    assert_eq!(
        h.deliveries(),
        vec![Delivery::Failed {
            borrower: borrower.clone(),
            lender: stranger.clone(),
            seq,
            error: RelayerError::AccessDenied {
                borrower: borrower.to_string(),
                lender: stranger.to_string(),
            },
        }]
    );
    assert_eq!(h.gateway_calls(), 0);
}

#[tokio::test]
async fn unscored_borrower_reports_not_found() {
    let h = Harness::new();
    let borrower = AccountId::new("GUNSCORED");
    let lender = AccountId::new("GLENDER");
    h.acl.grant_access(&borrower, &lender, None);
    h.chain.request(&borrower, &lender);

    h.pump().await;

    let deliveries = h.deliveries();
    assert!(matches!(
        deliveries.as_slice(),
        [Delivery::Failed {
            error: RelayerError::NotFound { .. },
            ..
        }]
    ));
    assert_eq!(h.gateway_calls(), 0);
}

#[tokio::test]
async fn grant_check_uses_normalized_addresses() {
    let h = Harness::new();
    let handle = CiphertextHandle([0x33; 32]);
    h.chain.score(&AccountId::new("gborrower"), handle);
    h.gateway.plaintext.lock().unwrap().insert(handle, CreditTier::Fair);
    h.acl.grant_access(&AccountId::new("GBorrower"), &AccountId::new("GLender"), None);
    h.chain.request(&AccountId::new("GBORROWER"), &AccountId::new("glender"));

    h.pump().await;

    assert!(matches!(h.deliveries().as_slice(), [Delivery::Decrypted(_)]));
}

#[tokio::test]
async fn grant_does_not_reach_another_borrowers_tier() {
    let h = Harness::new();
    let friendly = AccountId::new("GFRIENDLY");
    let target = AccountId::new("GTARGET");
    let lender = AccountId::new("GLENDER");
    let friendly_handle = CiphertextHandle([0x55; 32]);
    let target_handle = CiphertextHandle([0x66; 32]);
    h.chain.score(&friendly, friendly_handle);
    h.chain.score(&target, target_handle);
    h.gateway.plaintext.lock().unwrap().insert(target_handle, CreditTier::Excellent);
    h.acl.grant_access(&friendly, &lender, None);

    let forged = DecryptionRequest {
        borrower: friendly.clone(),
        lender: lender.clone(),
        encrypted_tier: target_handle,
        seq: 0,
    };
    let err = h.relayer.fulfill_decryption(&forged).await.unwrap_err();

    assert_eq!(
        err,
        RelayerError::AccessDenied {
            borrower: friendly.to_string(),
            lender: lender.to_string(),
        }
    );
    assert_eq!(h.gateway_calls(), 0);
}

#[tokio::test]
async fn non_request_events_are_ignored() {
    let h = Harness::new();
    let event = ChainEvent {
        block_number: 1,
        log_index: 0,
        tx_hash: "0x01".into(),
        kind: ChainEventKind::CreditScoreComputed {
            borrower: AccountId::new("GBORROWER"),
            encrypted_tier: CiphertextHandle([0; 32]),
        },
    };
    assert_eq!(h.service.handle_event(&event).await, None);
    assert!(h.deliveries().is_empty());
}

// =============================================================================
// Property: the gateway only ever sees granted lenders
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn gateway_sees_only_granted_lenders(
        lenders in 1usize..8,
        granted in proptest::collection::btree_set(0usize..8, 0..8),
        revoked in proptest::collection::btree_set(0usize..8, 0..4),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let h = Harness::new();
        let borrower = AccountId::new("GBORROWER");
        let handle = CiphertextHandle([0x44; 32]);
        h.chain.score(&borrower, handle);
        h.gateway.plaintext.lock().unwrap().insert(handle, CreditTier::Poor);

        let mut allowed = BTreeSet::new();
        for i in 0..lenders {
            let lender = AccountId::new(&format!("GLENDER{i}"));
            if granted.contains(&i) {
                h.acl.grant_access(&borrower, &lender, None);
                if revoked.contains(&i) {
                    h.acl.revoke_access(&borrower, &lender);
                } else {
                    allowed.insert(lender.clone());
                }
            }
            h.chain.request(&borrower, &lender);
        }

        let delivered = runtime.block_on(h.pump());
        prop_assert_eq!(delivered, lenders);

        let decrypted: BTreeSet<_> = h
            .deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Decrypted(outcome) => Some(outcome.lender),
                Delivery::Failed { .. } => None,
            })
            .collect();
        prop_assert_eq!(&decrypted, &allowed);
        prop_assert_eq!(h.gateway_calls() as usize, allowed.len());
    }
}
