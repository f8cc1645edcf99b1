//! Off-chain relayer for the ZamaCCO confidential credit oracle.
//!
//! The contract records every decryption request on-chain without checking
//! who is asking. This crate is the gate: it watches the contract's event
//! log, checks each request against the borrower's grants, and forwards
//! only authorized requests, carrying only the encrypted tier handle, to the
//! decryption gateway.
//!
//! ```text
//! EventSource ─► EventPoller ─mpsc─► RelayerService ─► Relayer ─► DecryptionGateway
//!                                           │             │
//!                                           ▼             ├── AccessControlList
//!                                      OutcomeSink        └── ChainReader
//! ```

pub mod acl;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod relayer;
pub mod service;

pub use acl::{
    AccessControlList, AccessPermission, AccountId, Clock, InMemoryPermissionStore, ManualClock,
    PermissionStore, SystemClock,
};
pub use config::RelayerConfig;
pub use error::{ConfigError, EventSourceError, GatewayError, RelayerError};
pub use events::{ChainEvent, ChainEventKind, EventFilter, EventKind, EventPoller, EventSource};
pub use gateway::{
    CiphertextHandle, CreditTier, DecryptionGateway, DecryptionProof, GatewayRequest,
    GatewayResponse,
};
pub use relayer::{
    ChainReader, DecryptionOutcome, DecryptionRequest, Relayer, RequestId, RequestState,
};
pub use service::{Delivery, OutcomeSink, RelayerService};
