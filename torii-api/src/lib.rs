//! # ToriiKV API
//!
//! HTTP surface and replication layer for a ToriiKV node.
//!
//! ## Request Flow
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  client request /v0/entity?id=k&replicas=ack/from            │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  server: parse id + quorum, branch on the Proxy marker       │
//! │        │                                                     │
//! │        ├── Proxy: true ──> local engine call (raw form)      │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  coordinator: rendezvous-rank replicas, gather `ack`         │
//! │  confirms out of the first `from`, merge last-writer-wins,   │
//! │  read-repair the unqueried tail in the background            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod coordinator;
pub mod proxy;
pub mod ring;
pub mod server;

pub use coordinator::{Coordinator, Quorum, ReplicaResponse, SubRequest, Verb};
pub use ring::Topology;
pub use server::{create_router, AppState};
