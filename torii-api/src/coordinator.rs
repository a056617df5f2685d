//! # Replication Coordinator
//!
//! Gathers `ack` confirmations from the first `from` rendezvous-ranked
//! replicas, merges the responses with last-writer-wins semantics, and
//! read-repairs the unqueried tail in the background.
//!
//! Subrequests go out sequentially; a call to this node short-circuits
//! into the engine so the gather loop is oblivious to self-vs-remote.
//! Any transport failure is a synthesized 503 and counts as a
//! non-confirm; nothing is retried.

use std::future::Future;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use torii_core::{now_ms, successor_key, ClusterConfig, Record, Result};
use torii_storage::LsmEngine;

use crate::proxy::ReplicaClients;
use crate::ring::Topology;

/// Marker header on inter-node subrequests: the receiving node answers
/// from its engine and never recurses into coordination.
pub const PROXY_HEADER: &str = "Proxy";

/// Marker header on a replica-form GET response whose record is a
/// tombstone.
pub const TOMBSTONE_HEADER: &str = "Tombstone";

/// Entity operations the cluster replicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Put,
    Delete,
}

/// One entity operation, as passed between dispatcher, coordinator and
/// replicas.
#[derive(Debug, Clone)]
pub struct SubRequest {
    pub verb: Verb,
    pub id: String,
    pub body: Bytes,
}

/// A replica's answer, identical in shape for local and proxied calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaResponse {
    pub status: u16,
    pub body: Bytes,
    pub tombstone: bool,
}

impl ReplicaResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Bytes::new(),
            tombstone: false,
        }
    }

    pub fn message(status: u16, message: &'static str) -> Self {
        Self {
            status,
            body: Bytes::from_static(message.as_bytes()),
            tombstone: false,
        }
    }

    /// A response confirms iff the replica actually answered the
    /// operation; "key absent" is an answer.
    pub fn confirms(&self) -> bool {
        matches!(self.status, 200 | 201 | 202 | 404)
    }
}

/// Acknowledgement threshold and replication factor for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quorum {
    pub ack: usize,
    pub from: usize,
}

impl Quorum {
    /// Default when the client names no `replicas`: all nodes, majority
    /// acknowledgement.
    pub fn default_for(nodes: usize) -> Self {
        Self {
            ack: nodes / 2 + 1,
            from: nodes,
        }
    }

    /// Parse `"ack/from"`, enforcing `0 < ack <= from <= nodes`.
    pub fn parse(raw: &str, nodes: usize) -> Option<Self> {
        let (ack, from) = raw.split_once('/')?;
        let ack: usize = ack.parse().ok()?;
        let from: usize = from.parse().ok()?;
        if ack == 0 || ack > from || from > nodes {
            return None;
        }
        Some(Self { ack, from })
    }
}

/// Everything needed to reach one replica, local or remote. Cloned into
/// read-repair tasks.
#[derive(Clone)]
struct ReplicaCaller {
    engine: Arc<LsmEngine>,
    topology: Arc<Topology>,
    clients: Arc<ReplicaClients>,
}

impl ReplicaCaller {
    async fn call(&self, node: usize, request: &SubRequest) -> ReplicaResponse {
        if self.topology.is_me(node) {
            self.local(request)
        } else {
            self.clients
                .invoke(self.topology.endpoint(node), request)
                .await
        }
    }

    /// Answer an operation from the local engine, in the raw replica
    /// form: a GET body carries the value followed by the big-endian
    /// timestamp, even for tombstones.
    fn local(&self, request: &SubRequest) -> ReplicaResponse {
        let result = match request.verb {
            Verb::Get => self.local_get(request),
            Verb::Put => {
                let key = Bytes::copy_from_slice(request.id.as_bytes());
                self.engine
                    .upsert(Record::new(key, request.body.clone(), now_ms()))
                    .map(|()| ReplicaResponse::status(201))
            }
            Verb::Delete => {
                let key = Bytes::copy_from_slice(request.id.as_bytes());
                self.engine
                    .upsert(Record::tombstone(key, now_ms()))
                    .map(|()| ReplicaResponse::status(202))
            }
        };

        result.unwrap_or_else(|e| {
            error!(id = %request.id, error = %e, "engine operation failed");
            ReplicaResponse::status(503)
        })
    }

    fn local_get(&self, request: &SubRequest) -> Result<ReplicaResponse> {
        let from = Bytes::copy_from_slice(request.id.as_bytes());
        let to = successor_key(&from);
        let mut range = self.engine.range(Some(from), Some(to))?;

        Ok(match range.next() {
            None => ReplicaResponse::status(404),
            Some(record) => {
                let value_len = record.value().map_or(0, Bytes::len);
                let mut body = BytesMut::with_capacity(value_len + 8);
                if let Some(value) = record.value() {
                    body.put_slice(value);
                }
                body.put_i64(record.timestamp());

                ReplicaResponse {
                    status: 200,
                    body: body.freeze(),
                    tombstone: record.is_tombstone(),
                }
            }
        })
    }
}

/// Detached read-repair tasks: bounded by a semaphore so they cannot
/// starve foreground work, tracked in a join set so shutdown can wait
/// for them.
struct RepairPool {
    tasks: Mutex<JoinSet<()>>,
    gate: Arc<Semaphore>,
}

impl RepairPool {
    fn new(workers: usize) -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
            gate: Arc::new(Semaphore::new(workers)),
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let gate = Arc::clone(&self.gate);
        let mut tasks = self.tasks.lock();
        // Reap already-finished tasks so the set stays small.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            // The permit must be held for the task's whole run, not
            // just the acquire.
            let Ok(_permit) = gate.acquire_owned().await else {
                return;
            };
            task.await;
        });
    }

    async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        while tasks.join_next().await.is_some() {}
    }
}

pub struct Coordinator {
    caller: ReplicaCaller,
    repair: RepairPool,
}

impl Coordinator {
    pub fn new(
        engine: Arc<LsmEngine>,
        topology: Topology,
        config: &ClusterConfig,
    ) -> Result<Self> {
        let clients = Arc::new(ReplicaClients::new(config)?);
        Ok(Self {
            caller: ReplicaCaller {
                engine,
                topology: Arc::new(topology),
                clients,
            },
            repair: RepairPool::new(config.entity_workers),
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.caller.topology
    }

    /// The sub-handler a proxy-marked request hits directly.
    pub fn local(&self, request: &SubRequest) -> ReplicaResponse {
        self.caller.local(request)
    }

    /// Run one client operation to completion: gather, merge, schedule
    /// read-repair.
    pub async fn execute(&self, request: SubRequest, quorum: Quorum) -> ReplicaResponse {
        let ranking = self.caller.topology.rank(&request.id);

        let mut responses = Vec::with_capacity(quorum.from);
        let mut confirms = 0;
        let mut queried = 0;
        for &node in &ranking[..quorum.from] {
            let response = self.caller.call(node, &request).await;
            if response.confirms() {
                confirms += 1;
            }
            responses.push(response);
            queried += 1;
            if confirms >= quorum.ack {
                break;
            }
        }

        if confirms < quorum.ack {
            return ReplicaResponse::message(504, "Not Enough Replicas");
        }

        let merged = merge_responses(request.verb, &responses);

        let trailing = ranking[queried..quorum.from].to_vec();
        if !trailing.is_empty() {
            let caller = self.caller.clone();
            self.repair.spawn(async move {
                for node in trailing {
                    let _ = caller.call(node, &request).await;
                }
                debug!(id = %request.id, "read repair complete");
            });
        }

        merged
    }

    /// Wait for every outstanding read-repair task.
    pub async fn shutdown(&self) {
        self.repair.drain().await;
    }
}

/// Trailing big-endian timestamp of a replica-form body; −1 when the
/// body is too short to carry one (404s in particular).
pub(crate) fn parse_timestamp(response: &ReplicaResponse) -> i64 {
    let body = &response.body;
    if body.len() >= 8 {
        BigEndian::read_i64(&body[body.len() - 8..])
    } else {
        -1
    }
}

fn merge_responses(verb: Verb, responses: &[ReplicaResponse]) -> ReplicaResponse {
    match verb {
        Verb::Get => merge_get(responses),
        Verb::Put => ReplicaResponse::status(201),
        Verb::Delete => ReplicaResponse::status(202),
    }
}

/// Last-writer-wins over the confirming responses: pick the strictly
/// greatest timestamp, where a 404 votes "no data, −1". An absent or
/// tombstoned winner is a 404; otherwise the winner's body minus its
/// timestamp suffix.
fn merge_get(responses: &[ReplicaResponse]) -> ReplicaResponse {
    let mut winner: Option<(&ReplicaResponse, i64)> = None;
    for response in responses.iter().filter(|r| r.confirms()) {
        let timestamp = parse_timestamp(response);
        match winner {
            Some((_, best)) if timestamp <= best => {}
            _ => winner = Some((response, timestamp)),
        }
    }

    match winner {
        Some((response, timestamp)) if timestamp >= 0 && !response.tombstone => {
            ReplicaResponse {
                status: 200,
                body: response.body.slice(..response.body.len() - 8),
                tombstone: false,
            }
        }
        _ => ReplicaResponse::status(404),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replica_get(value: &[u8], timestamp: i64, tombstone: bool) -> ReplicaResponse {
        let mut body = BytesMut::new();
        body.put_slice(value);
        body.put_i64(timestamp);
        ReplicaResponse {
            status: 200,
            body: body.freeze(),
            tombstone,
        }
    }

    #[test]
    fn test_quorum_defaults() {
        assert_eq!(Quorum::default_for(3), Quorum { ack: 2, from: 3 });
        assert_eq!(Quorum::default_for(1), Quorum { ack: 1, from: 1 });
        assert_eq!(Quorum::default_for(4), Quorum { ack: 3, from: 4 });
    }

    #[test]
    fn test_quorum_parse_validation() {
        assert_eq!(Quorum::parse("2/3", 3), Some(Quorum { ack: 2, from: 3 }));
        assert_eq!(Quorum::parse("1/1", 3), Some(Quorum { ack: 1, from: 1 }));

        assert_eq!(Quorum::parse("0/3", 3), None);
        assert_eq!(Quorum::parse("4/3", 3), None);
        assert_eq!(Quorum::parse("2/4", 3), None);
        assert_eq!(Quorum::parse("-1/3", 3), None);
        assert_eq!(Quorum::parse("2", 3), None);
        assert_eq!(Quorum::parse("2/3/4", 3), None);
        assert_eq!(Quorum::parse("a/b", 3), None);
        assert_eq!(Quorum::parse("", 3), None);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp(&replica_get(b"value", 42, false)), 42);
        assert_eq!(parse_timestamp(&replica_get(b"", 7, false)), 7);
        assert_eq!(parse_timestamp(&ReplicaResponse::status(404)), -1);
    }

    #[test]
    fn test_merge_get_newest_wins_and_strips_timestamp() {
        let merged = merge_get(&[
            replica_get(b"old", 10, false),
            replica_get(b"new", 20, false),
            ReplicaResponse::status(404),
        ]);
        assert_eq!(merged.status, 200);
        assert_eq!(merged.body.as_ref(), b"new");
    }

    #[test]
    fn test_merge_get_all_absent_is_not_found() {
        let merged = merge_get(&[
            ReplicaResponse::status(404),
            ReplicaResponse::status(404),
        ]);
        assert_eq!(merged.status, 404);
    }

    #[test]
    fn test_merge_get_winning_tombstone_hides_older_value() {
        let merged = merge_get(&[
            replica_get(b"value", 10, false),
            replica_get(b"", 20, true),
        ]);
        assert_eq!(merged.status, 404);
    }

    #[test]
    fn test_merge_get_newer_value_beats_older_tombstone() {
        let merged = merge_get(&[
            replica_get(b"", 10, true),
            replica_get(b"revived", 20, false),
        ]);
        assert_eq!(merged.status, 200);
        assert_eq!(merged.body.as_ref(), b"revived");
    }

    #[test]
    fn test_merge_get_ignores_failed_replicas() {
        // A 503 body never participates in timestamp voting.
        let failed = ReplicaResponse {
            status: 503,
            body: Bytes::from_static(b"Service Unavailable"),
            tombstone: false,
        };
        let merged = merge_get(&[failed, replica_get(b"v", 5, false)]);
        assert_eq!(merged.status, 200);
        assert_eq!(merged.body.as_ref(), b"v");
    }

    #[test]
    fn test_merge_put_and_delete() {
        let ok = ReplicaResponse::status(201);
        assert_eq!(merge_responses(Verb::Put, &[ok.clone()]).status, 201);
        assert_eq!(merge_responses(Verb::Delete, &[ok]).status, 202);
    }

    #[test]
    fn test_empty_value_with_timestamp_is_live() {
        let merged = merge_get(&[replica_get(b"", 5, false)]);
        assert_eq!(merged.status, 200);
        assert_eq!(merged.body.len(), 0);
    }
}
