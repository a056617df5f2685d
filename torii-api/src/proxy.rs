//! # Proxy Client Pool
//!
//! Pre-built HTTP clients for inter-node subrequests, sharded so
//! concurrent workers do not contend on one connection. Every failure —
//! timeout, refused connection, unreadable body — is swallowed into a
//! synthesized 503 so the coordinator records a non-confirm without
//! raising.

use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::Method;
use tracing::warn;

use torii_core::{ClusterConfig, Error, Result};

use crate::coordinator::{ReplicaResponse, SubRequest, Verb, PROXY_HEADER, TOMBSTONE_HEADER};

pub struct ReplicaClients {
    shards: Vec<reqwest::Client>,
    cursor: AtomicUsize,
}

impl ReplicaClients {
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        let shards = (0..config.pool_shards.max(1))
            .map(|_| {
                reqwest::Client::builder()
                    .timeout(config.proxy_timeout)
                    .build()
                    .map_err(|e| Error::Cluster {
                        message: format!("failed to build proxy client: {e}"),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            shards,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Send `request` to the replica at `endpoint` with the proxy marker
    /// set, returning its raw replica-form response.
    pub async fn invoke(&self, endpoint: &str, request: &SubRequest) -> ReplicaResponse {
        let shard = self.cursor.fetch_add(1, Ordering::Relaxed) % self.shards.len();
        let client = &self.shards[shard];

        let method = match request.verb {
            Verb::Get => Method::GET,
            Verb::Put => Method::PUT,
            Verb::Delete => Method::DELETE,
        };

        let mut builder = client
            .request(method, format!("{endpoint}/v0/entity"))
            .query(&[("id", request.id.as_str())])
            .header(PROXY_HEADER, "true");
        if request.verb == Verb::Put {
            builder = builder.body(request.body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint, id = %request.id, error = %e, "proxy request failed");
                return ReplicaResponse::status(503);
            }
        };

        let status = response.status().as_u16();
        let tombstone = response.headers().contains_key(TOMBSTONE_HEADER);
        match response.bytes().await {
            Ok(body) => ReplicaResponse {
                status,
                body,
                tombstone,
            },
            Err(e) => {
                warn!(endpoint, id = %request.id, error = %e, "proxy body read failed");
                ReplicaResponse::status(503)
            }
        }
    }
}
