//! # HTTP Server
//!
//! The node's external surface: `/v0/status`, `/v0/entity`, and a 400
//! fallback for everything else. Entity requests run under a bounded
//! semaphore; once shutdown begins every request is answered 503.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::Response,
    routing::{any, get},
    Router,
};
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::info;

use torii_core::{ClusterConfig, Result, StoreConfig};
use torii_storage::LsmEngine;

use crate::coordinator::{Coordinator, Quorum, ReplicaResponse, SubRequest, Verb, PROXY_HEADER, TOMBSTONE_HEADER};
use crate::ring::Topology;

/// Shared per-node state behind the router.
pub struct AppState {
    engine: Arc<LsmEngine>,
    coordinator: Coordinator,
    entity_gate: Semaphore,
    accepting: AtomicBool,
}

impl AppState {
    /// Open the engine and wire up the cluster layer for one node.
    pub fn new(
        store: StoreConfig,
        cluster: &ClusterConfig,
        self_endpoint: &str,
    ) -> Result<Self> {
        let engine = Arc::new(LsmEngine::open(store)?);
        let topology = Topology::new(cluster.topology.clone(), self_endpoint)?;
        info!(
            node_id = topology.node_id(),
            nodes = topology.len(),
            endpoint = self_endpoint,
            "joining replication ring"
        );
        let coordinator = Coordinator::new(Arc::clone(&engine), topology, cluster)?;

        Ok(Self {
            engine,
            coordinator,
            entity_gate: Semaphore::new(cluster.entity_workers),
            accepting: AtomicBool::new(true),
        })
    }

    /// Stop accepting requests; everything from here on is answered 503.
    pub fn begin_shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.entity_gate.close();
        info!("refusing new requests");
    }

    /// Drain read-repair, then close the engine (final flush included).
    pub async fn finish_shutdown(&self) -> Result<()> {
        self.coordinator.shutdown().await;
        self.engine.close()
    }

    fn accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v0/status", get(status))
        .route("/v0/entity", any(entity))
        .fallback(unknown_path)
        .with_state(state)
}

#[derive(Deserialize)]
struct EntityParams {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    replicas: Option<String>,
}

async fn status(State(state): State<Arc<AppState>>) -> Response {
    if !state.accepting() {
        return text_response(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable");
    }
    text_response(StatusCode::OK, "I'm OK")
}

async fn unknown_path(State(state): State<Arc<AppState>>) -> Response {
    if !state.accepting() {
        return text_response(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable");
    }
    text_response(StatusCode::BAD_REQUEST, "Bad Request")
}

async fn entity(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    query: Option<Query<EntityParams>>,
    body: Bytes,
) -> Response {
    if !state.accepting() {
        return text_response(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable");
    }
    let Ok(_permit) = state.entity_gate.acquire().await else {
        return text_response(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable");
    };

    let params = match query {
        Some(Query(params)) => params,
        None => return text_response(StatusCode::BAD_REQUEST, "Bad id"),
    };
    let id = params.id.unwrap_or_default();
    if id.is_empty() {
        return text_response(StatusCode::BAD_REQUEST, "Bad id");
    }

    let verb = if method == Method::GET {
        Verb::Get
    } else if method == Method::PUT {
        Verb::Put
    } else if method == Method::DELETE {
        Verb::Delete
    } else {
        return text_response(StatusCode::BAD_REQUEST, "Bad Request");
    };
    let request = SubRequest { verb, id, body };

    // A proxy-marked subrequest answers from the engine in raw replica
    // form and must not recurse into coordination.
    if headers.contains_key(PROXY_HEADER) {
        return into_http(state.coordinator.local(&request), true);
    }

    let nodes = state.coordinator.topology().len();
    let quorum = match &params.replicas {
        None => Quorum::default_for(nodes),
        Some(raw) => match Quorum::parse(raw, nodes) {
            Some(quorum) => quorum,
            None => return text_response(StatusCode::BAD_REQUEST, "Bad Request"),
        },
    };

    into_http(state.coordinator.execute(request, quorum).await, false)
}

fn into_http(response: ReplicaResponse, raw_form: bool) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    if raw_form && response.tombstone {
        builder = builder.header(TOMBSTONE_HEADER, "true");
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn text_response(status: StatusCode, message: &'static str) -> Response {
    Response::builder()
        .status(status)
        .body(Body::from(message))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
