//! The transport adapter: a thin axum router mapping JSON requests straight
//! onto [`crate::node::Node`] operations. No protocol logic lives here —
//! every decision (safety checks, proxying, reshard phases) happens in
//! `node`/`store`; this module only (de)serializes and maps errors to
//! status codes.

use crate::error::NodeError;
use crate::node::{Node, StatusKind};
use crate::observability::spans;
use crate::wire::{
    GetKeysResponse, GetRequest, GossipPayload, KeyCountResponse, PrimeResponse,
    PutPayloadRequest, PutRequest, SetNewViewRequest, ShardSummary, ShardsResponse,
    ViewChangeRequest, ViewChangeResponse,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

pub fn router(node: Node) -> Router {
    Router::new()
        .route("/kvs/keys/:key", put(put_key).get(get_key))
        .route("/kvs/key-count", get(key_count))
        .route("/kvs/shards", get(list_shards))
        .route("/kvs/shards/:id", get(shard_info))
        .route("/kvs/view-change", put(view_change))
        .route("/kvs/reshard/prime", put(reshard_prime))
        .route("/kvs/reshard/rehash", put(reshard_rehash))
        .route("/kvs/reshard/put_payload", put(reshard_put_payload))
        .route("/kvs/reshard/set_new_view", put(reshard_set_new_view))
        .route("/kvs/reshard/reshard", get(reshard_distribute))
        .route("/kvs/reshard/get_keys", get(reshard_get_keys))
        .route("/kvs/reshard/send_keys_to_replicas", get(reshard_send_to_replicas))
        .route("/kvs/gossip", get(gossip))
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}

fn status_of(kind: StatusKind) -> StatusCode {
    match kind {
        StatusKind::Ok => StatusCode::OK,
        StatusKind::Created => StatusCode::CREATED,
        StatusKind::NotFound => StatusCode::NOT_FOUND,
    }
}

async fn put_key(State(node): State<Node>, Path(key): Path<String>, Json(req): Json<PutRequest>) -> Response {
    let span = spans::handler_span("put", &key);
    async move {
        match node.put(&key, req).await {
            Ok((kind, resp)) => (status_of(kind), Json(resp)).into_response(),
            Err(err) => err.into_response(),
        }
    }
    .instrument(span)
    .await
}

async fn get_key(State(node): State<Node>, Path(key): Path<String>, Json(req): Json<GetRequest>) -> Response {
    let span = spans::handler_span("get", &key);
    async move {
        match node.get(&key, req).await {
            Ok((kind, resp)) => (status_of(kind), Json(resp)).into_response(),
            Err(err) => err.into_response(),
        }
    }
    .instrument(span)
    .await
}

async fn key_count(State(node): State<Node>) -> Json<KeyCountResponse> {
    Json(KeyCountResponse { key_count: node.key_count(), shard_id: node.this_shard() })
}

async fn list_shards(State(node): State<Node>) -> Json<ShardsResponse> {
    Json(ShardsResponse { shards: node.shards_list() })
}

async fn shard_info(State(node): State<Node>, Path(id): Path<usize>) -> Result<Json<ShardSummary>, NodeError> {
    node.shard_info(id).await.map(Json)
}

async fn view_change(State(node): State<Node>, Json(req): Json<ViewChangeRequest>) -> Result<Json<ViewChangeResponse>, NodeError> {
    node.try_reshard(req.view, req.repl_factor)
        .instrument(spans::reshard_span("coordinate"))
        .await
        .map(Json)
}

async fn reshard_prime(State(node): State<Node>) -> Json<PrimeResponse> {
    Json(node.prime().instrument(spans::reshard_span("prime")).await)
}

async fn reshard_rehash(State(node): State<Node>) -> StatusCode {
    node.rehash();
    StatusCode::OK
}

async fn reshard_put_payload(State(node): State<Node>, Json(req): Json<PutPayloadRequest>) -> StatusCode {
    node.put_payload(req.payload);
    StatusCode::OK
}

async fn reshard_set_new_view(State(node): State<Node>, Json(req): Json<SetNewViewRequest>) -> StatusCode {
    node.set_new_view(req.view, req.repl_factor, req.current_view);
    StatusCode::OK
}

async fn reshard_distribute(State(node): State<Node>) -> StatusCode {
    node.distribute_fragments().instrument(spans::reshard_span("distribute_fragments")).await;
    StatusCode::OK
}

async fn reshard_get_keys(State(node): State<Node>) -> Json<GetKeysResponse> {
    Json(node.get_keys())
}

async fn reshard_send_to_replicas(State(node): State<Node>) -> Json<ShardSummary> {
    Json(node.distribute_keys().instrument(spans::reshard_span("distribute_keys")).await)
}

async fn gossip(State(node): State<Node>, Json(payload): Json<GossipPayload>) -> Response {
    let _span = spans::gossip_span(&payload.address).entered();
    match node.gossip_ack(payload) {
        Some(ack) => (StatusCode::OK, Json(ack)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
