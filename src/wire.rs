use crate::context::CausalContext;
use crate::history::CausalHistory;
use crate::vector_clock::VectorClock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct PutRequest {
    pub value: Option<String>,
    #[serde(rename = "causal-context", default)]
    pub causal_context: CausalContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutResponse {
    pub replaced: bool,
    #[serde(rename = "causal-context")]
    pub causal_context: CausalContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetRequest {
    #[serde(rename = "causal-context", default)]
    pub causal_context: CausalContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    #[serde(rename = "doesExist")]
    pub does_exist: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "causal-context")]
    pub causal_context: CausalContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipPayload {
    pub items: HashMap<String, String>,
    #[serde(rename = "item-history")]
    pub item_history: HashMap<String, CausalHistory>,
    #[serde(rename = "updated-key-times")]
    pub updated_key_times: CausalHistory,
    #[serde(rename = "vector-clock")]
    pub vector_clock: VectorClock,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewChangeRequest {
    pub view: String,
    #[serde(rename = "repl-factor")]
    pub repl_factor: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardSummary {
    #[serde(rename = "shard-id")]
    pub shard_id: usize,
    #[serde(rename = "key-count")]
    pub key_count: usize,
    pub replicas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewChangeResponse {
    pub shards: Vec<ShardSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetNewViewRequest {
    pub view: String,
    pub repl_factor: usize,
    pub current_view: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutPayloadRequest {
    pub payload: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimeResponse {
    pub current_view: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetKeysResponse {
    pub keys: HashMap<String, String>,
    pub history: HashMap<String, CausalHistory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyCountResponse {
    #[serde(rename = "key-count")]
    pub key_count: usize,
    #[serde(rename = "shard-id")]
    pub shard_id: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShardsResponse {
    pub shards: Vec<usize>,
}
