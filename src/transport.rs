use crate::wire::{
    GetKeysResponse, GetRequest, GetResponse, GossipPayload, PrimeResponse, PutPayloadRequest,
    PutRequest, PutResponse, SetNewViewRequest, ViewChangeRequest, ViewChangeResponse,
};
use reqwest::Client;
use std::time::Duration;

/// Thin wrapper over an HTTP client used for every node-to-node call:
/// proxying client requests to the owning shard, gossip exchange, and each
/// reshard phase. Every call shares one fixed timeout (see `NodeConfig`).
#[derive(Clone)]
pub struct PeerClient {
    client: Client,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a fixed timeout");
        PeerClient { client }
    }

    fn url(addr: &str, path: &str) -> String {
        format!("http://{addr}{path}")
    }

    pub async fn proxy_put(&self, addr: &str, key: &str, req: &PutRequest) -> Option<PutResponse> {
        let body = serde_json::json!({
            "value": req.value,
            "causal-context": req.causal_context,
        });
        self.client
            .put(Self::url(addr, &format!("/kvs/keys/{key}")))
            .json(&body)
            .send()
            .await
            .ok()?
            .json::<PutResponse>()
            .await
            .ok()
    }

    pub async fn proxy_get(&self, addr: &str, key: &str, req: &GetRequest) -> Option<GetResponse> {
        self.client
            .get(Self::url(addr, &format!("/kvs/keys/{key}")))
            .json(req)
            .send()
            .await
            .ok()?
            .json::<GetResponse>()
            .await
            .ok()
    }

    pub async fn gossip(&self, addr: &str, payload: &GossipPayload) -> Option<GossipPayload> {
        self.client
            .get(Self::url(addr, "/kvs/gossip"))
            .json(payload)
            .send()
            .await
            .ok()?
            .json::<GossipPayload>()
            .await
            .ok()
    }

    pub async fn reshard_prime(&self, addr: &str) -> Option<PrimeResponse> {
        self.client
            .put(Self::url(addr, "/kvs/reshard/prime"))
            .send()
            .await
            .ok()?
            .json::<PrimeResponse>()
            .await
            .ok()
    }

    pub async fn reshard_get_keys(&self, addr: &str) -> Option<GetKeysResponse> {
        self.client
            .get(Self::url(addr, "/kvs/reshard/get_keys"))
            .send()
            .await
            .ok()?
            .json::<GetKeysResponse>()
            .await
            .ok()
    }

    pub async fn reshard_set_new_view(&self, addr: &str, req: &SetNewViewRequest) -> bool {
        self.client
            .put(Self::url(addr, "/kvs/reshard/set_new_view"))
            .json(req)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    pub async fn reshard_rehash(&self, addr: &str) -> bool {
        self.client
            .put(Self::url(addr, "/kvs/reshard/rehash"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    pub async fn reshard_distribute_fragments(&self, addr: &str) -> bool {
        self.client
            .get(Self::url(addr, "/kvs/reshard/reshard"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    pub async fn reshard_put_payload(&self, addr: &str, req: &PutPayloadRequest) -> bool {
        self.client
            .put(Self::url(addr, "/kvs/reshard/put_payload"))
            .json(req)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    pub async fn shard_info(&self, addr: &str, shard_id: usize) -> Option<crate::wire::ShardSummary> {
        self.client
            .get(Self::url(addr, &format!("/kvs/shards/{shard_id}")))
            .send()
            .await
            .ok()?
            .json::<crate::wire::ShardSummary>()
            .await
            .ok()
    }

    pub async fn view_change(&self, addr: &str, req: &ViewChangeRequest) -> Option<ViewChangeResponse> {
        self.client
            .put(Self::url(addr, "/kvs/view-change"))
            .json(req)
            .send()
            .await
            .ok()?
            .json::<ViewChangeResponse>()
            .await
            .ok()
    }

    pub async fn reshard_send_to_replicas(&self, addr: &str) -> Option<crate::wire::ShardSummary> {
        self.client
            .get(Self::url(addr, "/kvs/reshard/send_keys_to_replicas"))
            .send()
            .await
            .ok()?
            .json::<crate::wire::ShardSummary>()
            .await
            .ok()
    }
}
