use crate::config::NodeConfig;
use crate::context::CausalContext;
use crate::error::NodeError;
use crate::store::{GetDecision, NodeInner};
use crate::transport::PeerClient;
use crate::view::View;
use crate::wire::{
    GetKeysResponse, GetRequest, GetResponse, GossipPayload, PrimeResponse, PutPayloadRequest,
    PutRequest, PutResponse, SetNewViewRequest, ShardSummary, ViewChangeRequest, ViewChangeResponse,
};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

const MAX_KEY_LEN: usize = 50;

/// A node's externally visible handle: cheap to clone, shares one locked
/// state bundle (`NodeInner`) and one peer client. Mirrors the single
/// mutex-guarded state bundle the concurrency model calls for — every
/// mutation acquires the lock only for its in-memory portion and releases
/// it before any `.await` on the network.
#[derive(Clone)]
pub struct Node {
    inner: Arc<Mutex<NodeInner>>,
    peer: PeerClient,
}

impl Node {
    pub fn new(config: &NodeConfig) -> Self {
        let view = View::parse(&config.view, config.repl_factor);
        let inner = NodeInner::new(config.address.clone(), view);
        Node {
            inner: Arc::new(Mutex::new(inner)),
            peer: PeerClient::new(config.request_timeout),
        }
    }

    pub fn address(&self) -> String {
        self.inner.lock().address.clone()
    }

    pub fn current_view(&self) -> u64 {
        self.inner.lock().current_view
    }

    pub fn this_shard(&self) -> Option<usize> {
        self.inner.lock().this_shard
    }

    pub fn num_shards(&self) -> usize {
        self.inner.lock().num_shards()
    }

    pub fn key_count(&self) -> usize {
        self.inner.lock().key_count()
    }

    pub fn is_member(&self) -> bool {
        self.this_shard().is_some()
    }

    pub fn shards_list(&self) -> Vec<usize> {
        self.inner.lock().view.all_shard_ids().collect()
    }

    pub async fn shard_info(&self, shard_id: usize) -> Result<ShardSummary, NodeError> {
        let (is_own, replicas) = {
            let inner = self.inner.lock();
            (
                inner.this_shard == Some(shard_id),
                inner.view.shard_replicas(shard_id).map(|r| r.to_vec()),
            )
        };
        let replicas = replicas.ok_or(NodeError::NoSuchShard(shard_id))?;

        if is_own {
            let inner = self.inner.lock();
            return Ok(ShardSummary { shard_id, key_count: inner.key_count(), replicas: inner.shard_replicas() });
        }

        for addr in &replicas {
            if let Some(summary) = self.peer.shard_info(addr, shard_id).await {
                return Ok(summary);
            }
        }
        Err(NodeError::ShardUnreachable)
    }

    // ---- client-facing PUT / GET --------------------------------------

    pub async fn put(&self, key: &str, req: PutRequest) -> Result<(StatusKind, PutResponse), NodeError> {
        if key.len() > MAX_KEY_LEN {
            return Err(NodeError::KeyTooLong(req.causal_context));
        }
        let value = match req.value.clone() {
            Some(v) => v,
            None => return Err(NodeError::MissingValue(req.causal_context)),
        };

        let target_shard = self.inner.lock().shard_of_key(key);
        let owns_shard = self.inner.lock().this_shard == Some(target_shard);

        if !owns_shard {
            return self.proxy_put(target_shard, key, &req).await;
        }

        let (replaced, ctx) = {
            let mut inner = self.inner.lock();
            inner.apply_put(key, value, req.causal_context)
        };
        debug!(key, replaced, "put applied locally");
        let kind = if replaced { StatusKind::Ok } else { StatusKind::Created };
        Ok((kind, PutResponse { replaced, causal_context: ctx, address: None }))
    }

    pub async fn get(&self, key: &str, req: GetRequest) -> Result<(StatusKind, GetResponse), NodeError> {
        let target_shard = self.inner.lock().shard_of_key(key);
        let owns_shard = self.inner.lock().this_shard == Some(target_shard);

        if !owns_shard {
            return self.proxy_get(target_shard, key, &req).await;
        }

        let decision = {
            let mut inner = self.inner.lock();
            inner.decide_get(key, req.causal_context)
        };
        match decision {
            GetDecision::Found { value, ctx } => Ok((
                StatusKind::Ok,
                GetResponse { does_exist: true, value: Some(value), causal_context: ctx, address: None },
            )),
            GetDecision::NotFound { ctx } => Ok((
                StatusKind::NotFound,
                GetResponse { does_exist: false, value: None, causal_context: ctx, address: None },
            )),
            GetDecision::Nack => Err(NodeError::Nack),
        }
    }

    async fn proxy_put(&self, target_shard: usize, key: &str, req: &PutRequest) -> Result<(StatusKind, PutResponse), NodeError> {
        let replicas = {
            let inner = self.inner.lock();
            inner.view.shard_replicas(target_shard).map(|r| r.to_vec())
        }
        .ok_or(NodeError::NoSuchShard(target_shard))?;

        let futs = replicas.iter().map(|addr| {
            let addr = addr.clone();
            async move { (addr.clone(), self.peer.proxy_put(&addr, key, req).await) }
        });
        let results = join_all(futs).await;
        for (addr, resp) in results {
            if let Some(mut resp) = resp {
                resp.address = Some(addr);
                let kind = if resp.replaced { StatusKind::Ok } else { StatusKind::Created };
                return Ok((kind, resp));
            }
        }
        warn!(shard = target_shard, "put proxy: no replica reachable");
        Err(NodeError::ShardUnreachable)
    }

    async fn proxy_get(&self, target_shard: usize, key: &str, req: &GetRequest) -> Result<(StatusKind, GetResponse), NodeError> {
        let replicas = {
            let inner = self.inner.lock();
            inner.view.shard_replicas(target_shard).map(|r| r.to_vec())
        }
        .ok_or(NodeError::NoSuchShard(target_shard))?;

        let futs = replicas.iter().map(|addr| {
            let addr = addr.clone();
            async move { (addr.clone(), self.peer.proxy_get(&addr, key, req).await) }
        });
        let results = join_all(futs).await;
        for (addr, resp) in results {
            if let Some(mut resp) = resp {
                resp.address = Some(addr);
                let kind = if resp.does_exist { StatusKind::Ok } else { StatusKind::NotFound };
                return Ok((kind, resp));
            }
        }
        warn!(shard = target_shard, "get proxy: no replica reachable");
        Err(NodeError::ShardUnreachable)
    }

    // ---- gossip ---------------------------------------------------------

    /// One anti-entropy round: fan out to every other replica in the shard
    /// with the fixed per-call timeout and merge each response.
    pub async fn gossip_round(&self) {
        let (peers, payload) = {
            let inner = self.inner.lock();
            if inner.this_shard.is_none() {
                return;
            }
            let peers: Vec<String> = inner
                .shard_replicas()
                .into_iter()
                .filter(|a| a != &inner.address)
                .collect();
            (peers, inner.outbound_gossip_payload())
        };
        if peers.is_empty() {
            return;
        }
        let futs = peers.iter().map(|addr| {
            let addr = addr.clone();
            let payload = payload.clone();
            let span = crate::observability::spans::gossip_span(&addr);
            async move { (addr.clone(), self.peer.gossip(&addr, &payload).await) }.instrument(span)
        });
        let results = join_all(futs).await;
        let mut inner = self.inner.lock();
        for (addr, resp) in results {
            match resp {
                Some(ack) => {
                    inner.replica_alive.insert(addr, true);
                    inner.apply_gossip(&ack);
                }
                None => {
                    inner.replica_alive.insert(addr, false);
                }
            }
        }
    }

    /// This node's current outbound delta, exposed so tests can drive a
    /// gossip exchange directly without going over HTTP.
    pub fn outbound_delta(&self) -> GossipPayload {
        self.inner.lock().outbound_gossip_payload()
    }

    /// Merges a peer's gossip payload (e.g. the reply from [`Node::gossip_ack`])
    /// into local state.
    pub fn merge_gossip(&self, payload: &GossipPayload) {
        self.inner.lock().apply_gossip(payload);
    }

    /// The inbound side: a peer pushed its deltas to us. If it is in our
    /// shard, merge and reply with our own delta; otherwise reply nothing.
    pub fn gossip_ack(&self, incoming: GossipPayload) -> Option<GossipPayload> {
        let mut inner = self.inner.lock();
        let in_shard = inner.shard_replicas().iter().any(|a| a == &incoming.address);
        if !in_shard {
            return None;
        }
        inner.apply_gossip(&incoming);
        Some(inner.outbound_gossip_payload())
    }

    // ---- view change coordinator ----------------------------------------

    pub async fn try_reshard(&self, view: String, repl_factor: usize) -> Result<ViewChangeResponse, NodeError> {
        let (is_leader, proxy_target) = {
            let inner = self.inner.lock();
            match inner.this_shard {
                Some(shard) => {
                    let leader = inner.view.leader_of(shard).map(|s| s.to_string());
                    (leader.as_deref() == Some(inner.address.as_str()), leader)
                }
                None => (false, inner.view.leader_of(0).map(|s| s.to_string())),
            }
        };

        if is_leader {
            return Ok(self.initiate_reshard(view, repl_factor).await);
        }

        let target = proxy_target.ok_or(NodeError::ShardUnreachable)?;
        let req = ViewChangeRequest { view, repl_factor };
        self.peer
            .view_change(&target, &req)
            .await
            .ok_or(NodeError::ShardUnreachable)
    }

    async fn initiate_reshard(&self, view: String, repl_factor: usize) -> ViewChangeResponse {
        let old_view = self.inner.lock().view.clone();
        let old_leaders: Vec<String> = old_view
            .all_shard_ids()
            .filter_map(|s| old_view.leader_of(s).map(String::from))
            .collect();
        let self_addr = self.address();

        info!(new_view = %view, repl_factor, "initiating reshard");

        // Step 1: prime every old shard leader.
        let mut current_views = Vec::new();
        for leader in &old_leaders {
            let cv = if *leader == self_addr {
                Some(self.prime().await.current_view)
            } else {
                self.peer.reshard_prime(leader).await.map(|r| r.current_view)
            };
            if let Some(cv) = cv {
                current_views.push(cv);
            }
        }
        let new_current_view = current_views.into_iter().max().unwrap_or(self.current_view()) + 1;

        // Step 2/3: bump and broadcast the new view.
        let new_view = View::parse(&view, repl_factor);
        let mut targets: HashSet<String> = old_view.addrs().iter().cloned().collect();
        targets.extend(new_view.addrs().iter().cloned());
        let set_req = SetNewViewRequest { view: view.clone(), repl_factor, current_view: new_current_view };
        for addr in &targets {
            if *addr == self_addr {
                continue;
            }
            self.peer.reshard_set_new_view(addr, &set_req).await;
        }
        self.set_new_view(view.clone(), repl_factor, new_current_view);

        // Step 4: rehash at old leaders.
        for leader in &old_leaders {
            if *leader == self_addr {
                self.rehash();
            } else {
                self.peer.reshard_rehash(leader).await;
            }
        }

        // Step 5: fragment exchange.
        for leader in &old_leaders {
            if *leader == self_addr {
                self.distribute_fragments().await;
            } else {
                self.peer.reshard_distribute_fragments(leader).await;
            }
        }

        // Step 6: intra-shard distribution by new leaders, step 7: aggregate.
        let mut summaries = Vec::new();
        for shard_id in new_view.all_shard_ids() {
            let Some(leader) = new_view.leader_of(shard_id).map(String::from) else { continue };
            let summary = if leader == self_addr {
                Some(self.distribute_keys().await)
            } else {
                self.peer.reshard_send_to_replicas(&leader).await
            };
            if let Some(s) = summary {
                summaries.push(s);
            } else {
                warn!(shard_id, %leader, "reshard: new shard leader unreachable for final distribution");
            }
        }

        ViewChangeResponse { shards: summaries }
    }

    /// Leader-side priming: gather every follower's keys (merging only
    /// strictly newer entries) and return the pre-bump current view.
    pub async fn prime(&self) -> PrimeResponse {
        let (followers, current_view) = {
            let inner = self.inner.lock();
            let me = inner.address.clone();
            (
                inner.shard_replicas().into_iter().filter(|a| a != &me).collect::<Vec<_>>(),
                inner.current_view,
            )
        };
        let futs = followers.iter().map(|addr| {
            let addr = addr.clone();
            async move { self.peer.reshard_get_keys(&addr).await }
        });
        let results = join_all(futs).await;
        let mut inner = self.inner.lock();
        for result in results.into_iter().flatten() {
            inner.merge_follower_keys(result.keys, result.history);
        }
        PrimeResponse { current_view }
    }

    /// Follower-side: hand over everything we have and clear local state.
    pub fn get_keys(&self) -> GetKeysResponse {
        let mut inner = self.inner.lock();
        let (keys, history) = inner.take_all_and_clear();
        GetKeysResponse { keys, history }
    }

    pub fn set_new_view(&self, view: String, repl_factor: usize, current_view: u64) {
        let new_view = View::parse(&view, repl_factor);
        self.inner.lock().set_view(new_view, current_view);
    }

    pub fn rehash(&self) {
        self.inner.lock().rehash_into_fragments();
    }

    /// Step 5: send each fragment to the leader of its destination shard
    /// under the (already-installed) new view.
    pub async fn distribute_fragments(&self) {
        let self_addr = self.address();
        let tasks: Vec<(usize, String)> = {
            let inner = self.inner.lock();
            inner
                .view
                .all_shard_ids()
                .filter_map(|shard_id| inner.view.leader_of(shard_id).map(|l| (shard_id, l.to_string())))
                .collect()
        };
        for (shard_id, leader) in tasks {
            let fragment = self.inner.lock().take_fragment(shard_id);
            if fragment.is_empty() {
                continue;
            }
            if leader == self_addr {
                self.inner.lock().merge_payload(fragment);
            } else {
                self.peer
                    .reshard_put_payload(&leader, &PutPayloadRequest { payload: fragment })
                    .await;
            }
        }
    }

    pub fn put_payload(&self, fragment: std::collections::HashMap<String, String>) {
        self.inner.lock().merge_payload(fragment);
    }

    /// Step 6: the new shard leader pushes its assembled state to its
    /// followers.
    pub async fn distribute_keys(&self) -> ShardSummary {
        let (shard_id, followers, payload, key_count, replicas) = {
            let inner = self.inner.lock();
            let shard_id = inner.this_shard.unwrap_or(0);
            let replicas = inner.shard_replicas();
            let followers: Vec<String> = replicas.iter().filter(|a| *a != &inner.address).cloned().collect();
            (shard_id, followers, inner.full_payload(), inner.key_count(), replicas)
        };
        let futs = followers.iter().map(|addr| {
            let addr = addr.clone();
            let payload = payload.clone();
            async move {
                self.peer
                    .reshard_put_payload(&addr, &PutPayloadRequest { payload })
                    .await
            }
        });
        join_all(futs).await;
        ShardSummary { shard_id, key_count, replicas }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Ok,
    Created,
    NotFound,
}
