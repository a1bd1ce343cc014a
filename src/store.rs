use crate::context::CausalContext;
use crate::history::CausalHistory;
use crate::partition::shard_of;
use crate::vector_clock::{VcOrdering, VectorClock};
use crate::view::View;
use crate::wire::GossipPayload;
use std::collections::HashMap;

/// The full mutable state of a node, guarded by a single lock in [`crate::node::Node`].
/// Every method here is synchronous and side-effect-free beyond the struct
/// itself — no network I/O happens while this is held, so the lock is only
/// ever contended by other in-memory mutations.
pub struct NodeInner {
    pub address: String,
    pub view: View,
    pub old_view: Option<View>,
    pub this_shard: Option<usize>,
    pub old_this_shard: Option<usize>,
    pub current_view: u64,
    pub local_kvs: HashMap<String, String>,
    pub per_item_history: HashMap<String, CausalHistory>,
    pub local_key_versions: CausalHistory,
    pub between_gossip_updates: CausalHistory,
    pub cur_time: VectorClock,
    pub replica_alive: HashMap<String, bool>,
    pub fragments: Vec<HashMap<String, String>>,
}

pub enum GetDecision {
    Found { value: String, ctx: CausalContext },
    NotFound { ctx: CausalContext },
    Nack,
}

impl NodeInner {
    pub fn new(address: String, view: View) -> Self {
        let this_shard = view.shard_of_address(&address);
        let mut inner = NodeInner {
            address,
            view,
            old_view: None,
            this_shard,
            old_this_shard: None,
            current_view: 0,
            local_kvs: HashMap::new(),
            per_item_history: HashMap::new(),
            local_key_versions: CausalHistory::new(),
            between_gossip_updates: CausalHistory::new(),
            cur_time: VectorClock::new("", &[]),
            replica_alive: HashMap::new(),
            fragments: Vec::new(),
        };
        inner.reset_histories();
        inner
    }

    pub fn shard_replicas(&self) -> Vec<String> {
        self.this_shard
            .and_then(|s| self.view.shard_replicas(s))
            .map(|r| r.to_vec())
            .unwrap_or_default()
    }

    pub fn num_shards(&self) -> usize {
        self.view.num_shards()
    }

    pub fn shard_of_key(&self, key: &str) -> usize {
        shard_of(key, self.view.num_shards())
    }

    /// Clears all causal state and reinitializes `cur_time` over the
    /// current shard's replica set. Called on construction and after every
    /// successful view change.
    pub fn reset_histories(&mut self) {
        self.per_item_history.clear();
        self.local_key_versions = CausalHistory::new();
        self.between_gossip_updates = CausalHistory::new();
        let replicas = self.shard_replicas();
        self.cur_time = VectorClock::new(self.address.clone(), &replicas);
        self.replica_alive = replicas.into_iter().map(|a| (a, true)).collect();
    }

    pub fn set_view(&mut self, view: View, current_view: u64) {
        self.old_view = Some(self.view.clone());
        self.old_this_shard = self.this_shard;
        self.view = view;
        self.this_shard = self.view.shard_of_address(&self.address);
        self.current_view = current_view;
        self.reset_histories();
    }

    // ---- PUT -----------------------------------------------------------

    pub fn apply_put(&mut self, key: &str, value: String, mut ctx: CausalContext) -> (bool, CausalContext) {
        ctx.invalidate_if_stale(self.current_view);

        if let Some(shard) = self.this_shard {
            if let Some(peer_clock) = ctx.high_clock(shard) {
                self.cur_time.merge(peer_clock);
            }
        }
        self.cur_time.increment();

        let replaced = self.local_kvs.insert(key.to_string(), value).is_some();

        let mut item_history = ctx.history.clone().unwrap_or_default();
        item_history.insert(key.to_string(), self.cur_time.clone());
        self.per_item_history.insert(key.to_string(), item_history.clone());
        self.local_key_versions.insert(key.to_string(), self.cur_time.clone());
        self.between_gossip_updates.insert(key.to_string(), self.cur_time.clone());

        let num_shards = self.num_shards();
        let mut response_ctx = ctx;
        response_ctx.current_view = Some(self.current_view);
        let merged_history = response_ctx.ensure_history();
        merged_history.merge(&item_history);
        if let Some(shard) = self.this_shard {
            let list = response_ctx.ensure_high_clock_list(num_shards);
            if shard < list.len() {
                list[shard] = Some(self.cur_time.clone());
            }
        }

        (replaced, response_ctx)
    }

    // ---- GET -----------------------------------------------------------

    pub fn decide_get(&mut self, key: &str, mut ctx: CausalContext) -> GetDecision {
        // Only a client trailing behind our view (current_view < ours) has
        // its context treated as stale and overridden here; a client ahead
        // of us (possible mid view-broadcast) must still pass the ordinary
        // VC-compare check against its real history, so this is `<` and not
        // `!=` unlike PUT's invalidation trigger.
        let was_stale_view = ctx
            .current_view
            .map(|v| v < self.current_view)
            .unwrap_or(false);
        if was_stale_view {
            ctx.history = None;
            ctx.high_clock_list = None;
        }
        ctx.current_view = Some(self.current_view);

        let local_vc = self.local_key_versions.get(key).cloned();
        let client_vc = ctx.history_clock(key).cloned();
        let cmp = VectorClock::compare_opt(local_vc.as_ref(), client_vc.as_ref());

        let safe = local_vc.is_none()
            || matches!(cmp, VcOrdering::Greater | VcOrdering::Equal)
            || was_stale_view;

        if !safe {
            if let Some(shard) = self.this_shard {
                if let Some(peer_clock) = ctx.high_clock(shard) {
                    self.cur_time.merge(peer_clock);
                }
            }
            return GetDecision::Nack;
        }

        if let Some(shard) = self.this_shard {
            if let Some(peer_clock) = ctx.high_clock(shard) {
                self.cur_time.merge(peer_clock);
            }
        }
        let num_shards = self.num_shards();
        if let Some(shard) = self.this_shard {
            let list = ctx.ensure_high_clock_list(num_shards);
            if shard < list.len() {
                list[shard] = Some(self.cur_time.clone());
            }
        }
        if let Some(item_hist) = self.per_item_history.get(key) {
            ctx.ensure_history().merge(item_hist);
        }

        match self.local_kvs.get(key) {
            Some(value) => GetDecision::Found { value: value.clone(), ctx },
            None => GetDecision::NotFound { ctx },
        }
    }

    // ---- Gossip ----------------------------------------------------------

    pub fn outbound_gossip_payload(&self) -> GossipPayload {
        let items: HashMap<String, String> = self
            .between_gossip_updates
            .keys()
            .filter_map(|k| self.local_kvs.get(k).map(|v| (k.clone(), v.clone())))
            .collect();
        let item_history: HashMap<String, CausalHistory> = self
            .between_gossip_updates
            .keys()
            .filter_map(|k| self.per_item_history.get(k).map(|h| (k.clone(), h.clone())))
            .collect();
        GossipPayload {
            items,
            item_history,
            updated_key_times: self.between_gossip_updates.clone(),
            vector_clock: self.cur_time.clone(),
            address: self.address.clone(),
        }
    }

    /// Merges a peer's gossip payload into local state. Returns the keys
    /// that were actually advanced.
    pub fn apply_gossip(&mut self, incoming: &GossipPayload) -> Vec<String> {
        let updated = self.local_key_versions.merge(&incoming.updated_key_times);
        for key in &updated {
            if let Some(value) = incoming.items.get(key) {
                self.local_kvs.insert(key.clone(), value.clone());
            }
            if let Some(hist) = incoming.item_history.get(key) {
                self.per_item_history.insert(key.clone(), hist.clone());
            }
        }
        self.cur_time.merge(&incoming.vector_clock);
        updated
    }

    // ---- Reshard -----------------------------------------------------

    /// Gathers a follower's full local state for the priming step, then
    /// clears its own state as the reference implementation does.
    pub fn take_all_and_clear(&mut self) -> (HashMap<String, String>, HashMap<String, CausalHistory>) {
        let keys = std::mem::take(&mut self.local_kvs);
        let history = std::mem::take(&mut self.per_item_history);
        self.local_key_versions = CausalHistory::new();
        self.between_gossip_updates = CausalHistory::new();
        (keys, history)
    }

    /// Merges keys gathered from a follower into self, keeping only entries
    /// that strictly dominate what self already has on record.
    pub fn merge_follower_keys(
        &mut self,
        keys: HashMap<String, String>,
        history: HashMap<String, CausalHistory>,
    ) {
        for (key, value) in keys {
            let incoming_clock = history.get(&key).and_then(|h| h.get(&key).cloned());
            let take = match (&incoming_clock, self.local_key_versions.get(&key)) {
                (Some(incoming), Some(existing)) => {
                    VectorClock::compare(incoming, existing) == VcOrdering::Greater
                }
                _ => true,
            };
            if take {
                if let Some(item_hist) = history.get(&key) {
                    self.per_item_history.insert(key.clone(), item_hist.clone());
                }
                if let Some(clock) = incoming_clock {
                    self.local_key_versions.insert(key.clone(), clock);
                }
                self.local_kvs.insert(key, value);
            }
        }
    }

    /// Partitions the merged key set into one fragment per shard of the
    /// (already-installed) new view, clearing local storage in the process.
    ///
    /// Only values cross this boundary, never per-key history: per §4.5's
    /// post-reshard invariant, histories start empty on the new shard
    /// regardless, so there is nothing to gain from carrying them along —
    /// matching the reference's `put_payload`, which is a plain `dict.update`.
    pub fn rehash_into_fragments(&mut self) {
        let num_new_shards = self.num_shards();
        let mut fragments = vec![HashMap::new(); num_new_shards.max(1)];
        self.per_item_history.clear();
        for (key, value) in self.local_kvs.drain() {
            let shard = shard_of(&key, num_new_shards);
            fragments[shard].insert(key, value);
        }
        self.fragments = fragments;
    }

    pub fn take_fragment(&mut self, shard_id: usize) -> HashMap<String, String> {
        self.fragments.get_mut(shard_id).map(std::mem::take).unwrap_or_default()
    }

    /// Merges an incoming flat key/value payload (from another old shard
    /// leader's fragment, or the intra-shard distribution step) into local
    /// storage, last-write-wins (`dict.update`).
    pub fn merge_payload(&mut self, payload: HashMap<String, String>) {
        self.local_kvs.extend(payload);
    }

    pub fn full_payload(&self) -> HashMap<String, String> {
        self.local_kvs.clone()
    }

    pub fn key_count(&self) -> usize {
        self.local_kvs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner(addr: &str, view: &str, rf: usize) -> NodeInner {
        NodeInner::new(addr.to_string(), View::parse(view, rf))
    }

    #[test]
    fn put_inserts_and_marks_new() {
        let mut n = inner("n1", "n1,n2", 2);
        let (replaced, ctx) = n.apply_put("alpha", "1".to_string(), CausalContext::default());
        assert!(!replaced);
        assert_eq!(n.local_kvs.get("alpha"), Some(&"1".to_string()));
        assert!(ctx.history_clock("alpha").is_some());
    }

    #[test]
    fn put_then_get_is_safe_with_returned_context() {
        let mut n = inner("n1", "n1,n2", 2);
        let (_, ctx) = n.apply_put("alpha", "1".to_string(), CausalContext::default());
        match n.decide_get("alpha", ctx) {
            GetDecision::Found { value, .. } => assert_eq!(value, "1"),
            _ => panic!("expected Found"),
        }
    }

    #[test]
    fn get_with_unmet_dependency_is_nacked() {
        let mut n = inner("n1", "n1,n2", 2);
        let mut ahead = VectorClock::new("n2", &["n1".to_string(), "n2".to_string()]);
        ahead.set("n1", 5);
        let mut hist = CausalHistory::new();
        hist.insert("alpha", ahead);
        let ctx = CausalContext {
            current_view: Some(0),
            high_clock_list: Some(vec![None, None]),
            history: Some(hist),
        };
        match n.decide_get("alpha", ctx) {
            GetDecision::Nack => {}
            _ => panic!("expected Nack"),
        }
    }

    #[test]
    fn gossip_merge_advances_dominated_keys() {
        let mut local = inner("n1", "n1,n2", 2);
        let mut remote = inner("n2", "n1,n2", 2);
        let (_, _) = remote.apply_put("alpha", "x".to_string(), CausalContext::default());
        let payload = remote.outbound_gossip_payload();
        let updated = local.apply_gossip(&payload);
        assert_eq!(updated, vec!["alpha".to_string()]);
        assert_eq!(local.local_kvs.get("alpha"), Some(&"x".to_string()));
    }

    #[test]
    fn rehash_partitions_by_new_shard_count() {
        let mut n = inner("n1", "n1", 1);
        n.apply_put("a", "1".to_string(), CausalContext::default());
        n.apply_put("b", "2".to_string(), CausalContext::default());
        n.set_view(View::parse("n1,n2", 1), 1);
        n.rehash_into_fragments();
        let total: usize = n.fragments.iter().map(|f| f.len()).sum();
        assert_eq!(total, 2);
        assert!(n.local_kvs.is_empty());
    }
}
