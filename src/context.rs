use crate::history::CausalHistory;
use crate::vector_clock::VectorClock;
use serde::{Deserialize, Serialize};

/// The client-carried causal context. Any field may be absent on a fresh
/// client or one whose context was scoped to a view that no longer exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CausalContext {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_view: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub high_clock_list: Option<Vec<Option<VectorClock>>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub history: Option<CausalHistory>,
}

impl CausalContext {
    pub fn fresh(num_shards: usize, current_view: u64) -> Self {
        CausalContext {
            current_view: Some(current_view),
            high_clock_list: Some(vec![None; num_shards]),
            history: Some(CausalHistory::new()),
        }
    }

    /// The high clock this node has recorded for `shard`, if any.
    pub fn high_clock(&self, shard: usize) -> Option<&VectorClock> {
        self.high_clock_list
            .as_ref()
            .and_then(|list| list.get(shard))
            .and_then(|slot| slot.as_ref())
    }

    pub fn history_clock(&self, key: &str) -> Option<&VectorClock> {
        self.history.as_ref().and_then(|h| h.get(key))
    }

    /// Discards the parts of the context that were scoped to a view other
    /// than `current_view`, keeping only what is still meaningful.
    pub fn invalidate_if_stale(&mut self, current_view: u64) {
        let is_stale = self.current_view.map(|v| v != current_view).unwrap_or(false);
        if is_stale {
            self.history = None;
            self.high_clock_list = None;
        }
        self.current_view = Some(current_view);
    }

    pub fn ensure_high_clock_list(&mut self, num_shards: usize) -> &mut Vec<Option<VectorClock>> {
        self.high_clock_list
            .get_or_insert_with(|| vec![None; num_shards])
    }

    pub fn ensure_history(&mut self) -> &mut CausalHistory {
        self.history.get_or_insert_with(CausalHistory::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_has_empty_slots() {
        let ctx = CausalContext::fresh(3, 0);
        assert_eq!(ctx.high_clock_list.as_ref().unwrap().len(), 3);
        assert!(ctx.history.as_ref().unwrap().is_empty());
    }

    #[test]
    fn stale_context_is_invalidated() {
        let mut ctx = CausalContext::fresh(2, 0);
        ctx.invalidate_if_stale(1);
        assert!(ctx.history.is_none());
        assert!(ctx.high_clock_list.is_none());
        assert_eq!(ctx.current_view, Some(1));
    }

    #[test]
    fn matching_view_is_preserved() {
        let mut ctx = CausalContext::fresh(2, 0);
        ctx.invalidate_if_stale(0);
        assert!(ctx.history.is_some());
    }
}
