use crate::vector_clock::{VcOrdering, VectorClock};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Causal history: the latest known vector clock for each key.
///
/// On the wire each entry's clock is itself JSON-encoded and stored as a
/// string (`{"key": "<json-of-vc>"}`), matching the reference
/// implementation's `HistoryEncoder`/`HistoryDecoder` rather than nesting the
/// clock as a JSON object — kept for fidelity with `causal-context` bodies
/// produced by any client written against that wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CausalHistory {
    hist: BTreeMap<String, VectorClock>,
}

impl CausalHistory {
    pub fn new() -> Self {
        CausalHistory::default()
    }

    pub fn get(&self, key: &str) -> Option<&VectorClock> {
        self.hist.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.hist.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VectorClock)> {
        self.hist.iter()
    }

    pub fn len(&self) -> usize {
        self.hist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    /// Inserts `clock` at `key` if `key` is absent or `clock` strictly
    /// dominates the stored clock. Returns whether the insert took effect.
    pub fn insert(&mut self, key: impl Into<String>, clock: VectorClock) -> bool {
        let key = key.into();
        let should_insert = match self.hist.get(&key) {
            None => true,
            Some(existing) => VectorClock::compare(&clock, existing) == VcOrdering::Greater,
        };
        if should_insert {
            self.hist.insert(key, clock);
        }
        should_insert
    }

    /// Merges `other` into `self`, returning the keys that were actually
    /// updated.
    pub fn merge(&mut self, other: &CausalHistory) -> Vec<String> {
        let mut updated = Vec::new();
        for (key, clock) in &other.hist {
            if self.insert(key.clone(), clock.clone()) {
                updated.push(key.clone());
            }
        }
        updated
    }
}

impl Serialize for CausalHistory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.hist.len()))?;
        for (key, clock) in &self.hist {
            let encoded = serde_json::to_string(clock).map_err(serde::ser::Error::custom)?;
            map.serialize_entry(key, &encoded)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CausalHistory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HistVisitor;

        impl<'de> Visitor<'de> for HistVisitor {
            type Value = CausalHistory;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of key to JSON-encoded vector clock string")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut hist = CausalHistory::new();
                while let Some(key) = map.next_key::<String>()? {
                    let raw = map.next_value::<String>()?;
                    let clock: VectorClock =
                        serde_json::from_str(&raw).map_err(serde::de::Error::custom)?;
                    hist.insert(key, clock);
                }
                Ok(hist)
            }
        }

        deserializer.deserialize_map(HistVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs() -> Vec<String> {
        vec!["n1".to_string(), "n2".to_string()]
    }

    #[test]
    fn insert_rejects_dominated_clock() {
        let mut h = CausalHistory::new();
        let mut newer = VectorClock::new("n1", &addrs());
        newer.increment();
        assert!(h.insert("a", newer.clone()));

        let older = VectorClock::new("n1", &addrs());
        assert!(!h.insert("a", older));
        assert_eq!(h.get("a"), Some(&newer));
    }

    #[test]
    fn merge_returns_only_updated_keys() {
        let mut local = CausalHistory::new();
        let mut clock_a = VectorClock::new("n1", &addrs());
        clock_a.increment();
        local.insert("a", clock_a.clone());

        let mut incoming = CausalHistory::new();
        incoming.insert("a", clock_a.clone());
        let mut clock_b = VectorClock::new("n2", &addrs());
        clock_b.increment();
        incoming.insert("b", clock_b);

        let updated = local.merge(&incoming);
        assert_eq!(updated, vec!["b".to_string()]);
    }

    #[test]
    fn round_trips_through_json() {
        let mut h = CausalHistory::new();
        let mut clock = VectorClock::new("n1", &addrs());
        clock.increment();
        h.insert("a", clock);

        let encoded = serde_json::to_string(&h).unwrap();
        let decoded: CausalHistory = serde_json::from_str(&encoded).unwrap();
        assert_eq!(h, decoded);
    }
}
