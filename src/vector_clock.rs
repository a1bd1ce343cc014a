use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Per-replica logical time over a fixed set of addresses, with a
/// distinguished owner used to break ties between otherwise-incomparable
/// clocks.
///
/// Wire format is a flat map: `{"addr": "<owner>", "<replica>": <count>, ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorClock {
    owner: String,
    clock: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcOrdering {
    Less,
    Equal,
    Greater,
}

impl VectorClock {
    /// A fresh clock owned by `owner`, zeroed over `addrs` (which must
    /// include `owner`).
    pub fn new(owner: impl Into<String>, addrs: &[String]) -> Self {
        let owner = owner.into();
        let clock = addrs.iter().map(|a| (a.clone(), 0)).collect();
        VectorClock { owner, clock }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn get(&self, addr: &str) -> u64 {
        self.clock.get(addr).copied().unwrap_or(0)
    }

    pub fn set(&mut self, addr: &str, value: u64) {
        self.clock.insert(addr.to_string(), value);
    }

    pub fn increment(&mut self) {
        let owner = self.owner.clone();
        *self.clock.entry(owner).or_insert(0) += 1;
    }

    /// Pointwise max of every coordinate the two clocks share or either
    /// defines.
    pub fn merge(&mut self, other: &VectorClock) {
        for (addr, &value) in &other.clock {
            let slot = self.clock.entry(addr.clone()).or_insert(0);
            if value > *slot {
                *slot = value;
            }
        }
    }

    /// Total order over two present clocks: concurrent clocks are broken by
    /// comparing owner addresses lexicographically — the smaller owner wins.
    pub fn compare(a: &VectorClock, b: &VectorClock) -> VcOrdering {
        let mut greater = false;
        let mut less = false;
        for addr in a.clock.keys().chain(b.clock.keys()) {
            let av = a.get(addr);
            let bv = b.get(addr);
            if av > bv {
                greater = true;
            } else if av < bv {
                less = true;
            }
        }
        match (greater, less) {
            (false, false) => VcOrdering::Equal,
            (true, false) => VcOrdering::Greater,
            (false, true) => VcOrdering::Less,
            (true, true) => {
                if a.owner <= b.owner {
                    VcOrdering::Greater
                } else {
                    VcOrdering::Less
                }
            }
        }
    }

    /// `compare` lifted over possibly-absent clocks: an absent clock always
    /// compares as `Less` than a present one, and two absent clocks are
    /// `Equal`.
    pub fn compare_opt(a: Option<&VectorClock>, b: Option<&VectorClock>) -> VcOrdering {
        match (a, b) {
            (None, None) => VcOrdering::Equal,
            (None, Some(_)) => VcOrdering::Less,
            (Some(_), None) => VcOrdering::Greater,
            (Some(a), Some(b)) => VectorClock::compare(a, b),
        }
    }
}

impl Serialize for VectorClock {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.clock.len() + 1))?;
        map.serialize_entry("addr", &self.owner)?;
        for (addr, count) in &self.clock {
            map.serialize_entry(addr, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for VectorClock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VcVisitor;

        impl<'de> Visitor<'de> for VcVisitor {
            type Value = VectorClock;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a flat vector clock map with an \"addr\" owner field")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut owner = None;
                let mut clock = BTreeMap::new();
                while let Some(key) = map.next_key::<String>()? {
                    if key == "addr" {
                        owner = Some(map.next_value::<String>()?);
                    } else {
                        let value = map.next_value::<u64>()?;
                        clock.insert(key, value);
                    }
                }
                let owner = owner.ok_or_else(|| serde::de::Error::missing_field("addr"))?;
                Ok(VectorClock { owner, clock })
            }
        }

        deserializer.deserialize_map(VcVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs() -> Vec<String> {
        vec!["n1".to_string(), "n2".to_string()]
    }

    #[test]
    fn identical_clocks_are_equal() {
        let a = VectorClock::new("n1", &addrs());
        let b = VectorClock::new("n1", &addrs());
        assert_eq!(VectorClock::compare(&a, &b), VcOrdering::Equal);
    }

    #[test]
    fn dominated_clock_is_less() {
        let mut a = VectorClock::new("n1", &addrs());
        a.increment();
        let b = VectorClock::new("n1", &addrs());
        assert_eq!(VectorClock::compare(&b, &a), VcOrdering::Less);
        assert_eq!(VectorClock::compare(&a, &b), VcOrdering::Greater);
    }

    #[test]
    fn concurrent_clocks_break_tie_on_owner() {
        let mut a = VectorClock::new("n1", &addrs());
        a.set("n1", 2);
        a.set("n2", 1);
        let mut b = VectorClock::new("n2", &addrs());
        b.set("n1", 1);
        b.set("n2", 2);
        assert_eq!(VectorClock::compare(&a, &b), VcOrdering::Greater);
        assert_eq!(VectorClock::compare(&b, &a), VcOrdering::Less);
    }

    #[test]
    fn absent_clock_compares_less() {
        let a = VectorClock::new("n1", &addrs());
        assert_eq!(VectorClock::compare_opt(None, Some(&a)), VcOrdering::Less);
        assert_eq!(VectorClock::compare_opt(Some(&a), None), VcOrdering::Greater);
        assert_eq!(VectorClock::compare_opt(None, None), VcOrdering::Equal);
    }

    #[test]
    fn round_trips_through_json() {
        let mut a = VectorClock::new("n1", &addrs());
        a.increment();
        let encoded = serde_json::to_string(&a).unwrap();
        let decoded: VectorClock = serde_json::from_str(&encoded).unwrap();
        assert_eq!(a, decoded);
    }

    #[test]
    fn merge_takes_pointwise_max() {
        let mut a = VectorClock::new("n1", &addrs());
        a.set("n1", 3);
        a.set("n2", 1);
        let mut b = VectorClock::new("n2", &addrs());
        b.set("n1", 1);
        b.set("n2", 5);
        a.merge(&b);
        assert_eq!(a.get("n1"), 3);
        assert_eq!(a.get("n2"), 5);
    }
}
