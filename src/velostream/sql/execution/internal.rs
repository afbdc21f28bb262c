//! Internal state types for windowed aggregation.
//!
//! - [`GroupKey`]: evaluated GROUP BY tuple with a pre-computed hash
//! - [`GroupState`]: accumulators and bookkeeping for one (window, group)
//! - [`WindowInstance`]: the groups of one open window, in arrival order

use super::aggregation::accumulator::Accumulator;
use super::types::{FieldValue, StreamRecord};
use super::window_v2::types::WindowBounds;
use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Group key for GROUP BY state lookups.
///
/// The hash is computed once with `FxHasher` when the key is built; equality
/// compares the hash first and the values only on a hash match. Queries without
/// GROUP BY use the empty key. Float components compare by bit pattern, like
/// the hash, so a NaN key is stable.
#[derive(Debug, Clone)]
pub struct GroupKey {
    hash: u64,
    values: Arc<[FieldValue]>,
}

impl GroupKey {
    pub fn new(values: Vec<FieldValue>) -> Self {
        let mut hasher = rustc_hash::FxHasher::default();
        for value in &values {
            value.hash(&mut hasher);
        }
        Self {
            hash: hasher.finish(),
            values: Arc::from(values.into_boxed_slice()),
        }
    }

    /// Key shared by every record of an ungrouped query.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        if self.hash != other.hash {
            return false;
        }
        self.values.len() == other.values.len()
            && self.values.iter().zip(other.values.iter()).all(|(a, b)| a.key_eq(b))
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// Accumulated state for one group inside one window instance.
///
/// Created when the first record of the group reaches the window, dropped when the
/// window fires.
pub struct GroupState {
    /// One accumulator per aggregate slot of the query plan
    pub accumulators: Vec<Box<dyn Accumulator>>,
    /// First record of the group; non-aggregate columns are read from it
    pub sample: StreamRecord,
    pub record_count: u64,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
}

impl GroupState {
    pub fn new(
        accumulators: Vec<Box<dyn Accumulator>>,
        sample: StreamRecord,
        timestamp: i64,
    ) -> Self {
        Self {
            accumulators,
            sample,
            record_count: 0,
            first_timestamp: timestamp,
            last_timestamp: timestamp,
        }
    }

    pub fn touch(&mut self, timestamp: i64) {
        self.record_count += 1;
        self.first_timestamp = self.first_timestamp.min(timestamp);
        self.last_timestamp = self.last_timestamp.max(timestamp);
    }

    /// Final value of every accumulator, in slot order.
    pub fn results(&self) -> Vec<FieldValue> {
        self.accumulators.iter().map(|acc| acc.result()).collect()
    }
}

impl fmt::Debug for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupState")
            .field("accumulators", &self.accumulators.len())
            .field("record_count", &self.record_count)
            .field("first_timestamp", &self.first_timestamp)
            .field("last_timestamp", &self.last_timestamp)
            .finish()
    }
}

/// Groups of one open window instance.
#[derive(Debug)]
pub struct WindowInstance {
    pub bounds: WindowBounds,
    groups: FxHashMap<GroupKey, GroupState>,
    order: Vec<GroupKey>,
}

impl WindowInstance {
    pub fn new(bounds: WindowBounds) -> Self {
        Self {
            bounds,
            groups: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    pub fn group_mut(&mut self, key: &GroupKey) -> Option<&mut GroupState> {
        self.groups.get_mut(key)
    }

    pub fn insert_group(&mut self, key: GroupKey, state: GroupState) {
        if self.groups.insert(key.clone(), state).is_none() {
            self.order.push(key);
        }
    }

    pub fn group_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Consume the instance, yielding groups in first-arrival order.
    pub fn into_groups(mut self) -> Vec<(GroupKey, GroupState)> {
        let mut groups = Vec::with_capacity(self.order.len());
        for key in self.order {
            if let Some(state) = self.groups.remove(&key) {
                groups.push((key, state));
            }
        }
        groups
    }
}
