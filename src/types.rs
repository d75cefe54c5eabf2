use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

pub type HashMap<K, V> = FxHashMap<K, V>;

pub type HashSet<K> = FxHashSet<K>;

/// Length of one simulation step in milliseconds.
pub const DT_MS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpikeMonitorHandle(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionMonitorHandle(pub(crate) usize);

/// A spike of neuron `nid` at simulation step `t`. Depending on the producer,
/// `nid` is either a global neuron id or an index local to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpikeEvent {
    pub nid: usize,
    pub t: usize,
}
