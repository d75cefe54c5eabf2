use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Range;

/// Location of a synapse inside a partition: presynaptic neuron, index of the
/// projection among those leaving that neuron, index of the synapse in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynapseCoordinate {
    pub pre_syn_nid: usize,
    pub projection_idx: usize,
    pub synapse_idx: usize,
}

pub fn get_decay_factor(t: usize, last_t: usize, tau: f32) -> f32 {
    let t_diff = t - last_t;
    (-(t_diff as f32) / tau).exp()
}

pub fn get_step_decay_factor(tau: f32) -> f32 {
    get_decay_factor(1, 0, tau)
}

pub fn calculate_hash<T: Hash>(t: &T) -> u64 {
    let mut s = DefaultHasher::new();
    t.hash(&mut s);
    s.finish()
}

pub fn get_partition_range(
    num_threads: usize,
    thread_id: usize,
    num_neurons_in_group: usize,
) -> Range<usize> {
    let min_partition_size = num_neurons_in_group / num_threads;
    let remainder = num_neurons_in_group % num_threads;

    if thread_id < remainder {
        let partition_size = min_partition_size + 1;
        let start = partition_size * thread_id;
        let end = start + partition_size;
        Range { start, end }
    } else {
        let start =
            (min_partition_size + 1) * remainder + min_partition_size * (thread_id - remainder);
        let end = start + min_partition_size;
        Range { start, end }
    }
}
