use std::ops::Range;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::params::{ConnectionParams, Grid3D, RadiusRF, Topology};
use crate::types::ConnectionId;
use crate::util::calculate_hash;

const POSITION_EPSILON: f32 = 1e-6;

/// One synapse of a connection, with group-local neuron indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct SynapseSpec {
    pub pre_idx: usize,
    pub post_idx: usize,
    pub conduction_delay: u8,
    pub weight: f32,
}

/// Both ends of a connection as laid out in the global neuron id space.
#[derive(Debug, Clone, Copy)]
pub struct Endpoints<'a> {
    pub from_grid: &'a Grid3D,
    pub from_nid_start: usize,
    pub to_grid: &'a Grid3D,
    pub to_nid_start: usize,
}

/// Position of a neuron on its group's grid, centred on the origin.
pub fn grid_position(grid: &Grid3D, idx: usize) -> [f32; 3] {
    let x = idx % grid.x;
    let y = (idx / grid.x) % grid.y;
    let z = idx / (grid.x * grid.y);

    [
        x as f32 - (grid.x - 1) as f32 / 2.0,
        y as f32 - (grid.y - 1) as f32 / 2.0,
        z as f32 - (grid.z - 1) as f32 / 2.0,
    ]
}

pub fn is_within_receptive_field(radius: &RadiusRF, pre: [f32; 3], post: [f32; 3]) -> bool {
    let mut normalized_distance = 0.0;

    for (r, delta) in [
        (radius.x, post[0] - pre[0]),
        (radius.y, post[1] - pre[1]),
        (radius.z, post[2] - pre[2]),
    ] {
        if r < 0.0 {
            continue;
        }

        if r == 0.0 {
            if delta.abs() > POSITION_EPSILON {
                return false;
            }
            continue;
        }

        normalized_distance += (delta / r).powi(2);
    }

    normalized_distance <= 1.0 + POSITION_EPSILON
}

fn is_admitted_by_topology(topology: &Topology, pre_idx: usize, post_idx: usize, rng: &mut StdRng) -> bool {
    match *topology {
        Topology::Full => true,
        Topology::FullNoDirect => pre_idx != post_idx,
        Topology::OneToOne => pre_idx == post_idx,
        Topology::Random { probability } => rng.gen::<f64>() < probability,
    }
}

fn compute_initial_weight(conn_params: &ConnectionParams, rng: &mut StdRng) -> f32 {
    let weight_range = &conn_params.weight_range;
    let init_weight = weight_range.initial_weight(conn_params.init_weight_fraction);

    match conn_params.topology {
        Topology::Random { .. } => rng.gen_range(weight_range.min..=init_weight),
        _ => init_weight,
    }
}

fn compute_conduction_delay(conn_params: &ConnectionParams, rng: &mut StdRng) -> u8 {
    rng.gen_range(conn_params.delay_range.min..=conn_params.delay_range.max)
}

/// Generates the synapses of a connection that end in `post_range`. Every pair
/// draws from its own generator, so the result for a neuron does not depend on
/// how the destination group is split up.
pub fn build_synapses(
    conn_params: &ConnectionParams,
    connection_id: ConnectionId,
    endpoints: Endpoints,
    post_range: Range<usize>,
    seed: u64,
) -> Vec<SynapseSpec> {
    let mut synapses = Vec::new();
    let num_pre = endpoints.from_grid.num_neurons();

    for pre_idx in 0..num_pre {
        let pre_position = grid_position(endpoints.from_grid, pre_idx);
        let pre_nid = endpoints.from_nid_start + pre_idx;

        for post_idx in post_range.clone() {
            let post_position = grid_position(endpoints.to_grid, post_idx);

            if !is_within_receptive_field(&conn_params.radius, pre_position, post_position) {
                continue;
            }

            let post_nid = endpoints.to_nid_start + post_idx;

            let mut rng = StdRng::seed_from_u64(calculate_hash(&(
                seed,
                pre_nid,
                post_nid,
                connection_id.0,
            )));

            if !is_admitted_by_topology(&conn_params.topology, pre_idx, post_idx, &mut rng) {
                continue;
            }

            let conduction_delay = compute_conduction_delay(conn_params, &mut rng);
            let weight = compute_initial_weight(conn_params, &mut rng);

            synapses.push(SynapseSpec {
                pre_idx,
                post_idx,
                conduction_delay,
                weight,
            });
        }
    }

    synapses
}
