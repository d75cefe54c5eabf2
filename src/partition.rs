use std::sync::mpsc::Sender as MpscSender;

use bus::BusReader;
use itertools::Itertools;

use crate::delay_line::DelayLine;
use crate::neuron::{ConductanceDecay, IntegrationOutcome, Neuron};
use crate::params::{
    GroupParams, IzhikevichParams, NetworkParams, NeuronModel, Polarity, RangeWeight, StdpCurve,
};
use crate::plasticity::{self, Homeostasis};
use crate::rate_generator::PoissonSpikeTrain;
use crate::state_snapshot::SynapseWeight;
use crate::synapse::Synapse;
use crate::types::{ConnectionId, GroupId, HashMap};
use crate::util::{self, SynapseCoordinate};
use crate::wiring::{self, Endpoints};

#[derive(Debug, Clone)]
pub enum Request {
    Tick(TickContext),
    ExtractWeights {
        connection_id: ConnectionId,
    },
    SetWeight {
        connection_id: ConnectionId,
        pre_syn_nid: usize,
        post_syn_nid: usize,
        weight: f32,
    },
    SetRates {
        group_id: GroupId,
        rates: Vec<f32>,
    },
}

#[derive(Debug, Clone)]
pub struct TickContext {
    pub t: usize,
    /// Global ids of the neurons that spiked in the previous tick.
    pub spiked_nids: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct PartitionGroupResult {
    pub spiking_nids: Vec<usize>,
    pub synaptic_transmission_count: usize,
    pub unstable_nids: Vec<usize>,
}

/// Reply channels of one worker thread.
pub struct PartitionChannels {
    pub result_tx: MpscSender<PartitionGroupResult>,
    pub weights_tx: MpscSender<Vec<SynapseWeight>>,
    pub ack_tx: MpscSender<bool>,
}

enum PartitionNeurons {
    Poisson(PoissonSpikeTrain),
    Dynamical {
        params: IzhikevichParams,
        neurons: Vec<Neuron>,
    },
}

struct StdpRule {
    curve: StdpCurve,
    window: usize,
}

/// Synapses leaving one presynaptic neuron through one connection.
struct Projection {
    connection_id: ConnectionId,
    pre_nid_start: usize,
    polarity: Polarity,
    weight_range: RangeWeight,
    is_plastic: bool,
    synapses: Vec<Synapse>,
}

#[derive(Debug, Clone)]
struct Transmission {
    neuron_idx: usize,
    syn_coord: SynapseCoordinate,
}

/// The neurons `group_offset..group_offset + n` of one group, together with
/// every synapse that ends in them.
pub struct Partition {
    group_id: GroupId,
    nid_start: usize,
    group_offset: usize,
    neurons: PartitionNeurons,
    nid_to_projections: HashMap<usize, Vec<Projection>>,
    incoming_plastic: Vec<Vec<SynapseCoordinate>>,
    delay_line: DelayLine<Transmission>,
    conductance_decay: Option<ConductanceDecay>,
    stdp: Option<StdpRule>,
    homeostasis: Option<Homeostasis>,
    spiked_neuron_idxs: Vec<usize>,
    plastic_arrivals: Vec<SynapseCoordinate>,
}

pub fn create_partitions(
    num_threads: usize,
    thread_id: usize,
    params: &NetworkParams,
) -> Vec<Partition> {
    let group_nid_starts = params.group_nid_starts();
    let seed = params.seed();
    let conductance_decay = params.conductances.as_ref().map(ConductanceDecay::new);

    let mut partitions = Vec::new();

    for (group_idx, group_params) in params.groups.iter().enumerate() {
        let partition_range =
            util::get_partition_range(num_threads, thread_id, group_params.num_neurons);

        if partition_range.is_empty() {
            continue;
        }

        let nid_start = group_nid_starts[group_idx] + partition_range.start;
        let num_neurons = partition_range.len();

        let neurons = match &group_params.model {
            NeuronModel::PoissonSource { rates } => {
                let rates = rates
                    .as_ref()
                    .map(|rates| rates[partition_range.clone()].to_vec())
                    .unwrap_or_else(|| vec![0.0; num_neurons]);
                PartitionNeurons::Poisson(PoissonSpikeTrain::new(nid_start, &rates, seed))
            }
            NeuronModel::Dynamical { params: izh_params } => {
                let izh_params = izh_params.unwrap_or_else(IzhikevichParams::regular_spiking);
                PartitionNeurons::Dynamical {
                    params: izh_params,
                    neurons: (0..num_neurons).map(|_| Neuron::new(&izh_params)).collect(),
                }
            }
        };

        let mut nid_to_projections: HashMap<usize, Vec<Projection>> = HashMap::default();

        for (connection_idx, conn_params) in params.connections.iter().enumerate() {
            if conn_params.to.0 != group_idx {
                continue;
            }

            let from_group = &params.groups[conn_params.from.0];
            let from_nid_start = group_nid_starts[conn_params.from.0];

            let endpoints = Endpoints {
                from_grid: &from_group.grid,
                from_nid_start,
                to_grid: &group_params.grid,
                to_nid_start: group_nid_starts[group_idx],
            };

            let synapse_specs = wiring::build_synapses(
                conn_params,
                ConnectionId(connection_idx),
                endpoints,
                partition_range.clone(),
                seed,
            );

            for (pre_idx, specs) in &synapse_specs.into_iter().group_by(|spec| spec.pre_idx) {
                let mut synapses: Vec<Synapse> = specs
                    .map(|spec| {
                        Synapse::new(
                            spec.post_idx - partition_range.start,
                            spec.conduction_delay,
                            spec.weight,
                        )
                    })
                    .collect();

                synapses.sort_by_key(|synapse| synapse.neuron_idx);

                nid_to_projections
                    .entry(from_nid_start + pre_idx)
                    .or_insert_with(Vec::new)
                    .push(Projection {
                        connection_id: ConnectionId(connection_idx),
                        pre_nid_start: from_nid_start,
                        polarity: from_group.polarity,
                        weight_range: conn_params.weight_range,
                        is_plastic: conn_params.is_plastic(),
                        synapses,
                    });
            }
        }

        let incoming_plastic = collect_incoming_plastic(&nid_to_projections, num_neurons);

        let max_conduction_delay = nid_to_projections
            .values()
            .flat_map(|projections| projections.iter().flat_map(|prj| prj.synapses.iter()))
            .map(|synapse| synapse.conduction_delay)
            .max()
            .unwrap_or(1);

        partitions.push(Partition {
            group_id: GroupId(group_idx),
            nid_start,
            group_offset: partition_range.start,
            neurons,
            nid_to_projections,
            incoming_plastic,
            delay_line: DelayLine::new(max_conduction_delay as usize),
            conductance_decay,
            stdp: create_stdp_rule(group_params),
            homeostasis: group_params
                .homeostasis
                .as_ref()
                .map(|homeo_params| Homeostasis::new(homeo_params, nid_start, num_neurons, seed)),
            spiked_neuron_idxs: Vec::new(),
            plastic_arrivals: Vec::new(),
        });
    }

    partitions
}

fn create_stdp_rule(group_params: &GroupParams) -> Option<StdpRule> {
    group_params.stdp.as_ref().map(|stdp_params| StdpRule {
        curve: stdp_params.curve,
        window: plasticity::stdp_window(&stdp_params.curve),
    })
}

fn collect_incoming_plastic(
    nid_to_projections: &HashMap<usize, Vec<Projection>>,
    num_neurons: usize,
) -> Vec<Vec<SynapseCoordinate>> {
    let mut incoming_plastic = vec![Vec::new(); num_neurons];

    for (pre_syn_nid, projections) in nid_to_projections.iter().sorted_by_key(|entry| entry.0) {
        for (projection_idx, projection) in projections.iter().enumerate() {
            if !projection.is_plastic {
                continue;
            }

            for (synapse_idx, synapse) in projection.synapses.iter().enumerate() {
                incoming_plastic[synapse.neuron_idx].push(SynapseCoordinate {
                    pre_syn_nid: *pre_syn_nid,
                    projection_idx,
                    synapse_idx,
                });
            }
        }
    }

    incoming_plastic
}

fn get_projection_mut<'a>(
    nid_to_projections: &'a mut HashMap<usize, Vec<Projection>>,
    syn_coord: &SynapseCoordinate,
) -> Option<&'a mut Projection> {
    nid_to_projections
        .get_mut(&syn_coord.pre_syn_nid)
        .and_then(|projections| projections.get_mut(syn_coord.projection_idx))
}

impl Partition {
    pub fn run(
        partitions: &mut [Partition],
        mut rx: BusReader<Request>,
        channels: PartitionChannels,
    ) {
        // a failed send means the context is gone, so the worker winds down
        while let Ok(request) = rx.recv() {
            let sent = match request {
                Request::Tick(ctx) => {
                    let mut result = PartitionGroupResult::default();

                    for partition in partitions.iter_mut() {
                        partition.process_tick(&ctx, &mut result);
                    }

                    channels.result_tx.send(result).is_ok()
                }
                Request::ExtractWeights { connection_id } => {
                    let weights = partitions
                        .iter()
                        .flat_map(|partition| partition.extract_weights(connection_id))
                        .collect();

                    channels.weights_tx.send(weights).is_ok()
                }
                Request::SetWeight {
                    connection_id,
                    pre_syn_nid,
                    post_syn_nid,
                    weight,
                } => {
                    let mut found = false;
                    for partition in partitions.iter_mut() {
                        found |= partition.set_weight(connection_id, pre_syn_nid, post_syn_nid, weight);
                    }

                    channels.ack_tx.send(found).is_ok()
                }
                Request::SetRates { group_id, rates } => {
                    let mut found = false;
                    for partition in partitions.iter_mut() {
                        found |= partition.set_rates(group_id, &rates);
                    }

                    channels.ack_tx.send(found).is_ok()
                }
            };

            if !sent {
                break;
            }
        }
    }

    fn process_tick(&mut self, ctx: &TickContext, result: &mut PartitionGroupResult) {
        if ctx.t > 0 {
            self.process_spikes(&ctx.spiked_nids);
        }

        self.spiked_neuron_idxs.clear();
        self.update_neurons(ctx.t, result);
        self.process_transmissions(ctx.t, &mut result.synaptic_transmission_count);
        self.process_stdp(ctx.t);
        self.process_homeostasis();
    }

    /// Puts the spikes of the previous tick on the delay line, due at
    /// `t_spike + conduction_delay`.
    fn process_spikes(&mut self, spiked_nids: &[usize]) {
        for nid in spiked_nids {
            if let Some(projections) = self.nid_to_projections.get(nid) {
                for (projection_idx, projection) in projections.iter().enumerate() {
                    for (synapse_idx, synapse) in projection.synapses.iter().enumerate() {
                        let transmission = Transmission {
                            neuron_idx: synapse.neuron_idx,
                            syn_coord: SynapseCoordinate {
                                pre_syn_nid: *nid,
                                projection_idx,
                                synapse_idx,
                            },
                        };

                        self.delay_line
                            .schedule(synapse.conduction_delay as usize - 1, transmission);
                    }
                }
            }
        }
    }

    fn update_neurons(&mut self, t: usize, result: &mut PartitionGroupResult) {
        match &mut self.neurons {
            PartitionNeurons::Poisson(spike_train) => {
                spike_train.step_into(&mut result.spiking_nids);
            }
            PartitionNeurons::Dynamical { params, neurons } => {
                for (neuron_idx, neuron) in neurons.iter_mut().enumerate() {
                    match neuron.integrate(t, params, self.conductance_decay.as_ref()) {
                        IntegrationOutcome::Quiet => {}
                        IntegrationOutcome::Spiked => {
                            self.spiked_neuron_idxs.push(neuron_idx);
                            result.spiking_nids.push(self.nid_start + neuron_idx);
                        }
                        IntegrationOutcome::Unstable => {
                            result.unstable_nids.push(self.nid_start + neuron_idx);
                        }
                    }
                }
            }
        }
    }

    fn process_transmissions(&mut self, t: usize, synaptic_transmission_count: &mut usize) {
        self.plastic_arrivals.clear();
        *synaptic_transmission_count += self.delay_line.due_count();

        let neurons = match &mut self.neurons {
            PartitionNeurons::Dynamical { neurons, .. } => neurons,
            PartitionNeurons::Poisson(_) => return,
        };

        let conductance_based = self.conductance_decay.is_some();

        for transmission in self.delay_line.advance() {
            if let Some(projection) =
                get_projection_mut(&mut self.nid_to_projections, &transmission.syn_coord)
            {
                let weight = projection.synapses[transmission.syn_coord.synapse_idx].on_arrival(t);
                neurons[transmission.neuron_idx].receive(
                    weight,
                    projection.polarity,
                    conductance_based,
                );

                if projection.is_plastic {
                    self.plastic_arrivals.push(transmission.syn_coord);
                }
            }
        }
    }

    fn process_stdp(&mut self, t: usize) {
        let stdp = match &self.stdp {
            Some(stdp) => stdp,
            None => return,
        };

        let neurons = match &self.neurons {
            PartitionNeurons::Dynamical { neurons, .. } => neurons,
            PartitionNeurons::Poisson(_) => return,
        };

        let homeostasis = self.homeostasis.as_ref();
        let gate = |neuron_idx: usize, weight_change: f32| match homeostasis {
            Some(homeostasis) => homeostasis.gate_stdp(neuron_idx, weight_change),
            None => weight_change,
        };

        // postsynaptic spikes pair with the latest arrival on each incoming synapse
        for neuron_idx in &self.spiked_neuron_idxs {
            for syn_coord in &self.incoming_plastic[*neuron_idx] {
                if let Some(projection) = get_projection_mut(&mut self.nid_to_projections, syn_coord)
                {
                    let weight_range = projection.weight_range;
                    let synapse = &mut projection.synapses[syn_coord.synapse_idx];

                    if let Some(arrival_t) = synapse.last_arrival_t {
                        if t - arrival_t <= stdp.window {
                            let weight_change =
                                plasticity::compute_stdp(arrival_t as i64 - t as i64, &stdp.curve);
                            synapse.process_weight_change(
                                gate(*neuron_idx, weight_change),
                                &weight_range,
                            );
                        }
                    }
                }
            }
        }

        // arrivals pair with the latest earlier postsynaptic spike
        for syn_coord in &self.plastic_arrivals {
            if let Some(projection) = get_projection_mut(&mut self.nid_to_projections, syn_coord) {
                let weight_range = projection.weight_range;
                let synapse = &mut projection.synapses[syn_coord.synapse_idx];

                if let Some(post_spike_t) = neurons[synapse.neuron_idx].get_last_spike_t() {
                    if post_spike_t < t && t - post_spike_t <= stdp.window {
                        let weight_change =
                            plasticity::compute_stdp((t - post_spike_t) as i64, &stdp.curve);
                        synapse.process_weight_change(
                            gate(synapse.neuron_idx, weight_change),
                            &weight_range,
                        );
                    }
                }
            }
        }
    }

    fn process_homeostasis(&mut self) {
        let homeostasis = match &mut self.homeostasis {
            Some(homeostasis) => homeostasis,
            None => return,
        };

        homeostasis.decay();
        for neuron_idx in &self.spiked_neuron_idxs {
            homeostasis.on_spike(*neuron_idx);
        }

        for (neuron_idx, syn_coords) in self.incoming_plastic.iter().enumerate() {
            for syn_coord in syn_coords {
                if let Some(projection) = get_projection_mut(&mut self.nid_to_projections, syn_coord)
                {
                    let weight_range = projection.weight_range;
                    let synapse = &mut projection.synapses[syn_coord.synapse_idx];
                    let weight_change = homeostasis.scaling_change(neuron_idx, synapse.weight);
                    synapse.process_weight_change(weight_change, &weight_range);
                }
            }
        }
    }

    fn extract_weights(&self, connection_id: ConnectionId) -> Vec<SynapseWeight> {
        self.nid_to_projections
            .iter()
            .sorted_by_key(|entry| entry.0)
            .flat_map(|(pre_syn_nid, projections)| {
                projections
                    .iter()
                    .filter(move |projection| projection.connection_id == connection_id)
                    .flat_map(move |projection| {
                        projection.synapses.iter().map(move |synapse| SynapseWeight {
                            pre: pre_syn_nid - projection.pre_nid_start,
                            post: self.group_offset + synapse.neuron_idx,
                            weight: synapse.weight,
                        })
                    })
            })
            .collect()
    }

    fn set_weight(
        &mut self,
        connection_id: ConnectionId,
        pre_syn_nid: usize,
        post_syn_nid: usize,
        weight: f32,
    ) -> bool {
        if post_syn_nid < self.nid_start {
            return false;
        }
        let neuron_idx = post_syn_nid - self.nid_start;

        let projection = self
            .nid_to_projections
            .get_mut(&pre_syn_nid)
            .and_then(|projections| {
                projections
                    .iter_mut()
                    .find(|projection| projection.connection_id == connection_id)
            });

        if let Some(projection) = projection {
            let weight_range = projection.weight_range;
            if let Ok(synapse_idx) = projection
                .synapses
                .binary_search_by_key(&neuron_idx, |synapse| synapse.neuron_idx)
            {
                projection.synapses[synapse_idx].set_weight(weight, &weight_range);
                return true;
            }
        }

        false
    }

    fn set_rates(&mut self, group_id: GroupId, rates: &[f32]) -> bool {
        if group_id != self.group_id {
            return false;
        }

        match &mut self.neurons {
            PartitionNeurons::Poisson(spike_train) => {
                let start = self.group_offset;
                let end = start + spike_train.num_neurons();
                spike_train.set_rates(&rates[start..end]);
                true
            }
            PartitionNeurons::Dynamical { .. } => false,
        }
    }

    #[cfg(test)]
    fn get_num_neurons(&self) -> usize {
        match &self.neurons {
            PartitionNeurons::Poisson(spike_train) => spike_train.num_neurons(),
            PartitionNeurons::Dynamical { neurons, .. } => neurons.len(),
        }
    }

    #[cfg(test)]
    fn get_neuron(&self, neuron_idx: usize) -> &Neuron {
        match &self.neurons {
            PartitionNeurons::Dynamical { neurons, .. } => &neurons[neuron_idx],
            PartitionNeurons::Poisson(_) => panic!("Poisson partitions have no neuron state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ConnectionParams, RangeDelay, SynapseKind, Topology};
    use crate::util::test_util;
    use float_cmp::assert_approx_eq;
    use itertools::assert_equal;

    fn tick(partitions: &mut [Partition], t: usize, spiked_nids: Vec<usize>) -> PartitionGroupResult {
        let ctx = TickContext { t, spiked_nids };
        let mut result = PartitionGroupResult::default();
        for partition in partitions.iter_mut() {
            partition.process_tick(&ctx, &mut result);
        }
        result
    }

    fn weights(partitions: &[Partition], connection_id: ConnectionId) -> Vec<SynapseWeight> {
        partitions
            .iter()
            .flat_map(|partition| partition.extract_weights(connection_id))
            .collect()
    }

    /// Two-group network without plasticity: 2 Poisson sources into 3 neurons.
    fn relay_params(delay: u8) -> NetworkParams {
        let mut params = test_util::get_template_network_params();
        params.groups[0] = GroupParams::poisson("input", 2, Polarity::Excitatory);
        params.groups[1] = GroupParams::dynamical("output", 3, Polarity::Excitatory);
        params.groups[1].model = NeuronModel::Dynamical {
            params: Some(IzhikevichParams::regular_spiking()),
        };

        let mut conn = ConnectionParams::defaults_for_group_ids(GroupId(0), GroupId(1));
        conn.weight_range = RangeWeight::new(0.0, 2.0);
        conn.init_weight_fraction = 0.5;
        conn.delay_range = RangeDelay::fixed(delay);
        conn.kind = SynapseKind::Fixed;
        params.connections = vec![conn];
        params
    }

    #[test]
    fn partition_layout() {
        let params = relay_params(1);

        let partitions = create_partitions(1, 0, &params);
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].nid_start, 0);
        assert_eq!(partitions[1].nid_start, 2);
        assert_eq!(partitions[1].get_num_neurons(), 3);

        let partitions = create_partitions(2, 1, &params);
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].nid_start, 1);
        assert_eq!(partitions[0].get_num_neurons(), 1);
        assert_eq!(partitions[1].nid_start, 4);
        assert_eq!(partitions[1].group_offset, 2);
        assert_eq!(partitions[1].get_num_neurons(), 1);

        // the single neuron of a group only lands on the first thread
        let mut params = relay_params(1);
        params.groups[1] = GroupParams::dynamical("output", 1, Polarity::Excitatory);
        params.groups[1].model = NeuronModel::Dynamical {
            params: Some(IzhikevichParams::regular_spiking()),
        };
        assert_eq!(create_partitions(3, 2, &params).len(), 0);
    }

    #[test]
    fn spikes_arrive_after_delay() {
        let params = relay_params(3);
        let mut partitions = create_partitions(1, 0, &params);

        tick(&mut partitions, 0, Vec::new());

        // nid 0 spiked at t = 0 and is due at t = 3
        let result = tick(&mut partitions, 1, vec![0]);
        assert_eq!(result.synaptic_transmission_count, 0);
        assert_eq!(tick(&mut partitions, 2, Vec::new()).synaptic_transmission_count, 0);
        assert_eq!(tick(&mut partitions, 3, Vec::new()).synaptic_transmission_count, 3);
        assert_eq!(tick(&mut partitions, 4, Vec::new()).synaptic_transmission_count, 0);

        for synapse in &partitions[1].nid_to_projections[&0][0].synapses {
            assert_eq!(synapse.last_arrival_t, Some(3));
        }
        assert!(partitions[1].nid_to_projections[&1][0].synapses[0]
            .last_arrival_t
            .is_none());
    }

    #[test]
    fn arrival_drives_next_integration() {
        let params = relay_params(1);
        let mut partitions = create_partitions(1, 0, &params);
        let reference = Neuron::new(&IzhikevichParams::regular_spiking());

        tick(&mut partitions, 0, Vec::new());
        tick(&mut partitions, 1, vec![0, 1]);
        let voltage_before = partitions[1].get_neuron(0).get_voltage();
        tick(&mut partitions, 2, Vec::new());

        let mut expected = reference.clone();
        let izh_params = IzhikevichParams::regular_spiking();
        expected.integrate(0, &izh_params, None);
        expected.integrate(1, &izh_params, None);
        assert_approx_eq!(f32, voltage_before, expected.get_voltage());

        expected.receive(2.0, Polarity::Excitatory, false);
        expected.integrate(2, &izh_params, None);
        assert_approx_eq!(f32, partitions[1].get_neuron(0).get_voltage(), expected.get_voltage());
    }

    #[test]
    fn poisson_partition_emits_spikes() {
        let mut params = relay_params(1);
        params.groups[0].model = NeuronModel::PoissonSource {
            rates: Some(vec![1000.0, 0.0]),
        };
        let mut partitions = create_partitions(1, 0, &params);

        for t in 0..10 {
            let result = tick(&mut partitions, t, Vec::new());
            assert_equal(result.spiking_nids, [0]);
        }
    }

    #[test]
    fn set_rates_of_poisson_group() {
        let params = relay_params(1);
        let mut partitions = create_partitions(2, 1, &params);

        assert!(!partitions[1].set_rates(GroupId(0), &[1000.0, 1000.0]));
        assert!(partitions[0].set_rates(GroupId(0), &[0.0, 1000.0]));

        let result = tick(&mut partitions, 0, Vec::new());
        assert_equal(result.spiking_nids, [1]);
    }

    #[test]
    fn set_and_extract_weights() {
        let params = relay_params(1);
        let mut partitions = create_partitions(1, 0, &params);

        let initial = weights(&partitions, ConnectionId(0));
        assert_eq!(initial.len(), 6);
        assert_eq!((initial[0].pre, initial[0].post), (0, 0));
        assert_eq!((initial[5].pre, initial[5].post), (1, 2));
        for synapse_weight in &initial {
            assert_approx_eq!(f32, synapse_weight.weight, 1.0);
        }

        assert!(partitions[1].set_weight(ConnectionId(0), 1, 3, 1.5));
        assert!(partitions[1].set_weight(ConnectionId(0), 0, 4, 7.0));
        assert!(!partitions[1].set_weight(ConnectionId(0), 0, 0, 1.0));
        assert!(!partitions[1].set_weight(ConnectionId(1), 0, 2, 1.0));

        let updated = weights(&partitions, ConnectionId(0));
        assert_approx_eq!(f32, updated[2].weight, 2.0);
        assert_approx_eq!(f32, updated[4].weight, 1.5);
    }

    #[test]
    fn weights_do_not_depend_on_thread_count() {
        let mut params = relay_params(5);
        params.groups[0] = GroupParams::poisson("input", 20, Polarity::Excitatory);
        params.groups[1] = GroupParams::dynamical("output", 15, Polarity::Excitatory);
        params.groups[1].model = NeuronModel::Dynamical {
            params: Some(IzhikevichParams::regular_spiking()),
        };
        params.connections[0].topology = Topology::Random { probability: 0.4 };
        params.connections[0].delay_range = RangeDelay::new(1, 5);

        let single = weights(&create_partitions(1, 0, &params), ConnectionId(0));

        let mut multi: Vec<SynapseWeight> = (0..3)
            .flat_map(|thread_id| weights(&create_partitions(3, thread_id, &params), ConnectionId(0)))
            .collect();
        multi.sort_by_key(|synapse_weight| (synapse_weight.pre, synapse_weight.post));

        assert_eq!(single, multi);
    }

    #[test]
    fn stdp_potentiates_pre_before_post() {
        let mut params = test_util::get_template_network_params();
        params.groups[1].homeostasis = None;
        params.connections[0].weight_range = RangeWeight::new(0.0, 200.0);
        params.connections[0].init_weight_fraction = 0.5;
        let mut partitions = create_partitions(1, 0, &params);

        // all ten inputs at t = 0 arrive at t = 1 and make the neuron fire at t = 2
        tick(&mut partitions, 0, Vec::new());
        tick(&mut partitions, 1, (0..10).collect());
        let result = tick(&mut partitions, 2, Vec::new());
        assert_equal(result.spiking_nids, [10]);

        let expected = 100.0 + 0.0002 * (-1.0f32 / 20.0).exp();
        for synapse_weight in weights(&partitions, ConnectionId(0)) {
            assert_approx_eq!(f32, synapse_weight.weight, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn stdp_depresses_post_before_pre() {
        let mut params = test_util::get_template_network_params();
        params.groups[1].homeostasis = None;
        params.connections[0].weight_range = RangeWeight::new(0.0, 200.0);
        params.connections[0].init_weight_fraction = 0.5;
        let mut partitions = create_partitions(1, 0, &params);

        tick(&mut partitions, 0, Vec::new());
        tick(&mut partitions, 1, (0..10).collect());
        tick(&mut partitions, 2, Vec::new());

        // input 3 spikes at t = 4 and arrives at t = 5, three steps after the output spike
        tick(&mut partitions, 3, Vec::new());
        tick(&mut partitions, 4, Vec::new());
        tick(&mut partitions, 5, vec![3]);

        let potentiated = 100.0 + 0.0002 * (-1.0f32 / 20.0).exp();
        let depressed = potentiated - 0.000066 * (-3.0f32 / 20.0).exp();

        let weights = weights(&partitions, ConnectionId(0));
        assert_approx_eq!(f32, weights[3].weight, depressed, epsilon = 1e-5);
        assert_approx_eq!(f32, weights[4].weight, potentiated, epsilon = 1e-5);
    }

    #[test]
    fn fixed_synapses_are_not_plastic() {
        let mut params = test_util::get_template_network_params();
        params.connections[0].kind = SynapseKind::Fixed;
        params.connections[0].weight_range = RangeWeight::new(0.0, 200.0);
        let mut partitions = create_partitions(1, 0, &params);
        assert!(partitions[1].incoming_plastic[0].is_empty());

        tick(&mut partitions, 0, Vec::new());
        tick(&mut partitions, 1, (0..10).collect());
        for t in 2..50 {
            tick(&mut partitions, t, Vec::new());
        }

        for synapse_weight in weights(&partitions, ConnectionId(0)) {
            assert_approx_eq!(f32, synapse_weight.weight, 100.0);
        }
    }

    #[test]
    fn homeostasis_scales_up_silent_neuron() {
        let mut params = test_util::get_template_network_params();
        params.groups[1].stdp = None;
        let mut partitions = create_partitions(1, 0, &params);

        for t in 0..1000 {
            tick(&mut partitions, t, Vec::new());
        }

        for synapse_weight in weights(&partitions, ConnectionId(0)) {
            assert!(synapse_weight.weight > 0.015);
            assert!(synapse_weight.weight <= 0.03);
        }
    }

    #[test]
    fn homeostasis_suppresses_potentiation_above_target() {
        let run = |overactive: bool| {
            let mut params = test_util::get_template_network_params();
            params.connections[0].weight_range = RangeWeight::new(0.0, 200.0);
            params.connections[0].init_weight_fraction = 0.5;
            let mut partitions = create_partitions(1, 0, &params);

            if overactive {
                let homeostasis = partitions[1].homeostasis.as_mut().unwrap();
                for _ in 0..100 {
                    homeostasis.on_spike(0);
                }
            }

            tick(&mut partitions, 0, Vec::new());
            tick(&mut partitions, 1, (0..10).collect());
            let result = tick(&mut partitions, 2, Vec::new());
            assert_equal(result.spiking_nids, [10]);

            weights(&partitions, ConnectionId(0))
        };

        for synapse_weight in run(false) {
            assert!(synapse_weight.weight > 100.0);
        }
        for synapse_weight in run(true) {
            assert!(synapse_weight.weight < 100.0);
        }
    }

    #[test]
    fn unstable_neurons_are_reported() {
        let mut params = test_util::get_template_network_params();
        params.groups[1].stdp = None;
        params.groups[1].homeostasis = None;
        params.connections[0].weight_range = RangeWeight::new(0.0, f32::MAX);
        params.connections[0].init_weight_fraction = 1.0;
        let mut partitions = create_partitions(1, 0, &params);

        tick(&mut partitions, 0, Vec::new());
        tick(&mut partitions, 1, (0..10).collect());
        let result = tick(&mut partitions, 2, Vec::new());

        assert_equal(result.unstable_nids, [10]);
    }
}
