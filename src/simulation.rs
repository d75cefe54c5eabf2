use std::sync::mpsc::channel as mpsc_channel;
use std::sync::mpsc::Receiver as MpscReceiver;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bus::Bus;
use core_affinity::CoreId;
use log::{debug, error, info, warn};

use crate::error::{Result, SimError};
use crate::monitor::{ConnectionMonitor, MonitorOutput, SpikeMonitor};
use crate::params::{
    self, BaseFiringRate, ConductanceParams, ConnectionParams, Grid3D, GroupParams,
    HomeostasisParams, IzhikevichParams, NetworkParams, NeuronModel, Polarity, RadiusRF,
    RangeDelay, RangeWeight, StdpCurve, StdpMode, StdpParams, SynapseKind, TechnicalParams,
    Topology,
};
use crate::partition::{
    self, Partition, PartitionChannels, PartitionGroupResult, Request, TickContext,
};
use crate::rate_generator::PoissonRate;
use crate::state_snapshot::{SynapseWeight, WeightSnapshot};
use crate::types::{ConnectionId, ConnectionMonitorHandle, GroupId, SpikeMonitorHandle};
use crate::wiring::{self, Endpoints};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Configuring,
    Ready,
    Running,
    Finished,
}

/// Outcome of one call to `run_network`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub t_start: usize,
    pub t_end: usize,
    pub spike_count: usize,
    pub synaptic_transmission_count: usize,
    pub wall_time: Duration,
}

struct Workers {
    broadcast_tx: Option<Bus<Request>>,
    result_rx: MpscReceiver<PartitionGroupResult>,
    weights_rx: MpscReceiver<Vec<SynapseWeight>>,
    ack_rx: MpscReceiver<bool>,
    num_threads: usize,
    join_handles: Vec<JoinHandle<()>>,
}

fn get_num_threads(technical_params: &TechnicalParams) -> usize {
    technical_params.num_threads.unwrap_or_else(num_cpus::get)
}

fn worker_failure(t: usize) -> SimError {
    SimError::Runtime {
        t,
        reason: "worker thread terminated unexpectedly".to_string(),
    }
}

impl Workers {
    fn spawn(params: &NetworkParams) -> Self {
        let mut broadcast_tx = Bus::new(1);
        let (result_tx, result_rx) = mpsc_channel();
        let (weights_tx, weights_rx) = mpsc_channel();
        let (ack_tx, ack_rx) = mpsc_channel();

        let num_threads = get_num_threads(&params.technical_params);
        let mut join_handles = Vec::new();

        for thread_id in 0..num_threads {
            let broadcast_rx = broadcast_tx.add_rx();
            let channels = PartitionChannels {
                result_tx: result_tx.clone(),
                weights_tx: weights_tx.clone(),
                ack_tx: ack_tx.clone(),
            };
            let params = params.clone();

            join_handles.push(thread::spawn(move || {
                if params.technical_params.pin_threads {
                    core_affinity::set_for_current(CoreId { id: thread_id });
                }

                let mut partitions = partition::create_partitions(num_threads, thread_id, &params);
                Partition::run(&mut partitions, broadcast_rx, channels);
            }));
        }

        Self {
            broadcast_tx: Some(broadcast_tx),
            result_rx,
            weights_rx,
            ack_rx,
            num_threads,
            join_handles,
        }
    }

    fn broadcast(&mut self, request: Request) {
        if let Some(broadcast_tx) = self.broadcast_tx.as_mut() {
            broadcast_tx.broadcast(request);
        }
    }

    fn tick(&mut self, ctx: TickContext) -> Result<PartitionGroupResult> {
        let t = ctx.t;
        self.broadcast(Request::Tick(ctx));

        let mut aggregate = PartitionGroupResult::default();

        for _ in 0..self.num_threads {
            let mut result = self.result_rx.recv().map_err(|_| worker_failure(t))?;
            aggregate.spiking_nids.append(&mut result.spiking_nids);
            aggregate.unstable_nids.append(&mut result.unstable_nids);
            aggregate.synaptic_transmission_count += result.synaptic_transmission_count;
        }

        aggregate.spiking_nids.sort_unstable();
        aggregate.unstable_nids.sort_unstable();
        Ok(aggregate)
    }

    fn extract_weights(&mut self, t: usize, connection_id: ConnectionId) -> Result<Vec<SynapseWeight>> {
        self.broadcast(Request::ExtractWeights { connection_id });

        let mut weights = Vec::new();
        for _ in 0..self.num_threads {
            weights.extend(self.weights_rx.recv().map_err(|_| worker_failure(t))?);
        }

        weights.sort_by_key(|syn| (syn.pre, syn.post));
        Ok(weights)
    }

    /// Sends a request that every worker acknowledges and reports whether any
    /// partition handled it.
    fn request_with_ack(&mut self, t: usize, request: Request) -> Result<bool> {
        self.broadcast(request);

        let mut handled = false;
        for _ in 0..self.num_threads {
            handled |= self.ack_rx.recv().map_err(|_| worker_failure(t))?;
        }
        Ok(handled)
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        drop(self.broadcast_tx.take()); // signals the worker threads to exit the loop

        self.join_handles.drain(..).for_each(|join_handle| {
            join_handle.join().ok();
        });
    }
}

/// Owns a network and drives it through its lifecycle: groups and connections
/// are added while `Configuring`, `setup_network` builds the partitions,
/// monitors attach once the network is `Ready`, and `run_network` advances
/// simulated time in 1 ms steps.
pub struct SimulationContext {
    name: String,
    state: SimState,
    params: NetworkParams,
    synapse_counts: Vec<usize>,
    workers: Option<Workers>,
    t: usize,
    spiking_nid_buffer: Vec<usize>,
    synaptic_transmission_count: usize,
    spike_monitors: Vec<SpikeMonitor>,
    connection_monitors: Vec<ConnectionMonitor>,
}

impl SimulationContext {
    pub fn new(name: &str, technical_params: TechnicalParams) -> Self {
        Self {
            name: name.to_string(),
            state: SimState::Configuring,
            params: NetworkParams {
                technical_params,
                ..NetworkParams::default()
            },
            synapse_counts: Vec::new(),
            workers: None,
            t: 0,
            spiking_nid_buffer: Vec::new(),
            synaptic_transmission_count: 0,
            spike_monitors: Vec::new(),
            connection_monitors: Vec::new(),
        }
    }

    /// Builds a context from a complete network description, e.g. one loaded
    /// from YAML. The context is still `Configuring` afterwards.
    pub fn from_params(name: &str, network_params: NetworkParams) -> Result<Self> {
        params::validate_network_params(&network_params)?;

        let synapse_counts = network_params
            .connections
            .iter()
            .enumerate()
            .map(|(connection_idx, conn_params)| {
                count_synapses(&network_params, conn_params, ConnectionId(connection_idx))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut context = Self::new(name, network_params.technical_params.clone());
        context.params = network_params;
        context.synapse_counts = synapse_counts;
        Ok(context)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn network_params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn current_time_ms(&self) -> usize {
        self.t
    }

    /// Number of synaptic arrivals delivered since the network was set up.
    pub fn synaptic_transmission_count(&self) -> usize {
        self.synaptic_transmission_count
    }

    pub fn num_neurons(&self) -> usize {
        self.params.num_neurons()
    }

    pub fn group_id(&self, name: &str) -> Option<GroupId> {
        self.params
            .groups
            .iter()
            .position(|group| group.name == name)
            .map(GroupId)
    }

    pub fn group_num_neurons(&self, group_id: GroupId) -> Result<usize> {
        self.get_group(group_id).map(|group| group.num_neurons)
    }

    pub fn group_name(&self, group_id: GroupId) -> Result<&str> {
        self.get_group(group_id).map(|group| group.name.as_str())
    }

    pub fn connection_id(&self, from: GroupId, to: GroupId) -> Option<ConnectionId> {
        self.params.find_connection(from, to)
    }

    pub fn num_synapses(&self, connection_id: ConnectionId) -> Result<usize> {
        self.synapse_counts
            .get(connection_id.0)
            .copied()
            .ok_or_else(|| SimError::config(format!("invalid connection id: {}", connection_id.0)))
    }

    fn ensure_state(&self, allowed: &[SimState], operation: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SimError::config(format!(
                "{} is not allowed in state {:?}",
                operation, self.state
            )))
        }
    }

    fn get_group(&self, group_id: GroupId) -> Result<&GroupParams> {
        self.params
            .groups
            .get(group_id.0)
            .ok_or_else(|| SimError::config(format!("invalid group id: {}", group_id.0)))
    }

    fn get_dynamical_group_mut(&mut self, group_id: GroupId) -> Result<&mut GroupParams> {
        let group = self
            .params
            .groups
            .get_mut(group_id.0)
            .ok_or_else(|| SimError::config(format!("invalid group id: {}", group_id.0)))?;

        if group.is_poisson() {
            return Err(SimError::config(format!(
                "group {} is a Poisson group",
                group.name
            )));
        }

        Ok(group)
    }

    fn workers_mut(&mut self) -> Result<&mut Workers> {
        let state = self.state;
        self.workers
            .as_mut()
            .ok_or_else(|| SimError::config(format!("network is not set up (state {:?})", state)))
    }

    fn add_group(&mut self, group_params: GroupParams) -> Result<GroupId> {
        self.ensure_state(&[SimState::Configuring], "creating a group")?;
        params::validate_group_layout(&group_params)?;

        if self.group_id(&group_params.name).is_some() {
            return Err(SimError::config(format!(
                "duplicate group name: {}",
                group_params.name
            )));
        }

        let group_id = GroupId(self.params.groups.len());
        debug!(
            "{}: created group {} ({} neurons) with id {}",
            self.name, group_params.name, group_params.num_neurons, group_id.0
        );
        self.params.groups.push(group_params);
        Ok(group_id)
    }

    pub fn create_spike_generator_group(
        &mut self,
        name: &str,
        num_neurons: usize,
        polarity: Polarity,
    ) -> Result<GroupId> {
        self.add_group(GroupParams::poisson(name, num_neurons, polarity))
    }

    pub fn create_group(
        &mut self,
        name: &str,
        num_neurons: usize,
        polarity: Polarity,
    ) -> Result<GroupId> {
        self.add_group(GroupParams::dynamical(name, num_neurons, polarity))
    }

    pub fn create_group_with_grid(
        &mut self,
        name: &str,
        grid: Grid3D,
        polarity: Polarity,
    ) -> Result<GroupId> {
        let mut group_params = GroupParams::dynamical(name, grid.num_neurons(), polarity);
        group_params.grid = grid;
        self.add_group(group_params)
    }

    pub fn set_neuron_parameters(
        &mut self,
        group_id: GroupId,
        a: f32,
        b: f32,
        c: f32,
        d: f32,
    ) -> Result<()> {
        self.ensure_state(&[SimState::Configuring], "setting neuron parameters")?;

        let izh_params = IzhikevichParams { a, b, c, d };
        params::validate_izhikevich_params(&izh_params)?;

        let group = self.get_dynamical_group_mut(group_id)?;
        group.model = NeuronModel::Dynamical {
            params: Some(izh_params),
        };
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn connect(
        &mut self,
        from: GroupId,
        to: GroupId,
        topology: Topology,
        weight_range: RangeWeight,
        init_weight_fraction: f32,
        delay_range: RangeDelay,
        radius: RadiusRF,
        kind: SynapseKind,
    ) -> Result<ConnectionId> {
        self.add_connection(ConnectionParams {
            from,
            to,
            topology,
            weight_range,
            init_weight_fraction,
            delay_range,
            radius,
            kind,
        })
    }

    pub fn add_connection(&mut self, conn_params: ConnectionParams) -> Result<ConnectionId> {
        self.ensure_state(&[SimState::Configuring], "connecting groups")?;
        params::validate_connection_endpoints(&self.params, &conn_params)?;

        if self.connection_id(conn_params.from, conn_params.to).is_some() {
            return Err(SimError::config(format!(
                "duplicate connection from group {} to group {}",
                conn_params.from.0, conn_params.to.0
            )));
        }

        params::validate_connection_params(&conn_params)?;

        let connection_id = ConnectionId(self.params.connections.len());
        let num_synapses = count_synapses(&self.params, &conn_params, connection_id)?;

        debug!(
            "{}: connected group {} to group {} with {} synapses",
            self.name, conn_params.from.0, conn_params.to.0, num_synapses
        );

        self.params.connections.push(conn_params);
        self.synapse_counts.push(num_synapses);
        Ok(connection_id)
    }

    /// Switches between conductance-based synapses (with the current or
    /// default time constants) and current-based synapses.
    pub fn set_conductances(&mut self, enabled: bool) -> Result<()> {
        self.ensure_state(&[SimState::Configuring], "setting conductances")?;

        self.params.conductances = if enabled {
            Some(self.params.conductances.unwrap_or_default())
        } else {
            None
        };
        Ok(())
    }

    /// Enables conductance-based synapses with the given time constants.
    pub fn set_conductance_params(&mut self, conductance_params: ConductanceParams) -> Result<()> {
        self.ensure_state(&[SimState::Configuring], "setting conductances")?;
        params::validate_conductance_params(&conductance_params)?;
        self.params.conductances = Some(conductance_params);
        Ok(())
    }

    pub fn set_stdp(
        &mut self,
        group_id: GroupId,
        enabled: bool,
        mode: StdpMode,
        curve: StdpCurve,
    ) -> Result<()> {
        self.ensure_state(&[SimState::Configuring], "setting STDP")?;

        let stdp_params = StdpParams { mode, curve };
        if enabled {
            params::validate_stdp_params(&stdp_params)?;
        }

        let group = self.get_dynamical_group_mut(group_id)?;
        group.stdp = enabled.then_some(stdp_params);
        Ok(())
    }

    pub fn set_homeostasis(
        &mut self,
        group_id: GroupId,
        enabled: bool,
        scale: f32,
        avg_time_scale_sec: f32,
    ) -> Result<()> {
        self.ensure_state(&[SimState::Configuring], "setting homeostasis")?;

        let group = self.get_dynamical_group_mut(group_id)?;

        if !enabled {
            group.homeostasis = None;
            return Ok(());
        }

        let homeostasis_params = HomeostasisParams {
            scale,
            avg_time_scale_sec,
            base_firing: group
                .homeostasis
                .and_then(|homeostasis| homeostasis.base_firing),
        };
        params::validate_homeostasis_params(&homeostasis_params)?;

        group.homeostasis = Some(homeostasis_params);
        Ok(())
    }

    pub fn set_homeo_base_firing_rate(
        &mut self,
        group_id: GroupId,
        target_rate: f32,
        std_dev: f32,
    ) -> Result<()> {
        self.ensure_state(&[SimState::Configuring], "setting the homeostatic base firing rate")?;

        let group = self.get_dynamical_group_mut(group_id)?;

        let mut homeostasis_params = group.homeostasis.ok_or_else(|| {
            SimError::config(format!("homeostasis of group {} is not enabled", group.name))
        })?;

        homeostasis_params.base_firing = Some(BaseFiringRate {
            target_rate,
            std_dev,
        });
        params::validate_homeostasis_params(&homeostasis_params)?;

        group.homeostasis = Some(homeostasis_params);
        Ok(())
    }

    /// Validates the network, builds the partitions on the worker threads and
    /// moves to `Ready`.
    pub fn setup_network(&mut self) -> Result<()> {
        self.ensure_state(&[SimState::Configuring], "setting up the network")?;

        if let Err(err) = params::validate_network_params(&self.params) {
            error!("{}: invalid network: {}", self.name, err);
            return Err(err.into());
        }

        self.warn_about_idle_plasticity();

        self.workers = Some(Workers::spawn(&self.params));
        self.state = SimState::Ready;

        info!(
            "{}: network set up with {} groups, {} neurons, {} synapses on {} threads",
            self.name,
            self.params.groups.len(),
            self.num_neurons(),
            self.synapse_counts.iter().sum::<usize>(),
            get_num_threads(&self.params.technical_params)
        );

        Ok(())
    }

    fn warn_about_idle_plasticity(&self) {
        for (group_idx, group) in self.params.groups.iter().enumerate() {
            if group.stdp.is_none() && group.homeostasis.is_none() {
                continue;
            }

            let has_plastic_input = self
                .params
                .connections
                .iter()
                .any(|conn| conn.to.0 == group_idx && conn.is_plastic());

            if !has_plastic_input {
                warn!(
                    "{}: group {} has plasticity enabled but no plastic incoming connections",
                    self.name, group.name
                );
            }
        }
    }

    /// Replaces the rates of a Poisson group. Takes effect from the next step.
    pub fn set_spike_rate(&mut self, group_id: GroupId, rates: &PoissonRate) -> Result<()> {
        self.ensure_state(
            &[SimState::Configuring, SimState::Ready, SimState::Finished],
            "setting spike rates",
        )?;

        let group = self.get_group(group_id)?;

        if !group.is_poisson() {
            return Err(SimError::config(format!(
                "group {} is not a Poisson group",
                group.name
            )));
        }

        if rates.num_neurons() != group.num_neurons {
            return Err(SimError::config(format!(
                "group {} has {} neurons, got {} rates",
                group.name,
                group.num_neurons,
                rates.num_neurons()
            )));
        }

        params::validate_rates(rates.rates())?;

        let rates = rates.rates().to_vec();
        self.params.groups[group_id.0].model = NeuronModel::PoissonSource {
            rates: Some(rates.clone()),
        };

        if self.workers.is_some() {
            let t = self.t;
            self.workers_mut()?
                .request_with_ack(t, Request::SetRates { group_id, rates })?;
        }

        Ok(())
    }

    /// Overrides the weight of the synapse from neuron `pre_idx` of the source
    /// group to neuron `post_idx` of the destination group. The weight is
    /// clamped to the connection's range.
    pub fn set_weight(
        &mut self,
        connection_id: ConnectionId,
        pre_idx: usize,
        post_idx: usize,
        weight: f32,
    ) -> Result<()> {
        self.ensure_state(&[SimState::Ready, SimState::Finished], "setting a weight")?;

        let conn_params = self
            .params
            .connections
            .get(connection_id.0)
            .ok_or_else(|| SimError::config(format!("invalid connection id: {}", connection_id.0)))?;

        if !weight.is_finite() {
            return Err(SimError::config("weight must be finite"));
        }

        let num_pre = self.params.groups[conn_params.from.0].num_neurons;
        let num_post = self.params.groups[conn_params.to.0].num_neurons;
        let no_synapse = || {
            SimError::config(format!(
                "connection {} has no synapse from neuron {} to neuron {}",
                connection_id.0, pre_idx, post_idx
            ))
        };

        if pre_idx >= num_pre || post_idx >= num_post {
            return Err(no_synapse());
        }

        let nid_starts = self.params.group_nid_starts();
        let request = Request::SetWeight {
            connection_id,
            pre_syn_nid: nid_starts[conn_params.from.0] + pre_idx,
            post_syn_nid: nid_starts[conn_params.to.0] + post_idx,
            weight,
        };

        let t = self.t;
        if !self.workers_mut()?.request_with_ack(t, request)? {
            return Err(no_synapse());
        }

        Ok(())
    }

    pub fn set_spike_monitor(
        &mut self,
        group_id: GroupId,
        output: MonitorOutput,
    ) -> Result<SpikeMonitorHandle> {
        self.ensure_state(
            &[SimState::Ready, SimState::Finished],
            "setting a spike monitor",
        )?;

        let num_neurons = self.group_num_neurons(group_id)?;
        let nid_start = self.params.group_nid_starts()[group_id.0];

        let monitor = SpikeMonitor::new(group_id, nid_start, num_neurons, &output)?;
        self.spike_monitors.push(monitor);

        debug!("{}: spike monitor on group {} ({:?})", self.name, group_id.0, output);
        Ok(SpikeMonitorHandle(self.spike_monitors.len() - 1))
    }

    pub fn spike_monitor(&self, handle: SpikeMonitorHandle) -> Result<&SpikeMonitor> {
        self.spike_monitors
            .get(handle.0)
            .ok_or_else(|| SimError::config("invalid spike monitor handle"))
    }

    pub fn spike_monitor_mut(&mut self, handle: SpikeMonitorHandle) -> Result<&mut SpikeMonitor> {
        self.spike_monitors
            .get_mut(handle.0)
            .ok_or_else(|| SimError::config("invalid spike monitor handle"))
    }

    /// Attaches a weight monitor to the connection between two groups. The
    /// monitor starts out empty; snapshots come from `take_snapshot` and from
    /// the periodic interval.
    pub fn set_connection_monitor(
        &mut self,
        from: GroupId,
        to: GroupId,
        output: MonitorOutput,
    ) -> Result<ConnectionMonitorHandle> {
        self.ensure_state(
            &[SimState::Ready, SimState::Finished],
            "setting a connection monitor",
        )?;

        let connection_id = self.connection_id(from, to).ok_or_else(|| {
            SimError::config(format!(
                "no connection from group {} to group {}",
                from.0, to.0
            ))
        })?;

        let dimensions = (self.group_num_neurons(from)?, self.group_num_neurons(to)?);
        let monitor = ConnectionMonitor::new(connection_id, (from, to), dimensions, &output)?;
        self.connection_monitors.push(monitor);

        let handle = ConnectionMonitorHandle(self.connection_monitors.len() - 1);

        debug!(
            "{}: connection monitor on connection {} ({:?})",
            self.name, connection_id.0, output
        );
        Ok(handle)
    }

    pub fn connection_monitor(&self, handle: ConnectionMonitorHandle) -> Result<&ConnectionMonitor> {
        self.connection_monitors
            .get(handle.0)
            .ok_or_else(|| SimError::config("invalid connection monitor handle"))
    }

    /// `interval_sec < 0` disables periodic snapshots.
    pub fn set_update_time_interval_sec(
        &mut self,
        handle: ConnectionMonitorHandle,
        interval_sec: i32,
    ) -> Result<()> {
        self.ensure_state(
            &[SimState::Ready, SimState::Finished],
            "changing the snapshot interval",
        )?;

        self.connection_monitors
            .get_mut(handle.0)
            .ok_or_else(|| SimError::config("invalid connection monitor handle"))?
            .set_update_interval_sec(interval_sec)
    }

    /// Captures the weights of the monitored connection right away.
    pub fn take_snapshot(&mut self, handle: ConnectionMonitorHandle) -> Result<&WeightSnapshot> {
        self.ensure_state(&[SimState::Ready, SimState::Finished], "taking a snapshot")?;

        let connection_id = self.connection_monitor(handle)?.connection_id();
        let snapshot = self.extract_snapshot(connection_id)?;
        self.connection_monitors[handle.0].record(snapshot)
    }

    fn extract_snapshot(&mut self, connection_id: ConnectionId) -> Result<WeightSnapshot> {
        let t = self.t;
        let weights = self.workers_mut()?.extract_weights(t, connection_id)?;

        debug!(
            "{}: snapshot of connection {} at t = {} ms",
            self.name, connection_id.0, t
        );

        Ok(WeightSnapshot {
            t,
            connection_id,
            weights,
        })
    }

    /// Advances the simulation by the given duration. Returns once the whole
    /// duration has been simulated or a numeric fault aborted the run.
    pub fn run_network(&mut self, seconds: i32, milliseconds: i32) -> Result<RunSummary> {
        self.ensure_state(&[SimState::Ready, SimState::Finished], "running the network")?;

        if seconds < 0 || milliseconds < 0 {
            return Err(SimError::config("run duration must not be negative"));
        }

        let duration_ms = seconds as usize * 1000 + milliseconds as usize;
        if duration_ms == 0 {
            return Err(SimError::config("run duration must be strictly positive"));
        }

        info!(
            "{}: running for {} ms from t = {} ms",
            self.name, duration_ms, self.t
        );

        self.state = SimState::Running;

        let t_start = self.t;
        let synaptic_transmission_count_start = self.synaptic_transmission_count;
        let wall_start = Instant::now();
        let mut spike_count = 0;

        let mut result = Ok(());
        for _ in 0..duration_ms {
            match self.tick() {
                Ok(num_spikes) => spike_count += num_spikes,
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        self.state = SimState::Finished;
        let flushed = self.flush_monitors();

        if let Err(err) = result {
            error!("{}: run aborted: {}", self.name, err);
            return Err(err);
        }
        flushed?;

        let summary = RunSummary {
            t_start,
            t_end: self.t,
            spike_count,
            synaptic_transmission_count: self.synaptic_transmission_count
                - synaptic_transmission_count_start,
            wall_time: wall_start.elapsed(),
        };

        info!(
            "{}: reached t = {} ms, {} spikes, {} synaptic transmissions in {:.3} s",
            self.name,
            summary.t_end,
            summary.spike_count,
            summary.synaptic_transmission_count,
            summary.wall_time.as_secs_f64()
        );

        Ok(summary)
    }

    fn tick(&mut self) -> Result<usize> {
        let t = self.t;
        let spiked_nids = std::mem::take(&mut self.spiking_nid_buffer);

        let result = self.workers_mut()?.tick(TickContext { t, spiked_nids })?;

        self.t += 1;
        self.synaptic_transmission_count += result.synaptic_transmission_count;

        if let Some(nid) = result.unstable_nids.first() {
            return Err(SimError::Runtime {
                t,
                reason: format!("state of neuron {} is not finite", nid),
            });
        }

        for monitor in self.spike_monitors.iter_mut() {
            monitor.record(t, &result.spiking_nids)?;
        }

        for monitor_idx in 0..self.connection_monitors.len() {
            if self.connection_monitors[monitor_idx].is_snapshot_due(self.t) {
                let connection_id = self.connection_monitors[monitor_idx].connection_id();
                let snapshot = self.extract_snapshot(connection_id)?;
                self.connection_monitors[monitor_idx].record(snapshot)?;
            }
        }

        let num_spikes = result.spiking_nids.len();
        self.spiking_nid_buffer = result.spiking_nids;
        Ok(num_spikes)
    }

    fn flush_monitors(&mut self) -> Result<()> {
        for monitor in self.spike_monitors.iter_mut() {
            monitor.flush()?;
        }

        for monitor in self.connection_monitors.iter_mut() {
            monitor.flush()?;
        }

        Ok(())
    }
}

fn count_synapses(
    network_params: &NetworkParams,
    conn_params: &ConnectionParams,
    connection_id: ConnectionId,
) -> Result<usize> {
    let nid_starts = network_params.group_nid_starts();
    let from_group = &network_params.groups[conn_params.from.0];
    let to_group = &network_params.groups[conn_params.to.0];

    let endpoints = Endpoints {
        from_grid: &from_group.grid,
        from_nid_start: nid_starts[conn_params.from.0],
        to_grid: &to_group.grid,
        to_nid_start: nid_starts[conn_params.to.0],
    };

    let num_synapses = wiring::build_synapses(
        conn_params,
        connection_id,
        endpoints,
        0..to_group.num_neurons,
        network_params.seed(),
    )
    .len();

    if num_synapses == 0 {
        return Err(SimError::config(format!(
            "connection from group {} to group {} has no synapses",
            from_group.name, to_group.name
        )));
    }

    Ok(num_synapses)
}
