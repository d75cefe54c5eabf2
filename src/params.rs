use serde::{Deserialize, Serialize};
use simple_error::SimpleError;

use crate::types::{ConnectionId, GroupId, HashSet, DT_MS};

/// Highest rate a Poisson source can be driven at, one spike per step.
pub const MAX_POISSON_RATE: f32 = 1000.0;

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct NetworkParams {
    pub groups: Vec<GroupParams>,
    pub connections: Vec<ConnectionParams>,
    pub conductances: Option<ConductanceParams>,
    pub technical_params: TechnicalParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    Excitatory,
    Inhibitory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NeuronModel {
    PoissonSource { rates: Option<Vec<f32>> },
    Dynamical { params: Option<IzhikevichParams> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IzhikevichParams {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid3D {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupParams {
    pub name: String,
    pub num_neurons: usize,
    pub polarity: Polarity,
    pub model: NeuronModel,
    pub grid: Grid3D,
    pub stdp: Option<StdpParams>,
    pub homeostasis: Option<HomeostasisParams>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Topology {
    Full,
    FullNoDirect,
    OneToOne,
    Random { probability: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeWeight {
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDelay {
    pub min: u8,
    pub max: u8,
}

/// Receptive field radii per axis. A negative radius leaves the axis unbounded,
/// zero restricts it to the same coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusRF {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynapseKind {
    Fixed,
    Plastic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub from: GroupId,
    pub to: GroupId,
    pub topology: Topology,
    pub weight_range: RangeWeight,
    pub init_weight_fraction: f32,
    pub delay_range: RangeDelay,
    pub radius: RadiusRF,
    pub kind: SynapseKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StdpMode {
    /// Weight changes are applied as computed, without neuromodulation.
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StdpCurve {
    Exp {
        potentiation_amplitude: f32,
        potentiation_tau: f32,
        depression_amplitude: f32,
        depression_tau: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StdpParams {
    pub mode: StdpMode,
    pub curve: StdpCurve,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomeostasisParams {
    pub scale: f32,
    pub avg_time_scale_sec: f32,
    pub base_firing: Option<BaseFiringRate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseFiringRate {
    pub target_rate: f32,
    pub std_dev: f32,
}

/// Decay time constants (ms) of the synaptic conductances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConductanceParams {
    pub tau_ampa: f32,
    pub tau_nmda: f32,
    pub tau_gabaa: f32,
    pub tau_gabab: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalParams {
    pub num_threads: Option<usize>,
    pub pin_threads: bool,
    pub seed_override: Option<u64>,
}

impl Grid3D {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    pub fn linear(num_neurons: usize) -> Self {
        Self::new(num_neurons, 1, 1)
    }

    pub fn num_neurons(&self) -> usize {
        self.x * self.y * self.z
    }
}

impl GroupParams {
    pub fn poisson(name: &str, num_neurons: usize, polarity: Polarity) -> Self {
        Self {
            name: name.to_string(),
            num_neurons,
            polarity,
            model: NeuronModel::PoissonSource { rates: None },
            grid: Grid3D::linear(num_neurons),
            stdp: None,
            homeostasis: None,
        }
    }

    pub fn dynamical(name: &str, num_neurons: usize, polarity: Polarity) -> Self {
        Self {
            name: name.to_string(),
            num_neurons,
            polarity,
            model: NeuronModel::Dynamical { params: None },
            grid: Grid3D::linear(num_neurons),
            stdp: None,
            homeostasis: None,
        }
    }

    pub fn is_poisson(&self) -> bool {
        matches!(self.model, NeuronModel::PoissonSource { .. })
    }
}

impl IzhikevichParams {
    pub fn regular_spiking() -> Self {
        Self {
            a: 0.02,
            b: 0.2,
            c: -65.0,
            d: 8.0,
        }
    }

    pub fn fast_spiking() -> Self {
        Self {
            a: 0.1,
            b: 0.2,
            c: -65.0,
            d: 2.0,
        }
    }
}

impl RangeWeight {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, weight: f32) -> f32 {
        weight.max(self.min).min(self.max)
    }

    pub fn initial_weight(&self, init_weight_fraction: f32) -> f32 {
        self.min + init_weight_fraction * (self.max - self.min)
    }
}

impl RangeDelay {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub fn fixed(delay: u8) -> Self {
        Self::new(delay, delay)
    }
}

impl RadiusRF {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn unbounded() -> Self {
        Self::new(-1.0, -1.0, -1.0)
    }
}

impl StdpCurve {
    pub fn exp(
        potentiation_amplitude: f32,
        potentiation_tau: f32,
        depression_amplitude: f32,
        depression_tau: f32,
    ) -> Self {
        StdpCurve::Exp {
            potentiation_amplitude,
            potentiation_tau,
            depression_amplitude,
            depression_tau,
        }
    }
}

impl ConnectionParams {
    pub fn defaults_for_group_ids(from: GroupId, to: GroupId) -> Self {
        Self {
            from,
            to,
            topology: Topology::Full,
            weight_range: RangeWeight::new(0.0, 1.0),
            init_weight_fraction: 0.5,
            delay_range: RangeDelay::fixed(1),
            radius: RadiusRF::unbounded(),
            kind: SynapseKind::Fixed,
        }
    }

    pub fn is_plastic(&self) -> bool {
        self.kind == SynapseKind::Plastic
    }
}

impl Default for ConductanceParams {
    fn default() -> Self {
        Self {
            tau_ampa: 5.0,
            tau_nmda: 150.0,
            tau_gabaa: 6.0,
            tau_gabab: 150.0,
        }
    }
}

impl Default for TechnicalParams {
    fn default() -> Self {
        Self {
            num_threads: Some(1),
            pin_threads: false,
            seed_override: None,
        }
    }
}

impl NetworkParams {
    pub fn seed(&self) -> u64 {
        self.technical_params.seed_override.unwrap_or(0)
    }

    pub fn group_nid_starts(&self) -> Vec<usize> {
        let mut nid_starts = Vec::with_capacity(self.groups.len());
        let mut next_nid_start = 0;
        for group in &self.groups {
            nid_starts.push(next_nid_start);
            next_nid_start += group.num_neurons;
        }
        nid_starts
    }

    pub fn num_neurons(&self) -> usize {
        self.groups.iter().map(|group| group.num_neurons).sum()
    }

    pub fn find_connection(&self, from: GroupId, to: GroupId) -> Option<ConnectionId> {
        self.connections
            .iter()
            .position(|conn| conn.from == from && conn.to == to)
            .map(ConnectionId)
    }
}

pub fn validate_network_params(network_params: &NetworkParams) -> Result<(), SimpleError> {
    let mut seen_names = HashSet::default();

    for group_params in &network_params.groups {
        if !seen_names.insert(group_params.name.as_str()) {
            return Err(SimpleError::new(format!(
                "duplicate group name: {}",
                group_params.name
            )));
        }

        validate_group_params(group_params)?;
    }

    let mut seen_from_to_pairs = HashSet::default();

    for conn_params in &network_params.connections {
        validate_connection_endpoints(network_params, conn_params)?;

        if !seen_from_to_pairs.insert((conn_params.from, conn_params.to)) {
            return Err(SimpleError::new(format!(
                "duplicate connection from group {} to group {}",
                conn_params.from.0, conn_params.to.0
            )));
        }

        validate_connection_params(conn_params)?;
    }

    if let Some(conductance_params) = &network_params.conductances {
        validate_conductance_params(conductance_params)?;
    }

    validate_technical_params(&network_params.technical_params)?;

    Ok(())
}

pub fn validate_group_layout(group_params: &GroupParams) -> Result<(), SimpleError> {
    if group_params.name.is_empty() {
        return Err(SimpleError::new("group name must not be empty"));
    }

    if group_params.num_neurons == 0 {
        return Err(SimpleError::new("num_neurons must be strictly positive"));
    }

    if group_params.grid.num_neurons() != group_params.num_neurons {
        return Err(SimpleError::new(format!(
            "grid of group {} does not match num_neurons",
            group_params.name
        )));
    }

    Ok(())
}

fn validate_group_params(group_params: &GroupParams) -> Result<(), SimpleError> {
    validate_group_layout(group_params)?;

    match &group_params.model {
        NeuronModel::PoissonSource { rates } => {
            if let Some(rates) = rates {
                if rates.len() != group_params.num_neurons {
                    return Err(SimpleError::new(format!(
                        "number of rates of group {} does not match num_neurons",
                        group_params.name
                    )));
                }
                validate_rates(rates)?;
            }

            if group_params.stdp.is_some() {
                return Err(SimpleError::new(format!(
                    "STDP cannot be enabled on Poisson group {}",
                    group_params.name
                )));
            }

            if group_params.homeostasis.is_some() {
                return Err(SimpleError::new(format!(
                    "homeostasis cannot be enabled on Poisson group {}",
                    group_params.name
                )));
            }
        }
        NeuronModel::Dynamical { params } => match params {
            Some(params) => validate_izhikevich_params(params)?,
            None => {
                return Err(SimpleError::new(format!(
                    "neuron parameters of group {} are not set",
                    group_params.name
                )))
            }
        },
    }

    if let Some(stdp_params) = &group_params.stdp {
        validate_stdp_params(stdp_params)?;
    }

    if let Some(homeostasis_params) = &group_params.homeostasis {
        if homeostasis_params.base_firing.is_none() {
            return Err(SimpleError::new(format!(
                "homeostasis of group {} requires a base firing rate",
                group_params.name
            )));
        }
        validate_homeostasis_params(homeostasis_params)?;
    }

    Ok(())
}

pub fn validate_izhikevich_params(params: &IzhikevichParams) -> Result<(), SimpleError> {
    if ![params.a, params.b, params.c, params.d]
        .iter()
        .all(|value| value.is_finite())
    {
        return Err(SimpleError::new("neuron parameters must be finite"));
    }

    Ok(())
}

pub fn validate_rates(rates: &[f32]) -> Result<(), SimpleError> {
    for rate in rates {
        if !rate.is_finite() || *rate < 0.0 || *rate > MAX_POISSON_RATE {
            return Err(SimpleError::new(format!(
                "rate must be in [0, {}] Hz, got {}",
                MAX_POISSON_RATE, rate
            )));
        }
    }

    Ok(())
}

pub fn validate_connection_endpoints(
    network_params: &NetworkParams,
    conn_params: &ConnectionParams,
) -> Result<(), SimpleError> {
    if conn_params.from.0 >= network_params.groups.len() {
        return Err(SimpleError::new(format!(
            "invalid from group id: {}",
            conn_params.from.0
        )));
    }

    let to_group = network_params
        .groups
        .get(conn_params.to.0)
        .ok_or_else(|| SimpleError::new(format!("invalid to group id: {}", conn_params.to.0)))?;

    if to_group.is_poisson() {
        return Err(SimpleError::new(format!(
            "Poisson group {} cannot receive connections",
            to_group.name
        )));
    }

    Ok(())
}

pub fn validate_connection_params(conn_params: &ConnectionParams) -> Result<(), SimpleError> {
    let weight_range = &conn_params.weight_range;

    if !weight_range.min.is_finite() || !weight_range.max.is_finite() {
        return Err(SimpleError::new("weight_range must be finite"));
    }

    if weight_range.min < 0.0 {
        return Err(SimpleError::new("weight_range: min must not be negative"));
    }

    if weight_range.min > weight_range.max {
        return Err(SimpleError::new(
            "weight_range: min must not be greater than max",
        ));
    }

    if !(0.0..=1.0).contains(&conn_params.init_weight_fraction) {
        return Err(SimpleError::new("init_weight_fraction must be in [0, 1]"));
    }

    if conn_params.delay_range.min == 0 {
        return Err(SimpleError::new("delay_range: min must be at least 1"));
    }

    if conn_params.delay_range.min > conn_params.delay_range.max {
        return Err(SimpleError::new(
            "delay_range: min must not be greater than max",
        ));
    }

    if let Topology::Random { probability } = conn_params.topology {
        if probability <= 0.0 || probability > 1.0 {
            return Err(SimpleError::new("connection probability must be in (0, 1]"));
        }
    }

    Ok(())
}

pub fn validate_stdp_params(stdp_params: &StdpParams) -> Result<(), SimpleError> {
    match stdp_params.curve {
        StdpCurve::Exp {
            potentiation_amplitude,
            potentiation_tau,
            depression_amplitude,
            depression_tau,
        } => {
            if !(potentiation_amplitude >= 0.0 && potentiation_amplitude.is_finite()) {
                return Err(SimpleError::new(
                    "potentiation_amplitude must be finite and not negative",
                ));
            }

            if !(depression_amplitude >= 0.0 && depression_amplitude.is_finite()) {
                return Err(SimpleError::new(
                    "depression_amplitude must be finite and not negative",
                ));
            }

            if !(potentiation_tau > 0.0 && potentiation_tau.is_finite()) {
                return Err(SimpleError::new("potentiation_tau must be strictly positive"));
            }

            if !(depression_tau > 0.0 && depression_tau.is_finite()) {
                return Err(SimpleError::new("depression_tau must be strictly positive"));
            }
        }
    }

    Ok(())
}

pub fn validate_homeostasis_params(
    homeostasis_params: &HomeostasisParams,
) -> Result<(), SimpleError> {
    if !(homeostasis_params.scale >= 0.0 && homeostasis_params.scale.is_finite()) {
        return Err(SimpleError::new(
            "homeostasis scale must be finite and not negative",
        ));
    }

    if !(homeostasis_params.avg_time_scale_sec > 0.0
        && homeostasis_params.avg_time_scale_sec.is_finite())
    {
        return Err(SimpleError::new(
            "homeostasis avg_time_scale_sec must be strictly positive",
        ));
    }

    if homeostasis_params.avg_time_scale_sec * 1000.0 < DT_MS {
        return Err(SimpleError::new(
            "homeostasis avg_time_scale_sec must cover at least one time step",
        ));
    }

    if let Some(base_firing) = &homeostasis_params.base_firing {
        if !(base_firing.target_rate > 0.0 && base_firing.target_rate.is_finite()) {
            return Err(SimpleError::new(
                "homeostasis target_rate must be strictly positive",
            ));
        }

        if !(base_firing.std_dev >= 0.0 && base_firing.std_dev.is_finite()) {
            return Err(SimpleError::new(
                "homeostasis std_dev must be finite and not negative",
            ));
        }
    }

    Ok(())
}

pub fn validate_conductance_params(
    conductance_params: &ConductanceParams,
) -> Result<(), SimpleError> {
    let taus = [
        conductance_params.tau_ampa,
        conductance_params.tau_nmda,
        conductance_params.tau_gabaa,
        conductance_params.tau_gabab,
    ];

    if !taus.iter().all(|tau| *tau > 0.0 && tau.is_finite()) {
        return Err(SimpleError::new(
            "conductance time constants must be strictly positive",
        ));
    }

    Ok(())
}

fn validate_technical_params(technical_params: &TechnicalParams) -> Result<(), SimpleError> {
    if let Some(num_threads) = technical_params.num_threads {
        if num_threads == 0 {
            return Err(SimpleError::new("num_threads must be strictly positive"));
        }

        if num_cpus::get() < num_threads {
            return Err(SimpleError::new(
                "num_threads must not be greater than number of available CPUs",
            ));
        }
    }

    Ok(())
}
