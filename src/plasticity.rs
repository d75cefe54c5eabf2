use rand::{prelude::Distribution, rngs::StdRng, SeedableRng};
use statrs::distribution::Normal;

use crate::params::{HomeostasisParams, StdpCurve};
use crate::types::DT_MS;
use crate::util::calculate_hash;

/// Pairings further apart than this many time constants are ignored.
const STDP_WINDOW_TAUS: f32 = 5.0;

/// Lower bound for per-neuron homeostatic targets drawn from a wide distribution.
const MIN_BASE_FIRING_RATE: f32 = 0.1;

/// Relative rate error at which homeostasis fully suppresses STDP changes that
/// push the rate further away from the target.
const STDP_GATE_TOLERANCE: f32 = 0.05;

/// Weight change for a pre/post pairing. `t_pre_minus_post <= 0` means the
/// presynaptic spike arrived first (or together) and potentiates.
pub fn compute_stdp(t_pre_minus_post: i64, curve: &StdpCurve) -> f32 {
    let t_pre_minus_post = t_pre_minus_post as f32;

    match *curve {
        StdpCurve::Exp {
            potentiation_amplitude,
            potentiation_tau,
            depression_amplitude,
            depression_tau,
        } => {
            if t_pre_minus_post > 0.0 {
                -depression_amplitude * (-t_pre_minus_post / depression_tau).exp()
            } else {
                potentiation_amplitude * (t_pre_minus_post / potentiation_tau).exp()
            }
        }
    }
}

pub fn stdp_window(curve: &StdpCurve) -> usize {
    match *curve {
        StdpCurve::Exp {
            potentiation_tau,
            depression_tau,
            ..
        } => (STDP_WINDOW_TAUS * potentiation_tau.max(depression_tau)).ceil() as usize,
    }
}

/// Running firing-rate estimates of the neurons of one partition and the
/// multiplicative synaptic scaling derived from them.
#[derive(Debug, Clone)]
pub struct Homeostasis {
    scale: f32,
    tau_ms: f32,
    avg_decay: f32,
    spike_increment: f32,
    avg_firing: Vec<f32>,
    base_firing: Vec<f32>,
}

impl Homeostasis {
    pub fn new(params: &HomeostasisParams, nid_start: usize, num_neurons: usize, seed: u64) -> Self {
        let tau_ms = params.avg_time_scale_sec * 1000.0 / DT_MS;

        let (target_rate, std_dev) = params
            .base_firing
            .map(|base_firing| (base_firing.target_rate, base_firing.std_dev))
            .unwrap_or((MIN_BASE_FIRING_RATE, 0.0));

        let base_firing: Vec<f32> = (nid_start..nid_start + num_neurons)
            .map(|nid| {
                if std_dev > 0.0 {
                    draw_base_firing(target_rate, std_dev, seed, nid)
                } else {
                    target_rate
                }
            })
            .collect();

        Self {
            scale: params.scale,
            tau_ms,
            avg_decay: 1.0 - 1.0 / tau_ms,
            spike_increment: 1000.0 / (tau_ms * DT_MS),
            avg_firing: base_firing.clone(),
            base_firing,
        }
    }

    pub fn decay(&mut self) {
        for avg in self.avg_firing.iter_mut() {
            *avg *= self.avg_decay;
        }
    }

    pub fn on_spike(&mut self, neuron_idx: usize) {
        self.avg_firing[neuron_idx] += self.spike_increment;
    }

    #[cfg(test)]
    pub fn get_avg_firing(&self, neuron_idx: usize) -> f32 {
        self.avg_firing[neuron_idx]
    }

    #[cfg(test)]
    pub fn get_base_firing(&self, neuron_idx: usize) -> f32 {
        self.base_firing[neuron_idx]
    }

    fn diff_firing(&self, neuron_idx: usize) -> f32 {
        1.0 - self.avg_firing[neuron_idx] / self.base_firing[neuron_idx]
    }

    /// Scaling applied to one incoming plastic synapse in the current step.
    pub fn scaling_change(&self, neuron_idx: usize, weight: f32) -> f32 {
        weight * self.scale * self.diff_firing(neuron_idx) / self.tau_ms
    }

    /// Damps an STDP change of a synapse onto `neuron_idx`. Potentiation fades
    /// out as the average rate rises above the target and depression fades out
    /// as it falls below, so the rate settles within the gate tolerance of the
    /// target however strong the STDP drift is.
    pub fn gate_stdp(&self, neuron_idx: usize, weight_change: f32) -> f32 {
        let error = self.diff_firing(neuron_idx) / STDP_GATE_TOLERANCE;
        let gain = if weight_change > 0.0 {
            1.0 + error
        } else {
            1.0 - error
        };

        weight_change * gain.clamp(0.0, 1.0)
    }
}

fn draw_base_firing(target_rate: f32, std_dev: f32, seed: u64, nid: usize) -> f32 {
    let mut rng = StdRng::seed_from_u64(calculate_hash(&(seed, nid, "homeostasis")));

    match Normal::new(target_rate as f64, std_dev as f64) {
        Ok(normal) => (normal.sample(&mut rng) as f32).max(MIN_BASE_FIRING_RATE),
        Err(_) => target_rate,
    }
}
