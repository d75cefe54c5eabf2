use std::collections::VecDeque;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::params::{validate_rates, MAX_POISSON_RATE};
use crate::types::{SpikeEvent, DT_MS};
use crate::util::calculate_hash;

/// Firing rates (Hz) for the neurons of a Poisson group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoissonRate {
    rates: Vec<f32>,
}

impl PoissonRate {
    pub fn new(num_neurons: usize) -> Self {
        Self {
            rates: vec![0.0; num_neurons],
        }
    }

    pub fn num_neurons(&self) -> usize {
        self.rates.len()
    }

    pub fn rates(&self) -> &[f32] {
        &self.rates
    }

    pub fn set_rates(&mut self, rates: Vec<f32>) -> Result<()> {
        if rates.len() != self.rates.len() {
            return Err(SimError::config(format!(
                "expected {} rates, got {}",
                self.rates.len(),
                rates.len()
            )));
        }

        validate_rates(&rates)?;
        self.rates = rates;
        Ok(())
    }

    pub fn set_rate(&mut self, neuron_idx: usize, rate: f32) -> Result<()> {
        if neuron_idx >= self.rates.len() {
            return Err(SimError::config(format!(
                "invalid neuron index for rate: {}",
                neuron_idx
            )));
        }

        validate_rates(&[rate])?;
        self.rates[neuron_idx] = rate;
        Ok(())
    }
}

fn spike_probability(rate: f32) -> f64 {
    ((rate * DT_MS / 1000.0) as f64).clamp(0.0, (MAX_POISSON_RATE * DT_MS / 1000.0) as f64)
}

fn source_rng(seed: u64, nid: usize) -> StdRng {
    StdRng::seed_from_u64(calculate_hash(&(seed, nid, "poisson")))
}

/// Stochastic spike train of a block of Poisson neurons with global ids
/// starting at `nid_start`. Every step, each neuron spikes with probability
/// `rate * dt`, which makes the inter-spike intervals approximately
/// exponential with mean `1 / rate`.
#[derive(Debug, Clone)]
pub struct PoissonSpikeTrain {
    nid_start: usize,
    seed: u64,
    t: usize,
    rates: Vec<f32>,
    probabilities: Vec<f64>,
    rngs: Vec<StdRng>,
    pending: VecDeque<SpikeEvent>,
}

impl PoissonSpikeTrain {
    pub fn new(nid_start: usize, rates: &[f32], seed: u64) -> Self {
        let rngs = (0..rates.len())
            .map(|idx| source_rng(seed, nid_start + idx))
            .collect();

        let mut train = Self {
            nid_start,
            seed,
            t: 0,
            rates: Vec::new(),
            probabilities: Vec::new(),
            rngs,
            pending: VecDeque::new(),
        };
        train.set_rates(rates);
        train
    }

    pub fn num_neurons(&self) -> usize {
        self.rngs.len()
    }

    pub fn get_t(&self) -> usize {
        self.t
    }

    pub fn rates(&self) -> &[f32] {
        &self.rates
    }

    /// Replaces the rates without touching the random state. Rates are
    /// expected to be validated by the caller.
    pub fn set_rates(&mut self, rates: &[f32]) {
        debug_assert_eq!(rates.len(), self.rngs.len());

        self.rates = rates.to_vec();
        self.probabilities = rates.iter().map(|rate| spike_probability(*rate)).collect();
    }

    /// Rewinds to step zero. The train then replays the exact same spikes.
    pub fn restart(&mut self) {
        self.t = 0;
        self.pending.clear();
        for (idx, rng) in self.rngs.iter_mut().enumerate() {
            *rng = source_rng(self.seed, self.nid_start + idx);
        }
    }

    /// Draws the spikes of the next step and appends their global ids.
    pub fn step_into(&mut self, spiking_nids: &mut Vec<usize>) {
        for (idx, (p, rng)) in self
            .probabilities
            .iter()
            .zip(self.rngs.iter_mut())
            .enumerate()
        {
            if rng.gen::<f64>() < *p {
                spiking_nids.push(self.nid_start + idx);
            }
        }
        self.t += 1;
    }

    pub fn step(&mut self) -> Vec<SpikeEvent> {
        let t = self.t;
        let mut spiking_nids = Vec::new();
        self.step_into(&mut spiking_nids);
        spiking_nids
            .into_iter()
            .map(|nid| SpikeEvent { nid, t })
            .collect()
    }

    fn is_silent(&self) -> bool {
        self.rates.iter().all(|rate| *rate <= 0.0)
    }
}

/// Infinite sequence of spikes in time order. A train whose rates are all zero
/// never spikes and therefore ends immediately.
impl Iterator for PoissonSpikeTrain {
    type Item = SpikeEvent;

    fn next(&mut self) -> Option<SpikeEvent> {
        while self.pending.is_empty() {
            if self.is_silent() {
                return None;
            }
            let spikes = self.step();
            self.pending.extend(spikes);
        }
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_length_must_match() {
        let mut sut = PoissonRate::new(3);
        let result = sut.set_rates(vec![1.0, 2.0]);
        assert!(result.unwrap_err().is_config());
        assert!(sut.set_rates(vec![1.0, 2.0, 3.0]).is_ok());
        assert_eq!(sut.rates(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn invalid_rates_are_rejected() {
        let mut sut = PoissonRate::new(2);
        assert!(sut.set_rates(vec![1.0, -1.0]).is_err());
        assert!(sut.set_rates(vec![1.0, 1001.0]).is_err());
        assert!(sut.set_rate(2, 1.0).is_err());
        assert!(sut.set_rate(1, 4.0).is_ok());
        assert_eq!(sut.rates(), &[0.0, 4.0]);
    }

    #[test]
    fn zero_rate_never_spikes() {
        let mut sut = PoissonSpikeTrain::new(0, &[0.0, 0.0], 0);
        for _ in 0..1000 {
            assert!(sut.step().is_empty());
        }
        assert_eq!(sut.get_t(), 1000);
        assert!(sut.next().is_none());
    }

    #[test]
    fn max_rate_spikes_every_step() {
        let mut sut = PoissonSpikeTrain::new(5, &[1000.0], 0);
        for t in 0..100 {
            assert_eq!(sut.step(), vec![SpikeEvent { nid: 5, t }]);
        }
    }

    #[test]
    fn spike_count_converges_to_rate() {
        let rate = 20.0;
        let duration_ms = 1_000_000;
        let mut sut = PoissonSpikeTrain::new(0, &[rate], 7);
        let mut spiking_nids = Vec::new();

        for _ in 0..duration_ms {
            sut.step_into(&mut spiking_nids);
        }

        let expected = rate as f64 * duration_ms as f64 / 1000.0;
        let observed = spiking_nids.len() as f64;
        assert!(
            (observed - expected).abs() < 0.03 * expected,
            "observed {} expected {}",
            observed,
            expected
        );
    }

    #[test]
    fn iterator_yields_ordered_events() {
        let sut = PoissonSpikeTrain::new(100, &[200.0, 50.0, 0.0], 1);
        let events: Vec<SpikeEvent> = sut.take(500).collect();

        assert_eq!(events.len(), 500);
        assert!(events.windows(2).all(|pair| pair[0].t <= pair[1].t));
        assert!(events.iter().all(|event| event.nid == 100 || event.nid == 101));
    }

    #[test]
    fn restart_replays_sequence() {
        let mut sut = PoissonSpikeTrain::new(0, &[100.0, 300.0], 11);
        let first: Vec<SpikeEvent> = sut.by_ref().take(200).collect();
        sut.restart();
        assert_eq!(sut.get_t(), 0);
        let second: Vec<SpikeEvent> = sut.by_ref().take(200).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn spikes_depend_on_nid_not_block_layout() {
        let mut whole = PoissonSpikeTrain::new(0, &[100.0, 100.0], 3);
        let mut tail = PoissonSpikeTrain::new(1, &[100.0], 3);

        for _ in 0..500 {
            let whole_nid_1: Vec<usize> = whole
                .step()
                .into_iter()
                .filter(|event| event.nid == 1)
                .map(|event| event.nid)
                .collect();
            let tail_nids: Vec<usize> = tail.step().into_iter().map(|event| event.nid).collect();
            assert_eq!(whole_nid_1, tail_nids);
        }
    }

    #[test]
    fn changing_rates_keeps_time() {
        let mut sut = PoissonSpikeTrain::new(0, &[0.0], 0);
        sut.step();
        sut.set_rates(&[1000.0]);
        assert_eq!(sut.step(), vec![SpikeEvent { nid: 0, t: 1 }]);
        assert_eq!(sut.rates(), &[1000.0]);
    }
}
