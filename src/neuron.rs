use crate::params::{ConductanceParams, IzhikevichParams, Polarity};
use crate::util::get_step_decay_factor;

pub const SPIKE_THRESHOLD: f32 = 30.0;

const REVERSAL_AMPA: f32 = 0.0;
const REVERSAL_NMDA: f32 = 0.0;
const REVERSAL_GABAA: f32 = -70.0;
const REVERSAL_GABAB: f32 = -90.0;

/// Per-step decay factors of the four synaptic conductances.
#[derive(Debug, Clone, Copy)]
pub struct ConductanceDecay {
    ampa: f32,
    nmda: f32,
    gabaa: f32,
    gabab: f32,
}

impl ConductanceDecay {
    pub fn new(params: &ConductanceParams) -> Self {
        Self {
            ampa: get_step_decay_factor(params.tau_ampa),
            nmda: get_step_decay_factor(params.tau_nmda),
            gabaa: get_step_decay_factor(params.tau_gabaa),
            gabab: get_step_decay_factor(params.tau_gabab),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntegrationOutcome {
    Quiet,
    Spiked,
    /// Membrane potential or recovery variable left the finite range.
    Unstable,
}

#[derive(Debug, Clone)]
pub struct Neuron {
    v: f32,
    u: f32,
    input_current: f32,
    g_ampa: f32,
    g_nmda: f32,
    g_gabaa: f32,
    g_gabab: f32,
    last_spike_t: Option<usize>,
}

impl Neuron {
    pub fn new(params: &IzhikevichParams) -> Self {
        Self {
            v: params.c,
            u: params.b * params.c,
            input_current: 0.0,
            g_ampa: 0.0,
            g_nmda: 0.0,
            g_gabaa: 0.0,
            g_gabab: 0.0,
            last_spike_t: None,
        }
    }

    #[cfg(test)]
    pub fn get_voltage(&self) -> f32 {
        self.v
    }

    #[cfg(test)]
    pub fn get_recovery(&self) -> f32 {
        self.u
    }

    pub fn get_last_spike_t(&self) -> Option<usize> {
        self.last_spike_t
    }

    /// Registers a synaptic arrival. In conductance mode the weight opens the
    /// receptor channels matching the presynaptic polarity, otherwise it adds
    /// to the input current of the next integration step.
    pub fn receive(&mut self, weight: f32, polarity: Polarity, conductance_based: bool) {
        match (conductance_based, polarity) {
            (true, Polarity::Excitatory) => {
                self.g_ampa += weight;
                self.g_nmda += weight;
            }
            (true, Polarity::Inhibitory) => {
                self.g_gabaa += weight;
                self.g_gabab += weight;
            }
            (false, Polarity::Excitatory) => self.input_current += weight,
            (false, Polarity::Inhibitory) => self.input_current -= weight,
        }
    }

    fn synaptic_current(&self, conductance_decay: Option<&ConductanceDecay>) -> f32 {
        if conductance_decay.is_none() {
            return self.input_current;
        }

        let v = self.v;
        let nmda_x = ((v + 80.0) / 60.0).powi(2);
        let nmda_gate = nmda_x / (1.0 + nmda_x);

        -self.g_ampa * (v - REVERSAL_AMPA)
            - self.g_nmda * nmda_gate * (v - REVERSAL_NMDA)
            - self.g_gabaa * (v - REVERSAL_GABAA)
            - self.g_gabab * (v - REVERSAL_GABAB)
    }

    /// Advances the neuron by one 1 ms step.
    pub fn integrate(
        &mut self,
        t: usize,
        params: &IzhikevichParams,
        conductance_decay: Option<&ConductanceDecay>,
    ) -> IntegrationOutcome {
        let current = self.synaptic_current(conductance_decay);

        // two half steps for numerical stability of the quadratic term
        for _ in 0..2 {
            self.v += 0.5 * (0.04 * self.v * self.v + 5.0 * self.v + 140.0 - self.u + current);
        }
        self.u += params.a * (params.b * self.v - self.u);

        self.input_current = 0.0;
        if let Some(decay) = conductance_decay {
            self.g_ampa *= decay.ampa;
            self.g_nmda *= decay.nmda;
            self.g_gabaa *= decay.gabaa;
            self.g_gabab *= decay.gabab;
        }

        if !self.v.is_finite() || !self.u.is_finite() {
            return IntegrationOutcome::Unstable;
        }

        if self.v >= SPIKE_THRESHOLD {
            self.spike(t, params);
            IntegrationOutcome::Spiked
        } else {
            IntegrationOutcome::Quiet
        }
    }

    fn spike(&mut self, t: usize, params: &IzhikevichParams) {
        self.v = params.c;
        self.u += params.d;
        self.last_spike_t = Some(t);
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use float_cmp::assert_approx_eq;

    fn params() -> IzhikevichParams {
        IzhikevichParams::regular_spiking()
    }

    fn run_with_current(sut: &mut Neuron, steps: usize, current: f32) -> usize {
        let params = params();
        let mut spike_count = 0;
        for t in 0..steps {
            sut.receive(current, Polarity::Excitatory, false);
            if sut.integrate(t, &params, None) == IntegrationOutcome::Spiked {
                spike_count += 1;
            }
        }
        spike_count
    }

    #[test]
    fn initial_state_at_rest() {
        let sut = Neuron::new(&params());
        assert_approx_eq!(f32, sut.get_voltage(), -65.0);
        assert_approx_eq!(f32, sut.get_recovery(), -13.0);
        assert_eq!(sut.get_last_spike_t(), None);
    }

    #[test]
    fn stays_quiet_without_input() {
        let mut sut = Neuron::new(&params());
        assert_eq!(run_with_current(&mut sut, 1000, 0.0), 0);
        assert!(sut.get_voltage() < -60.0);
    }

    #[test]
    fn tonic_spiking_under_constant_current() {
        let mut sut = Neuron::new(&params());
        let spike_count = run_with_current(&mut sut, 1000, 10.0);
        assert!(spike_count > 5);
        assert!(spike_count < 100);
        assert!(sut.get_last_spike_t().is_some());
    }

    #[test]
    fn stronger_current_fires_more() {
        let mut weak = Neuron::new(&params());
        let mut strong = Neuron::new(&params());
        assert!(run_with_current(&mut strong, 1000, 20.0) > run_with_current(&mut weak, 1000, 6.0));
    }

    #[test]
    fn reset_after_spike() {
        let params = params();
        let mut sut = Neuron::new(&params);
        sut.receive(1000.0, Polarity::Excitatory, false);
        assert_eq!(sut.integrate(3, &params, None), IntegrationOutcome::Spiked);
        assert_approx_eq!(f32, sut.get_voltage(), params.c);
        assert_eq!(sut.get_last_spike_t(), Some(3));
    }

    #[test]
    fn current_is_consumed_by_integration() {
        let params = params();
        let mut sut = Neuron::new(&params);
        sut.receive(5.0, Polarity::Excitatory, false);
        sut.receive(5.0, Polarity::Inhibitory, false);
        let mut reference = Neuron::new(&params);
        sut.integrate(0, &params, None);
        reference.integrate(0, &params, None);
        assert_approx_eq!(f32, sut.get_voltage(), reference.get_voltage());
    }

    #[test]
    fn inhibitory_current_hyperpolarizes() {
        let params = params();
        let mut sut = Neuron::new(&params);
        let mut reference = Neuron::new(&params);
        sut.receive(5.0, Polarity::Inhibitory, false);
        sut.integrate(0, &params, None);
        reference.integrate(0, &params, None);
        assert!(sut.get_voltage() < reference.get_voltage());
    }

    #[test]
    fn excitatory_conductance_depolarizes_and_decays() {
        let params = params();
        let decay = ConductanceDecay::new(&ConductanceParams::default());
        let mut sut = Neuron::new(&params);
        let mut reference = Neuron::new(&params);

        sut.receive(0.05, Polarity::Excitatory, true);
        assert_approx_eq!(f32, sut.g_ampa, 0.05);
        assert_approx_eq!(f32, sut.g_nmda, 0.05);

        sut.integrate(0, &params, Some(&decay));
        reference.integrate(0, &params, Some(&decay));

        assert!(sut.get_voltage() > reference.get_voltage());
        assert_approx_eq!(f32, sut.g_ampa, 0.05 * (-1.0f32 / 5.0).exp());
        assert_approx_eq!(f32, sut.g_nmda, 0.05 * (-1.0f32 / 150.0).exp());
    }

    #[test]
    fn inhibitory_conductance_hyperpolarizes() {
        let params = params();
        let decay = ConductanceDecay::new(&ConductanceParams::default());
        let mut sut = Neuron::new(&params);
        let mut reference = Neuron::new(&params);

        sut.receive(0.5, Polarity::Inhibitory, true);
        sut.integrate(0, &params, Some(&decay));
        reference.integrate(0, &params, Some(&decay));

        assert!(sut.get_voltage() < reference.get_voltage());
        assert_approx_eq!(f32, sut.g_gabaa, 0.5 * (-1.0f32 / 6.0).exp());
    }

    #[test]
    fn infinite_input_is_unstable() {
        let params = params();
        let mut sut = Neuron::new(&params);
        sut.receive(f32::MAX, Polarity::Excitatory, false);
        sut.receive(f32::MAX, Polarity::Excitatory, false);
        assert_eq!(sut.integrate(0, &params, None), IntegrationOutcome::Unstable);
    }
}
