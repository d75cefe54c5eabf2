use crate::params::RangeWeight;

#[derive(Debug, Clone)]
pub struct Synapse {
    pub neuron_idx: usize,
    pub conduction_delay: u8,
    pub weight: f32,
    pub last_arrival_t: Option<usize>,
}

impl Synapse {
    pub fn new(neuron_idx: usize, conduction_delay: u8, initial_weight: f32) -> Self {
        Self {
            neuron_idx,
            conduction_delay,
            weight: initial_weight,
            last_arrival_t: None,
        }
    }

    pub fn on_arrival(&mut self, t: usize) -> f32 {
        self.last_arrival_t = Some(t);
        self.weight
    }

    pub fn process_weight_change(&mut self, weight_change: f32, weight_range: &RangeWeight) {
        self.weight = weight_range.clamp(self.weight + weight_change);
    }

    pub fn set_weight(&mut self, weight: f32, weight_range: &RangeWeight) {
        self.weight = weight_range.clamp(weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    const WEIGHT_RANGE: RangeWeight = RangeWeight { min: 0.1, max: 0.5 };

    #[test]
    fn weight_change() {
        let mut sut = Synapse::new(0, 1, 0.4);
        sut.process_weight_change(-0.1, &WEIGHT_RANGE);
        assert_approx_eq!(f32, sut.weight, 0.3);
    }

    #[test]
    fn weight_floor() {
        let mut sut = Synapse::new(0, 1, 0.4);
        sut.process_weight_change(-0.5, &WEIGHT_RANGE);
        assert_approx_eq!(f32, sut.weight, 0.1);
    }

    #[test]
    fn weight_ceil() {
        let mut sut = Synapse::new(0, 1, 0.4);
        sut.process_weight_change(0.3, &WEIGHT_RANGE);
        assert_approx_eq!(f32, sut.weight, 0.5);
    }

    #[test]
    fn set_weight_is_clamped() {
        let mut sut = Synapse::new(0, 1, 0.4);
        sut.set_weight(2.0, &WEIGHT_RANGE);
        assert_approx_eq!(f32, sut.weight, 0.5);
        sut.set_weight(0.2, &WEIGHT_RANGE);
        assert_approx_eq!(f32, sut.weight, 0.2);
    }

    #[test]
    fn arrival_is_remembered() {
        let mut sut = Synapse::new(3, 2, 0.25);
        assert_eq!(sut.last_arrival_t, None);
        assert_approx_eq!(f32, sut.on_arrival(17), 0.25);
        assert_eq!(sut.last_arrival_t, Some(17));
    }
}
