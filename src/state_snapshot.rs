use serde::{Deserialize, Serialize};

use crate::types::ConnectionId;

/// Weights of all synapses of one connection at simulation time `t` (ms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub t: usize,
    pub connection_id: ConnectionId,
    pub weights: Vec<SynapseWeight>,
}

/// `pre` and `post` are neuron indexes within the source and destination group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynapseWeight {
    pub pre: usize,
    pub post: usize,
    pub weight: f32,
}

impl WeightSnapshot {
    pub fn num_synapses(&self) -> usize {
        self.weights.len()
    }

    pub fn mean_weight(&self) -> Option<f32> {
        if self.weights.is_empty() {
            None
        } else {
            Some(self.weights.iter().map(|syn| syn.weight).sum::<f32>() / self.weights.len() as f32)
        }
    }

    /// Dense `num_pre × num_post` weight matrix. Pairs without a synapse are NaN.
    pub fn to_matrix(&self, num_pre: usize, num_post: usize) -> Vec<Vec<f32>> {
        let mut matrix = vec![vec![f32::NAN; num_post]; num_pre];

        for syn in &self.weights {
            if syn.pre < num_pre && syn.post < num_post {
                matrix[syn.pre][syn.post] = syn.weight;
            }
        }

        matrix
    }

    /// Sum of absolute weight differences against an earlier snapshot of the
    /// same connection.
    pub fn abs_weight_change_since(&self, earlier: &WeightSnapshot) -> f32 {
        self.weights
            .iter()
            .zip(earlier.weights.iter())
            .map(|(now, before)| (now.weight - before.weight).abs())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn snapshot(t: usize, weights: &[(usize, usize, f32)]) -> WeightSnapshot {
        WeightSnapshot {
            t,
            connection_id: ConnectionId(0),
            weights: weights
                .iter()
                .map(|(pre, post, weight)| SynapseWeight {
                    pre: *pre,
                    post: *post,
                    weight: *weight,
                })
                .collect(),
        }
    }

    #[test]
    fn matrix_marks_missing_synapses() {
        let sut = snapshot(0, &[(0, 1, 0.5), (1, 0, 0.25)]);
        let matrix = sut.to_matrix(2, 2);

        assert!(matrix[0][0].is_nan());
        assert_approx_eq!(f32, matrix[0][1], 0.5);
        assert_approx_eq!(f32, matrix[1][0], 0.25);
        assert!(matrix[1][1].is_nan());
    }

    #[test]
    fn mean_weight() {
        assert_eq!(snapshot(0, &[]).mean_weight(), None);
        let sut = snapshot(0, &[(0, 0, 0.5), (1, 0, 0.25)]);
        assert_approx_eq!(f32, sut.mean_weight().unwrap_or_default(), 0.375);
        assert_eq!(sut.num_synapses(), 2);
    }

    #[test]
    fn abs_weight_change() {
        let before = snapshot(0, &[(0, 0, 0.5), (1, 0, 0.25)]);
        let after = snapshot(1000, &[(0, 0, 0.4), (1, 0, 0.5)]);
        assert_approx_eq!(f32, after.abs_weight_change_since(&before), 0.35);
        assert_approx_eq!(f32, after.abs_weight_change_since(&after), 0.0);
    }
}
