use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::Serialize;

use crate::activation::Activation;
use crate::genome::{
    Connection, Genome, Neuron, NeuronRole, NeuronState, PlasticityType, ResourceBudgets,
    INPUT_NEURON_ID, OUTPUT_NEURON_ID,
};
use crate::network::NeuralNetwork;

/// Benchmark that scores a network. Fitness must lie in (0, 1].
pub trait Task {
    fn evaluate(&mut self, network: &mut NeuralNetwork, num_trials: usize) -> TaskResult;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrialResult {
    pub error: f64,
    pub predictions: usize,
    pub errors: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskResult {
    pub fitness: f64,
    pub average_error: f64,
    pub total_predictions: usize,
    pub trials: Vec<TrialResult>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SequenceType {
    SineWave,
    RepeatingPattern,
    FibonacciLike,
    RandomWalk,
}

impl SequenceType {
    pub const ALL: [SequenceType; 4] = [
        SequenceType::SineWave,
        SequenceType::RepeatingPattern,
        SequenceType::FibonacciLike,
        SequenceType::RandomWalk,
    ];
}

const REPEATING_PATTERN: [f64; 4] = [0.1, 0.3, 0.7, 0.2];
const RANDOM_WALK_SIGMA: f64 = 0.1;

/// Next-value prediction over short synthetic sequences. The network sees
/// `seq[i]` on the input neuron and is scored on how close the output
/// neuron lands to `seq[i + 1]`.
pub struct SequencePredictionTask {
    pub sequence_length: usize,
    rng: StdRng,
}

impl SequencePredictionTask {
    pub fn new(sequence_length: usize, seed: u64) -> SequencePredictionTask {
        SequencePredictionTask {
            sequence_length,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn generate_sequence(&mut self, kind: SequenceType) -> Vec<f64> {
        let len = self.sequence_length;
        match kind {
            SequenceType::SineWave => (0..len)
                .map(|t| (t as f64 * 0.3).sin() * 0.5 + 0.5)
                .collect(),
            SequenceType::RepeatingPattern => (0..len)
                .map(|t| REPEATING_PATTERN[t % REPEATING_PATTERN.len()])
                .collect(),
            SequenceType::FibonacciLike => {
                let mut sequence = vec![0.1, 0.2];
                while sequence.len() < len {
                    let n = sequence.len();
                    sequence.push((sequence[n - 1] + sequence[n - 2]) % 1.0);
                }
                sequence.truncate(len);
                sequence
            }
            SequenceType::RandomWalk => {
                let mut value: f64 = 0.5;
                (0..len)
                    .map(|_| {
                        let step: f64 = self.rng.sample(StandardNormal);
                        value = (value + step * RANDOM_WALK_SIGMA).clamp(0.0, 1.0);
                        value
                    })
                    .collect()
            }
        }
    }

    fn evaluate_single_trial(network: &mut NeuralNetwork, sequence: &[f64]) -> TrialResult {
        network.reset();

        let mut errors = Vec::with_capacity(sequence.len().saturating_sub(1));
        for window in sequence.windows(2) {
            let inputs = BTreeMap::from([(INPUT_NEURON_ID, window[0])]);
            let outputs = network.step(&inputs);
            let prediction = outputs.get(&OUTPUT_NEURON_ID).copied().unwrap_or(0.0);
            errors.push((prediction - window[1]).abs());
        }

        TrialResult {
            error: errors.iter().sum(),
            predictions: errors.len(),
            errors,
        }
    }

    /// Hand-built input -> hidden -> output network with a plastic self-loop
    /// on the hidden neuron, handy for smoke tests of the whole loop.
    pub fn reference_genome() -> Genome {
        let neuron = |id, role, activation, bias, threshold| Neuron {
            id,
            role,
            activation,
            initial_state: NeuronState::default(),
            bias,
            threshold,
            innovation_id: id,
        };
        let connection =
            |neuron_from, neuron_to, weight, learning_rate, delay, innovation_id| Connection {
                neuron_from,
                neuron_to,
                weight,
                learning_rate,
                delay,
                plasticity: PlasticityType::Hebbian,
                innovation_id,
            };

        let mut genome = Genome::new(
            vec![
                neuron(INPUT_NEURON_ID, NeuronRole::Input, Activation::Sigmoidal, 0.0, 0.0),
                neuron(
                    OUTPUT_NEURON_ID,
                    NeuronRole::Output,
                    Activation::tanh(Activation::sum()),
                    0.1,
                    0.5,
                ),
                neuron(3, NeuronRole::Hidden, Activation::Sigmoidal, -0.1, 0.3),
            ],
            vec![
                connection(1, 3, 0.5, 0.01, 0, 4),
                connection(3, 2, 0.8, 0.01, 0, 5),
                connection(3, 3, 0.3, 0.005, 1, 6),
            ],
            ResourceBudgets {
                max_neurons: 10,
                max_connections: 20,
                ..ResourceBudgets::default()
            },
        );
        genome.innovation_history = (1..=6).collect();
        genome
    }
}

impl Default for SequencePredictionTask {
    fn default() -> Self {
        SequencePredictionTask::new(10, 42)
    }
}

impl Task for SequencePredictionTask {
    fn evaluate(&mut self, network: &mut NeuralNetwork, num_trials: usize) -> TaskResult {
        let mut trials = Vec::with_capacity(num_trials);
        let mut total_error = 0.0;
        let mut total_predictions = 0;

        for _ in 0..num_trials {
            let kind = *SequenceType::ALL
                .choose(&mut self.rng)
                .unwrap_or(&SequenceType::SineWave);
            let sequence = self.generate_sequence(kind);
            let trial = Self::evaluate_single_trial(network, &sequence);
            total_error += trial.error;
            total_predictions += trial.predictions;
            trials.push(trial);
        }

        let average_error = if total_predictions > 0 {
            total_error / total_predictions as f64
        } else {
            1.0
        };

        TaskResult {
            fitness: 1.0 / (1.0 + average_error),
            average_error,
            total_predictions,
            trials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_have_requested_length_and_range() {
        let mut task = SequencePredictionTask::new(20, 7);
        for kind in SequenceType::ALL {
            let sequence = task.generate_sequence(kind);
            assert_eq!(sequence.len(), 20);
            assert!(sequence.iter().all(|v| (0.0..=1.0).contains(v)), "{:?}", kind);
        }
    }

    #[test]
    fn repeating_and_fibonacci_sequences() {
        let mut task = SequencePredictionTask::new(6, 0);
        assert_eq!(
            task.generate_sequence(SequenceType::RepeatingPattern),
            vec![0.1, 0.3, 0.7, 0.2, 0.1, 0.3]
        );
        let fib = task.generate_sequence(SequenceType::FibonacciLike);
        assert_eq!(fib[0], 0.1);
        assert_eq!(fib[1], 0.2);
        assert!((fib[2] - 0.3).abs() < 1e-12);
        assert!((fib[4] - 0.8).abs() < 1e-12);
        assert!((fib[5] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn short_sequences_fall_back_to_unit_error() {
        let mut task = SequencePredictionTask::new(1, 42);
        let mut network = NeuralNetwork::new(&SequencePredictionTask::reference_genome()).unwrap();
        let result = task.evaluate(&mut network, 3);
        assert_eq!(result.total_predictions, 0);
        assert_eq!(result.average_error, 1.0);
        assert_eq!(result.fitness, 0.5);
    }

    #[test]
    fn reference_network_scores_in_unit_interval() {
        let mut task = SequencePredictionTask::new(20, 42);
        let mut network = NeuralNetwork::new(&SequencePredictionTask::reference_genome()).unwrap();
        let result = task.evaluate(&mut network, 3);
        assert_eq!(result.trials.len(), 3);
        assert_eq!(result.total_predictions, 57);
        assert!(result.fitness > 0.0 && result.fitness <= 1.0);
        assert!((result.fitness - 1.0 / (1.0 + result.average_error)).abs() < 1e-12);
    }

    #[test]
    fn same_seed_gives_same_result() {
        let genome = SequencePredictionTask::reference_genome();
        let run = || {
            let mut task = SequencePredictionTask::new(20, 3);
            let mut network = NeuralNetwork::new(&genome).unwrap();
            task.evaluate(&mut network, 4)
        };
        assert_eq!(run(), run());
    }
}
