use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::EvoResult;
use crate::genome::{Genome, NeuronId, NeuronRole, NeuronState, PlasticityType};
use crate::params::WEIGHT_CLAMP;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetworkStats {
    pub total_neurons: usize,
    pub total_connections: usize,
    pub average_activity: f64,
}

/// Phenotype built from a [`Genome`]. Runtime weights start at the genome's
/// values and drift under plasticity; the genome copy is never modified.
pub struct NeuralNetwork {
    genome: Genome,
    roles: HashMap<NeuronId, NeuronRole>,
    // target neuron id -> indices into genome.connections
    incoming: HashMap<NeuronId, Vec<usize>>,
    neuron_states: BTreeMap<NeuronId, NeuronState>,
    neuron_outputs: BTreeMap<NeuronId, f64>,
    connection_weights: BTreeMap<(NeuronId, NeuronId), f64>,
}

impl NeuralNetwork {
    pub fn new(genome: &Genome) -> EvoResult<NeuralNetwork> {
        genome.validate()?;

        let roles = genome.neurons.iter().map(|n| (n.id, n.role)).collect();
        let mut incoming: HashMap<NeuronId, Vec<usize>> = HashMap::new();
        for (idx, connection) in genome.connections.iter().enumerate() {
            incoming.entry(connection.neuron_to).or_default().push(idx);
        }

        for neuron in &genome.neurons {
            let unknown = neuron.activation.unknown_variables();
            if !unknown.is_empty() {
                tracing::warn!(
                    neuron = neuron.id,
                    "activation refers to unknown variables {:?}, they evaluate to 0.0",
                    unknown
                );
            }
        }

        let mut network = NeuralNetwork {
            genome: genome.clone(),
            roles,
            incoming,
            neuron_states: BTreeMap::new(),
            neuron_outputs: BTreeMap::new(),
            connection_weights: BTreeMap::new(),
        };
        network.reset();

        tracing::debug!(
            neurons = genome.neurons.len(),
            connections = genome.connections.len(),
            "built network"
        );
        Ok(network)
    }

    /// Restores a fresh phenotype: initial states, zero outputs, genome weights.
    pub fn reset(&mut self) {
        self.neuron_states.clear();
        self.neuron_outputs.clear();
        self.connection_weights.clear();

        for neuron in &self.genome.neurons {
            self.neuron_states.insert(neuron.id, neuron.initial_state);
            self.neuron_outputs.insert(neuron.id, 0.0);
        }
        for connection in &self.genome.connections {
            self.connection_weights
                .insert((connection.neuron_from, connection.neuron_to), connection.weight);
        }
    }

    /// Advances the network by one synchronous sweep and returns the outputs
    /// of the output neurons.
    ///
    /// Input neurons take the supplied value directly. Every other neuron
    /// reads non-input sources from the previous step, so a cycle never
    /// depends on a value computed in the same sweep.
    pub fn step(&mut self, inputs: &BTreeMap<NeuronId, f64>) -> BTreeMap<NeuronId, f64> {
        let previous_outputs = self.neuron_outputs.clone();

        for (id, value) in inputs {
            if self.is_input(*id) {
                self.neuron_outputs.insert(*id, *value);
            }
        }

        for neuron in &self.genome.neurons {
            if neuron.role == NeuronRole::Input {
                continue;
            }
            let incoming = self.incoming.get(&neuron.id).map(Vec::as_slice).unwrap_or(&[]);

            let mut input_sum = 0.0;
            for &idx in incoming {
                let connection = &self.genome.connections[idx];
                let source_output = self.source_output(connection.neuron_from, &previous_outputs);
                let key = (connection.neuron_from, connection.neuron_to);
                let weight = self.connection_weights[&key];
                input_sum += source_output * weight;
            }

            let biased_input = input_sum + neuron.bias;
            let state = self.neuron_states[&neuron.id];
            let activation = if biased_input > neuron.threshold {
                neuron.activation.evaluate(biased_input, &state)
            } else {
                0.0
            };

            self.neuron_states.insert(
                neuron.id,
                NeuronState {
                    previous_output: activation,
                },
            );
            self.neuron_outputs.insert(neuron.id, activation);

            for &idx in incoming {
                let connection = &self.genome.connections[idx];
                if connection.plasticity != PlasticityType::Hebbian {
                    continue;
                }
                let presynaptic = self.source_output(connection.neuron_from, &previous_outputs);
                let key = (connection.neuron_from, connection.neuron_to);
                let current = self.connection_weights[&key];
                let delta = connection.learning_rate * presynaptic * activation;
                self.connection_weights
                    .insert(key, (current + delta).clamp(-WEIGHT_CLAMP, WEIGHT_CLAMP));
            }
        }

        self.genome
            .neurons
            .iter()
            .filter(|neuron| neuron.role == NeuronRole::Output)
            .map(|neuron| (neuron.id, self.neuron_outputs[&neuron.id]))
            .collect()
    }

    fn is_input(&self, id: NeuronId) -> bool {
        self.roles.get(&id) == Some(&NeuronRole::Input)
    }

    fn source_output(&self, source: NeuronId, previous_outputs: &BTreeMap<NeuronId, f64>) -> f64 {
        let outputs = if self.is_input(source) {
            &self.neuron_outputs
        } else {
            previous_outputs
        };
        outputs.get(&source).copied().unwrap_or(0.0)
    }

    pub fn stats(&self) -> NetworkStats {
        let average_activity = if self.neuron_outputs.is_empty() {
            0.0
        } else {
            self.neuron_outputs.values().map(|v| v.abs()).sum::<f64>()
                / self.neuron_outputs.len() as f64
        };
        NetworkStats {
            total_neurons: self.genome.neurons.len(),
            total_connections: self.genome.connections.len(),
            average_activity,
        }
    }

    /// Current runtime weight of the connection `neuron_from -> neuron_to`.
    pub fn weight(&self, neuron_from: NeuronId, neuron_to: NeuronId) -> Option<f64> {
        self.connection_weights.get(&(neuron_from, neuron_to)).copied()
    }

    pub fn output(&self, id: NeuronId) -> Option<f64> {
        self.neuron_outputs.get(&id).copied()
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }
}
