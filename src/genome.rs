use std::collections::HashSet;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::error::{EvoError, EvoResult};

pub type NeuronId = u64;

/// Every genome is seeded with this input neuron; the task feeds it.
pub const INPUT_NEURON_ID: NeuronId = 1;
/// Every genome is seeded with this output neuron; the task reads it.
pub const OUTPUT_NEURON_ID: NeuronId = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronRole {
    Input,
    Output,
    Hidden,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlasticityType {
    None,
    Hebbian,
}

impl PlasticityType {
    pub fn toggled(self) -> PlasticityType {
        match self {
            PlasticityType::None => PlasticityType::Hebbian,
            PlasticityType::Hebbian => PlasticityType::None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NeuronState {
    pub previous_output: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Neuron {
    pub id: NeuronId,
    pub role: NeuronRole,
    pub activation: Activation,
    #[serde(default)]
    pub initial_state: NeuronState,
    #[serde(default)]
    pub bias: f64,
    #[serde(default)]
    pub threshold: f64,
    pub innovation_id: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub neuron_from: NeuronId,
    pub neuron_to: NeuronId,
    pub weight: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    // evolvable, but not consulted when the network steps
    #[serde(default)]
    pub delay: u32,
    #[serde(default = "default_plasticity")]
    pub plasticity: PlasticityType,
    pub innovation_id: u64,
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_plasticity() -> PlasticityType {
    PlasticityType::None
}

/// Caps consulted by the genetic operators. Nothing here is enforced by
/// [`Genome`] itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceBudgets {
    pub max_neurons: usize,
    pub max_connections: usize,
    pub max_delay: u32,
    pub max_activation_depth: usize,
}

impl Default for ResourceBudgets {
    fn default() -> Self {
        ResourceBudgets {
            max_neurons: 20,
            max_connections: 50,
            max_delay: 5,
            max_activation_depth: 7,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub neurons: Vec<Neuron>,
    pub connections: Vec<Connection>,
    pub budgets: ResourceBudgets,
    #[serde(default)]
    pub generation: u32,
    // audit trail only, never used for alignment
    #[serde(default)]
    pub innovation_history: Vec<u64>,
}

impl Genome {
    pub fn new(
        neurons: Vec<Neuron>,
        connections: Vec<Connection>,
        budgets: ResourceBudgets,
    ) -> Genome {
        Genome {
            neurons,
            connections,
            budgets,
            generation: 0,
            innovation_history: Vec::new(),
        }
    }

    pub fn neuron(&self, id: NeuronId) -> Option<&Neuron> {
        self.neurons.iter().find(|neuron| neuron.id == id)
    }

    pub fn role_of(&self, id: NeuronId) -> Option<NeuronRole> {
        self.neuron(id).map(|neuron| neuron.role)
    }

    pub fn has_connection(&self, neuron_from: NeuronId, neuron_to: NeuronId) -> bool {
        self.connections
            .iter()
            .any(|c| c.neuron_from == neuron_from && c.neuron_to == neuron_to)
    }

    pub fn max_neuron_id(&self) -> Option<NeuronId> {
        self.neurons.iter().map(|neuron| neuron.id).max()
    }

    pub fn num_hidden(&self) -> usize {
        self.neurons
            .iter()
            .filter(|neuron| neuron.role == NeuronRole::Hidden)
            .count()
    }

    pub fn num_plastic_connections(&self) -> usize {
        self.connections
            .iter()
            .filter(|c| c.plasticity == PlasticityType::Hebbian)
            .count()
    }

    pub fn max_activation_depth(&self) -> usize {
        self.neurons
            .iter()
            .map(|neuron| neuron.activation.depth())
            .max()
            .unwrap_or(0)
    }

    pub fn within_budgets(&self) -> bool {
        self.neurons.len() <= self.budgets.max_neurons
            && self.connections.len() <= self.budgets.max_connections
            && self
                .connections
                .iter()
                .all(|c| c.delay <= self.budgets.max_delay)
            && self.max_activation_depth() <= self.budgets.max_activation_depth
    }

    /// Checks the structural invariants every executable genome must hold:
    /// unique neuron ids, resolvable connection endpoints, no connection into
    /// an input neuron, and at most one connection per ordered pair.
    pub fn validate(&self) -> EvoResult<()> {
        let mut ids = HashSet::new();
        for neuron in &self.neurons {
            if !ids.insert(neuron.id) {
                return Err(EvoError::DuplicateNeuron(neuron.id));
            }
        }

        let mut pairs = HashSet::new();
        for c in &self.connections {
            for endpoint in [c.neuron_from, c.neuron_to] {
                if !ids.contains(&endpoint) {
                    return Err(EvoError::DanglingConnection {
                        from: c.neuron_from,
                        to: c.neuron_to,
                        missing: endpoint,
                    });
                }
            }
            if self.role_of(c.neuron_to) == Some(NeuronRole::Input) {
                return Err(EvoError::InputTarget {
                    from: c.neuron_from,
                    to: c.neuron_to,
                });
            }
            if !pairs.insert((c.neuron_from, c.neuron_to)) {
                return Err(EvoError::DuplicateConnection {
                    from: c.neuron_from,
                    to: c.neuron_to,
                });
            }
        }

        Ok(())
    }

    pub fn to_json(&self) -> EvoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> EvoResult<Genome> {
        let genome: Genome = serde_json::from_str(json)?;
        genome.validate()?;
        Ok(genome)
    }

    /// Graphviz body listing the neurons and connections.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph genome {\n");
        for neuron in &self.neurons {
            let shape = match neuron.role {
                NeuronRole::Input => "box",
                NeuronRole::Output => "doublecircle",
                NeuronRole::Hidden => "circle",
            };
            let _ = writeln!(dot, "  n{} [shape={}]", neuron.id, shape);
        }
        for c in &self.connections {
            let style = match c.plasticity {
                PlasticityType::None => "solid",
                PlasticityType::Hebbian => "dashed",
            };
            let _ = writeln!(
                dot,
                "  n{} -> n{} [label=\"{:.2}\", style={}]",
                c.neuron_from, c.neuron_to, c.weight, style
            );
        }
        dot.push('}');
        dot
    }
}
