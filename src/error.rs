use thiserror::Error;

use crate::genome::NeuronId;

pub type EvoResult<T> = Result<T, EvoError>;

#[derive(Error, Debug)]
pub enum EvoError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("connection {from} -> {to} references missing neuron {missing}")]
    DanglingConnection {
        from: NeuronId,
        to: NeuronId,
        missing: NeuronId,
    },

    #[error("connection {from} -> {to} targets an input neuron")]
    InputTarget { from: NeuronId, to: NeuronId },

    #[error("neuron id {0} appears more than once")]
    DuplicateNeuron(NeuronId),

    #[error("connection {from} -> {to} appears more than once")]
    DuplicateConnection { from: NeuronId, to: NeuronId },

    #[error("cannot select from an empty population")]
    EmptyPopulation,

    #[error("tournament size must be at least 1")]
    EmptyTournament,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
