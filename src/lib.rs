//! Evolutionary search for small plastic neural networks.
//!
//! A [`genome::Genome`] lists neurons (each with its own evolvable
//! [`activation::Activation`] expression) and connections (optionally
//! Hebbian). [`network::NeuralNetwork`] turns a genome into a steppable
//! phenotype, a [`task::Task`] scores it, and [`population::Population`]
//! breeds the next generation.

pub mod activation;
pub mod error;
pub mod genome;
pub mod network;
pub mod params;
pub mod population;
pub mod task;

pub use error::{EvoError, EvoResult};
