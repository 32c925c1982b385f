use serde::{Deserialize, Serialize};

use crate::error::{EvoError, EvoResult};
use crate::genome::ResourceBudgets;

pub const INNOVATION_COUNTER_START: u64 = 1000;
// id given to a neuron added to a genome that has none
pub const EMPTY_GENOME_NEURON_ID: u64 = 1000;

pub const MUTATE_NEURON_NUDGE_SIGMA: f64 = 0.1;
pub const MUTATE_WEIGHT_NUDGE_SIGMA: f64 = 0.1;
pub const MUTATE_LEARNING_RATE_SIGMA: f64 = 0.005;
pub const LEARNING_RATE_MIN: f64 = 0.0001;
pub const LEARNING_RATE_MAX: f64 = 0.1;
// structural mutations fire at this fraction of the mutation rate
pub const STRUCTURAL_MUTATION_FACTOR: f64 = 0.5;

pub const INIT_BIAS_SIGMA: f64 = 0.5;
pub const INIT_WEIGHT_SIGMA: f64 = 0.5;
pub const INIT_MAX_HIDDEN: usize = 2;
pub const INIT_MAX_DELAY: u32 = 2;
pub const INIT_SELF_CONNECTION_CHANCE: f64 = 0.2;
pub const INIT_LEARNING_RATE_MIN: f64 = 0.001;
pub const INIT_LEARNING_RATE_MAX: f64 = 0.1;

pub const WEIGHT_CLAMP: f64 = 5.0;

pub const CROSSOVER_FIRST_SHARE: f64 = 0.7;
pub const CROSSOVER_SECOND_START: f64 = 0.3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub tournament_size: usize,
    pub budgets: ResourceBudgets,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            mutation_rate: 0.1,
            crossover_rate: 0.7,
            tournament_size: 3,
            budgets: ResourceBudgets::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub population_size: usize,
    pub elite_size: usize,
    pub seed: u64,
    pub generation_count: usize,
    pub trials_per_evaluation: usize,
    pub sequence_length: usize,
    /// Stop a run early once the best fitness exceeds this value.
    pub target_fitness: Option<f64>,
    pub parameters: Parameters,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            population_size: 30,
            elite_size: 5,
            seed: 42,
            generation_count: 20,
            trials_per_evaluation: 3,
            sequence_length: 20,
            target_fitness: Some(0.95),
            parameters: Parameters::default(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> EvoResult<Settings> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> EvoResult<()> {
        if self.population_size == 0 {
            return Err(EvoError::InvalidConfig(
                "population_size must be greater than zero".to_string(),
            ));
        }
        if self.elite_size > self.population_size {
            return Err(EvoError::InvalidConfig(format!(
                "elite_size ({}) exceeds population_size ({})",
                self.elite_size, self.population_size
            )));
        }
        if self.trials_per_evaluation == 0 {
            return Err(EvoError::InvalidConfig(
                "trials_per_evaluation must be greater than zero".to_string(),
            ));
        }
        if self.parameters.tournament_size == 0 {
            return Err(EvoError::InvalidConfig(
                "tournament_size must be greater than zero".to_string(),
            ));
        }
        check_rate("mutation_rate", self.parameters.mutation_rate)?;
        check_rate("crossover_rate", self.parameters.crossover_rate)?;
        Ok(())
    }
}

fn check_rate(name: &str, rate: f64) -> EvoResult<()> {
    // NaN fails the range check too
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(EvoError::InvalidConfig(format!(
            "{} must lie in [0, 1], got {}",
            name, rate
        )))
    }
}
