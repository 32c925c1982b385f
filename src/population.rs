use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::Serialize;

use crate::activation::Activation;
use crate::error::{EvoError, EvoResult};
use crate::genome::*;
use crate::network::NeuralNetwork;
use crate::params::*;
use crate::task::{Task, TaskResult};

#[derive(Clone, Debug)]
pub struct EvaluatedGenome {
    pub genome: Genome,
    pub fitness: f64,
    pub task_result: TaskResult,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationStats {
    pub generation: u32,
    pub best_fitness: f64,
    pub average_fitness: f64,
    pub worst_fitness: f64,
    pub average_neurons: f64,
    pub average_connections: f64,
}

#[derive(Clone, Debug)]
pub struct EvolutionResult {
    pub new_population: Vec<Genome>,
    pub stats: GenerationStats,
    pub best_genome: Genome,
    /// Sorted by descending fitness.
    pub evaluated: Vec<EvaluatedGenome>,
}

/// Owns the seeded generator, the innovation counter and the current
/// members, and advances them one generation per [`Population::evolve`].
pub struct Population {
    next_innovation_id: u64,
    generation: u32,
    rng: StdRng,
    settings: Settings,
    pub members: Vec<Genome>,
    winner: Option<EvaluatedGenome>,
}

impl Population {
    pub fn new(settings: &Settings) -> EvoResult<Population> {
        settings.validate()?;

        let mut pop = Population {
            next_innovation_id: INNOVATION_COUNTER_START,
            generation: 0,
            rng: StdRng::seed_from_u64(settings.seed),
            settings: settings.clone(),
            members: Vec::new(),
            winner: None,
        };
        pop.members = pop.create_initial_population();
        Ok(pop)
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Best individual of the most recent evaluation.
    pub fn winner(&self) -> Option<&EvaluatedGenome> {
        self.winner.as_ref()
    }

    fn next_innovation_id(&mut self) -> u64 {
        let ret = self.next_innovation_id;
        self.next_innovation_id += 1;
        ret
    }

    fn gaussian(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    pub fn create_initial_population(&mut self) -> Vec<Genome> {
        (0..self.settings.population_size)
            .map(|_| self.create_random_genome())
            .collect()
    }

    /// Fresh genome: input neuron 1, output neuron 2, up to two hidden
    /// neurons, and a random set of unique connections into non-input
    /// neurons.
    pub fn create_random_genome(&mut self) -> Genome {
        let mut history = Vec::new();
        let mut neurons = Vec::new();

        let innovation_id = self.next_innovation_id();
        history.push(innovation_id);
        neurons.push(Neuron {
            id: INPUT_NEURON_ID,
            role: NeuronRole::Input,
            activation: Activation::Sigmoidal,
            initial_state: NeuronState::default(),
            bias: 0.0,
            threshold: 0.0,
            innovation_id,
        });

        let output = self.random_neuron(OUTPUT_NEURON_ID, NeuronRole::Output);
        history.push(output.innovation_id);
        neurons.push(output);

        let num_hidden = self.rng.gen_range(0..=INIT_MAX_HIDDEN);
        for i in 0..num_hidden {
            let id = OUTPUT_NEURON_ID + 1 + i as NeuronId;
            let hidden = self.random_neuron(id, NeuronRole::Hidden);
            history.push(hidden.innovation_id);
            neurons.push(hidden);
        }

        let n = neurons.len();
        let min_connections = if num_hidden > 0 { 1 } else { 0 };
        let max_possible = n * (n - 1) / 2 + n;
        let upper = (min_connections + 1).max((n * 2).min(max_possible + 1));
        let num_connections = self.rng.gen_range(min_connections..upper);

        let targets: Vec<NeuronId> = neurons
            .iter()
            .filter(|neuron| neuron.role != NeuronRole::Input)
            .map(|neuron| neuron.id)
            .collect();
        let mut existing = HashSet::new();
        let mut connections = Vec::new();

        for _ in 0..num_connections {
            let neuron_from = neurons[self.rng.gen_range(0..n)].id;
            let neuron_to = match targets.choose(&mut self.rng) {
                Some(id) => *id,
                None => continue,
            };

            if neuron_from == neuron_to && !self.rng.gen_bool(INIT_SELF_CONNECTION_CHANCE) {
                continue;
            }
            if existing.insert((neuron_from, neuron_to)) {
                let connection = self.random_connection(neuron_from, neuron_to);
                history.push(connection.innovation_id);
                connections.push(connection);
            }
        }

        let budgets = self.settings.parameters.budgets.clone();
        let mut genome = Genome::new(neurons, connections, budgets);
        genome.generation = self.generation;
        genome.innovation_history = history;
        genome
    }

    fn random_neuron(&mut self, id: NeuronId, role: NeuronRole) -> Neuron {
        let activation = self.random_activation();
        let bias = self.gaussian() * INIT_BIAS_SIGMA;
        let threshold = self.rng.gen_range(-1.0..1.0);
        Neuron {
            id,
            role,
            activation,
            initial_state: NeuronState::default(),
            bias,
            threshold,
            innovation_id: self.next_innovation_id(),
        }
    }

    fn random_connection(&mut self, neuron_from: NeuronId, neuron_to: NeuronId) -> Connection {
        let weight = self.gaussian() * INIT_WEIGHT_SIGMA;
        let learning_rate = self.rng.gen_range(INIT_LEARNING_RATE_MIN..INIT_LEARNING_RATE_MAX);
        let delay = self.rng.gen_range(0..=INIT_MAX_DELAY);
        let plasticity = self.random_plasticity();
        Connection {
            neuron_from,
            neuron_to,
            weight,
            learning_rate,
            delay,
            plasticity,
            innovation_id: self.next_innovation_id(),
        }
    }

    fn random_activation(&mut self) -> Activation {
        match self.rng.gen_range(0..6) {
            0 => Activation::sum(),
            1 => Activation::tanh(Activation::sum()),
            2 => Activation::relu(Activation::sum()),
            3 => {
                let noise = self.gaussian() * 0.1;
                Activation::add(Activation::sum(), Activation::Const(noise))
            }
            4 => {
                let scale = self.rng.gen_range(0.5..2.0);
                Activation::mul(Activation::sum(), Activation::Const(scale))
            }
            _ => Activation::sin(Activation::sum()),
        }
    }

    fn random_plasticity(&mut self) -> PlasticityType {
        if self.rng.gen::<bool>() {
            PlasticityType::Hebbian
        } else {
            PlasticityType::None
        }
    }

    /// Draws `tournament_size` individuals with replacement and returns the
    /// fittest. Ties go to the earliest draw.
    pub fn tournament_selection<'a>(
        &mut self,
        evaluated: &'a [EvaluatedGenome],
        tournament_size: usize,
    ) -> EvoResult<&'a EvaluatedGenome> {
        if evaluated.is_empty() {
            return Err(EvoError::EmptyPopulation);
        }
        if tournament_size == 0 {
            return Err(EvoError::EmptyTournament);
        }

        let mut best = &evaluated[self.rng.gen_range(0..evaluated.len())];
        for _ in 1..tournament_size {
            let candidate = &evaluated[self.rng.gen_range(0..evaluated.len())];
            if candidate.fitness > best.fitness {
                best = candidate;
            }
        }
        Ok(best)
    }

    /// Splits the union of both parents' neurons into two overlapping
    /// slices (the first 70%, and everything from the 30% mark on). Each
    /// child keeps only the connections whose endpoints it owns.
    pub fn crossover(&self, lhs: &Genome, rhs: &Genome) -> [Genome; 2] {
        let mut seen_ids = HashSet::new();
        let all_neurons: Vec<&Neuron> = lhs
            .neurons
            .iter()
            .chain(rhs.neurons.iter())
            .filter(|neuron| seen_ids.insert(neuron.id))
            .collect();

        let mut seen_pairs = HashSet::new();
        let all_connections: Vec<&Connection> = lhs
            .connections
            .iter()
            .chain(rhs.connections.iter())
            .filter(|c| seen_pairs.insert((c.neuron_from, c.neuron_to)))
            .collect();

        let mut history: Vec<u64> = lhs
            .innovation_history
            .iter()
            .chain(rhs.innovation_history.iter())
            .copied()
            .collect();
        history.sort_unstable();
        history.dedup();

        let n = all_neurons.len();
        let first_end = (n as f64 * CROSSOVER_FIRST_SHARE) as usize;
        let second_start = (n as f64 * CROSSOVER_SECOND_START) as usize;

        let build = |parent: &Genome, neurons: &[&Neuron]| {
            let ids: HashSet<NeuronId> = neurons.iter().map(|neuron| neuron.id).collect();
            let connections = all_connections
                .iter()
                .filter(|c| ids.contains(&c.neuron_from) && ids.contains(&c.neuron_to))
                .map(|c| (*c).clone())
                .collect();
            Genome {
                neurons: neurons.iter().map(|neuron| (*neuron).clone()).collect(),
                connections,
                budgets: parent.budgets.clone(),
                generation: self.generation,
                innovation_history: history.clone(),
            }
        };

        [
            build(lhs, &all_neurons[..first_end]),
            build(rhs, &all_neurons[second_start..]),
        ]
    }

    pub fn mutate(&mut self, genome: &Genome) -> Genome {
        let rate = self.settings.parameters.mutation_rate;
        let mut child = genome.clone();
        child.generation = self.generation;

        for neuron in child.neurons.iter_mut() {
            if self.rng.gen::<f64>() < rate {
                neuron.bias += self.gaussian() * MUTATE_NEURON_NUDGE_SIGMA;
                neuron.threshold += self.gaussian() * MUTATE_NEURON_NUDGE_SIGMA;
            }
        }

        let max_delay = child.budgets.max_delay;
        for connection in child.connections.iter_mut() {
            if self.rng.gen::<f64>() < rate {
                connection.weight += self.gaussian() * MUTATE_WEIGHT_NUDGE_SIGMA;
            }
            if self.rng.gen::<f64>() < rate {
                let nudge = self.gaussian() * MUTATE_LEARNING_RATE_SIGMA;
                connection.learning_rate =
                    (connection.learning_rate + nudge).clamp(LEARNING_RATE_MIN, LEARNING_RATE_MAX);
            }
            if self.rng.gen::<f64>() < rate {
                let delay = connection.delay as i64 + self.rng.gen_range(-1..=1);
                connection.delay = delay.clamp(0, max_delay as i64) as u32;
            }
            if self.rng.gen::<f64>() < rate {
                connection.plasticity = connection.plasticity.toggled();
            }
        }

        if self.rng.gen::<f64>() < rate * STRUCTURAL_MUTATION_FACTOR
            && child.neurons.len() < child.budgets.max_neurons
        {
            let id = child.max_neuron_id().map_or(EMPTY_GENOME_NEURON_ID, |id| id + 1);
            let neuron = self.random_neuron(id, NeuronRole::Hidden);
            tracing::debug!(neuron = id, "mutation added hidden neuron");
            child.innovation_history.push(neuron.innovation_id);
            child.neurons.push(neuron);
        }

        if self.rng.gen::<f64>() < rate * STRUCTURAL_MUTATION_FACTOR
            && child.connections.len() < child.budgets.max_connections
        {
            self.add_random_connection(&mut child);
        }

        child
    }

    fn add_random_connection(&mut self, genome: &mut Genome) {
        let neuron_from = match genome.neurons.choose(&mut self.rng) {
            Some(neuron) => neuron.id,
            None => return,
        };
        let targets: Vec<NeuronId> = genome
            .neurons
            .iter()
            .filter(|neuron| neuron.role != NeuronRole::Input)
            .map(|neuron| neuron.id)
            .collect();
        let neuron_to = match targets.choose(&mut self.rng) {
            Some(id) => *id,
            None => return,
        };

        let connection = self.random_connection(neuron_from, neuron_to);
        if genome.has_connection(neuron_from, neuron_to) {
            return;
        }
        tracing::debug!(neuron_from, neuron_to, "mutation added connection");
        genome.innovation_history.push(connection.innovation_id);
        genome.connections.push(connection);
    }

    /// Evaluates `population` in order, ranks it, and breeds the next
    /// generation: elites first, then crossover pairs or mutated clones of
    /// tournament winners until `population_size` is reached.
    pub fn evolve_generation<T: Task>(
        &mut self,
        population: &[Genome],
        task: &mut T,
    ) -> EvoResult<EvolutionResult> {
        if population.is_empty() {
            return Err(EvoError::EmptyPopulation);
        }
        self.generation += 1;

        let mut evaluated = Vec::with_capacity(population.len());
        for genome in population {
            let mut network = NeuralNetwork::new(genome)?;
            let task_result = task.evaluate(&mut network, self.settings.trials_per_evaluation);
            evaluated.push(EvaluatedGenome {
                genome: genome.clone(),
                fitness: task_result.fitness,
                task_result,
            });
        }
        evaluated.sort_by(|lhs, rhs| rhs.fitness.total_cmp(&lhs.fitness));

        let population_size = self.settings.population_size;
        let tournament_size = self.settings.parameters.tournament_size;
        let crossover_rate = self.settings.parameters.crossover_rate;

        let mut new_population: Vec<Genome> = evaluated
            .iter()
            .take(self.settings.elite_size)
            .map(|e| e.genome.clone())
            .collect();

        while new_population.len() < population_size {
            let room_for_pair = new_population.len() + 1 < population_size;
            if self.rng.gen::<f64>() < crossover_rate && room_for_pair {
                let parent1 = self.tournament_selection(&evaluated, tournament_size)?;
                let parent2 = self.tournament_selection(&evaluated, tournament_size)?;
                let offspring = self.crossover(&parent1.genome, &parent2.genome);
                for child in &offspring {
                    let mutated = self.mutate(child);
                    new_population.push(mutated);
                }
            } else {
                let parent = self.tournament_selection(&evaluated, tournament_size)?;
                let mutated = self.mutate(&parent.genome);
                new_population.push(mutated);
            }
        }
        new_population.truncate(population_size);

        let stats = generation_stats(self.generation, &evaluated);
        let best_genome = evaluated[0].genome.clone();

        Ok(EvolutionResult {
            new_population,
            stats,
            best_genome,
            evaluated,
        })
    }

    /// Runs one generation over `members` and replaces them with the
    /// offspring.
    pub fn evolve<T: Task>(&mut self, task: &mut T) -> EvoResult<GenerationStats> {
        let members = std::mem::take(&mut self.members);
        let result = match self.evolve_generation(&members, task) {
            Ok(result) => result,
            Err(err) => {
                self.members = members;
                return Err(err);
            }
        };

        let stats = result.stats.clone();
        tracing::info!(
            generation = stats.generation,
            best = stats.best_fitness,
            average = stats.average_fitness,
            worst = stats.worst_fitness,
            neurons = stats.average_neurons,
            connections = stats.average_connections,
            "evolved generation"
        );

        self.members = result.new_population;
        self.winner = result.evaluated.into_iter().next();
        Ok(stats)
    }
}

fn generation_stats(generation: u32, evaluated: &[EvaluatedGenome]) -> GenerationStats {
    let mean = |values: Vec<f64>| values.iter().sum::<f64>() / values.len().max(1) as f64;
    GenerationStats {
        generation,
        best_fitness: evaluated.first().map_or(0.0, |e| e.fitness),
        average_fitness: mean(evaluated.iter().map(|e| e.fitness).collect()),
        worst_fitness: evaluated.last().map_or(0.0, |e| e.fitness),
        average_neurons: mean(evaluated.iter().map(|e| e.genome.neurons.len() as f64).collect()),
        average_connections: mean(
            evaluated
                .iter()
                .map(|e| e.genome.connections.len() as f64)
                .collect(),
        ),
    }
}
