use std::collections::BTreeMap;

use evobrain::genome::{INPUT_NEURON_ID, OUTPUT_NEURON_ID};
use evobrain::network::NeuralNetwork;
use evobrain::params::Settings;
use evobrain::population::Population;
use evobrain::task::{SequencePredictionTask, SequenceType};
use evobrain::EvoResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    if let Err(err) = run() {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

fn run() -> EvoResult<()> {
    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::from_json(&std::fs::read_to_string(path)?)?,
        None => Settings::default(),
    };
    tracing::info!(?settings, "starting run");

    let mut population = Population::new(&settings)?;
    let mut task = SequencePredictionTask::new(settings.sequence_length, settings.seed);

    for _ in 0..settings.generation_count {
        let stats = population.evolve(&mut task)?;
        if let Some(target) = settings.target_fitness {
            if stats.best_fitness > target {
                tracing::info!(
                    generation = stats.generation,
                    "target fitness reached, stopping early"
                );
                break;
            }
        }
    }

    let winner = match population.winner() {
        Some(winner) => winner.genome.clone(),
        None => return Ok(()),
    };
    tracing::info!(
        neurons = winner.neurons.len(),
        connections = winner.connections.len(),
        plastic = winner.num_plastic_connections(),
        "best genome"
    );

    let mut network = NeuralNetwork::new(&winner)?;
    let sequence = task.generate_sequence(SequenceType::SineWave);
    for window in sequence.windows(2).take(5) {
        let outputs = network.step(&BTreeMap::from([(INPUT_NEURON_ID, window[0])]));
        let prediction = outputs.get(&OUTPUT_NEURON_ID).copied().unwrap_or(0.0);
        println!("{:.3} -> {:.3} ({:.3})", window[0], prediction, window[1]);
    }
    tracing::info!(stats = ?network.stats(), "network activity");

    println!("{}", winner.to_json()?);
    println!("{}", winner.to_dot());
    Ok(())
}
