use std::collections::BTreeMap;

use evobrain::activation::{sigmoid, Activation};
use evobrain::genome::{
    Connection, Genome, Neuron, NeuronId, NeuronRole, NeuronState, PlasticityType, ResourceBudgets,
};
use evobrain::network::NeuralNetwork;
use evobrain::EvoError;

fn neuron(id: NeuronId, role: NeuronRole) -> Neuron {
    Neuron {
        id,
        role,
        activation: Activation::Sigmoidal,
        initial_state: NeuronState::default(),
        bias: 0.0,
        threshold: 0.0,
        innovation_id: id,
    }
}

fn connection(
    neuron_from: NeuronId,
    neuron_to: NeuronId,
    weight: f64,
    plasticity: PlasticityType,
    learning_rate: f64,
) -> Connection {
    Connection {
        neuron_from,
        neuron_to,
        weight,
        learning_rate,
        delay: 0,
        plasticity,
        innovation_id: 100 + neuron_from * 10 + neuron_to,
    }
}

fn input(value: f64) -> BTreeMap<NeuronId, f64> {
    BTreeMap::from([(1, value)])
}

#[test]
fn feed_forward_chain_takes_two_steps_to_reach_output() {
    let genome = Genome::new(
        vec![
            neuron(1, NeuronRole::Input),
            neuron(2, NeuronRole::Hidden),
            neuron(3, NeuronRole::Output),
        ],
        vec![
            connection(1, 2, 1.0, PlasticityType::None, 0.0),
            connection(2, 3, 1.0, PlasticityType::None, 0.0),
        ],
        ResourceBudgets::default(),
    );
    let mut network = NeuralNetwork::new(&genome).unwrap();

    let first = network.step(&input(1.0));
    assert_eq!(first[&3], 0.0);

    let second = network.step(&input(1.0));
    assert_eq!(second[&3], sigmoid(sigmoid(1.0)));
}

#[test]
fn self_loop_only_matters_from_the_second_step() {
    let build = |with_loop: bool| {
        let mut connections = vec![connection(1, 2, 1.0, PlasticityType::None, 0.0)];
        if with_loop {
            connections.push(connection(2, 2, 0.5, PlasticityType::None, 0.0));
        }
        let genome = Genome::new(
            vec![neuron(1, NeuronRole::Input), neuron(2, NeuronRole::Output)],
            connections,
            ResourceBudgets::default(),
        );
        NeuralNetwork::new(&genome).unwrap()
    };

    let mut looped = build(true);
    let mut plain = build(false);

    let looped_first = looped.step(&input(1.0))[&2];
    let plain_first = plain.step(&input(1.0))[&2];
    assert_eq!(looped_first, plain_first);

    let looped_second = looped.step(&input(1.0))[&2];
    let plain_second = plain.step(&input(1.0))[&2];
    assert_eq!(looped_second, sigmoid(1.0 + 0.5 * looped_first));
    assert!(looped_second > plain_second);
    assert!(looped_second > looped_first);
}

#[test]
fn hebbian_update_matches_rule_exactly() {
    let (w, eta, p) = (0.4, 0.05, 0.8);
    let genome = Genome::new(
        vec![neuron(1, NeuronRole::Input), neuron(2, NeuronRole::Output)],
        vec![connection(1, 2, w, PlasticityType::Hebbian, eta)],
        ResourceBudgets::default(),
    );
    let mut network = NeuralNetwork::new(&genome).unwrap();

    let a = network.step(&input(p))[&2];
    assert_eq!(a, sigmoid(p * w));
    assert_eq!(network.weight(1, 2), Some((w + eta * p * a).clamp(-5.0, 5.0)));
    assert_eq!(genome.connections[0].weight, w);
}

#[test]
fn hebbian_weight_is_clamped() {
    let genome = Genome::new(
        vec![neuron(1, NeuronRole::Input), neuron(2, NeuronRole::Output)],
        vec![connection(1, 2, 4.99, PlasticityType::Hebbian, 0.1)],
        ResourceBudgets::default(),
    );
    let mut network = NeuralNetwork::new(&genome).unwrap();
    for _ in 0..50 {
        network.step(&input(10.0));
        let weight = network.weight(1, 2).unwrap();
        assert!(weight <= 5.0);
    }
    assert_eq!(network.weight(1, 2), Some(5.0));
}

#[test]
fn recurrent_hebbian_uses_previous_step_presynaptic_output() {
    let mut hidden = neuron(3, NeuronRole::Hidden);
    hidden.activation = Activation::sum();
    let genome = Genome::new(
        vec![neuron(1, NeuronRole::Input), neuron(2, NeuronRole::Output), hidden],
        vec![
            connection(1, 3, 1.0, PlasticityType::None, 0.0),
            connection(3, 2, 1.0, PlasticityType::Hebbian, 0.1),
        ],
        ResourceBudgets::default(),
    );
    let mut network = NeuralNetwork::new(&genome).unwrap();

    // hidden produced nothing before the first step, so the weight stays put
    network.step(&input(0.5));
    assert_eq!(network.weight(3, 2), Some(1.0));

    let post = network.step(&input(0.5))[&2];
    assert_eq!(post, sigmoid(0.5));
    assert_eq!(network.weight(3, 2), Some(1.0 + 0.1 * 0.5 * post));
}

#[test]
fn non_plastic_weights_never_change() {
    let genome = Genome::new(
        vec![
            neuron(1, NeuronRole::Input),
            neuron(2, NeuronRole::Output),
            neuron(3, NeuronRole::Hidden),
        ],
        vec![
            connection(1, 3, 0.3, PlasticityType::None, 0.09),
            connection(3, 2, 1.7, PlasticityType::None, 0.09),
            connection(3, 3, 0.1, PlasticityType::None, 0.09),
            connection(1, 2, 0.7, PlasticityType::Hebbian, 0.09),
        ],
        ResourceBudgets::default(),
    );
    let mut network = NeuralNetwork::new(&genome).unwrap();
    for t in 0..100 {
        network.step(&input((t as f64 * 0.37).sin()));
    }
    assert_eq!(network.weight(1, 3).map(f64::to_bits), Some(0.3f64.to_bits()));
    assert_eq!(network.weight(3, 2).map(f64::to_bits), Some(1.7f64.to_bits()));
    assert_eq!(network.weight(3, 3).map(f64::to_bits), Some(0.1f64.to_bits()));
    assert_ne!(network.weight(1, 2), Some(0.7));
}

#[test]
fn malformed_genomes_are_rejected() {
    let dangling = Genome::new(
        vec![neuron(1, NeuronRole::Input), neuron(2, NeuronRole::Output)],
        vec![connection(1, 5, 1.0, PlasticityType::None, 0.0)],
        ResourceBudgets::default(),
    );
    assert!(matches!(
        NeuralNetwork::new(&dangling),
        Err(EvoError::DanglingConnection { missing: 5, .. })
    ));

    let into_input = Genome::new(
        vec![neuron(1, NeuronRole::Input), neuron(2, NeuronRole::Output)],
        vec![connection(2, 1, 1.0, PlasticityType::None, 0.0)],
        ResourceBudgets::default(),
    );
    assert!(matches!(
        NeuralNetwork::new(&into_input),
        Err(EvoError::InputTarget { from: 2, to: 1 })
    ));
}

#[test]
fn unknown_variables_evaluate_to_zero_inside_a_network() {
    let mut output = neuron(2, NeuronRole::Output);
    output.activation = Activation::add(Activation::sum(), Activation::var("dopamine"));
    let genome = Genome::new(
        vec![neuron(1, NeuronRole::Input), output],
        vec![connection(1, 2, 1.0, PlasticityType::None, 0.0)],
        ResourceBudgets::default(),
    );
    let mut network = NeuralNetwork::new(&genome).unwrap();
    assert_eq!(network.step(&input(0.75))[&2], 0.75);
}
