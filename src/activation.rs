use serde::{Deserialize, Serialize};

use crate::genome::NeuronState;

/// Names a neuron activation can refer to. Anything else evaluates to 0.0.
pub const KNOWN_VARIABLES: [&str; 3] = ["input", "sum", "prev_output"];

const DIV_EPSILON: f64 = 1e-9;

/// Per-neuron nonlinearity, evolved as an expression tree.
///
/// `Sigmoidal` is the zero-argument logistic applied straight to the
/// neuron's biased input, while `Sigmoid` applies the same curve to an
/// arbitrary sub-expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    Const(f64),
    Variable(String),
    Add(Box<Activation>, Box<Activation>),
    Sub(Box<Activation>, Box<Activation>),
    Mul(Box<Activation>, Box<Activation>),
    Div(Box<Activation>, Box<Activation>),
    Exp(Box<Activation>),
    Sin(Box<Activation>),
    Tanh(Box<Activation>),
    Sigmoid(Box<Activation>),
    Relu(Box<Activation>),
    Sigmoidal,
    Max(Box<Activation>, Box<Activation>),
    If(Box<Activation>, Box<Activation>, Box<Activation>),
}

impl Activation {
    pub fn var(name: &str) -> Activation {
        Activation::Variable(name.to_string())
    }

    pub fn sum() -> Activation {
        Activation::var("sum")
    }

    pub fn add(lhs: Activation, rhs: Activation) -> Activation {
        Activation::Add(Box::new(lhs), Box::new(rhs))
    }

    pub fn sub(lhs: Activation, rhs: Activation) -> Activation {
        Activation::Sub(Box::new(lhs), Box::new(rhs))
    }

    pub fn mul(lhs: Activation, rhs: Activation) -> Activation {
        Activation::Mul(Box::new(lhs), Box::new(rhs))
    }

    pub fn div(lhs: Activation, rhs: Activation) -> Activation {
        Activation::Div(Box::new(lhs), Box::new(rhs))
    }

    pub fn max(lhs: Activation, rhs: Activation) -> Activation {
        Activation::Max(Box::new(lhs), Box::new(rhs))
    }

    pub fn exp(arg: Activation) -> Activation {
        Activation::Exp(Box::new(arg))
    }

    pub fn sin(arg: Activation) -> Activation {
        Activation::Sin(Box::new(arg))
    }

    pub fn tanh(arg: Activation) -> Activation {
        Activation::Tanh(Box::new(arg))
    }

    pub fn sigmoid(arg: Activation) -> Activation {
        Activation::Sigmoid(Box::new(arg))
    }

    pub fn relu(arg: Activation) -> Activation {
        Activation::Relu(Box::new(arg))
    }

    pub fn if_else(condition: Activation, if_true: Activation, if_false: Activation) -> Activation {
        Activation::If(Box::new(condition), Box::new(if_true), Box::new(if_false))
    }

    /// Maximum nesting depth; leaves count as 1.
    pub fn depth(&self) -> usize {
        match self {
            Activation::Const(_) | Activation::Variable(_) | Activation::Sigmoidal => 1,
            Activation::Exp(arg)
            | Activation::Sin(arg)
            | Activation::Tanh(arg)
            | Activation::Sigmoid(arg)
            | Activation::Relu(arg) => 1 + arg.depth(),
            Activation::Add(lhs, rhs)
            | Activation::Sub(lhs, rhs)
            | Activation::Mul(lhs, rhs)
            | Activation::Div(lhs, rhs)
            | Activation::Max(lhs, rhs) => 1 + lhs.depth().max(rhs.depth()),
            Activation::If(condition, if_true, if_false) => {
                1 + condition.depth().max(if_true.depth()).max(if_false.depth())
            }
        }
    }

    /// Evaluates the expression for a neuron whose biased input is `input`.
    pub fn evaluate(&self, input: f64, state: &NeuronState) -> f64 {
        match self {
            Activation::Const(value) => *value,
            Activation::Variable(name) => match name.as_str() {
                "input" | "sum" => input,
                "prev_output" => state.previous_output,
                _ => 0.0,
            },
            Activation::Add(lhs, rhs) => lhs.evaluate(input, state) + rhs.evaluate(input, state),
            Activation::Sub(lhs, rhs) => lhs.evaluate(input, state) - rhs.evaluate(input, state),
            Activation::Mul(lhs, rhs) => lhs.evaluate(input, state) * rhs.evaluate(input, state),
            Activation::Div(lhs, rhs) => {
                let denominator = rhs.evaluate(input, state);
                if denominator.abs() < DIV_EPSILON {
                    0.0
                } else {
                    lhs.evaluate(input, state) / denominator
                }
            }
            Activation::Exp(arg) => arg.evaluate(input, state).exp(),
            Activation::Sin(arg) => arg.evaluate(input, state).sin(),
            Activation::Tanh(arg) => arg.evaluate(input, state).tanh(),
            Activation::Sigmoid(arg) => sigmoid(arg.evaluate(input, state)),
            Activation::Relu(arg) => arg.evaluate(input, state).max(0.0),
            Activation::Sigmoidal => sigmoid(input),
            Activation::Max(lhs, rhs) => lhs.evaluate(input, state).max(rhs.evaluate(input, state)),
            Activation::If(condition, if_true, if_false) => {
                if condition.evaluate(input, state) > 0.0 {
                    if_true.evaluate(input, state)
                } else {
                    if_false.evaluate(input, state)
                }
            }
        }
    }

    /// Variable names in this tree that `evaluate` silently maps to 0.0.
    pub fn unknown_variables(&self) -> Vec<&str> {
        let mut unknown = Vec::new();
        self.collect_unknown(&mut unknown);
        unknown
    }

    fn collect_unknown<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Activation::Variable(name) => {
                if !KNOWN_VARIABLES.contains(&name.as_str()) && !out.contains(&name.as_str()) {
                    out.push(name.as_str());
                }
            }
            Activation::Const(_) | Activation::Sigmoidal => {}
            Activation::Exp(arg)
            | Activation::Sin(arg)
            | Activation::Tanh(arg)
            | Activation::Sigmoid(arg)
            | Activation::Relu(arg) => arg.collect_unknown(out),
            Activation::Add(lhs, rhs)
            | Activation::Sub(lhs, rhs)
            | Activation::Mul(lhs, rhs)
            | Activation::Div(lhs, rhs)
            | Activation::Max(lhs, rhs) => {
                lhs.collect_unknown(out);
                rhs.collect_unknown(out);
            }
            Activation::If(condition, if_true, if_false) => {
                condition.collect_unknown(out);
                if_true.collect_unknown(out);
                if_false.collect_unknown(out);
            }
        }
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(previous_output: f64) -> NeuronState {
        NeuronState { previous_output }
    }

    #[test]
    fn leaves_have_depth_one() {
        assert_eq!(Activation::Const(3.0).depth(), 1);
        assert_eq!(Activation::sum().depth(), 1);
        assert_eq!(Activation::Sigmoidal.depth(), 1);
    }

    #[test]
    fn depth_is_one_plus_deepest_child() {
        // height 4 on the left, height 2 on the right
        let deep = Activation::tanh(Activation::sin(Activation::relu(Activation::sum())));
        let shallow = Activation::exp(Activation::Const(1.0));
        assert_eq!(deep.depth(), 4);
        assert_eq!(shallow.depth(), 2);

        let combined = Activation::add(deep.clone(), shallow.clone());
        assert_eq!(combined.depth(), 5);
        let combined = Activation::max(shallow, deep);
        assert_eq!(combined.depth(), 5);
    }

    #[test]
    fn conditional_depth_counts_the_condition_branch() {
        let condition = Activation::sub(
            Activation::mul(Activation::sum(), Activation::sigmoid(Activation::sum())),
            Activation::Const(0.5),
        );
        assert_eq!(condition.depth(), 4);
        let tree = Activation::if_else(condition, Activation::Const(1.0), Activation::sum());
        assert_eq!(tree.depth(), 5);
    }

    #[test]
    fn variables_resolve_against_input_and_state() {
        let s = state(0.25);
        assert_eq!(Activation::var("input").evaluate(1.5, &s), 1.5);
        assert_eq!(Activation::var("sum").evaluate(-2.0, &s), -2.0);
        assert_eq!(Activation::var("prev_output").evaluate(1.5, &s), 0.25);
        assert_eq!(Activation::var("calcium").evaluate(1.5, &s), 0.0);
    }

    #[test]
    fn division_by_near_zero_yields_zero() {
        let s = state(0.0);
        let tree = Activation::div(Activation::Const(1.0), Activation::Const(1e-12));
        assert_eq!(tree.evaluate(0.0, &s), 0.0);
        let tree = Activation::div(Activation::sum(), Activation::var("prev_output"));
        assert_eq!(tree.evaluate(3.0, &s), 0.0);
        let tree = Activation::div(Activation::sum(), Activation::Const(2.0));
        assert_eq!(tree.evaluate(3.0, &s), 1.5);
    }

    #[test]
    fn sigmoidal_matches_sigmoid_of_sum() {
        let s = state(0.0);
        for x in [-3.0, -0.5, 0.0, 0.6, 4.0] {
            assert_eq!(
                Activation::Sigmoidal.evaluate(x, &s),
                Activation::sigmoid(Activation::sum()).evaluate(x, &s)
            );
        }
    }

    #[test]
    fn conditional_picks_branch_on_strictly_positive_condition() {
        let s = state(0.0);
        let tree = Activation::if_else(
            Activation::sum(),
            Activation::Const(1.0),
            Activation::Const(-1.0),
        );
        assert_eq!(tree.evaluate(0.1, &s), 1.0);
        assert_eq!(tree.evaluate(0.0, &s), -1.0);
        assert_eq!(tree.evaluate(-0.1, &s), -1.0);
    }

    #[test]
    fn unary_operators() {
        let s = state(0.0);
        assert_eq!(Activation::relu(Activation::sum()).evaluate(-2.0, &s), 0.0);
        assert_eq!(Activation::relu(Activation::sum()).evaluate(2.0, &s), 2.0);
        assert_eq!(Activation::tanh(Activation::sum()).evaluate(0.3, &s), 0.3f64.tanh());
        assert_eq!(Activation::sin(Activation::sum()).evaluate(0.3, &s), 0.3f64.sin());
        assert_eq!(Activation::exp(Activation::sum()).evaluate(0.3, &s), 0.3f64.exp());
    }

    #[test]
    fn evaluation_is_finite_on_pathological_trees() {
        let s = state(0.7);
        let tree = Activation::add(
            Activation::div(Activation::var("unknown"), Activation::var("unknown")),
            Activation::if_else(
                Activation::div(Activation::Const(1.0), Activation::Const(0.0)),
                Activation::Const(f64::NAN),
                Activation::max(Activation::sum(), Activation::var("prev_output")),
            ),
        );
        let value = tree.evaluate(0.2, &s);
        assert!(value.is_finite());
        assert_eq!(value, 0.7);
    }

    #[test]
    fn unknown_variables_are_reported_once() {
        let tree = Activation::add(
            Activation::var("fatigue"),
            Activation::mul(Activation::var("fatigue"), Activation::var("prev_output")),
        );
        assert_eq!(tree.unknown_variables(), vec!["fatigue"]);
        assert!(Activation::tanh(Activation::sum()).unknown_variables().is_empty());
    }
}
