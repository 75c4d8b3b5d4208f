//! A binary linear program: minimize `objective · x` over `x ∈ {0,1}^n` subject to linear constraints.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Tolerance used when comparing constraint activities
pub const EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    LessEqual,
    Equal,
    GreaterEqual,
}

impl Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::LessEqual => f.write_str("<="),
            Relation::Equal => f.write_str("=="),
            Relation::GreaterEqual => f.write_str(">="),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearConstraint {
    pub coefficients: Vec<(usize, f64)>,
    pub relation: Relation,
    pub value: f64,
}

impl LinearConstraint {
    pub fn new(coefficients: Vec<(usize, f64)>, relation: Relation, value: f64) -> Self {
        Self { coefficients, relation, value }
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn activity(&self, assignment: &[bool]) -> f64 {
        self.coefficients.iter().filter(|(i, _)| assignment[*i]).map(|(_, c)| c).sum()
    }

    pub fn is_satisfied_by(&self, assignment: &[bool]) -> bool {
        let activity = self.activity(assignment);
        match self.relation {
            Relation::LessEqual => activity <= self.value + EPSILON,
            Relation::Equal => (activity - self.value).abs() <= EPSILON,
            Relation::GreaterEqual => activity >= self.value - EPSILON,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearProgram {
    pub num_variables: usize,
    pub objective: Vec<f64>,
    pub constraints: Vec<LinearConstraint>,
}

impl LinearProgram {
    /// A program over `objective.len()` variables with no constraints yet
    pub fn new(objective: Vec<f64>) -> Self {
        Self { num_variables: objective.len(), objective, constraints: vec![] }
    }

    /// Adds a constraint unless it has no terms
    pub fn add_constraint(&mut self, constraint: LinearConstraint) {
        if !constraint.is_empty() {
            self.constraints.push(constraint);
        }
    }

    pub fn evaluate(&self, assignment: &[bool]) -> f64 {
        self.objective.iter().zip(assignment).filter(|(_, x)| **x).map(|(c, _)| c).sum()
    }

    pub fn is_feasible(&self, assignment: &[bool]) -> bool {
        assignment.len() == self.num_variables && self.constraints.iter().all(|c| c.is_satisfied_by(assignment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feasibility_and_objective() {
        let mut program = LinearProgram::new(vec![1.0, -2.0, 0.5]);
        program.add_constraint(LinearConstraint::new(vec![(0, 1.0), (1, 1.0)], Relation::LessEqual, 1.0));
        program.add_constraint(LinearConstraint::new(vec![(1, 1.0), (2, -1.0)], Relation::Equal, 0.0));
        program.add_constraint(LinearConstraint::new(vec![], Relation::GreaterEqual, 1.0));
        assert_eq!(program.constraints.len(), 2);

        assert!(program.is_feasible(&[false, true, true]));
        assert_eq!(program.evaluate(&[false, true, true]), -1.5);
        assert!(!program.is_feasible(&[true, true, true]));
        assert!(!program.is_feasible(&[false, true, false]));
        assert!(!program.is_feasible(&[false, true]));
    }
}
