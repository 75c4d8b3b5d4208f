//! Reference binary program solver: depth-first branch and bound with bound propagation.
//!
//! Independent components of the program are solved separately. The objective bound relaxes every free
//! variable to its cheaper value, except that at most one variable of each set-packing row (`sum <= 1` or
//! `sum = 1` with unit coefficients) may contribute a negative cost.

use blockwise_pipeline_core::{
    api::LinearSolver,
    disjoint::DisjointSets,
    errors::solver::{SolverError, SolverResult},
    program::{EPSILON, LinearProgram, Relation},
};
use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

/// Deadline checks happen every this many search nodes
const DEADLINE_CHECK_INTERVAL: u64 = 256;

#[derive(Clone, Copy, Debug, Default)]
pub struct BranchAndBoundSolver;

impl BranchAndBoundSolver {
    pub fn new() -> Self {
        Self
    }
}

impl LinearSolver for BranchAndBoundSolver {
    fn solve(&self, program: &LinearProgram, budget: Option<Duration>) -> SolverResult<Vec<bool>> {
        validate(program)?;
        let clock = Clock { deadline: budget.map(|b| Instant::now() + b), budget: budget.unwrap_or_default() };
        clock.check()?;

        let mut assignment = vec![false; program.num_variables];
        for component in components(program) {
            let mut search = ComponentSearch::new(program, &component, &clock);
            let values = search.run()?;
            for (&var, value) in component.variables.iter().zip(values) {
                assignment[var] = value;
            }
        }
        Ok(assignment)
    }
}

fn validate(program: &LinearProgram) -> SolverResult<()> {
    if program.objective.len() != program.num_variables {
        return Err(SolverError::InvalidProgram(format!(
            "objective has {} entries for {} variables",
            program.objective.len(),
            program.num_variables
        )));
    }
    if let Some(cost) = program.objective.iter().find(|c| !c.is_finite()) {
        return Err(SolverError::InvalidProgram(format!("non-finite objective coefficient {cost}")));
    }
    for (i, constraint) in program.constraints.iter().enumerate() {
        if !constraint.value.is_finite() {
            return Err(SolverError::InvalidProgram(format!("constraint {i} has a non-finite bound")));
        }
        for &(var, coef) in &constraint.coefficients {
            if var >= program.num_variables {
                return Err(SolverError::InvalidProgram(format!("constraint {i} references variable {var} of {}", program.num_variables)));
            }
            if !coef.is_finite() {
                return Err(SolverError::InvalidProgram(format!("constraint {i} has a non-finite coefficient")));
            }
        }
    }
    Ok(())
}

struct Clock {
    deadline: Option<Instant>,
    budget: Duration,
}

impl Clock {
    fn check(&self) -> SolverResult<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SolverError::Timeout(self.budget)),
            _ => Ok(()),
        }
    }
}

/// Variables and constraints (global indices) which only interact with each other
struct Component {
    variables: Vec<usize>,
    constraints: Vec<usize>,
}

fn components(program: &LinearProgram) -> Vec<Component> {
    let mut sets = DisjointSets::new(program.num_variables);
    for constraint in &program.constraints {
        let mut vars = constraint.coefficients.iter().map(|(v, _)| *v);
        if let Some(first) = vars.next() {
            for v in vars {
                sets.union(first, v);
            }
        }
    }

    let mut by_root: BTreeMap<usize, Component> = BTreeMap::new();
    for var in 0..program.num_variables {
        let root = sets.find(var);
        by_root.entry(root).or_insert_with(|| Component { variables: vec![], constraints: vec![] }).variables.push(var);
    }
    let mut orphans = vec![];
    for (i, constraint) in program.constraints.iter().enumerate() {
        match constraint.coefficients.first() {
            Some(&(var, _)) => {
                let root = sets.find(var);
                if let Some(component) = by_root.get_mut(&root) {
                    component.constraints.push(i);
                }
            }
            None => orphans.push(i),
        }
    }

    let mut components: Vec<Component> = by_root.into_values().collect();
    // Constraints without variables still have to hold
    if !orphans.is_empty() {
        components.push(Component { variables: vec![], constraints: orphans });
    }
    components
}

struct LocalConstraint {
    terms: Vec<(usize, f64)>,
    relation: Relation,
    value: f64,
    min_activity: f64,
    max_activity: f64,
}

impl LocalConstraint {
    fn violated(&self) -> bool {
        let upper = matches!(self.relation, Relation::LessEqual | Relation::Equal) && self.min_activity > self.value + EPSILON;
        let lower = matches!(self.relation, Relation::GreaterEqual | Relation::Equal) && self.max_activity < self.value - EPSILON;
        upper || lower
    }

    /// The value a free variable with coefficient `coef` is forced to by this constraint, if any
    fn forced_value(&self, coef: f64) -> Option<bool> {
        if matches!(self.relation, Relation::LessEqual | Relation::Equal) {
            let slack = self.value - self.min_activity;
            if coef > slack + EPSILON {
                return Some(false);
            }
            if -coef > slack + EPSILON {
                return Some(true);
            }
        }
        if matches!(self.relation, Relation::GreaterEqual | Relation::Equal) {
            let slack = self.max_activity - self.value;
            if coef > slack + EPSILON {
                return Some(true);
            }
            if -coef > slack + EPSILON {
                return Some(false);
            }
        }
        None
    }

    fn is_packing_row(&self) -> bool {
        matches!(self.relation, Relation::LessEqual | Relation::Equal)
            && (self.value - 1.0).abs() <= EPSILON
            && self.terms.iter().all(|(_, c)| (c - 1.0).abs() <= EPSILON)
    }
}

struct ComponentSearch<'a> {
    costs: Vec<f64>,
    constraints: Vec<LocalConstraint>,
    /// Per variable: (constraint, coefficient)
    occurrences: Vec<Vec<(usize, f64)>>,
    /// Per variable: the packing row its negative cost is charged to
    packing_row: Vec<Option<usize>>,
    values: Vec<Option<bool>>,
    trail: Vec<usize>,
    fixed_cost: f64,
    best: Option<(f64, Vec<bool>)>,
    nodes: u64,
    clock: &'a Clock,
}

impl<'a> ComponentSearch<'a> {
    fn new(program: &LinearProgram, component: &Component, clock: &'a Clock) -> Self {
        let local_of: BTreeMap<usize, usize> = component.variables.iter().enumerate().map(|(l, &g)| (g, l)).collect();
        let costs: Vec<f64> = component.variables.iter().map(|&g| program.objective[g]).collect();
        let mut occurrences = vec![vec![]; costs.len()];

        let mut constraints = Vec::with_capacity(component.constraints.len());
        for &ci in &component.constraints {
            let source = &program.constraints[ci];
            let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
            for &(g, coef) in &source.coefficients {
                *merged.entry(local_of[&g]).or_default() += coef;
            }
            let terms: Vec<(usize, f64)> = merged.into_iter().filter(|(_, c)| c.abs() > EPSILON).collect();
            let min_activity = terms.iter().map(|(_, c)| c.min(0.0)).sum();
            let max_activity = terms.iter().map(|(_, c)| c.max(0.0)).sum();
            for &(var, coef) in &terms {
                occurrences[var].push((constraints.len(), coef));
            }
            constraints.push(LocalConstraint { terms, relation: source.relation, value: source.value, min_activity, max_activity });
        }

        let packing_row = (0..costs.len())
            .map(|var| occurrences[var].iter().map(|(c, _)| *c).find(|&c| constraints[c].is_packing_row()))
            .collect();
        let n = costs.len();
        Self {
            costs,
            constraints,
            occurrences,
            packing_row,
            values: vec![None; n],
            trail: vec![],
            fixed_cost: 0.0,
            best: None,
            nodes: 0,
            clock,
        }
    }

    fn run(&mut self) -> SolverResult<Vec<bool>> {
        if self.constraints.iter().any(|c| c.violated()) {
            return Err(SolverError::Infeasible);
        }
        let all: Vec<usize> = (0..self.constraints.len()).collect();
        if self.propagate(all) {
            self.branch()?;
        }
        self.best.take().map(|(_, values)| values).ok_or(SolverError::Infeasible)
    }

    fn assign(&mut self, var: usize, value: bool) {
        self.values[var] = Some(value);
        self.trail.push(var);
        if value {
            self.fixed_cost += self.costs[var];
        }
        for &(c, coef) in &self.occurrences[var] {
            let constraint = &mut self.constraints[c];
            match (coef > 0.0, value) {
                (true, true) => constraint.min_activity += coef,
                (true, false) => constraint.max_activity -= coef,
                (false, true) => constraint.max_activity += coef,
                (false, false) => constraint.min_activity -= coef,
            }
        }
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let Some(var) = self.trail.pop() else { break };
            let Some(value) = self.values[var].take() else { continue };
            if value {
                self.fixed_cost -= self.costs[var];
            }
            for &(c, coef) in &self.occurrences[var] {
                let constraint = &mut self.constraints[c];
                match (coef > 0.0, value) {
                    (true, true) => constraint.min_activity -= coef,
                    (true, false) => constraint.max_activity += coef,
                    (false, true) => constraint.max_activity -= coef,
                    (false, false) => constraint.min_activity += coef,
                }
            }
        }
    }

    /// Fixes every variable forced by the queued constraints. Returns false on a conflict.
    fn propagate(&mut self, mut queue: Vec<usize>) -> bool {
        while let Some(c) = queue.pop() {
            if self.constraints[c].violated() {
                return false;
            }
            let constraint = &self.constraints[c];
            let forced: Vec<(usize, bool)> = constraint
                .terms
                .iter()
                .filter(|(var, _)| self.values[*var].is_none())
                .filter_map(|&(var, coef)| constraint.forced_value(coef).map(|value| (var, value)))
                .collect();
            for (var, value) in forced {
                match self.values[var] {
                    Some(current) if current != value => return false,
                    Some(_) => {}
                    None => {
                        self.assign(var, value);
                        queue.extend(self.occurrences[var].iter().map(|(c, _)| *c));
                    }
                }
            }
        }
        true
    }

    fn lower_bound(&self) -> f64 {
        let mut best_in_row: BTreeMap<usize, f64> = BTreeMap::new();
        let mut bound = self.fixed_cost;
        for var in (0..self.costs.len()).filter(|&v| self.values[v].is_none()) {
            let cost = self.costs[var];
            if cost >= 0.0 {
                continue;
            }
            match self.packing_row[var] {
                Some(row) => {
                    let entry = best_in_row.entry(row).or_insert(0.0);
                    *entry = entry.min(cost);
                }
                None => bound += cost,
            }
        }
        bound + best_in_row.values().sum::<f64>()
    }

    fn branch(&mut self) -> SolverResult<()> {
        self.nodes += 1;
        if self.nodes % DEADLINE_CHECK_INTERVAL == 0 {
            self.clock.check()?;
        }
        if self.best.as_ref().is_some_and(|(best, _)| self.lower_bound() >= best - EPSILON) {
            return Ok(());
        }

        // Branch on the cheapest free variable, trying its cheaper value first
        let free = (0..self.costs.len()).filter(|&v| self.values[v].is_none()).min_by(|&a, &b| self.costs[a].total_cmp(&self.costs[b]));
        let Some(var) = free else {
            let values = self.values.iter().map(|v| v.unwrap_or(false)).collect();
            self.best = Some((self.fixed_cost, values));
            return Ok(());
        };

        let preferred = self.costs[var] < 0.0;
        for value in [preferred, !preferred] {
            let mark = self.trail.len();
            self.assign(var, value);
            let touched = self.occurrences[var].iter().map(|(c, _)| *c).collect();
            if self.propagate(touched) {
                self.branch()?;
            }
            self.undo_to(mark);
        }
        Ok(())
    }
}
