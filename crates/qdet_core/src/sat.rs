//! Satisfiability oracle.
//!
//! The search builds small CNF formulas asking whether a lighter detector
//! combination exists and hands them to a [`SatBackend`]. Literals use the
//! DIMACS convention: variable `v` is `v as i32`, its negation `-v`, and
//! variables are numbered from 1.

use crate::DetectorError;
use std::time::{Duration, Instant};
use tracing::trace;

/// A formula in conjunctive normal form.
#[derive(Debug, Clone, Default)]
pub struct Cnf {
    num_vars: usize,
    clauses: Vec<Vec<i32>>,
}

impl Cnf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_var(&mut self) -> i32 {
        self.num_vars += 1;
        self.num_vars as i32
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn clauses(&self) -> &[Vec<i32>] {
        &self.clauses
    }

    pub fn add_clause(&mut self, lits: &[i32]) {
        self.clauses.push(lits.to_vec());
    }

    /// Constrains `target` to equal the XOR of `lits` with a Tseitin chain.
    pub fn add_xor(&mut self, lits: &[i32], target: i32) {
        match lits {
            [] => self.add_clause(&[-target]),
            [only] => {
                self.add_clause(&[-target, *only]);
                self.add_clause(&[target, -*only]);
            }
            [first, rest @ ..] => {
                let mut acc = *first;
                for (i, &lit) in rest.iter().enumerate() {
                    let out = if i + 1 == rest.len() { target } else { self.new_var() };
                    self.add_clause(&[-out, acc, lit]);
                    self.add_clause(&[-out, -acc, -lit]);
                    self.add_clause(&[out, -acc, lit]);
                    self.add_clause(&[out, acc, -lit]);
                    acc = out;
                }
            }
        }
    }

    /// At most `k` of `lits` are true (sequential counter encoding).
    pub fn add_at_most(&mut self, lits: &[i32], k: usize) {
        let n = lits.len();
        if k >= n {
            return;
        }
        if k == 0 {
            for &lit in lits {
                self.add_clause(&[-lit]);
            }
            return;
        }
        // s[i][j]: at least j+1 of lits[0..=i] are true.
        let s: Vec<Vec<i32>> = (0..n - 1).map(|_| (0..k).map(|_| self.new_var()).collect()).collect();
        self.add_clause(&[-lits[0], s[0][0]]);
        for j in 1..k {
            self.add_clause(&[-s[0][j]]);
        }
        for i in 1..n - 1 {
            self.add_clause(&[-lits[i], s[i][0]]);
            self.add_clause(&[-s[i - 1][0], s[i][0]]);
            for j in 1..k {
                self.add_clause(&[-lits[i], -s[i - 1][j - 1], s[i][j]]);
                self.add_clause(&[-s[i - 1][j], s[i][j]]);
            }
            self.add_clause(&[-lits[i], -s[i - 1][k - 1]]);
        }
        self.add_clause(&[-lits[n - 1], -s[n - 2][k - 1]]);
    }
}

/// Result of a satisfiability query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatOutcome {
    /// A witness; entry `v - 1` holds the value of variable `v`.
    Satisfiable(Vec<bool>),
    Unsatisfiable,
}

impl SatOutcome {
    pub fn value(&self, lit: i32) -> Option<bool> {
        match self {
            SatOutcome::Satisfiable(model) => {
                let value = *model.get(lit.unsigned_abs() as usize - 1)?;
                Some(if lit > 0 { value } else { !value })
            }
            SatOutcome::Unsatisfiable => None,
        }
    }
}

/// Narrow solve interface over a SAT solver.
pub trait SatBackend {
    fn solve(&mut self, cnf: &Cnf) -> Result<SatOutcome, DetectorError>;
}

/// Default back end on the `varisat` CDCL solver.
#[derive(Debug, Default, Clone, Copy)]
pub struct VarisatBackend;

impl SatBackend for VarisatBackend {
    fn solve(&mut self, cnf: &Cnf) -> Result<SatOutcome, DetectorError> {
        use varisat::{ExtendFormula, Lit, Solver};

        let mut solver = Solver::new();
        for _ in 0..cnf.num_vars() {
            solver.new_var();
        }
        for clause in cnf.clauses() {
            let lits: Vec<Lit> = clause.iter().map(|&l| Lit::from_dimacs(l as isize)).collect();
            solver.add_clause(&lits);
        }
        match solver.solve() {
            Ok(true) => {
                let mut values = vec![false; cnf.num_vars()];
                for lit in solver.model().unwrap_or_default() {
                    if let Some(slot) = values.get_mut(lit.var().index()) {
                        *slot = lit.is_positive();
                    }
                }
                Ok(SatOutcome::Satisfiable(values))
            }
            Ok(false) => Ok(SatOutcome::Unsatisfiable),
            Err(err) => Err(DetectorError::Solver(format!("{err:?}"))),
        }
    }
}

/// Query and wall-clock limits for one boundary.
///
/// Without a time limit the outcome depends only on the query count, so the
/// same input always yields the same warnings.
#[derive(Debug, Clone, Copy)]
pub struct SatBudget {
    pub max_queries: usize,
    pub max_time: Option<Duration>,
}

/// A back end wrapped in a budget.
///
/// Once either limit is reached every further query fails with
/// [`DetectorError::SearchTimeout`].
pub struct SatOracle<'a> {
    backend: &'a mut dyn SatBackend,
    budget: SatBudget,
    queries: usize,
    started: Instant,
}

impl<'a> SatOracle<'a> {
    pub fn new(backend: &'a mut dyn SatBackend, budget: SatBudget) -> Self {
        Self {
            backend,
            budget,
            queries: 0,
            started: Instant::now(),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries
    }

    pub fn query(&mut self, cnf: &Cnf) -> Result<SatOutcome, DetectorError> {
        let elapsed = self.started.elapsed();
        let out_of_time = self.budget.max_time.is_some_and(|limit| elapsed >= limit);
        if self.queries >= self.budget.max_queries || out_of_time {
            return Err(DetectorError::SearchTimeout {
                queries: self.queries,
                elapsed,
            });
        }
        self.queries += 1;
        trace!(vars = cnf.num_vars(), clauses = cnf.clauses().len(), "sat query");
        self.backend.solve(cnf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve(cnf: &Cnf) -> SatOutcome {
        VarisatBackend.solve(cnf).unwrap()
    }

    fn count_models(n: usize, build: impl Fn(&mut Cnf, &[i32])) -> usize {
        // Enumerate assignments of the first n variables by fixing them with units.
        (0..1u32 << n)
            .filter(|mask| {
                let mut cnf = Cnf::new();
                let vars: Vec<i32> = (0..n).map(|_| cnf.new_var()).collect();
                build(&mut cnf, &vars);
                for (i, &v) in vars.iter().enumerate() {
                    let lit = if mask >> i & 1 == 1 { v } else { -v };
                    cnf.add_clause(&[lit]);
                }
                matches!(solve(&cnf), SatOutcome::Satisfiable(_))
            })
            .count()
    }

    #[test]
    fn xor_chain_is_exact() {
        // x0 ^ x1 ^ x2 = 1 has four solutions over three variables.
        let models = count_models(3, |cnf, vars| {
            let t = cnf.new_var();
            cnf.add_xor(vars, t);
            cnf.add_clause(&[t]);
        });
        assert_eq!(models, 4);
    }

    #[test]
    fn at_most_counts_binomially() {
        // sum_{j<=2} C(5, j) = 1 + 5 + 10.
        let models = count_models(5, |cnf, vars| cnf.add_at_most(vars, 2));
        assert_eq!(models, 16);
        let models = count_models(3, |cnf, vars| cnf.add_at_most(vars, 0));
        assert_eq!(models, 1);
    }

    #[test]
    fn witness_values_are_readable() {
        let mut cnf = Cnf::new();
        let a = cnf.new_var();
        let b = cnf.new_var();
        cnf.add_clause(&[a]);
        cnf.add_clause(&[-a, -b]);
        let outcome = solve(&cnf);
        assert_eq!(outcome.value(a), Some(true));
        assert_eq!(outcome.value(b), Some(false));
        assert_eq!(outcome.value(-b), Some(true));

        cnf.add_clause(&[b]);
        assert_eq!(solve(&cnf), SatOutcome::Unsatisfiable);
    }

    #[test]
    fn oracle_enforces_query_budget() {
        let mut backend = VarisatBackend;
        let mut oracle = SatOracle::new(
            &mut backend,
            SatBudget {
                max_queries: 1,
                max_time: None,
            },
        );
        let cnf = Cnf::new();
        assert!(oracle.query(&cnf).is_ok());
        assert!(matches!(
            oracle.query(&cnf),
            Err(DetectorError::SearchTimeout { queries: 1, .. })
        ));
    }

    #[test]
    fn oracle_enforces_time_budget_only_when_set() {
        let mut backend = VarisatBackend;
        let mut oracle = SatOracle::new(
            &mut backend,
            SatBudget {
                max_queries: 8,
                max_time: Some(Duration::ZERO),
            },
        );
        assert!(matches!(
            oracle.query(&Cnf::new()),
            Err(DetectorError::SearchTimeout { queries: 0, .. })
        ));
    }
}
