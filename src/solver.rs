//! Provides data structures and functions for performing optimisation.
//!
//! The problem representation here is solver-agnostic: the formulator builds a [`Problem`] out of
//! variable definitions and constraint rows, and an implementation of [`SolveQp`] hands it to a
//! numerical solver. The bundled backend is Clarabel, a pure-Rust interior-point solver that
//! handles both the linear and the quadratic cost forms.
use crate::error::{DispatchError, DispatchResult};
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use log::{debug, error};
use std::time::Duration;

/// A decision variable in the optimisation.
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable(usize);

impl Variable {
    /// The index of the corresponding entry in the solution values
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The definition of a variable to be optimised.
///
/// Each variable contributes `quadratic * x² + coefficient * x` to the objective and takes values
/// between `min` and `max` (use infinities for unbounded sides).
#[derive(PartialEq, Debug)]
pub struct VariableDefinition {
    /// The variable's minimum value
    pub min: f64,
    /// The variable's maximum value
    pub max: f64,
    /// The linear coefficient of the variable in the objective
    pub coefficient: f64,
    /// The quadratic coefficient of the variable in the objective (must be non-negative)
    pub quadratic: f64,
}

/// A constraint for an optimisation.
///
/// Each constraint adds an inequality to the problem of the form:
///
/// min <= a1*x1 + a2*x2 + ... <= max
///
/// A constraint with `min == max` is an equality. Often, constraints will impose only a min or a
/// max value, with the other set to an infinity.
#[derive(PartialEq, Debug)]
pub struct Constraint {
    /// The minimum value for the constraint
    pub min: f64,
    /// The maximum value for the constraint
    pub max: f64,
    /// Sparse terms: pairs of variable and coefficient
    pub terms: Vec<(Variable, f64)>,
}

impl Constraint {
    fn is_equality(&self) -> bool {
        self.min == self.max && self.min.is_finite()
    }
}

/// An optimisation problem under construction.
#[derive(Default, Debug)]
pub struct Problem {
    definitions: Vec<VariableDefinition>,
    constraints: Vec<Constraint>,
    offset: f64,
}

impl Problem {
    /// Add a variable with the given objective coefficients and bounds, returning its handle
    pub fn add_column(&mut self, coefficient: f64, quadratic: f64, min: f64, max: f64) -> Variable {
        let var = Variable(self.definitions.len());
        self.definitions.push(VariableDefinition {
            min,
            max,
            coefficient,
            quadratic,
        });
        var
    }

    /// Add a constraint row over the given sparse terms
    pub fn add_row(&mut self, min: f64, max: f64, terms: impl IntoIterator<Item = (Variable, f64)>) {
        self.constraints.push(Constraint {
            min,
            max,
            terms: terms.into_iter().collect(),
        });
    }

    /// Add a constant to the objective (e.g. fixed costs the variables cannot influence)
    pub fn add_offset(&mut self, value: f64) {
        self.offset += value;
    }

    /// The constant part of the objective
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// The number of variables added so far
    pub fn num_columns(&self) -> usize {
        self.definitions.len()
    }

    /// The number of constraint rows added so far
    pub fn num_rows(&self) -> usize {
        self.constraints.len()
    }
}

/// The solver's classification of an optimisation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum TerminationStatus {
    /// An optimal solution was found
    Optimal,
    /// The constraints admit no feasible point
    Infeasible,
    /// The objective can be decreased without bound
    Unbounded,
    /// The wall-clock limit was reached before a solution was found
    TimeLimit,
    /// The solver gave up (numerical trouble, iteration limit, internal failure)
    SolverError,
}

/// A solved optimisation problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// The termination status reported by the solver
    pub status: TerminationStatus,
    /// The value of each variable, indexed by [`Variable::index`]
    pub values: Vec<f64>,
    /// The objective value, including the problem's constant offset
    pub objective: f64,
}

/// The narrow interface the dispatch pipeline requires of a numerical solver.
///
/// Implementations must report the termination condition verbatim and must not substitute a
/// degraded answer when the outcome is not optimal. Retrying is the orchestration loop's job, not
/// the solver's.
pub trait SolveQp {
    /// Solve the problem within the given wall-clock limit
    fn solve(&self, problem: &Problem, time_limit: Duration) -> DispatchResult<Solution>;
}

/// The Clarabel solver backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClarabelSolver;

impl SolveQp for ClarabelSolver {
    fn solve(&self, problem: &Problem, time_limit: Duration) -> DispatchResult<Solution> {
        let n = problem.num_columns();

        // Clarabel solves min ½xᵀPx + qᵀx s.t. Ax + s = b, s ∈ K. Our quadratic coefficients are
        // on x², so the diagonal of P carries twice each coefficient.
        let q: Vec<f64> = problem.definitions.iter().map(|d| d.coefficient).collect();
        let p_mat = build_quadratic_matrix(&problem.definitions);

        // Rows go in cone order: all equalities first (the zero cone), then every inequality
        // rewritten as a·x <= b (the non-negative cone).
        let mut cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut b = Vec::new();

        for constraint in &problem.constraints {
            if constraint.is_equality() {
                push_row(&mut cols, &mut b, &constraint.terms, 1.0, constraint.min);
            }
        }
        for (j, def) in problem.definitions.iter().enumerate() {
            if def.min == def.max && def.min.is_finite() {
                push_row(&mut cols, &mut b, &[(Variable(j), 1.0)], 1.0, def.min);
            }
        }
        let num_equalities = b.len();

        for constraint in &problem.constraints {
            if constraint.is_equality() {
                continue;
            }
            if constraint.max.is_finite() {
                push_row(&mut cols, &mut b, &constraint.terms, 1.0, constraint.max);
            }
            if constraint.min.is_finite() {
                push_row(&mut cols, &mut b, &constraint.terms, -1.0, -constraint.min);
            }
        }
        for (j, def) in problem.definitions.iter().enumerate() {
            if def.min == def.max {
                continue; // pinned variables were added as equalities above
            }
            if def.max.is_finite() {
                push_row(&mut cols, &mut b, &[(Variable(j), 1.0)], 1.0, def.max);
            }
            if def.min.is_finite() {
                push_row(&mut cols, &mut b, &[(Variable(j), 1.0)], -1.0, -def.min);
            }
        }
        let num_inequalities = b.len() - num_equalities;

        let a_mat = to_csc(b.len(), n, cols);
        let mut cones: Vec<SupportedConeT<f64>> = Vec::new();
        if num_equalities > 0 {
            cones.push(SupportedConeT::ZeroConeT(num_equalities));
        }
        if num_inequalities > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(num_inequalities));
        }

        debug!(
            "Solving problem with {n} variables, {num_equalities} equalities and \
             {num_inequalities} inequalities"
        );

        let settings = DefaultSettingsBuilder::default()
            .verbose(false)
            .time_limit(time_limit.as_secs_f64())
            .build()
            .map_err(|err| {
                error!("Invalid solver settings: {err:?}");
                DispatchError::Solver {
                    status: TerminationStatus::SolverError,
                }
            })?;

        let mut solver =
            DefaultSolver::new(&p_mat, &q, &a_mat, &b, &cones, settings).map_err(|err| {
                error!("Solver rejected the problem: {err:?}");
                DispatchError::Solver {
                    status: TerminationStatus::SolverError,
                }
            })?;
        solver.solve();

        let solution = solver.solution;
        match classify_status(solution.status) {
            TerminationStatus::Optimal => Ok(Solution {
                status: TerminationStatus::Optimal,
                values: solution.x,
                objective: solution.obj_val + problem.offset,
            }),
            TerminationStatus::Infeasible => Err(DispatchError::Infeasible {
                status: TerminationStatus::Infeasible,
            }),
            status => Err(DispatchError::Solver { status }),
        }
    }
}

/// Map Clarabel's status onto our termination taxonomy
fn classify_status(status: SolverStatus) -> TerminationStatus {
    match status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => TerminationStatus::Optimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            TerminationStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            TerminationStatus::Unbounded
        }
        SolverStatus::MaxTime => TerminationStatus::TimeLimit,
        _ => TerminationStatus::SolverError,
    }
}

/// Append one row `sign * terms · x <= rhs` (or `= rhs` when in the equality block)
fn push_row(
    cols: &mut [Vec<(usize, f64)>],
    b: &mut Vec<f64>,
    terms: &[(Variable, f64)],
    sign: f64,
    rhs: f64,
) {
    let row = b.len();
    for &(var, coeff) in terms {
        cols[var.index()].push((row, sign * coeff));
    }
    b.push(rhs);
}

/// Build the diagonal quadratic cost matrix P with `P[j][j] = 2 * quadratic[j]`
fn build_quadratic_matrix(definitions: &[VariableDefinition]) -> CscMatrix<f64> {
    let n = definitions.len();
    let mut col_ptr = Vec::with_capacity(n + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();

    for (j, def) in definitions.iter().enumerate() {
        col_ptr.push(row_idx.len());
        if def.quadratic != 0.0 {
            row_idx.push(j);
            values.push(2.0 * def.quadratic);
        }
    }
    col_ptr.push(row_idx.len());

    CscMatrix::new(n, n, col_ptr, row_idx, values)
}

/// Convert column-wise accumulated entries to compressed sparse column format
fn to_csc(num_rows: usize, num_cols: usize, mut cols: Vec<Vec<(usize, f64)>>) -> CscMatrix<f64> {
    let mut col_ptr = Vec::with_capacity(num_cols + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();

    for col in &mut cols {
        col_ptr.push(row_idx.len());
        col.sort_by_key(|&(row, _)| row);
        for &(row, value) in col.iter() {
            row_idx.push(row);
            values.push(value);
        }
    }
    col_ptr.push(row_idx.len());

    CscMatrix::new(num_rows, num_cols, col_ptr, row_idx, values)
}
