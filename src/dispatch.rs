//! Code for formulating the dispatch optimisation problem.
//!
//! [`formulate`] is a pure function of the scenario: it validates the parameter model, lays out
//! one decision variable per unit per interval and adds the constraint rows that couple them. The
//! resulting [`DispatchProblem`] is handed to a [`crate::solver::SolveQp`] implementation and the
//! solved values are read back through the [`VariableMap`].
use crate::error::DispatchResult;
use crate::scenario::{GeneratorID, Scenario, StorageID};
use crate::schedule::Schedule;
use crate::solver::{Problem, Variable};
use crate::units::{Money, MoneyPerPower};
use indexmap::IndexMap;
use log::debug;

mod constraints;
use constraints::add_dispatch_constraints;

/// Import price applied when the scenario carries no price series.
///
/// Deliberately expensive so the grid acts as a feasibility backstop rather than competing with
/// the facility's own units.
pub const DEFAULT_IMPORT_PRICE: MoneyPerPower = MoneyPerPower(1000.0);

/// Cost increment added per duplicate unit for symmetry breaking
const TIE_BREAK_STEP: f64 = 1e-6;

/// Penalty per MW of storage charge and discharge.
///
/// Simultaneous nonzero charge and discharge is never part of a true optimum (efficiency losses
/// make it cost-dominated), but an interior-point solver can land on such a point when prices make
/// the objective flat. Charging this tiny amount on both directions breaks the degeneracy.
const STORAGE_FLOW_PENALTY: f64 = 1e-4;

/// A map for easy lookup of the problem's variables.
///
/// The entries are ordered (see [`IndexMap`]), so variable layout is reproducible across runs.
/// Each value holds one variable per interval, indexed by time step.
#[derive(Debug, Default)]
pub struct VariableMap {
    /// Output of each generator (MW)
    pub generators: IndexMap<GeneratorID, Vec<Variable>>,
    /// Charging power of each storage unit (MW)
    pub charge: IndexMap<StorageID, Vec<Variable>>,
    /// Discharging power of each storage unit (MW)
    pub discharge: IndexMap<StorageID, Vec<Variable>>,
    /// State of charge of each storage unit (MWh)
    pub soc: IndexMap<StorageID, Vec<Variable>>,
    /// Grid import (MW)
    pub import: Vec<Variable>,
    /// Grid export (MW)
    pub export: Vec<Variable>,
    /// PV output (MW), present when the scenario models PV as a curtailable variable
    pub pv: Option<Vec<Variable>>,
}

/// A formulated dispatch problem, ready for the solver.
#[derive(Debug)]
pub struct DispatchProblem {
    /// The constraint/objective system
    pub problem: Problem,
    /// The mapping from scenario entities to problem columns
    pub variables: VariableMap,
}

/// Translate a scenario into an optimisation problem.
///
/// Fails fast with a validation error (before any solver work) if the scenario violates its
/// invariants. A scenario with no generators and no storage still formulates: grid import is then
/// forced to track demand through the balance rows.
pub fn formulate(scenario: &Scenario) -> DispatchResult<DispatchProblem> {
    scenario.validate()?;

    let mut problem = Problem::default();
    let variables = add_variables(&mut problem, scenario);
    add_dispatch_constraints(&mut problem, &variables, scenario);

    debug!(
        "Formulated dispatch problem: {} variables, {} rows over {} intervals",
        problem.num_columns(),
        problem.num_rows(),
        scenario.time.steps
    );

    Ok(DispatchProblem { problem, variables })
}

/// The grid import price for the given interval
pub(crate) fn import_price(scenario: &Scenario, step: usize) -> MoneyPerPower {
    match &scenario.price {
        Some(series) => series[step],
        None => DEFAULT_IMPORT_PRICE,
    }
}

/// Symmetry-breaking additions to each generator's linear cost coefficient.
///
/// Units whose specs duplicate an earlier unit's get a strictly increasing epsilon so the solver
/// has a unique, deterministic preferred fill order instead of an arbitrary split.
pub(crate) fn tie_break_offsets(scenario: &Scenario) -> IndexMap<GeneratorID, f64> {
    let specs: Vec<_> = scenario.generators.values().collect();
    scenario
        .generators
        .iter()
        .enumerate()
        .map(|(i, (id, spec))| {
            let duplicates = specs[..i]
                .iter()
                .filter(|earlier| earlier.same_unit_type(spec))
                .count();
            (id.clone(), duplicates as f64 * TIE_BREAK_STEP)
        })
        .collect()
}

/// Add one column per unit per interval, with bounds and objective coefficients.
///
/// Constants the variables cannot influence (each generator's per-interval constant cost and the
/// scenario's fixed recurring cost) go into the problem's objective offset.
fn add_variables(problem: &mut Problem, scenario: &Scenario) -> VariableMap {
    let steps = scenario.time.steps;
    let mut variables = VariableMap::default();
    let tie_breaks = tie_break_offsets(scenario);

    for (id, spec) in &scenario.generators {
        let linear = spec.cost.linear_coefficient() + tie_breaks[id];
        let quadratic = spec.cost.quadratic_coefficient();
        let vars = (0..steps)
            .map(|_| problem.add_column(linear, quadratic, spec.p_min.value(), spec.p_max.value()))
            .collect();
        variables.generators.insert(id.clone(), vars);

        // Per-interval constant cost, incurred regardless of output
        problem.add_offset(spec.cost.constant().value() * steps as f64);
    }

    for (id, spec) in &scenario.storage {
        let max_power = spec.max_power.value();

        let charge = (0..steps)
            .map(|_| problem.add_column(STORAGE_FLOW_PENALTY, 0.0, 0.0, max_power))
            .collect();
        variables.charge.insert(id.clone(), charge);

        let discharge_cost = spec.aging_cost.value() + STORAGE_FLOW_PENALTY;
        let discharge = (0..steps)
            .map(|_| problem.add_column(discharge_cost, 0.0, 0.0, max_power))
            .collect();
        variables.discharge.insert(id.clone(), discharge);

        let soc = (0..steps)
            .map(|_| {
                problem.add_column(0.0, 0.0, spec.min_energy().value(), spec.max_energy().value())
            })
            .collect();
        variables.soc.insert(id.clone(), soc);
    }

    let import_max = scenario
        .import_limit
        .map_or(f64::INFINITY, |limit| limit.value());
    variables.import = (0..steps)
        .map(|t| problem.add_column(import_price(scenario, t).value(), 0.0, 0.0, import_max))
        .collect();

    // Export earns the configured credit, or nothing (a free dump) by default
    let export_coeff = scenario.export_price.map_or(0.0, |credit| -credit.value());
    variables.export = (0..steps)
        .map(|_| problem.add_column(export_coeff, 0.0, 0.0, f64::INFINITY))
        .collect();

    if let Some(forecast) = &scenario.pv {
        let vars = (0..steps)
            .map(|t| problem.add_column(0.0, 0.0, 0.0, forecast[t].value()))
            .collect();
        variables.pv = Some(vars);
    }

    problem.add_offset(scenario.fixed_cost.value());

    variables
}

/// Re-evaluate the formulated objective from an extracted schedule.
///
/// Uses exactly the coefficient rules of [`formulate`] (including tie-break epsilons and storage
/// flow penalties), so the result must agree with the solver's objective for a correct
/// extraction. The schedule extractor relies on this for its round-trip consistency check.
pub(crate) fn evaluate_objective(scenario: &Scenario, schedule: &Schedule) -> Money {
    let tie_breaks = tie_break_offsets(scenario);
    let mut total = scenario.fixed_cost.value();

    for (id, spec) in &scenario.generators {
        for output in &schedule.generators[id] {
            total += spec.cost.cost(*output).value() + tie_breaks[id] * output.value();
        }
    }

    for (id, spec) in &scenario.storage {
        let unit = &schedule.storage[id];
        for t in scenario.time.iter() {
            total += spec.aging_cost.value() * unit.discharge[t].value()
                + STORAGE_FLOW_PENALTY * (unit.charge[t].value() + unit.discharge[t].value());
        }
    }

    for t in scenario.time.iter() {
        total += import_price(scenario, t).value() * schedule.grid_import[t].value();
        if let Some(credit) = scenario.export_price {
            total -= credit.value() * schedule.grid_export[t].value();
        }
    }

    Money(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::fixture::{scenario, scenario_with_storage};
    use crate::units::Power;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_formulate_dimensions(scenario_with_storage: Scenario) {
        // 1 generator, 1 storage unit, PV series, T = 4
        let dispatch = formulate(&scenario_with_storage).unwrap();

        // gen (4) + charge/discharge/soc (12) + import/export (8) + pv (4)
        assert_eq!(dispatch.problem.num_columns(), 28);
        // balance (4) + ramp (3) + soc dynamics (4) + storage power (4)
        assert_eq!(dispatch.problem.num_rows(), 15);
    }

    #[rstest]
    fn test_formulate_trivial_scenario(mut scenario: Scenario) {
        // No generators and no storage must still formulate; the grid covers demand
        scenario.generators.clear();
        let dispatch = formulate(&scenario).unwrap();
        assert_eq!(dispatch.problem.num_columns(), 2 * scenario.time.steps);
        assert_eq!(dispatch.problem.num_rows(), scenario.time.steps);
    }

    #[rstest]
    fn test_formulate_rejects_invalid_scenario(mut scenario: Scenario) {
        scenario.generators[0].p_min = Power(400.0);
        let err = formulate(&scenario).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[rstest]
    fn test_tie_break_offsets(mut scenario: Scenario) {
        // Add a twin of the first unit and one distinct unit
        let mut twin = scenario.generators[0].clone();
        twin.id = "gt2".into();
        let mut other = scenario.generators[0].clone();
        other.id = "gt3".into();
        other.p_max = Power(500.0);
        scenario.generators.insert(twin.id.clone(), twin);
        scenario.generators.insert(other.id.clone(), other);

        let offsets = tie_break_offsets(&scenario);
        assert_approx_eq!(f64, offsets["gt1"], 0.0);
        assert_approx_eq!(f64, offsets["gt2"], TIE_BREAK_STEP);
        assert_approx_eq!(f64, offsets["gt3"], 0.0);
    }

    #[rstest]
    fn test_import_price_default(scenario: Scenario) {
        assert_eq!(import_price(&scenario, 0), DEFAULT_IMPORT_PRICE);
    }

    #[rstest]
    fn test_import_price_series(mut scenario: Scenario) {
        scenario.price = Some(vec![MoneyPerPower(50.0); scenario.time.steps]);
        assert_eq!(import_price(&scenario, 2), MoneyPerPower(50.0));
    }
}
