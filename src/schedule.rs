//! The time-indexed schedule assembled from a solved dispatch problem.
//!
//! Extraction is deliberately paranoid: the objective is re-derived from the extracted series
//! with the formulator's own cost rules and compared against the solver's reported value, and net
//! grid exchange is recomputed as import minus export rather than assuming either side is zero.
//! A disagreement means an extraction bug and is surfaced, never swallowed.
use crate::dispatch::{VariableMap, evaluate_objective};
use crate::error::{DispatchError, DispatchResult};
use crate::scenario::{GeneratorID, Scenario, StorageID};
use crate::solver::{Solution, TerminationStatus, Variable};
use crate::units::{Energy, Money, Power};
use indexmap::IndexMap;
use itertools::izip;

/// Relative tolerance for the objective round-trip check
const OBJECTIVE_TOLERANCE: f64 = 1e-3;

/// The solved charge/discharge/SOC trajectory of one storage unit.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSchedule {
    /// Charging power per interval (MW)
    pub charge: Vec<Power>,
    /// Discharging power per interval (MW)
    pub discharge: Vec<Power>,
    /// State of charge at the end of each interval (MWh)
    pub soc: Vec<Energy>,
}

/// A complete dispatch schedule for one scenario.
///
/// Constructed once by [`extract_schedule`] and immutable thereafter; downstream reporting owns
/// it read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// The objective value reported by the solver
    pub objective: Money,
    /// The solver's termination status
    pub status: TerminationStatus,
    /// Output series per generator (MW)
    pub generators: IndexMap<GeneratorID, Vec<Power>>,
    /// Charge/discharge/SOC series per storage unit
    pub storage: IndexMap<StorageID, StorageSchedule>,
    /// Grid import per interval (MW)
    pub grid_import: Vec<Power>,
    /// Grid export per interval (MW)
    pub grid_export: Vec<Power>,
    /// Net grid exchange per interval: import minus export (MW)
    pub grid_net: Vec<Power>,
    /// PV output per interval (MW), when PV was modelled as a variable
    pub pv: Option<Vec<Power>>,
}

/// Assemble the schedule from solved variable values and verify its consistency.
pub fn extract_schedule(
    scenario: &Scenario,
    variables: &VariableMap,
    solution: &Solution,
) -> DispatchResult<Schedule> {
    let power_series =
        |vars: &[Variable]| -> Vec<Power> { vars.iter().map(|v| Power(value_of(solution, v))).collect() };

    let generators = variables
        .generators
        .iter()
        .map(|(id, vars)| (id.clone(), power_series(vars)))
        .collect();

    let storage = variables
        .soc
        .keys()
        .map(|id| {
            let unit = StorageSchedule {
                charge: power_series(&variables.charge[id]),
                discharge: power_series(&variables.discharge[id]),
                soc: variables.soc[id]
                    .iter()
                    .map(|v| Energy(value_of(solution, v)))
                    .collect(),
            };
            (id.clone(), unit)
        })
        .collect();

    let grid_import = power_series(&variables.import);
    let grid_export = power_series(&variables.export);
    let grid_net = izip!(&grid_import, &grid_export)
        .map(|(import, export)| *import - *export)
        .collect();

    let schedule = Schedule {
        objective: Money(solution.objective),
        status: solution.status,
        generators,
        storage,
        grid_import,
        grid_export,
        grid_net,
        pv: variables.pv.as_ref().map(|vars| power_series(vars)),
    };

    check_objective_round_trip(scenario, &schedule)?;
    Ok(schedule)
}

/// Read one variable's value out of the solution
fn value_of(solution: &Solution, var: &Variable) -> f64 {
    solution.values[var.index()]
}

/// Re-derive the objective from the extracted series and compare with the solver's value
fn check_objective_round_trip(scenario: &Scenario, schedule: &Schedule) -> DispatchResult<()> {
    let recomputed = evaluate_objective(scenario, schedule).value();
    let reported = schedule.objective.value();

    let tolerance = OBJECTIVE_TOLERANCE * reported.abs().max(1.0);
    if (recomputed - reported).abs() > tolerance {
        return Err(DispatchError::ExtractionMismatch(format!(
            "objective recomputed from schedule is {recomputed} but the solver reported {reported}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DEFAULT_IMPORT_PRICE, formulate};
    use crate::fixture::scenario;
    use crate::scenario::Scenario;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// A scenario with only the grid: import columns come first, then export
    fn grid_only(scenario: &Scenario) -> Scenario {
        let mut scenario = scenario.clone();
        scenario.generators.clear();
        scenario
    }

    fn fake_solution(import: f64, export: f64, steps: usize) -> Solution {
        let mut values = vec![import; steps];
        values.extend(vec![export; steps]);
        Solution {
            status: TerminationStatus::Optimal,
            values,
            objective: DEFAULT_IMPORT_PRICE.value() * import * steps as f64,
        }
    }

    #[rstest]
    fn test_extract_grid_series(scenario: Scenario) {
        let scenario = grid_only(&scenario);
        let steps = scenario.time.steps;
        let dispatch = formulate(&scenario).unwrap();
        let solution = fake_solution(200.0, 0.0, steps);

        let schedule = extract_schedule(&scenario, &dispatch.variables, &solution).unwrap();
        assert_eq!(schedule.grid_import, vec![Power(200.0); steps]);
        assert_eq!(schedule.grid_net, vec![Power(200.0); steps]);
        assert!(schedule.storage.is_empty());
    }

    #[rstest]
    fn test_net_grid_subtracts_export(scenario: Scenario) {
        let scenario = grid_only(&scenario);
        let steps = scenario.time.steps;
        let dispatch = formulate(&scenario).unwrap();
        let solution = fake_solution(5.0, 3.0, steps);

        let schedule = extract_schedule(&scenario, &dispatch.variables, &solution).unwrap();
        for net in &schedule.grid_net {
            assert_approx_eq!(f64, net.value(), 2.0);
        }
    }

    #[rstest]
    fn test_objective_mismatch_is_surfaced(scenario: Scenario) {
        let scenario = grid_only(&scenario);
        let dispatch = formulate(&scenario).unwrap();
        let mut solution = fake_solution(200.0, 0.0, scenario.time.steps);
        solution.objective *= 1.5; // corrupt the reported objective

        let err = extract_schedule(&scenario, &dispatch.variables, &solution).unwrap_err();
        assert!(matches!(err, DispatchError::ExtractionMismatch(_)));
    }
}
