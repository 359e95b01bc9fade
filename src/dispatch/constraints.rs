//! Code for adding constraints to the dispatch optimisation problem.
use super::VariableMap;
use crate::scenario::Scenario;
use crate::solver::Problem;

/// Add every constraint family for the dispatch model.
pub(super) fn add_dispatch_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    scenario: &Scenario,
) {
    add_power_balance_constraints(problem, variables, scenario);
    add_ramp_constraints(problem, variables, scenario);
    add_soc_dynamics_constraints(problem, variables, scenario);
    add_storage_power_constraints(problem, variables, scenario);
}

/// Add the supply-equals-demand equality for every interval.
///
/// This is the single constraint that couples every variable family: grid import, generator
/// output, storage discharge and PV supply the net demand plus storage charge plus grid export.
fn add_power_balance_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    scenario: &Scenario,
) {
    let mut terms = Vec::new();
    for t in scenario.time.iter() {
        terms.push((variables.import[t], 1.0));
        terms.push((variables.export[t], -1.0));
        for vars in variables.generators.values() {
            terms.push((vars[t], 1.0));
        }
        for vars in variables.discharge.values() {
            terms.push((vars[t], 1.0));
        }
        for vars in variables.charge.values() {
            terms.push((vars[t], -1.0));
        }
        if let Some(pv) = &variables.pv {
            terms.push((pv[t], 1.0));
        }

        let demand = scenario.demand[t].value();
        problem.add_row(demand, demand, terms.drain(..));
    }
}

/// Bound the change in each generator's output between consecutive intervals.
///
/// The initial dispatch (t = 0) is free; only transitions are constrained.
fn add_ramp_constraints(problem: &mut Problem, variables: &VariableMap, scenario: &Scenario) {
    for (id, spec) in &scenario.generators {
        let Some(ramp) = spec.ramp else {
            continue;
        };

        let vars = &variables.generators[id];
        for t in 1..scenario.time.steps {
            problem.add_row(
                -ramp.value(),
                ramp.value(),
                [(vars[t], 1.0), (vars[t - 1], -1.0)],
            );
        }
    }
}

/// Add the recursive state-of-charge dynamics for every storage unit.
///
/// SOC(t) = SOC(t-1) + (η·charge − discharge/η)·Δt, with SOC(-1) replaced by the configured
/// initial energy. Efficiency is asymmetric: charging is derated, discharging draws extra.
fn add_soc_dynamics_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    scenario: &Scenario,
) {
    let dt = scenario.time.interval.value();
    for (id, spec) in &scenario.storage {
        let eta = spec.efficiency.value();
        let charge_factor = eta * dt;
        let discharge_factor = dt / eta;

        let soc = &variables.soc[id];
        let charge = &variables.charge[id];
        let discharge = &variables.discharge[id];

        for t in scenario.time.iter() {
            let mut terms = vec![
                (soc[t], 1.0),
                (charge[t], -charge_factor),
                (discharge[t], discharge_factor),
            ];
            let rhs = if t == 0 {
                spec.initial_energy().value()
            } else {
                terms.push((soc[t - 1], -1.0));
                0.0
            };
            problem.add_row(rhs, rhs, terms);
        }
    }
}

/// Enforce the shared power rating: charge + discharge may not exceed the unit's max power.
///
/// The inequality alone would still admit simultaneous nonzero charge and discharge; the small
/// objective penalty on both directions (see [`super`]) rules that out at the optimum.
fn add_storage_power_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    scenario: &Scenario,
) {
    for (id, spec) in &scenario.storage {
        let charge = &variables.charge[id];
        let discharge = &variables.discharge[id];
        for t in scenario.time.iter() {
            problem.add_row(
                f64::NEG_INFINITY,
                spec.max_power.value(),
                [(charge[t], 1.0), (discharge[t], 1.0)],
            );
        }
    }
}
