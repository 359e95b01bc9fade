//! The dispatch loop: formulate, solve, extract, and revise on infeasibility.
use crate::dispatch::formulate;
use crate::error::{DispatchError, DispatchResult};
use crate::scenario::Scenario;
use crate::schedule::{Schedule, extract_schedule};
use crate::settings::Settings;
use crate::solver::SolveQp;
use log::{info, warn};

/// A collaborator that can propose a relaxed scenario after an infeasible solve.
///
/// The loop never invents relaxations itself; how to trade off constraints is a policy decision
/// that belongs to the caller. Returning `None` means no further relaxation is available and the
/// infeasibility is final.
pub trait ScenarioReviser {
    /// Propose a revised scenario, given the one that just proved infeasible.
    ///
    /// `attempt` is the revision number, starting at 1.
    fn revise(&mut self, scenario: &Scenario, attempt: u32) -> Option<Scenario>;
}

/// A reviser that never revises: the first infeasibility is final.
pub struct NoRevision;

impl ScenarioReviser for NoRevision {
    fn revise(&mut self, _scenario: &Scenario, _attempt: u32) -> Option<Scenario> {
        None
    }
}

/// Run the dispatch loop for one scenario.
///
/// Each iteration formulates and solves the current scenario. An optimal solve yields the
/// extracted [`Schedule`]; an infeasible one hands the scenario to the reviser and retries, up to
/// `settings.max_revisions` times. Every other solver outcome aborts immediately; retrying cannot
/// fix an unbounded problem or numerical failure.
pub fn run(
    mut scenario: Scenario,
    solver: &dyn SolveQp,
    reviser: &mut dyn ScenarioReviser,
    settings: &Settings,
) -> DispatchResult<Schedule> {
    let mut attempt = 0;

    loop {
        let dispatch = formulate(&scenario)?;
        match solver.solve(&dispatch.problem, settings.solver_time_limit()) {
            Ok(solution) => {
                let schedule = extract_schedule(&scenario, &dispatch.variables, &solution)?;
                info!(
                    "Dispatch solved after {attempt} revision(s); objective = {}",
                    schedule.objective.value()
                );
                return Ok(schedule);
            }
            Err(err @ DispatchError::Infeasible { .. }) => {
                attempt += 1;
                if attempt > settings.max_revisions {
                    warn!("Scenario still infeasible after {} revisions", attempt - 1);
                    return Err(err);
                }

                warn!("Scenario infeasible; requesting revision {attempt}");
                match reviser.revise(&scenario, attempt) {
                    Some(revised) => scenario = revised,
                    None => {
                        info!("No revision available; reporting infeasibility");
                        return Err(err);
                    }
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::scenario;
    use crate::solver::ClarabelSolver;
    use crate::units::Power;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// An infeasible scenario: demand with no units and a zero import limit
    fn choked_scenario(scenario: &Scenario) -> Scenario {
        let mut scenario = scenario.clone();
        scenario.generators.clear();
        scenario.import_limit = Some(Power(0.0));
        scenario
    }

    /// A reviser that lifts the import limit and counts how often it was asked
    struct LiftImportLimit {
        calls: u32,
    }

    impl ScenarioReviser for LiftImportLimit {
        fn revise(&mut self, scenario: &Scenario, _attempt: u32) -> Option<Scenario> {
            self.calls += 1;
            let mut revised = scenario.clone();
            revised.import_limit = None;
            Some(revised)
        }
    }

    /// A reviser that returns the scenario unchanged, so it stays infeasible
    struct FutileRevision {
        calls: u32,
    }

    impl ScenarioReviser for FutileRevision {
        fn revise(&mut self, scenario: &Scenario, _attempt: u32) -> Option<Scenario> {
            self.calls += 1;
            Some(scenario.clone())
        }
    }

    #[rstest]
    fn test_run_solves_feasible_scenario(scenario: Scenario) {
        let schedule = run(
            scenario,
            &ClarabelSolver,
            &mut NoRevision,
            &Settings::default(),
        )
        .unwrap();

        // Demand of 200 MW is met by the generator alone at 143/interval plus the constant
        assert_approx_eq!(f64, schedule.objective.value(), 572.0, epsilon = 0.1);
    }

    #[rstest]
    fn test_run_revises_infeasible_scenario(scenario: Scenario) {
        let choked = choked_scenario(&scenario);
        let mut reviser = LiftImportLimit { calls: 0 };

        let schedule = run(choked, &ClarabelSolver, &mut reviser, &Settings::default()).unwrap();
        assert_eq!(reviser.calls, 1);
        assert_approx_eq!(f64, schedule.grid_import[0].value(), 200.0, epsilon = 1e-4);
    }

    #[rstest]
    fn test_run_without_reviser_fails_fast(scenario: Scenario) {
        let choked = choked_scenario(&scenario);
        let err = run(
            choked,
            &ClarabelSolver,
            &mut NoRevision,
            &Settings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::Infeasible { .. }));
    }

    #[rstest]
    fn test_run_respects_revision_budget(scenario: Scenario) {
        let choked = choked_scenario(&scenario);
        let mut reviser = FutileRevision { calls: 0 };
        let settings = Settings {
            max_revisions: 2,
            ..Settings::default()
        };

        let err = run(choked, &ClarabelSolver, &mut reviser, &settings).unwrap_err();
        assert!(matches!(err, DispatchError::Infeasible { .. }));
        assert_eq!(reviser.calls, 2);
    }
}
