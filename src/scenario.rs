//! The parameter model describing a single dispatch problem instance.
//!
//! A [`Scenario`] is constructed once (by the input layer or an upstream collaborator), validated
//! on receipt and owned read-only by the formulator. It carries the time grid, the demand/PV/price
//! series and the per-unit specs for generators and storage.
use crate::error::{DispatchError, DispatchResult};
use crate::id::define_id_type;
use crate::units::{Dimensionless, Energy, Hours, Money, MoneyPerPower, Power};
use indexmap::IndexMap;

define_id_type! {GeneratorID}
define_id_type! {StorageID}

/// The default interval length (15 minutes)
pub const DEFAULT_INTERVAL: Hours = Hours(0.25);

/// The discretised time horizon: `steps` equal intervals of length `interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeGrid {
    /// Number of intervals in the horizon
    pub steps: usize,
    /// Length of one interval in hours
    pub interval: Hours,
}

impl TimeGrid {
    /// Create a time grid with the given number of steps and interval length
    pub fn new(steps: usize, interval: Hours) -> Self {
        Self { steps, interval }
    }

    /// Iterate over the interval indices 0..T-1
    pub fn iter(&self) -> std::ops::Range<usize> {
        0..self.steps
    }
}

/// The per-interval production cost of a generator.
///
/// The two forms are mutually exclusive: raw inputs with both `a` and `b` zero and a nonzero
/// cost-per-MW rate resolve to the linear form (see [`CostCurve::from_coefficients`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CostCurve {
    /// cost(P) = a·P² + b·P + c per interval
    Quadratic {
        /// Quadratic coefficient (must be non-negative so the objective stays convex)
        a: f64,
        /// Linear coefficient
        b: f64,
        /// Constant cost incurred every interval
        c: f64,
    },
    /// cost(P) = rate·P per interval
    Linear(MoneyPerPower),
}

impl CostCurve {
    /// Resolve raw cost inputs into a cost curve.
    ///
    /// The quadratic form wins whenever `a` or `b` is nonzero; otherwise a supplied cost-per-MW
    /// rate is authoritative.
    pub fn from_coefficients(a: f64, b: f64, c: f64, cost_per_mw: Option<f64>) -> Self {
        if a == 0.0 && b == 0.0 {
            if let Some(rate) = cost_per_mw {
                return Self::Linear(MoneyPerPower(rate));
            }
        }

        Self::Quadratic { a, b, c }
    }

    /// Evaluate the cost of producing `output` for one interval
    pub fn cost(&self, output: Power) -> Money {
        let p = output.value();
        match *self {
            Self::Quadratic { a, b, c } => Money(a * p * p + b * p + c),
            Self::Linear(rate) => rate * output,
        }
    }

    /// The coefficient on P² in the objective
    pub(crate) fn quadratic_coefficient(&self) -> f64 {
        match *self {
            Self::Quadratic { a, .. } => a,
            Self::Linear(_) => 0.0,
        }
    }

    /// The coefficient on P in the objective
    pub(crate) fn linear_coefficient(&self) -> f64 {
        match *self {
            Self::Quadratic { b, .. } => b,
            Self::Linear(rate) => rate.value(),
        }
    }

    /// The constant cost incurred every interval regardless of output
    pub(crate) fn constant(&self) -> Money {
        match *self {
            Self::Quadratic { c, .. } => Money(c),
            Self::Linear(_) => Money(0.0),
        }
    }
}

/// The immutable description of a controllable generating unit.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSpec {
    /// Unique name of the unit
    pub id: GeneratorID,
    /// Production cost per interval
    pub cost: CostCurve,
    /// Minimum output while dispatched (MW)
    pub p_min: Power,
    /// Maximum output (MW)
    pub p_max: Power,
    /// Bound on |P(t) - P(t-1)| for t > 0 (MW per interval); `None` means unconstrained
    pub ramp: Option<Power>,
}

impl GeneratorSpec {
    /// Whether two units are interchangeable (identical specs apart from the name).
    ///
    /// Used for symmetry breaking: identical units need a deterministic fill order.
    pub(crate) fn same_unit_type(&self, other: &Self) -> bool {
        self.cost == other.cost
            && self.p_min == other.p_min
            && self.p_max == other.p_max
            && self.ramp == other.ramp
    }
}

/// The immutable description of an energy storage unit.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSpec {
    /// Unique name of the unit
    pub id: StorageID,
    /// Energy capacity (MWh)
    pub capacity: Energy,
    /// Power rating shared between charging and discharging (MW)
    pub max_power: Power,
    /// Round-trip efficiency η ∈ (0, 1], applied asymmetrically: charging multiplies by η,
    /// discharging divides by η
    pub efficiency: Dimensionless,
    /// Minimum state of charge as a fraction of capacity
    pub min_soc: Dimensionless,
    /// Maximum state of charge as a fraction of capacity
    pub max_soc: Dimensionless,
    /// State of charge at the start of the horizon, as a fraction of capacity
    pub initial_soc: Dimensionless,
    /// Degradation cost per MW discharged per interval
    pub aging_cost: MoneyPerPower,
}

impl StorageSpec {
    /// The lowest permitted stored energy (MWh)
    pub fn min_energy(&self) -> Energy {
        self.capacity * self.min_soc
    }

    /// The highest permitted stored energy (MWh)
    pub fn max_energy(&self) -> Energy {
        self.capacity * self.max_soc
    }

    /// The stored energy at the start of the horizon (MWh)
    pub fn initial_energy(&self) -> Energy {
        self.capacity * self.initial_soc
    }
}

/// A complete, immutable problem instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// The time horizon
    pub time: TimeGrid,
    /// Net load the dispatch must satisfy, per interval (MW)
    pub demand: Vec<Power>,
    /// PV forecast per interval (MW), if PV is modelled as a curtailable variable
    pub pv: Option<Vec<Power>>,
    /// Grid import price per interval; when absent, [`crate::dispatch::DEFAULT_IMPORT_PRICE`]
    /// applies so the grid acts as an expensive backstop
    pub price: Option<Vec<MoneyPerPower>>,
    /// Optional cap on grid import (MW); `None` means the grid is an unlimited slack source
    pub import_limit: Option<Power>,
    /// Credit received per MW exported; `None` means export is an uncompensated dump
    pub export_price: Option<MoneyPerPower>,
    /// Controllable generating units, keyed by name (insertion order is preserved and determines
    /// variable ordering)
    pub generators: IndexMap<GeneratorID, GeneratorSpec>,
    /// Storage units, keyed by name
    pub storage: IndexMap<StorageID, StorageSpec>,
    /// Fixed recurring cost added once to the objective regardless of dispatch
    pub fixed_cost: Money,
}

impl Scenario {
    /// Check every invariant of the parameter model.
    ///
    /// All violations are collected and reported together rather than stopping at the first one.
    pub fn validate(&self) -> DispatchResult<()> {
        let mut violations = Vec::new();

        if self.time.steps == 0 {
            violations.push("time grid must have at least one interval".to_string());
        }
        if self.time.interval.value() <= 0.0 {
            violations.push(format!(
                "interval length must be positive (got {} h)",
                self.time.interval.value()
            ));
        }

        self.check_series_length(&mut violations, "demand", Some(self.demand.len()));
        self.check_series_length(&mut violations, "pv", self.pv.as_ref().map(Vec::len));
        self.check_series_length(&mut violations, "price", self.price.as_ref().map(Vec::len));

        if let Some(pv) = &self.pv {
            if pv.iter().any(|p| p.value() < 0.0) {
                violations.push("pv forecast values must be non-negative".to_string());
            }
        }
        if let Some(limit) = self.import_limit {
            if limit.value() < 0.0 {
                violations.push("import limit must be non-negative".to_string());
            }
        }

        for (id, spec) in &self.generators {
            check_generator(&mut violations, id, spec);
        }
        for (id, spec) in &self.storage {
            check_storage(&mut violations, id, spec);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::Validation(violations))
        }
    }

    fn check_series_length(&self, violations: &mut Vec<String>, name: &str, len: Option<usize>) {
        if let Some(len) = len {
            if len != self.time.steps {
                violations.push(format!(
                    "{name} series has length {len} but the time grid has {} intervals",
                    self.time.steps
                ));
            }
        }
    }
}

fn check_generator(violations: &mut Vec<String>, id: &GeneratorID, spec: &GeneratorSpec) {
    if spec.id != *id {
        violations.push(format!("generator {id}: spec is keyed under the wrong name"));
    }
    if spec.p_min.value() < 0.0 {
        violations.push(format!("generator {id}: p_min must be non-negative"));
    }
    if spec.p_min > spec.p_max {
        violations.push(format!(
            "generator {id}: p_min ({}) exceeds p_max ({})",
            spec.p_min.value(),
            spec.p_max.value()
        ));
    }
    if let Some(ramp) = spec.ramp {
        if ramp.value() < 0.0 {
            violations.push(format!("generator {id}: ramp limit must be non-negative"));
        }
    }
    if spec.cost.quadratic_coefficient() < 0.0 {
        violations.push(format!(
            "generator {id}: quadratic cost coefficient must be non-negative"
        ));
    }
}

fn check_storage(violations: &mut Vec<String>, id: &StorageID, spec: &StorageSpec) {
    if spec.id != *id {
        violations.push(format!("storage {id}: spec is keyed under the wrong name"));
    }
    if spec.capacity.value() <= 0.0 {
        violations.push(format!("storage {id}: capacity must be positive"));
    }
    if spec.max_power.value() < 0.0 {
        violations.push(format!("storage {id}: max power must be non-negative"));
    }
    let eta = spec.efficiency.value();
    if !(eta > 0.0 && eta <= 1.0) {
        violations.push(format!(
            "storage {id}: efficiency must be in (0, 1] (got {eta})"
        ));
    }
    for (name, frac) in [
        ("min_soc", spec.min_soc),
        ("max_soc", spec.max_soc),
        ("initial_soc", spec.initial_soc),
    ] {
        if !(0.0..=1.0).contains(&frac.value()) {
            violations.push(format!("storage {id}: {name} must be between 0 and 1"));
        }
    }
    if spec.min_soc > spec.max_soc {
        violations.push(format!(
            "storage {id}: min_soc ({}) exceeds max_soc ({})",
            spec.min_soc.value(),
            spec.max_soc.value()
        ));
    }
    if spec.initial_soc < spec.min_soc || spec.initial_soc > spec.max_soc {
        violations.push(format!(
            "storage {id}: initial_soc must lie within [min_soc, max_soc]"
        ));
    }
    if spec.aging_cost.value() < 0.0 {
        violations.push(format!("storage {id}: aging cost must be non-negative"));
    }
}
