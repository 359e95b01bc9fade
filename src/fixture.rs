//! Fixtures for testing.
use crate::scenario::{
    CostCurve, DEFAULT_INTERVAL, GeneratorSpec, Scenario, StorageSpec, TimeGrid,
};
use crate::units::{Dimensionless, Energy, Money, MoneyPerPower, Power};
use indexmap::IndexMap;
use rstest::fixture;

/// A gas turbine with a quadratic cost curve and a ramp limit
#[fixture]
pub fn generator() -> GeneratorSpec {
    GeneratorSpec {
        id: "gt1".into(),
        cost: CostCurve::Quadratic {
            a: 0.001,
            b: 0.5,
            c: 3.0,
        },
        p_min: Power(50.0),
        p_max: Power(300.0),
        ramp: Some(Power(100.0)),
    }
}

/// A battery with asymmetric efficiency and an aging cost
#[fixture]
pub fn storage() -> StorageSpec {
    StorageSpec {
        id: "bess1".into(),
        capacity: Energy(100.0),
        max_power: Power(25.0),
        efficiency: Dimensionless(0.9),
        min_soc: Dimensionless(0.1),
        max_soc: Dimensionless(0.9),
        initial_soc: Dimensionless(0.5),
        aging_cost: MoneyPerPower(2.0),
    }
}

/// A four-interval scenario with flat demand and a single generator
#[fixture]
pub fn scenario(generator: GeneratorSpec) -> Scenario {
    Scenario {
        time: TimeGrid::new(4, DEFAULT_INTERVAL),
        demand: vec![Power(200.0); 4],
        pv: None,
        price: None,
        import_limit: None,
        export_price: None,
        generators: IndexMap::from([(generator.id.clone(), generator)]),
        storage: IndexMap::new(),
        fixed_cost: Money(0.0),
    }
}

/// The base scenario extended with a battery and a PV forecast
#[fixture]
pub fn scenario_with_storage(mut scenario: Scenario, storage: StorageSpec) -> Scenario {
    scenario.storage.insert(storage.id.clone(), storage);
    scenario.pv = Some(vec![Power(20.0); 4]);
    scenario
}
