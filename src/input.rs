//! Code for reading a scenario from a TOML file.
//!
//! The on-disk representation uses plain numbers; conversion into the typed parameter model
//! happens here, including resolving raw cost coefficients into a [`CostCurve`] and validating the
//! result before anyone downstream sees it.
use crate::scenario::{
    CostCurve, DEFAULT_INTERVAL, GeneratorSpec, Scenario, StorageSpec, TimeGrid,
};
use crate::units::{Dimensionless, Energy, Hours, Money, MoneyPerPower, Power};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    time: TimeRaw,
    demand: Vec<f64>,
    pv: Option<Vec<f64>>,
    price: Option<Vec<f64>>,
    import_limit: Option<f64>,
    export_price: Option<f64>,
    #[serde(default)]
    fixed_cost: f64,
    #[serde(default)]
    generators: Vec<GeneratorRaw>,
    #[serde(default)]
    storage: Vec<StorageRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimeRaw {
    steps: usize,
    interval_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GeneratorRaw {
    id: String,
    #[serde(default)]
    a: f64,
    #[serde(default)]
    b: f64,
    #[serde(default)]
    c: f64,
    cost_per_mw: Option<f64>,
    p_min: f64,
    p_max: f64,
    ramp: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StorageRaw {
    id: String,
    capacity: f64,
    max_power: f64,
    efficiency: f64,
    min_soc: f64,
    max_soc: f64,
    initial_soc: f64,
    #[serde(default)]
    aging_cost: f64,
}

/// Read and validate a scenario from the given TOML file.
pub fn read_scenario(path: &Path) -> Result<Scenario> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let raw: ScenarioFile = toml::from_str(&contents)
        .with_context(|| format!("Could not parse {}", path.display()))?;

    let scenario = convert_scenario(raw)?;
    scenario
        .validate()
        .with_context(|| format!("Invalid scenario in {}", path.display()))?;

    Ok(scenario)
}

fn convert_scenario(raw: ScenarioFile) -> Result<Scenario> {
    let mut generators = IndexMap::new();
    for generator in raw.generators {
        let spec = GeneratorSpec {
            id: generator.id.as_str().into(),
            cost: CostCurve::from_coefficients(
                generator.a,
                generator.b,
                generator.c,
                generator.cost_per_mw,
            ),
            p_min: Power(generator.p_min),
            p_max: Power(generator.p_max),
            ramp: generator.ramp.map(Power),
        };
        ensure!(
            generators.insert(spec.id.clone(), spec).is_none(),
            "Duplicate generator id: {}",
            generator.id
        );
    }

    let mut storage = IndexMap::new();
    for unit in raw.storage {
        let spec = StorageSpec {
            id: unit.id.as_str().into(),
            capacity: Energy(unit.capacity),
            max_power: Power(unit.max_power),
            efficiency: Dimensionless(unit.efficiency),
            min_soc: Dimensionless(unit.min_soc),
            max_soc: Dimensionless(unit.max_soc),
            initial_soc: Dimensionless(unit.initial_soc),
            aging_cost: MoneyPerPower(unit.aging_cost),
        };
        ensure!(
            storage.insert(spec.id.clone(), spec).is_none(),
            "Duplicate storage id: {}",
            unit.id
        );
    }

    let interval = raw.time.interval_hours.map_or(DEFAULT_INTERVAL, Hours);
    Ok(Scenario {
        time: TimeGrid::new(raw.time.steps, interval),
        demand: raw.demand.into_iter().map(Power).collect(),
        pv: raw.pv.map(|series| series.into_iter().map(Power).collect()),
        price: raw
            .price
            .map(|series| series.into_iter().map(MoneyPerPower).collect()),
        import_limit: raw.import_limit.map(Power),
        export_price: raw.export_price.map(MoneyPerPower),
        generators,
        storage,
        fixed_cost: Money(raw.fixed_cost),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const SCENARIO_TOML: &str = r#"
        demand = [200.0, 200.0]
        pv = [0.0, 10.0]

        [time]
        steps = 2

        [[generators]]
        id = "gt1"
        a = 0.001
        b = 0.5
        c = 3.0
        p_min = 50.0
        p_max = 300.0
        ramp = 100.0

        [[storage]]
        id = "bess1"
        capacity = 100.0
        max_power = 25.0
        efficiency = 0.9
        min_soc = 0.1
        max_soc = 0.9
        initial_soc = 0.5
        aging_cost = 2.0
    "#;

    fn write_scenario(dir: &Path, contents: &str) -> std::path::PathBuf {
        let path = dir.join("scenario.toml");
        let mut file = File::create(&path).unwrap();
        write!(file, "{contents}").unwrap();
        path
    }

    #[test]
    fn test_read_scenario() {
        let dir = tempdir().unwrap();
        let path = write_scenario(dir.path(), SCENARIO_TOML);

        let scenario = read_scenario(&path).unwrap();
        assert_eq!(scenario.time.steps, 2);
        assert_eq!(scenario.time.interval, DEFAULT_INTERVAL);
        assert_eq!(scenario.demand, vec![Power(200.0); 2]);
        assert_eq!(scenario.generators.len(), 1);
        assert_eq!(
            scenario.generators["gt1"].cost,
            CostCurve::Quadratic {
                a: 0.001,
                b: 0.5,
                c: 3.0
            }
        );
        assert_eq!(scenario.storage["bess1"].max_power, Power(25.0));
    }

    #[test]
    fn test_read_scenario_resolves_linear_cost() {
        let dir = tempdir().unwrap();
        let contents = r#"
            demand = [100.0]

            [time]
            steps = 1

            [[generators]]
            id = "gt1"
            cost_per_mw = 60.0
            p_min = 0.0
            p_max = 300.0
        "#;
        let path = write_scenario(dir.path(), contents);

        let scenario = read_scenario(&path).unwrap();
        assert_eq!(
            scenario.generators["gt1"].cost,
            CostCurve::Linear(MoneyPerPower(60.0))
        );
        assert_eq!(scenario.generators["gt1"].ramp, None);
    }

    #[test]
    fn test_read_scenario_rejects_duplicate_ids() {
        let dir = tempdir().unwrap();
        let contents = r#"
            demand = [100.0]

            [time]
            steps = 1

            [[generators]]
            id = "gt1"
            p_min = 0.0
            p_max = 300.0

            [[generators]]
            id = "gt1"
            p_min = 0.0
            p_max = 300.0
        "#;
        let path = write_scenario(dir.path(), contents);

        assert!(read_scenario(&path).is_err());
    }

    #[test]
    fn test_read_scenario_rejects_invalid_model() {
        let dir = tempdir().unwrap();
        let contents = r#"
            demand = [100.0, 100.0]

            [time]
            steps = 1
        "#;
        let path = write_scenario(dir.path(), contents);

        assert!(read_scenario(&path).is_err());
    }
}
