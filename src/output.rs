//! The module responsible for writing schedule data to disk.
use crate::scenario::{GeneratorID, StorageID};
use crate::schedule::Schedule;
use anyhow::{Context, Result};
use csv;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The root folder in which scenario-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "gridplan_results";

/// The output file name for generator dispatch
const GENERATION_FILE_NAME: &str = "generation.csv";

/// The output file name for storage trajectories
const STORAGE_FILE_NAME: &str = "storage.csv";

/// The output file name for grid exchange and PV
const GRID_FILE_NAME: &str = "grid.csv";

/// Get the default output directory for the scenario at the given path
pub fn get_output_dir(scenario_path: &Path) -> Result<PathBuf> {
    let scenario_name = scenario_path
        .file_stem()
        .context("Scenario path has no file name")?
        .to_str()
        .context("Invalid chars in scenario file name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, scenario_name].iter().collect())
}

/// Create the output directory, with parents, if it does not already exist.
pub fn create_output_directory(output_dir: &Path) -> Result<()> {
    if output_dir.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(output_dir)?;

    Ok(())
}

/// Represents a row in the generation CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct GenerationRow {
    time_step: usize,
    generator_id: GeneratorID,
    output_mw: f64,
}

/// Represents a row in the storage CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StorageRow {
    time_step: usize,
    storage_id: StorageID,
    charge_mw: f64,
    discharge_mw: f64,
    soc_mwh: f64,
}

/// Represents a row in the grid CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct GridRow {
    time_step: usize,
    import_mw: f64,
    export_mw: f64,
    net_mw: f64,
    pv_mw: Option<f64>,
}

/// An object for writing schedule data to file
pub struct DataWriter {
    generation_writer: csv::Writer<File>,
    storage_writer: csv::Writer<File>,
    grid_writer: csv::Writer<File>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    pub fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        Ok(Self {
            generation_writer: new_writer(GENERATION_FILE_NAME)?,
            storage_writer: new_writer(STORAGE_FILE_NAME)?,
            grid_writer: new_writer(GRID_FILE_NAME)?,
        })
    }

    /// Write a complete schedule to the output files
    pub fn write_schedule(&mut self, schedule: &Schedule) -> Result<()> {
        self.write_generation(schedule)?;
        self.write_storage(schedule)?;
        self.write_grid(schedule)?;
        Ok(())
    }

    /// Write generator dispatch to file
    fn write_generation(&mut self, schedule: &Schedule) -> Result<()> {
        for (generator_id, series) in &schedule.generators {
            for (time_step, output) in series.iter().enumerate() {
                let row = GenerationRow {
                    time_step,
                    generator_id: generator_id.clone(),
                    output_mw: output.value(),
                };
                self.generation_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    /// Write storage charge/discharge/SOC trajectories to file
    fn write_storage(&mut self, schedule: &Schedule) -> Result<()> {
        for (storage_id, unit) in &schedule.storage {
            for time_step in 0..unit.soc.len() {
                let row = StorageRow {
                    time_step,
                    storage_id: storage_id.clone(),
                    charge_mw: unit.charge[time_step].value(),
                    discharge_mw: unit.discharge[time_step].value(),
                    soc_mwh: unit.soc[time_step].value(),
                };
                self.storage_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    /// Write grid exchange and PV output to file
    fn write_grid(&mut self, schedule: &Schedule) -> Result<()> {
        for time_step in 0..schedule.grid_import.len() {
            let row = GridRow {
                time_step,
                import_mw: schedule.grid_import[time_step].value(),
                export_mw: schedule.grid_export[time_step].value(),
                net_mw: schedule.grid_net[time_step].value(),
                pv_mw: schedule
                    .pv
                    .as_ref()
                    .map(|series| series[time_step].value()),
            };
            self.grid_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.generation_writer.flush()?;
        self.storage_writer.flush()?;
        self.grid_writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::StorageSchedule;
    use crate::solver::TerminationStatus;
    use crate::units::{Energy, Money, Power};
    use indexmap::IndexMap;
    use tempfile::tempdir;

    fn sample_schedule() -> Schedule {
        Schedule {
            objective: Money(572.0),
            status: TerminationStatus::Optimal,
            generators: IndexMap::from([("gt1".into(), vec![Power(200.0), Power(210.0)])]),
            storage: IndexMap::from([(
                "bess1".into(),
                StorageSchedule {
                    charge: vec![Power(10.0), Power(0.0)],
                    discharge: vec![Power(0.0), Power(5.0)],
                    soc: vec![Energy(52.25), Energy(50.86)],
                },
            )]),
            grid_import: vec![Power(0.0), Power(0.0)],
            grid_export: vec![Power(0.0), Power(15.0)],
            grid_net: vec![Power(0.0), Power(-15.0)],
            pv: None,
        }
    }

    #[test]
    fn test_write_schedule() {
        let dir = tempdir().unwrap();
        let schedule = sample_schedule();

        let mut writer = DataWriter::create(dir.path()).unwrap();
        writer.write_schedule(&schedule).unwrap();
        writer.flush().unwrap();

        let mut reader = csv::Reader::from_path(dir.path().join(GENERATION_FILE_NAME)).unwrap();
        let rows: Vec<GenerationRow> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(
            rows,
            vec![
                GenerationRow {
                    time_step: 0,
                    generator_id: "gt1".into(),
                    output_mw: 200.0
                },
                GenerationRow {
                    time_step: 1,
                    generator_id: "gt1".into(),
                    output_mw: 210.0
                }
            ]
        );

        let mut reader = csv::Reader::from_path(dir.path().join(GRID_FILE_NAME)).unwrap();
        let rows: Vec<GridRow> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(rows[1].net_mw, -15.0);
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("results/run1");

        create_output_directory(&nested).unwrap();
        assert!(nested.is_dir());

        // idempotent
        create_output_directory(&nested).unwrap();
    }
}
