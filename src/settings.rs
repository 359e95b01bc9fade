//! Program settings from a `settings.toml` file.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Program settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// The user's preferred log level
    pub log_level: Option<String>,
    /// Wall-clock limit for a single solver invocation, in seconds
    #[serde(default = "default_solver_time_limit_secs")]
    pub solver_time_limit_secs: u64,
    /// How many times an infeasible scenario may be revised and retried
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
}

fn default_solver_time_limit_secs() -> u64 {
    30
}

fn default_max_revisions() -> u32 {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: None,
            solver_time_limit_secs: default_solver_time_limit_secs(),
            max_revisions: default_max_revisions(),
        }
    }
}

impl Settings {
    /// Read the settings from `settings.toml` in the given directory, if it exists.
    ///
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load(dir: &Path) -> Result<Settings> {
        let path = dir.join(SETTINGS_FILE_NAME);
        if !path.exists() {
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Could not parse {}", path.display()))
    }

    /// The solver time limit as a [`Duration`]
    pub fn solver_time_limit(&self) -> Duration {
        Duration::from_secs(self.solver_time_limit_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let mut file = File::create(dir.path().join(SETTINGS_FILE_NAME)).unwrap();
        writeln!(file, "max_revisions = 5").unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.max_revisions, 5);
        assert_eq!(
            settings.solver_time_limit_secs,
            default_solver_time_limit_secs()
        );
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let dir = tempdir().unwrap();
        let mut file = File::create(dir.path().join(SETTINGS_FILE_NAME)).unwrap();
        writeln!(file, "not_a_setting = true").unwrap();

        assert!(Settings::load(dir.path()).is_err());
    }
}
