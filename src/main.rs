//! Provides the main entry point to the program.
use anyhow::Result;
use gridplan::commands::run_cli;

fn main() -> Result<()> {
    run_cli()
}
