//! Common functionality for the gridplan dispatch engine.
#![warn(missing_docs)]
pub mod commands;
pub mod dispatch;
pub mod error;
pub mod id;
pub mod input;
pub mod log;
pub mod output;
pub mod scenario;
pub mod schedule;
pub mod settings;
pub mod simulation;
pub mod solver;
pub mod units;

#[cfg(test)]
mod fixture;
