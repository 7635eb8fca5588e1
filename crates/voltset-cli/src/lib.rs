pub mod cli;
pub mod common;

pub use cli::{Cli, Commands, ConfigCommands, OracleArgs, SampleArgs, SolveArgs};
