//! Command-line front end for the enom request pipeline.

pub mod cli;
pub mod context;
pub mod invoke_cmd;
pub mod login;
pub mod styled_output;

pub use cli::{Cli, Commands, LogLevel, dispatch_command};
