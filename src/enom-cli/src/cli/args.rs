//! CLI argument structures and parsing.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

/// Tracing targets of the workspace crates.
const ENOM_CRATES: &[&str] = &[
    "enom",
    "enom_cli",
    "enom_api",
    "enom_wbi",
    "enom_dispatch",
    "enom_login",
    "enom_keyring_store",
    "enom_common",
];

/// Log verbosity level for CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Only show errors
    Error,
    /// Show warnings and errors (default)
    #[default]
    Warn,
    /// Show informational messages, warnings, and errors
    Info,
    /// Show debug messages and above
    Debug,
    /// Show all messages including trace-level details
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Filter directives for the subscriber. `scoped` limits the level to the
    /// enom crates and keeps everything else at `error`.
    pub fn filter_directives(&self, scoped: bool) -> String {
        let level = self.as_filter_str();
        if !scoped {
            return level.to_string();
        }
        std::iter::once("error".to_string())
            .chain(ENOM_CRATES.iter().map(|krate| format!("{krate}={level}")))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse from string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<LogLevel> {
        match s.to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Signed request pipeline for the bilibili music API.
#[derive(Parser)]
#[command(name = "enom", author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to config.toml under the enom home)
    #[arg(long = "config", short = 'c', global = true, env = "ENOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (same as --log-level debug)
    #[arg(long = "verbose", short = 'v', global = true)]
    pub verbose: bool,

    /// Set log verbosity level (error, warn, info, debug, trace)
    #[arg(long = "log-level", short = 'L', global = true, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Call a named endpoint and print the result as JSON
    #[command(visible_alias = "i")]
    Invoke(InvokeArgs),

    /// List the registered endpoint names
    Endpoints,

    /// Log in by scanning a QR code with the mobile app
    Login(LoginArgs),

    /// Show who the stored session belongs to
    Status,

    /// Forget the stored session
    Logout,

    /// Import a session from an `eno-m://` hand-off link
    Handoff(HandoffArgs),
}

#[derive(Args, Debug)]
pub struct InvokeArgs {
    /// Endpoint name, e.g. `search` or `getHitSong`
    pub name: String,

    /// Parameter as KEY=VALUE; repeatable. Values that parse as JSON scalars
    /// are sent as such, anything else as a string.
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Print the result on one line instead of pretty JSON
    #[arg(long)]
    pub compact: bool,
}

impl InvokeArgs {
    pub fn parsed_params(&self) -> Result<Vec<(String, Value)>> {
        self.params.iter().map(|raw| parse_param(raw)).collect()
    }
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Also write the QR code as a PNG file
    #[arg(long = "qr-out", value_name = "FILE")]
    pub qr_out: Option<PathBuf>,

    /// Seconds between status polls
    #[arg(long, default_value_t = 2)]
    pub interval: u64,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 180)]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct HandoffArgs {
    /// The full `eno-m://...?cookie=...` link
    pub url: String,
}

/// Split `KEY=VALUE` and type the value.
pub fn parse_param(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("parameter `{raw}` is not in KEY=VALUE form");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("parameter `{raw}` has an empty key");
    }

    let value = match serde_json::from_str::<Value>(value) {
        Ok(v) if !v.is_array() && !v.is_object() => v,
        _ => Value::String(value.to_string()),
    };
    Ok((key.to_string(), value))
}
