//! Styled CLI output.
//!
//! Status lines go to stderr so stdout stays clean for JSON results. Colors
//! are dropped when stderr is not a terminal or `NO_COLOR` is set.

use std::io::IsTerminal;

const SUCCESS: &str = "\x1b[38;2;0;245;212m";
const ERROR: &str = "\x1b[38;2;255;107;107m";
const WARNING: &str = "\x1b[38;2;255;200;87m";
const INFO: &str = "\x1b[38;2;72;202;228m";
const DIM: &str = "\x1b[38;2;130;154;177m";
const RESET: &str = "\x1b[0m";

fn colors_disabled() -> bool {
    std::env::var("NO_COLOR")
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

fn use_color() -> bool {
    !colors_disabled() && std::io::stderr().is_terminal()
}

fn styled(color: &str, symbol: &str, message: &str, enabled: bool) -> String {
    if enabled {
        format!("{color}{symbol}{RESET} {message}")
    } else {
        format!("{symbol} {message}")
    }
}

pub fn print_success(message: &str) {
    eprintln!("{}", styled(SUCCESS, "✓", message, use_color()));
}

pub fn print_error(message: &str) {
    eprintln!("{}", styled(ERROR, "✗", message, use_color()));
}

pub fn print_warning(message: &str) {
    eprintln!("{}", styled(WARNING, "!", message, use_color()));
}

pub fn print_info(message: &str) {
    eprintln!("{}", styled(INFO, "i", message, use_color()));
}

pub fn print_dim(message: &str) {
    if use_color() {
        eprintln!("{DIM}{message}{RESET}");
    } else {
        eprintln!("{message}");
    }
}
