//! Command-line argument parsing and processing.
//!
//! Supports the standard help, version, and debug flags, an explicit
//! configuration path, and a one-shot `--check` mode that prints the day's
//! schedule and the current classification without switching anything.

use std::path::PathBuf;

use crate::logger::Log;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the switching service until signalled
    Run {
        debug_enabled: bool,
        config_path: Option<PathBuf>,
    },
    /// Print today's schedule and state, then exit
    Check {
        debug_enabled: bool,
        config_path: Option<PathBuf>,
        /// Instant to evaluate instead of now, RFC 3339 text
        at: Option<String>,
    },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown or malformed arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is taken to be the program name and skipped.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut run_check = false;
        let mut config_path: Option<PathBuf> = None;
        let mut at: Option<String> = None;
        let mut unknown_arg_found = false;

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg_str = &args_vec[i];
            match arg_str.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--check" | "-c" => run_check = true,
                "--config" | "--at" => match args_vec.get(i + 1) {
                    Some(value) if !value.starts_with('-') => {
                        if arg_str == "--config" {
                            config_path = Some(PathBuf::from(value));
                        } else {
                            at = Some(value.clone());
                        }
                        i += 1;
                    }
                    _ => {
                        Log::log_warning(&format!("Missing value for {}", arg_str));
                        unknown_arg_found = true;
                    }
                },
                _ => {
                    if arg_str.starts_with('-') {
                        Log::log_warning(&format!("Unknown option: {}", arg_str));
                    } else {
                        Log::log_warning(&format!("Unexpected argument: {}", arg_str));
                    }
                    unknown_arg_found = true;
                }
            }
            i += 1;
        }

        if at.is_some() && !run_check {
            Log::log_warning("--at is only valid together with --check");
            unknown_arg_found = true;
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else if display_help {
            CliAction::ShowHelp
        } else if run_check {
            CliAction::Check {
                debug_enabled,
                config_path,
                at,
            }
        } else {
            CliAction::Run {
                debug_enabled,
                config_path,
            }
        };

        ParsedArgs { action }
    }

    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    Log::log_version();
    Log::log_pipe();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    Log::log_version();
    Log::log_block_start(env!("CARGO_PKG_DESCRIPTION"));
    Log::log_block_start("Usage: suntheme [OPTIONS]");
    Log::log_block_start("Options:");
    Log::log_indented("-c, --check               Print today's schedule and current state, then exit");
    Log::log_indented("    --at <RFC3339>        With --check, evaluate this instant instead of now");
    Log::log_indented("    --config <PATH>       Read settings from PATH");
    Log::log_indented("-d, --debug               Enable detailed debug output");
    Log::log_indented("-h, --help                Print help information");
    Log::log_indented("-V, --version             Print version information");
    Log::log_end();
}
