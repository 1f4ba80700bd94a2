use anyhow::{Context, Result};
use chrono::Utc;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    sync::atomic::Ordering,
    sync::mpsc::RecvTimeoutError,
    time::Duration,
};

use suntheme::args::{CliAction, ParsedArgs, display_help, display_version_info};
use suntheme::config::Config;
use suntheme::constants::{EXIT_FAILURE, SHUTDOWN_POLL_MS};
use suntheme::geo::parse_local_instant;
use suntheme::lock::{InstanceLock, default_lock_path};
use suntheme::logger::Log;
use suntheme::scheduler::TimerScheduler;
use suntheme::signals::{SignalState, handle_signal_message, setup_signal_handler};
use suntheme::switcher::{SwitcherService, compute_schedule};
use suntheme::theme::PreferencesThemeApplier;
use suntheme::time_source::SystemTimeSource;
use suntheme::time_state::{classify, next_boundary};
use suntheme::utils::{format_clock_time, path_for_display};

fn load_config(config_path: Option<&Path>) -> Result<(Config, PathBuf)> {
    match config_path {
        Some(path) => Ok((Config::load_from_path(path)?, path.to_path_buf())),
        None => Ok((Config::load()?, Config::get_config_path()?)),
    }
}

/// One-shot evaluation: print the schedule and classification and exit.
fn run_check(config_path: Option<&Path>, at: Option<&str>) -> Result<()> {
    let (config, source) = load_config(config_path)?;
    config.log_config(&source);

    let instant = match at {
        Some(text) => parse_local_instant(text)
            .with_context(|| format!("Invalid --at value '{}'", text))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let local_now = config.zone.localize(instant);
    let schedule = compute_schedule(&config, &local_now);

    Log::log_block_start(&format!("Evaluating {}", local_now.to_rfc3339()));
    match &schedule.events {
        Some(events) => {
            Log::log_indented(&format!("Sunrise: {}", format_clock_time(&events.sunrise())));
            Log::log_indented(&format!("Sunset:  {}", format_clock_time(&events.sunset())));
            let state = classify(events, &local_now, &config.classifier);
            Log::log_indented(&format!("State:   {:?}", state));
            if let Some(boundary) =
                next_boundary(events, &local_now, config.classifier.collar_minutes)
            {
                Log::log_indented(&format!("Next switch: {}", format_clock_time(&boundary)));
            }
        }
        None => Log::log_indented("No sunrise or sunset available for this date"),
    }
    Log::log_end();
    Ok(())
}

fn run_service(debug_enabled: bool, config_path: Option<PathBuf>) -> Result<()> {
    Log::log_version();
    if debug_enabled {
        Log::log_pipe();
        Log::log_debug("Debug mode enabled");
    }

    let signal_state = setup_signal_handler(debug_enabled)?;

    let lock_path = default_lock_path();
    let lock = match InstanceLock::acquire(&lock_path) {
        Ok(lock) => lock,
        Err(e) => {
            Log::log_pipe();
            Log::log_error(&format!("{}\n• Stop the running instance before starting another.", e));
            std::process::exit(EXIT_FAILURE);
        }
    };
    Log::log_decorated("Lock acquired, starting suntheme...");

    let result = serve(config_path.as_deref(), &signal_state);

    Log::log_block_start("Performing cleanup...");
    lock.release();
    Log::log_decorated("Cleanup complete");
    Log::log_end();
    result
}

fn serve(config_path: Option<&Path>, signal_state: &SignalState) -> Result<()> {
    let (config, source) = load_config(config_path)?;
    config.log_config(&source);

    let preferences_path = config.get_preferences_path()?;
    let applier = PreferencesThemeApplier::open(&preferences_path)?;
    Log::log_indented(&format!(
        "Preferences file: {}",
        path_for_display(&preferences_path)
    ));

    let scheduler = Arc::new(TimerScheduler::new());
    let service = SwitcherService::new(
        config,
        scheduler.clone(),
        Arc::new(applier),
        Arc::new(SystemTimeSource),
    );
    service.start();

    let poll = Duration::from_millis(SHUTDOWN_POLL_MS);
    while signal_state.running.load(Ordering::SeqCst) {
        match signal_state.signal_receiver.recv_timeout(poll) {
            Ok(message) => {
                if let Err(e) = handle_signal_message(message, &service, config_path, signal_state) {
                    Log::log_error(&format!("Failed to handle signal: {:#}", e));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    Log::log_block_start("Shutting down suntheme...");
    service.stop();
    scheduler.shutdown();
    Ok(())
}

fn main() -> Result<()> {
    let parsed = ParsedArgs::from_env();

    match parsed.action {
        CliAction::ShowVersion => {
            display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Check {
            debug_enabled,
            config_path,
            at,
        } => {
            Log::set_debug(debug_enabled);
            Log::log_version();
            run_check(config_path.as_deref(), at.as_deref())
        }
        CliAction::Run {
            debug_enabled,
            config_path,
        } => {
            Log::set_debug(debug_enabled);
            run_service(debug_enabled, config_path)
        }
    }
}
