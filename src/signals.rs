//! Signal handling for the running service.
//!
//! SIGINT, SIGTERM and SIGHUP request shutdown. SIGUSR2 asks the service to
//! re-read its configuration. The handler thread only forwards messages; the
//! main loop acts on them.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2},
    iterator::Signals,
};
use std::{
    path::Path,
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    sync::mpsc::{Receiver, Sender, channel},
    thread,
};

use crate::config::Config;
use crate::logger::Log;
use crate::switcher::SwitcherService;
use crate::theme::PreferencesThemeApplier;
use crate::utils::path_for_display;

/// Unified signal message type for all signal-based communication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMessage {
    /// Configuration reload signal (SIGUSR2)
    Reload,
    /// Shutdown signal (SIGTERM, SIGINT, SIGHUP)
    Shutdown,
}

/// Signal handling state shared between threads
pub struct SignalState {
    /// Cleared once shutdown has been requested
    pub running: Arc<AtomicBool>,
    pub signal_receiver: Receiver<SignalMessage>,
}

impl SignalState {
    /// A state with no OS handlers attached, plus the sending half.
    pub fn detached() -> (Self, Sender<SignalMessage>) {
        let (sender, signal_receiver) = channel();
        (
            Self {
                running: Arc::new(AtomicBool::new(true)),
                signal_receiver,
            },
            sender,
        )
    }
}

fn shutdown_message(sig: i32, debug_enabled: bool) -> &'static str {
    match (sig, debug_enabled) {
        (SIGINT, true) => "Received SIGINT (Ctrl+C), initiating graceful shutdown...",
        (SIGTERM, true) => "Received SIGTERM, initiating graceful shutdown...",
        (SIGHUP, true) => "Received SIGHUP, initiating graceful shutdown...",
        (SIGINT, false) => "Received interrupt signal, initiating graceful shutdown...",
        _ => "Received termination signal, initiating graceful shutdown...",
    }
}

/// Register OS signal handlers and start the forwarding thread.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let (state, sender) = SignalState::detached();
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running = state.running.clone();
    thread::spawn(move || {
        for sig in signals.forever() {
            let message = match sig {
                SIGUSR2 => {
                    Log::log_pipe();
                    Log::log_decorated("Received configuration reload signal");
                    SignalMessage::Reload
                }
                _ => {
                    Log::log_pipe();
                    Log::log_decorated(shutdown_message(sig, debug_enabled));
                    running.store(false, Ordering::SeqCst);
                    SignalMessage::Shutdown
                }
            };
            // Receiver gone means the main loop has exited.
            if sender.send(message).is_err() || message == SignalMessage::Shutdown {
                break;
            }
        }
    });

    Ok(state)
}

/// Act on one message received in the main loop.
///
/// A reload that fails to load or validate keeps the running configuration.
pub fn handle_signal_message(
    message: SignalMessage,
    service: &SwitcherService,
    config_path: Option<&Path>,
    signal_state: &SignalState,
) -> Result<()> {
    match message {
        SignalMessage::Shutdown => {
            signal_state.running.store(false, Ordering::SeqCst);
        }
        SignalMessage::Reload => reload_config(service, config_path),
    }
    Ok(())
}

fn reload_config(service: &SwitcherService, config_path: Option<&Path>) {
    let loaded = match config_path {
        Some(path) => Config::load_from_path(path).map(|c| (c, path.to_path_buf())),
        None => Config::load().and_then(|c| Ok((c, Config::get_config_path()?))),
    };
    let (config, source) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            Log::log_warning(&format!("Configuration reload failed: {:#}", e));
            Log::log_indented("Keeping the previous configuration");
            return;
        }
    };

    let old_preferences = service.config().get_preferences_path().ok();
    let new_preferences = match config.get_preferences_path() {
        Ok(path) => path,
        Err(e) => {
            Log::log_warning(&format!("Configuration reload failed: {:#}", e));
            Log::log_indented("Keeping the previous configuration");
            return;
        }
    };

    let result = if old_preferences.as_deref() == Some(new_preferences.as_path()) {
        config.log_config(&source);
        service.reload(config)
    } else {
        match PreferencesThemeApplier::open(&new_preferences) {
            Ok(applier) => {
                config.log_config(&source);
                Log::log_indented(&format!(
                    "Preferences file: {}",
                    path_for_display(&new_preferences)
                ));
                service.reload_with_applier(config, Arc::new(applier))
            }
            Err(e) => {
                Log::log_warning(&format!("Configuration reload failed: {:#}", e));
                Log::log_indented("Keeping the previous configuration");
                return;
            }
        }
    };

    if let Err(e) = result {
        Log::log_error(&format!("Theme update after reload failed: {:#}", e));
    }
}
