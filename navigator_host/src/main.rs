//! FFI Navigator - standalone host for the language session.
//!
//! Usage: ffi-navigator [SETTINGS_FILE]
//!
//! Stands in for the editor extension host: activates the extension,
//! relays session events to the log, and deactivates on `quit` or EOF.

use crossbeam_channel::{select, unbounded};
use ffi_navigator_ext::{Extension, HostSettings, LifecycleState};
use ffi_navigator_lsp::{LogLevel, SessionEvent};
use std::env;
use std::io::BufRead;
use std::path::Path;
use std::thread;
use std::time::Duration;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting FFI Navigator host");

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let settings = match args.get(1) {
        Some(path) => match HostSettings::load(Path::new(path)) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Failed to load settings '{}': {}", path, e);
                HostSettings::new()
            }
        },
        None => HostSettings::new(),
    };

    let workspace_root = env::current_dir().ok();
    let mut extension = Extension::new(settings, workspace_root);
    extension.activate();

    if !extension.has_session() {
        log::error!("Activation failed");
        std::process::exit(1);
    }

    let languages: Vec<&str> = extension
        .selectors()
        .iter()
        .map(|s| s.language.as_str())
        .collect();
    log::info!("Covering documents: {}", languages.join(", "));

    // stdin lines feed the quit command; EOF also quits.
    let (line_tx, line_rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    loop {
        select! {
            recv(line_rx) -> line => match line {
                Ok(cmd) if cmd.trim() == "quit" => break,
                Ok(_) => {}
                Err(_) => break, // stdin closed
            },
            default(Duration::from_millis(200)) => {
                for event in extension.poll() {
                    log_event(&event);
                }
                if extension.state() == LifecycleState::Inactive {
                    log::info!("Session ended");
                    break;
                }
            }
        }
    }

    if let Some(signal) = extension.deactivate() {
        log::info!("Stopping language session");
        if !signal.wait_timeout(Duration::from_secs(10)) {
            log::warn!("Timed out waiting for the session to stop");
        }
    }

    log::info!("FFI Navigator host exited");
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Ready { capabilities } => {
            log::info!("Server ready ({})", capabilities);
        }
        SessionEvent::Exited { code } => {
            log::info!("Server exited (code {:?})", code);
        }
        SessionEvent::Log { level, message } => match level {
            LogLevel::Error => log::error!("[server] {}", message),
            LogLevel::Warning => log::warn!("[server] {}", message),
            _ => log::info!("[server] {}", message),
        },
    }
}
