//! fgtmond - FortiGate metrics-polling daemon.
//!
//! Logs into every configured appliance, polls resource-usage metrics over
//! the FortiOS REST API at a fixed interval, and republishes per-device
//! values to an append-only JSON-lines sink. Supervision and daemonization
//! belong to the service manager; `start` runs in the foreground.

mod api;
mod config;
mod control;
mod daemon;
mod error;
mod fetch;
mod publish;
mod session;
mod version;

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use crate::api::FortiClient;
use crate::config::MonitorConfig;
use crate::control::PidFile;
use crate::daemon::Daemon;
use crate::error::ControlError;
use crate::publish::JsonLineSink;

const EXIT_USAGE: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "fgtmond".into());
    let (Some(command), None) = (args.next(), args.next()) else {
        eprintln!("Syntax: {program} start|stop|restart|status");
        return ExitCode::from(EXIT_USAGE);
    };

    match command.to_lowercase().as_str() {
        "start" => cmd_start().await,
        "stop" => cmd_stop().await,
        "restart" => cmd_restart().await,
        "status" => cmd_status().await,
        other => {
            eprintln!("Unknown command {other:?}");
            eprintln!("Syntax: {program} start|stop|restart|status");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

/// Loads the registry or reports the fatal startup error.
async fn load_config() -> Result<MonitorConfig, ExitCode> {
    let path = MonitorConfig::conf_path();
    MonitorConfig::load(&path).await.map_err(|e| {
        error!(config = %path, error = %e, "fatal configuration error");
        ExitCode::from(EXIT_FATAL)
    })
}

async fn cmd_start() -> ExitCode {
    let config = match load_config().await {
        Ok(c) => c,
        Err(code) => return code,
    };
    // No usable HTTP client means nothing can be monitored at all.
    let api = match FortiClient::new() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!(error = %e, "HTTP client unavailable");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let pidfile = PidFile::new(&config.pid_file);
    if control::is_running(&pidfile).unwrap_or(false) {
        eprintln!("Service is already running.");
        return ExitCode::from(EXIT_USAGE);
    }
    if let Err(e) = pidfile.write_current() {
        error!(error = %e, "cannot record pid");
        return ExitCode::from(EXIT_FATAL);
    }
    let shutdown = match daemon::shutdown_channel() {
        Ok(rx) => rx,
        Err(e) => {
            error!(error = %e, "cannot install signal handlers");
            pidfile.remove();
            return ExitCode::from(EXIT_FATAL);
        }
    };

    info!(devices = config.devices.len(), interval_secs = config.interval, "fgtmond starting");
    let sink = Box::new(JsonLineSink::new(std::io::stdout()));
    let mut daemon = Daemon::new(config, api, sink);
    let result = daemon.run(shutdown).await;
    pidfile.remove();

    match result {
        Ok(()) => {
            info!("fgtmond stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "daemon terminated abnormally");
            ExitCode::FAILURE
        }
    }
}

async fn cmd_stop() -> ExitCode {
    let config = match load_config().await {
        Ok(c) => c,
        Err(code) => return code,
    };
    match control::stop(&PidFile::new(&config.pid_file)) {
        Ok(()) => {
            println!("Stop signal sent.");
            ExitCode::SUCCESS
        }
        Err(ControlError::NotRunning) => {
            eprintln!("Service is not running.");
            ExitCode::from(EXIT_USAGE)
        }
        Err(e) => {
            error!(error = %e, "stop failed");
            ExitCode::FAILURE
        }
    }
}

async fn cmd_restart() -> ExitCode {
    let config = match load_config().await {
        Ok(c) => c,
        Err(code) => return code,
    };
    let pidfile = PidFile::new(&config.pid_file);

    match control::stop(&pidfile) {
        // A restart of a stopped service is just a start.
        Ok(()) | Err(ControlError::NotRunning) => {}
        Err(e) => {
            error!(error = %e, "stop failed");
            return ExitCode::FAILURE;
        }
    }
    if let Err(e) = control::wait_until_stopped(&pidfile).await {
        error!(error = %e, "waiting for previous instance failed");
        return ExitCode::FAILURE;
    }
    cmd_start().await
}

async fn cmd_status() -> ExitCode {
    let config = match load_config().await {
        Ok(c) => c,
        Err(code) => return code,
    };
    match control::is_running(&PidFile::new(&config.pid_file)) {
        Ok(true) => println!("Service is running."),
        Ok(false) => println!("Service is not running."),
        Err(e) => {
            error!(error = %e, "status check failed");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
