//! Process control surface: pidfile bookkeeping plus the stop/status
//! operations that act on a running instance from a second invocation.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::ControlError;

pub struct PidFile {
    path: String,
}

impl PidFile {
    pub fn new(path: &str) -> Self {
        Self { path: path.to_string() }
    }

    /// Records the current process as the running instance.
    pub fn write_current(&self) -> Result<(), ControlError> {
        std::fs::write(&self.path, format!("{}\n", std::process::id())).map_err(|e| {
            ControlError::Pidfile {
                path: self.path.clone(),
                source: e,
            }
        })
    }

    pub fn read(&self) -> Result<Option<Pid>, ControlError> {
        if !Path::new(&self.path).exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| ControlError::Pidfile {
            path: self.path.clone(),
            source: e,
        })?;
        let pid: i32 = contents.trim().parse().map_err(|_| ControlError::BadPid {
            path: self.path.clone(),
            contents: contents.clone(),
        })?;
        Ok(Some(Pid::from_raw(pid)))
    }

    pub fn remove(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// True when a previously started instance is still alive.
pub fn is_running(pidfile: &PidFile) -> Result<bool, ControlError> {
    match pidfile.read()? {
        // Signal 0 probes for existence without delivering anything.
        Some(pid) => Ok(kill(pid, None).is_ok()),
        None => Ok(false),
    }
}

/// Asks the running instance to drain and exit.
pub fn stop(pidfile: &PidFile) -> Result<(), ControlError> {
    let pid = pidfile.read()?.ok_or(ControlError::NotRunning)?;
    kill(pid, Signal::SIGTERM).map_err(|e| ControlError::Signal {
        pid: pid.as_raw(),
        source: e,
    })?;
    info!(pid = pid.as_raw(), "stop signal sent");
    Ok(())
}

/// Blocks until the previous instance has fully exited.
pub async fn wait_until_stopped(pidfile: &PidFile) -> Result<(), ControlError> {
    while is_running(pidfile)? {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    Ok(())
}
