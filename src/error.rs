//! Error taxonomy for the daemon.
//!
//! Only configuration and startup errors are fatal. Everything scoped to a
//! single device (auth, fetch) is logged and isolated so one bad appliance
//! never takes down monitoring of the rest.

use thiserror::Error;

/// Fatal configuration problems, raised at startup only.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("device {device}: missing or empty `{field}`")]
    MissingField { device: String, field: &'static str },
    #[error("no devices configured")]
    Empty,
}

/// Per-device login failure. Non-fatal: the device stays out of the active
/// set until the next full reconnect.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("transport error during login: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("login rejected (status {0})")]
    Rejected(u16),
    #[error("login response carried no session token")]
    NoSessionToken,
}

/// Per-device-per-cycle fetch failure. Non-fatal: that device's samples are
/// skipped for the current cycle only.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error during monitor query: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("monitor endpoint returned status {0}")]
    Status(u16),
    #[error("monitor payload is missing field `{0}`")]
    MissingField(String),
}

/// Process-control surface failures (pidfile and signal plumbing).
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("pidfile {path}: {source}")]
    Pidfile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("pidfile {path} does not contain a pid: {contents:?}")]
    BadPid { path: String, contents: String },
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: i32,
        #[source]
        source: nix::Error,
    },
    #[error("no running instance found")]
    NotRunning,
}
