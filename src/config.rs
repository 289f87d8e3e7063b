//! Device registry: configuration loading and validation.
//!
//! The config file is YAML, one entry per monitored appliance. The path
//! defaults to `fgtmond.yaml` and can be overridden with the
//! `FGTMOND_CONF_FILE` environment variable. The registry is immutable after
//! load; a reload is a fresh `load` producing a new value.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::ConfigError;

pub const CONF_FILE_ENV: &str = "FGTMOND_CONF_FILE";
const DEFAULT_CONF_FILE: &str = "fgtmond.yaml";
const DEFAULT_INTERVAL_SECS: u64 = 3;
const DEFAULT_PID_FILE: &str = "/tmp/fgtmond.pid";

pub type DeviceMap = HashMap<String, DeviceConfig>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds to sleep between poll cycles.
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "default_pid_file")]
    pub pid_file: String,
    pub devices: DeviceMap,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_pid_file() -> String {
    DEFAULT_PID_FILE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub hostname: String,
    pub user: String,
    /// May be empty. An empty password is attempted as-is and rejected by
    /// the appliance like any other bad credential.
    #[serde(default)]
    pub password: String,
    pub vdom: String,
    /// Transport security: true = HTTPS, false = plain HTTP.
    #[serde(deserialize_with = "de_transport_flag")]
    pub https: bool,
}

/// Accepts YAML booleans and their string spellings. Anything that is not
/// affirmative parses as plaintext, with a warning: a misspelled flag is a
/// misconfiguration trap, not a reason to refuse the whole registry.
fn de_transport_flag<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(de)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Ok(true),
            "false" | "no" | "off" => Ok(false),
            other => {
                warn!(flag = other, "unrecognized https flag, treating as plaintext");
                Ok(false)
            }
        },
    }
}

impl MonitorConfig {
    /// Config file path, honoring the environment override.
    pub fn conf_path() -> String {
        std::env::var(CONF_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONF_FILE.into())
    }

    pub async fn load(path: &str) -> Result<Self, ConfigError> {
        let txt = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io { path: path.into(), source: e })?;
        let cfg: MonitorConfig = serde_yaml::from_str(&txt)
            .map_err(|e| ConfigError::Parse { path: path.into(), source: e })?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Empty);
        }
        for (key, dev) in &self.devices {
            for (field, value) in [
                ("hostname", &dev.hostname),
                ("user", &dev.user),
                ("vdom", &dev.vdom),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::MissingField {
                        device: key.clone(),
                        field,
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolves a device host back to its configured key. Linear scan: the
    /// registry holds tens of devices, not thousands.
    pub fn key_for_host(&self, host: &str) -> Option<&str> {
        self.devices
            .iter()
            .find(|(_, dev)| dev.hostname == host)
            .map(|(key, _)| key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
interval: 9
devices:
  fgt1:
    hostname: 10.10.10.125
    user: admin
    password: toto
    vdom: root
    https: true
  router2:
    hostname: 10.10.10.74
    user: admin
    password: ""
    vdom: root
    https: "false"
"#;

    fn write_conf(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn loads_sample_config() {
        let file = write_conf(SAMPLE);
        let cfg = MonitorConfig::load(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(cfg.interval, 9);
        assert_eq!(cfg.pid_file, DEFAULT_PID_FILE);
        assert_eq!(cfg.devices.len(), 2);
        assert!(cfg.devices["fgt1"].https);
        assert!(!cfg.devices["router2"].https);
        assert!(cfg.devices["router2"].password.is_empty());
    }

    #[tokio::test]
    async fn unrecognized_https_flag_means_plaintext() {
        let file = write_conf(
            r#"
devices:
  fgt1:
    hostname: h
    user: u
    vdom: root
    https: flase
"#,
        );
        let cfg = MonitorConfig::load(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert!(!cfg.devices["fgt1"].https);
        assert_eq!(cfg.interval, 3);
    }

    #[tokio::test]
    async fn empty_vdom_is_rejected() {
        let file = write_conf(
            r#"
devices:
  fgt1:
    hostname: h
    user: u
    vdom: ""
    https: true
"#,
        );
        let err = MonitorConfig::load(file.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { field: "vdom", .. }
        ));
    }

    #[tokio::test]
    async fn missing_user_is_a_parse_error() {
        let file = write_conf(
            r#"
devices:
  fgt1:
    hostname: h
    vdom: root
    https: true
"#,
        );
        let err = MonitorConfig::load(file.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[tokio::test]
    async fn empty_registry_is_rejected() {
        let file = write_conf("devices: {}\n");
        let err = MonitorConfig::load(file.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Empty));
    }

    #[tokio::test]
    async fn resolves_host_to_device_key() {
        let file = write_conf(SAMPLE);
        let cfg = MonitorConfig::load(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(cfg.key_for_host("10.10.10.74"), Some("router2"));
        assert_eq!(cfg.key_for_host("192.0.2.1"), None);
    }
}
