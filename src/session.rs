//! Session manager: owns the live set of authenticated device sessions.

use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{DeviceApi, DeviceHandle};
use crate::config::MonitorConfig;

/// A live authenticated handle bound to one configured device.
pub struct DeviceSession {
    pub key: String,
    pub vdom: String,
    pub handle: Box<dyn DeviceHandle>,
}

impl DeviceSession {
    pub fn host(&self) -> &str {
        self.handle.host()
    }
}

pub struct SessionManager {
    api: Arc<dyn DeviceApi>,
    active: Vec<DeviceSession>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn DeviceApi>) -> Self {
        Self {
            api,
            active: Vec::new(),
        }
    }

    pub fn active(&self) -> &[DeviceSession] {
        &self.active
    }

    /// Logs into every configured device. Any previous generation of
    /// sessions is logged out first, so a reconnect never leaves orphaned
    /// sessions behind and never holds two sessions for one device key.
    /// A device that fails to authenticate is logged and excluded from the
    /// active set; it is not retried until the next full reconnect.
    pub async fn connect_all(&mut self, config: &MonitorConfig) {
        if !self.active.is_empty() {
            self.disconnect_all().await;
        }

        let mut keys: Vec<&String> = config.devices.keys().collect();
        keys.sort();
        for key in keys {
            let device = &config.devices[key];
            match self.api.login(device).await {
                Ok(handle) => {
                    info!(device = %key, host = %device.hostname, "login successful");
                    self.active.push(DeviceSession {
                        key: key.clone(),
                        vdom: device.vdom.clone(),
                        handle,
                    });
                }
                Err(e) => {
                    warn!(device = %key, host = %device.hostname, error = %e,
                          "login failed, device excluded from active set");
                }
            }
        }
        info!(
            active = self.active.len(),
            configured = config.devices.len(),
            "connect pass complete"
        );
    }

    /// Logs out every active session, best-effort: a failing logout is
    /// logged and does not stop the remaining logouts.
    pub async fn disconnect_all(&mut self) {
        for session in self.active.drain(..) {
            match session.handle.logout().await {
                Ok(()) => info!(device = %session.key, "logged out"),
                Err(e) => warn!(device = %session.key, error = %e, "logout failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{MockApi, MockDevice};
    use crate::config::{DeviceConfig, MonitorConfig};
    use crate::version::FirmwareVersion;
    use serde_json::json;
    use std::collections::HashMap;

    fn device(host: &str) -> DeviceConfig {
        DeviceConfig {
            hostname: host.into(),
            user: "admin".into(),
            password: "pw".into(),
            vdom: "root".into(),
            https: true,
        }
    }

    fn config(devices: &[(&str, &str)]) -> MonitorConfig {
        let mut map = HashMap::new();
        for (key, host) in devices {
            map.insert((*key).to_string(), device(host));
        }
        MonitorConfig {
            interval: 1,
            pid_file: "/tmp/test.pid".into(),
            devices: map,
        }
    }

    fn healthy() -> MockDevice {
        MockDevice::up(FirmwareVersion::new(5, 6, 0), json!({}))
    }

    #[tokio::test]
    async fn failed_login_is_excluded_without_blocking_others() {
        let api = MockApi::default()
            .with_device("10.0.0.1", healthy())
            .with_device("10.0.0.2", MockDevice::rejecting_logins())
            .with_device("10.0.0.3", healthy());
        let logins = api.logins.clone();

        let mut mgr = SessionManager::new(Arc::new(api));
        mgr.connect_all(&config(&[("a", "10.0.0.1"), ("b", "10.0.0.2"), ("c", "10.0.0.3")]))
            .await;

        // All three were attempted, only the two healthy ones survive.
        assert_eq!(logins.lock().unwrap().len(), 3);
        let mut active: Vec<&str> = mgr.active().iter().map(|s| s.key.as_str()).collect();
        active.sort();
        assert_eq!(active, ["a", "c"]);
    }

    #[tokio::test]
    async fn double_connect_keeps_one_session_per_device() {
        let api = MockApi::default().with_device("10.0.0.1", healthy());
        let logouts = api.logouts.clone();

        let mut mgr = SessionManager::new(Arc::new(api));
        let cfg = config(&[("a", "10.0.0.1")]);
        mgr.connect_all(&cfg).await;
        mgr.connect_all(&cfg).await;

        assert_eq!(mgr.active().len(), 1);
        // The first generation was logged out before the second connected.
        assert_eq!(logouts.lock().unwrap().as_slice(), ["10.0.0.1"]);
    }

    #[tokio::test]
    async fn disconnect_all_is_best_effort() {
        let mut broken = healthy();
        broken.fail_logout = true;
        let api = MockApi::default()
            .with_device("10.0.0.1", broken)
            .with_device("10.0.0.2", healthy());
        let logouts = api.logouts.clone();

        let mut mgr = SessionManager::new(Arc::new(api));
        mgr.connect_all(&config(&[("a", "10.0.0.1"), ("b", "10.0.0.2")]))
            .await;
        assert_eq!(mgr.active().len(), 2);

        mgr.disconnect_all().await;

        assert!(mgr.active().is_empty());
        // Both logouts were attempted even though the first one failed.
        assert_eq!(logouts.lock().unwrap().len(), 2);
    }
}
