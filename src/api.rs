//! FortiOS REST API client.
//!
//! `DeviceApi` is the seam between the daemon and the appliances: the
//! production implementation speaks the FortiOS cookie/CSRF login flow over
//! reqwest, and tests substitute a mock without touching the network.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::DeviceConfig;
use crate::error::{AuthError, FetchError};
use crate::version::FirmwareVersion;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CSRF_COOKIE: &str = "ccsrftoken";

/// One authenticated handle to one appliance.
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    fn host(&self) -> &str;
    fn firmware_version(&self) -> FirmwareVersion;
    /// Queries the vdom-resource monitor endpoint for one vdom and returns
    /// its `results` object.
    async fn monitor(&self, vdom: &str) -> Result<Value, FetchError>;
    /// Terminates the remote session. Best-effort from the caller's view.
    async fn logout(&self) -> anyhow::Result<()>;
}

/// Authentication entry point against one configured device.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    async fn login(&self, device: &DeviceConfig) -> Result<Box<dyn DeviceHandle>, AuthError>;
}

pub struct FortiClient {
    http: reqwest::Client,
}

impl FortiClient {
    /// Builds the shared HTTP client. Appliances ship self-signed
    /// certificates, so peer verification is relaxed; every request carries
    /// a timeout so one hung device cannot stall the poll loop.
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .cookie_store(true)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl DeviceApi for FortiClient {
    async fn login(&self, device: &DeviceConfig) -> Result<Box<dyn DeviceHandle>, AuthError> {
        let scheme = if device.https { "https" } else { "http" };
        let base = format!("{scheme}://{}", device.hostname);

        let resp = self
            .http
            .post(format!("{base}/logincheck"))
            .form(&[
                ("username", device.user.as_str()),
                ("secretkey", device.password.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::Rejected(resp.status().as_u16()));
        }
        // FortiOS answers 200 even on bad credentials; the CSRF cookie is
        // only set when the login actually succeeded.
        let csrf_token = resp
            .cookies()
            .find(|c| c.name() == CSRF_COOKIE)
            .map(|c| c.value().trim_matches('"').to_string())
            .ok_or(AuthError::NoSessionToken)?;

        let resp = self
            .http
            .get(format!("{base}/api/v2/monitor/system/status"))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::Rejected(resp.status().as_u16()));
        }
        let status: Value = resp.json().await?;
        let version = status
            .get("version")
            .and_then(Value::as_str)
            .and_then(FirmwareVersion::parse)
            .unwrap_or(FirmwareVersion::new(0, 0, 0));
        debug!(host = %device.hostname, %version, "device session established");

        Ok(Box::new(FortiHandle {
            http: self.http.clone(),
            host: device.hostname.clone(),
            base,
            csrf_token,
            version,
        }))
    }
}

struct FortiHandle {
    http: reqwest::Client,
    host: String,
    base: String,
    csrf_token: String,
    version: FirmwareVersion,
}

#[async_trait]
impl DeviceHandle for FortiHandle {
    fn host(&self) -> &str {
        &self.host
    }

    fn firmware_version(&self) -> FirmwareVersion {
        self.version
    }

    async fn monitor(&self, vdom: &str) -> Result<Value, FetchError> {
        let resp = self
            .http
            .get(format!("{}/api/v2/monitor/system/vdom-resource/select", self.base))
            .query(&[("vdom", vdom)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }
        let payload: Value = resp.json().await?;
        debug!(host = %self.host, %vdom, "monitor payload received");
        payload
            .get("results")
            .cloned()
            .ok_or_else(|| FetchError::MissingField("results".into()))
    }

    async fn logout(&self) -> anyhow::Result<()> {
        self.http
            .post(format!("{}/logout", self.base))
            .header("X-CSRFTOKEN", &self.csrf_token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Scripted behavior for one mock appliance, keyed by hostname.
    #[derive(Clone)]
    pub struct MockDevice {
        pub version: FirmwareVersion,
        pub payload: Value,
        pub accept_login: bool,
        pub fail_monitor: bool,
        pub fail_logout: bool,
    }

    impl MockDevice {
        pub fn up(version: FirmwareVersion, payload: Value) -> Self {
            Self {
                version,
                payload,
                accept_login: true,
                fail_monitor: false,
                fail_logout: false,
            }
        }

        pub fn rejecting_logins() -> Self {
            Self {
                version: FirmwareVersion::new(0, 0, 0),
                payload: Value::Null,
                accept_login: false,
                fail_monitor: false,
                fail_logout: false,
            }
        }
    }

    #[derive(Default)]
    pub struct MockApi {
        pub devices: HashMap<String, MockDevice>,
        pub logins: Arc<Mutex<Vec<String>>>,
        pub logouts: Arc<Mutex<Vec<String>>>,
    }

    impl MockApi {
        pub fn with_device(mut self, host: &str, device: MockDevice) -> Self {
            self.devices.insert(host.to_string(), device);
            self
        }
    }

    #[async_trait]
    impl DeviceApi for MockApi {
        async fn login(&self, device: &DeviceConfig) -> Result<Box<dyn DeviceHandle>, AuthError> {
            self.logins.lock().unwrap().push(device.hostname.clone());
            let mock = self
                .devices
                .get(&device.hostname)
                .filter(|d| d.accept_login)
                .ok_or(AuthError::Rejected(403))?;
            Ok(Box::new(MockHandle {
                host: device.hostname.clone(),
                device: mock.clone(),
                logouts: self.logouts.clone(),
            }))
        }
    }

    pub struct MockHandle {
        host: String,
        device: MockDevice,
        logouts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl DeviceHandle for MockHandle {
        fn host(&self) -> &str {
            &self.host
        }

        fn firmware_version(&self) -> FirmwareVersion {
            self.device.version
        }

        async fn monitor(&self, _vdom: &str) -> Result<Value, FetchError> {
            if self.device.fail_monitor {
                return Err(FetchError::Status(500));
            }
            Ok(self.device.payload.clone())
        }

        async fn logout(&self) -> anyhow::Result<()> {
            self.logouts.lock().unwrap().push(self.host.clone());
            if self.device.fail_logout {
                anyhow::bail!("logout refused");
            }
            Ok(())
        }
    }
}
