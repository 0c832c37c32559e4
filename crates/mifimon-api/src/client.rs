// ── Router client ──
//
// Thin facade over the transport and the session manager: one method per
// endpoint, plus the concurrent batch a poll cycle needs. Expiry policy
// (when to re-login and retry) belongs to the caller.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, trace};

use crate::endpoints;
use crate::error::Error;
use crate::models::{
    DeviceListResponse, HostnameEntry, RawSystemStatus, RouterSnapshot, StationEntry,
    hostname_entries, station_entries,
};
use crate::response::RawResponse;
use crate::session::{Credentials, SessionManager};
use crate::transport::{Transport, TransportConfig};

/// Latency value reported when the probe failed.
pub const LATENCY_UNAVAILABLE: i64 = -1;

/// Raw-socket client for one router. Cheap to clone.
#[derive(Clone)]
pub struct RouterClient {
    transport: Transport,
    session: Arc<SessionManager>,
    origin: String,
}

impl RouterClient {
    pub fn new(config: TransportConfig, credentials: Option<Credentials>) -> Self {
        let transport = Transport::new(config);
        let origin = format!("http://{}", transport.config().host_header());
        let session = Arc::new(SessionManager::new(transport.clone(), credentials));
        Self {
            transport,
            session,
            origin,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn transport_config(&self) -> &TransportConfig {
        self.transport.config()
    }

    // ── Endpoint calls ───────────────────────────────────────────────

    /// GET `path` and decode the body as JSON.
    pub async fn get_json(&self, path: &str, token: Option<&str>) -> Result<Value, Error> {
        let request = endpoints::get(path, &self.origin).cookie(token);
        let raw = self.transport.send(&request).await?;
        let response = RawResponse::parse(&raw);
        trace!(status = ?response.status, body_len = response.body.len(), "decoded reply");
        response.json()
    }

    pub async fn device_list(&self, token: Option<&str>) -> Result<DeviceListResponse, Error> {
        let value = self.get_json(endpoints::DEVICE_LIST_PATH, token).await?;
        Ok(DeviceListResponse::from_value(&value))
    }

    pub async fn station_list(&self, token: Option<&str>) -> Result<Vec<StationEntry>, Error> {
        let path = endpoints::station_list_path(now_ms());
        let value = self.get_json(&path, token).await?;
        Ok(value
            .get("station_list")
            .map_or_else(|| station_entries(&value), station_entries))
    }

    pub async fn hostname_list(&self, token: Option<&str>) -> Result<Vec<HostnameEntry>, Error> {
        let path = endpoints::hostname_list_path(now_ms());
        let value = self.get_json(&path, token).await?;
        Ok(hostname_entries(&value))
    }

    pub async fn system_status(&self, token: Option<&str>) -> Result<RawSystemStatus, Error> {
        let value = self.get_json(&endpoints::system_status_path(), token).await?;
        serde_json::from_value(value.clone())
            .map_err(|e| Error::malformed(format!("system status: {e}"), &value.to_string()))
    }

    /// Fetch device list, station list, hostname list and system status
    /// concurrently. The first failure fails the whole batch.
    pub async fn fetch_snapshot(&self, token: Option<&str>) -> Result<RouterSnapshot, Error> {
        let (devices, stations, hostnames, status) = tokio::try_join!(
            self.device_list(token),
            self.station_list(token),
            self.hostname_list(token),
            self.system_status(token),
        )?;

        debug!(
            stations = stations.len(),
            hostnames = hostnames.len(),
            "snapshot fetched"
        );

        Ok(RouterSnapshot {
            devices,
            stations,
            hostnames,
            status,
        })
    }

    // ── One-shot operations ──────────────────────────────────────────

    /// Round-trip time of a minimal request in milliseconds, or
    /// [`LATENCY_UNAVAILABLE`] if it failed.
    pub async fn probe_latency(&self) -> i64 {
        let request = endpoints::get(endpoints::LATENCY_PROBE_PATH, &self.origin);
        let started = Instant::now();
        match self.transport.send(&request).await {
            Ok(_) => i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
            Err(e) => {
                debug!(error = %e, "latency probe failed");
                LATENCY_UNAVAILABLE
            }
        }
    }

    /// Ask the router to reboot.
    ///
    /// Only failing to connect or to write the request is an error. The
    /// router usually drops off before replying; whatever comes back (or
    /// doesn't) counts as acceptance.
    pub async fn reboot(&self) -> Result<(), Error> {
        let token = self.session.ensure_token().await;
        let request = endpoints::post(endpoints::REBOOT_BODY, &self.origin).cookie(token.as_deref());
        let reply = self.transport.deliver(&request).await?;
        debug!(replied = reply.is_some(), "reboot request delivered");
        Ok(())
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
