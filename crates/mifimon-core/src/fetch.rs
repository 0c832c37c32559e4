// ── Fetch orchestration ──
//
// One poll cycle against the router: ensure a session, fetch the batch,
// detect a blanked device list, refresh the session and retry once. Any
// failure invalidates the token so the next cycle starts clean.

use tracing::{debug, info, warn};

use mifimon_api::{RawSystemStatus, RouterClient, RouterSnapshot};

use crate::error::CoreError;

/// Fetch and merge the full endpoint batch.
pub(crate) async fn fetch_cycle(client: &RouterClient) -> Result<RouterSnapshot, CoreError> {
    match fetch_with_retry(client).await {
        Ok(snapshot) => Ok(snapshot),
        Err(e) => {
            warn!(error = %e, "poll cycle failed, dropping session");
            client.session().invalidate().await;
            Err(e)
        }
    }
}

/// Fetch only the status endpoint.
pub(crate) async fn fetch_status(client: &RouterClient) -> Result<RawSystemStatus, CoreError> {
    let token = client.session().ensure_token().await;
    match client.system_status(token.as_deref()).await {
        Ok(status) => Ok(status),
        Err(e) => {
            warn!(error = %e, "status poll failed, dropping session");
            client.session().invalidate().await;
            Err(e.into())
        }
    }
}

async fn fetch_with_retry(client: &RouterClient) -> Result<RouterSnapshot, CoreError> {
    let session = client.session();
    let token = session.ensure_token().await;
    let snapshot = client.fetch_snapshot(token.as_deref()).await?;

    if !snapshot.devices.all_slots_empty() {
        return Ok(snapshot);
    }
    if !session.has_credentials() {
        // Nothing to refresh with: an empty list is an idle hotspot.
        debug!("device list empty and no credentials configured");
        return Ok(snapshot);
    }

    info!("device list blank, refreshing session and retrying once");
    let fresh = session.relogin().await;
    let retried = client.fetch_snapshot(fresh.as_deref()).await?;

    match (retried.devices.all_slots_empty(), fresh) {
        (true, None) => Err(CoreError::SessionExpired),
        (true, Some(_)) => {
            debug!("device list still empty under a fresh session, no devices connected");
            Ok(retried)
        }
        (false, _) => Ok(retried),
    }
}
