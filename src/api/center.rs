//! Typed read operations against the center API.

use super::error::ApiError;
use super::http::EnvelopeClient;
use super::types::{
    AppVersion, ClientConfig, DailyTraffic, Dashboard, HomeStats, NodeList, RunnerData,
    TrafficTunnelItem, TrafficTunnels, TunnelDetail, TunnelList, TunnelSummary, UserInfo,
    UserTraffic,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Default center API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.lolia.link/api/v1";

/// Page size used when the caller needs "all" tunnels for a lookup.
const LOOKUP_PAGE_SIZE: u32 = 100;
/// Page size for the dashboard's tunnel preview.
const DASHBOARD_PAGE_SIZE: u32 = 20;
/// Default window for daily traffic.
const DEFAULT_TRAFFIC_DAYS: i32 = 7;

/// Thin typed wrappers over the envelope client. Calls are never retried.
#[derive(Debug)]
pub struct CenterApi {
    client: EnvelopeClient,
}

impl CenterApi {
    #[must_use]
    pub fn new(client: EnvelopeClient) -> Self {
        Self { client }
    }

    async fn get_or_default<T: DeserializeOwned + Default>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        Ok(self.client.get(path, query).await?.unwrap_or_default())
    }

    pub async fn user_info(&self) -> Result<UserInfo, ApiError> {
        self.get_or_default("/user/info", &[]).await
    }

    pub async fn traffic_stats(&self) -> Result<UserTraffic, ApiError> {
        self.get_or_default("/user/traffic/stats", &[]).await
    }

    pub async fn tunnels(&self, page: u32, limit: u32) -> Result<TunnelList, ApiError> {
        let query = [("page", page.to_string()), ("limit", limit.to_string())];
        self.get_or_default("/user/tunnel", &query).await
    }

    /// Per-tunnel traffic totals over the last `days`.
    pub async fn traffic_tunnels(&self, days: i32) -> Result<TrafficTunnels, ApiError> {
        self.get_or_default("/user/traffic/tunnels", &[("days", days.to_string())])
            .await
    }

    /// Per-day traffic totals. `days <= 0` means the last week.
    pub async fn traffic_daily(&self, days: i32) -> Result<DailyTraffic, ApiError> {
        let days = if days <= 0 { DEFAULT_TRAFFIC_DAYS } else { days };
        self.get_or_default("/user/traffic/daily", &[("days", days.to_string())])
            .await
    }

    pub async fn nodes(&self) -> Result<NodeList, ApiError> {
        Ok(self
            .client
            .post("/user/nodes", &serde_json::json!({}))
            .await?
            .unwrap_or_default())
    }

    /// Rendered client config for a tunnel.
    pub async fn client_config(&self, tunnel: &str) -> Result<ClientConfig, ApiError> {
        self.get_or_default("/user/frpc/config", &[("tunnel", tunnel.trim().to_string())])
            .await
    }

    /// Full tunnel record by name. A blank name short-circuits to `None`.
    pub async fn tunnel_detail(&self, name: &str) -> Result<Option<TunnelDetail>, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let path = format!("/user/tunnel/{}", urlencoding::encode(name));
        self.client.get(&path, &[]).await
    }

    pub async fn client_version(&self) -> Result<AppVersion, ApiError> {
        self.get_or_default("/client/version", &[]).await
    }

    pub async fn home_stats(&self) -> Result<HomeStats, ApiError> {
        self.get_or_default("/home", &[]).await
    }

    /// Account overview. The first failing call aborts the whole lookup.
    pub async fn dashboard(&self) -> Result<Dashboard, ApiError> {
        let user = self.user_info().await?;
        let traffic = self.traffic_stats().await?;
        let tunnels = self.tunnels(1, DASHBOARD_PAGE_SIZE).await?;
        let app = self.client_version().await?;
        let home = self.home_stats().await?;

        Ok(Dashboard {
            user,
            traffic,
            tunnel: TunnelSummary {
                count: tunnels.list.len() as i64,
                total: tunnels.total,
            },
            tunnels: tunnels.list,
            app,
            home,
        })
    }

    /// A page of tunnels with traffic totals merged in.
    ///
    /// Traffic is best-effort: if that lookup fails the tunnels are returned
    /// without totals.
    pub async fn tunnels_overview(
        &self,
        page: u32,
        limit: u32,
        days: i32,
    ) -> Result<TunnelList, ApiError> {
        let mut tunnels = self.tunnels(page, limit).await?;
        if days <= 0 {
            return Ok(tunnels);
        }

        let traffic = match self.traffic_tunnels(days).await {
            Ok(traffic) => traffic,
            Err(e) => {
                tracing::debug!(error = %e, "Tunnel traffic lookup failed");
                return Ok(tunnels);
            }
        };
        let by_name: HashMap<&str, &TrafficTunnelItem> = traffic
            .tunnels
            .iter()
            .map(|item| (item.tunnel_name.trim(), item))
            .collect();

        for tunnel in &mut tunnels.list {
            if let Some(item) = by_name.get(tunnel.name.trim()) {
                tunnel.total_in = item.total_in;
                tunnel.total_out = item.total_out;
                tunnel.total_traffic = item.total_traffic;
            }
        }
        Ok(tunnels)
    }

    /// Client version, nodes, and the tunnel with `tunnel_id` (or the first one).
    pub async fn runner_data(&self, tunnel_id: i64) -> Result<RunnerData, ApiError> {
        let version = self.client_version().await?;
        let nodes = self.nodes().await?;
        let tunnels = self.tunnels(1, LOOKUP_PAGE_SIZE).await?;

        let current_tunnel = tunnels
            .list
            .iter()
            .find(|t| tunnel_id > 0 && t.id == tunnel_id)
            .or_else(|| tunnels.list.first())
            .cloned();

        Ok(RunnerData {
            version: version.version,
            nodes: nodes.nodes,
            current_tunnel,
        })
    }
}
