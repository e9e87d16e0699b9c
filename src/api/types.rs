//! Wire types for the center API and the public release index.

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub avatar: String,
    pub bandwidth_limit: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub created_at: String,
    pub email: String,
    pub has_kyc: bool,
    pub id: i64,
    pub is_baned: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kyc_status: String,
    pub max_tunnel_count: i64,
    pub role: String,
    pub today_checked: bool,
    pub traffic_limit: i64,
    pub traffic_used: i64,
    pub username: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserTraffic {
    pub user_id: String,
    pub username: String,
    pub traffic_limit: i64,
    pub traffic_used: i64,
    pub traffic_remaining: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelItem {
    pub bandwidth_limit: i64,
    pub custom_domain: String,
    pub id: i64,
    pub local_ip: String,
    pub local_port: i64,
    pub name: String,
    pub node_id: i64,
    pub remark: String,
    pub remote_port: i64,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub total_in: i64,
    pub total_out: i64,
    pub total_traffic: i64,
}

/// One page of the account's tunnels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelList {
    pub limit: i64,
    pub list: Vec<TunnelItem>,
    pub page: i64,
    pub total: i64,
    pub total_page: i64,
}

/// Full tunnel record, including the one-time launch token.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelDetail {
    pub bandwidth_limit: i64,
    pub client_version: String,
    pub created_at: String,
    pub custom_domain: String,
    pub id: i64,
    pub local_ip: String,
    pub local_port: i64,
    pub name: String,
    pub node_address: String,
    pub node_id: i64,
    pub node_name: String,
    pub remark: String,
    pub remote_port: i64,
    pub status: String,
    pub tunnel_token: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl std::fmt::Debug for TunnelDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelDetail")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("node_address", &self.node_address)
            .field("tunnel_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficTunnelItem {
    pub tunnel_name: String,
    pub node_id: String,
    pub total_in: i64,
    pub total_out: i64,
    pub total_traffic: i64,
    #[serde(rename = "max_connections")]
    pub max_connection: i64,
    pub remark: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficTunnels {
    pub count: i64,
    pub days: i64,
    pub tunnels: Vec<TrafficTunnelItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyTunnelStat {
    pub tunnel_name: String,
    pub remark: String,
    pub total_traffic: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyTrafficStat {
    pub date: String,
    pub total_traffic: i64,
    pub tunnel_stats: Vec<DailyTunnelStat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyTraffic {
    pub days: i64,
    pub daily_stats: Vec<DailyTrafficStat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeItem {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub ip_address: String,
    pub supported_protocols: Vec<String>,
    pub need_kyc: bool,
    pub frps_version: String,
    pub agent_version: String,
    pub frps_port: i64,
    pub sponsor: String,
    pub bandwidth: i64,
    pub last_seen: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeList {
    pub nodes: Vec<NodeItem>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Rendered tunnel client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub config: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppVersion {
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeStats {
    pub user_count: i64,
    pub tunnel_count: i64,
    pub total_traffic_used: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TunnelSummary {
    pub count: i64,
    pub total: i64,
}

/// Everything the overview screen needs in one value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub user: UserInfo,
    pub traffic: UserTraffic,
    pub tunnel: TunnelSummary,
    pub tunnels: Vec<TunnelItem>,
    pub app: AppVersion,
    pub home: HomeStats,
}

/// Inputs for launching a tunnel: client version, nodes and the chosen tunnel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerData {
    pub version: String,
    pub nodes: Vec<NodeItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tunnel: Option<TunnelItem>,
}

/// Release descriptor from the public release index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Release {
    #[serde(deserialize_with = "nullable")]
    pub tag_name: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub html_url: String,
    #[serde(deserialize_with = "nullable")]
    pub published_at: String,
    #[serde(deserialize_with = "nullable")]
    pub assets: Vec<ReleaseAssetEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseAssetEntry {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub browser_download_url: String,
    #[serde(deserialize_with = "nullable")]
    pub size: i64,
    #[serde(deserialize_with = "nullable")]
    pub content_type: String,
    /// `sha256:<hex>`, bare hex, or empty.
    #[serde(deserialize_with = "nullable")]
    pub digest: String,
}
