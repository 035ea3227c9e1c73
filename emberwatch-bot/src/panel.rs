//! Sampler for the panel's status API.
//!
//! One authenticated read per cycle: `GET /api/v2/servers/{id}/stats`.
//! Anything that keeps us from getting a usable payload (transport
//! failure, timeout, non-2xx, a non-"ok" status discriminator) collapses
//! into [`SampleError::Unavailable`]; the reconciler skips the cycle and
//! retries next tick. A malformed player list is NOT a failure: the rest
//! of the sample is still worth displaying.

use std::time::Duration;

use emberwatch_db::Sample;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::helpers;
use crate::playerlist::parse_player_list;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("panel unavailable: {0}")]
    Unavailable(String),
}

/// A normalized observation plus the canonical identity strings that come
/// with it.
#[derive(Debug, Clone)]
pub struct SampledStatus {
    pub server_name: String,
    pub server_version: String,
    pub sample: Sample,
}

/// Where status observations come from. The production implementation is
/// [`PanelClient`]; tests substitute a fake.
#[serenity::async_trait]
pub trait StatusSource: Send + Sync {
    async fn sample(&self, server_id: &str) -> Result<SampledStatus, SampleError>;
}

/// HTTP client for a Crafty-compatible management panel.
pub struct PanelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PanelClient {
    /// Build a client with a bounded per-request timeout. A hung panel
    /// must not stall the reconciler tick indefinitely.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// How many servers the API key can see. Used once at startup to
    /// validate the key before the reconciler starts.
    pub async fn server_count(&self) -> Result<usize, SampleError> {
        let url = format!("{}/api/v2/servers", self.base_url);
        let response: ServerListResponse = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|err| SampleError::Unavailable(err.to_string()))?
            .json()
            .await
            .map_err(|err| SampleError::Unavailable(err.to_string()))?;

        if response.status != "ok" {
            return Err(SampleError::Unavailable(format!(
                "server list returned status {:?}",
                response.status
            )));
        }

        Ok(response.data.len())
    }
}

#[serenity::async_trait]
impl StatusSource for PanelClient {
    async fn sample(&self, server_id: &str) -> Result<SampledStatus, SampleError> {
        let url = format!("{}/api/v2/servers/{}/stats", self.base_url, server_id);
        let response: StatsResponse = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|err| SampleError::Unavailable(err.to_string()))?
            .json()
            .await
            .map_err(|err| SampleError::Unavailable(err.to_string()))?;

        if response.status != "ok" {
            return Err(SampleError::Unavailable(format!(
                "stats returned status {:?}",
                response.status
            )));
        }

        let stats = response
            .data
            .ok_or_else(|| SampleError::Unavailable("ok response without data".to_string()))?;

        Ok(normalize(server_id, stats, helpers::now()))
    }
}

/// Turn a raw stats payload into a canonical observation.
fn normalize(server_id: &str, stats: ServerStats, captured_at: i64) -> SampledStatus {
    let players = match parse_player_list(&stats.players) {
        Ok(players) => players,
        Err(warning) => {
            warn!(server_id, %warning, "discarding malformed player list");
            Vec::new()
        }
    };

    SampledStatus {
        server_name: stats.server_id.server_name,
        server_version: scrub_version(&stats.version),
        sample: Sample {
            captured_at,
            online: stats.running,
            // The panel has been seen reporting negative counts while a
            // server boots; clamp rather than reject.
            player_count: stats.online.max(0) as u32,
            max_players: stats.max.max(0) as u32,
            players,
        },
    }
}

/// Keep only digits and dots, e.g. "Paper 1.20.4" -> "1.20.4".
fn scrub_version(version: &str) -> String {
    version
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect()
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    status: String,
    #[serde(default)]
    data: Option<ServerStats>,
}

#[derive(Debug, Deserialize)]
struct ServerStats {
    server_id: ServerIdentity,
    running: bool,
    online: i64,
    max: i64,
    version: String,
    players: String,
}

#[derive(Debug, Deserialize)]
struct ServerIdentity {
    server_name: String,
}

#[derive(Debug, Deserialize)]
struct ServerListResponse {
    status: String,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}
