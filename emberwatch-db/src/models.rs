/// One observation of a monitored server at a point in time.
///
/// Samples are append-only and server-scoped: every display tracking the
/// same server shares one history. `player_count` is not checked against
/// `max_players`: the panel occasionally reports inconsistent numbers and
/// a monitoring display prefers odd data over no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
  /// Unix timestamp of the observation, set by the sampler. Immutable.
  pub captured_at: i64,
  /// Whether the server process was running at capture time.
  pub online: bool,
  /// Reported player count.
  pub player_count: u32,
  /// Reported player cap. May change between samples when the server is
  /// reconfigured.
  pub max_players: u32,
  /// Player display names, in the order the panel reported them. The
  /// length need not match `player_count`.
  pub players: Vec<String>,
}

/// A bot-managed status display: one monitored server bound to one
/// Discord message that gets edited in place.
#[derive(Debug, Clone)]
pub struct TrackedStatus {
  pub id: i64,
  /// Panel UUID of the monitored server.
  pub server_id: String,
  /// Last-known server name, refreshed on every successful cycle.
  pub server_name: String,
  /// Last-known server version, digits-and-dots only.
  pub server_version: String,
  /// Java address to show in the embed, if any.
  pub java_address: Option<String>,
  /// Bedrock address (`host` or `host:port`) to show in the embed, if any.
  pub bedrock_address: Option<String>,
  /// When true the chart y-axis is pinned to the server's player cap
  /// instead of the observed 24h peak.
  pub show_max_players: bool,
  /// Channel the bound message lives in.
  pub channel_id: u64,
  /// Bound message id. Absent until first publish, and possibly stale;
  /// the reconciler re-resolves it every cycle.
  pub message_id: Option<u64>,
  /// Unix timestamp of the last successful reconciliation.
  pub last_refreshed_at: i64,
}

/// Parameters for creating a tracked status.
#[derive(Debug, Clone)]
pub struct NewTrackedStatus {
  pub server_id: String,
  pub server_name: String,
  pub server_version: String,
  pub java_address: Option<String>,
  pub bedrock_address: Option<String>,
  pub show_max_players: bool,
  pub channel_id: u64,
  pub message_id: Option<u64>,
}

/// What a purge removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeOutcome {
  pub statuses_deleted: u64,
  pub samples_deleted: u64,
}
