mod error;
mod models;

pub use error::{DbError, Result};
pub use models::{NewTrackedStatus, PurgeOutcome, Sample, TrackedStatus};

use std::path::Path;
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite;
use tokio_rusqlite::rusqlite::{OptionalExtension, params};
use tracing::{debug, info};

/// Database wrapper for all Emberwatch operations.
#[derive(Clone)]
pub struct Database {
  conn: Connection,
}

fn read_status(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackedStatus> {
  Ok(TrackedStatus {
    id: row.get(0)?,
    server_id: row.get(1)?,
    server_name: row.get(2)?,
    server_version: row.get(3)?,
    java_address: row.get(4)?,
    bedrock_address: row.get(5)?,
    show_max_players: row.get(6)?,
    channel_id: row.get(7)?,
    message_id: row.get(8)?,
    last_refreshed_at: row.get(9)?,
  })
}

fn read_sample(row: &rusqlite::Row<'_>) -> rusqlite::Result<Sample> {
  let players_json: String = row.get(4)?;
  Ok(Sample {
    captured_at: row.get(0)?,
    online: row.get(1)?,
    player_count: row.get(2)?,
    max_players: row.get(3)?,
    // Tolerate rows written with a malformed player list rather than
    // failing the whole window read.
    players: serde_json::from_str(&players_json).unwrap_or_default(),
  })
}

const STATUS_COLUMNS: &str = "id, server_id, server_name, server_version, java_address, \
                              bedrock_address, show_max_players, channel_id, message_id, \
                              last_refreshed_at";

impl Database {
  /// Open or create a database at the given path.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path)
      .await
      .map_err(|e| DbError::Connection(e.into()))?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Create an in-memory database (useful for testing).
  pub async fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .await
      .map_err(|e| DbError::Connection(e.into()))?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Initialize the database schema.
  async fn initialize(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        // WAL mode for better concurrent read/write performance
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute_batch(
          r#"
          -- Bot-managed status displays
          CREATE TABLE IF NOT EXISTS tracked_status (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              server_id TEXT NOT NULL,
              server_name TEXT NOT NULL,
              server_version TEXT NOT NULL,
              java_address TEXT,
              bedrock_address TEXT,
              show_max_players INTEGER NOT NULL DEFAULT 0,
              channel_id INTEGER NOT NULL,
              message_id INTEGER,
              last_refreshed_at INTEGER NOT NULL
          );

          -- Append-only sample history, keyed by server (not display):
          -- every display of the same server shares one history.
          CREATE TABLE IF NOT EXISTS samples (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              server_id TEXT NOT NULL,
              captured_at INTEGER NOT NULL,
              online INTEGER NOT NULL,
              player_count INTEGER NOT NULL,
              max_players INTEGER NOT NULL,
              players TEXT NOT NULL
          );

          CREATE INDEX IF NOT EXISTS idx_samples_server_time
              ON samples(server_id, captured_at);
          CREATE INDEX IF NOT EXISTS idx_tracked_refreshed
              ON tracked_status(last_refreshed_at);
          "#,
        )?;
        Ok(())
      })
      .await?;

    info!("database initialized");
    Ok(())
  }

  // ========================================================================
  // Tracked statuses
  // ========================================================================

  /// Create a new tracked status. `now` becomes its first refresh stamp.
  pub async fn create_tracked(&self, new: NewTrackedStatus, now: i64) -> Result<TrackedStatus> {
    let status = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            "INSERT INTO tracked_status (server_id, server_name, server_version, java_address, \
             bedrock_address, show_max_players, channel_id, message_id, last_refreshed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          )?
          .execute(params![
            &new.server_id,
            &new.server_name,
            &new.server_version,
            &new.java_address,
            &new.bedrock_address,
            new.show_max_players,
            new.channel_id,
            new.message_id,
            now
          ])?;

        Ok(TrackedStatus {
          id: conn.last_insert_rowid(),
          server_id: new.server_id,
          server_name: new.server_name,
          server_version: new.server_version,
          java_address: new.java_address,
          bedrock_address: new.bedrock_address,
          show_max_players: new.show_max_players,
          channel_id: new.channel_id,
          message_id: new.message_id,
          last_refreshed_at: now,
        })
      })
      .await?;

    debug!(status.id, %status.server_id, "created tracked status");
    Ok(status)
  }

  /// All tracked statuses, oldest first.
  pub async fn list_tracked(&self) -> Result<Vec<TrackedStatus>> {
    let statuses = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&format!(
          "SELECT {STATUS_COLUMNS} FROM tracked_status ORDER BY id"
        ))?;

        let statuses = stmt
          .query_map([], read_status)?
          .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(statuses)
      })
      .await?;

    Ok(statuses)
  }

  /// Tracked statuses whose last refresh is at least `interval_secs` in
  /// the past.
  pub async fn due_statuses(&self, now: i64, interval_secs: i64) -> Result<Vec<TrackedStatus>> {
    let statuses = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&format!(
          "SELECT {STATUS_COLUMNS} FROM tracked_status \
           WHERE last_refreshed_at <= ?1 ORDER BY id"
        ))?;

        let statuses = stmt
          .query_map(params![now - interval_secs], read_status)?
          .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(statuses)
      })
      .await?;

    Ok(statuses)
  }

  /// Look up a tracked status by its bound message id.
  pub async fn get_by_message(&self, message_id: u64) -> Result<Option<TrackedStatus>> {
    let status = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(&format!(
            "SELECT {STATUS_COLUMNS} FROM tracked_status WHERE message_id = ?1"
          ))?
          .query_row(params![message_id], read_status)
          .optional()
      })
      .await?;

    Ok(status)
  }

  /// Point a tracked status at a (new) message. The reconciler calls this
  /// whenever the stored id turned out stale and a replacement was found
  /// or created.
  pub async fn bind_message(&self, id: i64, message_id: u64) -> Result<()> {
    let result = self
      .conn
      .call(move |conn| {
        let updated = conn
          .prepare_cached("UPDATE tracked_status SET message_id = ?2 WHERE id = ?1")?
          .execute(params![id, message_id])?;

        if updated == 0 {
          return Ok(Err(DbError::StatusNotFound));
        }

        Ok(Ok(()))
      })
      .await??;

    debug!(id, message_id, "bound status to message");
    Ok(result)
  }

  /// Record a successful reconciliation: refresh the display strings and
  /// the refresh timestamp.
  pub async fn mark_refreshed(
    &self,
    id: i64,
    server_name: String,
    server_version: String,
    now: i64,
  ) -> Result<()> {
    let result = self
      .conn
      .call(move |conn| {
        let updated = conn
          .prepare_cached(
            "UPDATE tracked_status SET server_name = ?2, server_version = ?3, \
             last_refreshed_at = ?4 WHERE id = ?1",
          )?
          .execute(params![id, &server_name, &server_version, now])?;

        if updated == 0 {
          return Ok(Err(DbError::StatusNotFound));
        }

        Ok(Ok(()))
      })
      .await??;

    Ok(result)
  }

  /// Delete a single tracked status. Its sample history stays (samples are
  /// server-scoped; use [`Database::purge_server`] to drop everything).
  pub async fn delete_tracked(&self, id: i64) -> Result<()> {
    let result = self
      .conn
      .call(move |conn| {
        let deleted = conn
          .prepare_cached("DELETE FROM tracked_status WHERE id = ?1")?
          .execute(params![id])?;

        if deleted == 0 {
          return Ok(Err(DbError::StatusNotFound));
        }

        Ok(Ok(()))
      })
      .await??;

    debug!(id, "deleted tracked status");
    Ok(result)
  }

  /// Wipe every display and every sample for a server.
  pub async fn purge_server(&self, server_id: String) -> Result<PurgeOutcome> {
    let server_id_log = server_id.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let statuses_deleted = tx
          .prepare_cached("DELETE FROM tracked_status WHERE server_id = ?1")?
          .execute(params![&server_id])? as u64;

        let samples_deleted = tx
          .prepare_cached("DELETE FROM samples WHERE server_id = ?1")?
          .execute(params![&server_id])? as u64;

        tx.commit()?;
        Ok(PurgeOutcome {
          statuses_deleted,
          samples_deleted,
        })
      })
      .await?;

    debug!(
      server_id = %server_id_log,
      outcome.statuses_deleted,
      outcome.samples_deleted,
      "purged server"
    );
    Ok(outcome)
  }

  // ========================================================================
  // Samples
  // ========================================================================

  /// Append one observation to a server's history. Samples are immutable
  /// once written.
  pub async fn append_sample(&self, server_id: String, sample: Sample) -> Result<()> {
    let players_json = serde_json::to_string(&sample.players)?;

    self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            "INSERT INTO samples (server_id, captured_at, online, player_count, max_players, \
             players) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          )?
          .execute(params![
            &server_id,
            sample.captured_at,
            sample.online,
            sample.player_count,
            sample.max_players,
            &players_json
          ])?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  /// Samples for one server in `[from, to]`, ascending by capture time.
  /// Ties keep insertion order.
  pub async fn sample_window(&self, server_id: String, from: i64, to: i64) -> Result<Vec<Sample>> {
    let samples = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT captured_at, online, player_count, max_players, players FROM samples \
           WHERE server_id = ?1 AND captured_at >= ?2 AND captured_at <= ?3 \
           ORDER BY captured_at ASC, id ASC",
        )?;

        let samples = stmt
          .query_map(params![&server_id, from, to], read_sample)?
          .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(samples)
      })
      .await?;

    Ok(samples)
  }

  /// Drop samples captured before `cutoff`, across all servers. Retention
  /// is the caller's policy; this is a no-op when nothing qualifies.
  pub async fn prune_samples_before(&self, cutoff: i64) -> Result<u64> {
    let deleted = self
      .conn
      .call(move |conn| {
        let deleted = conn
          .prepare_cached("DELETE FROM samples WHERE captured_at < ?1")?
          .execute(params![cutoff])?;
        Ok(deleted as u64)
      })
      .await?;

    if deleted > 0 {
      debug!(deleted, "pruned old samples");
    }

    Ok(deleted)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn now() -> i64 {
    1700000000 // Fixed timestamp for testing
  }

  fn new_status(server_id: &str, channel_id: u64) -> NewTrackedStatus {
    NewTrackedStatus {
      server_id: server_id.to_string(),
      server_name: "Survival SMP".to_string(),
      server_version: "1.20.4".to_string(),
      java_address: Some("play.example.org".to_string()),
      bedrock_address: None,
      show_max_players: false,
      channel_id,
      message_id: None,
    }
  }

  fn sample_at(captured_at: i64, player_count: u32) -> Sample {
    Sample {
      captured_at,
      online: true,
      player_count,
      max_players: 20,
      players: vec!["Steve".to_string(), "Alex".to_string()],
    }
  }

  #[tokio::test]
  async fn test_tracked_status_lifecycle() {
    let db = Database::open_in_memory().await.unwrap();

    let status = db.create_tracked(new_status("abc", 100), now()).await.unwrap();
    assert_eq!(status.server_id, "abc");
    assert_eq!(status.channel_id, 100);
    assert_eq!(status.message_id, None);
    assert_eq!(status.last_refreshed_at, now());

    let all = db.list_tracked().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, status.id);

    db.delete_tracked(status.id).await.unwrap();
    assert!(db.list_tracked().await.unwrap().is_empty());

    // Deleting again reports not-found
    assert!(db.delete_tracked(status.id).await.is_err());
  }

  #[tokio::test]
  async fn test_due_statuses_filters_by_refresh_age() {
    let db = Database::open_in_memory().await.unwrap();

    let stale = db.create_tracked(new_status("abc", 100), now() - 600).await.unwrap();
    let fresh = db.create_tracked(new_status("def", 101), now() - 30).await.unwrap();

    let due = db.due_statuses(now(), 300).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, stale.id);

    // Exactly at the boundary counts as due
    let due = db.due_statuses(now(), 30).await.unwrap();
    assert_eq!(due.len(), 2);
    assert_eq!(due[1].id, fresh.id);
  }

  #[tokio::test]
  async fn test_bind_message_and_lookup() {
    let db = Database::open_in_memory().await.unwrap();

    let status = db.create_tracked(new_status("abc", 100), now()).await.unwrap();
    db.bind_message(status.id, 555).await.unwrap();

    let found = db.get_by_message(555).await.unwrap().unwrap();
    assert_eq!(found.id, status.id);
    assert_eq!(found.message_id, Some(555));

    assert!(db.get_by_message(556).await.unwrap().is_none());
    assert!(db.bind_message(status.id + 99, 555).await.is_err());
  }

  #[tokio::test]
  async fn test_mark_refreshed_updates_display_strings() {
    let db = Database::open_in_memory().await.unwrap();

    let status = db.create_tracked(new_status("abc", 100), now() - 600).await.unwrap();
    db.mark_refreshed(status.id, "Renamed".to_string(), "1.21".to_string(), now())
      .await
      .unwrap();

    let all = db.list_tracked().await.unwrap();
    assert_eq!(all[0].server_name, "Renamed");
    assert_eq!(all[0].server_version, "1.21");
    assert_eq!(all[0].last_refreshed_at, now());

    // Not due anymore
    assert!(db.due_statuses(now(), 300).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_sample_window_ordering_and_bounds() {
    let db = Database::open_in_memory().await.unwrap();

    // Inserted out of order; the window read must come back ascending
    db.append_sample("abc".to_string(), sample_at(now() + 120, 3)).await.unwrap();
    db.append_sample("abc".to_string(), sample_at(now(), 1)).await.unwrap();
    db.append_sample("abc".to_string(), sample_at(now() + 60, 2)).await.unwrap();
    // Outside the window
    db.append_sample("abc".to_string(), sample_at(now() - 500, 9)).await.unwrap();
    // Different server
    db.append_sample("def".to_string(), sample_at(now(), 7)).await.unwrap();

    let window = db
      .sample_window("abc".to_string(), now(), now() + 120)
      .await
      .unwrap();
    let counts: Vec<u32> = window.iter().map(|s| s.player_count).collect();
    assert_eq!(counts, vec![1, 2, 3]);
    assert_eq!(window[0].players, vec!["Steve", "Alex"]);
  }

  #[tokio::test]
  async fn test_sample_window_keeps_insertion_order_on_ties() {
    let db = Database::open_in_memory().await.unwrap();

    db.append_sample("abc".to_string(), sample_at(now(), 1)).await.unwrap();
    db.append_sample("abc".to_string(), sample_at(now(), 2)).await.unwrap();

    let window = db
      .sample_window("abc".to_string(), now(), now())
      .await
      .unwrap();
    let counts: Vec<u32> = window.iter().map(|s| s.player_count).collect();
    assert_eq!(counts, vec![1, 2]);
  }

  #[tokio::test]
  async fn test_purge_server_removes_displays_and_history() {
    let db = Database::open_in_memory().await.unwrap();

    db.create_tracked(new_status("abc", 100), now()).await.unwrap();
    db.create_tracked(new_status("abc", 101), now()).await.unwrap();
    let other = db.create_tracked(new_status("def", 102), now()).await.unwrap();
    db.append_sample("abc".to_string(), sample_at(now(), 1)).await.unwrap();
    db.append_sample("abc".to_string(), sample_at(now() + 60, 2)).await.unwrap();
    db.append_sample("def".to_string(), sample_at(now(), 3)).await.unwrap();

    let outcome = db.purge_server("abc".to_string()).await.unwrap();
    assert_eq!(outcome.statuses_deleted, 2);
    assert_eq!(outcome.samples_deleted, 2);

    let remaining = db.list_tracked().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, other.id);
    assert_eq!(
      db.sample_window("def".to_string(), now(), now()).await.unwrap().len(),
      1
    );
  }

  #[tokio::test]
  async fn test_prune_samples_before_cutoff() {
    let db = Database::open_in_memory().await.unwrap();

    db.append_sample("abc".to_string(), sample_at(now() - 1000, 1)).await.unwrap();
    db.append_sample("abc".to_string(), sample_at(now(), 2)).await.unwrap();

    let deleted = db.prune_samples_before(now() - 100).await.unwrap();
    assert_eq!(deleted, 1);

    let window = db
      .sample_window("abc".to_string(), now() - 2000, now())
      .await
      .unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].player_count, 2);

    // Nothing left to prune
    assert_eq!(db.prune_samples_before(now() - 100).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_empty_player_list_round_trip() {
    let db = Database::open_in_memory().await.unwrap();

    let sample = Sample {
      captured_at: now(),
      online: false,
      player_count: 0,
      max_players: 20,
      players: vec![],
    };
    db.append_sample("abc".to_string(), sample.clone()).await.unwrap();

    let window = db
      .sample_window("abc".to_string(), now(), now())
      .await
      .unwrap();
    assert_eq!(window, vec![sample]);
  }
}
