//! SQLite snapshot store for hosts without a save container of their own.
//!
//! Every campaign keeps its most recent saves, numbered per campaign:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS campaign_snapshots (
//!     campaign    TEXT    NOT NULL,
//!     seq         INTEGER NOT NULL,
//!     game_time   INTEGER NOT NULL,
//!     schema      INTEGER NOT NULL,
//!     live_quests INTEGER NOT NULL,
//!     saved_at    TEXT    NOT NULL,
//!     data        BLOB    NOT NULL,
//!     PRIMARY KEY (campaign, seq)
//! );
//! ```
//!
//! A row carries the board schema version and the numbers a load menu
//! shows, so neither needs the blob decoded. Rows written by a newer
//! build are refused before their blob is handed out. Saving prunes the
//! campaign down to `persistence.snapshots_per_campaign`.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Params, Row, params};
use sidequest_core::QuestError;
use sidequest_core::config::PersistenceConfig;
use sidequest_core::persistence::SCHEMA_VERSION;
use sidequest_core::types::CampaignTime;
use tracing::{debug, info};

use crate::error::Result;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS campaign_snapshots (
    campaign    TEXT    NOT NULL,
    seq         INTEGER NOT NULL,
    game_time   INTEGER NOT NULL,
    schema      INTEGER NOT NULL,
    live_quests INTEGER NOT NULL,
    saved_at    TEXT    NOT NULL,
    data        BLOB    NOT NULL,
    PRIMARY KEY (campaign, seq)
);";

const HEADER: &str = "campaign, seq, game_time, schema, live_quests, saved_at, length(data)";

/// What the campaign was like when it was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotMeta {
    /// Campaign clock at the save.
    pub game_time: CampaignTime,
    /// Board schema version of the blob.
    pub schema: u16,
    /// Quests still running.
    pub live_quests: usize,
}

/// Header of a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Campaign key.
    pub campaign: String,
    /// Per-campaign sequence number, starting at 1.
    pub seq: u64,
    /// Recorded beside the blob.
    pub meta: SnapshotMeta,
    /// Wall-clock time of the write.
    pub saved_at: DateTime<Utc>,
    /// Blob size.
    pub bytes: usize,
}

/// A snapshot header with its blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    /// Header.
    pub info: SnapshotInfo,
    /// Whatever the campaign rule encoded.
    pub data: Vec<u8>,
}

fn info_from_row(row: &Row<'_>) -> rusqlite::Result<SnapshotInfo> {
    let saved_at: String = row.get(5)?;
    let saved_at = DateTime::parse_from_rfc3339(&saved_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);
    Ok(SnapshotInfo {
        campaign: row.get(0)?,
        seq: row.get(1)?,
        meta: SnapshotMeta {
            game_time: CampaignTime(row.get(2)?),
            schema: row.get(3)?,
            live_quests: row.get(4)?,
        },
        saved_at,
        bytes: row.get(6)?,
    })
}

/// Campaign snapshots in one SQLite database.
#[derive(Debug)]
pub struct SnapshotStore {
    conn: Connection,
    keep: u32,
}

impl SnapshotStore {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CampaignError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let path = path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %path.display(),
            keep = config.snapshots_per_campaign,
            "Snapshot store opened"
        );
        Ok(Self {
            conn,
            keep: config.snapshots_per_campaign,
        })
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CampaignError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            keep: config.snapshots_per_campaign,
        })
    }

    /// Append a snapshot for `campaign` and prune its oldest ones.
    /// Returns the new sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CampaignError::Database`] on SQLite failures.
    pub fn save(&self, campaign: &str, meta: SnapshotMeta, data: &[u8]) -> Result<u64> {
        let tx = self.conn.unchecked_transaction()?;
        let seq: u64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM campaign_snapshots WHERE campaign = ?1",
            params![campaign],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO campaign_snapshots
                (campaign, seq, game_time, schema, live_quests, saved_at, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                campaign,
                seq,
                meta.game_time.0,
                meta.schema,
                meta.live_quests,
                Utc::now().to_rfc3339(),
                data
            ],
        )?;
        let pruned = tx.execute(
            "DELETE FROM campaign_snapshots WHERE campaign = ?1 AND seq <= ?2",
            params![campaign, seq.saturating_sub(u64::from(self.keep))],
        )?;
        tx.commit()?;

        debug!(
            campaign,
            seq,
            bytes = data.len(),
            pruned,
            game_time = %meta.game_time,
            "Snapshot saved"
        );
        Ok(seq)
    }

    /// The newest snapshot of `campaign`.
    ///
    /// # Errors
    ///
    /// `Database` on SQLite failures; `UnsupportedSchema` if the row was
    /// written by a newer build.
    pub fn latest(&self, campaign: &str) -> Result<Option<StoredSnapshot>> {
        self.fetch(
            &format!(
                "SELECT {HEADER}, data FROM campaign_snapshots
                 WHERE campaign = ?1 ORDER BY seq DESC LIMIT 1"
            ),
            params![campaign],
        )
    }

    /// One snapshot by sequence number.
    ///
    /// # Errors
    ///
    /// As [`Self::latest`].
    pub fn get(&self, campaign: &str, seq: u64) -> Result<Option<StoredSnapshot>> {
        self.fetch(
            &format!(
                "SELECT {HEADER}, data FROM campaign_snapshots
                 WHERE campaign = ?1 AND seq = ?2"
            ),
            params![campaign, seq],
        )
    }

    fn fetch<P: Params>(&self, sql: &str, params: P) -> Result<Option<StoredSnapshot>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let found = stmt
            .query_row(params, |row| Ok((info_from_row(row)?, row.get::<_, Vec<u8>>(7)?)))
            .optional()?;
        let Some((info, data)) = found else {
            return Ok(None);
        };
        if info.meta.schema > SCHEMA_VERSION {
            return Err(QuestError::UnsupportedSchema {
                found: info.meta.schema,
                supported: SCHEMA_VERSION,
            }
            .into());
        }
        Ok(Some(StoredSnapshot { info, data }))
    }

    /// Headers of `campaign`'s snapshots, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CampaignError::Database`] on SQLite failures.
    pub fn history(&self, campaign: &str) -> Result<Vec<SnapshotInfo>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {HEADER} FROM campaign_snapshots WHERE campaign = ?1 ORDER BY seq DESC"
        ))?;
        let rows = stmt.query_map(params![campaign], info_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every campaign with at least one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CampaignError::Database`] on SQLite failures.
    pub fn campaigns(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT DISTINCT campaign FROM campaign_snapshots ORDER BY campaign")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Drop every snapshot of `campaign`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CampaignError::Database`] on SQLite failures.
    pub fn delete_campaign(&self, campaign: &str) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM campaign_snapshots WHERE campaign = ?1",
            params![campaign],
        )?;
        info!(campaign, removed, "Campaign snapshots deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CampaignError;

    fn store(keep: u32) -> SnapshotStore {
        let config = PersistenceConfig {
            snapshots_per_campaign: keep,
            ..PersistenceConfig::default()
        };
        SnapshotStore::open_in_memory(&config).expect("open")
    }

    fn meta(day: u64) -> SnapshotMeta {
        SnapshotMeta {
            game_time: CampaignTime::from_days(day),
            schema: SCHEMA_VERSION,
            live_quests: 2,
        }
    }

    #[test]
    fn latest_returns_the_newest_save() {
        let store = store(3);
        assert!(store.latest("north").expect("latest").is_none());
        assert_eq!(store.save("north", meta(1), b"first").expect("save"), 1);
        assert_eq!(store.save("north", meta(4), b"second").expect("save"), 2);

        let newest = store.latest("north").expect("latest").expect("present");
        assert_eq!(newest.data, b"second");
        assert_eq!(newest.info.seq, 2);
        assert_eq!(newest.info.meta, meta(4));
        assert_eq!(newest.info.bytes, 6);
    }

    #[test]
    fn campaigns_are_numbered_separately() {
        let store = store(3);
        store.save("north", meta(1), b"n").expect("save");
        store.save("north", meta(2), b"n").expect("save");
        assert_eq!(store.save("south", meta(1), b"s").expect("save"), 1);
        assert_eq!(store.campaigns().expect("campaigns"), vec!["north", "south"]);
    }

    #[test]
    fn saving_prunes_to_the_configured_count() {
        let store = store(2);
        for day in 1..=4 {
            store.save("north", meta(day), &[u8::try_from(day).expect("small")]).expect("save");
        }
        let seqs: Vec<u64> = store
            .history("north")
            .expect("history")
            .iter()
            .map(|info| info.seq)
            .collect();
        assert_eq!(seqs, vec![4, 3]);
        assert!(store.get("north", 1).expect("get").is_none());
        assert_eq!(store.get("north", 3).expect("get").expect("kept").data, vec![3]);
    }

    #[test]
    fn newer_schema_is_refused() {
        let store = store(3);
        let future = SnapshotMeta {
            schema: SCHEMA_VERSION + 1,
            ..meta(1)
        };
        store.save("north", future, b"from the future").expect("save");
        let err = store.latest("north").expect_err("newer build");
        assert!(matches!(
            err,
            CampaignError::Quest(QuestError::UnsupportedSchema { found, .. }) if found == SCHEMA_VERSION + 1
        ));
    }

    #[test]
    fn deleting_a_campaign_leaves_the_others() {
        let store = store(3);
        store.save("north", meta(1), b"n").expect("save");
        store.save("north", meta(2), b"n").expect("save");
        store.save("south", meta(1), b"s").expect("save");

        assert_eq!(store.delete_campaign("north").expect("delete"), 2);
        assert!(store.latest("north").expect("latest").is_none());
        assert_eq!(store.campaigns().expect("campaigns"), vec!["south"]);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snapshots.db");
        let config = PersistenceConfig::default();
        {
            let store = SnapshotStore::open(&path, &config).expect("open");
            store.save("north", meta(3), b"kept").expect("save");
        }
        let store = SnapshotStore::open(&path, &config).expect("reopen");
        let snapshot = store.latest("north").expect("latest").expect("present");
        assert_eq!(snapshot.data, b"kept");
        assert_eq!(snapshot.info.meta.game_time, CampaignTime::from_days(3));
    }
}
