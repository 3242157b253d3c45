use crate::app_dirs::AppDirs;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Result};
use std::io;
use std::path::{Path, PathBuf};

/// One dispatched cue, as recorded in the play log. The name is
/// denormalized so history survives command deletion.
#[derive(Debug, Clone)]
pub struct PlayRecord {
    pub command_id: String,
    pub command_name: String,
    pub played_at: DateTime<Local>,
}

/// Per-command rollup of the play log.
#[derive(Debug, Clone)]
pub struct PlaySummary {
    pub command_id: String,
    pub command_name: String,
    pub total_plays: i64,
    pub last_played: Option<DateTime<Local>>,
}

/// Outcome of one finished or aborted session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub started_at: DateTime<Local>,
    pub duration_secs: u64,
    pub cues_planned: usize,
    pub cues_played: usize,
}

/// Database manager for cue play history
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open the database at the default location, creating tables as
    /// needed.
    pub fn new() -> Result<Self> {
        let db_path =
            AppDirs::history_db_path().unwrap_or_else(|| PathBuf::from("drillcall_history.db"));
        Self::open(&db_path)
    }

    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        let conn = Connection::open(db_path)?;
        Self::init_tables(&conn)?;
        Ok(HistoryDb { conn })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_tables(&conn)?;
        Ok(HistoryDb { conn })
    }

    fn init_tables(conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS play_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                command_id TEXT NOT NULL,
                command_name TEXT NOT NULL,
                played_at TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_play_log_command ON play_log(command_id)",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS session_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                cues_planned INTEGER NOT NULL,
                cues_played INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        Ok(())
    }

    /// Record a dispatched cue
    pub fn record_play(&self, record: &PlayRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO play_log (command_id, command_name, played_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![
                record.command_id,
                record.command_name,
                record.played_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Record multiple plays in a batch transaction
    pub fn record_plays_batch(&mut self, records: &[PlayRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for record in records {
            tx.execute(
                r#"
                INSERT INTO play_log (command_id, command_name, played_at)
                VALUES (?1, ?2, ?3)
                "#,
                params![
                    record.command_id,
                    record.command_name,
                    record.played_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Record a finished (or ended-early) session
    pub fn record_session(&self, record: &SessionRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO session_log (started_at, duration_secs, cues_planned, cues_played)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                record.started_at.to_rfc3339(),
                record.duration_secs,
                record.cues_planned as i64,
                record.cues_played as i64,
            ],
        )?;
        Ok(())
    }

    /// Total plays of one command across all sessions
    pub fn play_count(&self, command_id: &str) -> Result<i64> {
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM play_log WHERE command_id = ?1")?;
        stmt.query_row([command_id], |row| row.get(0))
    }

    /// When a command last played, if ever
    pub fn last_played(&self, command_id: &str) -> Result<Option<DateTime<Local>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT MAX(played_at) FROM play_log WHERE command_id = ?1")?;
        let played_at: Option<String> = stmt.query_row([command_id], |row| row.get(0))?;
        Ok(played_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Local))
        }))
    }

    /// Per-command totals and last-played timestamps, most played first
    pub fn play_summary(&self) -> Result<Vec<PlaySummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                command_id,
                command_name,
                COUNT(*) as total_plays,
                MAX(played_at) as last_played
            FROM play_log
            GROUP BY command_id
            ORDER BY total_plays DESC, command_name
            "#,
        )?;

        let summary_iter = stmt.query_map([], |row| {
            let last_played: Option<String> = row.get(3)?;
            Ok(PlaySummary {
                command_id: row.get(0)?,
                command_name: row.get(1)?,
                total_plays: row.get(2)?,
                last_played: last_played.and_then(|s| {
                    DateTime::parse_from_rfc3339(&s)
                        .ok()
                        .map(|dt| dt.with_timezone(&Local))
                }),
            })
        })?;

        let mut summary = Vec::new();
        for item in summary_iter {
            summary.push(item?);
        }
        Ok(summary)
    }

    pub fn session_count(&self) -> Result<i64> {
        let mut stmt = self.conn.prepare("SELECT COUNT(*) FROM session_log")?;
        stmt.query_row([], |row| row.get(0))
    }

    /// Clear all history (for testing or reset purposes)
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM play_log", [])?;
        self.conn.execute("DELETE FROM session_log", [])?;
        Ok(())
    }

    /// Dump the raw play log to a CSV file. Returns the number of rows
    /// written.
    pub fn export_plays_csv(&self, path: &Path) -> io::Result<usize> {
        let mut stmt = self
            .conn
            .prepare("SELECT command_id, command_name, played_at FROM play_log ORDER BY played_at")
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["command_id", "command_name", "played_at"])?;

        let mut written = 0;
        for row in rows {
            let (command_id, command_name, played_at) =
                row.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            writer.write_record([&command_id, &command_name, &played_at])?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(id: &str, name: &str) -> PlayRecord {
        PlayRecord {
            command_id: id.to_string(),
            command_name: name.to_string(),
            played_at: Local::now(),
        }
    }

    #[test]
    fn record_and_count_plays() {
        let db = HistoryDb::open_in_memory().unwrap();

        db.record_play(&play("1", "jab")).unwrap();
        db.record_play(&play("1", "jab")).unwrap();
        db.record_play(&play("2", "cross")).unwrap();

        assert_eq!(db.play_count("1").unwrap(), 2);
        assert_eq!(db.play_count("2").unwrap(), 1);
        assert_eq!(db.play_count("nope").unwrap(), 0);
    }

    #[test]
    fn batch_record() {
        let mut db = HistoryDb::open_in_memory().unwrap();
        let records = vec![play("1", "jab"), play("1", "jab"), play("2", "cross")];
        db.record_plays_batch(&records).unwrap();

        assert_eq!(db.play_count("1").unwrap(), 2);
        assert_eq!(db.play_count("2").unwrap(), 1);
    }

    #[test]
    fn last_played_tracks_the_newest_entry() {
        let db = HistoryDb::open_in_memory().unwrap();
        assert!(db.last_played("1").unwrap().is_none());

        let older = PlayRecord {
            command_id: "1".to_string(),
            command_name: "jab".to_string(),
            played_at: Local::now() - chrono::Duration::hours(2),
        };
        let newer = play("1", "jab");
        db.record_play(&older).unwrap();
        db.record_play(&newer).unwrap();

        let last = db.last_played("1").unwrap().unwrap();
        assert!((last - newer.played_at).num_seconds().abs() < 2);
    }

    #[test]
    fn summary_orders_by_total() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record_play(&play("1", "jab")).unwrap();
        db.record_play(&play("2", "cross")).unwrap();
        db.record_play(&play("2", "cross")).unwrap();

        let summary = db.play_summary().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].command_id, "2");
        assert_eq!(summary[0].total_plays, 2);
        assert!(summary[0].last_played.is_some());
        assert_eq!(summary[1].command_id, "1");
    }

    #[test]
    fn sessions_are_counted() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record_session(&SessionRecord {
            started_at: Local::now(),
            duration_secs: 300,
            cues_planned: 12,
            cues_played: 12,
        })
        .unwrap();

        assert_eq!(db.session_count().unwrap(), 1);
    }

    #[test]
    fn clear_all_empties_both_logs() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record_play(&play("1", "jab")).unwrap();
        db.record_session(&SessionRecord {
            started_at: Local::now(),
            duration_secs: 60,
            cues_planned: 1,
            cues_played: 1,
        })
        .unwrap();

        db.clear_all().unwrap();
        assert_eq!(db.play_count("1").unwrap(), 0);
        assert_eq!(db.session_count().unwrap(), 0);
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record_play(&play("1", "jab")).unwrap();
        db.record_play(&play("2", "cross")).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plays.csv");
        let written = db.export_plays_csv(&path).unwrap();
        assert_eq!(written, 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("command_id,command_name,played_at"));
        assert_eq!(lines.count(), 2);
    }
}
