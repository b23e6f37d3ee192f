use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::Result;

/// Best results and practice history of one snippet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnippetStats {
    pub best_wpm: u32,
    pub best_accuracy: u32,
    pub practice_count: u32,
    pub last_practiced: DateTime<Local>,
}

/// Aggregate over every practiced snippet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSummary {
    pub practiced: usize,
    pub average_best_wpm: u32,
    pub best_wpm: u32,
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    snippet_id: &'a str,
    best_wpm: u32,
    best_accuracy: u32,
    practice_count: u32,
    last_practiced: String,
}

/// Sink for finished test results.
pub trait ResultRecorder {
    fn record_result(&mut self, snippet_id: &str, wpm: u32, accuracy: u32) -> Result<()>;
}

/// SQLite-backed practice statistics, one row per snippet.
#[derive(Debug)]
pub struct StatsDb {
    conn: Connection,
}

impl StatsDb {
    /// Open the database in the application state dir.
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("treetype_stats.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS snippet_stats (
                snippet_id TEXT PRIMARY KEY,
                best_wpm INTEGER NOT NULL,
                best_accuracy INTEGER NOT NULL,
                practice_count INTEGER NOT NULL,
                last_practiced TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(StatsDb { conn })
    }

    /// Fold one finished test into the snippet's stats.
    pub fn record(&self, snippet_id: &str, wpm: u32, accuracy: u32) -> Result<()> {
        self.record_at(snippet_id, wpm, accuracy, Local::now())
    }

    pub fn record_at(
        &self,
        snippet_id: &str,
        wpm: u32,
        accuracy: u32,
        when: DateTime<Local>,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO snippet_stats (snippet_id, best_wpm, best_accuracy, practice_count, last_practiced)
            VALUES (?1, ?2, ?3, 1, ?4)
            ON CONFLICT(snippet_id) DO UPDATE SET
                best_wpm = MAX(best_wpm, excluded.best_wpm),
                best_accuracy = MAX(best_accuracy, excluded.best_accuracy),
                practice_count = practice_count + 1,
                last_practiced = excluded.last_practiced
            "#,
            params![snippet_id, wpm, accuracy, when.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get(&self, snippet_id: &str) -> Result<Option<SnippetStats>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT best_wpm, best_accuracy, practice_count, last_practiced
            FROM snippet_stats
            WHERE snippet_id = ?1
            "#,
        )?;
        let stats = stmt
            .query_row([snippet_id], |row| row_to_stats(row, 0))
            .optional()?;
        Ok(stats)
    }

    /// Every snippet's stats ordered by snippet id.
    pub fn all(&self) -> Result<Vec<(String, SnippetStats)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT snippet_id, best_wpm, best_accuracy, practice_count, last_practiced
            FROM snippet_stats
            ORDER BY snippet_id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row_to_stats(row, 1)?))
        })?;

        let mut all = Vec::new();
        for row in rows {
            all.push(row?);
        }
        Ok(all)
    }

    pub fn summary(&self) -> Result<StatsSummary> {
        let all = self.all()?;
        if all.is_empty() {
            return Ok(StatsSummary::default());
        }
        let total: u64 = all.iter().map(|(_, s)| u64::from(s.best_wpm)).sum();
        Ok(StatsSummary {
            practiced: all.len(),
            average_best_wpm: (total as f64 / all.len() as f64).round() as u32,
            best_wpm: all.iter().map(|(_, s)| s.best_wpm).max().unwrap_or(0),
        })
    }

    /// Write every row to a CSV file with a header line.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let all = self.all()?;
        let mut writer = csv::Writer::from_path(path)?;
        for (snippet_id, stats) in &all {
            writer.serialize(ExportRow {
                snippet_id,
                best_wpm: stats.best_wpm,
                best_accuracy: stats.best_accuracy,
                practice_count: stats.practice_count,
                last_practiced: stats.last_practiced.to_rfc3339(),
            })?;
        }
        writer.flush()?;
        Ok(all.len())
    }

    pub fn clear_all_stats(&self) -> Result<()> {
        self.conn.execute("DELETE FROM snippet_stats", [])?;
        Ok(())
    }
}

impl ResultRecorder for StatsDb {
    fn record_result(&mut self, snippet_id: &str, wpm: u32, accuracy: u32) -> Result<()> {
        self.record(snippet_id, wpm, accuracy)
    }
}

fn row_to_stats(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<SnippetStats> {
    let when: String = row.get(offset + 3)?;
    let last_practiced = DateTime::parse_from_rfc3339(&when)
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                offset + 3,
                "last_practiced".to_string(),
                rusqlite::types::Type::Text,
            )
        })?
        .with_timezone(&Local);

    Ok(SnippetStats {
        best_wpm: row.get(offset)?,
        best_accuracy: row.get(offset + 1)?,
        practice_count: row.get(offset + 2)?,
        last_practiced,
    })
}
