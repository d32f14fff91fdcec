//! SQLite-backed transcription history.
//!
//! The store lives on the daemon thread and is only touched from there. A
//! failed open is reported once at startup and turns every later operation
//! into a no-op, so history problems never take the daemon down.

use crate::error::{Result, SpeakError};
use crate::window::WindowSnapshot;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp: String,
    pub text: String,
    pub audio_duration: f64,
    pub processing_time: f64,
    pub app_context: Option<String>,
    pub app_id: Option<String>,
    pub window_class: Option<String>,
    pub window_title: Option<String>,
    pub agent: Option<String>,
    pub working_dir: Option<String>,
    pub backend: Option<String>,
}

pub struct HistoryStore {
    conn: Option<Connection>,
}

impl HistoryStore {
    /// Open (or create) the history database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SpeakError::History {
                message: format!("Failed to create {}: {}", parent.display(), e),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| SpeakError::History {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| SpeakError::History {
                message: format!("Failed to enable WAL mode: {}", e),
            })?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS transcriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f','now')),
                text TEXT NOT NULL,
                audio_duration REAL,
                processing_time REAL,
                app_context TEXT,
                app_id TEXT,
                window_class TEXT,
                window_title TEXT,
                agent TEXT,
                working_dir TEXT,
                backend TEXT
            );",
        )
        .map_err(|e| SpeakError::History {
            message: format!("Failed to create tables: {}", e),
        })?;

        Ok(Self { conn: Some(conn) })
    }

    /// A store whose operations all no-op; used when open failed.
    pub fn disabled() -> Self {
        Self { conn: None }
    }

    /// The default database path: `~/.local/share/speak-anywhere/history.db`.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("speak-anywhere")
            .join("history.db")
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    /// Insert one finished transcription. Empty string fields become NULL.
    pub fn insert(
        &self,
        text: &str,
        audio_duration: f64,
        processing_time: f64,
        context: &WindowSnapshot,
        backend: &str,
    ) -> Result<()> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };

        conn.execute(
            "INSERT INTO transcriptions (text, audio_duration, processing_time,
                app_context, app_id, window_class, window_title, agent, working_dir, backend)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                text,
                audio_duration,
                processing_time,
                null_if_empty(&context.context),
                null_if_empty(&context.app_id),
                null_if_empty(&context.window_class),
                null_if_empty(&context.title),
                null_if_empty(&context.agent),
                null_if_empty(&context.working_dir),
                null_if_empty(backend),
            ],
        )
        .map_err(|e| SpeakError::History {
            message: format!("Insert failed: {}", e),
        })?;

        Ok(())
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        let Some(conn) = &self.conn else {
            return Ok(Vec::new());
        };

        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, text, audio_duration, processing_time,
                        app_context, app_id, window_class, window_title, agent,
                        working_dir, backend
                 FROM transcriptions ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| SpeakError::History {
                message: format!("Prepare failed: {}", e),
            })?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    text: row.get(2)?,
                    audio_duration: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                    processing_time: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                    app_context: row.get(5)?,
                    app_id: row.get(6)?,
                    window_class: row.get(7)?,
                    window_title: row.get(8)?,
                    agent: row.get(9)?,
                    working_dir: row.get(10)?,
                    backend: row.get(11)?,
                })
            })
            .map_err(|e| SpeakError::History {
                message: format!("Query failed: {}", e),
            })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SpeakError::History {
                message: format!("Row decode failed: {}", e),
            })
    }
}

fn null_if_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot() -> WindowSnapshot {
        WindowSnapshot {
            app_id: "kitty".to_string(),
            window_class: String::new(),
            title: "~".to_string(),
            pid: 100,
            agent: "claude".to_string(),
            working_dir: "/home/me/project".to_string(),
            context: "claude code on kitty".to_string(),
        }
    }

    fn open_temp() -> (TempDir, HistoryStore) {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(&dir.path().join("history.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b").join("history.db");
        let store = HistoryStore::open(&nested).unwrap();
        assert!(store.is_enabled());
        assert!(nested.exists());
    }

    #[test]
    fn test_insert_and_recent_roundtrip() {
        let (_dir, store) = open_temp();

        store
            .insert("hello world", 1.0, 0.12, &snapshot(), "lan")
            .unwrap();

        let entries = store.recent(10).unwrap();
        assert_eq!(entries.len(), 1);

        let e = &entries[0];
        assert_eq!(e.text, "hello world");
        assert_eq!(e.audio_duration, 1.0);
        assert_eq!(e.processing_time, 0.12);
        assert_eq!(e.app_context.as_deref(), Some("claude code on kitty"));
        assert_eq!(e.app_id.as_deref(), Some("kitty"));
        assert_eq!(e.window_title.as_deref(), Some("~"));
        assert_eq!(e.agent.as_deref(), Some("claude"));
        assert_eq!(e.working_dir.as_deref(), Some("/home/me/project"));
        assert_eq!(e.backend.as_deref(), Some("lan"));
    }

    #[test]
    fn test_empty_fields_stored_as_null() {
        let (_dir, store) = open_temp();

        store
            .insert("text", 0.5, 0.1, &WindowSnapshot::default(), "lan")
            .unwrap();

        let e = &store.recent(1).unwrap()[0];
        assert_eq!(e.app_context, None);
        assert_eq!(e.app_id, None);
        assert_eq!(e.window_class, None);
        assert_eq!(e.window_title, None);
        assert_eq!(e.agent, None);
        assert_eq!(e.working_dir, None);
    }

    #[test]
    fn test_recent_is_newest_first_and_limited() {
        let (_dir, store) = open_temp();

        for i in 0..5 {
            store
                .insert(&format!("entry {}", i), 1.0, 0.1, &snapshot(), "lan")
                .unwrap();
        }

        let entries = store.recent(3).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].text, "entry 4");
        assert_eq!(entries[1].text, "entry 3");
        assert_eq!(entries[2].text, "entry 2");
        assert!(entries[0].id > entries[1].id);
    }

    #[test]
    fn test_timestamp_is_iso8601_with_millis() {
        let (_dir, store) = open_temp();
        store.insert("t", 1.0, 0.1, &snapshot(), "lan").unwrap();

        let ts = &store.recent(1).unwrap()[0].timestamp;
        // e.g. 2026-08-02T12:34:56.789
        assert_eq!(ts.len(), 23, "unexpected timestamp shape: {}", ts);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn test_disabled_store_noops() {
        let store = HistoryStore::disabled();
        assert!(!store.is_enabled());
        assert!(store
            .insert("x", 1.0, 0.1, &WindowSnapshot::default(), "lan")
            .is_ok());
        assert!(store.recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_preserves_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");

        {
            let store = HistoryStore::open(&path).unwrap();
            store.insert("persisted", 1.0, 0.1, &snapshot(), "lan").unwrap();
        }

        let store = HistoryStore::open(&path).unwrap();
        let entries = store.recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "persisted");
    }
}
