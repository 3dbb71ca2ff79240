// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread, so every
//! closure passed to [`Database::connection`]`.call()` is atomic with respect
//! to every other. Message ids and timestamps rely on this: do not open a
//! second connection for writes.

use std::path::Path;

use livedesk_core::LivedeskError;
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

/// Milliseconds SQLite waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Handle to the relay database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, LivedeskError> {
        Self::open_with(path, true).await
    }

    /// Open the database, choosing the journal mode explicitly.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, LivedeskError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(LivedeskError::storage)?;
        }

        let conn = Connection::open(path).await.map_err(LivedeskError::storage)?;

        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                let mode: String =
                    conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
                if !mode.eq_ignore_ascii_case("wal") {
                    warn!(mode = %mode, "SQLite refused WAL journal mode");
                }
            }
            conn.busy_timeout(std::time::Duration::from_millis(u64::from(BUSY_TIMEOUT_MS)))?;
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| -> Result<(), refinery::Error> {
            crate::migrations::run_migrations(conn)
        })
        .await
        .map_err(|e| match e {
            tokio_rusqlite::Error::Error(inner) => LivedeskError::storage(inner),
            other => LivedeskError::Storage {
                source: other.to_string().into(),
            },
        })?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The single serialized connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection thread.
    pub async fn close(self) -> Result<(), LivedeskError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)?;
        debug!("database closed");
        Ok(())
    }
}

/// Map a tokio-rusqlite call error into a storage error.
pub fn map_tr_err(err: tokio_rusqlite::Error<rusqlite::Error>) -> LivedeskError {
    match err {
        tokio_rusqlite::Error::Error(inner) => LivedeskError::storage(inner),
        other => LivedeskError::Storage {
            source: other.to_string().into(),
        },
    }
}
