// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Embedded persistence. Two independent SQLite files back the bridge: one
//! holds per-monitor cursors, the other the exchange history that gives the
//! observers exactly-once semantics across restarts. Both open in WAL mode
//! with `synchronous=FULL` and a single connection, so a committed write is
//! on disk before the counter-chain emission it precedes.

mod cursor;
mod history;

pub use cursor::CursorStore;
pub(crate) use cursor::now_ms;
pub use history::HistoryStore;

use crate::error::BridgeResult;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;

pub(crate) async fn open_pool(path: &Path) -> BridgeResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    connect(options).await
}

pub(crate) async fn open_in_memory() -> BridgeResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(crate::error::BridgeError::from)?;
    connect(options).await
}

async fn connect(options: SqliteConnectOptions) -> BridgeResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}
