// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::BridgeResult;
use crate::types::TransactionLocation;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

/// Durable per-monitor cursor: one row per monitor name holding the last
/// fully processed (blockHash, txId). Rows are created lazily on the first
/// save and overwritten afterwards.
#[derive(Clone)]
pub struct CursorStore {
    pool: SqlitePool,
}

impl CursorStore {
    pub async fn open(path: &Path) -> BridgeResult<Self> {
        let store = Self {
            pool: super::open_pool(path).await?,
        };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn in_memory() -> BridgeResult<Self> {
        let store = Self {
            pool: super::open_in_memory().await?,
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> BridgeResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS monitor_cursor (
                monitor_name TEXT PRIMARY KEY,
                block_hash   TEXT NOT NULL,
                tx_id        TEXT NOT NULL,
                updated_ms   INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load(&self, monitor_name: &str) -> BridgeResult<Option<TransactionLocation>> {
        let row = sqlx::query(
            "SELECT block_hash, tx_id FROM monitor_cursor WHERE monitor_name = ?1",
        )
        .bind(monitor_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| TransactionLocation {
            block_hash: row.get("block_hash"),
            tx_id: row.get("tx_id"),
        }))
    }

    pub async fn save(
        &self,
        monitor_name: &str,
        location: &TransactionLocation,
    ) -> BridgeResult<()> {
        sqlx::query(
            "INSERT INTO monitor_cursor (monitor_name, block_hash, tx_id, updated_ms)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (monitor_name) DO UPDATE
             SET block_hash = excluded.block_hash,
                 tx_id = excluded.tx_id,
                 updated_ms = excluded.updated_ms",
        )
        .bind(monitor_name)
        .bind(&location.block_hash)
        .bind(&location.tx_id)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_cursor() {
        let store = CursorStore::in_memory().await.unwrap();
        assert_eq!(store.load("ncg-deposit").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let store = CursorStore::in_memory().await.unwrap();
        let location = TransactionLocation {
            block_hash: "d27145cf".into(),
            tx_id: "9f2e01".into(),
        };
        store.save("ncg-deposit", &location).await.unwrap();
        assert_eq!(store.load("ncg-deposit").await.unwrap(), Some(location));
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_row() {
        let store = CursorStore::in_memory().await.unwrap();
        for (hash, tx) in [("h1", "t1"), ("h2", "t2"), ("h3", "")] {
            store
                .save(
                    "wncg-burn",
                    &TransactionLocation {
                        block_hash: hash.into(),
                        tx_id: tx.into(),
                    },
                )
                .await
                .unwrap();
        }
        let loaded = store.load("wncg-burn").await.unwrap().unwrap();
        assert_eq!(loaded.block_hash, "h3");
        assert_eq!(loaded.tx_id, "");
    }

    #[tokio::test]
    async fn test_monitors_do_not_share_cursors() {
        let store = CursorStore::in_memory().await.unwrap();
        store
            .save(
                "ncg-deposit",
                &TransactionLocation {
                    block_hash: "a".into(),
                    tx_id: "1".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(store.load("wncg-burn").await.unwrap(), None);
    }
}
