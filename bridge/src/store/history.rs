// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::cursor::now_ms;
use crate::error::BridgeResult;
use crate::types::{
    ExchangeLeg, ExchangeStatus, HistoryRecord, NcgAmount, SourceNetwork,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;

/// Durable record of every counter-chain action ever attempted, keyed by the
/// source event. Observers insert a record BEFORE dispatching the emission,
/// so a crash in between leaves a visible maybe-emitted row instead of a
/// silent double spend; on replay, the presence of any leg suppresses
/// re-emission.
#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
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
            "CREATE TABLE IF NOT EXISTS exchange_history (
                source_network  TEXT    NOT NULL,
                source_tx_id    TEXT    NOT NULL,
                log_index       INTEGER NOT NULL,
                leg             TEXT    NOT NULL,
                sink            TEXT    NOT NULL,
                requested_centi INTEGER NOT NULL,
                sent_centi      INTEGER NOT NULL,
                counter_tx_id   TEXT,
                status          TEXT    NOT NULL,
                reason          TEXT,
                created_ms      INTEGER NOT NULL,
                PRIMARY KEY (source_network, source_tx_id, log_index, leg)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Whether any leg exists for the source event. One row is enough to
    /// treat the event as already processed.
    pub async fn has(
        &self,
        network: SourceNetwork,
        source_tx_id: &str,
        log_index: u64,
    ) -> BridgeResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM exchange_history
             WHERE source_network = ?1 AND source_tx_id = ?2 AND log_index = ?3
             LIMIT 1",
        )
        .bind(network.as_str())
        .bind(source_tx_id)
        .bind(log_index as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn insert(&self, record: &HistoryRecord) -> BridgeResult<()> {
        sqlx::query(
            "INSERT INTO exchange_history
             (source_network, source_tx_id, log_index, leg, sink,
              requested_centi, sent_centi, counter_tx_id, status, reason, created_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(record.source_network.as_str())
        .bind(&record.source_tx_id)
        .bind(record.log_index as i64)
        .bind(record.leg.as_str())
        .bind(&record.sink)
        .bind(record.requested.centi() as i64)
        .bind(record.sent.centi() as i64)
        .bind(record.counter_tx_id.as_deref())
        .bind(record.status.as_str())
        .bind(record.reason.as_deref())
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Annotates a leg with the counter-chain transaction it produced.
    pub async fn set_counter_tx(
        &self,
        network: SourceNetwork,
        source_tx_id: &str,
        log_index: u64,
        leg: ExchangeLeg,
        counter_tx_id: &str,
    ) -> BridgeResult<()> {
        sqlx::query(
            "UPDATE exchange_history SET counter_tx_id = ?5
             WHERE source_network = ?1 AND source_tx_id = ?2
               AND log_index = ?3 AND leg = ?4",
        )
        .bind(network.as_str())
        .bind(source_tx_id)
        .bind(log_index as i64)
        .bind(leg.as_str())
        .bind(counter_tx_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        network: SourceNetwork,
        source_tx_id: &str,
        log_index: u64,
        leg: ExchangeLeg,
    ) -> BridgeResult<Option<HistoryRecord>> {
        let row = sqlx::query(
            "SELECT * FROM exchange_history
             WHERE source_network = ?1 AND source_tx_id = ?2
               AND log_index = ?3 AND leg = ?4",
        )
        .bind(network.as_str())
        .bind(source_tx_id)
        .bind(log_index as i64)
        .bind(leg.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(from_row).transpose()
    }

    /// All legs recorded for a source event, exchange leg first.
    pub async fn legs(
        &self,
        network: SourceNetwork,
        source_tx_id: &str,
        log_index: u64,
    ) -> BridgeResult<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM exchange_history
             WHERE source_network = ?1 AND source_tx_id = ?2 AND log_index = ?3
             ORDER BY leg ASC",
        )
        .bind(network.as_str())
        .bind(source_tx_id)
        .bind(log_index as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(from_row).collect()
    }
}

fn from_row(row: SqliteRow) -> BridgeResult<HistoryRecord> {
    Ok(HistoryRecord {
        source_network: SourceNetwork::parse(row.get("source_network"))?,
        source_tx_id: row.get("source_tx_id"),
        log_index: row.get::<i64, _>("log_index") as u64,
        leg: ExchangeLeg::parse(row.get("leg"))?,
        sink: row.get("sink"),
        requested: NcgAmount::from_centi(row.get::<i64, _>("requested_centi") as u64),
        sent: NcgAmount::from_centi(row.get::<i64, _>("sent_centi") as u64),
        counter_tx_id: row.get("counter_tx_id"),
        status: ExchangeStatus::parse(row.get("status"))?,
        reason: row.get("reason"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tx: &str, leg: ExchangeLeg) -> HistoryRecord {
        HistoryRecord {
            source_network: SourceNetwork::NineChronicles,
            source_tx_id: tx.into(),
            log_index: 0,
            leg,
            sink: "0x45a22eec94aaf29058b2bda03d8af1497bdb9719".into(),
            requested: "150.00".parse().unwrap(),
            sent: "99.00".parse().unwrap(),
            counter_tx_id: None,
            status: ExchangeStatus::Emitted,
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_has_after_insert() {
        let store = HistoryStore::in_memory().await.unwrap();
        assert!(!store
            .has(SourceNetwork::NineChronicles, "tx-1", 0)
            .await
            .unwrap());
        store.insert(&record("tx-1", ExchangeLeg::Exchange)).await.unwrap();
        assert!(store
            .has(SourceNetwork::NineChronicles, "tx-1", 0)
            .await
            .unwrap());
        // other networks and log indices stay independent
        assert!(!store.has(SourceNetwork::Ethereum, "tx-1", 0).await.unwrap());
        assert!(!store
            .has(SourceNetwork::NineChronicles, "tx-1", 1)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_leg_is_rejected() {
        let store = HistoryStore::in_memory().await.unwrap();
        store.insert(&record("tx-1", ExchangeLeg::Exchange)).await.unwrap();
        assert!(store
            .insert(&record("tx-1", ExchangeLeg::Exchange))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_two_legs_under_one_source_tx() {
        let store = HistoryStore::in_memory().await.unwrap();
        store.insert(&record("tx-1", ExchangeLeg::Exchange)).await.unwrap();

        let mut refund = record("tx-1", ExchangeLeg::Refund);
        refund.status = ExchangeStatus::Refunded;
        refund.requested = "50.00".parse().unwrap();
        refund.sent = "50.00".parse().unwrap();
        store.insert(&refund).await.unwrap();

        let legs = store
            .legs(SourceNetwork::NineChronicles, "tx-1", 0)
            .await
            .unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].leg, ExchangeLeg::Exchange);
        assert_eq!(legs[1].leg, ExchangeLeg::Refund);
        assert_eq!(legs[1].status, ExchangeStatus::Refunded);
    }

    #[tokio::test]
    async fn test_set_counter_tx() {
        let store = HistoryStore::in_memory().await.unwrap();
        store.insert(&record("tx-9", ExchangeLeg::Exchange)).await.unwrap();
        store
            .set_counter_tx(
                SourceNetwork::NineChronicles,
                "tx-9",
                0,
                ExchangeLeg::Exchange,
                "0xminted",
            )
            .await
            .unwrap();
        let loaded = store
            .get(SourceNetwork::NineChronicles, "tx-9", 0, ExchangeLeg::Exchange)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.counter_tx_id.as_deref(), Some("0xminted"));
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_amounts() {
        let store = HistoryStore::in_memory().await.unwrap();
        let mut rec = record("tx-2", ExchangeLeg::Exchange);
        rec.source_network = SourceNetwork::Ethereum;
        rec.log_index = 3;
        rec.reason = Some("dust amount".into());
        rec.status = ExchangeStatus::Rejected;
        store.insert(&rec).await.unwrap();

        let loaded = store
            .get(SourceNetwork::Ethereum, "tx-2", 3, ExchangeLeg::Exchange)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, rec);
    }
}
