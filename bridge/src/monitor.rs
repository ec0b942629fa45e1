// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Generic confirmed-block monitor.
//!
//! Drives a lazy, indefinite stream of per-block event envelopes for one
//! chain: resume from a durable cursor (replaying anything past the stored
//! transaction), otherwise start at the source's confirmed tip, then follow
//! the chain one block at a time, never skipping a block and never touching
//! a block shallower than the confirmation depth (the source's `tip_index`
//! is already confirmation-adjusted). Transient errors are logged and the
//! loop continues; the only fatal exit is a cursor block that left the
//! canonical chain.

use crate::error::{BridgeError, BridgeResult};
use crate::metrics::BridgeMetrics;
use crate::node::Integrations;
use crate::retry_with_max_elapsed_time;
use crate::store::CursorStore;
use crate::types::{BridgeEvent, EventEnvelope, TransactionLocation};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Page the operator when a monitor sits still this long while polling.
const STALL_ALERT_AFTER: Duration = Duration::from_secs(5 * 60);
/// Upper bound on the backoff-wrapped tip fetch inside one poll step.
const TIP_FETCH_MAX_ELAPSED: Duration = Duration::from_secs(60);

/// Chain-specific primitives a monitor drives. `tip_index` must already
/// subtract the confirmation depth from the actual chain tip.
#[async_trait]
pub trait BlockSource: Send + Sync {
    type Event: BridgeEvent + Send + Sync;

    fn name(&self) -> &'static str;

    async fn tip_index(&self) -> BridgeResult<u64>;
    async fn block_hash(&self, index: u64) -> BridgeResult<String>;
    async fn block_index(&self, block_hash: &str) -> BridgeResult<u64>;
    async fn events_in(&self, index: u64) -> BridgeResult<Vec<Self::Event>>;

    /// Hook for sources that expand one chain block into several processing
    /// steps. The default is the identity.
    fn triggered_blocks(&self, next: u64) -> Vec<u64> {
        vec![next]
    }
}

/// Consumes one envelope at a time, in block order.
#[async_trait]
pub trait EventObserver<E>: Send + Sync {
    async fn observe(&self, envelope: &EventEnvelope<E>) -> BridgeResult<()>;
}

/// Result of replaying past the stored cursor.
#[derive(Debug)]
pub struct RemainedEvents<E> {
    pub next_block_index: u64,
    pub envelopes: Vec<EventEnvelope<E>>,
}

pub struct BlockMonitor<S: BlockSource> {
    name: &'static str,
    source: S,
    observer: Box<dyn EventObserver<S::Event>>,
    cursors: CursorStore,
    poll_delay: Duration,
    integrations: Integrations,
    metrics: Arc<BridgeMetrics>,
}

impl<S: BlockSource> BlockMonitor<S> {
    pub fn new(
        source: S,
        observer: Box<dyn EventObserver<S::Event>>,
        cursors: CursorStore,
        poll_delay: Duration,
        integrations: Integrations,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            name: source.name(),
            source,
            observer,
            cursors,
            poll_delay,
            integrations,
            metrics,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs until cancelled or a fatal error surfaces.
    pub async fn run(self, cancel: CancellationToken) -> BridgeResult<()> {
        let mut latest = loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match self.resume().await {
                Ok(latest) => break latest,
                Err(e) if e.is_fatal() => {
                    self.report_fatal(&e).await;
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("[{}] resume failed, retrying: {}", self.name, e);
                    self.metrics
                        .monitor_errors
                        .with_label_values(&[self.name, e.error_type()])
                        .inc();
                    tokio::time::sleep(self.poll_delay).await;
                }
            }
        };

        tracing::info!("[{}] monitoring from block {}", self.name, latest + 1);
        let mut last_progress = Instant::now();
        let mut stall_alerted = false;

        loop {
            if cancel.is_cancelled() {
                tracing::info!("[{}] cancelled, stopping", self.name);
                return Ok(());
            }

            match self.step(latest).await {
                Ok(Some(processed)) => {
                    latest = processed;
                    last_progress = Instant::now();
                    stall_alerted = false;
                    self.metrics
                        .last_synced_block
                        .with_label_values(&[self.name])
                        .set(latest as i64);
                }
                Ok(None) => {
                    if last_progress.elapsed() >= STALL_ALERT_AFTER && !stall_alerted {
                        stall_alerted = true;
                        self.metrics
                            .monitor_stalls
                            .with_label_values(&[self.name])
                            .inc();
                        let minutes = last_progress.elapsed().as_secs() / 60;
                        tracing::warn!(
                            "[{}] no progress for {} minutes at block {}",
                            self.name,
                            minutes,
                            latest
                        );
                        self.integrations
                            .pager
                            .trigger(
                                &format!(
                                    "bridge monitor {} stalled at block {}",
                                    self.name, latest
                                ),
                                crate::pagerduty::Severity::Error,
                                serde_json::json!({ "monitor": self.name, "latest": latest }),
                            )
                            .await;
                        let _ = self
                            .integrations
                            .telegram
                            .notify_stalled(self.name, latest, minutes)
                            .await;
                    }
                    self.sleep_or_cancel(&cancel).await;
                }
                Err(e) if e.is_fatal() => {
                    self.report_fatal(&e).await;
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("[{}] error in monitor loop: {}", self.name, e);
                    self.metrics
                        .monitor_errors
                        .with_label_values(&[self.name, e.error_type()])
                        .inc();
                    self.sleep_or_cancel(&cancel).await;
                }
            }
        }
    }

    async fn sleep_or_cancel(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.poll_delay) => {}
        }
    }

    /// Loads the stored cursor and replays everything newer than it.
    /// Returns the last fully processed block index.
    async fn resume(&self) -> BridgeResult<u64> {
        match self.cursors.load(self.name).await? {
            Some(location) => {
                tracing::info!(
                    "[{}] resuming from block {} (tx {})",
                    self.name,
                    location.block_hash,
                    if location.tx_id.is_empty() { "<none>" } else { &location.tx_id }
                );
                let remained = self.process_remains(&location).await?;
                for envelope in &remained.envelopes {
                    self.deliver(envelope).await?;
                }
                Ok(remained.next_block_index - 1)
            }
            None => {
                let tip = self.source.tip_index().await?;
                tracing::info!("[{}] no cursor, starting at confirmed tip {}", self.name, tip);
                Ok(tip)
            }
        }
    }

    /// Replays events strictly newer than the stored location: in the
    /// cursor's own block everything up to and including the stored tx is
    /// dropped, later blocks are replayed whole, up to the confirmed tip.
    pub(crate) async fn process_remains(
        &self,
        location: &TransactionLocation,
    ) -> BridgeResult<RemainedEvents<S::Event>> {
        let cursor_index = match self.source.block_index(&location.block_hash).await {
            Ok(index) => index,
            Err(BridgeError::ProviderError(_)) | Err(BridgeError::GraphQlError(_)) => {
                return Err(BridgeError::ReorgedCursor {
                    monitor: self.name.to_string(),
                    block_hash: location.block_hash.clone(),
                });
            }
            Err(e) => return Err(e),
        };
        let tip = self.source.tip_index().await?;

        let mut envelopes = Vec::new();
        for index in cursor_index..=tip {
            let block_hash = self.source.block_hash(index).await?;
            let mut events = self.source.events_in(index).await?;
            if index == cursor_index && !location.tx_id.is_empty() {
                if let Some(position) =
                    events.iter().position(|e| e.tx_id() == location.tx_id)
                {
                    events.drain(..=position);
                }
            }
            if events.is_empty() {
                continue;
            }
            envelopes.push(EventEnvelope { block_hash, events });
        }

        Ok(RemainedEvents {
            next_block_index: cursor_index.max(tip) + 1,
            envelopes,
        })
    }

    /// Fetches and delivers the next block, if one is confirmed. Returns the
    /// newly processed index, or None when the monitor is at the tip.
    pub(crate) async fn step(&self, latest: u64) -> BridgeResult<Option<u64>> {
        let tip = match retry_with_max_elapsed_time!(self.source.tip_index(), TIP_FETCH_MAX_ELAPSED)
        {
            Ok(Ok(tip)) => tip,
            Ok(Err(e)) | Err(e) => return Err(e),
        };

        let next = latest + 1;
        if next > tip {
            return Ok(None);
        }

        for index in self.source.triggered_blocks(next) {
            let block_hash = self.source.block_hash(index).await?;
            let events = self.source.events_in(index).await?;
            self.deliver(&EventEnvelope { block_hash, events }).await?;
        }
        Ok(Some(next))
    }

    /// Pushes one envelope to the observer and advances the cursor. The
    /// cursor is only written after the observer returns, so a crash in
    /// between replays the same block on restart.
    pub(crate) async fn deliver(&self, envelope: &EventEnvelope<S::Event>) -> BridgeResult<()> {
        if !envelope.events.is_empty() {
            tracing::info!(
                "[{}] {} event(s) in block {}",
                self.name,
                envelope.events.len(),
                envelope.block_hash
            );
        }
        self.observer.observe(envelope).await?;
        self.metrics
            .events_processed
            .with_label_values(&[self.name])
            .inc_by(envelope.events.len() as u64);

        let tx_id = envelope
            .events
            .last()
            .map(|e| e.tx_id())
            .unwrap_or_default();
        self.cursors
            .save(
                self.name,
                &TransactionLocation {
                    block_hash: envelope.block_hash.clone(),
                    tx_id,
                },
            )
            .await
    }

    async fn report_fatal(&self, error: &BridgeError) {
        tracing::error!("[{}] fatal: {}", self.name, error);
        self.integrations
            .pager
            .trigger(
                &format!("bridge monitor {} aborted: {}", self.name, error),
                crate::pagerduty::Severity::Critical,
                serde_json::json!({ "monitor": self.name, "error": error.to_string() }),
            )
            .await;
        match error {
            BridgeError::ReorgedCursor { block_hash, .. } => {
                let _ = self
                    .integrations
                    .telegram
                    .notify_reorg(self.name, block_hash)
                    .await;
            }
            other => {
                let _ = self
                    .integrations
                    .telegram
                    .notify_fatal(self.name, &other.to_string())
                    .await;
            }
        }
    }
}
