// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry, IntCounterVec,
    IntGaugeVec, Registry, TextEncoder,
};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub struct BridgeMetrics {
    /// Last fully processed block per monitor.
    pub(crate) last_synced_block: IntGaugeVec,
    /// Events pushed through an observer, per monitor.
    pub(crate) events_processed: IntCounterVec,
    /// Counter-chain emissions by kind (mint/transfer/refund) and outcome.
    pub(crate) emissions: IntCounterVec,
    /// Terminal rejections by reason.
    pub(crate) rejections: IntCounterVec,
    /// Monitor loop errors by monitor and error type.
    pub(crate) monitor_errors: IntCounterVec,
    /// Stall alerts fired per monitor.
    pub(crate) monitor_stalls: IntCounterVec,
}

impl BridgeMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            last_synced_block: register_int_gauge_vec_with_registry!(
                "bridge_last_synced_block",
                "Last fully processed block per monitor",
                &["monitor"],
                registry,
            )
            .unwrap(),
            events_processed: register_int_counter_vec_with_registry!(
                "bridge_events_processed_total",
                "Events pushed through an observer",
                &["monitor"],
                registry,
            )
            .unwrap(),
            emissions: register_int_counter_vec_with_registry!(
                "bridge_emissions_total",
                "Counter-chain emissions by kind and outcome",
                &["kind", "outcome"],
                registry,
            )
            .unwrap(),
            rejections: register_int_counter_vec_with_registry!(
                "bridge_rejections_total",
                "Terminal rejections by reason",
                &["reason"],
                registry,
            )
            .unwrap(),
            monitor_errors: register_int_counter_vec_with_registry!(
                "bridge_monitor_errors_total",
                "Monitor loop errors by monitor and error type",
                &["monitor", "error_type"],
                registry,
            )
            .unwrap(),
            monitor_stalls: register_int_counter_vec_with_registry!(
                "bridge_monitor_stalls_total",
                "Stall alerts fired per monitor",
                &["monitor"],
                registry,
            )
            .unwrap(),
        }
    }

    #[cfg(test)]
    pub fn new_for_testing() -> Self {
        Self::new(&Registry::new())
    }
}

/// Serves the registry at `/metrics` until cancelled.
pub fn start_metrics_server(
    address: SocketAddr,
    registry: Registry,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    use axum::{extract::State, routing::get, Router};

    async fn render(State(registry): State<Registry>) -> String {
        TextEncoder::new()
            .encode_to_string(&registry.gather())
            .unwrap_or_default()
    }

    tokio::spawn(async move {
        let app = Router::new()
            .route("/metrics", get(render))
            .with_state(registry);
        let listener = match tokio::net::TcpListener::bind(address).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("failed to bind metrics server on {}: {:?}", address, e);
                return;
            }
        };
        tracing::info!("metrics server listening on {}", address);
        tokio::select! {
            _ = cancel.cancelled() => {}
            result = axum::serve(listener, app) => {
                if let Err(e) = result {
                    tracing::error!("metrics server error: {:?}", e);
                }
            }
        }
    })
}
