// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bridge node wiring: builds every component from the validated
//! configuration, checks the remote signer against the configured custodial
//! address, and runs the two monitors side by side until one of them dies
//! fatally. A fatal monitor cancels its sibling so the process exits as a
//! unit and supervision restarts it whole.

use crate::audit::AuditSink;
use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::eth_client::{EthBurnSource, EthClient};
use crate::gas_price::CompositeGasPolicy;
use crate::metrics::{start_metrics_server, BridgeMetrics};
use crate::monitor::BlockMonitor;
use crate::ncg_transfer::NcgTransferSender;
use crate::nine_client::{NineChroniclesClient, NineDepositSource, NineNode};
use crate::observer::{NcgDepositObserver, WncgBurnObserver};
use crate::pagerduty::PagerDutyNotifier;
use crate::remote_signer::{RemoteSigner, TxSigner};
use crate::store::{CursorStore, HistoryStore};
use crate::telegram::{create_telegram_notifier, SharedTelegramNotifier, TelegramConfig};
use anyhow::Context;
use prometheus::Registry;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The three out-of-band channels observers and monitors report through:
/// chat for humans, pager for emergencies, audit store for reconciliation.
/// Passed by value and cloned freely.
#[derive(Clone)]
pub struct Integrations {
    pub telegram: SharedTelegramNotifier,
    pub pager: Arc<PagerDutyNotifier>,
    pub audit: Arc<AuditSink>,
}

impl Integrations {
    pub fn new(
        telegram: TelegramConfig,
        pagerduty_routing_key: Option<String>,
        audit: crate::audit::AuditConfig,
    ) -> Self {
        Self {
            telegram: create_telegram_notifier(telegram),
            pager: Arc::new(PagerDutyNotifier::new(pagerduty_routing_key)),
            audit: Arc::new(AuditSink::new(audit)),
        }
    }

    /// All channels unconfigured; everything degrades to log lines.
    pub fn disabled() -> Self {
        Self::new(TelegramConfig::default(), None, crate::audit::AuditConfig::default())
    }
}

pub async fn run_bridge_node(config: BridgeConfig) -> anyhow::Result<()> {
    let registry = Registry::new_custom(Some("ncg_bridge".into()), None)
        .context("Failed to create Prometheus registry")?;
    let metrics = Arc::new(BridgeMetrics::new(&registry));
    let integrations = Integrations::new(
        config.telegram.clone(),
        config.pagerduty_routing_key.clone(),
        config.audit.clone(),
    );

    let cursors = CursorStore::open(&config.cursor_store_path)
        .await
        .context("Failed to open cursor store")?;
    let history = HistoryStore::open(&config.history_store_path)
        .await
        .context("Failed to open history store")?;

    let primary: Arc<dyn NineNode> =
        Arc::new(NineChroniclesClient::new(&config.ncg_graphql_url));
    let mut stagers: Vec<Arc<dyn NineNode>> = vec![primary.clone()];
    for url in &config.ncg_stage_graphql_urls {
        stagers.push(Arc::new(NineChroniclesClient::new(url)));
    }
    info!(
        "staging fan-out across {} endpoint(s), primary {}",
        stagers.len(),
        config.ncg_graphql_url
    );

    // The custodial key lives in the remote signing service. The address it
    // derives must be the configured bridge address; anything else means the
    // node would sign with a key it does not custody funds for.
    let signer: Arc<dyn TxSigner> =
        Arc::new(RemoteSigner::new(&config.signer_url, &config.signer_key_id));
    let signer_address = signer
        .address()
        .await
        .context("Failed to resolve the remote signer address")?;
    anyhow::ensure!(
        signer_address == config.bridge_ncg_address,
        "remote signer derives {} but the configured bridge address is {}",
        signer_address,
        config.bridge_ncg_address
    );
    let public_key = signer
        .public_key()
        .await
        .context("Failed to fetch the remote signer public key")?;
    info!("remote signer verified for {}", signer_address);

    let transfer = Arc::new(NcgTransferSender::new(
        primary.clone(),
        stagers,
        signer,
        config.bridge_ncg_address,
        &public_key,
        config.ncg_minter_address,
    ));

    let gas_policy = CompositeGasPolicy::standard(config.gas_tip_per_mille, config.gas_price_cap);
    let eth_client = Arc::new(
        EthClient::new(
            &config.eth_rpc_url,
            &config.eth_minter_private_key,
            config.wncg_contract_address,
            gas_policy,
            config.priority_fee,
            config.eth_chain_id,
        )
        .await
        .context("Failed to set up the EVM client")?,
    );

    let _ = integrations
        .telegram
        .notify_startup(
            &config.bridge_ncg_address.to_string(),
            &format!("{:?}", config.wncg_contract_address),
        )
        .await;

    let deposit_observer = NcgDepositObserver::new(
        history.clone(),
        eth_client.clone(),
        transfer.clone(),
        config.policy.clone(),
        integrations.clone(),
        metrics.clone(),
    );
    let burn_observer = WncgBurnObserver::new(
        history,
        transfer,
        config.planet_id,
        integrations.clone(),
        metrics.clone(),
    );

    let deposit_monitor = BlockMonitor::new(
        NineDepositSource::new(primary, config.bridge_ncg_address, config.confirmations),
        Box::new(deposit_observer),
        cursors.clone(),
        config.poll_delay,
        integrations.clone(),
        metrics.clone(),
    );
    let burn_monitor = BlockMonitor::new(
        EthBurnSource::new(eth_client, config.confirmations),
        Box::new(burn_observer),
        cursors,
        config.poll_delay,
        integrations.clone(),
        metrics.clone(),
    );

    let cancel = CancellationToken::new();
    let metrics_handle =
        start_metrics_server(config.metrics_address, registry, cancel.child_token());

    let monitors: Vec<JoinHandle<BridgeResult<()>>> = vec![
        tokio::spawn(deposit_monitor.run(cancel.clone())),
        tokio::spawn(burn_monitor.run(cancel.clone())),
    ];
    info!("bridge node started");

    let (finished, _, remaining) = futures::future::select_all(monitors).await;
    cancel.cancel();
    for handle in remaining {
        let _ = handle.await;
    }
    let _ = metrics_handle.await;

    match finished {
        Ok(Ok(())) => anyhow::bail!("a monitor loop exited without an error"),
        Ok(Err(e)) => Err(anyhow::anyhow!("monitor aborted: {}", e)),
        Err(join_error) => Err(anyhow::anyhow!("monitor task panicked: {}", join_error)),
    }
}
