// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Paging integration for conditions that need a human now: stalled
//! monitors, reorged cursors, emissions that failed after funds were
//! locked. Delivery problems are logged and swallowed; paging must never
//! take the pipeline down with it.

use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

const EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

pub struct PagerDutyNotifier {
    routing_key: Option<String>,
    client: Client,
}

impl PagerDutyNotifier {
    pub fn new(routing_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to build reqwest client");
        Self {
            routing_key: routing_key.filter(|k| !k.is_empty()),
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.routing_key.is_some()
    }

    /// Fires a trigger event. Failures are logged, never propagated.
    pub async fn trigger(&self, summary: &str, severity: Severity, details: Value) {
        let Some(routing_key) = &self.routing_key else {
            info!("PagerDuty not configured, would page [{}]: {}", severity.as_str(), summary);
            return;
        };

        let body = json!({
            "routing_key": routing_key,
            "event_action": "trigger",
            "payload": {
                "summary": summary,
                "source": "ncg-bridge",
                "severity": severity.as_str(),
                "custom_details": details,
            },
        });

        match self.client.post(EVENTS_URL).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => warn!("PagerDuty returned {} for: {}", resp.status(), summary),
            Err(e) => warn!("PagerDuty delivery failed for {:?}: {:?}", summary, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::Critical.as_str(), "critical");
        assert_eq!(Severity::Error.as_str(), "error");
        assert_eq!(Severity::Warning.as_str(), "warning");
    }

    #[test]
    fn test_empty_routing_key_counts_as_unconfigured() {
        assert!(!PagerDutyNotifier::new(None).is_configured());
        assert!(!PagerDutyNotifier::new(Some(String::new())).is_configured());
        assert!(PagerDutyNotifier::new(Some("rk".into())).is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_trigger_is_a_noop() {
        crate::test_utils::init_tracing();
        let pager = PagerDutyNotifier::new(None);
        pager
            .trigger("nothing", Severity::Warning, json!({"k": "v"}))
            .await;
    }
}
