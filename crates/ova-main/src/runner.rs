// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of OVA Water.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use crate::config::AppConfig;
use crate::sensors::{
    InvoiceSensor, InvoiceSource, PollOutcome, Sensor, SnapshotSource, TelemetrySensor,
    TelemetrySource,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ova_api::OvaClient;
use ova_ha::HomeAssistantClient;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Shortest scan interval the runner accepts, shorter ones are raised to it
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one tick for both sensors
#[derive(Debug)]
pub struct TickReport {
    pub invoice: PollOutcome,
    pub telemetry: PollOutcome,
}

/// Both sensors plus the optional Home Assistant publisher
#[derive(Debug)]
pub struct Integration {
    invoice: InvoiceSensor,
    telemetry: TelemetrySensor,
    publisher: Option<HomeAssistantClient>,
    scan_interval: Duration,
}

impl Integration {
    pub fn new(
        invoice: InvoiceSensor,
        telemetry: TelemetrySensor,
        publisher: Option<HomeAssistantClient>,
        scan_interval: Duration,
    ) -> Self {
        if publisher.is_none() {
            info!("No Home Assistant connection configured, running in log-only mode");
        }
        if scan_interval < MIN_SCAN_INTERVAL {
            warn!(
                "Scan interval {:?} is too short, using {:?}",
                scan_interval, MIN_SCAN_INTERVAL
            );
        }
        Self {
            invoice,
            telemetry,
            publisher,
            scan_interval: scan_interval.max(MIN_SCAN_INTERVAL),
        }
    }

    /// Build both sensors over one shared API client
    pub fn from_config(config: &AppConfig, publisher: Option<HomeAssistantClient>) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let client = OvaClient::with_timeout(&config.api_base_url, config.request_timeout())
            .context("Failed to create ova-agua API client")?
            .with_concession(&config.concession);
        let client = Arc::new(client);
        let credentials = config.credentials();

        let invoice = Sensor::invoice(
            &config.invoice_entity_id,
            InvoiceSource::new(
                Arc::clone(&client),
                credentials.clone(),
                config.contract_account(),
            ),
            config.update_interval(),
            config.failure_policy,
        );
        let telemetry = Sensor::telemetry(
            &config.telemetry_entity_id,
            TelemetrySource::new(client, credentials, &config.contract_reference),
            config.update_interval(),
            config.failure_policy,
        );

        Ok(Self::new(invoice, telemetry, publisher, config.scan_interval()))
    }

    /// Poll the invoice sensor, then the telemetry sensor, publishing each
    /// one that was attempted
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let invoice = self.invoice.update_at(now).await;
        if invoice.attempted() {
            publish(self.publisher.as_ref(), &self.invoice).await;
        }

        let telemetry = self.telemetry.update_at(now).await;
        if telemetry.attempted() {
            publish(self.publisher.as_ref(), &self.telemetry).await;
        }

        TickReport { invoice, telemetry }
    }

    /// Tick on the scan interval until `shutdown` resolves
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.scan_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Polling every {:?} (scan interval {:?})",
            self.invoice_update_interval(),
            self.scan_interval
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.tick(Utc::now()).await;
                    debug!("Tick finished: {:?}", report);
                }
            }
        }
    }

    pub fn invoice(&self) -> &InvoiceSensor {
        &self.invoice
    }

    pub fn telemetry(&self) -> &TelemetrySensor {
        &self.telemetry
    }

    pub fn publisher(&self) -> Option<&HomeAssistantClient> {
        self.publisher.as_ref()
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    /// Current entity states keyed by entity id
    pub fn states(&self) -> Value {
        let mut states = Map::new();
        for (entity_id, state) in [
            (self.invoice.entity_id(), self.invoice.entity_state()),
            (self.telemetry.entity_id(), self.telemetry.entity_state()),
        ] {
            let state = serde_json::to_value(state).unwrap_or(Value::Null);
            states.insert(entity_id.to_string(), state);
        }
        Value::Object(states)
    }

    fn invoice_update_interval(&self) -> Duration {
        self.invoice.update_interval().to_std().unwrap_or(Duration::MAX)
    }
}

async fn publish<S: SnapshotSource>(publisher: Option<&HomeAssistantClient>, sensor: &Sensor<S>) {
    let state = sensor.entity_state();

    let Some(publisher) = publisher else {
        info!("📊 [{}] state = '{}'", sensor.entity_id(), state.state);
        return;
    };

    if let Err(e) = publisher.set_state(sensor.entity_id(), &state).await {
        error!(
            "❌ Failed to publish {} to Home Assistant: {}",
            sensor.entity_id(),
            e
        );
    }
}

/// Pick the Home Assistant connection: explicit token (config or HA_TOKEN),
/// then the Supervisor API, otherwise none
pub fn publisher_from_config(config: &AppConfig) -> Option<HomeAssistantClient> {
    if config.ha_token.is_some() {
        match HomeAssistantClient::from_config(config.ha_base_url.clone(), config.ha_token.clone()) {
            Ok(client) => return Some(client),
            Err(e) => warn!("Home Assistant client from configuration unavailable: {}", e),
        }
    }

    match HomeAssistantClient::from_supervisor() {
        Ok(client) => Some(client),
        Err(e) => {
            debug!("Supervisor API unavailable: {}", e);
            None
        }
    }
}
