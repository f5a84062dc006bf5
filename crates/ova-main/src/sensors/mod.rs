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

//! Polled sensors.
//!
//! A [`Sensor`] owns a [`PollGate`] and the latest snapshot of its source.
//! Each call to [`Sensor::update_at`] either skips (gate idle) or runs one
//! full fetch pipeline and replaces the snapshot.

pub mod invoice;
pub mod telemetry;

pub use invoice::{INVOICE_METADATA, InvoiceSensor, InvoiceSource};
pub use telemetry::{TELEMETRY_METADATA, TelemetrySensor, TelemetrySource};

use crate::poll_gate::PollGate;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use ova_api::{OvaError, OvaResult};
use ova_ha::{EntityState, SensorMetadata};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Something that can produce a fresh snapshot for a sensor
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    type Snapshot: SensorReading + Send + Sync;

    async fn fetch(&self) -> OvaResult<Self::Snapshot>;
}

/// How a snapshot is shown in Home Assistant
pub trait SensorReading {
    fn native_value(&self) -> Option<f64>;

    fn attributes(&self) -> Map<String, Value>;
}

/// What happens to the stored snapshot when a fetch fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Drop the snapshot, the sensor becomes unknown
    #[default]
    Clear,
    /// Keep showing the previous snapshot
    Retain,
}

#[derive(Debug)]
pub enum PollOutcome {
    /// Gate was idle, nothing fetched
    Skipped,
    Updated,
    Failed(OvaError),
}

impl PollOutcome {
    /// Whether a fetch was attempted
    pub fn attempted(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

pub struct Sensor<S: SnapshotSource> {
    entity_id: String,
    metadata: SensorMetadata,
    source: S,
    gate: PollGate,
    policy: FailurePolicy,
    snapshot: Option<S::Snapshot>,
}

impl<S: SnapshotSource> fmt::Debug for Sensor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sensor")
            .field("entity_id", &self.entity_id)
            .field("gate", &self.gate)
            .field("policy", &self.policy)
            .field("has_snapshot", &self.snapshot.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: SnapshotSource> Sensor<S> {
    pub fn new(
        entity_id: impl Into<String>,
        metadata: SensorMetadata,
        source: S,
        update_interval: Duration,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            metadata,
            source,
            gate: PollGate::new(update_interval),
            policy,
            snapshot: None,
        }
    }

    /// Poll the source if the gate is due at `now`
    pub async fn update_at(&mut self, now: DateTime<Utc>) -> PollOutcome {
        if !self.gate.is_due(now) {
            debug!("⏭️ [{}] Skipping fetch, interval not elapsed", self.entity_id);
            return PollOutcome::Skipped;
        }

        self.gate.mark_attempt(now);

        match self.source.fetch().await {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                PollOutcome::Updated
            }
            Err(e) => {
                match self.policy {
                    FailurePolicy::Clear => {
                        warn!("⚠️ [{}] Fetch failed, value cleared: {}", self.entity_id, e);
                        self.snapshot = None;
                    }
                    FailurePolicy::Retain => {
                        warn!(
                            "⚠️ [{}] Fetch failed, keeping previous value: {}",
                            self.entity_id, e
                        );
                    }
                }
                PollOutcome::Failed(e)
            }
        }
    }

    pub async fn update(&mut self) -> PollOutcome {
        self.update_at(Utc::now()).await
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn metadata(&self) -> &SensorMetadata {
        &self.metadata
    }

    pub fn snapshot(&self) -> Option<&S::Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn native_value(&self) -> Option<f64> {
        self.snapshot.as_ref().and_then(SensorReading::native_value)
    }

    pub fn last_attempt(&self) -> Option<DateTime<Utc>> {
        self.gate.last_attempt()
    }

    pub fn update_interval(&self) -> TimeDelta {
        self.gate.interval()
    }

    /// State to publish for the current snapshot
    pub fn entity_state(&self) -> EntityState {
        let attributes = self
            .snapshot
            .as_ref()
            .map(SensorReading::attributes)
            .unwrap_or_default();
        EntityState::sensor(&self.metadata, self.native_value(), attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ova_api::Step;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const METADATA: SensorMetadata = SensorMetadata {
        friendly_name: "Counter",
        device_class: "volume",
        state_class: "measurement",
        unit_of_measurement: "m³",
        icon: "mdi:counter",
    };

    #[derive(Debug, Clone, PartialEq)]
    struct Reading(f64);

    impl SensorReading for Reading {
        fn native_value(&self) -> Option<f64> {
            Some(self.0)
        }

        fn attributes(&self) -> Map<String, Value> {
            let mut attributes = Map::new();
            attributes.insert("raw".to_string(), json!(self.0));
            attributes
        }
    }

    /// Replays scripted results and counts fetches
    #[derive(Debug, Default)]
    struct ScriptedSource {
        results: Mutex<VecDeque<OvaResult<Reading>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(results: Vec<OvaResult<Reading>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        type Snapshot = Reading;

        async fn fetch(&self) -> OvaResult<Reading> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(OvaError::Config("script exhausted".to_string())))
        }
    }

    fn failure() -> OvaError {
        OvaError::Status {
            step: Step::InvoiceDetail,
            status: 500,
            body: "boom".to_string(),
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 2, hour, 0, 0).unwrap()
    }

    fn sensor(results: Vec<OvaResult<Reading>>, policy: FailurePolicy) -> Sensor<ScriptedSource> {
        Sensor::new(
            "sensor.counter",
            METADATA,
            ScriptedSource::new(results),
            Duration::from_secs(3600),
            policy,
        )
    }

    #[tokio::test]
    async fn test_first_update_fetches() {
        let mut sensor = sensor(vec![Ok(Reading(1.0))], FailurePolicy::Clear);

        let outcome = sensor.update_at(at(10)).await;

        assert!(matches!(outcome, PollOutcome::Updated));
        assert_eq!(sensor.snapshot(), Some(&Reading(1.0)));
        assert_eq!(sensor.last_attempt(), Some(at(10)));
        assert_eq!(sensor.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_within_interval_skips_fetch() {
        let mut sensor = sensor(vec![Ok(Reading(1.0)), Ok(Reading(2.0))], FailurePolicy::Clear);
        sensor.update_at(at(10)).await;

        let outcome = sensor
            .update_at(at(10) + chrono::TimeDelta::minutes(59))
            .await;

        assert!(matches!(outcome, PollOutcome::Skipped));
        assert!(!outcome.attempted());
        assert_eq!(sensor.snapshot(), Some(&Reading(1.0)));
        assert_eq!(sensor.last_attempt(), Some(at(10)));
        assert_eq!(sensor.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_snapshot_replaced_after_interval() {
        let mut sensor = sensor(vec![Ok(Reading(1.0)), Ok(Reading(2.0))], FailurePolicy::Clear);
        sensor.update_at(at(10)).await;

        let outcome = sensor.update_at(at(11)).await;

        assert!(matches!(outcome, PollOutcome::Updated));
        assert_eq!(sensor.native_value(), Some(2.0));
        assert_eq!(sensor.last_attempt(), Some(at(11)));
    }

    #[tokio::test]
    async fn test_failure_clears_snapshot_and_records_attempt() {
        let mut sensor = sensor(vec![Ok(Reading(1.0)), Err(failure())], FailurePolicy::Clear);
        sensor.update_at(at(10)).await;

        let outcome = sensor.update_at(at(12)).await;

        match outcome {
            PollOutcome::Failed(e) => assert_eq!(e.status(), Some(500)),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(sensor.snapshot().is_none());
        assert_eq!(sensor.last_attempt(), Some(at(12)));

        let state = sensor.entity_state();
        assert!(state.is_unknown());
        assert!(!state.attributes.contains_key("raw"));
    }

    #[tokio::test]
    async fn test_failure_retains_snapshot_when_configured() {
        let mut sensor = sensor(vec![Ok(Reading(1.0)), Err(failure())], FailurePolicy::Retain);
        sensor.update_at(at(10)).await;

        let outcome = sensor.update_at(at(12)).await;

        assert!(matches!(outcome, PollOutcome::Failed(_)));
        assert_eq!(sensor.native_value(), Some(1.0));
        assert_eq!(sensor.last_attempt(), Some(at(12)));
    }

    #[tokio::test]
    async fn test_failed_attempt_still_gates_next_poll() {
        let mut sensor = sensor(vec![Err(failure()), Ok(Reading(3.0))], FailurePolicy::Clear);

        assert!(matches!(sensor.update_at(at(10)).await, PollOutcome::Failed(_)));
        assert!(matches!(
            sensor.update_at(at(10) + chrono::TimeDelta::minutes(30)).await,
            PollOutcome::Skipped
        ));
        assert_eq!(sensor.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entity_state_carries_metadata_and_attributes() {
        let mut sensor = sensor(vec![Ok(Reading(4.5))], FailurePolicy::Clear);
        sensor.update_at(at(10)).await;

        let state = sensor.entity_state();

        assert_eq!(state.state, "4.5");
        assert_eq!(state.attributes["raw"], json!(4.5));
        assert_eq!(state.attributes["friendly_name"], json!("Counter"));
    }

    #[test]
    fn test_failure_policy_serde() {
        assert_eq!(
            serde_json::from_value::<FailurePolicy>(json!("retain")).unwrap(),
            FailurePolicy::Retain
        );
        assert_eq!(serde_json::to_value(FailurePolicy::Clear).unwrap(), json!("clear"));
        assert!(serde_json::from_value::<FailurePolicy>(json!("Keep")).is_err());
    }
}
