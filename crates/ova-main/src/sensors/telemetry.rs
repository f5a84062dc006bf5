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

use super::{FailurePolicy, Sensor, SensorReading, SnapshotSource};
use async_trait::async_trait;
use ova_api::{Credentials, OvaClient, OvaResult, TelemeterInfo};
use ova_ha::SensorMetadata;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;

pub const TELEMETRY_METADATA: SensorMetadata = SensorMetadata {
    friendly_name: "Sensor de Telemetría",
    device_class: "volume",
    state_class: "measurement",
    unit_of_measurement: "m³",
    icon: "mdi:water",
};

pub type TelemetrySensor = Sensor<TelemetrySource>;

/// Latest telemeter reading of one supply point
#[derive(Debug, Clone)]
pub struct TelemetrySource {
    client: Arc<OvaClient>,
    credentials: Credentials,
    contract_reference: String,
}

impl TelemetrySource {
    pub fn new(
        client: Arc<OvaClient>,
        credentials: Credentials,
        contract_reference: impl Into<String>,
    ) -> Self {
        Self {
            client,
            credentials,
            contract_reference: contract_reference.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for TelemetrySource {
    type Snapshot = TelemeterInfo;

    async fn fetch(&self) -> OvaResult<TelemeterInfo> {
        self.client
            .fetch_telemetry(&self.credentials, &self.contract_reference)
            .await
    }
}

impl SensorReading for TelemeterInfo {
    fn native_value(&self) -> Option<f64> {
        self.reading
    }

    fn attributes(&self) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("telemeterNumber".to_string(), json!(self.telemeter_number));
        attributes.insert("readingDate".to_string(), json!(self.reading_date));
        attributes
    }
}

impl Sensor<TelemetrySource> {
    pub fn telemetry(
        entity_id: impl Into<String>,
        source: TelemetrySource,
        update_interval: Duration,
        policy: FailurePolicy,
    ) -> Self {
        Self::new(entity_id, TELEMETRY_METADATA, source, update_interval, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_reading() {
        let info = TelemeterInfo {
            reading: Some(42.0),
            telemeter_number: Some("M1".to_string()),
            reading_date: Some("2024-01-01".to_string()),
        };

        assert_eq!(info.native_value(), Some(42.0));
        let attributes = info.attributes();
        assert_eq!(attributes["telemeterNumber"], json!("M1"));
        assert_eq!(attributes["readingDate"], json!("2024-01-01"));
    }

    #[test]
    fn test_sensor_uses_telemetry_metadata() {
        let client = Arc::new(OvaClient::new("http://127.0.0.1:1").unwrap());
        let source = TelemetrySource::new(client, Credentials::new("u", "p", "d"), "REF1");
        let sensor = Sensor::telemetry(
            "sensor.sensor_de_telemetria",
            source,
            Duration::from_secs(3600),
            FailurePolicy::Clear,
        );

        let state = sensor.entity_state();
        assert!(state.is_unknown());
        assert_eq!(state.attributes["unit_of_measurement"], json!("m³"));
        assert_eq!(state.attributes["device_class"], json!("volume"));
    }
}
