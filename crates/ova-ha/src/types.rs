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

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// State Home Assistant shows for entities without a value
pub const UNKNOWN_STATE: &str = "unknown";

/// Static description of a sensor entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorMetadata {
    pub friendly_name: &'static str,
    pub device_class: &'static str,
    pub state_class: &'static str,
    pub unit_of_measurement: &'static str,
    pub icon: &'static str,
}

/// Body of `POST /api/states/<entity_id>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    /// Sensor state with the metadata attributes merged in.
    ///
    /// A missing value is published as `unknown`.
    pub fn sensor(
        metadata: &SensorMetadata,
        value: Option<f64>,
        mut attributes: Map<String, Value>,
    ) -> Self {
        attributes.insert("friendly_name".to_string(), metadata.friendly_name.into());
        attributes.insert("device_class".to_string(), metadata.device_class.into());
        attributes.insert("state_class".to_string(), metadata.state_class.into());
        attributes.insert(
            "unit_of_measurement".to_string(),
            metadata.unit_of_measurement.into(),
        );
        attributes.insert("icon".to_string(), metadata.icon.into());

        let state = value.map_or_else(|| UNKNOWN_STATE.to_string(), |v| v.to_string());
        Self { state, attributes }
    }

    pub fn is_unknown(&self) -> bool {
        self.state == UNKNOWN_STATE
    }
}

/// Entity state as returned by Home Assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaEntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub last_changed: String,
    #[serde(default)]
    pub last_updated: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const METADATA: SensorMetadata = SensorMetadata {
        friendly_name: "Test Sensor",
        device_class: "volume",
        state_class: "measurement",
        unit_of_measurement: "m³",
        icon: "mdi:water",
    };

    #[test]
    fn test_sensor_state_with_value() {
        let mut attributes = Map::new();
        attributes.insert("telemeterNumber".to_string(), json!("M1"));

        let state = EntityState::sensor(&METADATA, Some(42.0), attributes);

        assert_eq!(state.state, "42");
        assert_eq!(state.attributes["telemeterNumber"], json!("M1"));
        assert_eq!(state.attributes["unit_of_measurement"], json!("m³"));
        assert_eq!(state.attributes["friendly_name"], json!("Test Sensor"));
        assert!(!state.is_unknown());
    }

    #[test]
    fn test_sensor_state_without_value() {
        let state = EntityState::sensor(&METADATA, None, Map::new());

        assert!(state.is_unknown());
        assert_eq!(state.attributes["device_class"], json!("volume"));
    }

    #[test]
    fn test_fractional_state_rendering() {
        let state = EntityState::sensor(&METADATA, Some(12.34), Map::new());
        assert_eq!(state.state, "12.34");
    }
}
