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

//! OVA Water - invoice and telemetry sensors for Home Assistant

pub mod config;
pub mod logging;
pub mod poll_gate;
pub mod runner;
pub mod sensors;

pub use config::AppConfig;
pub use logging::LogHandle;
pub use poll_gate::{GateState, PollGate};
pub use runner::{Integration, MIN_SCAN_INTERVAL, TickReport, publisher_from_config};
pub use sensors::{
    FailurePolicy, InvoiceSensor, InvoiceSource, PollOutcome, Sensor, SensorReading,
    SnapshotSource, TelemetrySensor, TelemetrySource,
};
