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
use ova_api::{ContractAccount, Credentials, InvoiceDetail, OvaClient, OvaResult};
use ova_ha::SensorMetadata;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;

pub const INVOICE_METADATA: SensorMetadata = SensorMetadata {
    friendly_name: "Última Factura de Agua",
    device_class: "monetary",
    state_class: "measurement",
    unit_of_measurement: "€",
    icon: "mdi:receipt-text",
};

pub type InvoiceSensor = Sensor<InvoiceSource>;

/// Latest invoice of one supply point
#[derive(Debug, Clone)]
pub struct InvoiceSource {
    client: Arc<OvaClient>,
    credentials: Credentials,
    account: ContractAccount,
}

impl InvoiceSource {
    pub fn new(client: Arc<OvaClient>, credentials: Credentials, account: ContractAccount) -> Self {
        Self {
            client,
            credentials,
            account,
        }
    }
}

#[async_trait]
impl SnapshotSource for InvoiceSource {
    type Snapshot = InvoiceDetail;

    async fn fetch(&self) -> OvaResult<InvoiceDetail> {
        self.client
            .fetch_invoice(&self.credentials, &self.account)
            .await
    }
}

impl SensorReading for InvoiceDetail {
    fn native_value(&self) -> Option<f64> {
        self.amount
    }

    fn attributes(&self) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("invoiceType".to_string(), json!(self.invoice_type));
        attributes.insert("invoiceCode".to_string(), json!(self.invoice_code));
        attributes.insert("lapseKey".to_string(), json!(self.lapse_period()));
        attributes.insert("consumption".to_string(), json!(self.consumption));
        attributes.insert("paymentState".to_string(), json!(self.payment_state));
        attributes.insert("actualReading".to_string(), json!(self.actual_reading));
        attributes.insert("previousReading".to_string(), json!(self.previous_reading));
        attributes
    }
}

impl Sensor<InvoiceSource> {
    pub fn invoice(
        entity_id: impl Into<String>,
        source: InvoiceSource,
        update_interval: Duration,
        policy: FailurePolicy,
    ) -> Self {
        Self::new(entity_id, INVOICE_METADATA, source, update_interval, policy)
    }
}
