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

use crate::sensors::FailurePolicy;
use anyhow::{Context, Result};
use ova_api::{ContractAccount, Credentials, DEFAULT_BASE_URL, DEFAULT_CONCESSION};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// HA addon options, then development files in the working directory
pub const DEFAULT_CONFIG_LOCATIONS: [&str; 3] = ["/data/options.json", "config.toml", "config.json"];

pub const DEFAULT_INVOICE_ENTITY_ID: &str = "sensor.ultima_factura_de_agua";
pub const DEFAULT_TELEMETRY_ENTITY_ID: &str = "sensor.sensor_de_telemetria";

/// Main application configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Customer portal login
    pub username: String,
    pub password: String,

    /// Device token registered with the customer portal
    /// Accepts both "deviceToken" (HA addon options.json) and "device_token" (config.toml)
    #[serde(rename = "deviceToken", alias = "device_token")]
    pub device_token: String,

    /// Subject code of the customer
    pub client_code: String,

    /// Supply point the invoices and readings belong to
    pub contract_reference: String,

    /// Minimum time between two fetches of the same sensor (hours)
    pub update_interval_hours: u64,

    /// How often the poll gates are checked (seconds)
    pub scan_interval_secs: u64,

    /// What a sensor shows after a failed fetch
    pub failure_policy: FailurePolicy,

    pub api_base_url: String,
    pub concession: String,

    /// Per-request timeout towards the utility API (seconds)
    pub request_timeout_secs: u64,

    /// Home Assistant connection, Supervisor or environment when unset
    pub ha_base_url: Option<String>,
    pub ha_token: Option<String>,

    pub invoice_entity_id: String,
    pub telemetry_entity_id: String,

    /// Log level used when RUST_LOG is not set
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            device_token: String::new(),
            client_code: String::new(),
            contract_reference: String::new(),
            update_interval_hours: 24,
            scan_interval_secs: 30,
            failure_policy: FailurePolicy::default(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            concession: DEFAULT_CONCESSION.to_string(),
            request_timeout_secs: 30,
            ha_base_url: None,
            ha_token: None,
            invoice_entity_id: DEFAULT_INVOICE_ENTITY_ID.to_string(),
            telemetry_entity_id: DEFAULT_TELEMETRY_ENTITY_ID.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("username", &self.username)
            .field("client_code", &self.client_code)
            .field("contract_reference", &self.contract_reference)
            .field("update_interval_hours", &self.update_interval_hours)
            .field("scan_interval_secs", &self.scan_interval_secs)
            .field("failure_policy", &self.failure_policy)
            .field("api_base_url", &self.api_base_url)
            .field("concession", &self.concession)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("ha_base_url", &self.ha_base_url)
            .field("invoice_entity_id", &self.invoice_entity_id)
            .field("telemetry_entity_id", &self.telemetry_entity_id)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load configuration from an explicit file, HA addon options or a
    /// development config file, with environment overrides on top
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let locations: Vec<PathBuf> = DEFAULT_CONFIG_LOCATIONS.iter().map(PathBuf::from).collect();
        Self::load_from(explicit, &locations, |key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] with injectable search paths and environment
    pub fn load_from<F>(explicit: Option<&Path>, locations: &[PathBuf], env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if let Some(path) = explicit {
            let config = Self::from_file(path)?;
            info!("✅ Loaded configuration from {}", path.display());
            config
        } else if let Some(path) = locations.iter().find(|path| path.is_file()) {
            let config = Self::from_file(path)?;
            info!("✅ Loaded configuration from {}", path.display());
            config
        } else {
            warn!("No configuration file found, using defaults with environment overrides");
            Self::default()
        };

        config.apply_env(env);
        config.validate()?;

        if config.device_token.is_empty() {
            warn!("deviceToken is empty, the portal may reject the login");
        }

        Ok(config)
    }

    /// Parse a config file, TOML for `.toml` and JSON otherwise
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        }
    }

    /// Apply environment overrides on top of the loaded values
    fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(username) = env("OVA_USERNAME") {
            self.username = username;
        }
        if let Some(password) = env("OVA_PASSWORD") {
            self.password = password;
        }
        if let Some(device_token) = env("OVA_DEVICE_TOKEN") {
            self.device_token = device_token;
        }
        if let Some(client_code) = env("OVA_CLIENT_CODE") {
            self.client_code = client_code;
        }
        if let Some(reference) = env("OVA_CONTRACT_REFERENCE") {
            self.contract_reference = reference;
        }

        if let Some(hours) = env("OVA_UPDATE_INTERVAL_HOURS") {
            match hours.trim().parse::<u64>() {
                Ok(hours) => self.update_interval_hours = hours,
                Err(_) => warn!("Ignoring invalid OVA_UPDATE_INTERVAL_HOURS: {}", hours),
            }
        }

        if let Some(url) = env("HA_BASE_URL") {
            self.ha_base_url = Some(url);
        }
        if let Some(token) = env("HA_TOKEN") {
            self.ha_token = Some(token);
        }

        // The addon options form stores cleared fields as empty strings
        self.ha_base_url = self.ha_base_url.take().filter(|v| !v.trim().is_empty());
        self.ha_token = self.ha_token.take().filter(|v| !v.trim().is_empty());
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("username", &self.username),
            ("password", &self.password),
            ("client_code", &self.client_code),
            ("contract_reference", &self.contract_reference),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        if self.scan_interval_secs == 0 {
            anyhow::bail!("scan_interval_secs must be greater than 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        for (name, entity_id) in [
            ("invoice_entity_id", &self.invoice_entity_id),
            ("telemetry_entity_id", &self.telemetry_entity_id),
        ] {
            if !entity_id.starts_with("sensor.") || !ova_ha::is_valid_entity_id(entity_id) {
                anyhow::bail!(
                    "{} must look like 'sensor.<name>' (lowercase letters, digits, '_'), got '{}'",
                    name,
                    entity_id
                );
            }
        }

        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password, &self.device_token)
    }

    pub fn contract_account(&self) -> ContractAccount {
        ContractAccount::new(&self.client_code, &self.contract_reference)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_hours.saturating_mul(3600))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
