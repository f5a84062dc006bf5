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

use crate::errors::{HaError, HaResult};
use crate::types::{EntityState, HaEntityState};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const SUPERVISOR_URL: &str = "http://supervisor/core";
const SUPERVISOR_TOKEN_VAR: &str = "SUPERVISOR_TOKEN";
const DEFAULT_BASE_URL: &str = "http://localhost:8123";

/// Home Assistant REST API client
#[derive(Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for HomeAssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl HomeAssistantClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> HaResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HaError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Publish through the Supervisor proxy when running as an add-on
    pub fn from_supervisor() -> HaResult<Self> {
        Self::with_supervisor_token(std::env::var(SUPERVISOR_TOKEN_VAR).ok())
    }

    fn with_supervisor_token(token: Option<String>) -> HaResult<Self> {
        let Some(token) = token.filter(|token| !token.trim().is_empty()) else {
            return Err(HaError::ConfigError(format!(
                "{SUPERVISOR_TOKEN_VAR} is not set, not running as an add-on"
            )));
        };

        info!("🏠 [HA] Publishing through the Supervisor proxy");
        Self::new(SUPERVISOR_URL, token)
    }

    /// Create HA client from configuration values
    /// Falls back to environment variables if config values are not set
    pub fn from_config(ha_base_url: Option<String>, ha_token: Option<String>) -> HaResult<Self> {
        let base_url = ha_base_url
            .or_else(|| std::env::var("HA_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let token = ha_token
            .or_else(|| std::env::var("HA_TOKEN").ok())
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                HaError::ConfigError(
                    "HA token not found in config or HA_TOKEN environment variable".to_string(),
                )
            })?;

        info!("Initializing HA client from configuration: {}", base_url);
        Self::new(base_url, token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create or update the state of an entity
    pub async fn set_state(&self, entity_id: &str, state: &EntityState) -> HaResult<HaEntityState> {
        if !is_valid_entity_id(entity_id) {
            error!("❌ [HA ERROR] Invalid entity id: {}", entity_id);
            return Err(HaError::InvalidEntityId(entity_id.to_string()));
        }

        let url = format!(
            "{}/api/states/{}",
            self.base_url,
            urlencoding::encode(entity_id)
        );
        debug!("📤 [HA PUBLISH] {} = '{}'", entity_id, state.state);
        trace!("   Attributes: {:?}", state.attributes);

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(state)
                    .send()
                    .await
            })
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let stored = response.json::<HaEntityState>().await?;
                info!("✅ [HA PUBLISH] {} = '{}'", stored.entity_id, stored.state);
                Ok(stored)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("❌ [HA ERROR] Authentication failed for: {}", entity_id);
                Err(HaError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("❌ [HA ERROR] Status {}: {}", status, error_text);
                Err(HaError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Whether the REST API answers 2xx for this token. Never retried.
    pub async fn ping(&self) -> bool {
        let url = format!("{}/api/", self.base_url);
        let reply = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match reply {
            Ok(_) => {
                debug!("🔗 [HA] API reachable at {}", self.base_url);
                true
            }
            Err(e) => {
                warn!("⚠️ [HA] API not reachable at {}: {}", self.base_url, e);
                false
            }
        }
    }

    /// Send until a response arrives or `max_retries` transport errors have
    /// happened. HTTP error statuses are responses and are not retried.
    async fn retry_request<F, Fut>(&self, mut send: F) -> HaResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 1;
        loop {
            let e = match send().await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if attempt >= self.max_retries {
                error!("❌ [HA ERROR] Giving up after {} attempts: {}", attempt, e);
                return Err(HaError::HttpError(e));
            }

            let delay = self.backoff(attempt);
            warn!(
                "⚠️ [HA] Attempt {}/{} failed: {}, next in {:?}",
                attempt, self.max_retries, e, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Wait after the given failed attempt: `retry_delay`, then doubling
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_delay.saturating_mul(factor)
    }

    /// Set custom retry configuration
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }
}

/// `<domain>.<object_id>`, lowercase letters, digits and underscores only
pub fn is_valid_entity_id(entity_id: &str) -> bool {
    let Some((domain, object_id)) = entity_id.split_once('.') else {
        return false;
    };
    let valid_part = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    };
    valid_part(domain) && valid_part(object_id)
}
