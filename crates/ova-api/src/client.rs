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

use crate::errors::{OvaError, OvaResult, Step};
use crate::types::{
    BearerToken, ContractAccount, ControlInfo, Credentials, InvoiceDetail, LastInvoiceResponse,
    LoginResponse, Session, TelemeterInfo, TokenResponse,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, trace};

pub const DEFAULT_BASE_URL: &str = "https://api-ae.acciona.com";
pub const DEFAULT_CONCESSION: &str = "LU";

const CONTROL_INFO_HEADER: &str = "Control-Info";
const RESOURCE_ACCEPT: &str = "application/json, text/plain, */*";
const LOGIN_CONTENT_TYPE: &str = "application/json;charset=UTF-8";
const USER_AGENT: &str = concat!("ova-water/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(rename = "deviceToken")]
    device_token: &'a str,
}

/// Client for the ova-agua customer API.
///
/// Every `fetch_*` call runs the whole pipeline: a fresh token, a fresh
/// login, then the resource requests. Nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct OvaClient {
    base_url: String,
    concession: String,
    client: Client,
}

impl OvaClient {
    pub fn new(base_url: impl Into<String>) -> OvaResult<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> OvaResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| OvaError::Config(format!("Failed to build HTTP client: {e}")))?;

        let base_url = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            concession: DEFAULT_CONCESSION.to_string(),
            client,
        })
    }

    /// Use a concession other than `LU`
    pub fn with_concession(mut self, concession: impl Into<String>) -> Self {
        self.concession = concession.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn concession(&self) -> &str {
        &self.concession
    }

    /// Obtain a bearer token through the client-credentials grant
    pub async fn get_token(&self) -> OvaResult<BearerToken> {
        let url = format!("{}/ova-agua-login/token", self.base_url);
        debug!("🔑 [OVA TOKEN] Requesting token: {}", url);

        let request = self
            .client
            .post(&url)
            .header(ACCEPT, "*/*")
            .form(&[("grant_type", "client_credentials")]);
        let body = self.send(Step::Token, request).await?;
        let response: TokenResponse = decode(Step::Token, &body)?;

        match response.access_token {
            Some(token) if !token.is_empty() => {
                debug!("✅ [OVA TOKEN] Token acquired");
                Ok(BearerToken::new(token))
            }
            _ => Err(missing(Step::Token, "access_token")),
        }
    }

    /// Exchange the account credentials for the session's control info
    pub async fn login(
        &self,
        token: &BearerToken,
        credentials: &Credentials,
    ) -> OvaResult<ControlInfo> {
        let url = format!("{}/ova-agua-login/login", self.base_url);
        debug!("🔐 [OVA LOGIN] Logging in as {}", credentials.username);

        let payload = LoginRequest {
            username: &credentials.username,
            password: &credentials.password,
            device_token: &credentials.device_token,
        };
        let request = self
            .client
            .post(&url)
            .bearer_auth(token.as_str())
            .header(ACCEPT, RESOURCE_ACCEPT)
            .header(CONTENT_TYPE, LOGIN_CONTENT_TYPE)
            .json(&payload);
        let body = self.send(Step::Login, request).await?;
        let response: LoginResponse = decode(Step::Login, &body)?;

        match response.user_info {
            Some(user_info) if !is_blank(&user_info) => {
                debug!("✅ [OVA LOGIN] Logged in as {}", credentials.username);
                Ok(ControlInfo::new(user_info))
            }
            _ => Err(missing(Step::Login, "userInfo")),
        }
    }

    /// Token followed by login
    pub async fn open_session(&self, credentials: &Credentials) -> OvaResult<Session> {
        let token = self.get_token().await?;
        let control_info = self.login(&token, credentials).await?;
        Ok(Session::new(token, control_info))
    }

    /// Code of the most recent invoice of the supply point
    pub async fn get_last_invoice_code(
        &self,
        session: &Session,
        account: &ContractAccount,
    ) -> OvaResult<String> {
        let url = self.supply_url(&account.contract_reference, "invoice/last-invoice");
        debug!("🔍 [OVA INVOICE] Looking up last invoice: {}", url);

        let request = self
            .resource_get(session, &url)
            .query(&[("subjectCode", account.client_code.as_str())]);
        let body = self.send(Step::LastInvoice, request).await?;
        let response: LastInvoiceResponse = decode(Step::LastInvoice, &body)?;

        response
            .invoice_code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| missing(Step::LastInvoice, "invoiceCode"))
    }

    pub async fn get_invoice_detail(
        &self,
        session: &Session,
        account: &ContractAccount,
        invoice_code: &str,
    ) -> OvaResult<InvoiceDetail> {
        let url = self.supply_url(&account.contract_reference, "invoice/detail");
        debug!("🔍 [OVA INVOICE] Fetching detail of {}", invoice_code);

        let request = self.resource_get(session, &url).query(&[
            ("invoiceCode", invoice_code),
            ("subjectCode", account.client_code.as_str()),
        ]);
        let body = self.send(Step::InvoiceDetail, request).await?;
        decode(Step::InvoiceDetail, &body)
    }

    pub async fn get_telemeter_info(
        &self,
        session: &Session,
        contract_reference: &str,
    ) -> OvaResult<TelemeterInfo> {
        let url = self.supply_url(contract_reference, "consumption/telemeter-info");
        debug!("🔍 [OVA TELEMETRY] Fetching telemeter info: {}", url);

        let request = self.resource_get(session, &url);
        let body = self.send(Step::TelemeterInfo, request).await?;
        decode(Step::TelemeterInfo, &body)
    }

    /// Full invoice pipeline: token, login, last invoice lookup, detail
    pub async fn fetch_invoice(
        &self,
        credentials: &Credentials,
        account: &ContractAccount,
    ) -> OvaResult<InvoiceDetail> {
        let session = self.open_session(credentials).await?;
        let invoice_code = self.get_last_invoice_code(&session, account).await?;
        let detail = self
            .get_invoice_detail(&session, account, &invoice_code)
            .await?;

        info!(
            "✅ [OVA INVOICE] Invoice {} fetched: amount={:?}, period={}",
            invoice_code,
            detail.amount,
            detail.lapse_period()
        );
        Ok(detail)
    }

    /// Full telemetry pipeline: token, login, telemeter info
    pub async fn fetch_telemetry(
        &self,
        credentials: &Credentials,
        contract_reference: &str,
    ) -> OvaResult<TelemeterInfo> {
        let session = self.open_session(credentials).await?;
        let info = self.get_telemeter_info(&session, contract_reference).await?;

        info!(
            "✅ [OVA TELEMETRY] Reading fetched: {:?} m³ on {:?}",
            info.reading, info.reading_date
        );
        Ok(info)
    }

    fn supply_url(&self, contract_reference: &str, resource: &str) -> String {
        format!(
            "{}/ova-agua-invoice/api/v1/concession/{}/supply/{}/{}",
            self.base_url,
            urlencoding::encode(&self.concession),
            urlencoding::encode(contract_reference),
            resource
        )
    }

    fn resource_get(&self, session: &Session, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(session.token.as_str())
            .header(ACCEPT, RESOURCE_ACCEPT)
            .header(CONTROL_INFO_HEADER, session.control_info.header_value())
    }

    /// Send a request and return the body of a successful response
    async fn send(&self, step: Step, request: RequestBuilder) -> OvaResult<String> {
        let response = request.send().await.map_err(|source| {
            error!("❌ [OVA ERROR] {} request failed: {}", step, source);
            OvaError::Http { step, source }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| {
            error!("❌ [OVA ERROR] {} response could not be read: {}", step, source);
            OvaError::Http { step, source }
        })?;

        if !status.is_success() {
            error!("❌ [OVA ERROR] {} returned status {}: {}", step, status, body);
            return Err(OvaError::Status {
                step,
                status: status.as_u16(),
                body,
            });
        }

        trace!("   {} response: {}", step, body);
        Ok(body)
    }
}

fn decode<T: DeserializeOwned>(step: Step, body: &str) -> OvaResult<T> {
    serde_json::from_str(body).map_err(|e| {
        error!("❌ [OVA ERROR] {} response is not valid: {}", step, e);
        error!("   Body: {}", body);
        OvaError::Decode {
            step,
            reason: e.to_string(),
        }
    })
}

fn missing(step: Step, field: &'static str) -> OvaError {
    error!("❌ [OVA ERROR] {} response has no `{}`", step, field);
    OvaError::MissingField { step, field }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
