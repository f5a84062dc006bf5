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

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Login credentials of the customer portal account
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Device token registered with the portal, sent as `deviceToken` on login
    pub device_token: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        device_token: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            device_token: device_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("device_token", &"<redacted>")
            .finish()
    }
}

/// Utility account and supply point an invoice or reading belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAccount {
    /// Subject code of the customer (`subjectCode` query parameter)
    pub client_code: String,
    pub contract_reference: String,
}

impl ContractAccount {
    pub fn new(client_code: impl Into<String>, contract_reference: impl Into<String>) -> Self {
        Self {
            client_code: client_code.into(),
            contract_reference: contract_reference.into(),
        }
    }
}

/// Bearer token from the client-credentials grant
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// `userInfo` object returned by the login call
#[derive(Debug, Clone, PartialEq)]
pub struct ControlInfo(Value);

impl ControlInfo {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Rendering used for the `Control-Info` request header.
    ///
    /// The portal expects the Python literal form of `userInfo`
    /// (`{'id': 7, 'active': True}`), with keys in the order they were
    /// received. A bare string is sent as is.
    pub fn header_value(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => {
                let mut out = String::new();
                write_literal(&mut out, other);
                out
            }
        }
    }
}

fn write_literal(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_quoted(out, s),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                write_literal(out, item);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            out.push('{');
            for (idx, (key, item)) in fields.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                write_quoted(out, key);
                out.push_str(": ");
                write_literal(out, item);
            }
            out.push('}');
        }
    }
}

/// Single quotes unless the text holds a single quote and no double quote
fn write_quoted(out: &mut String, text: &str) {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };

    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

/// Token and control info of one pipeline run.
///
/// Not `Clone`: a session lives for a single fetch cycle.
#[derive(Debug)]
pub struct Session {
    pub(crate) token: BearerToken,
    pub(crate) control_info: ControlInfo,
}

impl Session {
    pub fn new(token: BearerToken, control_info: ControlInfo) -> Self {
        Self {
            token,
            control_info,
        }
    }

    pub fn token(&self) -> &BearerToken {
        &self.token
    }

    pub fn control_info(&self) -> &ControlInfo {
        &self.control_info
    }
}

/// Invoice detail payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub invoice_type: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub invoice_code: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub lapse_key: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub lapse_year: Option<String>,
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    pub consumption: Option<f64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub payment_state: Option<String>,
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    pub actual_reading: Option<f64>,
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    pub previous_reading: Option<f64>,
}

impl InvoiceDetail {
    /// Billing period as shown to users, e.g. `3 - 2024`
    pub fn lapse_period(&self) -> String {
        format!(
            "{} - {}",
            self.lapse_key.as_deref().unwrap_or("unknown"),
            self.lapse_year.as_deref().unwrap_or("unknown")
        )
    }
}

/// Telemeter reading payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemeterInfo {
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    pub reading: Option<f64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub telemeter_number: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub reading_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default, rename = "userInfo")]
    pub user_info: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LastInvoiceResponse {
    #[serde(default, rename = "invoiceCode", deserialize_with = "string_or_number")]
    pub invoice_code: Option<String>,
}

/// Identifiers come back as either JSON strings or numbers depending on the endpoint
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or a number, got {other}"
        ))),
    }
}

/// Amounts and readings: JSON numbers, or strings such as `"5"` or `"12,34"`.
///
/// A string that does not parse is treated as missing.
fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => Ok(parse_decimal(&s)),
        Some(other) => Err(D::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}

fn parse_decimal(text: &str) -> Option<f64> {
    let text = text.trim();
    text.parse::<f64>()
        .ok()
        .or_else(|| text.replace(',', ".").parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invoice_detail_from_api_payload() {
        let detail: InvoiceDetail = serde_json::from_value(json!({
            "amount": 12.34,
            "invoiceType": "X",
            "invoiceCode": "INV42",
            "lapseKey": 3,
            "lapseYear": 2024,
            "consumption": 5,
            "paymentState": "PAID",
            "actualReading": 100,
            "previousReading": 95
        }))
        .unwrap();

        assert_eq!(detail.amount, Some(12.34));
        assert_eq!(detail.invoice_code.as_deref(), Some("INV42"));
        assert_eq!(detail.lapse_key.as_deref(), Some("3"));
        assert_eq!(detail.lapse_period(), "3 - 2024");
        assert_eq!(detail.consumption, Some(5.0));
        assert_eq!(detail.previous_reading, Some(95.0));
    }

    #[test]
    fn test_invoice_detail_tolerates_missing_fields() {
        let detail: InvoiceDetail =
            serde_json::from_value(json!({"amount": 7.5, "lapseKey": null})).unwrap();

        assert_eq!(detail.amount, Some(7.5));
        assert!(detail.invoice_type.is_none());
        assert_eq!(detail.lapse_period(), "unknown - unknown");
    }

    #[test]
    fn test_numeric_strings_in_invoice_detail() {
        let detail: InvoiceDetail = serde_json::from_value(json!({
            "amount": "12,34",
            "invoiceCode": "INV42",
            "consumption": "5",
            "actualReading": " 100.5 ",
            "previousReading": "n/a"
        }))
        .unwrap();

        assert_eq!(detail.amount, Some(12.34));
        assert_eq!(detail.consumption, Some(5.0));
        assert_eq!(detail.actual_reading, Some(100.5));
        assert_eq!(detail.previous_reading, None);
        assert_eq!(detail.invoice_code.as_deref(), Some("INV42"));
    }

    #[test]
    fn test_numeric_string_reading() {
        let info: TelemeterInfo =
            serde_json::from_value(json!({"reading": "42", "telemeterNumber": "M1"})).unwrap();
        assert_eq!(info.reading, Some(42.0));

        let result = serde_json::from_value::<TelemeterInfo>(json!({"reading": [42]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_identifier_rejects_objects() {
        let result = serde_json::from_value::<TelemeterInfo>(json!({
            "reading": 1,
            "telemeterNumber": {"id": 1}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_telemeter_number() {
        let info: TelemeterInfo = serde_json::from_value(json!({
            "reading": 42,
            "telemeterNumber": 1234,
            "readingDate": "2024-01-01"
        }))
        .unwrap();

        assert_eq!(info.reading, Some(42.0));
        assert_eq!(info.telemeter_number.as_deref(), Some("1234"));
    }

    #[test]
    fn test_control_info_header_value() {
        let info = ControlInfo::new(json!({"id": 7, "name": "Ana"}));
        assert_eq!(info.header_value(), "{'id': 7, 'name': 'Ana'}");

        let info = ControlInfo::new(json!("opaque-value"));
        assert_eq!(info.header_value(), "opaque-value");
    }

    #[test]
    fn test_control_info_header_python_literals() {
        let info: ControlInfo = ControlInfo::new(
            serde_json::from_str(
                r#"{"userId": 12, "active": true, "admin": false, "phone": null,
                    "roles": ["owner", "payer"], "ratio": 0.5,
                    "address": {"street": "Rúa d'Arriba", "note": "say \"hi\""}}"#,
            )
            .unwrap(),
        );

        assert_eq!(
            info.header_value(),
            "{'userId': 12, 'active': True, 'admin': False, 'phone': None, \
             'roles': ['owner', 'payer'], 'ratio': 0.5, \
             'address': {'street': \"Rúa d'Arriba\", 'note': 'say \"hi\"'}}"
        );
    }

    #[test]
    fn test_control_info_quote_escaping() {
        let info = ControlInfo::new(json!(["it's \"both\"", "back\\slash", "two\nlines"]));
        assert_eq!(
            info.header_value(),
            r#"['it\'s "both"', 'back\\slash', 'two\nlines']"#
        );
    }

    #[test]
    fn test_secrets_not_in_debug_output() {
        let credentials = Credentials::new("user", "hunter2", "device-abc");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("device-abc"));

        let token = BearerToken::new("secret-token");
        assert!(!format!("{token:?}").contains("secret-token"));
    }
}
