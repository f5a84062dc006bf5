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

//! Error types for the ova-agua API client

use std::fmt;
use thiserror::Error;

/// Step of the authenticated fetch pipeline a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Token,
    Login,
    LastInvoice,
    InvoiceDetail,
    TelemeterInfo,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Login => "login",
            Self::LastInvoice => "last-invoice",
            Self::InvoiceDetail => "invoice-detail",
            Self::TelemeterInfo => "telemeter-info",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum OvaError {
    #[error("{step} request failed: {source}")]
    Http {
        step: Step,
        #[source]
        source: reqwest::Error,
    },

    #[error("{step} returned status {status}: {body}")]
    Status { step: Step, status: u16, body: String },

    #[error("{step} response has no `{field}`")]
    MissingField { step: Step, field: &'static str },

    #[error("{step} response could not be decoded: {reason}")]
    Decode { step: Step, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl OvaError {
    /// Pipeline step the failure happened at, if any
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Http { step, .. }
            | Self::Status { step, .. }
            | Self::MissingField { step, .. }
            | Self::Decode { step, .. } => Some(*step),
            Self::Config(_) => None,
        }
    }

    /// HTTP status for `Status` failures
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http { .. }
            | Self::MissingField { .. }
            | Self::Decode { .. }
            | Self::Config(_) => None,
        }
    }
}

pub type OvaResult<T> = Result<T, OvaError>;
