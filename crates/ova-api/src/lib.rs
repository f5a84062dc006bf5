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

//! Client for the Acciona ova-agua customer API.
//!
//! The API needs three round-trips before any data comes back: a
//! client-credentials token, a login that yields the `Control-Info` header,
//! and finally the resource itself.

pub mod client;
pub mod errors;
pub mod types;

pub use client::{DEFAULT_BASE_URL, DEFAULT_CONCESSION, OvaClient};
pub use errors::{OvaError, OvaResult, Step};
pub use types::{
    BearerToken, ContractAccount, ControlInfo, Credentials, InvoiceDetail, Session, TelemeterInfo,
};
