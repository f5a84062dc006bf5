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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HaError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("authentication with Home Assistant failed")]
    AuthenticationFailed,

    #[error("Home Assistant API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

pub type HaResult<T> = Result<T, HaError>;
