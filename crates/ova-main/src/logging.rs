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

//! Tracing setup.
//!
//! The subscriber is installed before the configuration is read, at `info`
//! or at whatever `RUST_LOG` says. Once the configuration is loaded its
//! `log_level` is applied through [`LogHandle`], unless `RUST_LOG` was set.

use anyhow::{Context, Result};
use std::fmt;
use tracing::{Subscriber, debug};
use tracing_subscriber::fmt::Formatter;
use tracing_subscriber::{EnvFilter, FmtSubscriber, reload};

const DEFAULT_LEVEL: &str = "info";

/// Changes the filter of an installed subscriber
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Formatter>,
    env_locked: bool,
}

impl fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandle")
            .field("env_locked", &self.env_locked)
            .finish_non_exhaustive()
    }
}

impl LogHandle {
    /// Switch to `level` (any `EnvFilter` directive). Returns `false` when
    /// `RUST_LOG` decides the filter instead.
    pub fn apply_level(&self, level: &str) -> Result<bool> {
        if self.env_locked {
            debug!("RUST_LOG is set, ignoring configured log level '{}'", level);
            return Ok(false);
        }

        let filter =
            EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{level}'"))?;
        self.handle
            .reload(filter)
            .context("Failed to apply log level")?;
        Ok(true)
    }
}

/// Subscriber to install at startup, filtered by `RUST_LOG` when set
pub fn subscriber() -> (impl Subscriber + Send + Sync + 'static, LogHandle) {
    build(std::env::var(EnvFilter::DEFAULT_ENV).ok())
}

fn build(env_directives: Option<String>) -> (impl Subscriber + Send + Sync + 'static, LogHandle) {
    let from_env = env_directives
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok());
    let env_locked = from_env.is_some();

    let builder = FmtSubscriber::builder()
        .with_env_filter(from_env.unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL)))
        .with_filter_reloading();
    let handle = builder.reload_handle();

    (builder.finish(), LogHandle { handle, env_locked })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_configured_level_replaces_default() {
        let (subscriber, handle) = build(None);

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::INFO));
            assert!(!tracing::enabled!(Level::DEBUG));

            assert!(handle.apply_level("debug").unwrap());

            assert!(tracing::enabled!(Level::DEBUG));
        });
    }

    #[test]
    fn test_rust_log_wins_over_configured_level() {
        let (subscriber, handle) = build(Some("warn".to_string()));

        tracing::subscriber::with_default(subscriber, || {
            assert!(!handle.apply_level("debug").unwrap());

            assert!(tracing::enabled!(Level::WARN));
            assert!(!tracing::enabled!(Level::INFO));
        });
    }

    #[test]
    fn test_blank_rust_log_is_ignored() {
        let (_subscriber, handle) = build(Some("  ".to_string()));
        assert!(!handle.env_locked);
    }
}
