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

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use ova_main::{AppConfig, Integration, publisher_from_config};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "ova-water", version, about = "Water invoice and meter sensors for Home Assistant")]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Poll once, print both sensor states as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (subscriber, log) = ova_main::logging::subscriber();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Err(e) = log.apply_level(&config.log_level) {
        warn!("{:#}, keeping the default log level", e);
    }

    info!("🚀 Starting OVA Water v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    let publisher = publisher_from_config(&config);
    if let Some(client) = &publisher {
        if client.ping().await {
            info!("✅ Connected to Home Assistant at {}", client.base_url());
        } else {
            warn!(
                "Home Assistant at {} is not reachable yet, states will be published once it is",
                client.base_url()
            );
        }
    }

    let mut integration = Integration::from_config(&config, publisher)?;

    if cli.once {
        integration.tick(Utc::now()).await;
        let states = serde_json::to_string_pretty(&integration.states())
            .context("Failed to render sensor states")?;
        println!("{states}");
        return Ok(());
    }

    integration.run_until(shutdown_signal()).await;
    info!("Shutting down");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
