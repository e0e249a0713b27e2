//! Interactive console host for the engine bridge.

mod cli;

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ember_bridge::{BridgeOptions, CallbackSet, EngineBridge, EngineConfig, LocalHost};
use ember_bridge_core::{load_engine_config, save_engine_config};
use ember_compute::CpuBackend;
use tracing::{error, info, warn};

use crate::cli::Cli;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Saved config first, CLI flags on top.
fn resolve_config(args: &Cli) -> anyhow::Result<EngineConfig> {
    let mut cfg = if args.fresh {
        EngineConfig::default()
    } else {
        load_engine_config()
            .context("loading saved configuration")?
            .unwrap_or_default()
    };

    if let Some(pool) = &args.pool {
        cfg.pool_url = pool.clone();
    }
    if let Some(user) = &args.user {
        cfg.username = user.clone();
    }
    if let Some(pass) = &args.pass {
        cfg.password = pass.clone();
    }
    if args.anonymous {
        cfg.allow_anonymous = true;
    }
    if let Some(threads) = args.threads {
        cfg.threads = threads;
    }
    if let Some(algorithm) = &args.algorithm {
        cfg.algorithm = algorithm.clone();
    }
    cfg.normalize();

    if args.save_config {
        save_engine_config(&cfg).context("saving configuration")?;
        info!("configuration saved");
    }
    Ok(cfg)
}

fn console_callbacks() -> CallbackSet {
    CallbackSet::none()
        .with_status(|status| info!(%status, "engine state changed"))
        .with_performance(|m| {
            info!(
                hashrate = format_args!("{:.1} H/s", m.hashrate),
                total = m.total_hashes,
                threads = m.threads_active,
                "metrics"
            );
        })
        .with_error(|message| error!(%message, "engine error"))
}

const HELP: &str = "commands: start | stop | pause | resume | status | metrics | config | \
                    secure on|off | quit";

fn run_console(bridge: &EngineBridge) -> anyhow::Result<()> {
    println!("{HELP}");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading command")?;
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let result = match (command, words.next()) {
            ("start", _) => bridge.start(bridge.get_configuration()),
            ("stop", _) => bridge.stop(),
            ("pause", _) => bridge.pause(),
            ("resume", _) => bridge.resume(),
            ("status", _) => {
                println!("{}", bridge.get_status());
                Ok(())
            }
            ("metrics", _) => {
                println!("{}", serde_json::to_string_pretty(&bridge.get_metrics())?);
                Ok(())
            }
            ("config", _) => {
                let mut cfg = bridge.get_configuration();
                cfg.password = "<redacted>".to_string();
                println!("{}", serde_json::to_string_pretty(&cfg)?);
                Ok(())
            }
            ("secure", Some(flag @ ("on" | "off"))) => {
                bridge.enable_secure_mode(flag == "on");
                Ok(())
            }
            ("quit" | "exit", _) => break,
            _ => {
                println!("{HELP}");
                Ok(())
            }
        };
        if let Err(err) = result {
            warn!(%err, "command refused");
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Cli::parse();
    let config = resolve_config(&args)?;

    let bridge = EngineBridge::new(Arc::new(CpuBackend), BridgeOptions::default());
    bridge.initialize(Arc::new(LocalHost), console_callbacks())?;
    if let Err(err) = bridge.update_configuration(config) {
        warn!(%err, "configuration not accepted yet; adjust flags before `start`");
    }

    let outcome = run_console(&bridge);
    bridge.cleanup();
    outcome
}
