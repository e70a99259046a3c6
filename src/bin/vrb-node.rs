//! Host-based forwarding node for development and testing.
//!
//! Runs the Virtual Reassembly Buffer with its collector and serves
//! statistics at http://localhost:8080/stats.
//!
//! The node has no radio of its own. It builds the route dispatcher from
//! the config so a forwarder embedding this binary's setup gets validated
//! resolvers; here the dispatcher is only reported in the heartbeat.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin vrb-node -- [config.json]
//! ```

use log::{error, info, warn};
use sixlowpan_vrb::routing::ProtocolTag;
use sixlowpan_vrb::{spawn_collector, NodeConfig, RouteDispatch, StatsServer, Vrb};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== VRB forwarding node starting ===");

    let config = match std::env::args().nth(1) {
        Some(path) => match NodeConfig::load(Path::new(&path)) {
            Ok(config) => {
                info!("Loaded config from {}", path);
                config
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        None => NodeConfig::default(),
    };

    let vrb_config = match config.vrb.to_config() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let vrb = match Vrb::new(vrb_config) {
        Ok(vrb) => vrb,
        Err(e) => {
            error!("Failed to create VRB: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "VRB: {} slots, entry timeout {:?}",
        vrb_config.capacity, vrb_config.entry_timeout
    );

    let mut dispatch = RouteDispatch::new();
    match config.ipv6.to_resolver() {
        Ok(resolver) => {
            info!("IPv6 forwarding: {} static routes", resolver.routes().len());
            dispatch.register(ProtocolTag::Ipv6, resolver);
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
    if let Some(ndn) = &config.ndn {
        match ndn.to_resolver() {
            Ok(resolver) => {
                info!("NDN forwarding: {} FIB routes", ndn.routes.len());
                dispatch.register(ProtocolTag::Ndn, resolver);
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    let cancel = CancellationToken::new();
    let collector = spawn_collector(vrb.clone(), vrb_config.gc_interval, cancel.clone());

    // Keep server alive until shutdown; dropping it stops the thread
    let _stats_server = if config.stats_port == 0 {
        None
    } else {
        match StatsServer::start(None, config.stats_port, vrb.clone()) {
            Ok(server) => {
                info!(
                    "Stats server running at http://localhost:{}/stats",
                    config.stats_port
                );
                Some(server)
            }
            Err(e) => {
                warn!("Failed to start stats server: {}", e);
                warn!("Continuing without stats server");
                None
            }
        }
    };

    info!("Entering main loop (Ctrl+C to exit)...");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut heartbeat_counter = 0u64;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                break;
            }
            _ = heartbeat.tick() => {
                heartbeat_counter += 1;
                let stats = vrb.stats().snapshot();
                info!(
                    "Heartbeat #{} - {} active entries, {} created, {} route failures (ipv6={}, ndn={})",
                    heartbeat_counter,
                    stats.entries,
                    stats.created,
                    stats.route_failures,
                    dispatch.has_resolver(ProtocolTag::Ipv6),
                    dispatch.has_resolver(ProtocolTag::Ndn),
                );
            }
        }
    }

    info!("Shutting down...");
    cancel.cancel();
    match collector.await {
        Ok(evicted) => info!("Collector evicted {} entries in total", evicted),
        Err(e) => warn!("Collector task failed: {}", e),
    }
    vrb.reset();
}
