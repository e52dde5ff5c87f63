// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The `redns` binary: an authoritative DNS server answering from a
//! Redis-compatible zone store, plus zone management against the same
//! store.

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::net::{TcpListener, UdpSocket};
use tracing::{error, info};

use redns::authority::Catalog;
use redns::config::Config;
use redns::logger;
use redns::record::{RecordSet, Zone};
use redns::server::ServerFuture;
use redns::store::redis::{RedisBackend, RedisStore};

/// Command-line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "redns", version, about = "A Redis-backed authoritative DNS server", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short = 'c', long, default_value = "/etc/redns/redns.toml")]
    config: PathBuf,

    /// Disable INFO messages, only log errors
    #[arg(short = 'q', long, conflicts_with = "debug")]
    quiet: bool,

    /// Turn on DEBUG messages
    #[arg(short = 'd', long)]
    debug: bool,

    /// Override the listening port from the configuration
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Command to execute, serving when none is given
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    SaveZone(SaveZoneOpt),
    DeleteZone(DeleteZoneOpt),
}

/// Write a zone into the store, one hash field per owner
#[derive(Debug, Args)]
struct SaveZoneOpt {
    /// Apex name of the zone, e.g. example.com
    zone: String,

    /// Path to a JSON zone file mapping owner labels to record sets
    file: PathBuf,

    /// Advance the zone serial before saving
    #[arg(long)]
    increment_serial: bool,
}

/// Remove a zone and all its owners from the store
#[derive(Debug, Args)]
struct DeleteZoneOpt {
    /// Apex name of the zone, e.g. example.com
    zone: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.quiet {
        logger::quiet();
    } else if cli.debug {
        logger::debug();
    } else {
        logger::default();
    }

    if let Err(error) = run(cli).await {
        error!(%error, "exited with an error");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = Config::read_config(&cli.config)?;

    let backend = RedisBackend::connect(config.redis()).await?;
    let store = RedisStore::new(Arc::new(backend), config.redis());

    match cli.command {
        None => serve(store, &config, cli.port).await,
        Some(Command::SaveZone(opt)) => save_zone(&store, opt).await,
        Some(Command::DeleteZone(opt)) => delete_zone(&store, opt).await,
    }
}

async fn serve(store: RedisStore, config: &Config, port: Option<u16>) -> Result<(), Box<dyn Error>> {
    let listen_port = port.unwrap_or_else(|| config.listen_port());

    let mut catalog = Catalog::new(store);
    for network in config.axfr_allow_networks() {
        catalog.allow_axfr_from(*network);
    }

    let mut server = ServerFuture::new(catalog);

    let mut listen_addrs: Vec<IpAddr> = Vec::new();
    listen_addrs.extend(config.listen_addrs_ipv4()?.into_iter().map(IpAddr::V4));
    listen_addrs.extend(config.listen_addrs_ipv6()?.into_iter().map(IpAddr::V6));
    if listen_addrs.is_empty() {
        listen_addrs.push(IpAddr::V4([0, 0, 0, 0].into()));
    }

    for addr in listen_addrs {
        let socket_addr = SocketAddr::new(addr, listen_port);

        let udp_socket = UdpSocket::bind(socket_addr).await?;
        info!("listening for UDP on {socket_addr}");
        server.register_socket(udp_socket);

        let tcp_listener = TcpListener::bind(socket_addr).await?;
        info!("listening for TCP on {socket_addr}");
        server.register_listener(tcp_listener, config.tcp_request_timeout());
    }

    info!("redns {} starting up", redns::version());
    server.block_until_done().await?;

    Ok(())
}

async fn save_zone(store: &RedisStore, opt: SaveZoneOpt) -> Result<(), Box<dyn Error>> {
    let file = fs::read_to_string(&opt.file)?;
    let owners: BTreeMap<String, RecordSet> = serde_json::from_str(&file)?;

    let mut zone = Zone::from_owners(&opt.zone, owners)
        .ok_or("zone file carries no SOA at the '@' owner")?;
    if opt.increment_serial {
        let serial = zone.increment_serial()?;
        info!(serial, zone = zone.name(), "advanced zone serial");
    }

    store.save_zone(&zone).await?;
    info!(zone = zone.name(), owners = zone.owners().count(), "zone saved");
    Ok(())
}

async fn delete_zone(store: &RedisStore, opt: DeleteZoneOpt) -> Result<(), Box<dyn Error>> {
    let apex = if opt.zone.ends_with('.') {
        opt.zone.clone()
    } else {
        format!("{}.", opt.zone)
    };
    store.delete_zone(&apex).await?;
    info!(zone = %apex, "zone deleted");
    Ok(())
}
