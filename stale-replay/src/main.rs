// Copyright (C) 2024-2025 Stacks Open Internet Foundation
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

extern crate slog;

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use replay_common::{debug, error, info, warn};
use slog::{slog_debug, slog_error, slog_info, slog_warn};
use stale_replay::catalog::StaleCatalog;
use stale_replay::chain_view::ChainView;
use stale_replay::cli::{CheckCatalogArgs, Cli, Command, RunArgs};
use stale_replay::proxy::server::ReplayProxy;
use stale_replay::upstream::bitcoin_rpc_client::BitcoinRpcClient;
use stale_replay::upstream::UpstreamChain;

fn handle_run(args: RunArgs) -> Result<(), String> {
    let config = args.load_config().map_err(|e| format!("Invalid config: {e}"))?;
    info!("Starting stale-replay with config:\n{}", config);

    let catalog = if config.stale_blocks_dir.is_dir() {
        StaleCatalog::load(&config.stale_blocks_dir).map_err(|e| e.to_string())?
    } else {
        warn!(
            "Stale blocks directory {} does not exist; only canonical blocks will be served",
            config.stale_blocks_dir.display()
        );
        StaleCatalog::default()
    };

    let auth = config.upstream_auth().map_err(|e| e.to_string())?;
    let client = BitcoinRpcClient::new(&config.upstream_rpc, auth, Some(config.rpc_timeout))
        .map_err(|e| format!("Failed to create upstream client: {e}"))?;
    let tip = client
        .tip_height()
        .map_err(|e| format!("Upstream {} unavailable: {e}", client.url()))?;
    info!("Upstream tip is at height {}", tip);
    if let Some(max_height) = config.max_height {
        if max_height > tip {
            warn!(
                "max_height {} is above the upstream tip {}",
                max_height, tip
            );
        }
    }

    let proxy = ReplayProxy::new(&config, catalog, ChainView::new(client));

    let should_keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_writer = should_keep_running.clone();
    ctrlc::set_handler(move || {
        info!("Caught interrupt; shutting down");
        keep_running_writer.store(false, Ordering::SeqCst);
    })
    .map_err(|e| format!("Failed to install signal handler: {e}"))?;

    let result = match config.connect {
        Some(addr) => proxy.connect(&addr, should_keep_running),
        None => ReplayProxy::<BitcoinRpcClient>::bind(&config.listen)
            .and_then(|listener| proxy.serve(listener, should_keep_running)),
    };

    let served = proxy.ledger().served_stale();
    println!(
        "Served {} of {} stale blocks ({} blocks total)",
        served.len(),
        proxy.catalog().len(),
        proxy.ledger().len()
    );
    for entry in &served {
        println!("  {} {}", entry.height, entry.hash);
    }
    if let Some(path) = &config.ledger_path {
        match proxy.ledger().write_json(path) {
            Ok(()) => info!("Wrote served-block ledger to {}", path.display()),
            Err(e) => error!("Failed to write ledger to {}: {}", path.display(), e),
        }
    }

    result.map_err(|e| e.to_string())
}

fn handle_check_catalog(args: CheckCatalogArgs) -> Result<(), String> {
    debug!("Checking catalog in {}", args.stale_blocks_dir.display());
    let catalog = StaleCatalog::load(&args.stale_blocks_dir).map_err(|e| e.to_string())?;
    for record in catalog.records() {
        println!(
            "{} {} parent={} txs={}",
            record.height,
            record.hash,
            record.parent_hash,
            record.block.txdata.len()
        );
    }
    println!("{} stale blocks OK", catalog.len());
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => handle_run(args),
        Command::CheckCatalog(args) => handle_check_catalog(args),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("{}", e);
        process::exit(1);
    }
}
