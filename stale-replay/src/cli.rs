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

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, ProxyConfig, RawConfigFile};

#[derive(Parser, Debug)]
#[command(author, version, about)]
/// Serve stale blocks to a syncing Bitcoin node right before the canonical
/// block at the same height
pub struct Cli {
    /// Subcommand action to take
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands for the stale-replay binary
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Run the proxy until interrupted
    Run(RunArgs),
    /// Load the stale block directory, print its contents and exit
    CheckCatalog(CheckCatalogArgs),
}

#[derive(Parser, Debug, Clone, Default)]
/// Arguments for the Run command. Flags override values from the config file.
pub struct RunArgs {
    /// Path to config file
    #[arg(long, short, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Upstream node RPC URL, e.g. http://127.0.0.1:8332
    #[arg(long, env = "STALE_REPLAY_UPSTREAM_RPC")]
    pub upstream_rpc: Option<String>,
    /// Upstream RPC .cookie file used for authentication
    #[arg(long, value_name = "FILE", env = "STALE_REPLAY_UPSTREAM_COOKIE_FILE")]
    pub upstream_cookie_file: Option<String>,
    /// Directory containing stale block files (<height>-<hash>.bin)
    #[arg(long, value_name = "DIR")]
    pub stale_blocks_dir: Option<String>,
    /// Address to accept target connections on
    #[arg(long, value_name = "HOST:PORT")]
    pub listen: Option<String>,
    /// Dial the target at this address instead of listening
    #[arg(long, value_name = "HOST:PORT")]
    pub connect: Option<String>,
    /// P2P network magic to use: mainnet, testnet, testnet4, signet or regtest
    #[arg(long)]
    pub network: Option<String>,
    /// Highest active-chain height to serve
    #[arg(long)]
    pub max_height: Option<u64>,
    /// Write the served-block ledger here on shutdown
    #[arg(long, value_name = "FILE")]
    pub ledger_path: Option<PathBuf>,
}

impl RunArgs {
    /// Merge the config file (if any) with the command-line overrides
    pub fn load_config(&self) -> Result<ProxyConfig, ConfigError> {
        let mut raw = match &self.config {
            Some(path) => RawConfigFile::try_from(path)?,
            None => RawConfigFile::default(),
        };

        if let Some(upstream_rpc) = &self.upstream_rpc {
            raw.upstream_rpc = Some(upstream_rpc.clone());
        }
        if let Some(cookie) = &self.upstream_cookie_file {
            raw.upstream_cookie_file = Some(cookie.clone());
        }
        if let Some(dir) = &self.stale_blocks_dir {
            raw.stale_blocks_dir = Some(dir.clone());
        }
        if let Some(listen) = &self.listen {
            raw.listen = Some(listen.clone());
        }
        if let Some(connect) = &self.connect {
            raw.connect = Some(connect.clone());
        }
        if let Some(network) = &self.network {
            raw.network = Some(network.clone());
        }
        if let Some(max_height) = self.max_height {
            raw.max_height = Some(max_height);
        }
        if let Some(ledger_path) = &self.ledger_path {
            raw.ledger_path = Some(ledger_path.display().to_string());
        }

        ProxyConfig::try_from(raw)
    }
}

#[derive(Parser, Debug, Clone)]
/// Arguments for the check-catalog command
pub struct CheckCatalogArgs {
    /// Directory containing stale block files (<height>-<hash>.bin)
    #[arg(long, value_name = "DIR", default_value = "stale-blocks/blocks")]
    pub stale_blocks_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use replay_common::deps_common::bitcoin::network::constants::Network;

    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "stale-replay",
            "run",
            "--upstream-rpc",
            "127.0.0.1:8332",
            "--max-height",
            "100",
            "--network",
            "signet",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.load_config().unwrap();
        assert_eq!(config.max_height, Some(100));
        assert_eq!(config.network, Network::Signet);
        assert_eq!(config.upstream_rpc, "127.0.0.1:8332");
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "upstream_rpc = \"10.0.0.1:8332\"\nlisten = \"127.0.0.1:9000\"\nmax_height = 5"
        )
        .unwrap();

        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            listen: Some("127.0.0.1:9001".to_string()),
            ..RunArgs::default()
        };
        let config = args.load_config().unwrap();
        assert_eq!(config.upstream_rpc, "10.0.0.1:8332");
        assert_eq!(config.listen.port(), 9001);
        assert_eq!(config.max_height, Some(5));
    }

    #[test]
    fn test_run_requires_upstream() {
        assert!(matches!(
            RunArgs::default().load_config(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_check_catalog() {
        let cli = Cli::parse_from(["stale-replay", "check-catalog"]);
        match cli.command {
            Command::CheckCatalog(args) => {
                assert_eq!(args.stale_blocks_dir, PathBuf::from("stale-blocks/blocks"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
