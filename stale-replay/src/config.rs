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

use std::fmt::{Debug, Display};
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use replay_common::deps_common::bitcoin::network::constants::{Network, USER_AGENT};

use crate::upstream::rpc_transport::RpcAuth;

const DEFAULT_STALE_BLOCKS_DIR: &str = "stale-blocks/blocks";
const DEFAULT_LISTEN: &str = "127.0.0.1:8338";
const DEFAULT_RPC_TIMEOUT_MS: u64 = 300_000;
const DEFAULT_READ_TIMEOUT_MS: u64 = 1_000;

#[derive(thiserror::Error, Debug)]
/// An error occurred parsing the provided configuration
pub enum ConfigError {
    /// Error occurred reading config file
    #[error("{0}")]
    InvalidConfig(String),
    /// An error occurred parsing the TOML data
    #[error("{0}")]
    ParseError(String),
    /// A field was malformed
    #[error("identifier={0}, value={1}")]
    BadField(String, String),
}

/// The config file as written, before validation. Every field may also be
/// given on the command line, which takes precedence.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RawConfigFile {
    /// Upstream node RPC URL, e.g. http://127.0.0.1:8332
    pub upstream_rpc: Option<String>,
    /// Upstream RPC .cookie file used for authentication
    pub upstream_cookie_file: Option<String>,
    pub upstream_username: Option<String>,
    pub upstream_password: Option<String>,
    /// Directory containing stale block files (<height>-<hash>.bin)
    pub stale_blocks_dir: Option<String>,
    /// Address to accept target connections on
    pub listen: Option<String>,
    /// Dial this target instead of listening
    pub connect: Option<String>,
    /// One of mainnet, testnet, testnet4, signet or regtest
    pub network: Option<String>,
    /// Highest active-chain height to serve
    pub max_height: Option<u64>,
    /// The time to wait (in millisecs) for an upstream RPC reply
    pub rpc_timeout_ms: Option<u64>,
    /// How long (in millisecs) a session blocks on an idle socket before
    /// re-checking for shutdown
    pub read_timeout_ms: Option<u64>,
    /// Where to write the served-block ledger on shutdown
    pub ledger_path: Option<String>,
    pub user_agent: Option<String>,
}

impl RawConfigFile {
    /// load the config from a string
    pub fn load_from_str(data: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(data).map_err(|e| ConfigError::ParseError(format!("{e:?}")))?;
        Ok(config)
    }
}

impl TryFrom<&PathBuf> for RawConfigFile {
    type Error = ConfigError;

    fn try_from(path: &PathBuf) -> Result<Self, Self::Error> {
        Self::load_from_str(&fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidConfig(format!("failed to read config file: {e:?}"))
        })?)
    }
}

/// Validated proxy configuration
#[derive(Clone, PartialEq)]
pub struct ProxyConfig {
    pub upstream_rpc: String,
    pub upstream_cookie_file: Option<PathBuf>,
    pub upstream_username: Option<String>,
    pub upstream_password: Option<String>,
    pub stale_blocks_dir: PathBuf,
    pub listen: SocketAddr,
    pub connect: Option<SocketAddr>,
    pub network: Network,
    pub max_height: Option<u64>,
    pub rpc_timeout: Duration,
    pub read_timeout: Duration,
    pub ledger_path: Option<PathBuf>,
    pub user_agent: String,
}

fn parse_socket_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConfigError::BadField(field.to_string(), value.to_string()))
}

impl TryFrom<RawConfigFile> for ProxyConfig {
    type Error = ConfigError;

    /// Attempt to decode the raw config file's primitive types into our types.
    fn try_from(raw_data: RawConfigFile) -> Result<Self, Self::Error> {
        let upstream_rpc = raw_data
            .upstream_rpc
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::InvalidConfig("upstream_rpc is required".to_string()))?;

        let listen = parse_socket_addr(
            "listen",
            raw_data.listen.as_deref().unwrap_or(DEFAULT_LISTEN),
        )?;
        let connect = raw_data
            .connect
            .as_deref()
            .map(|addr| parse_socket_addr("connect", addr))
            .transpose()?;

        let network = match raw_data.network {
            Some(network) => network
                .parse()
                .map_err(|_| ConfigError::BadField("network".to_string(), network.clone()))?,
            None => Network::Bitcoin,
        };

        if raw_data.upstream_password.is_some() && raw_data.upstream_username.is_none() {
            return Err(ConfigError::BadField(
                "upstream_username".to_string(),
                "<missing>".to_string(),
            ));
        }

        let rpc_timeout_ms = raw_data.rpc_timeout_ms.unwrap_or(DEFAULT_RPC_TIMEOUT_MS);
        let read_timeout_ms = raw_data.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS);
        if read_timeout_ms == 0 {
            // a zero socket timeout means "block forever"
            return Err(ConfigError::BadField(
                "read_timeout_ms".to_string(),
                "0".to_string(),
            ));
        }

        Ok(ProxyConfig {
            upstream_rpc,
            upstream_cookie_file: raw_data.upstream_cookie_file.map(PathBuf::from),
            upstream_username: raw_data.upstream_username,
            upstream_password: raw_data.upstream_password,
            stale_blocks_dir: PathBuf::from(
                raw_data
                    .stale_blocks_dir
                    .as_deref()
                    .unwrap_or(DEFAULT_STALE_BLOCKS_DIR),
            ),
            listen,
            connect,
            network,
            max_height: raw_data.max_height,
            rpc_timeout: Duration::from_millis(rpc_timeout_ms),
            read_timeout: Duration::from_millis(read_timeout_ms),
            ledger_path: raw_data.ledger_path.map(PathBuf::from),
            user_agent: raw_data.user_agent.unwrap_or_else(|| USER_AGENT.to_string()),
        })
    }
}

impl TryFrom<&PathBuf> for ProxyConfig {
    type Error = ConfigError;
    fn try_from(path: &PathBuf) -> Result<Self, ConfigError> {
        let config_file = RawConfigFile::try_from(path)?;
        Self::try_from(config_file)
    }
}

impl ProxyConfig {
    /// load the config from a string and parse it
    pub fn load_from_str(data: &str) -> Result<Self, ConfigError> {
        RawConfigFile::load_from_str(data)?.try_into()
    }

    /// Credentials for the upstream node. A cookie file wins over a
    /// username/password pair; credentials inside `upstream_rpc` win over both.
    pub fn upstream_auth(&self) -> Result<RpcAuth, ConfigError> {
        if let Some(cookie_file) = &self.upstream_cookie_file {
            return RpcAuth::from_cookie_file(cookie_file)
                .map_err(|e| ConfigError::InvalidConfig(e.to_string()));
        }
        match (&self.upstream_username, &self.upstream_password) {
            (Some(username), password) => Ok(RpcAuth::Basic {
                username: username.clone(),
                password: password.clone().unwrap_or_default(),
            }),
            (None, _) => Ok(RpcAuth::None),
        }
    }

    /// Return a string with non-sensitive configuration
    /// information for logging purposes
    pub fn config_to_log_string(&self) -> String {
        let or_none = |v: Option<String>| v.unwrap_or_else(|| "None".to_string());
        format!(
            r#"
Upstream RPC: {upstream_rpc}
Upstream cookie file: {cookie_file}
Stale blocks dir: {stale_blocks_dir}
Listen: {listen}
Connect: {connect}
Network: {network}
Max height: {max_height}
RPC timeout: {rpc_timeout:?}
Read timeout: {read_timeout:?}
Ledger path: {ledger_path}
User agent: {user_agent}
"#,
            upstream_rpc = redact_url(&self.upstream_rpc),
            cookie_file = or_none(
                self.upstream_cookie_file
                    .as_ref()
                    .map(|p| p.display().to_string())
            ),
            stale_blocks_dir = self.stale_blocks_dir.display(),
            listen = self.listen,
            connect = or_none(self.connect.map(|a| a.to_string())),
            network = self.network,
            max_height = or_none(self.max_height.map(|h| h.to_string())),
            rpc_timeout = self.rpc_timeout,
            read_timeout = self.read_timeout,
            ledger_path = or_none(self.ledger_path.as_ref().map(|p| p.display().to_string())),
            user_agent = self.user_agent,
        )
    }
}

/// Hide `user:pass@` in a URL
fn redact_url(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (format!("{scheme}://"), rest),
        None => (String::new(), url),
    };
    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}***@{host}"),
        None => url.to_string(),
    }
}

impl Display for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.config_to_log_string())
    }
}

impl Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.config_to_log_string())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ProxyConfig::load_from_str(r#"upstream_rpc = "127.0.0.1:8332""#).unwrap();
        assert_eq!(config.upstream_rpc, "127.0.0.1:8332");
        assert_eq!(config.listen, "127.0.0.1:8338".parse().unwrap());
        assert_eq!(config.stale_blocks_dir, PathBuf::from("stale-blocks/blocks"));
        assert_eq!(config.network, Network::Bitcoin);
        assert_eq!(config.rpc_timeout, Duration::from_secs(300));
        assert_eq!(config.read_timeout, Duration::from_secs(1));
        assert_eq!(config.max_height, None);
        assert_eq!(config.connect, None);
        assert_eq!(config.user_agent, USER_AGENT);
        assert_eq!(config.upstream_auth().unwrap(), RpcAuth::None);
    }

    #[test]
    fn test_full_config() {
        let config = ProxyConfig::load_from_str(
            r#"
upstream_rpc = "http://10.0.0.2:48332"
upstream_username = "alice"
upstream_password = "secret"
stale_blocks_dir = "/data/stale"
listen = "0.0.0.0:18444"
connect = "127.0.0.1:48333"
network = "testnet4"
max_height = 120000
rpc_timeout_ms = 5000
read_timeout_ms = 250
ledger_path = "/tmp/ledger.json"
user_agent = "/replayer:1.0/"
"#,
        )
        .unwrap();
        assert_eq!(config.network, Network::Testnet4);
        assert_eq!(config.max_height, Some(120000));
        assert_eq!(config.connect, Some("127.0.0.1:48333".parse().unwrap()));
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.ledger_path, Some(PathBuf::from("/tmp/ledger.json")));
        assert_eq!(
            config.upstream_auth().unwrap(),
            RpcAuth::Basic {
                username: "alice".into(),
                password: "secret".into()
            }
        );
        assert!(!config.config_to_log_string().contains("secret"));
    }

    #[test]
    fn test_bad_fields() {
        assert!(matches!(
            ProxyConfig::load_from_str("listen = \"127.0.0.1:1\""),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            ProxyConfig::load_from_str("upstream_rpc = \"x\"\nnetwork = \"litecoin\""),
            Err(ConfigError::BadField(field, _)) if field == "network"
        ));
        assert!(matches!(
            ProxyConfig::load_from_str("upstream_rpc = \"x\"\nlisten = \"nowhere\""),
            Err(ConfigError::BadField(field, _)) if field == "listen"
        ));
        assert!(matches!(
            ProxyConfig::load_from_str("upstream_rpc = \"x\"\nread_timeout_ms = 0"),
            Err(ConfigError::BadField(field, _)) if field == "read_timeout_ms"
        ));
        assert!(matches!(
            ProxyConfig::load_from_str("upstream_rpc = \"x\"\nupstream_password = \"p\""),
            Err(ConfigError::BadField(field, _)) if field == "upstream_username"
        ));
        assert!(matches!(
            ProxyConfig::load_from_str("upstream_rpc = 12"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_cookie_auth() {
        let mut cookie = tempfile::NamedTempFile::new().unwrap();
        writeln!(cookie, "__cookie__:abcdef").unwrap();

        let toml = format!(
            "upstream_rpc = \"127.0.0.1:8332\"\nupstream_cookie_file = \"{}\"\nupstream_username = \"ignored\"",
            cookie.path().display()
        );
        let config = ProxyConfig::load_from_str(&toml).unwrap();
        assert_eq!(
            config.upstream_auth().unwrap(),
            RpcAuth::Basic {
                username: "__cookie__".into(),
                password: "abcdef".into()
            }
        );

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "garbage").unwrap();
        let toml = format!(
            "upstream_rpc = \"127.0.0.1:8332\"\nupstream_cookie_file = \"{}\"",
            bad.path().display()
        );
        let config = ProxyConfig::load_from_str(&toml).unwrap();
        assert!(matches!(
            config.upstream_auth(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "upstream_rpc = \"127.0.0.1:8332\"\nnetwork = \"regtest\"").unwrap();
        let config = ProxyConfig::try_from(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.network, Network::Regtest);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            ProxyConfig::try_from(&missing),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(redact_url("http://u:p@host:1"), "http://***@host:1");
        assert_eq!(redact_url("host:1"), "host:1");
    }
}
