use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ethers_core::types::Address;
use ethers_core::utils::to_checksum;
use url::Url;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_MAX_BLOCKS_PER_POLL: u64 = 100;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Chains the notifier knows how to describe. One is selected per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Ethereum,
    Base,
}

impl Chain {
    pub fn name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Base => "Base",
        }
    }

    pub fn native_symbol(&self) -> &'static str {
        "ETH"
    }

    pub fn explorer_tx_url(&self) -> &'static str {
        match self {
            Chain::Ethereum => "https://etherscan.io/tx/",
            Chain::Base => "https://basescan.org/tx/",
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ETHEREUM",
            Chain::Base => "BASE",
        }
    }
}

impl FromStr for Chain {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Chain::Ethereum),
            "base" => Ok(Chain::Base),
            other => Err(ConfigError::UnsupportedChain(other.to_string())),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub telegram_api_url: Url,
    pub chain: Chain,
    pub rpc_url: Url,
    pub wallets: Vec<Address>,
    pub poll_interval: Duration,
    pub max_blocks_per_poll: u64,
    pub rpc_timeout: Duration,
    pub start_block: Option<u64>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing {0} env var")]
    Missing(String),
    #[error("invalid {name}: {reason}")]
    Invalid { name: String, reason: String },
    #[error("unsupported chain {0:?}, expected ethereum or base")]
    UnsupportedChain(String),
    #[error("invalid wallet address {0:?}")]
    InvalidAddress(String),
    #[error("no wallets configured, set WALLETS or {0}_WALLETS")]
    NoWallets(&'static str),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so parsing can be
    /// exercised without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN")
            .ok_or_else(|| ConfigError::Missing("TELEGRAM_BOT_TOKEN".into()))?;
        validate_bot_token(&telegram_bot_token)?;

        let telegram_chat_id = get("TELEGRAM_CHAT_ID")
            .ok_or_else(|| ConfigError::Missing("TELEGRAM_CHAT_ID".into()))?;
        validate_chat_id(&telegram_chat_id)?;

        let telegram_api_url = parse_url(
            "TELEGRAM_API_URL",
            &get("TELEGRAM_API_URL").unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
        )?;

        let chain = match get("CHAIN") {
            Some(raw) => raw.parse()?,
            None => Chain::Ethereum,
        };

        let rpc_key = format!("{}_RPC_URL", chain.env_prefix());
        let rpc_raw = get(&rpc_key).ok_or_else(|| ConfigError::Missing(rpc_key.clone()))?;
        let rpc_url = parse_url(&rpc_key, &rpc_raw)?;

        let wallets_raw = get("WALLETS")
            .or_else(|| get(&format!("{}_WALLETS", chain.env_prefix())))
            .ok_or(ConfigError::NoWallets(chain.env_prefix()))?;
        let wallets = parse_wallet_addresses(&wallets_raw)?;
        if wallets.is_empty() {
            return Err(ConfigError::NoWallets(chain.env_prefix()));
        }

        let poll_interval_secs = parse_positive(
            "POLL_INTERVAL_SECS",
            get("POLL_INTERVAL_SECS"),
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let max_blocks_per_poll = parse_positive(
            "MAX_BLOCKS_PER_POLL",
            get("MAX_BLOCKS_PER_POLL"),
            DEFAULT_MAX_BLOCKS_PER_POLL,
        )?;
        let rpc_timeout_secs = parse_positive(
            "RPC_TIMEOUT_SECS",
            get("RPC_TIMEOUT_SECS"),
            DEFAULT_RPC_TIMEOUT_SECS,
        )?;
        let start_block = get("START_BLOCK")
            .map(|raw| parse_u64("START_BLOCK", &raw))
            .transpose()?;

        Ok(Self {
            telegram_bot_token,
            telegram_chat_id,
            telegram_api_url,
            chain,
            rpc_url,
            wallets,
            poll_interval: Duration::from_secs(poll_interval_secs),
            max_blocks_per_poll,
            rpc_timeout: Duration::from_secs(rpc_timeout_secs),
            start_block,
        })
    }

    pub fn wallet_checksums(&self) -> Vec<String> {
        self.wallets.iter().map(|w| to_checksum(w, None)).collect()
    }
}

/// Only the bot token and API base are needed to discover chat ids.
pub fn telegram_from_env() -> Result<(String, Url), ConfigError> {
    let token = env::var("TELEGRAM_BOT_TOKEN")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::Missing("TELEGRAM_BOT_TOKEN".into()))?;
    validate_bot_token(&token)?;
    let api = env::var("TELEGRAM_API_URL").unwrap_or_else(|_| DEFAULT_TELEGRAM_API_URL.to_string());
    let api = parse_url("TELEGRAM_API_URL", &api)?;
    Ok((token, api))
}

/// Parses a comma separated address list. Duplicates collapse onto the first
/// occurrence.
pub fn parse_wallet_addresses(raw: &str) -> Result<Vec<Address>, ConfigError> {
    let mut out: Vec<Address> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let address = parse_address(item)?;
        if !out.contains(&address) {
            out.push(address);
        }
    }
    Ok(out)
}

fn parse_address(raw: &str) -> Result<Address, ConfigError> {
    let hex = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| ConfigError::InvalidAddress(raw.to_string()))?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidAddress(raw.to_string()));
    }
    // Mixed-case input is accepted as-is and normalised to EIP-55 on output.
    hex.to_lowercase()
        .parse::<Address>()
        .map_err(|_| ConfigError::InvalidAddress(raw.to_string()))
}

fn validate_bot_token(token: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        name: "TELEGRAM_BOT_TOKEN".into(),
        reason: reason.into(),
    };
    let (bot_id, secret) = token
        .split_once(':')
        .ok_or_else(|| invalid("expected <bot id>:<secret>"))?;
    if bot_id.is_empty() || !bot_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("bot id must be numeric"));
    }
    if secret.len() < 30
        || !secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid("secret part is malformed"));
    }
    Ok(())
}

fn validate_chat_id(chat_id: &str) -> Result<(), ConfigError> {
    let valid = if let Some(channel) = chat_id.strip_prefix('@') {
        !channel.is_empty() && channel.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    } else {
        chat_id.parse::<i64>().is_ok()
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            name: "TELEGRAM_CHAT_ID".into(),
            reason: "expected a numeric id or @channel".into(),
        })
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

fn parse_u64(name: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn parse_positive(name: &str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match parse_u64(name, &raw)? {
        0 => Err(ConfigError::Invalid {
            name: name.to_string(),
            reason: "must be greater than zero".into(),
        }),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw0";
    const WALLET_A: &str = "0x52908400098527886e0f7030069857d2e4169ee7";
    const WALLET_B: &str = "0xde709f2102306220921060314715629080e2fb77";

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("TELEGRAM_BOT_TOKEN", TOKEN.to_string()),
            ("TELEGRAM_CHAT_ID", "-1001234567890".to_string()),
            ("ETHEREUM_RPC_URL", "https://rpc.example.org".to_string()),
            ("ETHEREUM_WALLETS", format!("{WALLET_A}, {WALLET_B}")),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn loads_defaults() {
        let cfg = load(&base_env()).unwrap();
        assert_eq!(cfg.chain, Chain::Ethereum);
        assert_eq!(cfg.wallets.len(), 2);
        assert_eq!(cfg.poll_interval, Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS));
        assert_eq!(cfg.max_blocks_per_poll, DEFAULT_MAX_BLOCKS_PER_POLL);
        assert_eq!(cfg.telegram_api_url.as_str(), "https://api.telegram.org/");
        assert_eq!(cfg.start_block, None);
    }

    #[test]
    fn wallets_are_checksum_normalised() {
        let cfg = load(&base_env()).unwrap();
        assert_eq!(
            cfg.wallet_checksums(),
            vec![
                "0x52908400098527886E0F7030069857D2E4169EE7".to_string(),
                "0xde709f2102306220921060314715629080e2fb77".to_string(),
            ]
        );
    }

    #[test]
    fn base_chain_reads_its_own_keys() {
        let mut env = base_env();
        env.insert("CHAIN", "base".into());
        assert!(matches!(load(&env), Err(ConfigError::Missing(k)) if k == "BASE_RPC_URL"));

        env.insert("BASE_RPC_URL", "https://mainnet.base.org".into());
        env.insert("BASE_WALLETS", WALLET_B.into());
        let cfg = load(&env).unwrap();
        assert_eq!(cfg.chain, Chain::Base);
        assert_eq!(cfg.wallets.len(), 1);
    }

    #[test]
    fn rejects_malformed_token() {
        for bad in ["", "nocolon", "abc:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw0", "123:short"] {
            let mut env = base_env();
            env.insert("TELEGRAM_BOT_TOKEN", bad.into());
            assert!(load(&env).is_err(), "accepted token {bad:?}");
        }
    }

    #[test]
    fn rejects_malformed_chat_id() {
        for bad in ["chat", "@", "12a4"] {
            let mut env = base_env();
            env.insert("TELEGRAM_CHAT_ID", bad.into());
            assert!(
                matches!(load(&env), Err(ConfigError::Invalid { ref name, .. }) if name == "TELEGRAM_CHAT_ID"),
                "accepted chat id {bad:?}"
            );
        }
        let mut env = base_env();
        env.insert("TELEGRAM_CHAT_ID", "@my_channel".into());
        assert!(load(&env).is_ok());
    }

    #[test]
    fn rejects_bad_wallets() {
        let mut env = base_env();
        env.insert("ETHEREUM_WALLETS", "0x1234".into());
        assert!(matches!(load(&env), Err(ConfigError::InvalidAddress(_))));

        env.insert("ETHEREUM_WALLETS", " , ".into());
        assert!(matches!(load(&env), Err(ConfigError::NoWallets(_))));
    }

    #[test]
    fn duplicate_wallets_collapse() {
        let upper = WALLET_A.to_uppercase().replacen("0X", "0x", 1);
        let parsed = parse_wallet_addresses(&format!("{WALLET_A},{upper}")).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut env = base_env();
        env.insert("POLL_INTERVAL_SECS", "0".into());
        assert!(load(&env).is_err());
        env.insert("POLL_INTERVAL_SECS", "60".into());
        assert_eq!(load(&env).unwrap().poll_interval, Duration::from_secs(60));
    }
}
