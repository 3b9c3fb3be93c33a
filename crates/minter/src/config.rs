//! Client configuration.
//!
//! Values are layered, lowest to highest priority:
//! 1. built-in defaults ([`MinterConfig::default`])
//! 2. `minter.toml` in the working directory, or the file named by `MINTER_CONFIG`
//! 3. `MINTER_*` environment variables, e.g. `MINTER_CHAIN_ID=1`
//!
//! Callers may merge further providers (CLI flags) on top of [`MinterConfig::figment`].

use std::path::Path;

use alloy_primitives::{Address, ChainId, TxHash, address};
use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map},
};
use serde::{Deserialize, Serialize};

/// How pushed minted events are merged into the count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountMerge {
    /// Events never lower the count; stale or duplicate deliveries are ignored.
    #[default]
    Monotonic,
    /// Every event overwrites the count, trusting delivery order.
    LastWrite,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinterConfig {
    /// JSON-RPC endpoint of the wallet. When unset there is no wallet provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// The deployed NFT contract.
    pub contract: Address,
    /// The chain the contract lives on.
    pub chain_id: ChainId,
    /// Collection size, shown as `minted/max_supply`.
    pub max_supply: u64,
    /// Block explorer base URL used for transaction links.
    pub explorer_url: String,
    /// Marketplace base URL used for token links.
    pub marketplace_url: String,
    /// Link to the whole collection on the marketplace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_url: Option<String>,
    pub count_merge: CountMerge,
    /// Event polling interval in milliseconds. Uses the provider default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
}

impl Default for MinterConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            contract: Self::DEFAULT_CONTRACT,
            chain_id: Self::DEFAULT_CHAIN_ID,
            max_supply: 50,
            explorer_url: "https://rinkeby.etherscan.io".to_string(),
            marketplace_url: "https://testnets.opensea.io".to_string(),
            collection_url: Some(
                "https://testnets.opensea.io/assets/squarenft-2o4sptc9m3".to_string(),
            ),
            count_merge: CountMerge::default(),
            poll_interval_ms: None,
        }
    }
}

impl MinterConfig {
    /// The default config file name.
    pub const FILE_NAME: &'static str = "minter.toml";

    /// Environment variable prefix.
    pub const ENV_PREFIX: &'static str = "MINTER_";

    pub const DEFAULT_CONTRACT: Address = address!("0x62ce607781b5Ebf5b95ac2101A558e1fbbdFc82C");

    /// Rinkeby.
    pub const DEFAULT_CHAIN_ID: ChainId = 4;

    /// Returns the default figment: defaults, the toml file and the environment.
    pub fn figment() -> Figment {
        Self::figment_with_file(Env::var_or("MINTER_CONFIG", Self::FILE_NAME))
    }

    /// Like [`figment`](Self::figment), reading the toml layer from `file`.
    pub fn figment_with_file(file: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(Self::ENV_PREFIX).ignore(&["CONFIG"]))
    }

    /// Loads the config from the default figment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_provider(Self::figment())
    }

    /// Extracts a config from `provider`.
    pub fn from_provider<T: Provider>(provider: T) -> Result<Self, figment::Error> {
        trace!("load config with provider: {:?}", provider.metadata());
        Figment::from(provider).extract()
    }

    /// Link to a transaction on the block explorer.
    pub fn transaction_url(&self, tx_hash: TxHash) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url.trim_end_matches('/'))
    }

    /// Link to a token of the configured contract on the marketplace.
    pub fn token_url(&self, token_id: u64) -> String {
        format!(
            "{}/assets/{}/{token_id}",
            self.marketplace_url.trim_end_matches('/'),
            self.contract
        )
    }
}

impl Provider for MinterConfig {
    fn metadata(&self) -> Metadata {
        Metadata::named("Minter Config")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;
    use figment::Jail;

    #[test]
    fn defaults_match_rinkeby_deployment() {
        let config = MinterConfig::default();
        assert_eq!(config.chain_id, 4);
        assert_eq!(config.max_supply, 50);
        assert_eq!(config.contract, MinterConfig::DEFAULT_CONTRACT);
        assert_eq!(config.count_merge, CountMerge::Monotonic);
        assert!(config.rpc_url.is_none());
    }

    #[test]
    fn toml_and_env_are_layered() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "minter.toml",
                r#"
                    rpc_url = "http://localhost:8545"
                    chain_id = 31337
                    max_supply = 100
                    count_merge = "last-write"
                "#,
            )?;
            jail.set_env("MINTER_MAX_SUPPLY", 10);

            let config = MinterConfig::load()?;
            assert_eq!(config.rpc_url.as_deref(), Some("http://localhost:8545"));
            assert_eq!(config.chain_id, 31337);
            assert_eq!(config.max_supply, 10);
            assert_eq!(config.count_merge, CountMerge::LastWrite);
            assert_eq!(config.explorer_url, "https://rinkeby.etherscan.io");
            Ok(())
        });
    }

    #[test]
    fn config_file_can_be_relocated() {
        Jail::expect_with(|jail| {
            jail.create_file("other.toml", "chain_id = 1")?;
            jail.set_env("MINTER_CONFIG", "other.toml");

            let config = MinterConfig::load()?;
            assert_eq!(config.chain_id, 1);
            Ok(())
        });
    }

    #[test]
    fn invalid_contract_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("MINTER_CONTRACT", "not-an-address");
            assert!(MinterConfig::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn links() {
        let config = MinterConfig {
            explorer_url: "https://etherscan.io/".to_string(),
            ..Default::default()
        };
        let hash = b256!("0x00000000000000000000000000000000000000000000000000000000000000aa");
        assert_eq!(config.transaction_url(hash), format!("https://etherscan.io/tx/{hash}"));
        assert_eq!(
            config.token_url(7),
            format!("https://testnets.opensea.io/assets/{}/7", MinterConfig::DEFAULT_CONTRACT)
        );
    }
}
