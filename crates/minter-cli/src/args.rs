use std::path::PathBuf;

use alloy_primitives::{Address, ChainId};
use clap::{ArgAction, Parser, Subcommand};
use figment::{
    Metadata, Profile,
    value::{Dict, Map},
};
use minter::MinterConfig;
use serde::Serialize;

use crate::cmd::{connect::ConnectArgs, mint::MintArgs, status::StatusArgs, watch::WatchArgs};

/// Mint from the epic NFT collection.
#[derive(Debug, Parser)]
#[command(name = "minter", version, next_display_order = None)]
pub struct Minter {
    #[command(flatten)]
    pub config: ConfigOpts,

    #[command(flatten)]
    pub verbosity: Verbosity,

    #[command(subcommand)]
    pub cmd: MinterSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum MinterSubcommand {
    /// Show the connected account, the network and the mint progress.
    #[command(visible_alias = "s")]
    Status(StatusArgs),

    /// Ask the wallet for account access.
    #[command(visible_alias = "c")]
    Connect(ConnectArgs),

    /// Mint one token from the connected account.
    #[command(visible_alias = "m")]
    Mint(MintArgs),

    /// Follow the minted count as tokens are minted.
    #[command(visible_alias = "w")]
    Watch(WatchArgs),
}

/// Options overriding the config file and the environment.
#[derive(Clone, Debug, Default, Serialize, Parser)]
pub struct ConfigOpts {
    /// The wallet's JSON-RPC endpoint.
    #[arg(long, short, global = true, visible_alias = "rpc-url", value_name = "URL")]
    #[serde(rename = "rpc_url", skip_serializing_if = "Option::is_none")]
    pub rpc: Option<String>,

    /// The NFT contract address.
    #[arg(long, global = true, value_name = "ADDRESS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<Address>,

    /// The chain the contract is deployed on.
    #[arg(long, global = true, value_name = "CHAIN_ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<ChainId>,

    /// Path to the config file.
    #[arg(long, global = true, value_name = "PATH")]
    #[serde(skip)]
    pub config: Option<PathBuf>,
}

impl figment::Provider for ConfigOpts {
    fn metadata(&self) -> Metadata {
        Metadata::named("command line arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        figment::providers::Serialized::defaults(self).data()
    }
}

impl ConfigOpts {
    /// Loads the config: defaults, the config file, the environment, then these options.
    pub fn load_config(&self) -> eyre::Result<MinterConfig> {
        let figment = match &self.config {
            Some(path) => MinterConfig::figment_with_file(path),
            None => MinterConfig::figment(),
        };
        Ok(MinterConfig::from_provider(figment.merge(self))?)
    }
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, Default, Parser)]
pub struct Verbosity {
    /// Increase log verbosity. May be repeated (`-vv`, `-vvv`).
    #[arg(long, short, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only print errors.
    #[arg(long, short, global = true, alias = "silent")]
    pub quiet: bool,
}

impl Verbosity {
    /// The log filter used when `RUST_LOG` is unset.
    pub fn default_directive(self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
