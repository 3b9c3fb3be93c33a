#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

use clap::Parser;
use eyre::Result;
use minter::MintClient;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod args;
mod cmd;
mod handler;

use args::{Minter, MinterSubcommand, Verbosity};

fn main() -> Result<()> {
    handler::install();
    let args = Minter::parse();
    subscriber(args.verbosity);
    yansi::whenever(yansi::Condition::TTY_AND_COLOR);
    run(args)
}

#[tokio::main]
async fn run(args: Minter) -> Result<()> {
    let config = args.config.load_config()?;
    let backend = minter::rpc::connect(&config)?;
    let client = MintClient::new(config, backend);

    match args.cmd {
        MinterSubcommand::Status(cmd) => cmd.run(client).await,
        MinterSubcommand::Connect(cmd) => cmd.run(client).await,
        MinterSubcommand::Mint(cmd) => cmd.run(client).await,
        MinterSubcommand::Watch(cmd) => cmd.run(client).await,
    }
}

/// Logs to stderr. `RUST_LOG` takes precedence over `-v`/`-q`.
fn subscriber(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directive()));
    let _ = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
