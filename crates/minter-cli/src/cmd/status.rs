use clap::Parser;
use eyre::Result;
use minter::MintClient;
use yansi::Paint;

use super::drain_notices;

/// CLI arguments for `minter status`.
#[derive(Clone, Debug, Parser)]
pub struct StatusArgs {}

impl StatusArgs {
    pub async fn run(self, client: MintClient) -> Result<()> {
        let mut notices = client.notices();
        if !client.has_provider() {
            drain_notices(&mut notices);
            let hint = "No wallet provider configured, pass --rpc or set MINTER_RPC_URL";
            println!("{}", hint.yellow());
            return Ok(());
        }

        // wires the count when an account is authorized
        let session = client.check_existing_connection().await?;
        if !session.is_connected() {
            client.load_initial().await?;
        }
        drain_notices(&mut notices);

        let config = client.config();
        match session.address() {
            Some(address) => println!("{:>10} {address}", "account:".bold()),
            None => println!("{:>10} {}", "account:".bold(), "not connected".dim()),
        }
        println!("{:>10} {}", "chain:".bold(), config.chain_id);
        println!("{:>10} {}", "contract:".bold(), config.contract);
        println!("{:>10} {}", "minted:".bold(), client.progress());
        if let Some(url) = &config.collection_url {
            println!("{:>10} {url}", "gallery:".bold());
        }
        Ok(())
    }
}
