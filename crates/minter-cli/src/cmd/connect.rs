use clap::Parser;
use eyre::Result;
use minter::MintClient;

use super::drain_notices;

/// CLI arguments for `minter connect`.
#[derive(Clone, Debug, Parser)]
pub struct ConnectArgs {}

impl ConnectArgs {
    pub async fn run(self, client: MintClient) -> Result<()> {
        let mut notices = client.notices();
        let res = client.connect().await;
        drain_notices(&mut notices);

        match res {
            Ok(session) => {
                if let Some(address) = session.address() {
                    println!("Connected {address}");
                }
                Ok(())
            }
            Err(err) if err.is_rejection() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
