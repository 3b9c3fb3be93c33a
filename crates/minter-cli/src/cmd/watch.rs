use clap::Parser;
use eyre::{Result, bail};
use minter::MintClient;
use tokio::sync::broadcast::error::RecvError;

use super::{drain_notices, ensure_connected, print_notice};

/// CLI arguments for `minter watch`.
#[derive(Clone, Debug, Parser)]
pub struct WatchArgs {}

impl WatchArgs {
    pub async fn run(self, client: MintClient) -> Result<()> {
        let mut notices = client.notices();
        let connected = ensure_connected(&client).await;
        drain_notices(&mut notices);
        if !connected? {
            bail!("watching requires a connected account");
        }

        let mut count = client.minted_count();
        count.mark_changed();
        loop {
            tokio::select! {
                res = count.changed() => {
                    if res.is_err() {
                        return Ok(());
                    }
                    println!("{}", client.progress());
                }
                res = notices.recv() => match res {
                    Ok(notice) => print_notice(&notice),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed notices"),
                    Err(RecvError::Closed) => return Ok(()),
                },
                _ = tokio::signal::ctrl_c() => {
                    client.disconnect();
                    return Ok(());
                }
            }
        }
    }
}
