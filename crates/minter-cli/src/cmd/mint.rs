use std::time::Duration;

use clap::Parser;
use eyre::{Result, bail};
use minter::{MintClient, MintOutcome, MintPhase, Notice};
use tokio::sync::broadcast::error::RecvError;
use yansi::Paint;

use super::{drain_notices, ensure_connected, print_notice};

/// CLI arguments for `minter mint`.
#[derive(Clone, Debug, Parser)]
pub struct MintArgs {
    /// Wait until the contract reports the minted token.
    #[arg(long)]
    pub wait: bool,

    /// How long to wait for the minted token, in seconds.
    #[arg(long, value_name = "SECONDS", default_value = "600", requires = "wait")]
    pub timeout: u64,
}

impl MintArgs {
    pub async fn run(self, client: MintClient) -> Result<()> {
        let mut notices = client.notices();
        let connected = ensure_connected(&client).await;
        drain_notices(&mut notices);
        if !connected? {
            return Ok(());
        }

        let progress = client.progress();
        if progress.is_sold_out() {
            println!("{} {progress}, the contract may refuse the mint", "Sold out:".yellow());
        }

        println!("Going to pop wallet now to pay gas...");
        let mut phase = client.orchestrator().subscribe_phase();
        let mint = client.request_mint();
        tokio::pin!(mint);
        let res = loop {
            tokio::select! {
                res = &mut mint => break res,
                Ok(()) = phase.changed() => {
                    if *phase.borrow_and_update() == MintPhase::AwaitingConfirmation {
                        println!("Mining, please wait...");
                    }
                }
            }
        };
        drain_notices(&mut notices);
        let receipt = match res {
            Ok(MintOutcome::Confirmed(receipt)) => receipt,
            Ok(MintOutcome::NotConnected) => bail!("no wallet account connected"),
            Ok(MintOutcome::AlreadyInFlight) => bail!("a mint is already in flight"),
            Err(err) if err.is_rejection() => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if let Some(block) = receipt.block_number {
            trace!(block, "mint included");
        }

        if self.wait {
            let timeout = Duration::from_secs(self.timeout);
            if tokio::time::timeout(timeout, wait_for_token(&mut notices)).await.is_err() {
                bail!("no minted event after {}s, check the transaction link above", self.timeout);
            }
        }
        Ok(())
    }
}

async fn wait_for_token(notices: &mut tokio::sync::broadcast::Receiver<Notice>) {
    loop {
        match notices.recv().await {
            Ok(notice @ Notice::Minted { .. }) => {
                print_notice(&notice);
                return;
            }
            Ok(notice) => print_notice(&notice),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed notices"),
            Err(RecvError::Closed) => return,
        }
    }
}
