//! Subcommands of the `minter` binary.

use minter::{MintClient, Notice};
use tokio::sync::broadcast::{Receiver, error::TryRecvError};
use yansi::Paint;

pub mod connect;
pub mod mint;
pub mod status;
pub mod watch;

pub fn print_notice(notice: &Notice) {
    match notice {
        Notice::InstallWallet | Notice::WrongNetwork { .. } | Notice::Rejected { .. } => {
            eprintln!("{} {notice}", "Warning:".yellow().bold());
        }
        Notice::MintFailed { .. } => eprintln!("{} {notice}", "Error:".red().bold()),
        Notice::MintConfirmed { .. } | Notice::Minted { .. } => println!("{notice}"),
    }
}

/// Prints every notice already queued on `notices`.
pub fn drain_notices(notices: &mut Receiver<Notice>) {
    loop {
        match notices.try_recv() {
            Ok(notice) => print_notice(&notice),
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "missed notices"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

/// Adopts an authorized account, prompting the wallet only if there is none.
///
/// Returns `false` if the user declined the prompt.
pub async fn ensure_connected(client: &MintClient) -> eyre::Result<bool> {
    if client.check_existing_connection().await?.is_connected() {
        return Ok(true);
    }
    match client.connect().await {
        Ok(_) => Ok(true),
        Err(err) if err.is_rejection() => Ok(false),
        Err(err) => Err(err.into()),
    }
}
