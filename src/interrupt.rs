//! Ctrl-C handling for long-running commands.

use std::future::Future;

use console::style;

#[derive(Debug, thiserror::Error)]
#[error("Interrupted by user")]
pub struct Interrupted;

/// Resolves on Ctrl-C. Never resolves if the listener cannot be installed.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::debug!("Ctrl-C listener unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Drive `fut` to completion unless Ctrl-C arrives first.
///
/// On interrupt the future is dropped, which kills any child it owns
/// (children are spawned with kill-on-drop).
pub async fn interruptible<F: Future>(fut: F) -> Result<F::Output, Interrupted> {
    interruptible_with(fut, ctrl_c()).await
}

/// Like [`interruptible`], with the interrupt source supplied by the caller.
pub async fn interruptible_with<F, S>(fut: F, signal: S) -> Result<F::Output, Interrupted>
where
    F: Future,
    S: Future<Output = ()>,
{
    tokio::select! {
        out = fut => Ok(out),
        () = signal => {
            eprintln!("{}", style("\nInterrupted by user").yellow());
            Err(Interrupted)
        }
    }
}
