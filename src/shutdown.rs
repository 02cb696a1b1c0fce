//! Signal handling for imports.
//!
//! The first SIGINT, SIGTERM or SIGHUP cancels the token handed to
//! [`crate::sync::SyncEngine::import_all`]: no further pages start, pages
//! already in flight run to completion and the report is marked interrupted.
//! Any later signal ends the process with status 130.

use tokio_util::sync::CancellationToken;

/// Exit status used when a second signal arrives.
const FORCED_EXIT_CODE: i32 = 130;

#[cfg(unix)]
struct Signals {
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next signal and return its name.
    async fn next(&mut self) -> &'static str {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.hangup.recv() => "SIGHUP",
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    }
}

/// Register the handlers and return the token they cancel.
pub(crate) fn install_signal_handler() -> anyhow::Result<CancellationToken> {
    let mut signals = Signals::register()?;
    let token = CancellationToken::new();
    let cancel = token.clone();

    tokio::spawn(async move {
        let name = signals.next().await;
        tracing::info!(
            "{} received: no new pages will start, waiting for pages in flight",
            name
        );
        tracing::info!("Send the signal again to quit immediately");
        cancel.cancel();

        let name = signals.next().await;
        tracing::warn!("{} received again, quitting without waiting", name);
        std::process::exit(FORCED_EXIT_CODE);
    });

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_is_live_after_install() {
        let token = install_signal_handler().unwrap();
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_token_reaches_clones() {
        let token = install_signal_handler().unwrap();
        let engine_side = token.clone();
        token.cancel();
        assert!(engine_side.is_cancelled());
    }
}
