use tokio::io::{AsyncBufReadExt, BufReader};

use crate::traits::PauseGate;

/// Blocks until one line (or EOF) arrives on stdin. Read errors are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPause;

impl PauseGate for StdinPause {
    async fn wait(&self) {
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        if let Err(e) = reader.read_line(&mut line).await {
            tracing::debug!(error = %e, "Ignoring stdin read error during pause");
        }
    }
}

/// Never blocks. Used for unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPause;

impl PauseGate for NoPause {
    async fn wait(&self) {}
}
