use std::time::Duration;

use async_trait::async_trait;

use crate::types::ProcessOutcome;

/// Runs the engine once. Implementations must resolve every termination
/// path (spawn failure, non-zero exit, deadline) to a [`ProcessOutcome`]
/// instead of erroring, so callers can classify and retry.
///
/// `label` names the credential strategy the attempt belongs to and only
/// feeds log context.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, args: Vec<String>, limit: Duration, label: &str) -> ProcessOutcome;
}
