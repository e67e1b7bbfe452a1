use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

/// A long-running unit managed by a [`super::ServiceGroup`].
///
/// `run` returns when the unit is done, either on its own or because `cancel`
/// fired. Returning at all (with or without an error) stops the whole group.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Unit name used in logs, diagnostics and state lookups. Unique per group.
    fn name(&self) -> &'static str;

    /// Run the unit to completion.
    async fn run(&self, cancel: CancellationToken) -> Result<(), ServiceError>;
}

/// Shared handle to a service unit.
pub type ServiceRef = Arc<dyn Service>;
