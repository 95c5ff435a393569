// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Liveness of the back ends the engine talks to.

use async_trait::async_trait;

use crate::error::MolarisseError;
use crate::types::HealthStatus;

/// A back end that can be probed and released.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Short label for logs and `molarisse status`.
    fn name(&self) -> &str;

    /// Probe the back end. A reachable server that rejects the credentials
    /// is `Degraded`; only a failure to run the probe itself is an error.
    async fn health_check(&self) -> Result<HealthStatus, MolarisseError>;

    /// Release held connections before the process exits.
    async fn shutdown(&self) -> Result<(), MolarisseError> {
        Ok(())
    }
}
