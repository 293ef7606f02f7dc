//! Readiness probes.
//!
//! The runtime has no push notification for "a file appeared inside the
//! container" or "the API server is listening", so both conditions are polled.

use crate::container::{ContainerError, ContainerRuntime};
use crate::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Readiness errors.
#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    /// Stat failed for a reason other than the path not existing yet,
    /// including the container itself being gone
    #[error("Failed to stat {path} in container: {source}")]
    Stat {
        path: String,
        #[source]
        source: ContainerError,
    },

    /// The artifact never appeared within the attempt budget
    #[error("Timed out waiting for {path} after {attempts} attempts")]
    ArtifactTimeout { path: String, attempts: u32 },

    /// The caller cancelled the wait
    #[error("Cancelled while waiting for {path}")]
    Cancelled { path: String },
}

/// Polling cadence and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between attempts
    pub interval: Duration,
    /// Attempts before the artifact wait gives up
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: env::polling::DEFAULT_INTERVAL,
            max_attempts: env::polling::DEFAULT_ARTIFACT_MAX_ATTEMPTS,
        }
    }
}

/// Outcome of waiting for the API server port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortReadiness {
    /// A TCP connection succeeded
    Ready,
    /// The cancellation token fired first
    Cancelled,
}

/// Polls a container and its published port until they are usable.
pub struct ReadinessProber {
    runtime: Arc<dyn ContainerRuntime>,
    policy: PollPolicy,
}

impl ReadinessProber {
    /// Create a prober with the given polling policy.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, policy: PollPolicy) -> Self {
        Self { runtime, policy }
    }

    fn ticker(&self) -> time::Interval {
        let mut ticker = time::interval(self.policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Wait until `path` exists inside the container with a non-zero size, and
    /// return that size.
    ///
    /// Only a missing path counts as "not there yet". A missing container and
    /// every other error abort the wait on the attempt that saw them.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessError::Stat`] on a non-retryable stat failure,
    /// [`ReadinessError::ArtifactTimeout`] when the attempt budget runs out and
    /// [`ReadinessError::Cancelled`] when `cancel` fires.
    pub async fn wait_for_artifact(
        &self,
        container_id: &str,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<u64, ReadinessError> {
        let mut ticker = self.ticker();
        let cancelled = || ReadinessError::Cancelled {
            path: path.to_string(),
        };

        for attempt in 1..=self.policy.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = ticker.tick() => {}
            }

            trace!(container_id, path, attempt, "waiting for kubeconfig");
            let stat = tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled()),
                stat = self.runtime.stat_path(container_id, path) => stat,
            };

            match stat {
                Ok(stat) if stat.size > 0 => {
                    debug!(container_id, path, size = stat.size, attempt, "Artifact present");
                    return Ok(stat.size);
                }
                Ok(_) => trace!(container_id, path, "Artifact still empty"),
                Err(e) if e.is_not_found() && !e.is_container_gone() => {
                    trace!(container_id, path, "Artifact not present yet")
                }
                Err(source) => {
                    return Err(ReadinessError::Stat {
                        path: path.to_string(),
                        source,
                    });
                }
            }
        }

        Err(ReadinessError::ArtifactTimeout {
            path: path.to_string(),
            attempts: self.policy.max_attempts,
        })
    }

    /// Wait until a TCP connection to `host:port` succeeds.
    ///
    /// Connection errors are retried indefinitely; the wait ends early, without
    /// error, when `cancel` fires.
    pub async fn wait_for_port(
        &self,
        host: &str,
        port: u16,
        cancel: &CancellationToken,
    ) -> PortReadiness {
        let addr = format!("{}:{}", host, port);
        let mut ticker = self.ticker();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(addr = %addr, "Port wait cancelled");
                    return PortReadiness::Cancelled;
                }
                _ = ticker.tick() => {}
            }

            trace!(addr = %addr, "Trying to connect to apiserver");
            let attempt = tokio::select! {
                _ = cancel.cancelled() => return PortReadiness::Cancelled,
                attempt = TcpStream::connect(&addr) => attempt,
            };

            match attempt {
                Ok(stream) => {
                    drop(stream);
                    debug!(addr = %addr, "API server port accepting connections");
                    return PortReadiness::Ready;
                }
                Err(e) => trace!(addr = %addr, "Connect failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 300);
    }

    #[test]
    fn test_error_messages_name_the_path() {
        let err = ReadinessError::ArtifactTimeout {
            path: "/output/kubeconfig.yaml".to_string(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "Timed out waiting for /output/kubeconfig.yaml after 3 attempts"
        );
    }
}
