use std::{sync::Arc, time::Duration};

use {
    botline_channels::Transport,
    tracing::{debug, info, warn},
};

use crate::{
    error::DispatchError,
    health::EndpointHealthTracker,
    registry::CorrelationRegistry,
    types::{CallRequest, CallResolution, CallResult, CorrelationKey},
};

/// Per-rank attempt deadlines.
///
/// Non-final candidates get the short deadline so there is time left to fail
/// over; the final candidate gets the full window.
#[derive(Debug, Clone, Copy)]
pub struct DispatchTiming {
    pub short_timeout: Duration,
    pub total_timeout: Duration,
}

impl Default for DispatchTiming {
    fn default() -> Self {
        Self {
            short_timeout: Duration::from_secs(25),
            total_timeout: Duration::from_secs(40),
        }
    }
}

/// Drives one logical request across an ordered candidate list.
///
/// Exactly one attempt per endpoint; per-attempt failures are absorbed and
/// the next candidate is tried. Only a terminal outcome reaches the caller.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    registry: CorrelationRegistry,
    health: EndpointHealthTracker,
    timing: DispatchTiming,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: CorrelationRegistry,
        health: EndpointHealthTracker,
        timing: DispatchTiming,
    ) -> Self {
        Self {
            transport,
            registry,
            health,
            timing,
        }
    }

    pub async fn dispatch(&self, request: &CallRequest) -> Result<CallResult, DispatchError> {
        let last = request.candidates.len().saturating_sub(1);

        for (rank, endpoint) in request.candidates.iter().enumerate() {
            let is_last = rank == last;

            if self.health.is_blocked(endpoint) {
                debug!(endpoint = %endpoint, "candidate in cooldown, skipping");
                continue;
            }

            let deadline = if is_last {
                self.timing.total_timeout
            } else {
                self.timing.short_timeout
            };
            let key = CorrelationKey::new(endpoint.clone(), request.subject.clone());
            let handle = match self
                .registry
                .register(key.clone(), request.policy.clone(), deadline)
            {
                Ok(handle) => handle,
                Err(e) => {
                    // Another logical request already owns this key; treat the
                    // candidate as busy rather than failed.
                    warn!(endpoint = %endpoint, error = %e, "correlation key busy, skipping candidate");
                    continue;
                },
            };

            info!(
                endpoint = %endpoint,
                rank,
                deadline_secs = deadline.as_secs(),
                command = %request.command,
                "sending command"
            );
            if let Err(e) = self.transport.send(endpoint, &request.command).await {
                warn!(endpoint = %endpoint, error = %e, "send rejected");
                self.health.record_failure(endpoint);
                self.registry.unregister(&key);
                if is_last {
                    return Err(DispatchError::EndpointUnreachable {
                        endpoint: endpoint.clone(),
                        reason: e.to_string(),
                    });
                }
                continue;
            }

            match handle.wait().await {
                Some(CallResolution::Complete(replies)) => {
                    info!(endpoint = %endpoint, replies = replies.len(), "command complete");
                    return Ok(CallResult {
                        endpoint: endpoint.clone(),
                        replies,
                        complete: true,
                    });
                },
                Some(CallResolution::Partial(replies)) => {
                    // Degraded success: the endpoint answered, just not fully.
                    // No further candidates are tried.
                    info!(endpoint = %endpoint, replies = replies.len(), "command complete (partial)");
                    return Ok(CallResult {
                        endpoint: endpoint.clone(),
                        replies,
                        complete: false,
                    });
                },
                Some(CallResolution::NoReply) => {
                    // Failure already recorded by the deadline path.
                    if is_last {
                        return Err(DispatchError::NoResponseTimeout {
                            endpoint: endpoint.clone(),
                            waited: deadline,
                        });
                    }
                    info!(endpoint = %endpoint, "no response, failing over");
                    continue;
                },
                Some(CallResolution::Rejected(reply)) => {
                    // Terminal: the command itself is wrong for the remote;
                    // another endpoint would refuse it the same way.
                    return Err(DispatchError::RemoteFormatError {
                        endpoint: endpoint.clone(),
                        message: reply.text,
                    });
                },
                None => {
                    warn!(endpoint = %endpoint, "pending call dropped without an outcome");
                    continue;
                },
            }
        }

        Err(DispatchError::AllEndpointsExhausted)
    }
}
