use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use {
    tokio::{sync::oneshot, task::JoinHandle},
    tracing::{debug, info, warn},
};

use crate::{
    health::EndpointHealthTracker,
    types::{CallResolution, CompletionPolicy, CorrelationKey, InboundReply, MarkerSet},
};

/// Errors from [`CorrelationRegistry::register`].
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    /// At most one live pending call may own a correlation key.
    #[error("a pending call already owns correlation key {0}")]
    KeyOccupied(CorrelationKey),
}

/// A pending call in the waiter table.
///
/// Mutated only under the registry lock; removal from the table and delivery
/// of the resolution are one step, so the oneshot sender fires exactly once.
struct Waiter {
    policy: CompletionPolicy,
    replies: Vec<InboundReply>,
    tx: oneshot::Sender<CallResolution>,
    timer: Option<JoinHandle<()>>,
    registered_at: Instant,
}

impl Waiter {
    /// Consume the waiter: cancel its deadline and deliver the resolution.
    fn deliver(self, make: impl FnOnce(Vec<InboundReply>) -> CallResolution) {
        let Waiter {
            replies, tx, timer, ..
        } = self;
        if let Some(timer) = timer {
            timer.abort();
        }
        // The caller may have dropped the handle; nothing to do then.
        let _ = tx.send(make(replies));
    }
}

struct Inner {
    waiters: HashMap<CorrelationKey, Waiter>,
    /// Unclaimed replies, most recent first.
    inbox: VecDeque<InboundReply>,
}

struct Shared {
    inner: Mutex<Inner>,
    markers: MarkerSet,
    inbox_capacity: usize,
    health: EndpointHealthTracker,
}

/// The waiter table: matches the unordered inbound reply stream back to the
/// pending call that caused each reply.
///
/// All mutation happens under one lock with no I/O inside the critical
/// section. Every pending call carries a one-shot deadline timer; expiry and
/// normal completion race on removal from the table, and whichever removes
/// the entry delivers the single resolution.
#[derive(Clone)]
pub struct CorrelationRegistry {
    shared: Arc<Shared>,
}

/// Caller's half of a pending call: a single-assignment completion handle.
pub struct CallHandle {
    key: CorrelationKey,
    rx: oneshot::Receiver<CallResolution>,
}

impl CallHandle {
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// Suspend until the call resolves. `None` means the call was unregistered
    /// without an outcome (its send never went out).
    pub async fn wait(self) -> Option<CallResolution> {
        self.rx.await.ok()
    }
}

impl CorrelationRegistry {
    pub fn new(
        markers: MarkerSet,
        inbox_capacity: usize,
        health: EndpointHealthTracker,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    waiters: HashMap::new(),
                    inbox: VecDeque::new(),
                }),
                markers,
                inbox_capacity,
                health,
            }),
        }
    }

    /// Register a pending call and arm its deadline.
    ///
    /// Fails when the key is already owned by a live call.
    pub fn register(
        &self,
        key: CorrelationKey,
        policy: CompletionPolicy,
        deadline: Duration,
    ) -> Result<CallHandle, RegisterError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.lock();
            if inner.waiters.contains_key(&key) {
                return Err(RegisterError::KeyOccupied(key));
            }
            inner.waiters.insert(
                key.clone(),
                Waiter {
                    policy,
                    replies: Vec::new(),
                    tx,
                    timer: None,
                    registered_at: Instant::now(),
                },
            );
        }
        debug!(key = %key, deadline_secs = deadline.as_secs(), "registered pending call");

        let registry = self.clone();
        let timer_key = key.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            registry.expire(&timer_key);
        });

        {
            let mut inner = self.lock();
            match inner.waiters.get_mut(&key) {
                Some(waiter) => waiter.timer = Some(timer),
                // Resolved before the timer could be attached.
                None => timer.abort(),
            }
        }

        Ok(CallHandle { key, rx })
    }

    /// Route an inbound reply to the pending call it belongs to.
    ///
    /// Match, append and completion evaluation are one atomic step; a reply
    /// is claimed by at most one call. Unclaimed replies go to the generic
    /// inbox and `false` is returned.
    pub fn route(&self, reply: InboundReply) -> bool {
        let mut inner = self.lock();
        let Some(key) = claimant(&inner.waiters, &reply) else {
            let capacity = self.shared.inbox_capacity;
            push_inbox(&mut inner.inbox, capacity, reply);
            return false;
        };
        let Some(mut waiter) = inner.waiters.remove(&key) else {
            // claimant() only returns live keys; keep the reply either way.
            let capacity = self.shared.inbox_capacity;
            push_inbox(&mut inner.inbox, capacity, reply);
            return false;
        };

        if self.shared.markers.is_rejection(&reply.text) {
            // Sentinel override: terminal format error regardless of policy.
            // Not a timeout and not a health event.
            drop(inner);
            warn!(key = %key, "rejection marker in reply, resolving as format error");
            waiter.deliver(|_| CallResolution::Rejected(reply));
            return true;
        }

        let terminated = self.shared.markers.is_terminator(&reply.text);
        waiter.replies.push(reply);
        let complete = match &waiter.policy {
            CompletionPolicy::Single => true,
            CompletionPolicy::Count(expected) => waiter.replies.len() >= expected.get(),
            CompletionPolicy::UntilTerminator => terminated,
        };

        if complete {
            drop(inner);
            debug!(key = %key, replies = waiter.replies.len(), "pending call complete");
            waiter.deliver(CallResolution::Complete);
        } else {
            debug!(key = %key, accumulated = waiter.replies.len(), "reply accumulated");
            inner.waiters.insert(key, waiter);
        }
        true
    }

    /// Deadline expiry: resolve the call from whatever has accumulated.
    ///
    /// Silence (zero replies) records an endpoint failure; a partial
    /// accumulation is a degraded success and leaves health untouched,
    /// since any reply at all proves the endpoint alive.
    fn expire(&self, key: &CorrelationKey) {
        let waiter = self.lock().waiters.remove(key);
        let Some(waiter) = waiter else {
            // Already resolved; the timer lost the race.
            return;
        };

        let waited = waiter.registered_at.elapsed();
        if waiter.replies.is_empty() {
            warn!(key = %key, waited_secs = waited.as_secs(), "deadline reached with no replies");
            self.shared.health.record_failure(&key.endpoint);
            waiter.deliver(|_| CallResolution::NoReply);
        } else {
            info!(
                key = %key,
                replies = waiter.replies.len(),
                waited_secs = waited.as_secs(),
                "deadline reached, resolving with partial replies"
            );
            waiter.deliver(CallResolution::Partial);
        }
    }

    /// Resolve a pending call from outside the reply/deadline paths.
    pub fn force_resolve(&self, key: &CorrelationKey, resolution: CallResolution) {
        let waiter = self.lock().waiters.remove(key);
        if let Some(waiter) = waiter {
            info!(key = %key, "force-resolving pending call");
            waiter.deliver(|_| resolution);
        }
    }

    /// Drop a pending call without an outcome (its send never went out).
    /// The handle's `wait` returns `None`.
    pub fn unregister(&self, key: &CorrelationKey) {
        let waiter = self.lock().waiters.remove(key);
        if let Some(waiter) = waiter {
            debug!(key = %key, "unregistered pending call");
            if let Some(timer) = waiter.timer {
                timer.abort();
            }
        }
    }

    /// Number of live pending calls.
    pub fn pending_count(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Unclaimed replies, most recent first.
    pub fn inbox_snapshot(&self) -> Vec<InboundReply> {
        self.lock().inbox.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pick the single pending call a reply belongs to.
///
/// A subject-filtered call outranks an open one on the same endpoint, so a
/// reply is never claimed twice.
fn claimant(
    waiters: &HashMap<CorrelationKey, Waiter>,
    reply: &InboundReply,
) -> Option<CorrelationKey> {
    if let Some(subject) = &reply.subject {
        let filtered = CorrelationKey::filtered(reply.endpoint.clone(), subject.clone());
        if waiters.contains_key(&filtered) {
            return Some(filtered);
        }
    }
    let open = CorrelationKey::open(reply.endpoint.clone());
    waiters.contains_key(&open).then_some(open)
}

fn push_inbox(inbox: &mut VecDeque<InboundReply>, capacity: usize, reply: InboundReply) {
    inbox.push_front(reply);
    inbox.truncate(capacity);
}
