use crate::domain::entities::{ChangeEvent, UserPresence};
use crate::domain::errors::ServiceResult;
use async_trait::async_trait;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

pub type ChangeStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;
pub type PresenceStream = Pin<Box<dyn Stream<Item = PresenceEvent> + Send>>;

/// Full presence state: presence key (user id) -> payloads tracked under it
pub type PresenceState = HashMap<String, Vec<UserPresence>>;

/// Events reported by a presence channel
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    /// The channel state was fully synchronised; read it with `presence_state`
    Sync,
    Join {
        key: String,
        presences: Vec<UserPresence>,
    },
    Leave {
        key: String,
        presences: Vec<UserPresence>,
    },
}

/// Ends a subscription when released or dropped
pub struct SubscriptionHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Handle for a subscription with nothing to release
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Detach from the source immediately. Later calls do nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A live event stream and the handle that ends it.
///
/// The stream keeps yielding until the handle is released (or dropped), after
/// which the source stops delivering to it.
pub struct Subscription<S> {
    pub stream: S,
    pub handle: SubscriptionHandle,
}

impl<S> Subscription<S> {
    pub fn new(stream: S, handle: SubscriptionHandle) -> Self {
        Self { stream, handle }
    }

    pub fn into_parts(self) -> (S, SubscriptionHandle) {
        (self.stream, self.handle)
    }
}

/// Source of table change streams and presence channels
pub trait RealtimeGateway: Send + Sync {
    /// Subscribe to insert/update/delete events on a table
    fn subscribe_changes(&self, table: &str) -> Subscription<ChangeStream>;

    /// Get a handle to a named presence channel
    fn presence_channel(&self, name: &str) -> Arc<dyn PresenceChannel>;
}

#[async_trait]
pub trait PresenceChannel: Send + Sync {
    /// Subscribe to presence events
    fn events(&self) -> Subscription<PresenceStream>;

    /// Complete the subscription handshake. Tracking is only possible afterwards.
    async fn subscribe(&self) -> ServiceResult<()>;

    /// Publish this client's presence payload
    async fn track(&self, presence: UserPresence) -> ServiceResult<()>;

    /// Current full presence state
    async fn presence_state(&self) -> PresenceState;
}
