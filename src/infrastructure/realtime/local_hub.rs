use crate::domain::entities::{ChangeEvent, UserPresence};
use crate::domain::errors::ServiceResult;
use crate::domain::ports::realtime_gateway::{
    ChangeStream, PresenceChannel, PresenceEvent, PresenceState, PresenceStream, RealtimeGateway,
    Subscription, SubscriptionHandle,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio_stream::wrappers::ReceiverStream;

/// Fan-out of one event source to per-subscriber bounded queues.
///
/// Removing a subscriber's sender ends its stream, so unsubscribing takes
/// effect before the next publish.
struct Fanout<T> {
    next_id: u64,
    senders: HashMap<u64, mpsc::Sender<T>>,
}

impl<T> Default for Fanout<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            senders: HashMap::new(),
        }
    }
}

impl<T: Clone> Fanout<T> {
    fn add(&mut self, capacity: usize) -> (u64, mpsc::Receiver<T>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let id = self.next_id;
        self.next_id += 1;
        self.senders.insert(id, sender);
        (id, receiver)
    }

    fn remove(&mut self, id: u64) {
        self.senders.remove(&id);
    }

    /// Queue `event` for every live subscriber, returning how many accepted it
    fn send(&mut self, event: &T, source: &str) -> usize {
        let mut delivered = 0;
        self.senders
            .retain(|id, sender| match sender.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Subscriber {} on {} lagged, dropped an event", id, source);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
        delivered
    }

    fn live(&self) -> usize {
        self.senders
            .values()
            .filter(|sender| !sender.is_closed())
            .count()
    }
}

/// In-process realtime gateway.
///
/// One fan-out per table, created on first use. Used by the binary and by
/// tests in place of the hosted realtime service.
#[derive(Clone)]
pub struct LocalRealtimeHub {
    tables: Arc<Mutex<HashMap<String, Fanout<ChangeEvent>>>>,
    presence: Arc<Mutex<HashMap<String, Arc<LocalPresenceChannel>>>>,
    capacity: usize,
}

impl LocalRealtimeHub {
    /// Create a hub whose subscriptions buffer up to `capacity` events each
    pub fn new(capacity: usize) -> Self {
        Self {
            tables: Arc::new(Mutex::new(HashMap::new())),
            presence: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Publish a change to every subscriber of its table.
    /// Returns the number of subscribers that received it.
    pub fn publish_change(&self, event: ChangeEvent) -> usize {
        let delivered = lock(&self.tables)
            .get_mut(&event.table)
            .map(|fanout| fanout.send(&event, &event.table))
            .unwrap_or(0);

        if delivered == 0 {
            tracing::debug!("No active subscribers for change on {}", event.table);
        }
        delivered
    }

    /// Number of live subscriptions on a table
    pub fn subscriber_count(&self, table: &str) -> usize {
        lock(&self.tables).get(table).map(Fanout::live).unwrap_or(0)
    }

    /// Concrete handle to a presence channel, for driving it directly
    pub fn local_presence(&self, name: &str) -> Arc<LocalPresenceChannel> {
        lock(&self.presence)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(LocalPresenceChannel::new(name, self.capacity)))
            .clone()
    }
}

impl Default for LocalRealtimeHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RealtimeGateway for LocalRealtimeHub {
    fn subscribe_changes(&self, table: &str) -> Subscription<ChangeStream> {
        let (id, receiver) = lock(&self.tables)
            .entry(table.to_string())
            .or_default()
            .add(self.capacity);

        let tables = self.tables.clone();
        let table = table.to_string();
        let handle = SubscriptionHandle::new(move || {
            if let Some(fanout) = lock(&tables).get_mut(&table) {
                fanout.remove(id);
            }
            tracing::debug!("Unsubscribed {} from {}", id, table);
        });

        Subscription::new(Box::pin(ReceiverStream::new(receiver)), handle)
    }

    fn presence_channel(&self, name: &str) -> Arc<dyn PresenceChannel> {
        self.local_presence(name)
    }
}

/// In-process presence channel.
///
/// Each key holds the payloads tracked under it. `track` and `untrack`
/// emit the incremental join/leave event followed by a full sync.
pub struct LocalPresenceChannel {
    name: String,
    state: RwLock<PresenceState>,
    listeners: Arc<Mutex<Fanout<PresenceEvent>>>,
    capacity: usize,
}

impl LocalPresenceChannel {
    pub fn new(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(HashMap::new()),
            listeners: Arc::new(Mutex::new(Fanout::default())),
            capacity: capacity.max(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live event subscriptions
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).live()
    }

    /// Remove a key and announce its departure
    pub async fn untrack(&self, key: &str) {
        let removed = {
            let mut state = self.state.write().await;
            state.remove(key)
        };

        if let Some(presences) = removed {
            self.emit(PresenceEvent::Leave {
                key: key.to_string(),
                presences,
            });
            self.emit(PresenceEvent::Sync);
        }
    }

    /// Replace the whole state and emit a sync, without join/leave events
    pub async fn replace_state(&self, next: PresenceState) {
        *self.state.write().await = next;
        self.emit(PresenceEvent::Sync);
    }

    fn emit(&self, event: PresenceEvent) {
        if lock(&self.listeners).send(&event, &self.name) == 0 {
            tracing::debug!("No listeners on presence channel {}", self.name);
        }
    }
}

#[async_trait]
impl PresenceChannel for LocalPresenceChannel {
    fn events(&self) -> Subscription<PresenceStream> {
        let (id, receiver) = lock(&self.listeners).add(self.capacity);

        let listeners = self.listeners.clone();
        let handle = SubscriptionHandle::new(move || lock(&listeners).remove(id));

        Subscription::new(Box::pin(ReceiverStream::new(receiver)), handle)
    }

    async fn subscribe(&self) -> ServiceResult<()> {
        Ok(())
    }

    async fn track(&self, presence: UserPresence) -> ServiceResult<()> {
        let key = presence.user_id.clone();
        {
            let mut state = self.state.write().await;
            state.insert(key.clone(), vec![presence.clone()]);
        }

        self.emit(PresenceEvent::Join {
            key,
            presences: vec![presence],
        });
        self.emit(PresenceEvent::Sync);
        Ok(())
    }

    async fn presence_state(&self) -> PresenceState {
        self.state.read().await.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
