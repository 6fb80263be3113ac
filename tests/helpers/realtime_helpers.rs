use async_trait::async_trait;
use estatedesk::config::RealtimeConfig;
use estatedesk::domain::entities::{PresenceStatus, UserPresence};
use estatedesk::domain::ports::{
    ChangeStream, PresenceChannel, PresenceEvent, PresenceState, PresenceStream, RealtimeGateway,
    Subscription, SubscriptionHandle,
};
use estatedesk::infrastructure::realtime::LocalRealtimeHub;
use estatedesk::infrastructure::toast::MockToaster;
use estatedesk::{NotificationCenter, ServiceResult, SessionContext};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const USER_ID: &str = "manager-1";

pub struct TestCenter {
    pub hub: LocalRealtimeHub,
    pub toaster: MockToaster,
    pub center: NotificationCenter,
}

/// Mount a notification center on a fresh local hub with a recording toaster
pub fn mount_center() -> TestCenter {
    let hub = LocalRealtimeHub::new(256);
    let toaster = MockToaster::new();
    let center = NotificationCenter::mount(
        &hub,
        Arc::new(toaster.clone()),
        SessionContext::new(USER_ID),
        RealtimeConfig::default(),
    );

    TestCenter {
        hub,
        toaster,
        center,
    }
}

/// Wait until `condition` holds, re-checking after every center update
pub async fn wait_for<F>(center: &NotificationCenter, condition: F)
where
    F: Fn(&NotificationCenter) -> bool,
{
    let mut updates = center.subscribe();

    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if condition(center) {
                return;
            }
            if updates.changed().await.is_err() {
                return;
            }
        }
    })
    .await;

    assert!(waited.is_ok(), "condition not met within 2 seconds");
    assert!(condition(center), "condition not met before updates stopped");
}

/// Poll `condition` every 10ms for up to 2 seconds
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2 seconds");
}

/// Gateway whose presence channel never completes its handshake
pub struct StalledPresenceGateway {
    pub hub: LocalRealtimeHub,
}

impl RealtimeGateway for StalledPresenceGateway {
    fn subscribe_changes(&self, table: &str) -> Subscription<ChangeStream> {
        self.hub.subscribe_changes(table)
    }

    fn presence_channel(&self, _name: &str) -> Arc<dyn PresenceChannel> {
        Arc::new(StalledPresenceChannel)
    }
}

pub struct StalledPresenceChannel;

#[async_trait]
impl PresenceChannel for StalledPresenceChannel {
    fn events(&self) -> Subscription<PresenceStream> {
        Subscription::new(Box::pin(futures::stream::pending()), SubscriptionHandle::noop())
    }

    async fn subscribe(&self) -> ServiceResult<()> {
        futures::future::pending::<()>().await;
        Ok(())
    }

    async fn track(&self, _presence: UserPresence) -> ServiceResult<()> {
        panic!("track must not be called before the channel is established");
    }

    async fn presence_state(&self) -> PresenceState {
        HashMap::new()
    }
}

/// Gateway whose presence channel is driven event by event from the test
pub struct ScriptedPresenceGateway {
    pub hub: LocalRealtimeHub,
    pub channel: Arc<ScriptedPresenceChannel>,
}

impl ScriptedPresenceGateway {
    pub fn new() -> Self {
        Self {
            hub: LocalRealtimeHub::default(),
            channel: Arc::new(ScriptedPresenceChannel::new()),
        }
    }
}

impl RealtimeGateway for ScriptedPresenceGateway {
    fn subscribe_changes(&self, table: &str) -> Subscription<ChangeStream> {
        self.hub.subscribe_changes(table)
    }

    fn presence_channel(&self, _name: &str) -> Arc<dyn PresenceChannel> {
        self.channel.clone()
    }
}

/// Presence channel that only emits what the test sends.
///
/// State changes made with `set_state` are silent; nothing is announced
/// until the test emits an event.
pub struct ScriptedPresenceChannel {
    state: Mutex<PresenceState>,
    sender: mpsc::UnboundedSender<PresenceEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<PresenceEvent>>>,
    consumed: Arc<AtomicUsize>,
}

impl ScriptedPresenceChannel {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(HashMap::new()),
            sender,
            receiver: Mutex::new(Some(receiver)),
            consumed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_state(&self, state: PresenceState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn emit(&self, event: PresenceEvent) {
        self.sender.send(event).unwrap();
    }

    /// Number of events the listener has pulled off the stream
    pub fn consumed(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresenceChannel for ScriptedPresenceChannel {
    fn events(&self) -> Subscription<PresenceStream> {
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .expect("scripted presence events already subscribed");
        let consumed = self.consumed.clone();

        let stream = UnboundedReceiverStream::new(receiver).inspect(move |_| {
            consumed.fetch_add(1, Ordering::SeqCst);
        });
        Subscription::new(Box::pin(stream), SubscriptionHandle::noop())
    }

    async fn subscribe(&self) -> ServiceResult<()> {
        Ok(())
    }

    async fn track(&self, presence: UserPresence) -> ServiceResult<()> {
        let key = presence.user_id.clone();
        self.state.lock().unwrap().insert(key, vec![presence]);
        Ok(())
    }

    async fn presence_state(&self) -> PresenceState {
        self.state.lock().unwrap().clone()
    }
}

/// Presence state with one online payload per user id
pub fn presence_of(user_ids: &[&str]) -> PresenceState {
    user_ids
        .iter()
        .map(|id| {
            (
                id.to_string(),
                vec![UserPresence::now(*id, PresenceStatus::Online, None)],
            )
        })
        .collect()
}

/// User ids on the center's roster, in roster order
pub fn roster_ids(center: &NotificationCenter) -> Vec<String> {
    center
        .online_users()
        .into_iter()
        .map(|user| user.user_id)
        .collect()
}
