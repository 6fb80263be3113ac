use super::change_mapper::{map_change, ChangeSource};
use crate::config::RealtimeConfig;
use crate::domain::entities::{
    ChangeEvent, NewNotification, NotificationData, NotificationType, PresenceStatus, UserPresence,
};
use crate::domain::errors::{ServiceError, ServiceResult};
use crate::domain::ports::realtime_gateway::{
    ChangeStream, PresenceChannel, PresenceEvent, PresenceState, PresenceStream, RealtimeGateway,
    SubscriptionHandle,
};
use crate::domain::ports::toaster::{Toast, ToastVariant, Toaster};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Who the client is and where it currently is in the app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub current_page: Option<String>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_page: None,
        }
    }
}

#[derive(Debug, Default)]
struct FeedState {
    notifications: VecDeque<NotificationData>,
    unread_count: usize,
    online_users: Vec<UserPresence>,
}

struct Shared {
    state: Mutex<FeedState>,
    session: RwLock<SessionContext>,
    presence: OnceCell<Arc<dyn PresenceChannel>>,
    toaster: Arc<dyn Toaster>,
    config: RealtimeConfig,
    revision: watch::Sender<u64>,
}

/// Realtime notification feed and presence roster for one client session.
///
/// Mounting opens three subscriptions: maintenance changes, payment changes
/// and the presence channel. Each is consumed by its own task. Unmounting (or
/// dropping the center) releases all three subscriptions before returning and
/// then stops the tasks.
///
/// `unread_count` counts notifications inserted and not yet marked read. It
/// is not reduced when the feed drops its oldest entries past the limit, so it
/// can exceed the number of unread entries still visible.
pub struct NotificationCenter {
    shared: Arc<Shared>,
    subscriptions: Vec<SubscriptionHandle>,
    tasks: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl NotificationCenter {
    /// Open the subscriptions and start listening.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mount(
        gateway: &dyn RealtimeGateway,
        toaster: Arc<dyn Toaster>,
        session: SessionContext,
        config: RealtimeConfig,
    ) -> Self {
        let (revision, _) = watch::channel(0);

        // Subscribe before spawning so no event published after mount is missed
        let (maintenance, maintenance_handle) = gateway
            .subscribe_changes(&config.maintenance_table)
            .into_parts();
        let (payments, payments_handle) = gateway
            .subscribe_changes(&config.payments_table)
            .into_parts();
        let presence_channel = gateway.presence_channel(&config.presence_channel);
        let (presence_events, presence_handle) = presence_channel.events().into_parts();

        tracing::info!(
            "Mounting notification center for user {} ({}, {}, {})",
            session.user_id,
            config.maintenance_table,
            config.payments_table,
            config.presence_channel
        );

        let shared = Arc::new(Shared {
            state: Mutex::new(FeedState::default()),
            session: RwLock::new(session),
            presence: OnceCell::new(),
            toaster,
            config,
            revision,
        });
        let shutdown = CancellationToken::new();

        let tasks = vec![
            spawn_change_listener(
                shared.clone(),
                ChangeSource::Maintenance,
                maintenance,
                shutdown.clone(),
            ),
            spawn_change_listener(
                shared.clone(),
                ChangeSource::Payment,
                payments,
                shutdown.clone(),
            ),
            spawn_presence_listener(
                shared.clone(),
                presence_channel,
                presence_events,
                shutdown.clone(),
            ),
        ];

        Self {
            shared,
            subscriptions: vec![maintenance_handle, payments_handle, presence_handle],
            tasks,
            shutdown,
        }
    }

    /// Tear down all subscriptions. Safe to call more than once.
    ///
    /// The gateway stops delivering to this center before `unmount` returns.
    pub fn unmount(&mut self) {
        if self.tasks.is_empty() {
            return;
        }

        for subscription in self.subscriptions.iter_mut() {
            subscription.unsubscribe();
        }
        self.subscriptions.clear();

        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        tracing::info!("Notification center unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Feed contents, newest first
    pub fn notifications(&self) -> Vec<NotificationData> {
        self.shared.lock().notifications.iter().cloned().collect()
    }

    pub fn unread_count(&self) -> usize {
        self.shared.lock().unread_count
    }

    /// Roster from the most recent presence sync
    pub fn online_users(&self) -> Vec<UserPresence> {
        self.shared.lock().online_users.clone()
    }

    /// Whether the presence channel handshake has completed
    pub fn presence_ready(&self) -> bool {
        self.shared.presence.initialized()
    }

    /// Receiver whose value changes after every feed or roster update
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    /// Record the route the user is on; reported by `track_presence`
    pub fn navigate(&self, path: impl Into<String>) {
        let mut session = self
            .shared
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        session.current_page = Some(path.into());
    }

    /// Publish this client's presence. No-op until the presence channel is established.
    pub async fn track_presence(&self, status: PresenceStatus) -> ServiceResult<()> {
        let Some(channel) = self.shared.presence.get() else {
            tracing::debug!("Presence channel not ready, skipping track ({})", status);
            return Ok(());
        };

        let presence = {
            let session = self
                .shared
                .session
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            UserPresence::now(
                session.user_id.clone(),
                status,
                session.current_page.clone(),
            )
        };

        channel.track(presence).await
    }

    /// Insert a notification at the head of the feed
    pub fn add_notification(&self, notification: NotificationData) {
        self.shared.insert(notification);
    }

    /// Mark one notification as read. Returns false if no unread entry has that id.
    ///
    /// The unread count only drops when an entry actually flips, so repeated
    /// or unknown ids leave it unchanged.
    pub fn mark_as_read(&self, id: &str) -> bool {
        let flipped = {
            let mut guard = self.shared.lock();
            let state: &mut FeedState = &mut guard;
            let target = state
                .notifications
                .iter_mut()
                .find(|notification| notification.id == id && !notification.read);

            match target {
                Some(notification) => {
                    notification.read = true;
                    state.unread_count = state.unread_count.saturating_sub(1);
                    true
                }
                None => false,
            }
        };

        if flipped {
            self.shared.bump();
        }
        flipped
    }

    pub fn mark_all_as_read(&self) {
        {
            let mut state = self.shared.lock();
            for notification in state.notifications.iter_mut() {
                notification.read = true;
            }
            state.unread_count = 0;
        }
        self.shared.bump();
    }

    pub fn clear_all_notifications(&self) {
        {
            let mut state = self.shared.lock();
            state.notifications.clear();
            state.unread_count = 0;
        }
        self.shared.bump();
    }

    /// Build a notification from caller-supplied fields, insert it like any
    /// other notification and confirm with a toast.
    ///
    /// Invalid input raises a failure toast and leaves the feed untouched.
    pub fn broadcast_notification(&self, request: NewNotification) -> ServiceResult<NotificationData> {
        if let Err(message) = request.validate() {
            tracing::warn!("Rejected broadcast notification: {}", message);
            self.shared.toast(Toast {
                title: "Broadcast Failed".to_string(),
                description: message.clone(),
                duration: None,
                variant: ToastVariant::Destructive,
            });
            return Err(ServiceError::validation(message));
        }

        let mut notification =
            NotificationData::new(request.notification_type, request.title, request.message);
        notification.data = request.data;

        self.shared.insert(notification.clone());
        self.shared.toast(Toast {
            title: "Notification Sent".to_string(),
            description: format!("Broadcast \"{}\" sent", notification.title),
            duration: None,
            variant: ToastVariant::Default,
        });

        Ok(notification)
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn insert(&self, notification: NotificationData) {
        let important = notification.notification_type.is_important();
        let toast = important.then(|| Toast {
            title: notification.title.clone(),
            description: notification.message.clone(),
            duration: Some(self.config.toast_duration),
            variant: match notification.notification_type {
                NotificationType::Emergency => ToastVariant::Destructive,
                _ => ToastVariant::Default,
            },
        });

        {
            let mut state = self.lock();
            state.notifications.push_front(notification);
            state.notifications.truncate(self.config.feed_limit);
            state.unread_count += 1;
        }
        self.bump();

        if let Some(toast) = toast {
            self.toast(toast);
        }
    }

    fn handle_change(&self, source: ChangeSource, event: &ChangeEvent) {
        let notification = map_change(source, event);
        tracing::debug!(
            "{:?} change on {} -> {} notification {}",
            event.event_type,
            event.table,
            notification.notification_type,
            notification.id
        );
        self.insert(notification);
    }

    /// Replace the roster with the first payload of every key in `state`
    fn apply_presence_sync(&self, state: PresenceState) {
        let mut roster: Vec<UserPresence> = state
            .into_values()
            .filter_map(|presences| presences.into_iter().next())
            .collect();
        roster.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        tracing::debug!("Presence sync: {} users online", roster.len());
        self.lock().online_users = roster;
        self.bump();
    }

    /// Best effort: failures are logged, never propagated
    fn toast(&self, toast: Toast) {
        let title = toast.title.clone();
        if let Err(e) = self.toaster.show(toast) {
            tracing::warn!("Failed to show toast \"{}\": {}", title, e);
        }
    }
}

fn spawn_change_listener(
    shared: Arc<Shared>,
    source: ChangeSource,
    mut stream: ChangeStream,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = stream.next() => match next {
                    Some(event) => shared.handle_change(source, &event),
                    None => {
                        tracing::warn!("{:?} change stream closed", source);
                        break;
                    }
                },
            }
        }
    })
}

fn spawn_presence_listener(
    shared: Arc<Shared>,
    channel: Arc<dyn PresenceChannel>,
    mut events: PresenceStream,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let joined = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            joined = channel.subscribe() => joined,
        };

        if let Err(e) = joined {
            tracing::error!("Failed to join presence channel: {}", e);
            return;
        }
        if shared.presence.set(channel.clone()).is_err() {
            tracing::debug!("Presence channel already established");
        }
        tracing::info!("Presence channel established");
        shared.bump();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = events.next() => match next {
                    Some(PresenceEvent::Sync) => {
                        let state = channel.presence_state().await;
                        shared.apply_presence_sync(state);
                    }
                    Some(PresenceEvent::Join { key, presences }) => {
                        tracing::debug!("Presence join: {} ({} payloads)", key, presences.len());
                    }
                    Some(PresenceEvent::Leave { key, presences }) => {
                        tracing::debug!("Presence leave: {} ({} payloads)", key, presences.len());
                    }
                    None => {
                        tracing::warn!("Presence stream closed");
                        break;
                    }
                },
            }
        }
    })
}
