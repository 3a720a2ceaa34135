use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    str::FromStr,
    sync::{
        RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use fileforge_common::error::{ForgeError, Result};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::ProgressEvent;

pub const DEFAULT_REPLAY_CAPACITY: usize = 1024;
/// Events buffered per subscriber before new ones are dropped for it.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Receives every lifecycle event a running job emits.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Room members plus every connected subscriber.
    #[default]
    RoomAndBroadcast,
    /// Room members only; late joiners use the last-event replay.
    RoomOnly,
}

impl FromStr for DeliveryMode {
    type Err = ForgeError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "room-and-broadcast" => Ok(Self::RoomAndBroadcast),
            "room-only" => Ok(Self::RoomOnly),
            other => Err(ForgeError::InvalidArgument(format!(
                "unknown delivery mode: {other}"
            ))),
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoomAndBroadcast => f.write_str("room-and-broadcast"),
            Self::RoomOnly => f.write_str("room-only"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One connected client's event stream.
pub struct Subscription {
    id: SubscriberId,
    events: mpsc::Receiver<ProgressEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.events.try_recv().ok()
    }
}

#[derive(Default)]
struct HubState {
    subscribers: HashMap<SubscriberId, mpsc::Sender<ProgressEvent>>,
    rooms: HashMap<String, HashSet<SubscriberId>>,
    last_events: HashMap<String, ProgressEvent>,
    replay_order: VecDeque<String>,
}

/// Connection manager for progress subscribers, keyed by job id rooms.
pub struct ProgressHub {
    mode: DeliveryMode,
    replay_capacity: usize,
    queue_capacity: usize,
    dropped: AtomicU64,
    next_id: AtomicU64,
    state: RwLock<HubState>,
}

impl ProgressHub {
    pub fn new(mode: DeliveryMode) -> Self {
        Self::with_replay_capacity(mode, DEFAULT_REPLAY_CAPACITY)
    }

    pub fn with_replay_capacity(mode: DeliveryMode, replay_capacity: usize) -> Self {
        Self {
            mode,
            replay_capacity: replay_capacity.max(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dropped: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            state: RwLock::new(HubState::default()),
        }
    }

    /// Per-subscriber buffer size. A subscriber that falls this far behind
    /// misses events until it catches up.
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity.max(1);
        self
    }

    /// Events discarded because a subscriber's queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn connect(&self) -> Result<Subscription> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, events) = mpsc::channel(self.queue_capacity);
        self.state_write()?.subscribers.insert(id, sender);
        debug!(subscriber = %id, "progress subscriber connected");
        Ok(Subscription { id, events })
    }

    pub fn join(&self, id: SubscriberId, job_id: &str) -> Result<()> {
        let mut state = self.state_write()?;
        if !state.subscribers.contains_key(&id) {
            return Err(ForgeError::InvalidArgument(format!(
                "subscriber is not connected: {id}"
            )));
        }
        state.rooms.entry(job_id.to_string()).or_default().insert(id);
        debug!(subscriber = %id, job_id = %job_id, "subscriber joined job room");
        Ok(())
    }

    pub fn leave(&self, id: SubscriberId, job_id: &str) -> Result<()> {
        let mut state = self.state_write()?;
        remove_from_room(&mut state.rooms, job_id, id);
        Ok(())
    }

    pub fn disconnect(&self, id: SubscriberId) {
        let Ok(mut state) = self.state_write() else {
            return;
        };
        drop_subscriber(&mut state, id);
        debug!(subscriber = %id, "progress subscriber disconnected");
    }

    pub fn subscriber_count(&self) -> usize {
        self.state_read()
            .map(|state| state.subscribers.len())
            .unwrap_or(0)
    }

    pub fn room_size(&self, job_id: &str) -> usize {
        self.state_read()
            .ok()
            .and_then(|state| state.rooms.get(job_id).map(HashSet::len))
            .unwrap_or(0)
    }

    /// The most recent event emitted for `job_id`, if still remembered.
    pub fn last_event(&self, job_id: &str) -> Option<ProgressEvent> {
        self.state_read()
            .ok()
            .and_then(|state| state.last_events.get(job_id).cloned())
    }

    fn deliver(&self, event: ProgressEvent) -> Result<()> {
        let mut state = self.state_write()?;

        let mut targets: HashSet<SubscriberId> = state
            .rooms
            .get(&event.job_id)
            .cloned()
            .unwrap_or_default();
        if self.mode == DeliveryMode::RoomAndBroadcast {
            targets.extend(state.subscribers.keys().copied());
        }

        let mut stale = Vec::new();
        for id in targets {
            let Some(sender) = state.subscribers.get(&id) else {
                stale.push(id);
                continue;
            };
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(subscriber = %id, job_id = %event.job_id, "subscriber queue full, dropping progress event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => stale.push(id),
            }
        }
        for id in stale {
            drop_subscriber(&mut state, id);
        }

        self.remember(&mut state, event);
        Ok(())
    }

    fn remember(&self, state: &mut HubState, event: ProgressEvent) {
        let job_id = event.job_id.clone();
        if state.last_events.insert(job_id.clone(), event).is_none() {
            state.replay_order.push_back(job_id);
        }
        while state.replay_order.len() > self.replay_capacity {
            if let Some(evicted) = state.replay_order.pop_front() {
                state.last_events.remove(&evicted);
            }
        }
    }

    fn state_read(&self) -> Result<std::sync::RwLockReadGuard<'_, HubState>> {
        self.state
            .read()
            .map_err(|_| ForgeError::InternalError("progress hub lock poisoned".to_string()))
    }

    fn state_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HubState>> {
        self.state
            .write()
            .map_err(|_| ForgeError::InternalError("progress hub lock poisoned".to_string()))
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(DeliveryMode::default())
    }
}

impl ProgressSink for ProgressHub {
    fn publish(&self, event: ProgressEvent) {
        let name = event.name();
        if let Err(err) = self.deliver(event) {
            warn!(event = %name, error = %err, "failed to deliver progress event");
        }
    }
}

fn drop_subscriber(state: &mut HubState, id: SubscriberId) {
    state.subscribers.remove(&id);
    state.rooms.retain(|_, members| {
        members.remove(&id);
        !members.is_empty()
    });
}

fn remove_from_room(rooms: &mut HashMap<String, HashSet<SubscriberId>>, job_id: &str, id: SubscriberId) {
    if let Some(members) = rooms.get_mut(job_id) {
        members.remove(&id);
        if members.is_empty() {
            rooms.remove(job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use fileforge_common::types::Utility;

    use super::*;
    use crate::types::{ErrorPayload, EventPayload, StartPayload};

    fn start_event(job_id: &str) -> ProgressEvent {
        ProgressEvent::new(
            Utility::Qr,
            job_id,
            EventPayload::Start(StartPayload {
                job_id: job_id.to_string(),
                total: 2,
            }),
        )
    }

    #[tokio::test]
    async fn broadcast_mode_reaches_everyone_once() {
        let hub = ProgressHub::new(DeliveryMode::RoomAndBroadcast);
        let mut member = hub.connect().unwrap();
        let mut bystander = hub.connect().unwrap();
        hub.join(member.id(), "job-1").unwrap();

        hub.publish(start_event("job-1"));

        assert_eq!(member.recv().await.map(|e| e.job_id), Some("job-1".to_string()));
        assert!(member.try_recv().is_none());
        assert_eq!(bystander.recv().await.map(|e| e.job_id), Some("job-1".to_string()));
        assert!(bystander.try_recv().is_none());
    }

    #[tokio::test]
    async fn room_only_mode_skips_bystanders() {
        let hub = ProgressHub::new(DeliveryMode::RoomOnly);
        let mut member = hub.connect().unwrap();
        let mut bystander = hub.connect().unwrap();
        hub.join(member.id(), "job-1").unwrap();

        hub.publish(start_event("job-1"));
        hub.publish(start_event("job-2"));

        assert_eq!(member.recv().await.map(|e| e.job_id), Some("job-1".to_string()));
        assert!(member.try_recv().is_none());
        assert!(bystander.try_recv().is_none());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let hub = ProgressHub::default();
        let subscription = hub.connect().unwrap();
        hub.join(subscription.id(), "job-1").unwrap();
        drop(subscription);

        hub.publish(start_event("job-1"));

        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.room_size("job-1"), 0);
    }

    #[tokio::test]
    async fn stalled_subscriber_queue_stays_bounded() {
        let hub = ProgressHub::new(DeliveryMode::RoomAndBroadcast).with_queue_capacity(4);
        let mut stalled = hub.connect().unwrap();

        for _ in 0..1000 {
            hub.publish(start_event("job-1"));
        }

        assert_eq!(hub.dropped_events(), 996);
        assert_eq!(hub.subscriber_count(), 1);
        let mut queued = 0;
        while stalled.try_recv().is_some() {
            queued += 1;
        }
        assert_eq!(queued, 4);

        hub.publish(start_event("job-1"));
        assert!(stalled.recv().await.is_some());
    }

    #[test]
    fn join_requires_connection() {
        let hub = ProgressHub::default();
        let subscription = hub.connect().unwrap();
        let id = subscription.id();
        hub.disconnect(id);
        assert!(hub.join(id, "job-1").is_err());
    }

    #[test]
    fn last_event_replay_is_bounded() {
        let hub = ProgressHub::with_replay_capacity(DeliveryMode::RoomOnly, 2);
        hub.publish(start_event("a"));
        hub.publish(start_event("b"));
        hub.publish(ProgressEvent::new(
            Utility::Qr,
            "b",
            EventPayload::Error(ErrorPayload {
                job_id: "b".to_string(),
                error: "boom".to_string(),
            }),
        ));
        hub.publish(start_event("c"));

        assert!(hub.last_event("a").is_none());
        assert_eq!(
            hub.last_event("b").map(|event| event.kind()),
            Some(crate::types::EventKind::Error)
        );
        assert!(hub.last_event("c").is_some());
    }
}
