use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use rickdex_schema::BusMessage;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Topic {
    IdentifierChanged,
    CharacterLoaded,
    CharacterMissing,
    EpisodesResolved,
    EpisodesFailed,
    NoticeRaised,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::IdentifierChanged,
        Topic::CharacterLoaded,
        Topic::CharacterMissing,
        Topic::EpisodesResolved,
        Topic::EpisodesFailed,
        Topic::NoticeRaised,
    ];

    pub fn from_message(msg: &BusMessage) -> Self {
        match msg {
            BusMessage::IdentifierChanged { .. } => Topic::IdentifierChanged,
            BusMessage::CharacterLoaded { .. } => Topic::CharacterLoaded,
            BusMessage::CharacterMissing { .. } => Topic::CharacterMissing,
            BusMessage::EpisodesResolved { .. } => Topic::EpisodesResolved,
            BusMessage::EpisodesFailed { .. } => Topic::EpisodesFailed,
            BusMessage::NoticeRaised { .. } => Topic::NoticeRaised,
        }
    }
}

type Subscriber = mpsc::Sender<BusMessage>;
type SubscriberMap = Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>;

pub struct EventBus {
    subscribers: SubscriberMap,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        subs.entry(topic).or_default().push(tx);
        rx
    }

    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        deliver(&self.subscribers, msg).await
    }

    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            subscribers: self.subscribers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BusPublisher {
    subscribers: SubscriberMap,
}

impl BusPublisher {
    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        deliver(&self.subscribers, msg).await
    }
}

// Slow subscribers lose messages rather than stall the publisher.
// Closed subscribers are pruned after the send.
async fn deliver(subscribers: &SubscriberMap, msg: BusMessage) -> Result<()> {
    let topic = Topic::from_message(&msg);
    let mut saw_closed = false;
    {
        let subs = subscribers.read().await;
        if let Some(list) = subs.get(&topic) {
            for tx in list {
                if tx.is_closed() {
                    saw_closed = true;
                } else if tx.try_send(msg.clone()).is_err() {
                    tracing::debug!(?topic, "bus subscriber full, message dropped");
                }
            }
        }
    }

    if saw_closed {
        let mut subs = subscribers.write().await;
        if let Some(list) = subs.get_mut(&topic) {
            list.retain(|tx| !tx.is_closed());
            tracing::debug!(?topic, remaining = list.len(), "pruned closed bus subscribers");
        }
    }
    Ok(())
}
