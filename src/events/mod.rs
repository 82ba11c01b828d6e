//! Event Feed Module
//! Typed single-writer broadcast: every subscriber sees the events appended
//! after it joined, in append order. The writer never blocks; subscribers
//! whose channels fill up are dropped.

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Default per-subscriber channel capacity.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

type EventFilter<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

struct FeedSubscriber<E> {
    sender: mpsc::Sender<E>,
    filter: Option<EventFilter<E>>,
}

/// A typed broadcast feed.
///
/// `append` is called by the single writing transaction; `subscribe` hands
/// out independent channels. Cancellation is dropping the subscription
/// handle: the writer notices at the next delivery.
pub struct EventFeed<E> {
    capacity: usize,
    subscribers: Mutex<Vec<FeedSubscriber<E>>>,
}

impl<E: Clone + Send + 'static> EventFeed<E> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to every event appended from now on
    pub fn subscribe(&self) -> FeedSubscription<E> {
        self.attach(None)
    }

    /// Subscribe to the events matching `filter`
    pub fn subscribe_with_filter(
        &self,
        filter: impl Fn(&E) -> bool + Send + Sync + 'static,
    ) -> FeedSubscription<E> {
        self.attach(Some(Box::new(filter)))
    }

    fn attach(&self, filter: Option<EventFilter<E>>) -> FeedSubscription<E> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.subscribers
            .lock()
            .push(FeedSubscriber { sender, filter });
        FeedSubscription { receiver }
    }

    /// Append one event, fanning it out to the live subscribers.
    ///
    /// Subscribers that cannot keep up (full channel) or that went away
    /// (closed channel) are removed; everyone else observes the same order.
    pub fn append(&self, event: E) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| {
            if let Some(filter) = &subscriber.filter {
                if !filter(&event) {
                    return !subscriber.sender.is_closed();
                }
            }
            subscriber.sender.try_send(event.clone()).is_ok()
        });
    }

    /// Number of currently attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<E: Clone + Send + 'static> Default for EventFeed<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of a subscription
pub struct FeedSubscription<E> {
    receiver: mpsc::Receiver<E>,
}

impl<E> FeedSubscription<E> {
    /// Await the next event; `None` once the feed is gone
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }

    /// Non-blocking read of the next buffered event
    pub fn try_recv(&mut self) -> Option<E> {
        self.receiver.try_recv().ok()
    }
}
