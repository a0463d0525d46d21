//! Hand-off between the network threads and the tick thread.
//!
//! Any number of producers enqueue; only the tick thread dequeues. Enqueue never
//! blocks and the queue is unbounded.

use crossbeam::queue::SegQueue;
use tokio::sync::oneshot;

use crate::action_executor::{Action, ActionResult};
use crate::presence::OwnerId;

pub type Completion = Box<dyn FnOnce(ActionResult) + Send>;

/// A pending mutating request.
pub struct ActionEvent {
    pub owner: OwnerId,
    pub key: Option<i64>,
    pub action: Action,
    on_complete: Completion,
}

impl ActionEvent {
    pub fn new(
        owner: OwnerId,
        key: Option<i64>,
        action: Action,
        on_complete: impl FnOnce(ActionResult) + Send + 'static,
    ) -> Self {
        Self {
            owner,
            key,
            action,
            on_complete: Box::new(on_complete),
        }
    }

    /// An event whose result is delivered through a oneshot channel. The receiver
    /// errors if the event is dropped without a result.
    pub fn channel(
        owner: OwnerId,
        key: Option<i64>,
        action: Action,
    ) -> (Self, oneshot::Receiver<ActionResult>) {
        let (tx, rx) = oneshot::channel();
        let event = Self::new(owner, key, action, move |result| {
            // Receiver gone means nobody is waiting any more.
            let _ = tx.send(result);
        });
        (event, rx)
    }

    /// Deliver the result. Consumes the event, so this happens at most once.
    pub fn complete(self, result: ActionResult) {
        (self.on_complete)(result)
    }
}

impl std::fmt::Debug for ActionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEvent")
            .field("owner", &self.owner)
            .field("key", &self.key)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct ActionQueue {
    events: SegQueue<ActionEvent>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, event: ActionEvent) {
        self.events.push(event);
    }

    pub fn dequeue_one(&self) -> Option<ActionEvent> {
        self.events.pop()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Direction;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_for_single_producer() {
        let queue = ActionQueue::new();
        let owner = OwnerId::new_v4();
        for key in 0..5 {
            queue.enqueue(ActionEvent::new(owner, Some(key), Action::Turn(Direction::LEFT), |_| {}));
        }
        let keys: Vec<_> = std::iter::from_fn(|| queue.dequeue_one())
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, (0..5).map(Some).collect::<Vec<_>>());
        assert!(queue.dequeue_one().is_none());
    }

    #[test]
    fn concurrent_producers_each_event_dequeued_once() {
        const PRODUCERS: i64 = 8;
        const PER_PRODUCER: i64 = 500;

        let queue = Arc::new(ActionQueue::new());
        let owner = OwnerId::new_v4();
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let key = p * PER_PRODUCER + i;
                        queue.enqueue(ActionEvent::new(owner, Some(key), Action::Move(Direction::UP), |_| {}));
                    }
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let total = (PRODUCERS * PER_PRODUCER) as usize;
        while seen.len() < total {
            match queue.dequeue_one() {
                Some(event) => assert!(seen.insert(event.key), "duplicate {:?}", event.key),
                None => thread::yield_now(),
            }
        }
        for p in producers {
            p.join().unwrap();
        }
        assert!(queue.dequeue_one().is_none());
        assert_eq!(seen.len(), total);
    }

    #[tokio::test]
    async fn channel_completion_resolves_once() {
        let (event, rx) = ActionEvent::channel(OwnerId::new_v4(), Some(3), Action::Mine(Direction::DOWN));
        event.complete(ActionResult::new(Some(3), true));
        let result = rx.await.unwrap();
        assert_eq!(result.key, Some(3));
        assert!(result.success);
    }

    #[tokio::test]
    async fn dropped_event_closes_channel() {
        let (event, rx) = ActionEvent::channel(OwnerId::new_v4(), None, Action::Mine(Direction::DOWN));
        drop(event);
        assert!(rx.await.is_err());
    }
}
