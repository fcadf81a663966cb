//! Most-recent-value publish/subscribe over channels.
//!
//! Every subscriber owns a one-slot mailbox. Publishing never blocks and never
//! runs subscriber code: if the slot still holds an undelivered value, that
//! value is replaced by the newer one. Subscribers that were dropped are
//! removed on the next publish.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Fan-out of values to any number of [`Subscription`]s.
#[derive(Debug)]
pub struct Broadcaster<T> {
    subscribers: Mutex<Vec<Mailbox<T>>>,
}

#[derive(Debug)]
struct Mailbox<T> {
    sender: Sender<T>,
    /// Publisher-side handle on the same slot, used to evict a stale value.
    drain: Receiver<T>,
    alive: Weak<()>,
}

impl<T: Clone> Broadcaster<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = bounded(1);
        let token = Arc::new(());
        self.subscribers.lock().push(Mailbox {
            sender,
            drain: receiver.clone(),
            alive: Arc::downgrade(&token),
        });
        Subscription {
            receiver,
            _token: token,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver `value` to every live subscriber. Returns how many received it.
    pub fn publish(&self, value: T) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|m| m.alive.strong_count() > 0);

        let mut delivered = 0;
        for mailbox in subscribers.iter() {
            let mut pending = value.clone();
            loop {
                match mailbox.sender.try_send(pending) {
                    Ok(()) => {
                        delivered += 1;
                        break;
                    }
                    Err(TrySendError::Full(v)) => {
                        let _ = mailbox.drain.try_recv();
                        pending = v;
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
        }
        delivered
    }
}

impl<T: Clone> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a [`Broadcaster`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: Receiver<T>,
    _token: Arc<()>,
}

impl<T> Subscription<T> {
    /// Newest undelivered value, if any.
    pub fn try_latest(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(v) => Some(v),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next value.
    pub fn wait(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(v) => Some(v),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}
