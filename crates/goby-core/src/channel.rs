//! Channel - cross-thread value transfer
//!
//! A thread-safe, blocking channel built on `parking_lot` primitives:
//! - Buffered channels (capacity > 0) hold up to `capacity` values
//! - Unbuffered channels (capacity 0) rendezvous: `deliver` returns only
//!   once a receiver has taken the value
//! - Both operations fail once the channel is closed; `receive` still drains
//!   values queued before the close

use crate::value::Value;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Channel operation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel was closed
    #[error("The channel is already closed.")]
    Closed,
}

/// Channel object
pub struct ChannelObject {
    id: u64,
    capacity: usize,
    inner: Mutex<ChannelInner>,
    /// Senders waiting on a full buffer
    not_full: Condvar,
    /// Receivers waiting on an empty buffer
    not_empty: Condvar,
    /// Rendezvous senders waiting for their value to be taken
    taken: Condvar,
}

struct ChannelInner {
    queue: VecDeque<(u64, Value)>,
    next_ticket: u64,
    closed: bool,
}

impl std::fmt::Debug for ChannelObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ChannelObject")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("length", &inner.queue.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

impl ChannelObject {
    /// Create a channel with the given buffer capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            inner: Mutex::new(ChannelInner {
                queue: VecDeque::new(),
                next_ticket: 0,
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            taken: Condvar::new(),
        }
    }

    /// Numeric id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued values
    pub fn length(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Check if the channel is closed
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Close the channel and wake every waiter
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] if the channel was already closed.
    pub fn close(&self) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(ChannelError::Closed);
        }
        inner.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
        self.taken.notify_all();
        log::debug!("channel {} closed", self.id);
        Ok(())
    }

    /// Enqueue a value, blocking while the buffer is full
    ///
    /// On an unbuffered channel this also waits until a receiver has taken
    /// the value.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] if the channel is closed before the
    /// value is accepted, or (unbuffered) before it is taken.
    pub fn deliver(&self, value: Value) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock();
        let slots = self.capacity.max(1);
        while inner.queue.len() >= slots && !inner.closed {
            self.not_full.wait(&mut inner);
        }
        if inner.closed {
            return Err(ChannelError::Closed);
        }

        let ticket = inner.next_ticket;
        inner.next_ticket += 1;
        inner.queue.push_back((ticket, value));
        self.not_empty.notify_one();

        if self.capacity > 0 {
            return Ok(());
        }

        while !inner.closed && inner.queue.iter().any(|(t, _)| *t == ticket) {
            self.taken.wait(&mut inner);
        }
        if let Some(pos) = inner.queue.iter().position(|(t, _)| *t == ticket) {
            inner.queue.remove(pos);
            return Err(ChannelError::Closed);
        }
        Ok(())
    }

    /// Dequeue a value, blocking while the buffer is empty
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] if the channel is closed and empty.
    pub fn receive(&self) -> Result<Value, ChannelError> {
        let mut inner = self.inner.lock();
        loop {
            if let Some((_, value)) = inner.queue.pop_front() {
                self.not_full.notify_one();
                if self.capacity == 0 {
                    self.taken.notify_all();
                }
                return Ok(value);
            }
            if inner.closed {
                return Err(ChannelError::Closed);
            }
            self.not_empty.wait(&mut inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_buffered_fifo() {
        let chan = ChannelObject::new(2);
        chan.deliver(Value::int(1)).unwrap();
        chan.deliver(Value::int(2)).unwrap();
        assert_eq!(chan.length(), 2);
        assert!(chan.receive().unwrap().equals(&Value::int(1)));
        assert!(chan.receive().unwrap().equals(&Value::int(2)));
    }

    #[test]
    fn test_rendezvous_blocks_until_taken() {
        let chan = Arc::new(ChannelObject::new(0));
        let sender = {
            let chan = chan.clone();
            thread::spawn(move || chan.deliver(Value::int(42)))
        };
        let value = chan.receive().unwrap();
        assert!(value.equals(&Value::int(42)));
        assert_eq!(sender.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_close_semantics() {
        let chan = ChannelObject::new(1);
        chan.deliver(Value::int(1)).unwrap();
        chan.close().unwrap();

        assert_eq!(chan.close(), Err(ChannelError::Closed));
        assert_eq!(chan.deliver(Value::int(2)), Err(ChannelError::Closed));
        assert!(chan.receive().unwrap().equals(&Value::int(1)));
        assert!(matches!(chan.receive(), Err(ChannelError::Closed)));
    }

    #[test]
    fn test_close_wakes_receiver() {
        let chan = Arc::new(ChannelObject::new(0));
        let receiver = {
            let chan = chan.clone();
            thread::spawn(move || chan.receive().is_err())
        };
        thread::sleep(std::time::Duration::from_millis(20));
        chan.close().unwrap();
        assert!(receiver.join().unwrap());
    }

    #[test]
    fn test_fan_in() {
        let chan = Arc::new(ChannelObject::new(0));
        for i in 0..100 {
            let chan = chan.clone();
            thread::spawn(move || chan.deliver(Value::int(i)));
        }
        let sum: i64 = (0..100)
            .map(|_| chan.receive().unwrap().as_int().unwrap())
            .sum();
        assert_eq!(sum, 4950);
    }
}
