//! Single assignment value handed from the UI thread to the protocol thread

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug)]
enum Slot<T> {
    Pending,
    Delivered(T),
    Cancelled,
}

/// Value that is delivered once and read any number of times
///
/// Readers block until a value is delivered or the promise is cancelled.
pub struct Promise<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T: Clone> Promise<T> {
    /// Empty promise
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
            ready: Condvar::new(),
        }
    }

    /// Deliver the value and wake all readers
    ///
    /// Fails with [`Error::AlreadyDelivered`] on a second delivery and with
    /// [`Error::Cancelled`] after a cancel; the stored state is left unchanged.
    pub fn deliver(&self, value: T) -> Result<()> {
        let mut slot = self.slot.lock();
        match &*slot {
            Slot::Pending => {}
            Slot::Delivered(_) => {
                debug!("Rejecting second delivery to promise");
                return Err(Error::AlreadyDelivered);
            }
            Slot::Cancelled => return Err(Error::Cancelled),
        }
        *slot = Slot::Delivered(value);
        self.ready.notify_all();
        Ok(())
    }

    /// Cancel the promise and wake all readers
    ///
    /// Returns `false` if a value was already delivered or the promise was already cancelled.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Cancelled;
            self.ready.notify_all();
            true
        } else {
            false
        }
    }

    /// Wait for the value
    pub fn deref(&self) -> Result<T> {
        let mut slot = self.slot.lock();
        loop {
            match &*slot {
                Slot::Pending => self.ready.wait(&mut slot),
                Slot::Delivered(value) => return Ok(value.clone()),
                Slot::Cancelled => return Err(Error::Cancelled),
            }
        }
    }

    /// Wait for the value at most `timeout`
    ///
    /// Returns `Ok(None)` when the time ran out.
    pub fn deref_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while matches!(*slot, Slot::Pending) {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        match &*slot {
            Slot::Pending => Ok(None),
            Slot::Delivered(value) => Ok(Some(value.clone())),
            Slot::Cancelled => Err(Error::Cancelled),
        }
    }

    /// The value, if already delivered
    pub fn try_deref(&self) -> Option<T> {
        match &*self.slot.lock() {
            Slot::Delivered(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Whether a value was delivered
    pub fn is_delivered(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Delivered(_))
    }

    /// Whether the promise was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Cancelled)
    }
}

impl<T: Clone> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.slot.lock() {
            Slot::Pending => "pending",
            Slot::Delivered(_) => "delivered",
            Slot::Cancelled => "cancelled",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_deliver_once_read_many() {
        let promise = Promise::new();
        assert_eq!(promise.try_deref(), None);
        assert!(!promise.is_delivered());

        promise.deliver(7u32).unwrap();
        assert_eq!(promise.deliver(8), Err(Error::AlreadyDelivered));
        assert_eq!(promise.deref(), Ok(7));
        assert_eq!(promise.deref(), Ok(7));
        assert_eq!(promise.try_deref(), Some(7));
        assert!(!promise.cancel());
        assert!(promise.is_delivered());
    }

    #[test]
    fn test_blocking_reader_is_woken() {
        let promise = Arc::new(Promise::new());
        let readers: Vec<_> = (0..3)
            .map(|_| {
                let promise = promise.clone();
                thread::spawn(move || promise.deref())
            })
            .collect();

        promise.deliver("done".to_string()).unwrap();
        for reader in readers {
            assert_eq!(reader.join().unwrap(), Ok("done".to_string()));
        }
    }

    #[test]
    fn test_cancel() {
        let promise = Arc::new(Promise::<u8>::new());
        let reader = {
            let promise = promise.clone();
            thread::spawn(move || promise.deref())
        };
        assert!(promise.cancel());
        assert_eq!(reader.join().unwrap(), Err(Error::Cancelled));

        assert!(promise.is_cancelled());
        assert_eq!(promise.deliver(1), Err(Error::Cancelled));
        assert_eq!(promise.deref_timeout(Duration::from_millis(1)), Err(Error::Cancelled));
    }

    #[test]
    fn test_deref_timeout() {
        let promise = Promise::<u8>::new();
        assert_eq!(promise.deref_timeout(Duration::from_millis(10)), Ok(None));
        promise.deliver(3).unwrap();
        assert_eq!(promise.deref_timeout(Duration::from_millis(10)), Ok(Some(3)));
    }
}
