//! Observable state cells.
//!
//! [`StateCell`] is the crate's single-writer, multi-reader state
//! primitive: connection state, application state, and per-group property
//! lists are all published through it.  Writers replace the value
//! wholesale; readers either snapshot it ([`StateCell::get`]) or await
//! changes through a [`Watcher`].
//!
//! ```text
//!  writer ──set()──▶ ┌───────────┐ ──get()───▶ reader
//!                    │ StateCell │
//!                    └───────────┘ ──changed()─▶ any number of Watchers
//! ```
//!
//! Change detection is version-based: every `set` bumps a counter and
//! wakes all registered wakers, so a watcher that was busy between two
//! rapid updates still observes the latest value (intermediate values may
//! be skipped — state cells are not queues).

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Poll, Waker};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

struct Inner<T> {
    value: T,
    version: u64,
    wakers: Vec<Waker>,
}

/// A single observable value.
///
/// Cheap to read, safe to share across threads (`critical-section`
/// backed).  Cloned snapshots are handed out; the stored value is never
/// mutated in place while readers hold it.
pub struct StateCell<T> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<T>>>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                value: initial,
                version: 0,
                wakers: Vec::new(),
            })),
        }
    }

    /// Publish a new value and wake every watcher.
    pub fn set(&self, value: T) {
        let wakers = self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            inner.value = value;
            inner.version = inner.version.wrapping_add(1);
            core::mem::take(&mut inner.wakers)
        });
        for waker in wakers {
            waker.wake();
        }
    }

    /// Snapshot the current value.
    pub fn get(&self) -> T {
        self.inner.lock(|cell| cell.borrow().value.clone())
    }

    /// Create a watcher positioned at the current version: its first
    /// `changed()` resolves on the next `set`.
    pub fn watch(&self) -> Watcher<'_, T> {
        let seen = self.inner.lock(|cell| cell.borrow().version);
        Watcher { cell: self, seen }
    }

    fn snapshot(&self) -> (T, u64) {
        self.inner
            .lock(|cell| (cell.borrow().value.clone(), cell.borrow().version))
    }
}

impl<T: Clone + PartialEq> StateCell<T> {
    /// Publish only if the value differs from the stored one.
    pub fn set_if_changed(&self, value: T) {
        let changed = self.inner.lock(|cell| cell.borrow().value != value);
        if changed {
            self.set(value);
        }
    }
}

/// Awaits changes on a [`StateCell`].
///
/// Each watcher tracks the last version it observed, so edges that occur
/// while the watcher is not being polled are never lost.
pub struct Watcher<'a, T> {
    cell: &'a StateCell<T>,
    seen: u64,
}

impl<T: Clone> Watcher<'_, T> {
    /// Wait for the next published value after the last one seen.
    pub async fn changed(&mut self) -> T {
        poll_fn(|cx| {
            self.cell.inner.lock(|cell| {
                let mut inner = cell.borrow_mut();
                if inner.version != self.seen {
                    self.seen = inner.version;
                    Poll::Ready(inner.value.clone())
                } else {
                    if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                        inner.wakers.push(cx.waker().clone());
                    }
                    Poll::Pending
                }
            })
        })
        .await
    }

    /// Wait until the value satisfies `pred`, checking the current value
    /// first so an already-satisfied state resolves immediately.
    pub async fn until(&mut self, mut pred: impl FnMut(&T) -> bool) -> T {
        let (current, version) = self.cell.snapshot();
        self.seen = version;
        if pred(&current) {
            return current;
        }
        loop {
            let value = self.changed().await;
            if pred(&value) {
                return value;
            }
        }
    }
}
