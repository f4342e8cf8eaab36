// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::cell::UnsafeCell;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;

use crate::sync::waiter::Kind as WaiterKind;
use crate::sync::waiter::Waiter;
use crate::sync::waiter::WaiterAdapter;
use crate::sync::waiter::WaiterList;
use crate::sync::waiter::WaitingFor;
use crate::sync::SpinLock;

// Lock state and the single FIFO waiter queue (readers and writers mixed, in
// arrival order), guarded together by one spin lock.
//
// Admission policy: readers may share; a queued writer blocks every reader
// behind it (`writers_queued` gates the reader fast path, and queue order
// holds back readers that are already waiting); a writer is admitted only
// when no writer holds the lock and the reader count is zero.
//
// Invariant: the queue is non-empty only while the lock is held in some
// mode. Every release and every queue edit runs `collect_wake_batch`, which
// hands ownership to the waiters it dequeues before they are woken.
struct State {
    writer: bool,
    readers: usize,
    writers_queued: usize,
    waiters: WaiterList,
}

// Scans the queue and dequeues the waiters that now own the lock, updating
// the lock mode to account for them. Returns the batch to wake after the
// spin lock is released.
//
// If the head waiter is a writer it is admitted alone, and only once the
// reader count has drained to zero. If the head is a reader, the leading run
// of readers is admitted with it, stopping at the first queued writer:
// readers behind that writer stay parked until it has held and released the
// lock, so a queued writer is never starved by readers that arrived after
// it.
fn collect_wake_batch(state: &mut State) -> WaiterList {
    let mut batch = WaiterList::new(WaiterAdapter::new());

    if state.writer {
        return batch;
    }

    let front_is_writer = match state.waiters.front().get() {
        Some(w) => w.kind() == WaiterKind::Exclusive,
        None => return batch,
    };

    if front_is_writer {
        if state.readers == 0 {
            let waiter = state.waiters.pop_front().unwrap();
            waiter.set_waiting_for(WaitingFor::None);
            state.writer = true;
            state.writers_queued -= 1;
            batch.push_back(waiter);
        }
        return batch;
    }

    // Admit the leading run of readers, up to the first queued writer.
    let mut cursor = state.waiters.front_mut();
    while let Some(w) = cursor.get() {
        if w.kind() != WaiterKind::Shared {
            break;
        }
        let waiter = cursor.remove().unwrap();
        waiter.set_waiting_for(WaitingFor::None);
        state.readers += 1;
        batch.push_back(waiter);
    }

    batch
}

pub(crate) struct RawSharedMutex {
    state: SpinLock<State>,
}

impl RawSharedMutex {
    pub fn new() -> RawSharedMutex {
        RawSharedMutex {
            state: SpinLock::new(State {
                writer: false,
                readers: 0,
                writers_queued: 0,
                waiters: WaiterList::new(WaiterAdapter::new()),
            }),
        }
    }

    pub async fn lock(&self) {
        let waiter = {
            let mut state = self.state.lock();
            if !state.writer && state.readers == 0 {
                // The queue is necessarily empty here (see the invariant on
                // `State`), so this cannot overtake an earlier waiter.
                state.writer = true;
                return;
            }

            let waiter = Arc::new(Waiter::new(
                WaiterKind::Exclusive,
                cancel_waiter,
                self as *const RawSharedMutex as usize,
                WaitingFor::SharedMutex,
            ));
            state.waiters.push_back(waiter.clone());
            state.writers_queued += 1;
            waiter
        };

        waiter.wait().await;
    }

    pub async fn lock_shared(&self) {
        let waiter = {
            let mut state = self.state.lock();
            if !state.writer && state.writers_queued == 0 {
                state.readers += 1;
                return;
            }

            let waiter = Arc::new(Waiter::new(
                WaiterKind::Shared,
                cancel_waiter,
                self as *const RawSharedMutex as usize,
                WaitingFor::SharedMutex,
            ));
            state.waiters.push_back(waiter.clone());
            waiter
        };

        waiter.wait().await;
    }

    pub fn try_lock(&self) -> bool {
        let mut state = self.state.lock();
        if !state.writer && state.readers == 0 {
            state.writer = true;
            true
        } else {
            false
        }
    }

    pub fn try_lock_shared(&self) -> bool {
        let mut state = self.state.lock();
        if !state.writer && state.writers_queued == 0 {
            state.readers += 1;
            true
        } else {
            false
        }
    }

    pub fn unlock(&self) {
        let batch = {
            let mut state = self.state.lock();
            debug_assert!(state.writer, "`unlock` called without write lock held");
            state.writer = false;
            collect_wake_batch(&mut state)
        };

        wake_all(batch);
    }

    pub fn unlock_shared(&self) {
        let batch = {
            let mut state = self.state.lock();
            debug_assert!(
                state.readers > 0,
                "`unlock_shared` called without read lock held"
            );
            state.readers -= 1;
            if state.readers == 0 {
                collect_wake_batch(&mut state)
            } else {
                WaiterList::new(WaiterAdapter::new())
            }
        };

        wake_all(batch);
    }

    fn cancel_waiter(&self, waiter: &Waiter, _woken: bool) {
        let batch = {
            let mut state = self.state.lock();

            if waiter.is_linked() && waiter.is_waiting_for() == WaitingFor::SharedMutex {
                // Still queued; unlink. Removing a queued writer can unblock
                // the readers behind it, so recompute the wake batch either
                // way.
                //
                // SAFETY:
                // The waiter is linked and waiting for this lock, so it is
                // in `state.waiters`, and the spin lock gives exclusive
                // access to that list.
                let mut cursor = unsafe {
                    state
                        .waiters
                        .cursor_mut_from_ptr(waiter as *const Waiter)
                };
                cursor.remove();
                if waiter.kind() == WaiterKind::Exclusive {
                    state.writers_queued -= 1;
                }
            } else {
                // Already dequeued by a wake batch: this waiter owns the
                // lock in its mode. Release that ownership on its behalf.
                match waiter.kind() {
                    WaiterKind::Exclusive => state.writer = false,
                    WaiterKind::Shared => state.readers -= 1,
                }
            }

            collect_wake_batch(&mut state)
        };

        wake_all(batch);
    }
}

fn wake_all(batch: WaiterList) {
    for waiter in batch {
        waiter.wake();
    }
}

// SAFETY:
// All mutable state is guarded by the internal spin lock.
unsafe impl Send for RawSharedMutex {}
// SAFETY:
// See above.
unsafe impl Sync for RawSharedMutex {}

fn cancel_waiter(raw: usize, waiter: &Waiter, woken: bool) {
    let raw_shared_mutex = raw as *const RawSharedMutex;

    // SAFETY:
    // The owner of the waiter being canceled also holds a reference to the
    // lock, so the pointer is valid for the duration of this call.
    unsafe { (*raw_shared_mutex).cancel_waiter(waiter, woken) }
}

/// An asynchronous reader-writer lock.
///
/// `lock_shared()` admits any number of concurrent readers; `lock()` grants
/// exclusive access. Once a writer is queued, readers that arrive after it
/// wait their turn behind it, so writers cannot starve; releasing admits the
/// leading run of waiting readers together. Writers are admitted only when
/// the reader count has drained to zero.
///
/// Like [`Mutex`](crate::sync::Mutex), guards may be held across suspension
/// points and releasing does not care which thread does it.
pub struct SharedMutex<T: ?Sized> {
    raw: RawSharedMutex,
    value: UnsafeCell<T>,
}

impl<T> SharedMutex<T> {
    /// Creates a new, unlocked `SharedMutex` ready for use.
    pub fn new(v: T) -> SharedMutex<T> {
        SharedMutex {
            raw: RawSharedMutex::new(),
            value: UnsafeCell::new(v),
        }
    }

    /// Consumes the `SharedMutex` and returns the contained value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: ?Sized> SharedMutex<T> {
    /// Acquires exclusive, mutable access to the resource, suspending the
    /// current task until no reader or writer holds the lock.
    pub async fn lock(&self) -> SharedMutexWriteGuard<'_, T> {
        self.raw.lock().await;

        SharedMutexWriteGuard {
            mu: self,
            // SAFETY:
            // The raw lock is held in write mode, giving exclusive access.
            value: unsafe { &mut *self.value.get() },
        }
    }

    /// Acquires shared, immutable access to the resource, suspending the
    /// current task while a writer holds or is queued for the lock.
    pub async fn lock_shared(&self) -> SharedMutexReadGuard<'_, T> {
        self.raw.lock_shared().await;

        SharedMutexReadGuard {
            mu: self,
            // SAFETY:
            // The raw lock is held in read mode; writers are excluded until
            // every read guard is gone.
            value: unsafe { &*self.value.get() },
        }
    }

    /// Attempts to acquire exclusive access without waiting.
    pub fn try_lock(&self) -> Option<SharedMutexWriteGuard<'_, T>> {
        if !self.raw.try_lock() {
            return None;
        }

        Some(SharedMutexWriteGuard {
            mu: self,
            // SAFETY:
            // `try_lock` succeeded, giving exclusive access.
            value: unsafe { &mut *self.value.get() },
        })
    }

    /// Attempts to acquire shared access without waiting.
    pub fn try_lock_shared(&self) -> Option<SharedMutexReadGuard<'_, T>> {
        if !self.raw.try_lock_shared() {
            return None;
        }

        Some(SharedMutexReadGuard {
            mu: self,
            // SAFETY:
            // `try_lock_shared` succeeded; see `lock_shared`.
            value: unsafe { &*self.value.get() },
        })
    }

    /// Returns a mutable reference to the contained value without locking.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY:
        // The compiler statically guarantees there are no other references
        // to `self`.
        unsafe { &mut *self.value.get() }
    }
}

// SAFETY:
// The lock serializes writes and readers only see the value while no writer
// holds it.
unsafe impl<T: ?Sized + Send> Send for SharedMutex<T> {}
// SAFETY:
// Readers share `&T` concurrently, so `T: Sync` is required on top of
// `T: Send`.
unsafe impl<T: ?Sized + Send + Sync> Sync for SharedMutex<T> {}

impl<T: ?Sized + Default> Default for SharedMutex<T> {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl<T> From<T> for SharedMutex<T> {
    fn from(source: T) -> Self {
        Self::new(source)
    }
}

/// RAII guard for exclusive access to a `SharedMutex`.
pub struct SharedMutexWriteGuard<'a, T: ?Sized + 'a> {
    mu: &'a SharedMutex<T>,
    value: &'a mut T,
}

impl<'a, T: ?Sized> SharedMutexWriteGuard<'a, T> {
    /// Releases the lock before the guard would go out of scope.
    pub fn unlock(self) {}
}

impl<'a, T: ?Sized> Deref for SharedMutexWriteGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value
    }
}

impl<'a, T: ?Sized> DerefMut for SharedMutexWriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value
    }
}

impl<'a, T: ?Sized> Drop for SharedMutexWriteGuard<'a, T> {
    fn drop(&mut self) {
        self.mu.raw.unlock()
    }
}

/// RAII guard for shared access to a `SharedMutex`.
pub struct SharedMutexReadGuard<'a, T: ?Sized + 'a> {
    mu: &'a SharedMutex<T>,
    value: &'a T,
}

impl<'a, T: ?Sized> SharedMutexReadGuard<'a, T> {
    /// Releases the lock before the guard would go out of scope.
    pub fn unlock(self) {}
}

impl<'a, T: ?Sized> Deref for SharedMutexReadGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value
    }
}

impl<'a, T: ?Sized> Drop for SharedMutexReadGuard<'a, T> {
    fn drop(&mut self) {
        self.mu.raw.unlock_shared()
    }
}
