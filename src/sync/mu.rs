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

// Lock state and waiter queue, guarded together by one spin lock.
//
// Invariant: `waiters` is non-empty only while `locked` is true. `unlock`
// never releases the lock while the queue is non-empty; it pops the head and
// hands ownership over instead. This is what makes the FIFO guarantee
// observable: a later `lock` call can never barge in through the fast path
// because the lock is, as far as its state is concerned, still held.
struct State {
    locked: bool,
    waiters: WaiterList,
}

pub(crate) struct RawMutex {
    state: SpinLock<State>,
}

impl RawMutex {
    pub fn new() -> RawMutex {
        RawMutex {
            state: SpinLock::new(State {
                locked: false,
                waiters: WaiterList::new(WaiterAdapter::new()),
            }),
        }
    }

    pub async fn lock(&self) {
        let waiter = {
            let mut state = self.state.lock();
            if !state.locked {
                state.locked = true;
                return;
            }

            let waiter = Arc::new(Waiter::new(
                WaiterKind::Exclusive,
                cancel_waiter,
                self as *const RawMutex as usize,
                WaitingFor::Mutex,
            ));
            state.waiters.push_back(waiter.clone());
            waiter
        };

        // Queued. By the time the wake fires, `unlock` has already
        // transferred ownership to us, so there is nothing left to acquire.
        waiter.wait().await;
    }

    pub fn try_lock(&self) -> bool {
        let mut state = self.state.lock();
        if state.locked {
            false
        } else {
            state.locked = true;
            true
        }
    }

    pub fn unlock(&self) {
        let next = {
            let mut state = self.state.lock();
            debug_assert!(state.locked, "`unlock` called on unlocked mutex");

            match state.waiters.pop_front() {
                Some(waiter) => {
                    // Hand the lock to the head waiter: `locked` stays set.
                    waiter.set_waiting_for(WaitingFor::None);
                    Some(waiter)
                }
                None => {
                    state.locked = false;
                    None
                }
            }
        };

        if let Some(waiter) = next {
            waiter.wake();
        }
    }

    fn cancel_waiter(&self, waiter: &Waiter, _woken: bool) {
        let next = {
            let mut state = self.state.lock();

            if waiter.is_linked() && waiter.is_waiting_for() == WaitingFor::Mutex {
                // Still queued; unlink and the lock never belonged to us.
                //
                // SAFETY:
                // The waiter is linked and waiting for this mutex, so it is
                // in `state.waiters`, and the spin lock gives exclusive
                // access to that list.
                let mut cursor = unsafe {
                    state
                        .waiters
                        .cursor_mut_from_ptr(waiter as *const Waiter)
                };
                cursor.remove();
                None
            } else {
                // Already dequeued by `unlock`, which means ownership was
                // transferred to this waiter. Pass it on.
                match state.waiters.pop_front() {
                    Some(next) => {
                        next.set_waiting_for(WaitingFor::None);
                        Some(next)
                    }
                    None => {
                        state.locked = false;
                        None
                    }
                }
            }
        };

        if let Some(waiter) = next {
            waiter.wake();
        }
    }
}

// SAFETY:
// All mutable state is guarded by the internal spin lock.
unsafe impl Send for RawMutex {}
// SAFETY:
// See above.
unsafe impl Sync for RawMutex {}

fn cancel_waiter(raw: usize, waiter: &Waiter, woken: bool) {
    let raw_mutex = raw as *const RawMutex;

    // SAFETY:
    // The owner of the waiter being canceled also holds a reference to the
    // mutex, so the pointer is valid for the duration of this call.
    unsafe { (*raw_mutex).cancel_waiter(waiter, woken) }
}

/// An asynchronous mutex with strict FIFO fairness.
///
/// `lock()` returns a future resolving to an RAII guard. An acquisition that
/// cannot proceed immediately enqueues itself on its first poll; releasing
/// the lock hands it directly to the head of the queue, so acquisitions
/// complete in the order their futures were first polled and a fresh caller
/// can never barge past a waiter.
///
/// Unlike a `std::sync::Mutex`, the guard may be held across suspension
/// points: release does not care which thread polls the releasing future.
///
/// # Poisoning
///
/// Lock poisoning is not supported; a panic while the lock is held leaves
/// the data accessible to other tasks.
///
/// # Examples
///
/// ```edition2021
/// use std::sync::Arc;
/// use std::thread;
/// use std::sync::mpsc::channel;
///
/// use pollcoro::block_on;
/// use pollcoro::sync::Mutex;
///
/// const N: usize = 10;
///
/// // Spawn a few threads to increment a shared variable (non-atomically),
/// // and let the main thread know once all increments are done.
/// let data = Arc::new(Mutex::new(0));
///
/// let (tx, rx) = channel();
/// for _ in 0..N {
///     let (data, tx) = (Arc::clone(&data), tx.clone());
///     thread::spawn(move || {
///         // The shared state can only be accessed once the lock is held.
///         let mut data = block_on(data.lock());
///         *data += 1;
///         if *data == N {
///             tx.send(()).unwrap();
///         }
///         // the lock is unlocked here when `data` goes out of scope.
///     });
/// }
///
/// rx.recv().unwrap();
/// ```
#[repr(align(128))]
pub struct Mutex<T: ?Sized> {
    raw: RawMutex,
    value: UnsafeCell<T>,
}

impl<T> Mutex<T> {
    /// Creates a new, unlocked `Mutex` ready for use.
    pub fn new(v: T) -> Mutex<T> {
        Mutex {
            raw: RawMutex::new(),
            value: UnsafeCell::new(v),
        }
    }

    /// Consumes the `Mutex` and returns the contained value. No locking is
    /// performed: ownership of `self` proves there are no outstanding
    /// guards.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires exclusive access to the resource protected by the `Mutex`,
    /// suspending the current task until it is able to do so. The `Mutex` is
    /// released when the returned `MutexGuard` is dropped.
    ///
    /// Calling `lock()` while already holding a `MutexGuard` for this mutex
    /// from the same task will deadlock.
    ///
    /// Callers that are not in an async context may wish to use
    /// [`block_on`](crate::block_on) to wait for the lock.
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        self.raw.lock().await;

        MutexGuard {
            mu: self,
            // SAFETY:
            // The raw lock was just acquired, giving exclusive access.
            value: unsafe { &mut *self.value.get() },
        }
    }

    /// Attempts to acquire the lock without waiting. Returns `None` if the
    /// lock is currently held.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        if !self.raw.try_lock() {
            return None;
        }

        Some(MutexGuard {
            mu: self,
            // SAFETY:
            // `try_lock` succeeded, giving exclusive access.
            value: unsafe { &mut *self.value.get() },
        })
    }

    /// Returns a mutable reference to the contained value. No locking is
    /// performed: `&mut self` proves there are no outstanding guards.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY:
        // The compiler statically guarantees there are no other references
        // to `self`.
        unsafe { &mut *self.value.get() }
    }
}

// SAFETY:
// The lock serializes all access to the inner value.
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
// SAFETY:
// See above.
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T: ?Sized + Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl<T> From<T> for Mutex<T> {
    fn from(source: T) -> Self {
        Self::new(source)
    }
}

/// An RAII implementation of a "scoped lock" for a `Mutex`. When this
/// structure is dropped, the lock will be released. The resource protected
/// by the `Mutex` can be accessed via the `Deref` and `DerefMut`
/// implementations of this structure.
pub struct MutexGuard<'a, T: ?Sized + 'a> {
    mu: &'a Mutex<T>,
    value: &'a mut T,
}

impl<'a, T: ?Sized> MutexGuard<'a, T> {
    /// Releases the lock before the guard would go out of scope.
    pub fn unlock(self) {
        // Dropping does the release.
    }
}

impl<'a, T: ?Sized> Deref for MutexGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value
    }
}

impl<'a, T: ?Sized> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value
    }
}

impl<'a, T: ?Sized> Drop for MutexGuard<'a, T> {
    fn drop(&mut self) {
        self.mu.raw.unlock()
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::mem;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::task::Context;
    use std::task::Poll;
    use std::thread;

    use futures::task::noop_waker;
    use futures_executor::LocalPool;
    use futures_util::task::LocalSpawnExt;

    use super::*;
    use crate::block_on::block_on;
    use crate::future::yield_now;
    use crate::wait_all::wait_all3;

    #[derive(Debug, Eq, PartialEq)]
    struct NonCopy(u32);

    #[test]
    fn it_works() {
        let mu = Mutex::new(NonCopy(13));

        assert_eq!(*block_on(mu.lock()), NonCopy(13));
    }

    #[test]
    fn smoke() {
        let mu = Mutex::new(NonCopy(7));

        mem::drop(block_on(mu.lock()));
        mem::drop(block_on(mu.lock()));
    }

    #[test]
    fn try_lock() {
        let mu = Mutex::new(NonCopy(1));

        {
            let guard = mu.try_lock().expect("failed to acquire free mutex");
            assert!(mu.try_lock().is_none());
            drop(guard);
        }

        assert!(mu.try_lock().is_some());
    }

    #[test]
    fn explicit_unlock() {
        let mu = Mutex::new(0u32);

        let guard = block_on(mu.lock());
        guard.unlock();

        assert!(mu.try_lock().is_some());
    }

    #[test]
    fn send() {
        let mu = Mutex::new(NonCopy(19));

        thread::spawn(move || {
            let value = block_on(mu.lock());
            assert_eq!(*value, NonCopy(19));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn interleaved_increments() {
        async fn increment(mu: Rc<Mutex<usize>>, times: usize) {
            for _ in 0..times {
                let mut count = mu.lock().await;
                let old = *count;
                // Hold the lock across a suspension point.
                yield_now().await;
                *count = old + 1;
            }
        }

        let mu = Rc::new(Mutex::new(0));

        let mut ex = LocalPool::new();
        let spawner = ex.spawner();
        for _ in 0..3 {
            spawner
                .spawn_local(increment(Rc::clone(&mu), 3))
                .expect("failed to spawn future");
        }

        ex.run();
        assert_eq!(*block_on(mu.lock()), 9);
    }

    #[test]
    fn fifo_order() {
        let mu = Arc::new(Mutex::new(Vec::new()));

        async fn stamp(mu: Arc<Mutex<Vec<u32>>>, id: u32) {
            mu.lock().await.push(id);
        }

        let holder = block_on(mu.lock());

        let mut t1 = Box::pin(stamp(Arc::clone(&mu), 1));
        let mut t2 = Box::pin(stamp(Arc::clone(&mu), 2));
        let mut t3 = Box::pin(stamp(Arc::clone(&mu), 3));

        // Poll once each while the lock is held so they queue in order.
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert_eq!(t1.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(t2.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(t3.as_mut().poll(&mut cx), Poll::Pending);

        drop(holder);

        // Driving them in reverse order must still admit them in queue
        // order: t3 and t2 cannot finish until their predecessors have.
        assert_eq!(t3.as_mut().poll(&mut cx), Poll::Pending);
        block_on(t1);
        assert_eq!(t3.as_mut().poll(&mut cx), Poll::Pending);
        block_on(t2);
        block_on(t3);

        assert_eq!(*block_on(mu.lock()), vec![1, 2, 3]);
    }

    #[test]
    fn dropped_waiter_passes_the_lock_on() {
        let mu = Arc::new(Mutex::new(()));

        let holder = block_on(mu.lock());

        let mut w1 = Box::pin(Arc::clone(&mu).lock_owned_for_test());
        let mut w2 = Box::pin(Arc::clone(&mu).lock_owned_for_test());

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(w1.as_mut().poll(&mut cx).is_pending());
        assert!(w2.as_mut().poll(&mut cx).is_pending());

        // Unlock hands ownership to w1; dropping w1 without polling it must
        // pass the lock to w2 rather than leaving it stuck.
        drop(holder);
        drop(w1);

        assert!(w2.as_mut().poll(&mut cx).is_ready());
    }

    impl Mutex<()> {
        // Owned variant so the test can drop the future independently of the
        // mutex borrow.
        async fn lock_owned_for_test(self: Arc<Self>) {
            self.raw.lock().await;
            // Leak the raw acquisition into an immediate unlock so the state
            // stays balanced when this future completes.
            self.raw.unlock();
        }
    }

    #[test]
    fn high_contention() {
        const THREADS: usize = 17;
        const ITERATIONS: usize = 103;

        let mut threads = Vec::with_capacity(THREADS);

        let mu = Arc::new(Mutex::new(0usize));
        for _ in 0..THREADS {
            let mu2 = mu.clone();
            threads.push(thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    *block_on(mu2.lock()) += 1;
                }
            }));
        }

        for t in threads.into_iter() {
            t.join().unwrap();
        }

        assert_eq!(*block_on(mu.lock()), THREADS * ITERATIONS);
    }

    #[test]
    fn increments_under_wait_all() {
        async fn add(mu: &Mutex<u32>, n: u32) {
            for _ in 0..n {
                let mut count = mu.lock().await;
                let old = *count;
                yield_now().await;
                *count = old + 1;
            }
        }

        let mu = Mutex::new(0);
        block_on(wait_all3(
            Box::pin(add(&mu, 3)),
            Box::pin(add(&mu, 3)),
            Box::pin(add(&mu, 3)),
        ));

        assert_eq!(mu.into_inner(), 9);
    }
}
