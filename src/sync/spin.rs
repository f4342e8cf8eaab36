// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::cell::UnsafeCell;
use std::hint;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

const UNLOCKED: bool = false;
const LOCKED: bool = true;

/// A primitive that provides safe, mutable access to a shared resource.
///
/// Unlike [`Mutex`](crate::sync::Mutex), a `SpinLock` will not voluntarily
/// yield its CPU time until the resource is available and will instead keep
/// spinning until the resource is acquired. For the vast majority of cases
/// the async `Mutex` is the better choice; the spin lock exists to guard the
/// short, non-blocking critical sections inside the library itself (waiter
/// queues, one-shot event state). Never hold a `SpinLockGuard` across a
/// suspension point.
///
/// # Poisoning
///
/// This `SpinLock` does not implement lock poisoning so it is possible for
/// threads to access poisoned data if a thread panics while holding the
/// lock.
#[repr(align(128))]
pub struct SpinLock<T: ?Sized> {
    lock: AtomicBool,
    value: UnsafeCell<T>,
}

impl<T> SpinLock<T> {
    /// Creates a new, unlocked `SpinLock` that's ready for use.
    pub fn new(value: T) -> SpinLock<T> {
        SpinLock {
            lock: AtomicBool::new(UNLOCKED),
            value: UnsafeCell::new(value),
        }
    }

    /// Consumes the `SpinLock` and returns the value guarded by it. This
    /// method doesn't perform any locking as the compiler guarantees that
    /// there are no other references to `self`.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    /// Acquires exclusive, mutable access to the resource protected by the
    /// `SpinLock`, spinning until it is able to do so. Attempting to call
    /// `lock` while already holding the `SpinLock` will cause a deadlock.
    pub fn lock(&self) -> SpinLockGuard<T> {
        loop {
            let state = self.lock.load(Ordering::Relaxed);
            if state == UNLOCKED
                && self
                    .lock
                    .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                break;
            }
            hint::spin_loop();
        }

        SpinLockGuard {
            lock: self,
            // SAFETY:
            // Acquiring `lock` gives exclusive access to `value` until the
            // guard is dropped.
            value: unsafe { &mut *self.value.get() },
        }
    }

    fn unlock(&self) {
        // Don't need to compare and swap because we exclusively hold the lock.
        self.lock.store(UNLOCKED, Ordering::Release);
    }

    /// Returns a mutable reference to the contained value. This method
    /// doesn't perform any locking as the compiler statically guarantees
    /// that there are no other references to `self`.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY:
        // `&mut self` proves there are no other references to the value, so
        // no locking is needed.
        unsafe { &mut *self.value.get() }
    }
}

// SAFETY:
// The lock serializes all access to the inner value, so sharing a
// `SpinLock<T>` across threads is no more capable than sending the `T`.
unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
// SAFETY:
// See above; `&SpinLock<T>` only hands out the value under the lock.
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T: ?Sized + Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

/// An RAII implementation of a "scoped lock" for a `SpinLock`. When this
/// structure is dropped, the lock will be released. The resource protected
/// by the `SpinLock` can be accessed via the `Deref` and `DerefMut`
/// implementations of this structure.
pub struct SpinLockGuard<'a, T: 'a + ?Sized> {
    lock: &'a SpinLock<T>,
    value: &'a mut T,
}

impl<'a, T: ?Sized> Deref for SpinLockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.value
    }
}

impl<'a, T: ?Sized> DerefMut for SpinLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value
    }
}

impl<'a, T: ?Sized> Drop for SpinLockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
