// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Synchronization primitives that are safe to hold across suspension
//! points.
//!
//! A conventional blocking mutex cannot be used in async code: the thread
//! that eventually releases it may not be the thread that acquired it, and
//! holding one across a `Pending` poll parks the whole thread. The
//! primitives here queue wakers instead of threads: an acquisition that
//! cannot proceed registers a waiter node and returns `Pending`; releasing
//! hands the lock over and fires the head waiter.

mod mu;
mod rwlock;
mod spin;
mod waiter;

pub use mu::Mutex;
pub use mu::MutexGuard;
pub use rwlock::SharedMutex;
pub use rwlock::SharedMutexReadGuard;
pub use rwlock::SharedMutexWriteGuard;
pub use spin::SpinLock;
pub use spin::SpinLockGuard;
