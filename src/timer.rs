// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Timed sleeps over a user-supplied timer backend.
//!
//! The library owns no clock and no timer thread. Anything that can report
//! the current time and invoke a callback at a deadline can drive
//! [`sleep_until`] / [`sleep_for`]; timeouts are then ordinary composition:
//! `wait_first2(task, sleep_for(timeout, timer))`.

use std::future::Future;
use std::ops::Add;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::Waker;
use std::time::Duration;

use crate::sync::SpinLock;

/// A timer backend.
///
/// `register_callback` arranges for `callback` to be invoked once `now()`
/// reaches `deadline`; from which thread is the backend's business. The
/// callback must be invoked at most once.
pub trait Timer {
    type Instant: Copy + Ord + Add<Duration, Output = Self::Instant>;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Schedules `callback` to run at `deadline`.
    fn register_callback(&self, deadline: Self::Instant, callback: Box<dyn FnOnce() + Send>);
}

/// Future for the [`sleep_until`] and [`sleep_for`] functions.
///
/// The backend callback is registered on the first poll that observes the
/// deadline still ahead; it fires the most recently registered waker through
/// shared state. Dropping the future disarms that state, so a late callback
/// finds nothing to wake.
#[must_use = "futures do nothing unless polled"]
pub struct Sleep<T: Timer> {
    timer: T,
    deadline: T::Instant,
    shared: Arc<SpinLock<Option<Waker>>>,
    started: bool,
}

// Neither the timer object nor the instant is ever pinned.
impl<T: Timer> Unpin for Sleep<T> {}

impl<T: Timer> Future for Sleep<T> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<()> {
        if self.timer.now() >= self.deadline {
            return Poll::Ready(());
        }

        *self.shared.lock() = Some(cx.waker().clone());

        if !self.started {
            self.started = true;
            let shared = self.shared.clone();
            let deadline = self.deadline;
            self.timer.register_callback(
                deadline,
                Box::new(move || {
                    let waker = shared.lock().take();
                    if let Some(waker) = waker {
                        waker.wake();
                    }
                }),
            );
        }

        Poll::Pending
    }
}

impl<T: Timer> Drop for Sleep<T> {
    fn drop(&mut self) {
        self.shared.lock().take();
    }
}

/// Creates a future that resolves once `timer` reaches `deadline`.
pub fn sleep_until<T: Timer>(deadline: T::Instant, timer: T) -> Sleep<T> {
    Sleep {
        timer,
        deadline,
        shared: Arc::new(SpinLock::new(None)),
        started: false,
    }
}

/// Creates a future that resolves once `duration` has elapsed on `timer`.
pub fn sleep_for<T: Timer>(duration: Duration, timer: T) -> Sleep<T> {
    let deadline = timer.now() + duration;
    sleep_until(deadline, timer)
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;
    use crate::block_on::block_on;
    use crate::future::pending;
    use crate::future::FutureExt;
    use crate::wait_first::wait_first2;

    // Backend that parks a thread per registered callback. Good enough for
    // tests; a real reactor would multiplex.
    #[derive(Clone)]
    struct ThreadTimer;

    impl Timer for ThreadTimer {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        fn register_callback(&self, deadline: Instant, callback: Box<dyn FnOnce() + Send>) {
            thread::spawn(move || {
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                }
                callback();
            });
        }
    }

    #[test]
    fn elapsed_deadline_is_ready_immediately() {
        let timer = ThreadTimer;
        let deadline = timer.now();
        block_on(sleep_until(deadline, timer));
    }

    #[test]
    fn sleep_for_wakes_the_driver() {
        let timer = ThreadTimer;
        let start = Instant::now();
        block_on(sleep_for(Duration::from_millis(30), timer));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn timeout_by_composition() {
        // A never-finishing task loses to the deadline.
        let timeout = sleep_for(Duration::from_millis(20), ThreadTimer).map(|()| 0u32);

        let (value, index) = block_on(wait_first2(pending::<u32>(), timeout));
        assert_eq!((value, index), (0, 1));
    }
}
