// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Drivers that run a future to completion on the calling thread.

use std::future::Future;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::task::Context;
use std::task::Poll;

use futures::pin_mut;
use futures::task::noop_waker;
use futures::task::waker_ref;
use futures::task::ArcWake;

use crate::blocking::NeverBlocks;

// Waker data shared between the polling loop and anything the future hands
// its waker to. `notified` absorbs wakes that arrive while the loop is still
// inside `poll`, so a wake can never be lost between the poll returning
// `Pending` and the condvar wait starting.
struct WaitData {
    notified: Mutex<bool>,
    cv: Condvar,
}

impl ArcWake for WaitData {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        *arc_self.notified.lock().unwrap() = true;
        arc_self.cv.notify_all();
    }
}

/// Runs `future` to completion, blocking the current thread while it is
/// pending.
///
/// The future's waker is backed by a condition variable: whenever a poll
/// returns `Poll::Pending`, the thread sleeps until some clone of the waker
/// fires, then polls again. Spurious wakes cost one extra poll and nothing
/// else.
///
/// # Example
///
///    ```
///    use pollcoro::block_on;
///
///    let fut = async { 55 };
///    assert_eq!(55, block_on(fut));
///    ```
pub fn block_on<F: Future>(future: F) -> F::Output {
    pin_mut!(future);

    let wait_data = Arc::new(WaitData {
        notified: Mutex::new(false),
        cv: Condvar::new(),
    });

    loop {
        *wait_data.notified.lock().unwrap() = false;

        let waker = waker_ref(&wait_data);
        let mut cx = Context::from_waker(&waker);
        if let Poll::Ready(value) = future.as_mut().poll(&mut cx) {
            return value;
        }

        let mut notified = wait_data.notified.lock().unwrap();
        while !*notified {
            notified = wait_data.cv.wait(notified).unwrap();
        }
    }
}

/// Runs a statically non-blocking future without any synchronization.
///
/// Because `F: NeverBlocks` proves that no poll returns `Poll::Pending`, the
/// driver polls with the noop waker in a plain loop; the whole pipeline
/// reduces to straight-line code.
///
/// # Example
///
///    ```
///    use pollcoro::future::{ready, FutureExt};
///    use pollcoro::run_sync;
///
///    assert_eq!(12, run_sync(ready(6).map(|v| v * 2)));
///    ```
pub fn run_sync<F: Future + NeverBlocks>(future: F) -> F::Output {
    pin_mut!(future);

    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    loop {
        if let Poll::Ready(value) = future.as_mut().poll(&mut cx) {
            return value;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::future::yield_now;
    use crate::future::Yield;

    #[test]
    fn ready_value() {
        assert_eq!(block_on(async { 19 }), 19);
    }

    #[test]
    fn rescheduled_by_self_wake() {
        // Yield wakes its own waker on every pending poll, so the driver
        // must come back around without any external signal.
        block_on(async {
            yield_now().await;
            Yield::new(3).await;
        });
    }

    #[test]
    fn woken_from_another_thread() {
        let (tx, rx) = futures::channel::oneshot::channel();

        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(23u32).unwrap();
        });

        assert_eq!(block_on(async { rx.await.unwrap() }), 23);
        sender.join().unwrap();
    }

    #[test]
    fn run_sync_is_a_plain_loop() {
        assert_eq!(run_sync(crate::future::ready("done")), "done");
    }
}
