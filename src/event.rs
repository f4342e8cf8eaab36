// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! One-shot event: a value set once from anywhere, awaited once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::Waker;

use thiserror::Error as ThisError;

use crate::sync::SpinLock;

/// Error returned by [`EventSetter::set`] when the event was already set.
/// Carries the rejected value back to the caller.
#[derive(Debug, ThisError)]
#[error("single event already set")]
pub struct SetError<T>(pub T);

struct State<T> {
    value: Option<T>,
    waker: Option<Waker>,
    set: bool,
}

/// The awaitable half of a [`single_event`] pair. Resolves to the value
/// passed to [`EventSetter::set`].
///
/// The event is single-consumer: polling after it has resolved panics.
/// Dropping it unregisters any stored waker; a later `set` then completes
/// without waking anyone.
#[must_use = "futures do nothing unless polled"]
pub struct SingleEvent<T> {
    state: Arc<SpinLock<State<T>>>,
}

/// The setter half of a [`single_event`] pair. Cloneable and callable from
/// any thread.
pub struct EventSetter<T> {
    state: Arc<SpinLock<State<T>>>,
}

impl<T> Clone for EventSetter<T> {
    fn clone(&self) -> Self {
        EventSetter {
            state: self.state.clone(),
        }
    }
}

/// Creates a one-shot channel: a future and the setter that resolves it.
///
/// The first `set(v)` stores the value and fires the waker most recently
/// registered by the future; every later `set` fails with [`SetError`].
///
/// # Example
///
///    ```
///    use std::thread;
///    use pollcoro::{block_on, single_event};
///
///    let (event, setter) = single_event::<u32>();
///    let sender = thread::spawn(move || setter.set(42).unwrap());
///    assert_eq!(block_on(event), 42);
///    sender.join().unwrap();
///    ```
pub fn single_event<T>() -> (SingleEvent<T>, EventSetter<T>) {
    let state = Arc::new(SpinLock::new(State {
        value: None,
        waker: None,
        set: false,
    }));
    (
        SingleEvent {
            state: state.clone(),
        },
        EventSetter { state },
    )
}

impl<T> EventSetter<T> {
    /// Marks the event ready with `value` and wakes the registered waker.
    pub fn set(&self, value: T) -> Result<(), SetError<T>> {
        let waker = {
            let mut state = self.state.lock();
            if state.set {
                return Err(SetError(value));
            }
            state.set = true;
            state.value = Some(value);
            state.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }
}

impl<T> Future for SingleEvent<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<T> {
        let mut state = self.state.lock();
        if state.set {
            return Poll::Ready(
                state
                    .value
                    .take()
                    .expect("`SingleEvent` polled after completion"),
            );
        }

        // Register the most recently passed waker; skip the clone when it
        // would wake the same task as the one already stored.
        match &state.waker {
            Some(waker) if waker.will_wake(cx.waker()) => {}
            _ => state.waker = Some(cx.waker().clone()),
        }
        Poll::Pending
    }
}

impl<T> Drop for SingleEvent<T> {
    fn drop(&mut self) {
        self.state.lock().waker = None;
    }
}
