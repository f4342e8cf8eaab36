// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Bridges between the poll world and callback-driven execution.
//!
//! [`make_pollable`] turns a completion-callback operation into a future:
//! the operation is started immediately and handed a thread-safe
//! [`Completion`] handle; the returned future polls the shared state the
//! handle fills in.
//!
//! [`make_resumable`] is the inverse: it drives a future as a
//! callback-world computation. Every poll happens on the supplied
//! [`Scheduler`]; when a pending poll's waker later fires, the next poll is
//! marshalled back onto the scheduler, and completion invokes a caller-
//! provided callback. An atomic flag coalesces concurrent wakes so a single
//! re-poll is in flight at a time.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::task::Context;
use std::task::Poll;

use crate::event::single_event;
use crate::event::EventSetter;
use crate::event::SingleEvent;
use crate::sync::SpinLock;
use crate::waker::new_waker;
use crate::waker::WeakWake;

/// One-shot completion handle passed to the operation started by
/// [`make_pollable`]. Consume it with [`Completion::complete`] from any
/// thread.
pub struct Completion<T> {
    setter: EventSetter<T>,
}

impl<T> Completion<T> {
    /// Stores the operation's result and wakes the future returned by
    /// [`make_pollable`].
    pub fn complete(self, value: T) {
        // The handle is consumed, so this is the only set.
        let _ = self.setter.set(value);
    }
}

/// Adapts a completion-callback operation into a future.
///
/// `start` runs immediately (the operation is in flight before the first
/// poll, mirroring eager callback APIs) and receives the [`Completion`] to
/// invoke when the result is available.
///
/// # Example
///
///    ```
///    use std::thread;
///    use pollcoro::{block_on, make_pollable};
///
///    let fut = make_pollable(|completion| {
///        thread::spawn(move || completion.complete(7u32));
///    });
///    assert_eq!(block_on(fut), 7);
///    ```
pub fn make_pollable<T, F>(start: F) -> SingleEvent<T>
where
    F: FnOnce(Completion<T>),
{
    let (event, setter) = single_event();
    start(Completion { setter });
    event
}

/// An executor surface for [`make_resumable`]: anything that can run a
/// closure later, on whatever thread it owns.
pub trait Scheduler: Send + Sync + 'static {
    /// Enqueues `f` to run on the scheduler's executor. Implementations
    /// should not invoke `f` synchronously inside this call.
    fn schedule(&self, f: Box<dyn FnOnce() + Send>);
}

// Shared driver state for one adapted future. The waker handed to the
// future holds only a `Weak` of this, so wakes that outlive the computation
// are no-ops; the closures queued on the scheduler hold a strong reference,
// which is what keeps the computation alive until it completes.
struct DriverCore<F: Future, S> {
    future: SpinLock<Option<F>>,
    on_complete: SpinLock<Option<Box<dyn FnOnce(F::Output) + Send>>>,
    scheduler: S,
    // Set while a poll is queued on the scheduler; coalesces wakes.
    scheduled: AtomicBool,
    // Set when a wake arrived while the future was checked out for polling.
    missed: AtomicBool,
}

impl<F, S> DriverCore<F, S>
where
    F: Future + Unpin + Send + 'static,
    F::Output: Send,
    S: Scheduler,
{
    fn schedule_poll(this: &Arc<Self>) {
        if !this.scheduled.swap(true, Ordering::AcqRel) {
            let core = this.clone();
            this.scheduler
                .schedule(Box::new(move || DriverCore::step(&core)));
        }
    }

    fn step(this: &Arc<Self>) {
        this.scheduled.store(false, Ordering::Release);

        // Check the future out of the slot so the poll runs without holding
        // the spin lock; user polls can take arbitrarily long.
        let Some(mut future) = this.future.lock().take() else {
            // Another step has the future out; tell it a wake landed.
            this.missed.store(true, Ordering::Release);
            return;
        };

        let waker = new_waker(Arc::downgrade(this));
        let mut cx = Context::from_waker(&waker);
        match Pin::new(&mut future).poll(&mut cx) {
            Poll::Ready(value) => {
                let on_complete = this.on_complete.lock().take();
                if let Some(on_complete) = on_complete {
                    on_complete(value);
                }
            }
            Poll::Pending => {
                *this.future.lock() = Some(future);
                if this.missed.swap(false, Ordering::AcqRel) {
                    DriverCore::schedule_poll(this);
                }
            }
        }
    }
}

impl<F, S> WeakWake for DriverCore<F, S>
where
    F: Future + Unpin + Send + 'static,
    F::Output: Send,
    S: Scheduler,
{
    fn wake_by_ref(weak_self: &Weak<Self>) {
        if let Some(core) = weak_self.upgrade() {
            DriverCore::schedule_poll(&core);
        }
    }
}

/// A future packaged for callback-driven execution. See [`make_resumable`].
pub struct Resumable<F: Future, S> {
    core: Arc<DriverCore<F, S>>,
}

impl<F, S> Resumable<F, S>
where
    F: Future + Unpin + Send + 'static,
    F::Output: Send,
    S: Scheduler,
{
    /// Begins driving the future on the scheduler. `on_complete` is invoked
    /// with the output, on whichever scheduler thread runs the final poll.
    pub fn start(self, on_complete: impl FnOnce(F::Output) + Send + 'static) {
        *self.core.on_complete.lock() = Some(Box::new(on_complete));
        DriverCore::schedule_poll(&self.core);
    }
}

/// Packages `future` to run on `scheduler` as a callback-world computation.
///
/// Nothing happens until [`Resumable::start`]; dropping the `Resumable`
/// before then abandons the future.
pub fn make_resumable<F, S>(future: F, scheduler: S) -> Resumable<F, S>
where
    F: Future + Unpin + Send + 'static,
    F::Output: Send,
    S: Scheduler,
{
    Resumable {
        core: Arc::new(DriverCore {
            future: SpinLock::new(Some(future)),
            on_complete: SpinLock::new(None),
            scheduler,
            scheduled: AtomicBool::new(false),
            missed: AtomicBool::new(false),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use super::*;
    use crate::block_on::block_on;
    use crate::future::Yield;

    // Runs each closure on a fresh thread. Crude, but queueing: nothing runs
    // inside `schedule` itself.
    struct SpawnScheduler;

    impl Scheduler for SpawnScheduler {
        fn schedule(&self, f: Box<dyn FnOnce() + Send>) {
            thread::spawn(f);
        }
    }

    #[test]
    fn make_pollable_resolves_to_the_completed_value() {
        let fut = make_pollable(|completion| {
            thread::spawn(move || completion.complete(11u32));
        });
        assert_eq!(block_on(fut), 11);
    }

    #[test]
    fn make_pollable_synchronous_completion() {
        let fut = make_pollable(|completion| completion.complete("now"));
        assert_eq!(block_on(fut), "now");
    }

    #[test]
    fn make_resumable_drives_self_waking_futures() {
        // Yield wakes its own waker on every pending poll; each wake must be
        // marshalled back through the scheduler until completion.
        let (tx, rx) = mpsc::channel();
        make_resumable(Yield::new(5), SpawnScheduler).start(move |()| tx.send(()).unwrap());
        rx.recv().unwrap();
    }

    #[test]
    fn unstarted_resumable_abandons_the_future() {
        let resumable = make_resumable(Yield::new(1), SpawnScheduler);
        drop(resumable);
    }

    #[test]
    fn round_trip_preserves_the_result() {
        // make_pollable(make_resumable(f)) runs f through an extra hop but
        // must preserve the final value.
        let inner = Box::pin(async { 2 + 3 });
        let fut = make_pollable(|completion| {
            make_resumable(inner, SpawnScheduler).start(move |v| completion.complete(v));
        });
        assert_eq!(block_on(fut), 5);
    }
}
