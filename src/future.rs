// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Terminal futures and future adapters.
//!
//! These are the future-side leaves of the combinator algebra: values that
//! are always ready, never ready, or ready after a fixed number of polls,
//! plus the `map` transformation. Stream-side equivalents live in the
//! [`stream`](crate::stream) module.

use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use crate::blocking::NeverBlocks;

/// A future that resolves to `value` on its first poll.
pub struct Ready<T>(Option<T>);

// The stored value is only ever moved out, never pinned.
impl<T> Unpin for Ready<T> {}

impl<T> Future for Ready<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context) -> Poll<T> {
        Poll::Ready(self.0.take().expect("`Ready` polled after completion"))
    }
}

impl<T> NeverBlocks for Ready<T> {}

/// Creates a future that is immediately ready with `value`.
pub fn ready<T>(value: T) -> Ready<T> {
    Ready(Some(value))
}

/// A future that never completes.
pub struct Pending<T>(std::marker::PhantomData<T>);

impl<T> Unpin for Pending<T> {}

impl<T> Future for Pending<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context) -> Poll<T> {
        Poll::Pending
    }
}

/// Creates a future that always returns `Poll::Pending`.
pub fn pending<T>() -> Pending<T> {
    Pending(std::marker::PhantomData)
}

/// A future that reschedules itself a fixed number of times before
/// completing.
///
/// Each pending poll wakes the passed waker before returning, so a driver
/// that honors the wakeup protocol immediately re-polls. `Yield::new(n)`
/// returns `Poll::Pending` exactly `n` times. This gives cooperative tasks a
/// way to hand the thread back to whatever is driving them.
pub struct Yield {
    remaining: u32,
}

impl Yield {
    pub fn new(remaining: u32) -> Yield {
        Yield { remaining }
    }
}

impl Future for Yield {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<()> {
        if self.remaining == 0 {
            return Poll::Ready(());
        }
        self.remaining -= 1;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Yields to the driver once before proceeding.
pub fn yield_now() -> Yield {
    Yield::new(1)
}

/// Future for the [`FutureExt::map`] method.
pub struct Map<F, G> {
    future: F,
    f: Option<G>,
}

impl<F, G> Unpin for Map<F, G> where F: Unpin {}

impl<F, G, U> Future for Map<F, G>
where
    F: Future + Unpin,
    G: FnOnce(F::Output) -> U,
{
    type Output = U;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<U> {
        match Pin::new(&mut self.future).poll(cx) {
            Poll::Ready(v) => {
                let f = self.f.take().expect("`Map` polled after completion");
                Poll::Ready(f(v))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<F: NeverBlocks, G> NeverBlocks for Map<F, G> {}

/// Adapters for any `Future`, in the spirit of `futures::FutureExt` but
/// carrying this crate's static blocking proof through the combinators.
pub trait FutureExt: Future {
    /// Transforms the output of this future with `f` once it resolves.
    fn map<G, U>(self, f: G) -> Map<Self, G>
    where
        Self: Sized,
        G: FnOnce(Self::Output) -> U,
    {
        Map {
            future: self,
            f: Some(f),
        }
    }
}

impl<F: Future + ?Sized> FutureExt for F {}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use futures::task::waker_ref;
    use futures::task::ArcWake;

    use super::*;
    use crate::block_on::block_on;
    use crate::block_on::run_sync;

    struct CountingWaker(AtomicUsize);
    impl ArcWake for CountingWaker {
        fn wake_by_ref(arc_self: &Arc<Self>) {
            arc_self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn ready_resolves_synchronously() {
        assert_eq!(run_sync(ready(17)), 17);
    }

    #[test]
    fn map_applies_on_ready() {
        assert_eq!(run_sync(ready(6).map(|v| v * 7)), 42);
    }

    #[test]
    fn yield_pends_n_times() {
        let count = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = waker_ref(&count);
        let mut cx = Context::from_waker(&waker);

        let mut y = Yield::new(3);
        for _ in 0..3 {
            assert_eq!(Pin::new(&mut y).poll(&mut cx), Poll::Pending);
        }
        assert_eq!(Pin::new(&mut y).poll(&mut cx), Poll::Ready(()));

        // Every pending poll must have rescheduled us.
        assert_eq!(count.0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn yield_completes_under_driver() {
        block_on(Yield::new(5));
    }
}
