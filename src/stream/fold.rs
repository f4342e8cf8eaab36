// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Futures that consume a whole stream: fold, last, nth, collect.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

use crate::blocking::NeverBlocks;

/// Future for the [`StreamExt::fold`](crate::stream::StreamExt::fold)
/// method.
#[must_use = "futures do nothing unless polled"]
pub struct Fold<S, Acc, F> {
    stream: S,
    acc: Option<Acc>,
    step: F,
}

impl<S, Acc, F> Fold<S, Acc, F> {
    pub(crate) fn new(stream: S, init: Acc, step: F) -> Fold<S, Acc, F> {
        Fold {
            stream,
            acc: Some(init),
            step,
        }
    }
}

impl<S: Unpin, Acc, F> Unpin for Fold<S, Acc, F> {}

impl<S, Acc, F> Future for Fold<S, Acc, F>
where
    S: Stream + Unpin,
    F: FnMut(&mut Acc, S::Item) -> bool,
{
    type Output = Acc;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Acc> {
        let this = &mut *self;
        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    let acc = this.acc.as_mut().expect("`fold` polled after completion");
                    if !(this.step)(acc, item) {
                        return Poll::Ready(this.acc.take().unwrap());
                    }
                }
                Poll::Ready(None) => {
                    return Poll::Ready(this.acc.take().expect("`fold` polled after completion"));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S: NeverBlocks, Acc, F> NeverBlocks for Fold<S, Acc, F> {}

/// Future for the [`StreamExt::last`](crate::stream::StreamExt::last)
/// method.
#[must_use = "futures do nothing unless polled"]
pub struct Last<S: Stream> {
    stream: S,
    last: Option<S::Item>,
}

impl<S: Stream> Last<S> {
    pub(crate) fn new(stream: S) -> Last<S> {
        Last { stream, last: None }
    }
}

impl<S: Stream + Unpin> Unpin for Last<S> {}

impl<S: Stream + Unpin> Future for Last<S> {
    type Output = Option<S::Item>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<S::Item>> {
        let this = &mut *self;
        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => this.last = Some(item),
                Poll::Ready(None) => return Poll::Ready(this.last.take()),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S: Stream + NeverBlocks> NeverBlocks for Last<S> {}

/// Future for the [`StreamExt::nth`](crate::stream::StreamExt::nth) method.
#[must_use = "futures do nothing unless polled"]
pub struct Nth<'a, S: ?Sized> {
    stream: &'a mut S,
    remaining: usize,
}

impl<'a, S: ?Sized> Nth<'a, S> {
    pub(crate) fn new(stream: &'a mut S, n: usize) -> Nth<'a, S> {
        assert!(n > 0, "`nth` requires a positive element count");
        Nth {
            stream,
            remaining: n,
        }
    }
}

impl<'a, S: Stream + Unpin + ?Sized> Future for Nth<'a, S> {
    type Output = Option<S::Item>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<S::Item>> {
        let this = &mut *self;
        loop {
            match Pin::new(&mut *this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    this.remaining -= 1;
                    if this.remaining == 0 {
                        return Poll::Ready(Some(item));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<'a, S: NeverBlocks + ?Sized> NeverBlocks for Nth<'a, S> {}

/// Future for the [`StreamExt::collect`](crate::stream::StreamExt::collect)
/// method.
#[must_use = "futures do nothing unless polled"]
pub struct Collect<S: Stream> {
    stream: S,
    items: Vec<S::Item>,
}

impl<S: Stream> Collect<S> {
    pub(crate) fn new(stream: S) -> Collect<S> {
        Collect {
            stream,
            items: Vec::new(),
        }
    }
}

impl<S: Stream + Unpin> Unpin for Collect<S> {}

impl<S: Stream + Unpin> Future for Collect<S> {
    type Output = Vec<S::Item>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Vec<S::Item>> {
        let this = &mut *self;
        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => this.items.push(item),
                Poll::Ready(None) => return Poll::Ready(mem::take(&mut this.items)),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S: Stream + NeverBlocks> NeverBlocks for Collect<S> {}

#[cfg(test)]
mod tests {
    use crate::block_on::run_sync;
    use crate::stream::iter;
    use crate::stream::range;
    use crate::stream::StreamExt;

    #[test]
    fn fold_sums_a_finite_stream() {
        let sum = run_sync(range(0u64, 101).fold(0u64, |acc, v| {
            *acc += v;
            true
        }));
        assert_eq!(sum, 5050);
    }

    #[test]
    fn fold_terminates_early_when_step_says_stop() {
        // Summing 0.. stops once the accumulator reaches 50; 0+1+..+10 = 55.
        let sum = run_sync(range(0u32, 10000).fold(0u32, |acc, v| {
            *acc += v;
            *acc < 50
        }));
        assert_eq!(sum, 55);
    }

    #[test]
    fn last_of_empty_stream_is_none() {
        assert_eq!(run_sync(range(0, 0).last()), None);
        assert_eq!(run_sync(range(0, 5).last()), Some(4));
    }

    #[test]
    fn nth_counts_from_one_and_repeats() {
        let mut s = range(10u32, 20);
        assert_eq!(run_sync(s.nth(1)), Some(10));
        assert_eq!(run_sync(s.nth(3)), Some(13));
        assert_eq!(run_sync(s.nth(3)), Some(16));
        assert_eq!(run_sync(s.nth(100)), None);
    }

    #[test]
    fn collect_drains_to_a_vec() {
        assert_eq!(run_sync(iter([3, 1, 4]).collect()), vec![3, 1, 4]);
    }
}
