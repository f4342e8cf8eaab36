// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

use crate::blocking::NeverBlocks;

/// Stream for the [`StreamExt::skip`](crate::stream::StreamExt::skip)
/// method.
pub struct Skip<S> {
    stream: S,
    remaining: usize,
}

impl<S> Skip<S> {
    pub(crate) fn new(stream: S, count: usize) -> Skip<S> {
        Skip {
            stream,
            remaining: count,
        }
    }
}

impl<S: Unpin> Unpin for Skip<S> {}

impl<S: Stream + Unpin> Stream for Skip<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<S::Item>> {
        loop {
            match Pin::new(&mut self.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    if self.remaining == 0 {
                        return Poll::Ready(Some(item));
                    }
                    self.remaining -= 1;
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S: NeverBlocks> NeverBlocks for Skip<S> {}

/// Stream for the
/// [`StreamExt::skip_while`](crate::stream::StreamExt::skip_while) method.
pub struct SkipWhile<S, P> {
    stream: S,
    predicate: P,
    skipping: bool,
}

impl<S, P> SkipWhile<S, P> {
    pub(crate) fn new(stream: S, predicate: P) -> SkipWhile<S, P> {
        SkipWhile {
            stream,
            predicate,
            skipping: true,
        }
    }
}

impl<S: Unpin, P> Unpin for SkipWhile<S, P> {}

impl<S, P> Stream for SkipWhile<S, P>
where
    S: Stream + Unpin,
    P: FnMut(&S::Item) -> bool,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<S::Item>> {
        let this = &mut *self;
        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    if this.skipping && (this.predicate)(&item) {
                        continue;
                    }
                    this.skipping = false;
                    return Poll::Ready(Some(item));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S: NeverBlocks, P> NeverBlocks for SkipWhile<S, P> {}

#[cfg(test)]
mod tests {
    use crate::stream::iter;
    use crate::stream::range;
    use crate::stream::sync_iter;
    use crate::stream::StreamExt;

    #[test]
    fn skip_drops_the_prefix() {
        let out: Vec<u32> = sync_iter(range(0u32, 6).skip(4)).collect();
        assert_eq!(out, vec![4, 5]);
    }

    #[test]
    fn skip_past_the_end_is_empty() {
        let out: Vec<u32> = sync_iter(range(0u32, 3).skip(10)).collect();
        assert_eq!(out, Vec::<u32>::new());
    }

    #[test]
    fn skip_while_stops_skipping_at_first_failure() {
        // Once an element fails the predicate, later passing elements flow
        // through untouched.
        let out: Vec<i32> = sync_iter(iter([1, 2, 9, 1, 2]).skip_while(|&n| n < 5)).collect();
        assert_eq!(out, vec![9, 1, 2]);
    }
}
