// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

use crate::blocking::NeverBlocks;

/// Stream for the [`StreamExt::take`](crate::stream::StreamExt::take)
/// method.
pub struct Take<S> {
    stream: S,
    remaining: usize,
}

impl<S> Take<S> {
    pub(crate) fn new(stream: S, count: usize) -> Take<S> {
        Take {
            stream,
            remaining: count,
        }
    }
}

impl<S: Unpin> Unpin for Take<S> {}

impl<S: Stream + Unpin> Stream for Take<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<S::Item>> {
        if self.remaining == 0 {
            return Poll::Ready(None);
        }
        let state = Pin::new(&mut self.stream).poll_next(cx);
        if let Poll::Ready(Some(_)) = state {
            self.remaining -= 1;
        }
        state
    }
}

impl<S: NeverBlocks> NeverBlocks for Take<S> {}

/// Stream for the
/// [`StreamExt::take_while`](crate::stream::StreamExt::take_while) method.
pub struct TakeWhile<S, P> {
    stream: S,
    predicate: P,
    done: bool,
}

impl<S, P> TakeWhile<S, P> {
    pub(crate) fn new(stream: S, predicate: P) -> TakeWhile<S, P> {
        TakeWhile {
            stream,
            predicate,
            done: false,
        }
    }
}

impl<S: Unpin, P> Unpin for TakeWhile<S, P> {}

impl<S, P> Stream for TakeWhile<S, P>
where
    S: Stream + Unpin,
    P: FnMut(&S::Item) -> bool,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<S::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        let this = &mut *self;
        match Pin::new(&mut this.stream).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                if (this.predicate)(&item) {
                    Poll::Ready(Some(item))
                } else {
                    // The failing element is consumed and dropped.
                    this.done = true;
                    Poll::Ready(None)
                }
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: NeverBlocks, P> NeverBlocks for TakeWhile<S, P> {}
