// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Terminal streams: deterministic sources that never block.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

use crate::blocking::NeverBlocks;

/// Stream over the elements of an iterator.
pub struct Iter<I> {
    iter: I,
}

impl<I> Unpin for Iter<I> {}

impl<I: Iterator> Stream for Iter<I> {
    type Item = I::Item;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context) -> Poll<Option<I::Item>> {
        Poll::Ready(self.iter.next())
    }
}

impl<I> NeverBlocks for Iter<I> {}

/// Creates a stream that yields the elements of `into_iter` and then ends.
pub fn iter<I: IntoIterator>(into_iter: I) -> Iter<I::IntoIter> {
    Iter {
        iter: into_iter.into_iter(),
    }
}

/// Creates a stream counting from `start` (inclusive) to `end` (exclusive).
pub fn range<T>(start: T, end: T) -> Iter<std::ops::Range<T>>
where
    std::ops::Range<T>: Iterator<Item = T>,
{
    iter(start..end)
}

/// Creates a stream counting from zero to `end` (exclusive).
pub fn range_to<T: Default>(end: T) -> Iter<std::ops::Range<T>>
where
    std::ops::Range<T>: Iterator<Item = T>,
{
    iter(T::default()..end)
}

/// Stream that repeats one value forever.
pub struct Repeat<T> {
    value: T,
}

impl<T> Unpin for Repeat<T> {}

impl<T: Clone> Stream for Repeat<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context) -> Poll<Option<T>> {
        Poll::Ready(Some(self.value.clone()))
    }
}

impl<T> NeverBlocks for Repeat<T> {}

/// Creates a stream that yields clones of `value` forever.
pub fn repeat<T: Clone>(value: T) -> Repeat<T> {
    Repeat { value }
}

/// Stream that is at end-of-stream from the start.
pub struct Empty<T>(PhantomData<T>);

impl<T> Unpin for Empty<T> {}

impl<T> Stream for Empty<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context) -> Poll<Option<T>> {
        Poll::Ready(None)
    }
}

impl<T> NeverBlocks for Empty<T> {}

/// Creates a stream that ends immediately.
pub fn empty<T>() -> Empty<T> {
    Empty(PhantomData)
}

/// Stream that never produces anything.
pub struct PendingStream<T>(PhantomData<T>);

impl<T> Unpin for PendingStream<T> {}

impl<T> Stream for PendingStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context) -> Poll<Option<T>> {
        Poll::Pending
    }
}

/// Creates a stream that always returns `Poll::Pending`.
pub fn pending_stream<T>() -> PendingStream<T> {
    PendingStream(PhantomData)
}

/// Infinite index stream: 0, 1, 2, …
///
/// Useful as a `zip` leg when positions are wanted alongside another
/// stream's elements.
pub struct Counter {
    index: usize,
}

impl Stream for Counter {
    type Item = usize;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context) -> Poll<Option<usize>> {
        let index = self.index;
        self.index += 1;
        Poll::Ready(Some(index))
    }
}

impl NeverBlocks for Counter {}

/// Creates the infinite 0, 1, 2, … stream.
pub fn counter() -> Counter {
    Counter { index: 0 }
}
