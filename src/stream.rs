// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Stream sources, adapters, and consumers.
//!
//! The asynchronous sequence concept is `futures::Stream`: `poll_next`
//! returns `Poll::Pending`, `Poll::Ready(Some(item))`, or `Poll::Ready(None)`
//! for the sticky end-of-stream state. This module provides the sources
//! ([`iter`], [`range`], [`repeat`], [`counter`], [`empty`]), the adapter
//! algebra as the [`StreamExt`] extension trait so pipelines read
//! left-to-right (`range(0, 100).map(|n| n * n).skip(5).take(10)`), and the
//! consumers that turn a stream into a future ([`StreamExt::next`],
//! [`StreamExt::fold`], [`StreamExt::last`], [`StreamExt::nth`],
//! [`StreamExt::collect`]).
//!
//! Every adapter polls its children with the caller's waker and owns no
//! synchronization; a pipeline built from non-blocking pieces proves
//! [`NeverBlocks`] and can be consumed as a plain iterator via
//! [`sync_iter`].

mod chain;
mod flatten;
mod fold;
mod map;
mod next;
mod skip;
mod sources;
mod take;
mod window;
mod zip;

pub use chain::Chain;
pub use flatten::Flatten;
pub use fold::Collect;
pub use fold::Fold;
pub use fold::Last;
pub use fold::Nth;
pub use map::Map;
pub use next::Next;
pub use skip::Skip;
pub use skip::SkipWhile;
pub use sources::counter;
pub use sources::empty;
pub use sources::iter;
pub use sources::pending_stream;
pub use sources::range;
pub use sources::range_to;
pub use sources::repeat;
pub use sources::Counter;
pub use sources::Empty;
pub use sources::Iter;
pub use sources::PendingStream;
pub use sources::Repeat;
pub use take::Take;
pub use take::TakeWhile;
pub use window::Window;
pub use zip::zip3;
pub use zip::zip4;
pub use zip::Enumerate;
pub use zip::Zip2;
pub use zip::Zip3;
pub use zip::Zip4;

pub use futures::Stream;

use std::task::Context;
use std::task::Poll;

use futures::task::noop_waker;

use crate::blocking::NeverBlocks;

/// Combinators for any `Stream`.
///
/// This intentionally shadows `futures::StreamExt` when imported: the
/// adapters here carry the crate's static blocking proof, which the upstream
/// ones cannot.
pub trait StreamExt: Stream {
    /// Transforms each element with `f`.
    fn map<F, U>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> U,
    {
        Map::new(self, f)
    }

    /// Forwards at most `count` elements, then reports end-of-stream.
    fn take(self, count: usize) -> Take<Self>
    where
        Self: Sized,
    {
        Take::new(self, count)
    }

    /// Discards the first `count` elements, then forwards the rest.
    fn skip(self, count: usize) -> Skip<Self>
    where
        Self: Sized,
    {
        Skip::new(self, count)
    }

    /// Forwards elements while `predicate` holds, then ends the stream at
    /// the first element that fails it (that element is consumed and
    /// dropped).
    fn take_while<P>(self, predicate: P) -> TakeWhile<Self, P>
    where
        Self: Sized,
        P: FnMut(&Self::Item) -> bool,
    {
        TakeWhile::new(self, predicate)
    }

    /// Discards the prefix of elements for which `predicate` holds; the
    /// first failing element and everything after it are forwarded.
    fn skip_while<P>(self, predicate: P) -> SkipWhile<Self, P>
    where
        Self: Sized,
        P: FnMut(&Self::Item) -> bool,
    {
        SkipWhile::new(self, predicate)
    }

    /// Drains this stream to completion, then drains `other`.
    fn chain<S>(self, other: S) -> Chain<Self, S>
    where
        Self: Sized,
        S: Stream<Item = Self::Item>,
    {
        Chain::new(self, other)
    }

    /// Flattens a stream of streams, draining each inner stream to
    /// end-of-stream before asking the outer stream for the next one.
    fn flatten(self) -> Flatten<Self>
    where
        Self: Sized,
        Self::Item: Stream,
    {
        Flatten::new(self)
    }

    /// Pairs this stream's elements with `other`'s; ends as soon as either
    /// side ends.
    fn zip<S>(self, other: S) -> Zip2<Self, S>
    where
        Self: Sized,
        S: Stream,
    {
        zip::zip2(self, other)
    }

    /// Pairs each element with its 0-based position.
    fn enumerate(self) -> Enumerate<Self>
    where
        Self: Sized,
    {
        Enumerate::new(self)
    }

    /// Groups consecutive elements into non-overlapping `[Item; N]` chunks.
    /// A partial chunk at end-of-stream is discarded.
    fn window<const N: usize>(self) -> Window<Self, N>
    where
        Self: Sized,
    {
        Window::new(self)
    }

    /// Resolves to the next element, or `None` at end-of-stream.
    fn next(&mut self) -> Next<'_, Self>
    where
        Self: Unpin,
    {
        Next::new(self)
    }

    /// Folds the stream into `init`. `step` mutates the accumulator and
    /// returns whether to keep going; returning `false` terminates the fold
    /// early. Resolves to the accumulator either way.
    fn fold<Acc, F>(self, init: Acc, step: F) -> Fold<Self, Acc, F>
    where
        Self: Sized,
        F: FnMut(&mut Acc, Self::Item) -> bool,
    {
        Fold::new(self, init, step)
    }

    /// Resolves to the final element, or `None` if the stream was empty.
    fn last(self) -> Last<Self>
    where
        Self: Sized,
    {
        Last::new(self)
    }

    /// Advances `n` elements and resolves to the `n`-th (so `nth(1)` is the
    /// next element), or `None` if the stream ends first. Because the stream
    /// is only borrowed, calling this repeatedly yields every `n`-th
    /// element.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    fn nth(&mut self, n: usize) -> Nth<'_, Self>
    where
        Self: Unpin,
    {
        Nth::new(self, n)
    }

    /// Drains the stream into a `Vec`.
    fn collect(self) -> Collect<Self>
    where
        Self: Sized,
    {
        Collect::new(self)
    }
}

impl<S: Stream + ?Sized> StreamExt for S {}

/// Iterator over a statically non-blocking stream.
///
/// See [`sync_iter`].
pub struct SyncIter<S> {
    stream: S,
}

impl<S: Stream + NeverBlocks + Unpin> Iterator for SyncIter<S> {
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        match std::pin::Pin::new(&mut self.stream).poll_next(&mut cx) {
            Poll::Ready(item) => item,
            Poll::Pending => unreachable!("non-blocking stream returned Poll::Pending"),
        }
    }
}

/// Consumes a statically non-blocking stream as a plain `Iterator`.
///
/// This is the stream-side counterpart of
/// [`run_sync`](crate::run_sync): the `NeverBlocks` proof lets the
/// entire pipeline run as a straight-line loop with no waker machinery.
///
/// # Example
///
///    ```
///    use pollcoro::stream::{range, sync_iter, StreamExt};
///
///    let squares: Vec<u32> = sync_iter(range(1u32, 100).map(|n| n * n).skip(5).take(3)).collect();
///    assert_eq!(squares, vec![36, 49, 64]);
///    ```
pub fn sync_iter<S: Stream + NeverBlocks + Unpin>(stream: S) -> SyncIter<S> {
    SyncIter { stream }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_on::block_on;
    use crate::block_on::run_sync;

    #[test]
    fn pipeline_reads_left_to_right() {
        let out: Vec<u32> = sync_iter(range(1u32, 100).map(|n| n * n).skip(5).take(10)).collect();
        assert_eq!(out, vec![36, 49, 64, 81, 100, 121, 144, 169, 196, 225]);
    }

    #[test]
    fn take_bounds_survive_intermediate_adapters() {
        // take(5) | map | take(3) lets at most min(5, 3) elements through.
        let out: Vec<u32> = sync_iter(counter().take(5).map(|n| n as u32).take(3)).collect();
        assert_eq!(out, vec![0, 1, 2]);
    }

    #[test]
    fn next_drains_in_order() {
        block_on(async {
            let mut s = iter(vec![1, 2, 3]);
            assert_eq!(s.next().await, Some(1));
            assert_eq!(s.next().await, Some(2));
            assert_eq!(s.next().await, Some(3));
            assert_eq!(s.next().await, None);
        });
    }

    #[test]
    fn fold_matches_synchronous_sum() {
        let sum = run_sync(range(1u32, 11).map(|n| n * n).fold(0u32, |acc, n| {
            *acc += n;
            true
        }));
        assert_eq!(sum, 385);
    }
}
