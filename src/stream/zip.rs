// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

// Need non-snake case so the macro can re-use type names for variables.
#![allow(non_snake_case)]

use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

use crate::blocking::NeverBlocks;

// Macro-generate the zip family. Every leg is polled on every call; a leg's
// last ready element stays buffered until all legs have one, at which point a
// single tuple is emitted and the buffers are cleared. As soon as any leg
// ends, the whole zip ends.
macro_rules! generate {
    ($(
        $(#[$doc:meta])*
        ($Zip:ident, $zip:ident, <$($St:ident),*>),
    )*) => ($(
        $(#[$doc])*
        pub struct $Zip<$($St: Stream),*> {
            $($St: ($St, Option<$St::Item>),)*
        }

        // Buffered elements are plain data; nothing observes their
        // addresses.
        impl<$($St: Stream + Unpin),*> Unpin for $Zip<$($St),*> {}

        impl<$($St: Stream + Unpin),*> Stream for $Zip<$($St),*> {
            type Item = ($($St::Item,)*);

            fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
                let this = &mut *self;

                let mut any_pending = false;
                $(
                    if this.$St.1.is_none() {
                        match Pin::new(&mut this.$St.0).poll_next(cx) {
                            Poll::Ready(Some(item)) => this.$St.1 = Some(item),
                            Poll::Ready(None) => return Poll::Ready(None),
                            Poll::Pending => any_pending = true,
                        }
                    }
                )*

                if any_pending {
                    return Poll::Pending;
                }

                Poll::Ready(Some(($(this.$St.1.take().unwrap(),)*)))
            }
        }

        impl<$($St: Stream + NeverBlocks),*> NeverBlocks for $Zip<$($St),*> {}

        $(#[$doc])*
        pub fn $zip<$($St: Stream),*>($($St: $St),*) -> $Zip<$($St),*> {
            $Zip {
                $($St: ($St, None),)*
            }
        }
    )*)
}

generate! {
    /// Stream for the [`StreamExt::zip`](crate::stream::StreamExt::zip)
    /// method.
    (Zip2, zip2, <_St1, _St2>),

    /// Zips three streams into a stream of triples.
    (Zip3, zip3, <_St1, _St2, _St3>),

    /// Zips four streams into a stream of quadruples.
    (Zip4, zip4, <_St1, _St2, _St3, _St4>),
}

/// Stream for the
/// [`StreamExt::enumerate`](crate::stream::StreamExt::enumerate) method.
pub struct Enumerate<S> {
    stream: S,
    index: usize,
}

impl<S> Enumerate<S> {
    pub(crate) fn new(stream: S) -> Enumerate<S> {
        Enumerate { stream, index: 0 }
    }
}

impl<S: Unpin> Unpin for Enumerate<S> {}

impl<S: Stream + Unpin> Stream for Enumerate<S> {
    type Item = (usize, S::Item);

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.stream).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                let index = self.index;
                self.index += 1;
                Poll::Ready(Some((index, item)))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: NeverBlocks> NeverBlocks for Enumerate<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_on::block_on;
    use crate::stream::counter;
    use crate::stream::iter;
    use crate::stream::range;
    use crate::stream::sync_iter;
    use crate::stream::StreamExt;

    #[test]
    fn shortest_leg_bounds_the_output() {
        let out: Vec<(u32, usize)> = sync_iter(range(0u32, 3).zip(counter())).collect();
        assert_eq!(out, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn zip3_emits_triples() {
        let out: Vec<(i32, i32, i32)> =
            sync_iter(zip3(range(0, 2), range(10, 12), range(20, 22))).collect();
        assert_eq!(out, vec![(0, 10, 20), (1, 11, 21)]);
    }

    // Pends once before every element it forwards.
    struct Stutter<S> {
        stream: S,
        armed: bool,
    }

    impl<S: Stream + Unpin> Stream for Stutter<S> {
        type Item = S::Item;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<S::Item>> {
            if !self.armed {
                self.armed = true;
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            self.armed = false;
            Pin::new(&mut self.stream).poll_next(cx)
        }
    }

    #[test]
    fn slow_leg_buffers_the_fast_ones() {
        // The second leg pends before each element; the first leg's elements
        // must wait in the buffer rather than being dropped or re-pulled.
        let slow = iter([10, 20]).zip(Stutter {
            stream: iter([1, 2]),
            armed: false,
        });
        let out: Vec<(i32, i32)> = block_on(slow.collect());
        assert_eq!(out, vec![(10, 1), (20, 2)]);
    }

    #[test]
    fn enumerate_pairs_position_first() {
        let words = vec!["apple", "banana", "cherry"];
        let out: Vec<(usize, &str)> = sync_iter(iter(words).enumerate()).collect();
        assert_eq!(out, vec![(0, "apple"), (1, "banana"), (2, "cherry")]);
    }
}
