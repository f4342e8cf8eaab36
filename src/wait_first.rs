// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

// Need non-snake case so the macro can re-use type names for variables.
#![allow(non_snake_case)]

//! Combinators that run several futures until the first one completes.
//!
//! Children are polled in declaration order on every poll and the first one
//! to come up ready wins, so the tie-break on a poll that readies several
//! children is always the lowest index. The result carries that 0-based
//! index. Losing children are not cancelled; they are dropped along with the
//! combinator.

use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use crate::blocking::NeverBlocks;

// Macro-generate the variadic combinators. All children must share one
// output type; the head of the list anchors it.
macro_rules! generate {
    ($(
        $(#[$doc:meta])*
        ($WaitFirst:ident, $wait_first:ident, <$FutA:ident $(, $Fut:ident)*>),
    )*) => ($(
        #[must_use = "futures do nothing unless polled"]
        pub struct $WaitFirst<$FutA: Future + Unpin $(, $Fut: Future<Output = $FutA::Output> + Unpin)*> {
            $FutA: $FutA,
            $($Fut: $Fut,)*
        }

        impl<$FutA: Future + Unpin $(, $Fut: Future<Output = $FutA::Output> + Unpin)*> Future
            for $WaitFirst<$FutA $(, $Fut)*>
        {
            type Output = ($FutA::Output, usize);

            fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
                let this = &mut *self;

                let mut index = 0;
                if let Poll::Ready(value) = Pin::new(&mut this.$FutA).poll(cx) {
                    return Poll::Ready((value, index));
                }
                $(
                    index += 1;
                    if let Poll::Ready(value) = Pin::new(&mut this.$Fut).poll(cx) {
                        return Poll::Ready((value, index));
                    }
                )*
                let _ = index;

                Poll::Pending
            }
        }

        impl<$FutA: Future + Unpin + NeverBlocks $(, $Fut: Future<Output = $FutA::Output> + Unpin + NeverBlocks)*>
            NeverBlocks for $WaitFirst<$FutA $(, $Fut)*> {}

        $(#[$doc])*
        pub fn $wait_first<$FutA: Future + Unpin $(, $Fut: Future<Output = $FutA::Output> + Unpin)*>(
            $FutA: $FutA,
            $($Fut: $Fut,)*
        ) -> $WaitFirst<$FutA $(, $Fut)*> {
            $WaitFirst {
                $FutA,
                $($Fut,)*
            }
        }
    )*)
}

generate! {
    /// Runs two futures until one completes, resolving to the winner's
    /// output and its 0-based position.
    ///
    ///  # Example
    ///
    ///    ```
    ///    use pollcoro::future::pending;
    ///    use pollcoro::{block_on, wait_first2};
    ///
    ///    let first = pending::<u32>();
    ///    let second = Box::pin(async { 6 });
    ///    assert_eq!(block_on(wait_first2(first, second)), (6, 1));
    ///    ```
    (WaitFirst2, wait_first2, <_Fut1, _Fut2>),

    /// Runs three futures until one completes, resolving to the winner's
    /// output and its 0-based position.
    (WaitFirst3, wait_first3, <_Fut1, _Fut2, _Fut3>),

    /// Runs four futures until one completes, resolving to the winner's
    /// output and its 0-based position.
    (WaitFirst4, wait_first4, <_Fut1, _Fut2, _Fut3, _Fut4>),

    /// Runs five futures until one completes, resolving to the winner's
    /// output and its 0-based position.
    (WaitFirst5, wait_first5, <_Fut1, _Fut2, _Fut3, _Fut4, _Fut5>),
}

/// Future for the [`wait_first_slice`] function.
#[must_use = "futures do nothing unless polled"]
pub struct WaitFirstSlice<'a, F: Future + Unpin> {
    futures: &'a mut [F],
}

/// Runs a homogeneous set of futures until one completes, resolving to the
/// winner's output and its 0-based index.
///
/// The slice is only borrowed, so the still-pending futures survive and can
/// be raced again.
pub fn wait_first_slice<F: Future + Unpin>(futures: &mut [F]) -> WaitFirstSlice<F> {
    WaitFirstSlice { futures }
}

impl<'a, F: Future + Unpin> Future for WaitFirstSlice<'a, F> {
    type Output = (F::Output, usize);

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        for (index, fut) in self.futures.iter_mut().enumerate() {
            if let Poll::Ready(value) = Pin::new(fut).poll(cx) {
                return Poll::Ready((value, index));
            }
        }
        Poll::Pending
    }
}

impl<'a, F: Future + Unpin + NeverBlocks> NeverBlocks for WaitFirstSlice<'a, F> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_on::block_on;
    use crate::future::pending;
    use crate::future::ready;
    use crate::future::FutureExt;
    use crate::future::Yield;

    #[test]
    fn lowest_index_wins_a_tied_poll() {
        let out = block_on(wait_first3(ready(10), ready(20), ready(30)));
        assert_eq!(out, (10, 0));
    }

    #[test]
    fn earliest_ready_wins() {
        // Readiness after 1, 5 and 3 polls respectively; the first child
        // resolves first even though it is not the fastest to be constructed.
        let out = block_on(wait_first3(
            Yield::new(0).map(|()| 20),
            Yield::new(4).map(|()| 10),
            Yield::new(2).map(|()| 30),
        ));
        assert_eq!(out, (20, 0));
    }

    #[test]
    fn pending_children_are_skipped() {
        let out = block_on(wait_first2(pending::<u32>(), ready(6)));
        assert_eq!(out, (6, 1));
    }

    #[test]
    fn slice_leaves_losers_pollable() {
        let mut futures: Vec<_> = [(3, 1u32), (0, 2u32)]
            .into_iter()
            .map(|(polls, value)| Yield::new(polls).map(move |()| value))
            .collect();

        let (value, index) = block_on(wait_first_slice(&mut futures));
        assert_eq!((value, index), (2, 1));

        // The loser is still pending and can be driven on its own.
        let (value, index) = block_on(wait_first_slice(&mut futures[..1]));
        assert_eq!((value, index), (1, 0));
    }
}
