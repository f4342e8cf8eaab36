// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

// Need non-snake case so the macro can re-use type names for variables.
#![allow(non_snake_case)]

//! Combinators that run several futures until all of them complete.
//!
//! On every poll each still-pending child is polled in declaration order;
//! results are cached as children finish, so a child is never polled after it
//! has produced its output. The combinator resolves once every child has.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use crate::blocking::NeverBlocks;

// A child future or its cached output. This mirrors `futures`'
// `maybe_done`, but with a plain `&mut` interface: the stored output is never
// pinned, so holding one must not condition the combinator's `Unpin` on the
// output type the way the upstream version does.
enum MaybeDone<F: Future + Unpin> {
    Future(F),
    Done(F::Output),
    Gone,
}

impl<F: Future + Unpin> MaybeDone<F> {
    // Polls the child if it is still running. Returns true iff an output is
    // now cached.
    fn poll(&mut self, cx: &mut Context) -> bool {
        match self {
            MaybeDone::Future(f) => match Pin::new(f).poll(cx) {
                Poll::Ready(value) => {
                    *self = MaybeDone::Done(value);
                    true
                }
                Poll::Pending => false,
            },
            MaybeDone::Done(_) => true,
            MaybeDone::Gone => panic!("`wait_all` polled after completion"),
        }
    }

    fn take_output(&mut self) -> F::Output {
        match mem::replace(self, MaybeDone::Gone) {
            MaybeDone::Done(value) => value,
            _ => panic!("`wait_all` output taken before completion"),
        }
    }
}

// Macro-generate the variadic combinators, one per arity.
macro_rules! generate {
    ($(
        $(#[$doc:meta])*
        ($WaitAll:ident, $wait_all:ident, <$($Fut:ident),*>),
    )*) => ($(
        #[must_use = "futures do nothing unless polled"]
        pub struct $WaitAll<$($Fut: Future + Unpin),*> {
            $($Fut: MaybeDone<$Fut>,)*
        }

        // Cached outputs are plain data; nothing observes their addresses.
        impl<$($Fut: Future + Unpin),*> Unpin for $WaitAll<$($Fut),*> {}

        impl<$($Fut: Future + Unpin),*> Future for $WaitAll<$($Fut),*> {
            type Output = ($($Fut::Output,)*);

            fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
                let this = &mut *self;

                let mut all_done = true;
                $(
                    all_done &= this.$Fut.poll(cx);
                )*

                if !all_done {
                    return Poll::Pending;
                }

                Poll::Ready(($(this.$Fut.take_output(),)*))
            }
        }

        impl<$($Fut: Future + Unpin + NeverBlocks),*> NeverBlocks for $WaitAll<$($Fut),*> {}

        $(#[$doc])*
        pub fn $wait_all<$($Fut: Future + Unpin),*>($($Fut: $Fut),*) -> $WaitAll<$($Fut),*> {
            $WaitAll {
                $($Fut: MaybeDone::Future($Fut),)*
            }
        }
    )*)
}

generate! {
    /// Runs the two given futures to completion, resolving to a tuple of
    /// their outputs.
    ///
    ///  # Example
    ///
    ///    ```
    ///    use pollcoro::{block_on, wait_all2};
    ///
    ///    let first = Box::pin(async { 5 });
    ///    let second = Box::pin(async { 6 });
    ///    assert_eq!(block_on(wait_all2(first, second)), (5, 6));
    ///    ```
    (WaitAll2, wait_all2, <_Fut1, _Fut2>),

    /// Runs the three given futures to completion, resolving to a tuple of
    /// their outputs.
    (WaitAll3, wait_all3, <_Fut1, _Fut2, _Fut3>),

    /// Runs the four given futures to completion, resolving to a tuple of
    /// their outputs.
    (WaitAll4, wait_all4, <_Fut1, _Fut2, _Fut3, _Fut4>),

    /// Runs the five given futures to completion, resolving to a tuple of
    /// their outputs.
    (WaitAll5, wait_all5, <_Fut1, _Fut2, _Fut3, _Fut4, _Fut5>),
}

/// Future for the [`wait_all_slice`] function.
#[must_use = "futures do nothing unless polled"]
pub struct WaitAllSlice<'a, F: Future + Unpin> {
    futures: &'a mut [F],
    results: Vec<Option<F::Output>>,
    done: bool,
}

/// Runs a homogeneous set of futures to completion, resolving to their
/// outputs in input order.
///
/// The slice is only borrowed; an empty slice resolves to an empty `Vec` on
/// the first poll.
pub fn wait_all_slice<F: Future + Unpin>(futures: &mut [F]) -> WaitAllSlice<F> {
    let mut results = Vec::with_capacity(futures.len());
    results.resize_with(futures.len(), || None);
    WaitAllSlice {
        futures,
        results,
        done: false,
    }
}

impl<'a, F: Future + Unpin> Unpin for WaitAllSlice<'a, F> {}

impl<'a, F: Future + Unpin> Future for WaitAllSlice<'a, F> {
    type Output = Vec<F::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        assert!(!self.done, "`wait_all_slice` polled after completion");

        let this = &mut *self;
        for (fut, slot) in this.futures.iter_mut().zip(this.results.iter_mut()) {
            if slot.is_some() {
                continue;
            }
            if let Poll::Ready(value) = Pin::new(fut).poll(cx) {
                *slot = Some(value);
            }
        }

        if this.results.iter().all(|slot| slot.is_some()) {
            this.done = true;
            let results = mem::take(&mut this.results);
            Poll::Ready(results.into_iter().map(|slot| slot.unwrap()).collect())
        } else {
            Poll::Pending
        }
    }
}

impl<'a, F: Future + Unpin + NeverBlocks> NeverBlocks for WaitAllSlice<'a, F> {}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::Context;
    use std::task::Poll;

    use futures::task::noop_waker;

    use super::*;
    use crate::block_on::block_on;
    use crate::future::ready;
    use crate::future::FutureExt;
    use crate::future::Ready;
    use crate::future::Yield;

    #[test]
    fn resolves_in_declaration_order() {
        let out = block_on(wait_all3(ready(1), ready("two"), ready(3.0)));
        assert_eq!(out, (1, "two", 3.0));
    }

    #[test]
    fn unit_outputs_stay_in_the_tuple() {
        let out = block_on(wait_all2(ready(7), ready(())));
        assert_eq!(out, (7, ()));
    }

    #[test]
    fn slow_child_gates_completion() {
        let slow = Yield::new(4).map(|()| 2);
        let out = block_on(wait_all2(ready(1), slow));
        assert_eq!(out, (1, 2));
    }

    #[test]
    fn empty_slice_is_ready_on_first_poll() {
        let mut futures: Vec<Ready<u32>> = Vec::new();
        let mut wait = wait_all_slice(&mut futures);

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert_eq!(Pin::new(&mut wait).poll(&mut cx), Poll::Ready(Vec::new()));
    }

    #[test]
    fn slice_results_in_input_order() {
        // Later entries complete before earlier ones; output order must still
        // follow input order.
        let mut futures: Vec<_> = (0..4u32)
            .rev()
            .map(|n| Yield::new(n).map(move |()| n))
            .collect();
        let results = block_on(wait_all_slice(&mut futures));
        assert_eq!(results, vec![3, 2, 1, 0]);
    }
}
