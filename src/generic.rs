// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Type-erased futures and streams.
//!
//! Every combinator in this crate is statically specialized on its children,
//! so two pipelines never share a type even when their result types match.
//! [`generic`] and [`generic_stream`] erase a value behind a heap-pinned
//! vtable so heterogeneous pipelines can live in one container, recursive
//! futures can name their own type, and `!Unpin` `async` blocks become
//! `Unpin` handles usable with the combinators.
//!
//! Erasure discards the static blocking proof: a `GenericFuture` is assumed
//! blocking even when the erased value never was.

use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

/// An owned, type-erased future resolving to `T`.
pub struct GenericFuture<T>(Pin<Box<dyn Future<Output = T> + Send>>);

impl<T> Future for GenericFuture<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<T> {
        self.0.as_mut().poll(cx)
    }
}

/// Erases `future` into a [`GenericFuture`] of its output type.
///
/// # Example
///
/// Recursion requires a nameable, owned future type:
///
///    ```
///    use pollcoro::{block_on, generic, wait_all2, GenericFuture};
///
///    fn fib(n: u64) -> GenericFuture<u64> {
///        generic(async move {
///            if n <= 1 {
///                return n;
///            }
///            let (a, b) = wait_all2(fib(n - 1), fib(n - 2)).await;
///            a + b
///        })
///    }
///
///    assert_eq!(block_on(fib(10)), 55);
///    ```
pub fn generic<F>(future: F) -> GenericFuture<F::Output>
where
    F: Future + Send + 'static,
{
    GenericFuture(Box::pin(future))
}

/// An owned, type-erased stream of `T`.
pub struct GenericStream<T>(Pin<Box<dyn Stream<Item = T> + Send>>);

impl<T> Stream for GenericStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<T>> {
        self.0.as_mut().poll_next(cx)
    }
}

/// Erases `stream` into a [`GenericStream`] of its item type.
pub fn generic_stream<S>(stream: S) -> GenericStream<S::Item>
where
    S: Stream + Send + 'static,
{
    GenericStream(Box::pin(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_on::block_on;
    use crate::stream::iter;
    use crate::stream::range;
    use crate::stream::StreamExt;
    use crate::wait_all::wait_all2;

    #[test]
    fn heterogeneous_storage() {
        let mut futures: Vec<GenericFuture<u32>> = vec![
            generic(async { 1 }),
            generic(crate::future::ready(2)),
            generic(async {
                crate::future::yield_now().await;
                3
            }),
        ];

        let total: u32 = futures
            .drain(..)
            .map(block_on)
            .sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn recursive_futures() {
        fn fib(n: u64) -> GenericFuture<u64> {
            generic(async move {
                if n <= 1 {
                    return n;
                }
                let (a, b) = wait_all2(fib(n - 1), fib(n - 2)).await;
                a + b
            })
        }

        assert_eq!(block_on(fib(10)), 55);
    }

    #[test]
    fn erased_streams_share_a_container() {
        let streams: Vec<GenericStream<i32>> = vec![
            generic_stream(range(0, 3)),
            generic_stream(iter([7, 8]).map(|v| v * 10)),
        ];

        let mut all = Vec::new();
        for s in streams {
            all.extend(block_on(s.collect()));
        }
        assert_eq!(all, vec![0, 1, 2, 70, 80]);
    }
}
