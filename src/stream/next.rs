// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

use crate::blocking::NeverBlocks;

/// Future for the [`StreamExt::next`](crate::stream::StreamExt::next)
/// method.
///
/// This is the bridge that lets `async` code consume a stream element by
/// element:
///
///    ```
///    use pollcoro::block_on;
///    use pollcoro::stream::{range, StreamExt};
///
///    block_on(async {
///        let mut sum = 0;
///        let mut s = range(0u32, 4);
///        while let Some(v) = s.next().await {
///            sum += v;
///        }
///        assert_eq!(sum, 6);
///    });
///    ```
#[must_use = "futures do nothing unless polled"]
pub struct Next<'a, S: ?Sized> {
    stream: &'a mut S,
}

impl<'a, S: ?Sized> Next<'a, S> {
    pub(crate) fn new(stream: &'a mut S) -> Next<'a, S> {
        Next { stream }
    }
}

impl<'a, S: Stream + Unpin + ?Sized> Future for Next<'a, S> {
    type Output = Option<S::Item>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<S::Item>> {
        Pin::new(&mut *self.stream).poll_next(cx)
    }
}

impl<'a, S: NeverBlocks + ?Sized> NeverBlocks for Next<'a, S> {}

#[cfg(test)]
mod tests {
    use crate::block_on::block_on;
    use crate::stream::iter;
    use crate::stream::StreamExt;

    #[test]
    fn yields_elements_then_none() {
        block_on(async {
            let mut s = iter(["x", "y"]);
            assert_eq!(s.next().await, Some("x"));
            assert_eq!(s.next().await, Some("y"));
            assert_eq!(s.next().await, None);
        });
    }
}
