// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

use crate::blocking::NeverBlocks;

/// Stream for the [`StreamExt::map`](crate::stream::StreamExt::map) method.
pub struct Map<S, F> {
    stream: S,
    f: F,
}

impl<S, F> Map<S, F> {
    pub(crate) fn new(stream: S, f: F) -> Map<S, F> {
        Map { stream, f }
    }
}

// The closure is only ever called, never pinned.
impl<S: Unpin, F> Unpin for Map<S, F> {}

impl<S, F, U> Stream for Map<S, F>
where
    S: Stream + Unpin,
    F: FnMut(S::Item) -> U,
{
    type Item = U;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<U>> {
        let this = &mut *self;
        Pin::new(&mut this.stream)
            .poll_next(cx)
            .map(|item| item.map(&mut this.f))
    }
}

impl<S: NeverBlocks, F> NeverBlocks for Map<S, F> {}

#[cfg(test)]
mod tests {
    use crate::stream::iter;
    use crate::stream::sync_iter;
    use crate::stream::StreamExt;

    #[test]
    fn maps_each_element() {
        let out: Vec<i32> = sync_iter(iter([1, 2, 3]).map(|v| v * 10)).collect();
        assert_eq!(out, vec![10, 20, 30]);
    }

    #[test]
    fn end_of_stream_passes_through() {
        let mut it = sync_iter(iter(Vec::<i32>::new()).map(|v| v * 10));
        assert_eq!(it.next(), None);
    }
}
