// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

use crate::blocking::NeverBlocks;

/// Stream for the [`StreamExt::flatten`](crate::stream::StreamExt::flatten)
/// method.
pub struct Flatten<S: Stream> {
    stream: S,
    inner: Option<S::Item>,
}

impl<S: Stream> Flatten<S> {
    pub(crate) fn new(stream: S) -> Flatten<S> {
        Flatten {
            stream,
            inner: None,
        }
    }
}

impl<S: Stream + Unpin> Unpin for Flatten<S> where S::Item: Unpin {}

impl<S> Stream for Flatten<S>
where
    S: Stream + Unpin,
    S::Item: Stream + Unpin,
{
    type Item = <S::Item as Stream>::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(inner) = this.inner.as_mut() {
                match Pin::new(inner).poll_next(cx) {
                    Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                    Poll::Ready(None) => {
                        this.inner = None;
                    }
                    Poll::Pending => return Poll::Pending,
                }
                continue;
            }

            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(inner)) => this.inner = Some(inner),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S> NeverBlocks for Flatten<S>
where
    S: Stream + NeverBlocks,
    S::Item: NeverBlocks,
{
}

#[cfg(test)]
mod tests {
    use crate::stream::iter;
    use crate::stream::range;
    use crate::stream::repeat;
    use crate::stream::sync_iter;
    use crate::stream::StreamExt;

    #[test]
    fn drains_each_inner_stream_to_its_end() {
        // [[1], [2, 2], [3, 3, 3]] flattens to 1 2 2 3 3 3.
        let nested = range(1usize, 4).map(|n| repeat(n).take(n));
        let out: Vec<usize> = sync_iter(nested.flatten()).collect();
        assert_eq!(out, vec![1, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn empty_inner_streams_are_skipped() {
        let nested = iter([vec![], vec![7], vec![], vec![8, 9]]).map(iter);
        let out: Vec<i32> = sync_iter(nested.flatten()).collect();
        assert_eq!(out, vec![7, 8, 9]);
    }
}
