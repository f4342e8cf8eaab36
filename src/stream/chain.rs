// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

use crate::blocking::NeverBlocks;

/// Stream for the [`StreamExt::chain`](crate::stream::StreamExt::chain)
/// method.
pub struct Chain<S1, S2> {
    first: S1,
    second: S2,
    first_done: bool,
}

impl<S1, S2> Chain<S1, S2> {
    pub(crate) fn new(first: S1, second: S2) -> Chain<S1, S2> {
        Chain {
            first,
            second,
            first_done: false,
        }
    }
}

impl<S1: Unpin, S2: Unpin> Unpin for Chain<S1, S2> {}

impl<S1, S2> Stream for Chain<S1, S2>
where
    S1: Stream + Unpin,
    S2: Stream<Item = S1::Item> + Unpin,
{
    type Item = S1::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<S1::Item>> {
        if !self.first_done {
            match Pin::new(&mut self.first).poll_next(cx) {
                Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                Poll::Ready(None) => self.first_done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
        Pin::new(&mut self.second).poll_next(cx)
    }
}

impl<S1: NeverBlocks, S2: NeverBlocks> NeverBlocks for Chain<S1, S2> {}

#[cfg(test)]
mod tests {
    use crate::stream::range;
    use crate::stream::repeat;
    use crate::stream::sync_iter;
    use crate::stream::StreamExt;

    #[test]
    fn drains_left_then_right() {
        let chained = range(1, 4)
            .chain(repeat(0).take(2))
            .chain(range(10, 13));
        let out: Vec<i32> = sync_iter(chained).collect();
        assert_eq!(out, vec![1, 2, 3, 0, 0, 10, 11, 12]);
    }

    #[test]
    fn empty_left_side_forwards_right() {
        let out: Vec<i32> = sync_iter(range(0, 0).chain(range(5, 7))).collect();
        assert_eq!(out, vec![5, 6]);
    }
}
