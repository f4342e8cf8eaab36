// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::mem;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

use crate::blocking::NeverBlocks;

/// Stream for the [`StreamExt::window`](crate::stream::StreamExt::window)
/// method.
pub struct Window<S: Stream, const N: usize> {
    stream: S,
    buffer: Vec<S::Item>,
}

impl<S: Stream, const N: usize> Window<S, N> {
    pub(crate) fn new(stream: S) -> Window<S, N> {
        assert!(N > 0, "`window` requires a non-zero chunk size");
        Window {
            stream,
            buffer: Vec::with_capacity(N),
        }
    }
}

impl<S: Stream + Unpin, const N: usize> Unpin for Window<S, N> {}

impl<S: Stream + Unpin, const N: usize> Stream for Window<S, N> {
    type Item = [S::Item; N];

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    self.buffer.push(item);
                    if self.buffer.len() == N {
                        let chunk = mem::replace(&mut self.buffer, Vec::with_capacity(N));
                        let chunk = <[S::Item; N]>::try_from(chunk)
                            .unwrap_or_else(|_| unreachable!("buffer holds exactly N elements"));
                        return Poll::Ready(Some(chunk));
                    }
                }
                // A partial chunk at end-of-stream is discarded.
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S: Stream + NeverBlocks, const N: usize> NeverBlocks for Window<S, N> {}

#[cfg(test)]
mod tests {
    use crate::stream::range;
    use crate::stream::sync_iter;
    use crate::stream::StreamExt;

    #[test]
    fn chunks_are_consecutive_and_non_overlapping() {
        let out: Vec<[u32; 3]> = sync_iter(range(1u32, 10).window::<3>()).collect();
        assert_eq!(out, vec![[1, 2, 3], [4, 5, 6], [7, 8, 9]]);
    }

    #[test]
    fn partial_tail_is_discarded() {
        let out: Vec<[u32; 4]> = sync_iter(range(0u32, 6).window::<4>()).collect();
        assert_eq!(out, vec![[0, 1, 2, 3]]);
    }

    #[test]
    fn moving_average() {
        let averages: Vec<f64> = sync_iter(
            range(1, 10)
                .window::<3>()
                .map(|w: [i32; 3]| (w[0] + w[1] + w[2]) as f64 / 3.0),
        )
        .collect();
        assert_eq!(averages, vec![2.0, 5.0, 8.0]);
    }
}
